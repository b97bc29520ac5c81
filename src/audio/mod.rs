pub mod file;

pub use file::AudioUpload;
