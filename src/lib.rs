pub mod audio;
pub mod channel;
pub mod config;
pub mod error;
pub mod http;
pub mod progress;
pub mod session;

pub use audio::AudioUpload;
pub use channel::{ChannelEvent, ChannelState, ProgressChannel};
pub use config::{ChannelFailurePolicy, Config};
pub use error::{ChannelError, DecodeError, SubmissionError, ValidationError};
pub use http::{SubmissionClient, SubmissionRequest, Submitter, TranscriptionResponse};
pub use progress::{ProgressEstimator, ProgressState};
pub use session::{
    FailureStage, SessionId, SessionObserver, SessionOptions, SessionOrchestrator, Summary,
    Transcription, WorkflowResult, WorkflowState,
};
