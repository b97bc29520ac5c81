use anyhow::{Context, Result};
use bytes::Bytes;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use tracing::{debug, info};

/// The audio file selected for upload
///
/// The payload is a shared buffer: cloning an upload never copies the bytes.
#[derive(Clone)]
pub struct AudioUpload {
    name: String,
    bytes: Bytes,
}

impl AudioUpload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read an audio file from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read audio file {}", path.display()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        info!("Audio file loaded: {} ({} bytes)", name, bytes.len());

        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    /// MIME type inferred from the file extension
    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("mp3") => "audio/mpeg",
            Some("wav") => "audio/wav",
            Some("m4a") => "audio/mp4",
            Some("flac") => "audio/flac",
            Some("ogg") => "audio/ogg",
            Some("webm") => "audio/webm",
            _ => "application/octet-stream",
        }
    }

    /// Best-effort duration of the default track, in seconds
    pub fn probe_duration(&self) -> Option<f64> {
        let source = MediaSourceStream::new(Box::new(Cursor::new(self.bytes.clone())), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = self.extension() {
            hint.with_extension(&ext);
        }

        let probed = match symphonia::default::get_probe().format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        ) {
            Ok(probed) => probed,
            Err(e) => {
                debug!("Could not probe {}: {}", self.name, e);
                return None;
            }
        };

        let track = probed.format.default_track()?;
        let params = &track.codec_params;
        let frames = params.n_frames?;
        let time_base = params
            .time_base
            .or_else(|| params.sample_rate.map(|rate| TimeBase::new(1, rate)))?;

        let time = time_base.calc_time(frames);
        Some(time.seconds as f64 + time.frac)
    }
}

impl fmt::Debug for AudioUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioUpload")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}
