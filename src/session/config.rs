use crate::audio::AudioUpload;
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque per-attempt identity shared by the upload and its progress channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// A fresh identity (e.g., "client-5b0c7a9e-...")
    pub fn generate() -> Self {
        Self(format!("client-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-selected options for one upload
#[derive(Clone, Default)]
pub struct SessionOptions {
    /// Request the secondary summarization stage
    pub enable_summary: bool,

    /// Secret required by the summarization stage; forwarded verbatim,
    /// never persisted or logged
    pub api_key: Option<String>,
}

impl SessionOptions {
    pub fn transcript_only() -> Self {
        Self::default()
    }

    pub fn with_summary(api_key: impl Into<String>) -> Self {
        Self {
            enable_summary: true,
            api_key: Some(api_key.into()),
        }
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("enable_summary", &self.enable_summary)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One validated upload attempt; immutable once created
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub file: AudioUpload,
    pub options: SessionOptions,
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// Validate the caller's input and mint a new session identity
    pub fn new(file: Option<AudioUpload>, options: SessionOptions) -> Result<Self, ValidationError> {
        let file = match file {
            Some(file) if !file.is_empty() => file,
            _ => return Err(ValidationError::MissingFile),
        };

        let has_secret = options.api_key.as_deref().is_some_and(|key| !key.is_empty());
        if options.enable_summary && !has_secret {
            return Err(ValidationError::MissingSecret);
        }

        Ok(Self {
            id: SessionId::generate(),
            file,
            options,
            started_at: Utc::now(),
        })
    }
}
