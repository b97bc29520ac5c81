use std::time::Duration;
use thiserror::Error;

/// Local input problems detected before any network activity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select an audio file.")]
    MissingFile,

    #[error("Please enter an OpenAI API key for summarization.")]
    MissingSecret,

    #[error("A transcription is already in progress.")]
    SessionInProgress,
}

/// Progress channel failures
///
/// These only degrade live progress reporting; they never decide the
/// outcome of a workflow on their own.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("Progress channel connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("Progress channel transport error: {0}")]
    Transport(String),

    #[error("Progress channel closed unexpectedly (code={code:?}, reason={reason:?})")]
    ClosedUnexpectedly {
        code: Option<u16>,
        reason: Option<String>,
    },

    #[error("Progress channel can only be opened once")]
    AlreadyOpened,
}

impl ChannelError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ChannelError::Timeout(_))
    }
}

/// Failures of the file submission request
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Invalid response body: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for SubmissionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SubmissionError::InvalidResponse(e.to_string())
        } else {
            SubmissionError::Network(e.to_string())
        }
    }
}

/// A channel message that could not be decoded (absorbed by the channel)
#[derive(Debug, Error)]
#[error("Undecodable progress message: {0}")]
pub struct DecodeError(#[from] pub serde_json::Error);
