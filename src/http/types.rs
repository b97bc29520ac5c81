use crate::audio::AudioUpload;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ============================================================================
// Request
// ============================================================================

/// One file submission to `POST /transcribe/`
#[derive(Clone)]
pub struct SubmissionRequest {
    /// Session identity, sent as `client_id` so the server can route progress
    pub session_id: String,

    pub file: AudioUpload,

    pub enable_summary: bool,

    /// Forwarded verbatim, only when `enable_summary` is set
    pub api_key: Option<String>,
}

impl fmt::Debug for SubmissionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionRequest")
            .field("session_id", &self.session_id)
            .field("file", &self.file)
            .field("enable_summary", &self.enable_summary)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(alias = "original_transcript")]
    pub transcription: String,

    /// Short "key points" summary
    #[serde(rename = "petitResume", alias = "petit_resume", default)]
    pub key_points: Option<String>,

    /// Longer detailed summary
    #[serde(rename = "grosResume", alias = "gros_resume", default)]
    pub detailed_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub detail: Value,
}

impl ErrorResponse {
    pub fn message(&self) -> String {
        match &self.detail {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
