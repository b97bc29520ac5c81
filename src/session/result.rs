use crate::http::TranscriptionResponse;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Shown for any failed submission; the cause is only logged
pub const SUBMISSION_FAILED_MESSAGE: &str = "Failed to process the audio file.";
pub const CHANNEL_FAILED_MESSAGE: &str = "Could not connect to the progress channel.";
pub const CANCELLED_MESSAGE: &str = "Transcription cancelled.";

/// Workflow stage that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Validation,
    /// Only with the fail-fast channel policy
    Channel,
    Submission,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Short "key points" form
    pub key_points: String,
    /// Longer detailed form
    pub detailed: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    pub transcript: String,
    pub summary: Option<Summary>,
}

impl Transcription {
    pub fn from_response(response: TranscriptionResponse, summary_requested: bool) -> Self {
        let summary = match (summary_requested, response.key_points, response.detailed_summary) {
            (true, Some(key_points), Some(detailed)) => Some(Summary {
                key_points,
                detailed,
            }),
            (true, _, _) => {
                warn!("Summarization was requested but the response carried no summary");
                None
            }
            (false, _, _) => None,
        };

        Self {
            transcript: response.transcription,
            summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFailure {
    pub stage: FailureStage,
    pub message: String,
}

/// Terminal outcome of one workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowResult {
    Success(Transcription),
    Failure(WorkflowFailure),
}

impl WorkflowResult {
    pub fn failure(stage: FailureStage, message: impl Into<String>) -> Self {
        WorkflowResult::Failure(WorkflowFailure {
            stage,
            message: message.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowResult::Success(_))
    }

    pub fn transcription(&self) -> Option<&Transcription> {
        match self {
            WorkflowResult::Success(t) => Some(t),
            WorkflowResult::Failure(_) => None,
        }
    }

    pub fn failure_stage(&self) -> Option<FailureStage> {
        match self {
            WorkflowResult::Success(_) => None,
            WorkflowResult::Failure(f) => Some(f.stage),
        }
    }
}
