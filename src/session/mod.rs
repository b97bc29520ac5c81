//! Transcription session orchestration
//!
//! This module provides the `SessionOrchestrator`, the single entry point
//! for one upload-to-result workflow:
//! - Local validation (file present, secret present when summarizing)
//! - Session identity generation
//! - Progress channel setup before submission
//! - File submission and result assembly
//! - Channel teardown (grace-delayed on success, immediate on failure)

mod config;
mod observer;
mod orchestrator;
mod result;

pub use config::{Session, SessionId, SessionOptions};
pub use observer::SessionObserver;
pub use orchestrator::{SessionOrchestrator, WorkflowState};
pub use result::{
    FailureStage, Summary, Transcription, WorkflowFailure, WorkflowResult, CANCELLED_MESSAGE,
    CHANNEL_FAILED_MESSAGE, SUBMISSION_FAILED_MESSAGE,
};
