//! Submission endpoint client
//!
//! The request/response half of the processing service:
//! - POST /transcribe/ - multipart upload (file, enable_summary, client_id, api_key)
//!
//! Returns the transcript and, when requested, the two summaries.

mod client;
mod types;

pub use client::{SubmissionClient, Submitter};
pub use types::{ErrorResponse, SubmissionRequest, TranscriptionResponse};
