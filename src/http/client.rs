use super::types::{ErrorResponse, SubmissionRequest, TranscriptionResponse};
use crate::config::ServerConfig;
use crate::error::SubmissionError;
use async_trait::async_trait;
use reqwest::multipart;
use tracing::{error, info};

/// The request/response half of the processing service
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Upload a file and wait for the final transcription
    async fn submit(&self, request: SubmissionRequest) -> Result<TranscriptionResponse, SubmissionError>;
}

/// Multipart submission client for `POST {base_url}/transcribe/`
pub struct SubmissionClient {
    client: reqwest::Client,
    url: String,
}

impl SubmissionClient {
    pub fn new(server: &ServerConfig) -> Result<Self, SubmissionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = server.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SubmissionError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            url: server.submission_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_form(request: SubmissionRequest) -> Result<multipart::Form, SubmissionError> {
        let file = request.file;
        let file_part = multipart::Part::stream_with_length(
            reqwest::Body::from(file.bytes().clone()),
            file.len() as u64,
        )
        .file_name(file.name().to_string())
        .mime_str(file.mime_type())
        .map_err(|e| SubmissionError::InvalidRequest(e.to_string()))?;

        let mut form = multipart::Form::new()
            .part("file", file_part)
            .text("enable_summary", request.enable_summary.to_string())
            .text("client_id", request.session_id);

        if request.enable_summary {
            if let Some(api_key) = request.api_key {
                form = form.text("api_key", api_key);
            }
        }

        Ok(form)
    }
}

#[async_trait]
impl Submitter for SubmissionClient {
    async fn submit(&self, request: SubmissionRequest) -> Result<TranscriptionResponse, SubmissionError> {
        info!(
            "Submitting {} ({} bytes, summary={}) for session {}",
            request.file.name(),
            request.file.len(),
            request.enable_summary,
            request.session_id
        );

        let form = Self::build_form(request)?;

        let response = self.client.post(&self.url).multipart(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message())
                .unwrap_or(body);
            error!("Submission failed with {}: {}", status, detail);
            return Err(SubmissionError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.text().await?;
        let transcription: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| SubmissionError::InvalidResponse(e.to_string()))?;

        info!(
            "Submission complete ({} chars of transcript)",
            transcription.transcription.len()
        );

        Ok(transcription)
    }
}
