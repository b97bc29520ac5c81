// Shared fixtures for integration tests
//
// An in-process mock of the processing service: a WebSocket progress
// endpoint that plays a script of messages, and a multipart submission
// endpoint that records what it received.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use studyflow_client::config::{ProgressConfig, ServerConfig};
use studyflow_client::{
    ChannelError, Config, ProgressState, SessionObserver, SubmissionError, SubmissionRequest,
    Submitter, TranscriptionResponse, WorkflowResult, WorkflowState,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

// ============================================================================
// Mock processing service
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RecordedSubmission {
    pub client_id: Option<String>,
    pub enable_summary: Option<String>,
    pub api_key: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub file_len: usize,
}

struct ServiceState {
    script: Vec<String>,
    frame_interval: Duration,
    close_after_script: bool,
    reply_pong: bool,
    respond_after_script: bool,
    response_delay: Duration,
    response: (StatusCode, Value),

    connections: Mutex<Vec<String>>,
    pings: AtomicUsize,
    close_frames: Mutex<Vec<(u16, String)>>,
    submissions: Mutex<Vec<RecordedSubmission>>,
    script_done: watch::Sender<bool>,
}

pub struct MockServiceBuilder {
    script: Vec<String>,
    frame_interval: Duration,
    close_after_script: bool,
    reply_pong: bool,
    respond_after_script: bool,
    response_delay: Duration,
    response: (StatusCode, Value),
}

impl MockServiceBuilder {
    /// Messages pushed to every progress connection, in order
    pub fn script(mut self, messages: Vec<Value>) -> Self {
        self.script = messages.into_iter().map(|m| m.to_string()).collect();
        self
    }

    /// Raw text frames, for malformed payloads
    pub fn raw_script(mut self, frames: Vec<&str>) -> Self {
        self.script = frames.into_iter().map(String::from).collect();
        self
    }

    /// Pause before each scripted frame
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Drop the progress connection (code 1011) once the script is sent
    pub fn close_after_script(mut self) -> Self {
        self.close_after_script = true;
        self
    }

    pub fn reply_pong(mut self) -> Self {
        self.reply_pong = true;
        self
    }

    /// Hold the submission response until the script has been sent
    pub fn respond_after_script(mut self) -> Self {
        self.respond_after_script = true;
        self
    }

    pub fn response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    pub fn respond(mut self, status: StatusCode, body: Value) -> Self {
        self.response = (status, body);
        self
    }

    pub async fn start(self) -> Result<MockService> {
        let (script_done, _) = watch::channel(false);
        let state = Arc::new(ServiceState {
            script: self.script,
            frame_interval: self.frame_interval,
            close_after_script: self.close_after_script,
            reply_pong: self.reply_pong,
            respond_after_script: self.respond_after_script,
            response_delay: self.response_delay,
            response: self.response,
            connections: Mutex::new(Vec::new()),
            pings: AtomicUsize::new(0),
            close_frames: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            script_done,
        });

        let app = Router::new()
            .route("/ws/:client_id", get(ws_handler))
            .route("/transcribe/", post(transcribe_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(MockService {
            addr,
            state,
            handle,
        })
    }
}

pub struct MockService {
    pub addr: SocketAddr,
    state: Arc<ServiceState>,
    handle: JoinHandle<()>,
}

impl MockService {
    pub fn builder() -> MockServiceBuilder {
        MockServiceBuilder {
            script: Vec::new(),
            frame_interval: Duration::ZERO,
            close_after_script: false,
            reply_pong: false,
            respond_after_script: false,
            response_delay: Duration::ZERO,
            response: (StatusCode::OK, json!({ "transcription": "" })),
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            base_url: format!("http://{}", self.addr),
            ws_url: format!("ws://{}", self.addr),
            request_timeout_secs: Some(10),
        }
    }

    pub fn connections(&self) -> Vec<String> {
        self.state.connections.lock().unwrap().clone()
    }

    pub fn pings(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }

    pub fn close_frames(&self) -> Vec<(u16, String)> {
        self.state.close_frames.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.state.submissions.lock().unwrap().clone()
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<Arc<ServiceState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, client_id, state))
}

async fn handle_socket(mut socket: WebSocket, client_id: String, state: Arc<ServiceState>) {
    state.connections.lock().unwrap().push(client_id);

    for frame in &state.script {
        if !state.frame_interval.is_zero() {
            tokio::time::sleep(state.frame_interval).await;
        }
        if socket.send(Message::Text(frame.clone())).await.is_err() {
            return;
        }
    }
    state.script_done.send_replace(true);

    if state.close_after_script {
        let frame = axum::extract::ws::CloseFrame {
            code: 1011,
            reason: "server error".into(),
        };
        socket.send(Message::Close(Some(frame))).await.ok();
        return;
    }

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                let is_ping = serde_json::from_str::<Value>(&text)
                    .map(|v| v["type"] == "ping")
                    .unwrap_or(false);
                if is_ping {
                    state.pings.fetch_add(1, Ordering::SeqCst);
                    if state.reply_pong {
                        socket
                            .send(Message::Text(json!({ "type": "pong" }).to_string()))
                            .await
                            .ok();
                    }
                }
            }
            Message::Close(frame) => {
                if let Some(frame) = frame {
                    state
                        .close_frames
                        .lock()
                        .unwrap()
                        .push((frame.code, frame.reason.into_owned()));
                }
                break;
            }
            _ => {}
        }
    }
}

async fn transcribe_handler(
    State(state): State<Arc<ServiceState>>,
    mut multipart: Multipart,
) -> Response {
    let mut recorded = RecordedSubmission::default();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                recorded.file_name = field.file_name().map(String::from);
                recorded.content_type = field.content_type().map(String::from);
                recorded.file_len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
            }
            "client_id" => recorded.client_id = field.text().await.ok(),
            "enable_summary" => recorded.enable_summary = field.text().await.ok(),
            "api_key" => recorded.api_key = field.text().await.ok(),
            _ => {}
        }
    }

    state.submissions.lock().unwrap().push(recorded);

    if state.respond_after_script {
        let mut done = state.script_done.subscribe();
        done.wait_for(|sent| *sent).await.ok();
    }
    if !state.response_delay.is_zero() {
        tokio::time::sleep(state.response_delay).await;
    }

    let (status, body) = state.response.clone();
    (status, Json(body)).into_response()
}

// ============================================================================
// Other endpoints
// ============================================================================

/// Accepts TCP connections but never answers the WebSocket handshake
pub async fn stalling_listener() -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    Ok((addr, handle))
}

/// An address with nothing listening
pub async fn unused_addr() -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

pub fn test_config(server: ServerConfig) -> Config {
    Config {
        server,
        progress: ProgressConfig {
            connect_timeout_ms: 2_000,
            keepalive_interval_ms: 30_000,
            teardown_grace_ms: 100,
            ..ProgressConfig::default()
        },
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// ============================================================================
// Presentation-layer and submission doubles
// ============================================================================

#[derive(Default)]
pub struct RecordingObserver {
    pub progress: Mutex<Vec<ProgressState>>,
    pub states: Mutex<Vec<WorkflowState>>,
    pub channel_failures: Mutex<Vec<String>>,
    pub results: Mutex<Vec<WorkflowResult>>,
}

impl RecordingObserver {
    pub fn last_progress(&self) -> Option<ProgressState> {
        self.progress.lock().unwrap().last().cloned()
    }

    pub fn result_count(&self) -> usize {
        self.results.lock().unwrap().len()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_progress(&self, progress: &ProgressState) {
        self.progress.lock().unwrap().push(progress.clone());
    }

    fn on_state(&self, state: &WorkflowState) {
        self.states.lock().unwrap().push(state.clone());
    }

    fn on_channel_failure(&self, error: &ChannelError) {
        self.channel_failures.lock().unwrap().push(error.to_string());
    }

    fn on_result(&self, result: &WorkflowResult) {
        self.results.lock().unwrap().push(result.clone());
    }
}

/// Submitter that counts calls and answers with a fixed transcript
pub struct CountingSubmitter {
    pub calls: AtomicUsize,
    delay: Duration,
    transcript: String,
}

impl CountingSubmitter {
    pub fn new(transcript: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            transcript: transcript.to_string(),
        }
    }

    pub fn with_delay(transcript: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(transcript)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Submitter for CountingSubmitter {
    async fn submit(&self, _request: SubmissionRequest) -> Result<TranscriptionResponse, SubmissionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(TranscriptionResponse {
            transcription: self.transcript.clone(),
            key_points: None,
            detailed_summary: None,
        })
    }
}
