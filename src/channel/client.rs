use super::messages::{ChannelEvent, ClientMessage};
use crate::config::{ProgressConfig, ServerConfig};
use crate::error::ChannelError;
use crate::progress::clamp_percentage;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reason sent with the normal closure once the work is done
pub const CLOSE_REASON: &str = "Transcription complete";

/// How long `close()` waits for the closing handshake frame to be flushed
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

pub type DurationCallback = Arc<dyn Fn(f64) + Send + Sync>;
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;
pub type FailureCallback = Arc<dyn Fn(ChannelError) + Send + Sync>;

/// Lifecycle of a progress channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Closed,
    Failed,
}

impl ChannelState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Failed)
    }
}

#[derive(Clone, Default)]
struct Callbacks {
    on_duration: Option<DurationCallback>,
    on_progress: Option<ProgressCallback>,
    on_failure: Option<FailureCallback>,
}

/// State shared between the channel handle and its background tasks
struct Shared {
    state: Mutex<ChannelState>,
    duration_recorded: AtomicBool,
    /// Wakes the keepalive task when the reader sees the transport die
    shutdown: Notify,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState::Idle),
            duration_recorded: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    fn state(&self) -> ChannelState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: ChannelState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    /// Move `Open -> Failed` and notify; any other state is left alone.
    fn fail_if_open(&self, error: ChannelError, callbacks: &Callbacks) {
        let was_open = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state == ChannelState::Open {
                *state = ChannelState::Failed;
                true
            } else {
                false
            }
        };

        if !was_open {
            return;
        }

        self.shutdown.notify_one();
        warn!("{}", error);
        if let Some(on_failure) = &callbacks.on_failure {
            on_failure(error);
        }
    }

    fn dispatch(&self, text: &str, callbacks: &Callbacks) {
        debug!("Raw progress message: {}", text);

        let event = match ChannelEvent::decode(text) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!("Ignoring progress message of unknown type");
                return;
            }
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };

        match event {
            ChannelEvent::Connected {
                message,
                duration_hint,
            } => {
                info!(
                    "Progress channel acknowledged: {}",
                    message.as_deref().unwrap_or("connected")
                );
                self.forward_duration(duration_hint, callbacks);
                // A fresh acknowledgment never carries over a stale percentage
                if let Some(on_progress) = &callbacks.on_progress {
                    on_progress(0);
                }
            }
            ChannelEvent::Progress {
                value,
                duration_hint,
            } => {
                self.forward_duration(duration_hint, callbacks);
                if let (Some(value), Some(on_progress)) = (value, &callbacks.on_progress) {
                    on_progress(clamp_percentage(value));
                }
            }
            ChannelEvent::Pong => debug!("Keepalive acknowledged"),
        }
    }

    fn forward_duration(&self, hint: Option<f64>, callbacks: &Callbacks) {
        let Some(duration) = hint else {
            return;
        };
        if self.duration_recorded.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Source audio duration: {:.1}s", duration);
        if let Some(on_duration) = &callbacks.on_duration {
            on_duration(duration);
        }
    }
}

/// Fails a channel whose `open` future is dropped mid-connect
struct ConnectGuard {
    shared: Arc<Shared>,
    armed: bool,
}

impl ConnectGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ConnectGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == ChannelState::Connecting {
            *state = ChannelState::Failed;
            debug!("Progress channel open abandoned");
        }
    }
}

/// A single live progress connection, bound to one session
pub struct ProgressChannel {
    server: ServerConfig,
    connect_timeout: Duration,
    keepalive_interval: Duration,
    callbacks: Callbacks,
    shared: Arc<Shared>,
    close_tx: Option<oneshot::Sender<()>>,
    keepalive_task: Option<JoinHandle<()>>,
    reader_task: Option<JoinHandle<()>>,
}

impl ProgressChannel {
    pub fn new(server: &ServerConfig, progress: &ProgressConfig) -> Self {
        Self {
            server: server.clone(),
            connect_timeout: progress.connect_timeout(),
            keepalive_interval: progress.keepalive_interval(),
            callbacks: Callbacks::default(),
            shared: Arc::new(Shared::new()),
            close_tx: None,
            keepalive_task: None,
            reader_task: None,
        }
    }

    /// Register the callback receiving the source duration (at most once)
    pub fn on_duration(&mut self, f: impl Fn(f64) + Send + Sync + 'static) -> &mut Self {
        self.callbacks.on_duration = Some(Arc::new(f));
        self
    }

    /// Register the callback receiving clamped percentages
    pub fn on_progress(&mut self, f: impl Fn(u8) + Send + Sync + 'static) -> &mut Self {
        self.callbacks.on_progress = Some(Arc::new(f));
        self
    }

    /// Register the callback told when an open channel fails on its own
    pub fn on_failure(&mut self, f: impl Fn(ChannelError) + Send + Sync + 'static) -> &mut Self {
        self.callbacks.on_failure = Some(Arc::new(f));
        self
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    /// Connect to the progress endpoint for `session_id`
    ///
    /// Resolves once the connection is open, or with an error once it has
    /// failed or the connection budget is exhausted.
    pub async fn open(&mut self, session_id: &str) -> Result<(), ChannelError> {
        {
            let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state != ChannelState::Idle {
                return Err(ChannelError::AlreadyOpened);
            }
            *state = ChannelState::Connecting;
        }

        let guard = ConnectGuard {
            shared: Arc::clone(&self.shared),
            armed: true,
        };

        let url = self.server.progress_url(session_id);
        info!("Opening progress channel: {}", url);

        let connected = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str())).await;
        guard.disarm();

        let ws = match connected {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(e)) => {
                self.shared.set_state(ChannelState::Failed);
                let error = ChannelError::Transport(e.to_string());
                warn!("{}", error);
                return Err(error);
            }
            Err(_) => {
                self.shared.set_state(ChannelState::Failed);
                let error = ChannelError::Timeout(self.connect_timeout);
                warn!("{}", error);
                return Err(error);
            }
        };

        let (sink, stream) = ws.split();
        self.shared.set_state(ChannelState::Open);

        let (close_tx, close_rx) = oneshot::channel();
        self.close_tx = Some(close_tx);
        self.keepalive_task = Some(tokio::spawn(keepalive_loop(
            sink,
            self.keepalive_interval,
            close_rx,
            Arc::clone(&self.shared),
        )));
        self.reader_task = Some(tokio::spawn(read_loop(
            stream,
            Arc::clone(&self.shared),
            self.callbacks.clone(),
        )));

        info!("Progress channel open for session {}", session_id);
        Ok(())
    }

    /// Close the channel with a normal "work complete" closure. Idempotent.
    pub async fn close(&mut self) {
        let previous = {
            let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            let previous = *state;
            if previous == ChannelState::Open {
                *state = ChannelState::Closed;
            }
            previous
        };

        match previous {
            ChannelState::Open => {
                info!("Closing progress channel");
                if let Some(close_tx) = self.close_tx.take() {
                    let _ = close_tx.send(());
                }
                if let Some(mut keepalive) = self.keepalive_task.take() {
                    if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut keepalive)
                        .await
                        .is_err()
                    {
                        warn!("Timed out flushing progress channel closure");
                        keepalive.abort();
                    }
                }
                self.abort_tasks();
            }
            state if state.is_terminal() => self.abort_tasks(),
            _ => {}
        }
    }

    fn abort_tasks(&mut self) {
        self.close_tx = None;
        if let Some(task) = self.keepalive_task.take() {
            task.abort();
        }
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}

impl Drop for ProgressChannel {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// Owns the write half: periodic pings until asked to close
async fn keepalive_loop(
    mut sink: SplitSink<WsStream, Message>,
    interval: Duration,
    mut close_rx: oneshot::Receiver<()>,
    shared: Arc<Shared>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let ping = match ClientMessage::Ping.to_text() {
                    Ok(ping) => ping,
                    Err(e) => {
                        warn!("Failed to encode keepalive: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(ping)).await {
                    debug!("Keepalive send failed: {}", e);
                    break;
                }
                debug!("Keepalive sent");
            }
            _ = &mut close_rx => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: Cow::Borrowed(CLOSE_REASON),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!("Failed to send close frame: {}", e);
                }
                break;
            }
            _ = shared.shutdown.notified() => break,
        }
    }

    debug!("Keepalive task stopped");
}

/// Owns the read half: decodes messages while open, detects transport loss
async fn read_loop(mut stream: SplitStream<WsStream>, shared: Arc<Shared>, callbacks: Callbacks) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if shared.state() != ChannelState::Open {
                    debug!("Discarding progress message received after close");
                    continue;
                }
                shared.dispatch(&text, &callbacks);
            }
            Ok(Message::Close(frame)) => {
                let (code, reason) = match frame {
                    Some(frame) => (Some(u16::from(frame.code)), Some(frame.reason.into_owned())),
                    None => (None, None),
                };
                debug!("Progress channel close frame: code={:?} reason={:?}", code, reason);
                shared.fail_if_open(ChannelError::ClosedUnexpectedly { code, reason }, &callbacks);
            }
            Ok(_) => {}
            Err(e) => {
                shared.fail_if_open(ChannelError::Transport(e.to_string()), &callbacks);
                break;
            }
        }
    }

    shared.fail_if_open(
        ChannelError::ClosedUnexpectedly {
            code: None,
            reason: None,
        },
        &callbacks,
    );
    debug!("Progress reader task stopped");
}
