use super::config::{Session, SessionId, SessionOptions};
use super::observer::SessionObserver;
use super::result::{
    FailureStage, Transcription, WorkflowResult, CANCELLED_MESSAGE, CHANNEL_FAILED_MESSAGE,
    SUBMISSION_FAILED_MESSAGE,
};
use crate::audio::AudioUpload;
use crate::channel::ProgressChannel;
use crate::config::{ChannelFailurePolicy, Config};
use crate::error::{SubmissionError, ValidationError};
use crate::http::{SubmissionClient, SubmissionRequest, Submitter};
use crate::progress::{ProgressEstimator, ProgressState};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Where a workflow currently stands
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Validating,
    AwaitingChannel { session_id: SessionId },
    Submitting { session_id: SessionId },
    /// The submission is armed and awaited together with cancellation; the
    /// request goes out on its first poll.
    InProgress { session_id: SessionId },
    Succeeded { session_id: SessionId },
    Failed { stage: FailureStage },
}

impl WorkflowState {
    /// Whether a workflow is between `start` and its result
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            WorkflowState::Validating
                | WorkflowState::AwaitingChannel { .. }
                | WorkflowState::Submitting { .. }
                | WorkflowState::InProgress { .. }
        )
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// State shared with channel callbacks and the teardown task
struct Inner {
    state: Mutex<WorkflowState>,
    estimator: Mutex<ProgressEstimator>,
    /// Progress for any other session identity is discarded
    active_session: Mutex<Option<SessionId>>,
    cancel_tx: Mutex<Option<oneshot::Sender<()>>>,
    teardown: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    /// Apply `f` to the estimator if `session_id` is still current.
    ///
    /// Returns the state to render when `f` reports a change.
    fn apply(
        &self,
        session_id: &SessionId,
        f: impl FnOnce(&mut ProgressEstimator) -> bool,
    ) -> Option<ProgressState> {
        let active = lock(&self.active_session);
        if active.as_ref() != Some(session_id) {
            debug!("Discarding progress for superseded session {}", session_id);
            return None;
        }
        let mut estimator = lock(&self.estimator);
        f(&mut estimator).then(|| estimator.state().clone())
    }

    fn activate(&self, session_id: &SessionId) -> ProgressState {
        let mut active = lock(&self.active_session);
        *active = Some(session_id.clone());
        let mut estimator = lock(&self.estimator);
        estimator.reset();
        estimator.state().clone()
    }

    /// Drop whichever session is current, e.g. one still in its teardown grace
    fn supersede(&self) {
        let mut active = lock(&self.active_session);
        if let Some(previous) = active.take() {
            debug!("Session {} superseded", previous);
            lock(&self.estimator).reset();
        }
    }

    /// Stop applying progress for `session_id` and clear its estimate
    fn release(&self, session_id: &SessionId) {
        let mut active = lock(&self.active_session);
        if active.as_ref() == Some(session_id) {
            *active = None;
            lock(&self.estimator).reset();
        }
    }
}

/// Drives one upload-to-result workflow at a time
///
/// validate → open progress channel → submit → await response → result.
/// The progress channel is best-effort: by default its failure only means
/// the workflow runs without live progress.
pub struct SessionOrchestrator {
    config: Config,
    submitter: Arc<dyn Submitter>,
    observer: Arc<dyn SessionObserver>,
    inner: Arc<Inner>,
}

impl SessionOrchestrator {
    /// Create an orchestrator talking to the configured processing service
    pub fn new(config: Config, observer: Arc<dyn SessionObserver>) -> Result<Self, SubmissionError> {
        let submitter = SubmissionClient::new(&config.server)?;
        Ok(Self::with_submitter(config, Arc::new(submitter), observer))
    }

    pub fn with_submitter(
        config: Config,
        submitter: Arc<dyn Submitter>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            config,
            submitter,
            observer,
            inner: Arc::new(Inner {
                state: Mutex::new(WorkflowState::Idle),
                estimator: Mutex::new(ProgressEstimator::new()),
                active_session: Mutex::new(None),
                cancel_tx: Mutex::new(None),
                teardown: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> WorkflowState {
        lock(&self.inner.state).clone()
    }

    pub fn progress(&self) -> ProgressState {
        lock(&self.inner.estimator).state().clone()
    }

    /// Abort the running workflow, if any
    ///
    /// The progress channel is closed immediately and the workflow resolves
    /// with a `Cancelled` failure. Returns whether a workflow was cancelled.
    pub fn cancel(&self) -> bool {
        match lock(&self.inner.cancel_tx).take() {
            Some(cancel_tx) => cancel_tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Wait for a grace-delayed channel teardown to finish
    pub async fn wait_for_teardown(&self) {
        let handle = lock(&self.inner.teardown).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Progress channel teardown task failed: {}", e);
            }
        }
    }

    /// Run one workflow to completion
    ///
    /// The result is also delivered exactly once to the observer.
    pub async fn start(&self, file: Option<AudioUpload>, options: SessionOptions) -> WorkflowResult {
        let mut cancel_rx = {
            let mut state = lock(&self.inner.state);
            if state.is_running() {
                drop(state);
                warn!("Rejecting start: a workflow is already running");
                let e = ValidationError::SessionInProgress;
                let result = WorkflowResult::failure(FailureStage::Validation, e.to_string());
                self.observer.on_result(&result);
                return result;
            }
            *state = WorkflowState::Validating;
            let (cancel_tx, cancel_rx) = oneshot::channel();
            *lock(&self.inner.cancel_tx) = Some(cancel_tx);
            cancel_rx
        };
        self.inner.supersede();
        self.observer.on_state(&WorkflowState::Validating);

        let session = match Session::new(file, options) {
            Ok(session) => session,
            Err(e) => {
                warn!("Validation failed: {}", e);
                return self.fail(FailureStage::Validation, e.to_string());
            }
        };

        info!(
            "Starting session {} for {} ({} bytes, summary={})",
            session.id,
            session.file.name(),
            session.file.len(),
            session.options.enable_summary
        );

        let initial = self.inner.activate(&session.id);
        self.observer.on_progress(&initial);

        // Channel readiness is resolved before submission so that no
        // progress event can be missed.
        self.transition(WorkflowState::AwaitingChannel {
            session_id: session.id.clone(),
        });
        let mut channel = self.progress_channel(&session.id);

        let opened = tokio::select! {
            result = channel.open(session.id.as_str()) => result,
            Ok(()) = &mut cancel_rx => {
                return self.cancelled(&session, channel).await;
            }
        };

        if let Err(e) = opened {
            self.observer.on_channel_failure(&e);
            match self.config.progress.on_channel_failure {
                ChannelFailurePolicy::Degrade => {
                    warn!("Continuing without live progress: {}", e);
                }
                ChannelFailurePolicy::FailFast => {
                    error!("Aborting session {}: {}", session.id, e);
                    channel.close().await;
                    self.inner.release(&session.id);
                    return self.fail(FailureStage::Channel, CHANNEL_FAILED_MESSAGE);
                }
            }
        }

        self.transition(WorkflowState::Submitting {
            session_id: session.id.clone(),
        });
        let request = SubmissionRequest {
            session_id: session.id.to_string(),
            file: session.file.clone(),
            enable_summary: session.options.enable_summary,
            api_key: session
                .options
                .api_key
                .clone()
                .filter(|_| session.options.enable_summary),
        };
        let submission = self.submitter.submit(request);
        self.transition(WorkflowState::InProgress {
            session_id: session.id.clone(),
        });

        let outcome = tokio::select! {
            outcome = submission => outcome,
            Ok(()) = &mut cancel_rx => {
                return self.cancelled(&session, channel).await;
            }
        };

        let elapsed = Utc::now().signed_duration_since(session.started_at);

        match outcome {
            Ok(response) => {
                info!(
                    "Session {} succeeded in {:.1}s",
                    session.id,
                    elapsed.num_milliseconds() as f64 / 1000.0
                );
                let transcription =
                    Transcription::from_response(response, session.options.enable_summary);
                self.schedule_teardown(&session.id, channel);
                self.transition(WorkflowState::Succeeded {
                    session_id: session.id.clone(),
                });
                self.deliver(WorkflowResult::Success(transcription))
            }
            Err(e) => {
                error!("Session {} failed: {}", session.id, e);
                // No further progress is expected; no grace delay
                channel.close().await;
                self.inner.release(&session.id);
                self.fail(FailureStage::Submission, SUBMISSION_FAILED_MESSAGE)
            }
        }
    }

    /// Build a channel whose callbacks feed this orchestrator's estimator
    fn progress_channel(&self, session_id: &SessionId) -> ProgressChannel {
        let mut channel = ProgressChannel::new(&self.config.server, &self.config.progress);

        let inner = Arc::clone(&self.inner);
        let observer = Arc::clone(&self.observer);
        let id = session_id.clone();
        channel.on_progress(move |value| {
            let rendered = inner.apply(&id, |estimator| {
                estimator.update(f64::from(value));
                true
            });
            if let Some(state) = rendered {
                observer.on_progress(&state);
            }
        });

        let inner = Arc::clone(&self.inner);
        let observer = Arc::clone(&self.observer);
        let id = session_id.clone();
        channel.on_duration(move |secs| {
            if let Some(state) = inner.apply(&id, |estimator| estimator.record_duration(secs)) {
                observer.on_progress(&state);
            }
        });

        let observer = Arc::clone(&self.observer);
        let id = session_id.clone();
        channel.on_failure(move |e| {
            warn!("Live progress lost for session {}: {}", id, e);
            observer.on_channel_failure(&e);
        });

        channel
    }

    /// Close the channel after the grace delay so a final in-flight
    /// progress event can still be rendered.
    fn schedule_teardown(&self, session_id: &SessionId, mut channel: ProgressChannel) {
        let grace = self.config.progress.teardown_grace();
        let inner = Arc::clone(&self.inner);
        let session_id = session_id.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            channel.close().await;
            inner.release(&session_id);
            debug!("Progress channel for session {} torn down", session_id);
        });

        if let Some(previous) = lock(&self.inner.teardown).replace(handle) {
            debug!("Detaching earlier teardown task");
            drop(previous);
        }
    }

    async fn cancelled(&self, session: &Session, mut channel: ProgressChannel) -> WorkflowResult {
        info!("Session {} cancelled", session.id);
        self.inner.release(&session.id);
        channel.close().await;
        self.fail(FailureStage::Cancelled, CANCELLED_MESSAGE)
    }

    fn fail(&self, stage: FailureStage, message: impl Into<String>) -> WorkflowResult {
        self.transition(WorkflowState::Failed { stage });
        self.deliver(WorkflowResult::failure(stage, message))
    }

    fn deliver(&self, result: WorkflowResult) -> WorkflowResult {
        lock(&self.inner.cancel_tx).take();
        self.observer.on_result(&result);
        result
    }

    fn transition(&self, next: WorkflowState) {
        debug!("Workflow state: {:?}", next);
        *lock(&self.inner.state) = next.clone();
        self.observer.on_state(&next);
    }
}
