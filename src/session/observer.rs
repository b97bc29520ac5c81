use super::orchestrator::WorkflowState;
use super::result::WorkflowResult;
use crate::error::ChannelError;
use crate::progress::ProgressState;

/// Presentation-layer hooks
///
/// Called from the orchestrator's tasks; implementations should return
/// quickly and must not block.
pub trait SessionObserver: Send + Sync {
    /// Live progress for the current session
    fn on_progress(&self, _progress: &ProgressState) {}

    /// Every workflow state transition
    fn on_state(&self, _state: &WorkflowState) {}

    /// Live progress is unavailable; the workflow continues
    fn on_channel_failure(&self, _error: &ChannelError) {}

    /// Invoked exactly once per workflow with its terminal result
    fn on_result(&self, result: &WorkflowResult);
}
