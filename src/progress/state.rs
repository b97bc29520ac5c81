use serde::{Deserialize, Serialize};

/// Display values for one session's progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Current percentage (0..=100)
    pub percentage: u8,

    /// Source audio duration in seconds, set at most once per session
    pub duration_secs: Option<f64>,

    /// Projected seconds until completion, if a positive rate is known
    pub estimated_remaining_secs: Option<u64>,
}

impl ProgressState {
    pub fn is_started(&self) -> bool {
        self.percentage > 0
    }

    pub fn is_complete(&self) -> bool {
        self.percentage >= 100
    }
}
