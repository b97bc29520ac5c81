use super::clamp_percentage;
use super::state::ProgressState;
use std::time::Instant;
use tracing::debug;

/// Converts absolute percentage readings into a [`ProgressState`]
///
/// The remaining-time projection uses the rate between the two most
/// recent readings. It is cleared whenever that rate is zero, negative or
/// undefined, so a stalled signal never leaves a frozen countdown behind.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    state: ProgressState,
    last_value: u8,
    last_time: Instant,
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self::new_at(Instant::now())
    }

    pub fn new_at(now: Instant) -> Self {
        Self {
            state: ProgressState::default(),
            last_value: 0,
            last_time: now,
        }
    }

    /// Current display values
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Record a raw percentage reading taken now
    pub fn update(&mut self, raw: f64) -> &ProgressState {
        self.update_at(raw, Instant::now())
    }

    /// Record a raw percentage reading taken at `now`
    pub fn update_at(&mut self, raw: f64, now: Instant) -> &ProgressState {
        let value = clamp_percentage(raw);

        // Zero elapsed time also covers readings stamped before the anchor
        let elapsed = now.saturating_duration_since(self.last_time).as_secs_f64();

        self.state.estimated_remaining_secs = if elapsed > 0.0 {
            let rate = (f64::from(value) - f64::from(self.last_value)) / elapsed;
            if rate > 0.0 {
                Some(((100.0 - f64::from(value)) / rate).round() as u64)
            } else {
                None
            }
        } else {
            None
        };

        debug!(
            "Progress {}% (eta={:?})",
            value, self.state.estimated_remaining_secs
        );

        self.state.percentage = value;
        self.last_value = value;
        self.last_time = now;

        &self.state
    }

    /// Record the source duration; only the first positive value is kept.
    ///
    /// Returns whether the duration was recorded.
    pub fn record_duration(&mut self, secs: f64) -> bool {
        if self.state.duration_secs.is_some() || !secs.is_finite() || secs <= 0.0 {
            return false;
        }
        self.state.duration_secs = Some(secs);
        true
    }

    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    /// Return to the zero state, anchoring the next rate computation at `now`
    pub fn reset_at(&mut self, now: Instant) {
        self.state = ProgressState::default();
        self.last_value = 0;
        self.last_time = now;
    }
}

impl Default for ProgressEstimator {
    fn default() -> Self {
        Self::new()
    }
}
