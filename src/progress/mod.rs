//! Progress estimation
//!
//! Turns the absolute percentages pushed by the processing service into
//! display values: a clamped percentage, the source audio duration and a
//! remaining-time projection.

mod estimator;
mod state;

pub use estimator::ProgressEstimator;
pub use state::ProgressState;

/// Clamp a raw reading into a displayable whole percentage
pub fn clamp_percentage(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, 100.0).round() as u8
}
