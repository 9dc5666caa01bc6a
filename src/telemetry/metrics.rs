//! Swap metrics recorded through the `metrics` facade.
//!
//! Nothing is exported unless the embedding process installs a recorder.

use std::time::Duration;

/// Terminal result of a background swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcomeLabel {
    Succeeded,
    Recovered,
    Failed,
    Aborted,
}

impl SwapOutcomeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapOutcomeLabel::Succeeded => "succeeded",
            SwapOutcomeLabel::Recovered => "recovered",
            SwapOutcomeLabel::Failed => "failed",
            SwapOutcomeLabel::Aborted => "aborted",
        }
    }
}

pub fn record_swap_started() {
    metrics::counter!("vlm_swaps_started_total").increment(1);
}

/// Record a synchronously rejected swap request.
pub fn record_swap_rejected(reason: &'static str) {
    metrics::counter!("vlm_swap_rejections_total", "reason" => reason).increment(1);
}

pub fn record_swap_finished(outcome: SwapOutcomeLabel, elapsed: Duration) {
    metrics::counter!("vlm_swaps_total", "outcome" => outcome.as_str()).increment(1);
    metrics::histogram!("vlm_swap_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_model_loaded(loaded: bool) {
    metrics::gauge!("vlm_model_loaded").set(if loaded { 1.0 } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(SwapOutcomeLabel::Succeeded.as_str(), "succeeded");
        assert_eq!(SwapOutcomeLabel::Recovered.as_str(), "recovered");
        assert_eq!(SwapOutcomeLabel::Failed.as_str(), "failed");
        assert_eq!(SwapOutcomeLabel::Aborted.as_str(), "aborted");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_swap_started();
        record_swap_rejected("swap_in_progress");
        record_swap_finished(SwapOutcomeLabel::Succeeded, Duration::from_millis(5));
        record_model_loaded(true);
    }
}
