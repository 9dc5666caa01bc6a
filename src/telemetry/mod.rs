//! Telemetry for the model service.
//!
//! Structured logging through `tracing` and swap metrics through the
//! `metrics` facade.

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    record_model_loaded, record_swap_finished, record_swap_rejected, record_swap_started,
    SwapOutcomeLabel,
};
