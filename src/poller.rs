//! Bounded polling of swap status until a swap reaches a terminal state.
//!
//! A swap request returns before the swap finishes, so callers poll the
//! status until the requested model is active, the service has fallen back
//! to the default model, the swap was cancelled, nothing is loaded, or the
//! attempt budget runs out.
//! The total wait never exceeds `interval * max_attempts`.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::StatusResponse;
use crate::models::{FailureStage, SwapCoordinator, SwapRequest, SwapStatus};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("status unavailable: {0}")]
pub struct StatusUnavailable(pub String);

/// Anything that can report the current swap status.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self) -> Result<StatusResponse, StatusUnavailable>;
}

#[async_trait]
impl StatusSource for SwapCoordinator {
    async fn fetch_status(&self) -> Result<StatusResponse, StatusUnavailable> {
        Ok(StatusResponse::from(&self.get_status()))
    }
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 40,
        }
    }
}

impl PollConfig {
    /// Upper bound on the time spent in [`StatusPoller::poll`].
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Terminal result of polling one swap.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The requested model is loaded in the requested mode.
    Satisfied(StatusResponse),
    /// The swap failed and a different model (the default) is serving.
    RecoveredToFallback(StatusResponse),
    /// The swap was cancelled before anything was unloaded; the model that
    /// was active before the request is still serving.
    KeptPrevious(StatusResponse),
    /// The swap failed and no model is loaded.
    NothingLoaded(StatusResponse),
    /// No terminal state was seen within the attempt budget.
    TimedOut {
        attempts: u32,
        waited: Duration,
        last_seen: Option<StatusResponse>,
    },
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Satisfied(_))
    }

    /// Whether someone has to intervene before models can be used again.
    pub fn requires_operator(&self) -> bool {
        matches!(self, PollOutcome::NothingLoaded(_))
    }

    /// User-facing description of the outcome for `request`.
    pub fn message(&self, request: &SwapRequest) -> String {
        match self {
            PollOutcome::Satisfied(_) => format!(
                "Model '{}' is active in mode '{}'.",
                request.model_name, request.inference_mode
            ),
            PollOutcome::RecoveredToFallback(status) => {
                let current = status.current_model.as_deref().unwrap_or("<none>");
                let reason = status
                    .last_error
                    .as_ref()
                    .map(|e| format!(" ({})", e.message))
                    .unwrap_or_default();
                format!(
                    "Switching to '{}' failed{}; the service recovered to default model '{}'.",
                    request.model_name, reason, current
                )
            }
            PollOutcome::KeptPrevious(status) => {
                let current = status.current_model.as_deref().unwrap_or("<none>");
                let reason = status
                    .last_error
                    .as_ref()
                    .map(|e| format!(" ({})", e.message))
                    .unwrap_or_default();
                format!(
                    "Switching to '{}' was cancelled{}; model '{}' is still active.",
                    request.model_name, reason, current
                )
            }
            PollOutcome::NothingLoaded(status) => {
                let reason = status
                    .last_error
                    .as_ref()
                    .map(|e| format!(" ({})", e.message))
                    .unwrap_or_default();
                format!(
                    "Switching to '{}' failed{} and no model is loaded. Operator attention is required.",
                    request.model_name, reason
                )
            }
            PollOutcome::TimedOut { waited, .. } => format!(
                "Timed out after {}s waiting for '{}' to load.",
                waited.as_secs(),
                request.model_name
            ),
        }
    }
}

/// Classify a status snapshot against the request. `None` means keep polling.
fn classify(status: &StatusResponse, request: &SwapRequest) -> Option<PollOutcome> {
    match status.status {
        SwapStatus::Idle if status.is_active(&request.model_name, &request.inference_mode) => {
            Some(PollOutcome::Satisfied(status.clone()))
        }
        SwapStatus::Idle => match status.last_error.as_ref().map(|e| e.stage) {
            Some(FailureStage::Drain) => Some(PollOutcome::KeptPrevious(status.clone())),
            Some(_) => Some(PollOutcome::RecoveredToFallback(status.clone())),
            None => None,
        },
        SwapStatus::Error => Some(PollOutcome::NothingLoaded(status.clone())),
        SwapStatus::Swapping => None,
    }
}

pub struct StatusPoller {
    config: PollConfig,
}

impl StatusPoller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `source` until `request` reaches a terminal outcome.
    ///
    /// A failed fetch counts as an attempt.
    pub async fn poll<S>(&self, source: &S, request: &SwapRequest) -> PollOutcome
    where
        S: StatusSource + ?Sized,
    {
        let started = Instant::now();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0u32;
        let mut last_seen: Option<StatusResponse> = None;

        let polling = async {
            while attempts < max_attempts {
                attempts += 1;
                match source.fetch_status().await {
                    Ok(status) => {
                        if let Some(outcome) = classify(&status, request) {
                            return Some(outcome);
                        }
                        debug!(attempt = attempts, status = ?status.status, "swap not settled yet");
                        last_seen = Some(status);
                    }
                    Err(e) => debug!(attempt = attempts, error = %e, "status fetch failed"),
                }
                if attempts < max_attempts {
                    tokio::time::sleep(self.config.interval).await;
                }
            }
            None
        };
        let result = tokio::time::timeout(self.config.max_wait(), polling).await;

        match result {
            Ok(Some(outcome)) => {
                info!(model = %request.model_name, success = outcome.is_success(), "swap settled");
                outcome
            }
            Ok(None) | Err(_) => {
                let waited = started.elapsed();
                warn!(
                    model = %request.model_name,
                    attempts,
                    waited_secs = waited.as_secs(),
                    "gave up waiting for swap"
                );
                PollOutcome::TimedOut {
                    attempts,
                    waited,
                    last_seen,
                }
            }
        }
    }
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self::new(PollConfig::default())
    }
}
