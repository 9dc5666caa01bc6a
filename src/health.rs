//! Health check support for the model service.
//!
//! Combines runtime host liveness, the swap state and the shutdown state into
//! liveness, readiness and full health reports.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::models::{SwapState, SwapStatus};
use crate::shutdown::ShutdownState;

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Detailed health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub ready: bool,
    pub accepting_swaps: bool,
    pub host_alive: bool,
    pub model_status: SwapStatus,
    pub current_model: Option<String>,
    pub inference_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub uptime_secs: u64,
}

/// Health check configuration.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Report `Degraded` (and not ready) while no model is loaded.
    pub require_model_loaded: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            require_model_loaded: true,
        }
    }
}

/// Aggregates health information from service components.
pub struct HealthChecker {
    config: HealthConfig,
    start_time: Instant,
}

impl HealthChecker {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
        }
    }

    /// Check liveness: process is responsive.
    pub fn is_alive(&self) -> bool {
        true
    }

    /// Check readiness: a model is serving and the service is not stopping.
    pub fn is_ready(&self, shutdown_state: ShutdownState, host_alive: bool, swap: &SwapState) -> bool {
        if shutdown_state != ShutdownState::Running || !host_alive {
            return false;
        }
        match swap.status {
            SwapStatus::Idle => !self.config.require_model_loaded || swap.current_model.is_some(),
            SwapStatus::Swapping | SwapStatus::Error => false,
        }
    }

    /// Generate full health report.
    pub fn report(&self, shutdown_state: ShutdownState, host_alive: bool, swap: &SwapState) -> HealthReport {
        let (status, reason) = self.compute_state(shutdown_state, host_alive, swap);
        HealthReport {
            status,
            ready: self.is_ready(shutdown_state, host_alive, swap),
            accepting_swaps: shutdown_state == ShutdownState::Running,
            host_alive,
            model_status: swap.status,
            current_model: swap.current_model.as_ref().map(|m| m.name.clone()),
            inference_mode: swap.current_mode().map(str::to_string),
            reason,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    fn compute_state(
        &self,
        shutdown_state: ShutdownState,
        host_alive: bool,
        swap: &SwapState,
    ) -> (HealthState, Option<String>) {
        if shutdown_state != ShutdownState::Running {
            return (HealthState::Unhealthy, Some("shutting down".into()));
        }
        if !host_alive {
            return (HealthState::Unhealthy, Some("runtime host is not responding".into()));
        }
        if swap.status == SwapStatus::Error {
            let reason = swap
                .last_error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "no model loaded".into());
            return (HealthState::Unhealthy, Some(reason));
        }
        if let Some(failure) = swap.last_error.as_ref().filter(|_| swap.is_degraded()) {
            return (
                HealthState::Degraded,
                Some(format!("swap to '{}' failed: {}", failure.requested_model, failure.message)),
            );
        }
        if self.config.require_model_loaded
            && swap.status == SwapStatus::Idle
            && swap.current_model.is_none()
        {
            return (HealthState::Degraded, Some("no model loaded".into()));
        }
        (HealthState::Healthy, None)
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}
