//! Graceful shutdown coordination for the model service.
//!
//! Shutdown never cancels a swap. It stops accepting new swaps and inference,
//! waits for an in-flight swap to reach a terminal state, drains inference,
//! then unloads the model.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::models::SwapCoordinator;

/// Shutdown state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

/// Result of a shutdown operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    /// A swap was still running when the timeout elapsed; the model was left
    /// in place.
    SwapTimeout,
    /// Inference was still running when the timeout elapsed; the model was
    /// unloaded anyway.
    DrainTimeout { remaining: u32 },
    UnloadFailed(String),
}

/// Coordinates graceful shutdown across service components.
pub struct ShutdownCoordinator {
    state: Arc<RwLock<ShutdownState>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ShutdownState::Running)),
        }
    }

    /// Get current shutdown state.
    pub async fn state(&self) -> ShutdownState {
        *self.state.read().await
    }

    /// Check if still running.
    pub fn is_running(&self) -> bool {
        // Use try_read to avoid blocking
        self.state
            .try_read()
            .map(|s| *s == ShutdownState::Running)
            .unwrap_or(false)
    }

    /// Initiate shutdown. `timeout` bounds the wait for a swap and for
    /// inference separately.
    pub async fn initiate(&self, swaps: &SwapCoordinator, timeout: Duration) -> ShutdownResult {
        {
            let mut state = self.state.write().await;
            if *state != ShutdownState::Running {
                return ShutdownResult::Complete;
            }
            *state = ShutdownState::Draining;
        }

        swaps.stop_accepting();
        info!(timeout_secs = timeout.as_secs(), "shutdown started");

        let result = self.drain(swaps, timeout).await;

        {
            let mut state = self.state.write().await;
            *state = ShutdownState::Stopped;
        }
        info!(result = ?result, "shutdown finished");
        result
    }

    async fn drain(&self, swaps: &SwapCoordinator, timeout: Duration) -> ShutdownResult {
        if swaps.wait_settled(timeout).await.is_none() {
            warn!("model swap still running at shutdown timeout, leaving model in place");
            return ShutdownResult::SwapTimeout;
        }

        let drained = swaps.drain_inference(timeout).await;
        if let Err(e) = &drained {
            warn!(error = %e, "unloading with inference still in flight");
        }

        if let Err(e) = swaps.unload_for_shutdown().await {
            warn!(error = %e, "failed to unload model at shutdown");
            return ShutdownResult::UnloadFailed(e.to_string());
        }

        match drained {
            Ok(()) => ShutdownResult::Complete,
            Err(crate::models::DrainError::Timeout { remaining }) => {
                ShutdownResult::DrainTimeout { remaining }
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
