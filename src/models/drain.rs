//! In-flight inference tracking for drain coordination.
//!
//! Inference callers hold a [`FlightGuard`] while they use the loaded model.
//! Before a swap unloads the model it waits for the count to reach zero.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DrainError {
    #[error("drain timed out with {remaining} inference request(s) in flight")]
    Timeout { remaining: u32 },
}

/// Counts inference requests currently using the loaded model.
#[derive(Debug, Default)]
pub struct FlightTracker {
    in_flight: Arc<AtomicU32>,
}

impl FlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the in-flight count (returns RAII guard).
    pub fn track(&self) -> FlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        FlightGuard {
            counter: self.in_flight.clone(),
        }
    }

    pub fn in_flight_count(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until the in-flight count reaches zero (with timeout).
    pub async fn drain(&self, timeout: Duration) -> Result<(), DrainError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let poll_interval = Duration::from_millis(10);

        loop {
            let count = self.in_flight_count();
            if count == 0 {
                return Ok(());
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(DrainError::Timeout { remaining: count });
            }

            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// RAII guard that decrements the in-flight count on drop.
#[derive(Debug)]
pub struct FlightGuard {
    counter: Arc<AtomicU32>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
