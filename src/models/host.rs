//! Contract for the runtime host that owns the loaded model.

use async_trait::async_trait;
use thiserror::Error;

use super::registry::ModelDescriptor;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("unload failed: {0}")]
    UnloadFailed(String),

    #[error("load of '{model}' failed: {reason}")]
    LoadFailed { model: String, reason: String },

    #[error("runtime host unreachable: {0}")]
    Unreachable(String),
}

/// The slow, resource-heavy engine holding at most one model.
///
/// Calls are only made by the swap coordinator, which serializes them.
#[async_trait]
pub trait ModelHost: Send + Sync {
    /// Release the loaded model, if any. Succeeds when nothing is loaded.
    async fn unload_current(&self) -> Result<(), HostError>;

    /// Load `descriptor`. May take tens of seconds.
    async fn load(&self, descriptor: &ModelDescriptor) -> Result<(), HostError>;

    /// Cheap liveness probe, independent of swap status.
    async fn health_check(&self) -> bool;
}
