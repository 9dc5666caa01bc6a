//! Model management for the VLM service.
//!
//! Handles catalog parsing, the model registry, the runtime host contract and
//! hot-swap coordination.

pub mod catalog;
pub mod profile;

mod drain;
mod host;
mod process_host;
mod registry;
mod swap;

pub use catalog::{Catalog, CatalogError, EngineArgs, LauncherConfig, DEFAULT_MODE};
pub use drain::{DrainError, FlightGuard, FlightTracker};
pub use host::{HostError, ModelHost};
pub use process_host::ProcessHost;
pub use profile::{LaunchProfile, ModelFamily};
pub use registry::{InferenceMode, ModelDescriptor, ModelRegistry, RegistryError};
pub use swap::{
    FailureStage, InferencePermit, SwapAccepted, SwapConfig, SwapCoordinator, SwapError,
    SwapFailure, SwapRequest, SwapState, SwapStatus,
};
