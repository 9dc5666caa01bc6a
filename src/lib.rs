//! VLM-CORE model service
//!
//! Owns a single vision-language model slot and lets a control plane swap
//! which model occupies it while status reads and inference gating keep
//! working.
//!
//! # Components
//!
//! - **Registry**: read-only catalogue of inference modes and models
//!   ([`models::ModelRegistry`]), loaded from a TOML catalog.
//! - **Runtime host**: the slow engine behind [`models::ModelHost`].
//! - **Swap coordinator**: the swap state machine ([`models::SwapCoordinator`]).
//!   One swap at a time, atomic status snapshots, rollback to the default
//!   model on failure.
//! - **Status poller**: bounded client-side polling ([`poller::StatusPoller`]).
//!
//! The HTTP surface lives in [`api`], the operator CLI in [`cli`].

pub mod api;
pub mod cli;
pub mod config;
pub mod health;
pub mod models;
pub mod poller;
pub mod shutdown;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use health::{HealthChecker, HealthConfig, HealthReport};
use models::{
    Catalog, CatalogError, InferencePermit, ModelHost, ModelRegistry, SwapConfig, SwapCoordinator,
    SwapError,
};
use shutdown::{ShutdownCoordinator, ShutdownResult};

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub swap: SwapConfig,
    /// Estimate returned to callers when a swap starts.
    pub swap_eta: Duration,
    pub shutdown_timeout: Duration,
    pub health: HealthConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            swap: SwapConfig::default(),
            swap_eta: Duration::from_secs(45),
            shutdown_timeout: Duration::from_secs(30),
            health: HealthConfig::default(),
        }
    }
}

impl From<&config::EnvConfig> for ServiceConfig {
    fn from(env: &config::EnvConfig) -> Self {
        Self {
            swap: env.swap.clone(),
            swap_eta: env.swap_eta,
            shutdown_timeout: env.shutdown_timeout,
            health: HealthConfig::default(),
        }
    }
}

/// The model service instance.
pub struct ModelService {
    coordinator: SwapCoordinator,
    health: HealthChecker,
    shutdown: ShutdownCoordinator,
    config: ServiceConfig,
}

impl ModelService {
    pub fn new(registry: Arc<ModelRegistry>, host: Arc<dyn ModelHost>, config: ServiceConfig) -> Self {
        let coordinator = SwapCoordinator::new(registry, host, config.swap.clone());
        Self {
            coordinator,
            health: HealthChecker::new(config.health.clone()),
            shutdown: ShutdownCoordinator::new(),
            config,
        }
    }

    /// Build the registry from `catalog` and create the service.
    pub fn from_catalog(
        catalog: &Catalog,
        host: Arc<dyn ModelHost>,
        config: ServiceConfig,
    ) -> Result<Self, CatalogError> {
        let registry = Arc::new(ModelRegistry::from_catalog(catalog)?);
        Ok(Self::new(registry, host, config))
    }

    pub fn coordinator(&self) -> &SwapCoordinator {
        &self.coordinator
    }

    pub fn swap_eta(&self) -> Duration {
        self.config.swap_eta
    }

    /// Gate for inference pipelines: hold the permit while using the model.
    pub fn begin_inference(&self) -> Result<InferencePermit, SwapError> {
        self.coordinator.begin_inference()
    }

    pub async fn health_report(&self) -> HealthReport {
        let host_alive = self.coordinator.host().health_check().await;
        let state = self.shutdown.state().await;
        self.health.report(state, host_alive, &self.coordinator.get_status())
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    /// Stop accepting swaps, let a running swap finish, then unload.
    pub async fn shutdown(&self) -> ShutdownResult {
        self.shutdown
            .initiate(&self.coordinator, self.config.shutdown_timeout)
            .await
    }
}
