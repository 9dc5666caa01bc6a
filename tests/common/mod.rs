//! Shared fixtures for integration tests: a scripted runtime host and a
//! small catalog.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use vlm_core::models::{
    Catalog, HostError, ModelDescriptor, ModelHost, ModelRegistry, SwapConfig, SwapCoordinator,
    SwapState,
};
use vlm_core::{ModelService, ServiceConfig};

pub const DEFAULT_MODEL: &str = "qwen-vl";
pub const OTHER_MODEL: &str = "glm-4v";
pub const HYBRID_MODEL: &str = "smoldocling";

pub const CATALOG: &str = r#"
default_model = "qwen-vl"
default_mode = "one_shot"

[common]
gpu_memory_utilization = 0.8
max_model_len = 8192

[inference_modes.one_shot]
display_name = "One-Shot"

[inference_modes.one_shot.models.qwen-vl]
display_name = "Qwen VL"

[inference_modes.one_shot.models.glm-4v]
display_name = "GLM-4V"

[inference_modes.one_shot.models.retired]
enabled = false

[inference_modes.hybrid]
display_name = "Hybrid"
default_type = "vision_ocr"

[inference_modes.hybrid.models.smoldocling]
max_model_len = 4096

[inference_modes.hybrid.models.qwen-vl]
display_name = "Qwen VL (hybrid)"
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Unload,
    Load(String),
}

/// In-memory host whose failures and timing are set by the test.
#[derive(Default)]
pub struct ScriptedHost {
    calls: Mutex<Vec<HostCall>>,
    loaded: Mutex<Option<String>>,
    failing_loads: Mutex<HashSet<String>>,
    unload_failures: AtomicU32,
    load_delay: Mutex<Duration>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    dead: AtomicBool,
}

impl ScriptedHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every load of `model` fail.
    pub fn fail_load(&self, model: &str) {
        self.failing_loads.lock().insert(model.to_string());
    }

    /// Make the next `n` unload calls fail.
    pub fn fail_unloads(&self, n: u32) {
        self.unload_failures.store(n, Ordering::SeqCst);
    }

    pub fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock() = delay;
    }

    /// Block every later load until the returned semaphore gets a permit.
    pub fn hold_loads(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn set_dead(&self, dead: bool) {
        self.dead.store(dead, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn loaded(&self) -> Option<String> {
        self.loaded.lock().clone()
    }
}

#[async_trait]
impl ModelHost for ScriptedHost {
    async fn unload_current(&self) -> Result<(), HostError> {
        self.calls.lock().push(HostCall::Unload);
        let failures = self.unload_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.unload_failures.store(failures - 1, Ordering::SeqCst);
            return Err(HostError::UnloadFailed("device busy".into()));
        }
        *self.loaded.lock() = None;
        Ok(())
    }

    async fn load(&self, descriptor: &ModelDescriptor) -> Result<(), HostError> {
        self.calls.lock().push(HostCall::Load(descriptor.name.clone()));

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let delay = *self.load_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing_loads.lock().contains(&descriptor.name) {
            return Err(HostError::LoadFailed {
                model: descriptor.name.clone(),
                reason: "CUDA out of memory".into(),
            });
        }
        *self.loaded.lock() = Some(descriptor.name.clone());
        Ok(())
    }

    async fn health_check(&self) -> bool {
        !self.dead.load(Ordering::SeqCst)
    }
}

pub fn registry() -> Arc<ModelRegistry> {
    let catalog = Catalog::from_toml(CATALOG).expect("catalog parses");
    Arc::new(ModelRegistry::from_catalog(&catalog).expect("catalog is valid"))
}

pub fn swap_config() -> SwapConfig {
    SwapConfig {
        load_timeout: Duration::from_secs(5),
        unload_timeout: Duration::from_secs(5),
        drain_timeout: Duration::from_millis(200),
    }
}

pub fn coordinator(host: Arc<ScriptedHost>) -> SwapCoordinator {
    SwapCoordinator::new(registry(), host, swap_config())
}

/// Coordinator with the default model already loaded.
pub async fn ready_coordinator(host: Arc<ScriptedHost>) -> SwapCoordinator {
    let coordinator = coordinator(host.clone());
    coordinator.initialize().await;
    host.clear_calls();
    coordinator
}

pub fn service(host: Arc<ScriptedHost>) -> ModelService {
    let config = ServiceConfig {
        swap: swap_config(),
        shutdown_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    ModelService::new(registry(), host, config)
}

/// Wait for the running swap to reach a terminal state.
pub async fn settle(coordinator: &SwapCoordinator) -> SwapState {
    coordinator
        .wait_settled(Duration::from_secs(10))
        .await
        .expect("swap did not settle")
}

/// Let spawned tasks run until `cond` holds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
