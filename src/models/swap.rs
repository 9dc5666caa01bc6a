//! Hot-swap coordination for the single model slot.
//!
//! At most one swap runs at a time. An accepted swap drains in-flight
//! inference, unloads the current model and loads the target on a
//! background task. If unload or load fails, the fallback model is
//! restored; if that fails too, the slot is left empty in `Error`. When
//! the unload fails twice, no fallback load is attempted.
//!
//! State is published through a `watch` channel: every transition replaces
//! the whole [`SwapState`], so readers never see a half-applied update and
//! never wait on the swap itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::catalog::DEFAULT_MODE;
use super::drain::{DrainError, FlightGuard, FlightTracker};
use super::host::{HostError, ModelHost};
use super::registry::{ModelDescriptor, ModelRegistry};
use crate::telemetry::{self, SwapOutcomeLabel};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    #[error("model '{model}' is not available in inference mode '{mode}'")]
    Validation { model: String, mode: String },

    #[error("a model swap is already in progress")]
    SwapInProgress,

    #[error("service is shutting down")]
    ShuttingDown,

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
}

impl SwapError {
    fn reason(&self) -> &'static str {
        match self {
            SwapError::Validation { .. } => "validation",
            SwapError::SwapInProgress => "swap_in_progress",
            SwapError::ShuttingDown => "shutting_down",
            SwapError::ModelUnavailable(_) => "model_unavailable",
        }
    }
}

/// Coarse status of the model slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Idle,
    Swapping,
    Error,
}

/// Step of a swap that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Drain,
    Unload,
    Load,
    Fallback,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Drain => "drain",
            FailureStage::Unload => "unload",
            FailureStage::Load => "load",
            FailureStage::Fallback => "fallback",
        }
    }
}

/// Why the last requested swap did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapFailure {
    pub stage: FailureStage,
    pub requested_model: String,
    pub requested_mode: String,
    pub message: String,
    /// True when a working model is loaded despite the failure.
    pub recovered: bool,
}

impl SwapFailure {
    fn new(stage: FailureStage, requested: &ModelDescriptor, message: String, recovered: bool) -> Self {
        Self {
            stage,
            requested_model: requested.name.clone(),
            requested_mode: requested.mode.clone(),
            message,
            recovered,
        }
    }
}

/// A request to make `model_name` in `inference_mode` the loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub model_name: String,
    #[serde(default = "default_mode")]
    pub inference_mode: String,
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

impl SwapRequest {
    pub fn new(model_name: impl Into<String>, inference_mode: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            inference_mode: inference_mode.into(),
        }
    }
}

/// Snapshot of the model slot.
///
/// - `Idle`: `current_model` is what the host has loaded (possibly none).
///   `last_error` set means a requested swap failed and the fallback was
///   restored.
/// - `Swapping`: `current_model` is the model being replaced, `target` the
///   model being loaded.
/// - `Error`: no usable model; `target` is the model last attempted.
#[derive(Debug, Clone)]
pub struct SwapState {
    pub current_model: Option<Arc<ModelDescriptor>>,
    pub status: SwapStatus,
    pub last_error: Option<SwapFailure>,
    pub target: Option<Arc<ModelDescriptor>>,
    pub swap_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl SwapState {
    fn empty() -> Self {
        Self {
            current_model: None,
            status: SwapStatus::Idle,
            last_error: None,
            target: None,
            swap_id: None,
            updated_at: Utc::now(),
        }
    }

    pub fn current_mode(&self) -> Option<&str> {
        self.current_model.as_deref().map(|m| m.mode.as_str())
    }

    /// True if `model` is loaded and usable.
    pub fn is_active(&self, model: &ModelDescriptor) -> bool {
        self.status == SwapStatus::Idle
            && self
                .current_model
                .as_deref()
                .map_or(false, |current| current.is(&model.name, &model.mode))
    }

    /// Idle on the fallback after a failed swap.
    pub fn is_degraded(&self) -> bool {
        self.status == SwapStatus::Idle && self.last_error.is_some()
    }
}

/// Result of an accepted swap request.
#[derive(Debug, Clone)]
pub enum SwapAccepted {
    /// A background swap was started.
    Started {
        swap_id: Uuid,
        target: Arc<ModelDescriptor>,
    },
    /// The requested model is already loaded; nothing changed.
    AlreadyActive { model: Arc<ModelDescriptor> },
}

/// Timeouts applied to host calls and inference drain.
#[derive(Debug, Clone)]
pub struct SwapConfig {
    pub load_timeout: Duration,
    pub unload_timeout: Duration,
    pub drain_timeout: Duration,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(300),
            unload_timeout: Duration::from_secs(60),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Permission to run inference against the loaded model.
///
/// While any permit is alive, a swap waits (up to the drain timeout)
/// before unloading.
#[derive(Debug)]
pub struct InferencePermit {
    model: Arc<ModelDescriptor>,
    _flight: FlightGuard,
}

impl InferencePermit {
    pub fn model(&self) -> &ModelDescriptor {
        &self.model
    }
}

enum Begin {
    Started {
        swap_id: Uuid,
        from: Option<Arc<ModelDescriptor>>,
    },
    AlreadyActive(Arc<ModelDescriptor>),
}

/// Serializes swaps against the runtime host and owns the swap state.
#[derive(Clone)]
pub struct SwapCoordinator {
    state: Arc<watch::Sender<SwapState>>,
    registry: Arc<ModelRegistry>,
    host: Arc<dyn ModelHost>,
    flights: Arc<FlightTracker>,
    config: SwapConfig,
    accepting: Arc<AtomicBool>,
}

impl SwapCoordinator {
    pub fn new(registry: Arc<ModelRegistry>, host: Arc<dyn ModelHost>, config: SwapConfig) -> Self {
        let (state, _) = watch::channel(SwapState::empty());
        Self {
            state: Arc::new(state),
            registry,
            host,
            flights: Arc::new(FlightTracker::new()),
            config,
            accepting: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn host(&self) -> &Arc<dyn ModelHost> {
        &self.host
    }

    /// Current snapshot. Never waits on an in-flight swap.
    pub fn get_status(&self) -> SwapState {
        self.state.borrow().clone()
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SwapState> {
        self.state.subscribe()
    }

    /// Validate and start a swap. Returns without waiting for completion.
    ///
    /// Failures after acceptance are only visible through [`get_status`].
    ///
    /// [`get_status`]: SwapCoordinator::get_status
    pub fn submit(&self, request: &SwapRequest) -> Result<SwapAccepted, SwapError> {
        let target = match self.registry.resolve(&request.model_name, &request.inference_mode) {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "swap request rejected");
                let err = SwapError::Validation {
                    model: request.model_name.clone(),
                    mode: request.inference_mode.clone(),
                };
                telemetry::record_swap_rejected(err.reason());
                return Err(err);
            }
        };

        match self.try_begin(&target) {
            Ok(Begin::AlreadyActive(model)) => {
                info!(model = %model.name, mode = %model.mode, "requested model already active");
                Ok(SwapAccepted::AlreadyActive { model })
            }
            Ok(Begin::Started { swap_id, from }) => {
                telemetry::record_swap_started();
                info!(
                    %swap_id,
                    from = from.as_deref().map(|m| m.name.as_str()).unwrap_or("<none>"),
                    to = %target.name,
                    mode = %target.mode,
                    "model swap started"
                );
                let this = self.clone();
                let to = target.clone();
                tokio::spawn(async move { this.run_swap(swap_id, from, to).await });
                Ok(SwapAccepted::Started { swap_id, target })
            }
            Err(e) => {
                warn!(model = %target.name, error = %e, "swap request rejected");
                telemetry::record_swap_rejected(e.reason());
                Err(e)
            }
        }
    }

    /// Load the fallback model into an empty slot at startup.
    ///
    /// On failure the slot is left in `Error`. Returns the final snapshot.
    pub async fn initialize(&self) -> SwapState {
        let fallback = self.registry.fallback();
        if let Ok(Begin::Started { swap_id, .. }) = self.try_begin(&fallback) {
            info!(%swap_id, model = %fallback.name, "loading default model");
            let started = Instant::now();
            match self.load(&fallback).await {
                Ok(()) => {
                    info!(%swap_id, model = %fallback.name, "default model loaded");
                    self.publish(|state| {
                        state.status = SwapStatus::Idle;
                        state.current_model = Some(fallback.clone());
                        state.target = None;
                    });
                    telemetry::record_model_loaded(true);
                    telemetry::record_swap_finished(SwapOutcomeLabel::Succeeded, started.elapsed());
                }
                Err(e) => {
                    error!(%swap_id, model = %fallback.name, error = %e, "failed to load default model");
                    let failure = SwapFailure::new(FailureStage::Load, &fallback, e.to_string(), false);
                    self.publish(|state| {
                        state.status = SwapStatus::Error;
                        state.current_model = None;
                        state.target = Some(fallback.clone());
                        state.last_error = Some(failure);
                    });
                    telemetry::record_model_loaded(false);
                    telemetry::record_swap_finished(SwapOutcomeLabel::Failed, started.elapsed());
                }
            }
        }
        self.get_status()
    }

    /// Wait until no swap is in flight. Returns `None` on timeout.
    pub async fn wait_settled(&self, timeout: Duration) -> Option<SwapState> {
        let mut rx = self.state.subscribe();
        let settled = async move {
            loop {
                {
                    let state = rx.borrow_and_update();
                    if state.status != SwapStatus::Swapping {
                        return state.clone();
                    }
                }
                if rx.changed().await.is_err() {
                    return rx.borrow().clone();
                }
            }
        };
        tokio::time::timeout(timeout, settled).await.ok()
    }

    /// Obtain a permit to run inference on the loaded model.
    ///
    /// Rejected while swapping, in `Error`, with nothing loaded, or once
    /// shutdown has begun.
    pub fn begin_inference(&self) -> Result<InferencePermit, SwapError> {
        // Track before reading status: a swap that already drained has
        // published Swapping, so this permit is rejected below.
        let flight = self.flights.track();
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(SwapError::ShuttingDown);
        }
        let state = self.state.borrow();
        match (state.status, state.current_model.as_ref()) {
            (SwapStatus::Idle, Some(model)) => Ok(InferencePermit {
                model: model.clone(),
                _flight: flight,
            }),
            (SwapStatus::Idle, None) => Err(SwapError::ModelUnavailable("no model is loaded".into())),
            (SwapStatus::Swapping, _) => {
                Err(SwapError::ModelUnavailable("a model swap is in progress".into()))
            }
            (SwapStatus::Error, _) => Err(SwapError::ModelUnavailable(
                "model swap failed and no model is loaded".into(),
            )),
        }
    }

    pub fn in_flight_inference(&self) -> u32 {
        self.flights.in_flight_count()
    }

    /// Wait for outstanding inference permits to be released.
    pub async fn drain_inference(&self, timeout: Duration) -> Result<(), DrainError> {
        self.flights.drain(timeout).await
    }

    /// Reject every later swap with `ShuttingDown`.
    pub fn stop_accepting(&self) {
        // Under the state lock so no swap can begin after this returns.
        self.state.send_if_modified(|_| {
            self.accepting.store(false, Ordering::SeqCst);
            false
        });
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Unload the model during shutdown. Call only once settled.
    pub async fn unload_for_shutdown(&self) -> Result<(), HostError> {
        self.unload().await?;
        self.publish(|state| {
            state.status = SwapStatus::Idle;
            state.current_model = None;
            state.target = None;
        });
        telemetry::record_model_loaded(false);
        Ok(())
    }

    /// Atomic check-and-transition into `Swapping`.
    fn try_begin(&self, target: &Arc<ModelDescriptor>) -> Result<Begin, SwapError> {
        let swap_id = Uuid::new_v4();
        let mut decision = Err(SwapError::SwapInProgress);
        self.state.send_if_modified(|state| {
            if !self.accepting.load(Ordering::SeqCst) {
                decision = Err(SwapError::ShuttingDown);
                return false;
            }
            match state.status {
                SwapStatus::Swapping => false,
                SwapStatus::Idle if state.is_active(target) => {
                    decision = Ok(Begin::AlreadyActive(target.clone()));
                    false
                }
                SwapStatus::Idle | SwapStatus::Error => {
                    decision = Ok(Begin::Started {
                        swap_id,
                        from: state.current_model.clone(),
                    });
                    state.status = SwapStatus::Swapping;
                    state.target = Some(target.clone());
                    state.swap_id = Some(swap_id);
                    state.last_error = None;
                    state.updated_at = Utc::now();
                    true
                }
            }
        });
        decision
    }

    async fn run_swap(
        self,
        swap_id: Uuid,
        from: Option<Arc<ModelDescriptor>>,
        target: Arc<ModelDescriptor>,
    ) {
        let started = Instant::now();

        if let Err(DrainError::Timeout { remaining }) =
            self.flights.drain(self.config.drain_timeout).await
        {
            // Nothing was unloaded yet, so the old model is still good.
            warn!(%swap_id, remaining, "inference drain timed out; swap aborted");
            let failure = SwapFailure::new(
                FailureStage::Drain,
                &target,
                format!("{} inference request(s) still in flight", remaining),
                true,
            );
            self.publish(|state| {
                state.status = SwapStatus::Idle;
                state.current_model = from;
                state.target = None;
                state.last_error = Some(failure);
            });
            telemetry::record_swap_finished(SwapOutcomeLabel::Aborted, started.elapsed());
            return;
        }

        let result = match self.unload().await {
            Ok(()) => self.load(&target).await.map_err(|e| (FailureStage::Load, e)),
            Err(e) => Err((FailureStage::Unload, e)),
        };

        match result {
            Ok(()) => {
                info!(
                    %swap_id,
                    model = %target.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "model swap completed"
                );
                self.publish(|state| {
                    state.status = SwapStatus::Idle;
                    state.current_model = Some(target);
                    state.target = None;
                    state.last_error = None;
                });
                telemetry::record_model_loaded(true);
                telemetry::record_swap_finished(SwapOutcomeLabel::Succeeded, started.elapsed());
            }
            Err((stage, cause)) => {
                error!(
                    %swap_id,
                    model = %target.name,
                    stage = stage.as_str(),
                    error = %cause,
                    "model swap failed, restoring fallback"
                );
                self.rollback(swap_id, target, stage, cause, started).await;
            }
        }
    }

    async fn rollback(
        &self,
        swap_id: Uuid,
        target: Arc<ModelDescriptor>,
        stage: FailureStage,
        cause: HostError,
        started: Instant,
    ) {
        let fallback = self.registry.fallback();

        if stage == FailureStage::Unload {
            if let Err(retry_err) = self.unload().await {
                // The old engine may still hold the device.
                error!(
                    %swap_id,
                    requested = %target.name,
                    error = %retry_err,
                    "second unload attempt failed, fallback not attempted"
                );
                let failure = SwapFailure::new(
                    FailureStage::Unload,
                    &target,
                    format!(
                        "{}; retry failed: {}; fallback '{}' not attempted, previous engine may still be running",
                        cause, retry_err, fallback.name
                    ),
                    false,
                );
                self.publish(|state| {
                    state.status = SwapStatus::Error;
                    state.current_model = None;
                    state.target = Some(target);
                    state.last_error = Some(failure);
                });
                telemetry::record_model_loaded(false);
                telemetry::record_swap_finished(SwapOutcomeLabel::Failed, started.elapsed());
                return;
            }
        }

        match self.load(&fallback).await {
            Ok(()) => {
                warn!(
                    %swap_id,
                    requested = %target.name,
                    fallback = %fallback.name,
                    "recovered to fallback model"
                );
                let failure = SwapFailure::new(stage, &target, cause.to_string(), true);
                self.publish(|state| {
                    state.status = SwapStatus::Idle;
                    state.current_model = Some(fallback);
                    state.target = None;
                    state.last_error = Some(failure);
                });
                telemetry::record_model_loaded(true);
                telemetry::record_swap_finished(SwapOutcomeLabel::Recovered, started.elapsed());
            }
            Err(fallback_err) => {
                error!(
                    %swap_id,
                    requested = %target.name,
                    fallback = %fallback.name,
                    error = %fallback_err,
                    "fallback load failed, no model loaded; operator attention required"
                );
                let failure = SwapFailure::new(
                    FailureStage::Fallback,
                    &target,
                    format!(
                        "{}; fallback '{}' also failed: {}",
                        cause, fallback.name, fallback_err
                    ),
                    false,
                );
                self.publish(|state| {
                    state.status = SwapStatus::Error;
                    state.current_model = None;
                    state.target = Some(target);
                    state.last_error = Some(failure);
                });
                telemetry::record_model_loaded(false);
                telemetry::record_swap_finished(SwapOutcomeLabel::Failed, started.elapsed());
            }
        }
    }

    async fn unload(&self) -> Result<(), HostError> {
        let timeout = self.config.unload_timeout;
        match tokio::time::timeout(timeout, self.host.unload_current()).await {
            Ok(result) => result,
            Err(_) => Err(HostError::UnloadFailed(format!(
                "no response from runtime host within {}s",
                timeout.as_secs()
            ))),
        }
    }

    async fn load(&self, descriptor: &ModelDescriptor) -> Result<(), HostError> {
        let timeout = self.config.load_timeout;
        match tokio::time::timeout(timeout, self.host.load(descriptor)).await {
            Ok(result) => result,
            Err(_) => Err(HostError::LoadFailed {
                model: descriptor.name.clone(),
                reason: format!("not ready within {}s", timeout.as_secs()),
            }),
        }
    }

    fn publish(&self, update: impl FnOnce(&mut SwapState)) {
        self.state.send_modify(|state| {
            update(state);
            state.updated_at = Utc::now();
        });
    }
}
