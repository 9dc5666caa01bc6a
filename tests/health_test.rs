//! Health check tests for the model service.

mod common;

use chrono::Utc;
use common::{registry, ready_coordinator, service, settle, ScriptedHost, DEFAULT_MODEL, OTHER_MODEL};
use vlm_core::health::{HealthChecker, HealthConfig, HealthState};
use vlm_core::models::{FailureStage, SwapFailure, SwapRequest, SwapState, SwapStatus};
use vlm_core::shutdown::ShutdownState;

fn idle_on(model: Option<&str>) -> SwapState {
    SwapState {
        current_model: model.map(|name| registry().resolve(name, "one_shot").unwrap()),
        status: SwapStatus::Idle,
        last_error: None,
        target: None,
        swap_id: None,
        updated_at: Utc::now(),
    }
}

fn failure(stage: FailureStage, recovered: bool) -> SwapFailure {
    SwapFailure {
        stage,
        requested_model: OTHER_MODEL.into(),
        requested_mode: "one_shot".into(),
        message: "CUDA out of memory".into(),
        recovered,
    }
}

// ============================================================================
// Health Checker Tests
// ============================================================================

#[test]
fn test_alive_always_true() {
    let checker = HealthChecker::default();
    assert!(checker.is_alive());
}

#[test]
fn test_ready_when_model_loaded() {
    let checker = HealthChecker::default();
    assert!(checker.is_ready(ShutdownState::Running, true, &idle_on(Some(DEFAULT_MODEL))));
}

#[test]
fn test_not_ready_when_stopping() {
    let checker = HealthChecker::default();
    let state = idle_on(Some(DEFAULT_MODEL));
    assert!(!checker.is_ready(ShutdownState::Draining, true, &state));
    assert!(!checker.is_ready(ShutdownState::Stopped, true, &state));
}

#[test]
fn test_not_ready_when_host_dead() {
    let checker = HealthChecker::default();
    assert!(!checker.is_ready(ShutdownState::Running, false, &idle_on(Some(DEFAULT_MODEL))));
}

#[test]
fn test_ready_respects_model_requirement() {
    let strict = HealthChecker::default();
    assert!(!strict.is_ready(ShutdownState::Running, true, &idle_on(None)));

    let relaxed = HealthChecker::new(HealthConfig {
        require_model_loaded: false,
    });
    assert!(relaxed.is_ready(ShutdownState::Running, true, &idle_on(None)));
    assert_eq!(
        relaxed.report(ShutdownState::Running, true, &idle_on(None)).status,
        HealthState::Healthy
    );
}

#[test]
fn test_swapping_is_healthy_but_not_ready() {
    let checker = HealthChecker::default();
    let mut state = idle_on(Some(DEFAULT_MODEL));
    state.status = SwapStatus::Swapping;
    state.target = Some(registry().resolve(OTHER_MODEL, "one_shot").unwrap());

    let report = checker.report(ShutdownState::Running, true, &state);

    assert_eq!(report.status, HealthState::Healthy);
    assert!(!report.ready);
    assert_eq!(report.model_status, SwapStatus::Swapping);
}

#[test]
fn test_recovered_swap_is_degraded() {
    let checker = HealthChecker::default();
    let mut state = idle_on(Some(DEFAULT_MODEL));
    state.last_error = Some(failure(FailureStage::Load, true));

    let report = checker.report(ShutdownState::Running, true, &state);

    assert_eq!(report.status, HealthState::Degraded);
    assert!(report.ready, "the fallback model still serves");
    let reason = report.reason.unwrap();
    assert!(reason.contains(OTHER_MODEL));
    assert!(reason.contains("CUDA out of memory"));
}

#[test]
fn test_error_state_is_unhealthy() {
    let checker = HealthChecker::default();
    let state = SwapState {
        current_model: None,
        status: SwapStatus::Error,
        last_error: Some(failure(FailureStage::Fallback, false)),
        target: Some(registry().resolve(OTHER_MODEL, "one_shot").unwrap()),
        swap_id: None,
        updated_at: Utc::now(),
    };

    let report = checker.report(ShutdownState::Running, true, &state);

    assert_eq!(report.status, HealthState::Unhealthy);
    assert!(!report.ready);
    assert!(report.current_model.is_none());
}

#[test]
fn test_report_includes_all_fields() {
    let checker = HealthChecker::default();
    let report = checker.report(ShutdownState::Running, true, &idle_on(Some(DEFAULT_MODEL)));

    assert_eq!(report.status, HealthState::Healthy);
    assert!(report.ready);
    assert!(report.accepting_swaps);
    assert!(report.host_alive);
    assert_eq!(report.current_model.as_deref(), Some(DEFAULT_MODEL));
    assert_eq!(report.inference_mode.as_deref(), Some("one_shot"));
    assert!(report.reason.is_none());
}

#[test]
fn test_report_serializes_lowercase() {
    let checker = HealthChecker::default();
    let report = checker.report(ShutdownState::Draining, true, &idle_on(Some(DEFAULT_MODEL)));

    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["model_status"], "idle");
    assert_eq!(json["accepting_swaps"], false);
    assert_eq!(json["reason"], "shutting down");
}

// ============================================================================
// Service Integration
// ============================================================================

#[tokio::test]
async fn test_service_report_follows_swaps() {
    let host = ScriptedHost::new();
    let service = service(host.clone());
    assert!(!service.health_report().await.ready);

    service.coordinator().initialize().await;
    let report = service.health_report().await;
    assert_eq!(report.status, HealthState::Healthy);
    assert!(report.ready);

    host.fail_load(OTHER_MODEL);
    service
        .coordinator()
        .submit(&SwapRequest::new(OTHER_MODEL, "one_shot"))
        .unwrap();
    settle(service.coordinator()).await;

    let report = service.health_report().await;
    assert_eq!(report.status, HealthState::Degraded);
    assert_eq!(report.current_model.as_deref(), Some(DEFAULT_MODEL));
}

#[tokio::test]
async fn test_dead_host_is_unhealthy() {
    let host = ScriptedHost::new();
    let coordinator = ready_coordinator(host.clone()).await;
    host.set_dead(true);

    let checker = HealthChecker::default();
    let alive = coordinator.host().health_check().await;
    let report = checker.report(ShutdownState::Running, alive, &coordinator.get_status());

    assert_eq!(report.status, HealthState::Unhealthy);
    assert!(!report.host_alive);
}
