//! Tests for graceful shutdown coordination.

mod common;

use common::{service, wait_until, HostCall, ScriptedHost, DEFAULT_MODEL, OTHER_MODEL};
use std::sync::Arc;
use std::time::Duration;
use vlm_core::models::{SwapError, SwapRequest, SwapStatus};
use vlm_core::shutdown::{ShutdownCoordinator, ShutdownResult, ShutdownState};
use vlm_core::ModelService;

async fn ready_service(host: Arc<ScriptedHost>) -> Arc<ModelService> {
    let service = Arc::new(service(host.clone()));
    service.coordinator().initialize().await;
    host.clear_calls();
    service
}

#[tokio::test]
async fn test_initial_state_is_running() {
    let coordinator = ShutdownCoordinator::new();
    assert_eq!(coordinator.state().await, ShutdownState::Running);
    assert!(coordinator.is_running());
}

#[tokio::test]
async fn test_idle_shutdown_unloads_model() {
    let host = ScriptedHost::new();
    let service = ready_service(host.clone()).await;

    let result = service.shutdown().await;

    assert_eq!(result, ShutdownResult::Complete);
    assert!(!service.is_running());
    assert_eq!(host.calls(), vec![HostCall::Unload]);
    assert!(host.loaded().is_none());
    let state = service.coordinator().get_status();
    assert_eq!(state.status, SwapStatus::Idle);
    assert!(state.current_model.is_none());
}

#[tokio::test]
async fn test_shutdown_waits_for_running_swap() {
    let host = ScriptedHost::new();
    let service = ready_service(host.clone()).await;
    let gate = host.hold_loads();
    service
        .coordinator()
        .submit(&SwapRequest::new(OTHER_MODEL, "one_shot"))
        .unwrap();

    let stopping = service.clone();
    let handle = tokio::spawn(async move { stopping.shutdown().await });
    wait_until(|| !service.is_running()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!handle.is_finished(), "shutdown must not cancel the swap");
    assert_eq!(service.coordinator().get_status().status, SwapStatus::Swapping);

    gate.add_permits(1);
    assert_eq!(handle.await.unwrap(), ShutdownResult::Complete);
    assert_eq!(
        host.calls(),
        vec![
            HostCall::Unload,
            HostCall::Load(OTHER_MODEL.into()),
            HostCall::Unload,
        ]
    );
}

#[tokio::test]
async fn test_swaps_and_inference_rejected_once_draining() {
    let host = ScriptedHost::new();
    let service = ready_service(host.clone()).await;
    let gate = host.hold_loads();
    service
        .coordinator()
        .submit(&SwapRequest::new(OTHER_MODEL, "one_shot"))
        .unwrap();

    let stopping = service.clone();
    let handle = tokio::spawn(async move { stopping.shutdown().await });
    wait_until(|| !service.coordinator().is_accepting()).await;

    assert_eq!(
        service
            .coordinator()
            .submit(&SwapRequest::new(DEFAULT_MODEL, "one_shot"))
            .unwrap_err(),
        SwapError::ShuttingDown
    );
    assert!(matches!(service.begin_inference(), Err(SwapError::ShuttingDown)));

    gate.add_permits(1);
    handle.await.unwrap();
    assert!(matches!(service.begin_inference(), Err(SwapError::ShuttingDown)));
}

#[tokio::test(start_paused = true)]
async fn test_swap_timeout_leaves_model_in_place() {
    let host = ScriptedHost::new();
    let service = ready_service(host.clone()).await;
    let _gate = host.hold_loads();
    service
        .coordinator()
        .submit(&SwapRequest::new(OTHER_MODEL, "one_shot"))
        .unwrap();

    let result = service.shutdown().await;

    assert_eq!(result, ShutdownResult::SwapTimeout);
    assert_eq!(
        host.calls(),
        vec![HostCall::Unload, HostCall::Load(OTHER_MODEL.into())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_drain_timeout_still_unloads() {
    let host = ScriptedHost::new();
    let service = ready_service(host.clone()).await;
    let _permit = service.begin_inference().unwrap();

    let result = service.shutdown().await;

    assert_eq!(result, ShutdownResult::DrainTimeout { remaining: 1 });
    assert_eq!(host.calls(), vec![HostCall::Unload]);
}

#[tokio::test]
async fn test_unload_failure_is_reported() {
    let host = ScriptedHost::new();
    let service = ready_service(host.clone()).await;
    host.fail_unloads(1);

    let result = service.shutdown().await;

    assert!(matches!(result, ShutdownResult::UnloadFailed(ref reason) if reason.contains("device busy")));
    assert_eq!(host.loaded().as_deref(), Some(DEFAULT_MODEL));
}

#[tokio::test]
async fn test_second_shutdown_is_noop() {
    let host = ScriptedHost::new();
    let service = ready_service(host.clone()).await;

    assert_eq!(service.shutdown().await, ShutdownResult::Complete);
    assert_eq!(service.shutdown().await, ShutdownResult::Complete);
    assert_eq!(host.calls(), vec![HostCall::Unload]);
}
