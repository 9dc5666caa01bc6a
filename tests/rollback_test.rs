//! Integration tests for swap failure handling and fallback recovery.

mod common;

use common::{ready_coordinator, settle, HostCall, ScriptedHost, DEFAULT_MODEL, HYBRID_MODEL, OTHER_MODEL};
use std::time::Duration;
use vlm_core::models::{FailureStage, SwapError, SwapRequest, SwapStatus};

#[tokio::test]
async fn test_load_failure_recovers_to_fallback() {
    let host = ScriptedHost::new();
    host.fail_load(OTHER_MODEL);
    let c = ready_coordinator(host.clone()).await;

    c.submit(&SwapRequest::new(OTHER_MODEL, "one_shot")).unwrap();
    let state = settle(&c).await;

    assert_eq!(state.status, SwapStatus::Idle);
    assert_eq!(state.current_model.as_ref().unwrap().name, DEFAULT_MODEL);
    assert!(state.is_degraded());
    let failure = state.last_error.as_ref().unwrap();
    assert_eq!(failure.stage, FailureStage::Load);
    assert_eq!(failure.requested_model, OTHER_MODEL);
    assert!(failure.recovered);
    assert!(failure.message.contains("CUDA out of memory"));
    assert_eq!(
        host.calls(),
        vec![
            HostCall::Unload,
            HostCall::Load(OTHER_MODEL.into()),
            HostCall::Load(DEFAULT_MODEL.into()),
        ]
    );

    // Degraded but serving.
    let permit = c.begin_inference().unwrap();
    assert_eq!(permit.model().name, DEFAULT_MODEL);
}

#[tokio::test]
async fn test_fallback_failure_leaves_nothing_loaded() {
    let host = ScriptedHost::new();
    let c = ready_coordinator(host.clone()).await;
    host.fail_load(OTHER_MODEL);
    host.fail_load(DEFAULT_MODEL);

    c.submit(&SwapRequest::new(OTHER_MODEL, "one_shot")).unwrap();
    let state = settle(&c).await;

    assert_eq!(state.status, SwapStatus::Error);
    assert!(state.current_model.is_none());
    assert_eq!(state.target.as_ref().unwrap().name, OTHER_MODEL);
    let failure = state.last_error.as_ref().unwrap();
    assert_eq!(failure.stage, FailureStage::Fallback);
    assert!(!failure.recovered);
    assert!(failure.message.contains(DEFAULT_MODEL));

    assert!(matches!(c.begin_inference(), Err(SwapError::ModelUnavailable(_))));
    assert_eq!(c.in_flight_inference(), 0);
}

#[tokio::test]
async fn test_error_state_accepts_new_swap() {
    let host = ScriptedHost::new();
    let c = ready_coordinator(host.clone()).await;
    host.fail_load(OTHER_MODEL);
    host.fail_load(DEFAULT_MODEL);
    c.submit(&SwapRequest::new(OTHER_MODEL, "one_shot")).unwrap();
    assert_eq!(settle(&c).await.status, SwapStatus::Error);

    c.submit(&SwapRequest::new(HYBRID_MODEL, "hybrid")).unwrap();
    let state = settle(&c).await;

    assert_eq!(state.status, SwapStatus::Idle);
    assert_eq!(state.current_model.as_ref().unwrap().name, HYBRID_MODEL);
    assert!(state.last_error.is_none());
    assert!(c.begin_inference().is_ok());
}

#[tokio::test]
async fn test_unload_failure_retries_then_restores_fallback() {
    let host = ScriptedHost::new();
    let c = ready_coordinator(host.clone()).await;
    host.fail_unloads(1);

    c.submit(&SwapRequest::new(OTHER_MODEL, "one_shot")).unwrap();
    let state = settle(&c).await;

    assert_eq!(state.status, SwapStatus::Idle);
    assert_eq!(state.current_model.as_ref().unwrap().name, DEFAULT_MODEL);
    assert_eq!(state.last_error.as_ref().unwrap().stage, FailureStage::Unload);
    assert_eq!(
        host.calls(),
        vec![
            HostCall::Unload,
            HostCall::Unload,
            HostCall::Load(DEFAULT_MODEL.into()),
        ]
    );
}

#[tokio::test]
async fn test_repeated_unload_failure_skips_fallback_load() {
    let host = ScriptedHost::new();
    let c = ready_coordinator(host.clone()).await;
    host.fail_unloads(2);

    c.submit(&SwapRequest::new(OTHER_MODEL, "one_shot")).unwrap();
    let state = settle(&c).await;

    assert_eq!(state.status, SwapStatus::Error);
    assert!(state.current_model.is_none());
    assert_eq!(state.target.as_ref().unwrap().name, OTHER_MODEL);
    let failure = state.last_error.as_ref().unwrap();
    assert_eq!(failure.stage, FailureStage::Unload);
    assert!(!failure.recovered);
    assert!(failure.message.contains("not attempted"), "{}", failure.message);
    assert!(failure.message.contains("may still be running"), "{}", failure.message);
    assert_eq!(host.calls(), vec![HostCall::Unload, HostCall::Unload]);
    assert_eq!(host.loaded().as_deref(), Some(DEFAULT_MODEL));
}

#[tokio::test]
async fn test_failed_swap_to_fallback_model_retries_it_once() {
    let host = ScriptedHost::new();
    let c = ready_coordinator(host.clone()).await;
    c.submit(&SwapRequest::new(OTHER_MODEL, "one_shot")).unwrap();
    settle(&c).await;
    host.clear_calls();
    host.fail_load(DEFAULT_MODEL);

    c.submit(&SwapRequest::new(DEFAULT_MODEL, "one_shot")).unwrap();
    let state = settle(&c).await;

    assert_eq!(state.status, SwapStatus::Error);
    assert_eq!(
        host.calls(),
        vec![
            HostCall::Unload,
            HostCall::Load(DEFAULT_MODEL.into()),
            HostCall::Load(DEFAULT_MODEL.into()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_host_is_classified_as_load_failure() {
    let host = ScriptedHost::new();
    let c = ready_coordinator(host.clone()).await;
    host.set_load_delay(Duration::from_secs(3600));

    c.submit(&SwapRequest::new(OTHER_MODEL, "one_shot")).unwrap();
    let state = c
        .wait_settled(Duration::from_secs(60))
        .await
        .expect("host-call timeouts bound the swap");

    assert_eq!(state.status, SwapStatus::Error);
    let failure = state.last_error.unwrap();
    assert_eq!(failure.stage, FailureStage::Fallback);
    assert!(failure.message.contains("not ready within 5s"), "{}", failure.message);
}
