//! Request handlers for the model control endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

use super::error::ApiError;
use super::protocol::{AvailableModelsResponse, StatusResponse, SwapResponse};
use crate::models::{SwapAccepted, SwapRequest, SwapStatus};
use crate::ModelService;

/// `GET /models/available`
pub async fn available_models(State(service): State<Arc<ModelService>>) -> Json<AvailableModelsResponse> {
    let coordinator = service.coordinator();
    Json(AvailableModelsResponse::new(coordinator.registry(), &coordinator.get_status()))
}

/// `GET /models/status`
pub async fn model_status(State(service): State<Arc<ModelService>>) -> Json<StatusResponse> {
    Json(StatusResponse::from(&service.coordinator().get_status()))
}

/// `POST /models/swap`
///
/// 202 when a swap was started, 200 when the model is already active.
pub async fn swap_model(
    State(service): State<Arc<ModelService>>,
    payload: Result<Json<SwapRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    debug!(model = %request.model_name, mode = %request.inference_mode, "swap requested");

    let response = match service.coordinator().submit(&request)? {
        SwapAccepted::Started { swap_id, target } => (
            StatusCode::ACCEPTED,
            Json(SwapResponse {
                status: SwapStatus::Swapping,
                swap_id: Some(swap_id),
                target_model: target.name.clone(),
                inference_mode: target.mode.clone(),
                eta_seconds: Some(service.swap_eta().as_secs()),
            }),
        ),
        SwapAccepted::AlreadyActive { model } => (
            StatusCode::OK,
            Json(SwapResponse {
                status: SwapStatus::Idle,
                swap_id: None,
                target_model: model.name.clone(),
                inference_mode: model.mode.clone(),
                eta_seconds: None,
            }),
        ),
    };
    Ok(response.into_response())
}

/// `GET /models/health`
///
/// The status code follows host liveness and shutdown only; swap status is
/// reported in the body.
pub async fn model_health(State(service): State<Arc<ModelService>>) -> Response {
    let report = service.health_report().await;
    let code = if report.host_alive && report.accepting_swaps {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report)).into_response()
}

/// `GET /health`
pub async fn liveness() -> impl IntoResponse {
    Json(json!({ "status": "alive" }))
}

/// `GET /ready`
pub async fn readiness(State(service): State<Arc<ModelService>>) -> Response {
    let report = service.health_report().await;
    let code = if report.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report)).into_response()
}
