//! HTTP control surface for model management.

mod error;
mod handler;
pub mod protocol;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::ModelService;

pub use error::ApiError;
pub use protocol::{
    AvailableModelsResponse, ErrorBody, ErrorDetail, ModeInfo, ModelInfo, StatusResponse,
    SwapResponse,
};

/// Build the router for `service`.
pub fn router(service: Arc<ModelService>) -> Router {
    Router::new()
        .route("/models/available", get(handler::available_models))
        .route("/models/status", get(handler::model_status))
        .route("/models/swap", post(handler::swap_model))
        .route("/models/health", get(handler::model_health))
        .route("/health", get(handler::liveness))
        .route("/ready", get(handler::readiness))
        .with_state(service)
}

/// Serve on `listener` until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, service: Arc<ModelService>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(addr = %addr, "model control API listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}
