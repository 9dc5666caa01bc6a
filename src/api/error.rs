//! Mapping of service errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use super::protocol::{ErrorBody, ErrorDetail};
use crate::models::SwapError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Swap(#[from] SwapError),

    #[error("invalid request body: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Swap(SwapError::Validation { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Swap(SwapError::SwapInProgress) => StatusCode::CONFLICT,
            ApiError::Swap(SwapError::ShuttingDown) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Swap(SwapError::ModelUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Swap(SwapError::Validation { .. }) => "validation_error",
            ApiError::Swap(SwapError::SwapInProgress) => "swap_in_progress",
            ApiError::Swap(SwapError::ShuttingDown) => "shutting_down",
            ApiError::Swap(SwapError::ModelUnavailable(_)) => "model_unavailable",
            ApiError::BadRequest(_) => "bad_request",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (self.status_code(), Json(body)).into_response()
    }
}
