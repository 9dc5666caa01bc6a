//! JSON bodies of the HTTP control surface.
//!
//! Shared by the server handlers and the CLI client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::{InferenceMode, ModelRegistry, SwapFailure, SwapState, SwapStatus};

/// `GET /models/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub current_model: Option<String>,
    pub inference_mode: Option<String>,
    pub status: SwapStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<SwapFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_mode: Option<String>,
    #[serde(default)]
    pub swap_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl StatusResponse {
    /// Idle with `model` loaded in `mode`.
    pub fn is_active(&self, model: &str, mode: &str) -> bool {
        self.status == SwapStatus::Idle
            && self.current_model.as_deref() == Some(model)
            && self.inference_mode.as_deref() == Some(mode)
    }
}

impl From<&SwapState> for StatusResponse {
    fn from(state: &SwapState) -> Self {
        Self {
            current_model: state.current_model.as_ref().map(|m| m.name.clone()),
            inference_mode: state.current_mode().map(str::to_string),
            status: state.status,
            last_error: state.last_error.clone(),
            target_model: state.target.as_ref().map(|m| m.name.clone()),
            target_mode: state.target.as_ref().map(|m| m.mode.clone()),
            swap_id: state.swap_id,
            updated_at: state.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub display_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_model_len: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeInfo {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hover_text: Option<String>,
    pub models: BTreeMap<String, ModelInfo>,
}

impl From<&InferenceMode> for ModeInfo {
    fn from(mode: &InferenceMode) -> Self {
        Self {
            display_name: mode.display_name.clone(),
            description: mode.description.clone(),
            hover_text: mode.hover_text.clone(),
            models: mode
                .models
                .iter()
                .map(|(name, d)| {
                    let info = ModelInfo {
                        display_name: d.display_name.clone(),
                        kind: d.kind.clone(),
                        description: d.description.clone(),
                        max_model_len: d.engine.max_model_len,
                    };
                    (name.clone(), info)
                })
                .collect(),
        }
    }
}

/// `GET /models/available`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableModelsResponse {
    pub inference_modes: BTreeMap<String, ModeInfo>,
    pub current_mode: Option<String>,
    pub current_model: Option<String>,
}

impl AvailableModelsResponse {
    pub fn new(registry: &ModelRegistry, state: &SwapState) -> Self {
        Self {
            inference_modes: registry
                .list_available()
                .map(|mode| (mode.key.clone(), ModeInfo::from(mode)))
                .collect(),
            current_mode: state.current_mode().map(str::to_string),
            current_model: state.current_model.as_ref().map(|m| m.name.clone()),
        }
    }
}

/// `POST /models/swap` on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapResponse {
    /// `swapping` when a swap was started, `idle` when already active.
    pub status: SwapStatus,
    #[serde(default)]
    pub swap_id: Option<Uuid>,
    pub target_model: String,
    pub inference_mode: String,
    #[serde(default)]
    pub eta_seconds: Option<u64>,
}

/// Error body: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
