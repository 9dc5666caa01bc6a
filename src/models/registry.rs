//! Read-only registry of inference modes and loadable models.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use super::catalog::{Catalog, CatalogError, EngineArgs};

const DEFAULT_MODEL_TYPE: &str = "multimodal";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("model '{model}' not found in inference mode '{mode}'")]
    NotFound { model: String, mode: String },
}

/// Identifies a loadable model. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub display_name: String,
    /// Key of the inference mode this model belongs to.
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: Option<String>,
    /// Engine arguments with `[common]` already merged in.
    pub engine: EngineArgs,
}

impl ModelDescriptor {
    /// True if this descriptor is the given (model, mode) pair.
    pub fn is(&self, model_name: &str, mode: &str) -> bool {
        self.name == model_name && self.mode == mode
    }

    /// Fraction of GPU memory the engine may claim.
    pub fn memory_budget(&self) -> Option<f32> {
        self.engine.gpu_memory_utilization
    }
}

/// A named group of models sharing an invocation style.
#[derive(Debug, Clone)]
pub struct InferenceMode {
    pub key: String,
    pub display_name: String,
    pub description: Option<String>,
    pub hover_text: Option<String>,
    pub models: BTreeMap<String, Arc<ModelDescriptor>>,
}

/// Catalogue of available models, built once at startup.
#[derive(Debug)]
pub struct ModelRegistry {
    modes: BTreeMap<String, InferenceMode>,
    fallback: Arc<ModelDescriptor>,
}

impl ModelRegistry {
    /// Build the registry from a validated catalog.
    ///
    /// Disabled entries are skipped. Fails if the catalog is invalid.
    pub fn from_catalog(catalog: &Catalog) -> Result<Self, CatalogError> {
        catalog.validate()?;

        let mut modes = BTreeMap::new();
        for (key, entry) in &catalog.inference_modes {
            let default_type = entry.default_type.as_deref().unwrap_or(DEFAULT_MODEL_TYPE);
            let models = entry
                .models
                .iter()
                .filter(|(_, model)| model.enabled)
                .map(|(name, model)| {
                    let descriptor = ModelDescriptor {
                        name: name.clone(),
                        display_name: model.display_name.clone().unwrap_or_else(|| name.clone()),
                        mode: key.clone(),
                        kind: model.kind.clone().unwrap_or_else(|| default_type.to_string()),
                        description: model.description.clone(),
                        engine: model.engine.merged_over(&catalog.common),
                    };
                    (name.clone(), Arc::new(descriptor))
                })
                .collect();

            modes.insert(
                key.clone(),
                InferenceMode {
                    key: key.clone(),
                    display_name: entry.display_name.clone().unwrap_or_else(|| key.clone()),
                    description: entry.description.clone(),
                    hover_text: entry.hover_text.clone(),
                    models,
                },
            );
        }

        let fallback = modes
            .get(&catalog.default_mode)
            .and_then(|mode| mode.models.get(&catalog.default_model))
            .cloned()
            .ok_or_else(|| {
                CatalogError::Invalid(format!(
                    "default model '{}' not found in mode '{}'",
                    catalog.default_model, catalog.default_mode
                ))
            })?;

        Ok(Self { modes, fallback })
    }

    /// All inference modes with their enabled models.
    pub fn list_available(&self) -> impl Iterator<Item = &InferenceMode> {
        self.modes.values()
    }

    /// Look up a (model, mode) pair.
    pub fn resolve(&self, model_name: &str, mode: &str) -> Result<Arc<ModelDescriptor>, RegistryError> {
        self.modes
            .get(mode)
            .and_then(|m| m.models.get(model_name))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                model: model_name.to_string(),
                mode: mode.to_string(),
            })
    }

    /// The model restored when a swap fails.
    pub fn fallback(&self) -> Arc<ModelDescriptor> {
        self.fallback.clone()
    }

    pub fn mode(&self, key: &str) -> Option<&InferenceMode> {
        self.modes.get(key)
    }

    /// Number of enabled models across all modes.
    pub fn model_count(&self) -> usize {
        self.modes.values().map(|m| m.models.len()).sum()
    }
}
