//! Model catalog parsing and validation.
//!
//! The catalog is a TOML file describing the inference modes the service
//! offers, the models inside each mode, engine arguments shared by every
//! model, and the fallback model restored when a swap fails.
//!
//! ```toml
//! default_model = "Qwen/Qwen2.5-VL-7B-Instruct"
//! default_mode = "one_shot"
//!
//! [common]
//! gpu_memory_utilization = 0.85
//! max_model_len = 8192
//!
//! [inference_modes.one_shot]
//! display_name = "One-Shot"
//!
//! [inference_modes.one_shot.models."Qwen/Qwen2.5-VL-7B-Instruct"]
//! display_name = "Qwen 2.5 VL 7B"
//! type = "multimodal"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Mode used when a request or the catalog does not name one.
pub const DEFAULT_MODE: &str = "one_shot";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid catalog: {0}")]
    Invalid(String),
}

/// Engine arguments. Every field is optional so a model entry can override
/// only what differs from `[common]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_memory_utilization: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_model_len: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_num_seqs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tensor_parallel_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce_eager: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_remote_code: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
}

impl EngineArgs {
    /// Fill unset fields from `base`. Values already set on `self` win.
    pub fn merged_over(&self, base: &EngineArgs) -> EngineArgs {
        EngineArgs {
            gpu_memory_utilization: self.gpu_memory_utilization.or(base.gpu_memory_utilization),
            max_model_len: self.max_model_len.or(base.max_model_len),
            block_size: self.block_size.or(base.block_size),
            max_num_seqs: self.max_num_seqs.or(base.max_num_seqs),
            tensor_parallel_size: self.tensor_parallel_size.or(base.tensor_parallel_size),
            enforce_eager: self.enforce_eager.or(base.enforce_eager),
            trust_remote_code: self.trust_remote_code.or(base.trust_remote_code),
            temperature: self.temperature.or(base.temperature),
            repetition_penalty: self.repetition_penalty.or(base.repetition_penalty),
        }
    }
}

/// A single model entry inside a mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    #[serde(default)]
    pub display_name: Option<String>,
    /// Free-form type tag (e.g. "multimodal", "vision_ocr").
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Disabled entries stay in the file but are never listed or loaded.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub engine: EngineArgs,
}

fn default_enabled() -> bool {
    true
}

/// An inference mode and the models it groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeEntry {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hover_text: Option<String>,
    /// Type tag applied to models that do not declare one.
    #[serde(default)]
    pub default_type: Option<String>,
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
}

/// Command used by the process host to start an inference server.
///
/// `{model}`, `{host}` and `{port}` placeholders in `args` are substituted
/// at launch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Extra environment for the launched process (e.g. CUDA settings).
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_program() -> String {
    "vllm".to_string()
}

fn default_args() -> Vec<String> {
    ["serve", "{model}", "--host", "{host}", "--port", "{port}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8100
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            host: default_host(),
            port: default_port(),
            env: BTreeMap::new(),
        }
    }
}

/// Parsed catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Fallback model, restored when a swap fails.
    pub default_model: String,
    #[serde(default = "default_mode_key")]
    pub default_mode: String,
    #[serde(default)]
    pub common: EngineArgs,
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default)]
    pub inference_modes: BTreeMap<String, ModeEntry>,
}

fn default_mode_key() -> String {
    DEFAULT_MODE.to_string()
}

impl Catalog {
    /// Load a catalog from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = read(path)?;
        Self::from_toml(&content)
    }

    /// Load a catalog and merge the environment overlay next to it.
    ///
    /// For `config/models.toml` and environment `prod`, the overlay is
    /// `config/prod.toml`. Tables merge recursively; scalar values in the
    /// overlay replace the base. A missing overlay is not an error.
    pub fn from_file_with_overlay(path: &Path, environment: &str) -> Result<Self, CatalogError> {
        let mut base: toml::Table = read(path)?.parse()?;

        let overlay_path = path.with_file_name(format!("{}.toml", environment));
        if !environment.is_empty() && overlay_path != path && overlay_path.exists() {
            let overlay: toml::Table = read(&overlay_path)?.parse()?;
            merge_tables(&mut base, overlay);
        }

        Ok(toml::Value::Table(base).try_into()?)
    }

    /// Parse a catalog from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate catalog fields for correctness.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.inference_modes.is_empty() {
            return Err(CatalogError::Invalid("no inference modes defined".into()));
        }

        for (mode_key, mode) in &self.inference_modes {
            if mode_key.trim().is_empty() {
                return Err(CatalogError::Invalid("inference mode key cannot be empty".into()));
            }
            for (name, entry) in &mode.models {
                if name.trim().is_empty() {
                    return Err(CatalogError::Invalid(format!(
                        "model name cannot be empty (mode '{}')",
                        mode_key
                    )));
                }
                let args = entry.engine.merged_over(&self.common);
                if let Some(util) = args.gpu_memory_utilization {
                    if !(util > 0.0 && util <= 1.0) {
                        return Err(CatalogError::Invalid(format!(
                            "gpu_memory_utilization for '{}' must be in (0, 1], got {}",
                            name, util
                        )));
                    }
                }
                if args.max_model_len == Some(0) {
                    return Err(CatalogError::Invalid(format!(
                        "max_model_len for '{}' must be positive",
                        name
                    )));
                }
            }
        }

        let default_enabled = self
            .inference_modes
            .get(&self.default_mode)
            .and_then(|mode| mode.models.get(&self.default_model))
            .map(|entry| entry.enabled);
        match default_enabled {
            Some(true) => Ok(()),
            Some(false) => Err(CatalogError::Invalid(format!(
                "default model '{}' is disabled",
                self.default_model
            ))),
            None => Err(CatalogError::Invalid(format!(
                "default model '{}' not found in mode '{}'",
                self.default_model, self.default_mode
            ))),
        }
    }
}

fn read(path: &Path) -> Result<String, CatalogError> {
    std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, incoming),
                _ => {
                    base.insert(key, toml::Value::Table(incoming));
                }
            },
            other => {
                base.insert(key, other);
            }
        }
    }
}
