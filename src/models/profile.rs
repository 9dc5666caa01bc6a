//! Per-family launch profiles for the inference engine.
//!
//! Vision-language families differ in the KV block size they tolerate and
//! in how many page images fit in a single prompt. The profile picks those
//! values from the model name unless the catalog sets them explicitly.

use super::registry::ModelDescriptor;

const DEFAULT_GPU_MEMORY_UTILIZATION: f32 = 0.9;
const DEFAULT_MAX_NUM_SEQS: u32 = 4;

/// Model family, detected from the model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Qwen,
    Glm,
    Nvidia,
    Smol,
    Default,
}

impl ModelFamily {
    pub fn detect(model_name: &str) -> Self {
        let name = model_name.to_ascii_lowercase();
        if name.contains("qwen") {
            ModelFamily::Qwen
        } else if name.contains("glm") {
            ModelFamily::Glm
        } else if name.contains("nvidia") || name.contains("nemotron") {
            ModelFamily::Nvidia
        } else if name.contains("smol") || name.contains("docling") {
            ModelFamily::Smol
        } else {
            ModelFamily::Default
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Qwen => "qwen",
            ModelFamily::Glm => "glm",
            ModelFamily::Nvidia => "nvidia",
            ModelFamily::Smol => "smol",
            ModelFamily::Default => "default",
        }
    }

    fn block_size(&self) -> u32 {
        match self {
            ModelFamily::Glm | ModelFamily::Smol => 8,
            _ => 16,
        }
    }

    /// Maximum page images per prompt.
    fn image_limit(&self) -> u32 {
        match self {
            ModelFamily::Qwen => 10,
            ModelFamily::Glm => 5,
            ModelFamily::Nvidia => 6,
            ModelFamily::Smol => 12,
            ModelFamily::Default => 8,
        }
    }
}

/// Resolved engine arguments for one model launch.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchProfile {
    pub family: ModelFamily,
    pub model: String,
    pub gpu_memory_utilization: f32,
    pub max_model_len: Option<u32>,
    pub block_size: u32,
    pub max_num_seqs: u32,
    pub tensor_parallel_size: u32,
    pub enforce_eager: bool,
    pub trust_remote_code: bool,
    pub image_limit: u32,
}

impl LaunchProfile {
    pub fn for_model(descriptor: &ModelDescriptor) -> Self {
        let family = ModelFamily::detect(&descriptor.name);
        let engine = &descriptor.engine;
        Self {
            family,
            model: descriptor.name.clone(),
            gpu_memory_utilization: engine
                .gpu_memory_utilization
                .unwrap_or(DEFAULT_GPU_MEMORY_UTILIZATION),
            max_model_len: engine.max_model_len,
            block_size: engine.block_size.unwrap_or_else(|| family.block_size()),
            max_num_seqs: engine.max_num_seqs.unwrap_or(DEFAULT_MAX_NUM_SEQS),
            tensor_parallel_size: engine.tensor_parallel_size.unwrap_or(1).max(1),
            enforce_eager: engine.enforce_eager.unwrap_or(false),
            trust_remote_code: engine.trust_remote_code.unwrap_or(false),
            image_limit: family.image_limit(),
        }
    }

    /// Render as engine command-line flags.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--gpu-memory-utilization".to_string(),
            self.gpu_memory_utilization.to_string(),
            "--block-size".to_string(),
            self.block_size.to_string(),
            "--max-num-seqs".to_string(),
            self.max_num_seqs.to_string(),
            "--tensor-parallel-size".to_string(),
            self.tensor_parallel_size.to_string(),
            "--limit-mm-per-prompt".to_string(),
            format!("{{\"image\":{}}}", self.image_limit),
            "--disable-custom-all-reduce".to_string(),
        ];
        if let Some(len) = self.max_model_len {
            args.push("--max-model-len".to_string());
            args.push(len.to_string());
        }
        if self.enforce_eager {
            args.push("--enforce-eager".to_string());
        }
        if self.trust_remote_code {
            args.push("--trust-remote-code".to_string());
        }
        args
    }
}
