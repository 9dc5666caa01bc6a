// Copyright 2024-2026 VLM-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for VLM-CORE operator commands.
//!
//! Talks to a running service over its HTTP control surface.
//!
//! ## Usage
//!
//! ```bash
//! vlm-core health                    # Full health check, exits 0 on healthy
//! vlm-core live                      # Liveness probe, exits 0 if alive
//! vlm-core ready                     # Readiness probe, exits 0 if ready
//! vlm-core status                    # Show the current swap status
//! vlm-core models swap <model> --wait
//! ```

mod client;
pub mod config_cmd;
pub mod health;
pub mod models_cmd;

pub use client::{ApiClient, CliError};
pub use health::{run_health, run_liveness, run_readiness};
pub use models_cmd::{run_list, run_status, run_swap};

/// Default service URL.
pub const DEFAULT_URL: &str = "http://127.0.0.1:8001";

/// Get the service URL from the environment or use the default.
pub fn get_base_url() -> String {
    std::env::var("VLM_CORE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string())
}
