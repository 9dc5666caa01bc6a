// Copyright 2024-2026 VLM-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration and the model catalog directly, without
//! contacting a running service.

use crate::config::{self, EffectiveConfig};
use crate::models::{Catalog, ModelRegistry};

/// Print effective config as key-value pairs to stdout.
pub fn run_show() {
    let cfg = config::load().effective_config();
    print_config(&cfg);
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    println!("VLM_CORE_BIND_ADDR=127.0.0.1:8001");
    println!("VLM_CORE_CATALOG=config/models.toml");
    println!("VLM_CORE_ENV=dev");
    println!("VLM_CORE_LOAD_TIMEOUT=300");
    println!("VLM_CORE_UNLOAD_TIMEOUT=60");
    println!("VLM_CORE_DRAIN_TIMEOUT=30");
    println!("VLM_CORE_POLL_INTERVAL=3");
    println!("VLM_CORE_POLL_MAX_ATTEMPTS=40");
    println!("VLM_CORE_SHUTDOWN_TIMEOUT=30");
    println!("VLM_CORE_SWAP_ETA=45");
    println!("VLM_CORE_LOG_FORMAT=json");
    println!("VLM_CORE_LOG_LEVEL=info");
}

/// Validate configuration and the model catalog.
///
/// Returns 0 if valid, 1 on warnings, 2 if the catalog cannot be used.
pub fn run_validate() -> i32 {
    let env = config::load();
    let cfg = env.effective_config();

    let catalog = match Catalog::from_file_with_overlay(&env.catalog_path, &env.environment) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return 2;
        }
    };
    let registry = match ModelRegistry::from_catalog(&catalog) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return 2;
        }
    };

    let warnings = config_warnings(&cfg);
    for warning in &warnings {
        eprintln!("WARNING: {}", warning);
    }

    if warnings.is_empty() {
        println!(
            "Configuration is valid. {} model(s), default '{}'.",
            registry.model_count(),
            registry.fallback().name
        );
        0
    } else {
        1
    }
}

fn config_warnings(cfg: &EffectiveConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if cfg.poll_max_wait_secs < cfg.swap_eta_secs {
        warnings.push(format!(
            "poll budget ({}s) is shorter than VLM_CORE_SWAP_ETA ({}s)",
            cfg.poll_max_wait_secs, cfg.swap_eta_secs
        ));
    }
    if cfg.shutdown_timeout_secs < cfg.drain_timeout_secs {
        warnings.push(format!(
            "VLM_CORE_SHUTDOWN_TIMEOUT ({}s) < VLM_CORE_DRAIN_TIMEOUT ({}s)",
            cfg.shutdown_timeout_secs, cfg.drain_timeout_secs
        ));
    }
    warnings
}

fn print_config(cfg: &EffectiveConfig) {
    println!("VLM_CORE_BIND_ADDR={}", cfg.bind_addr);
    println!("VLM_CORE_CATALOG={}", cfg.catalog_path);
    println!("VLM_CORE_ENV={}", cfg.environment);
    println!("VLM_CORE_LOAD_TIMEOUT={}", cfg.load_timeout_secs);
    println!("VLM_CORE_UNLOAD_TIMEOUT={}", cfg.unload_timeout_secs);
    println!("VLM_CORE_DRAIN_TIMEOUT={}", cfg.drain_timeout_secs);
    println!("VLM_CORE_POLL_INTERVAL={}", cfg.poll_interval_secs);
    println!("VLM_CORE_POLL_MAX_ATTEMPTS={}", cfg.poll_max_attempts);
    println!("VLM_CORE_SHUTDOWN_TIMEOUT={}", cfg.shutdown_timeout_secs);
    println!("VLM_CORE_SWAP_ETA={}", cfg.swap_eta_secs);
    println!("VLM_CORE_LOG_FORMAT={}", cfg.log_format);
    println!("VLM_CORE_LOG_LEVEL={}", cfg.log_level);
}
