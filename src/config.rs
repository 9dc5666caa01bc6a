//! Service configuration loading from environment variables.
//!
//! All configuration values are loaded from `VLM_CORE_*` environment
//! variables with sensible defaults. Invalid values fall back to defaults
//! without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `VLM_CORE_BIND_ADDR` | 127.0.0.1:8001 | HTTP listen address |
//! | `VLM_CORE_CATALOG` | config/models.toml | Model catalog file |
//! | `VLM_CORE_ENV` | dev | Catalog overlay name (`config/<env>.toml`) |
//! | `VLM_CORE_LOAD_TIMEOUT` | 300 | Model load timeout (secs) |
//! | `VLM_CORE_UNLOAD_TIMEOUT` | 60 | Model unload timeout (secs) |
//! | `VLM_CORE_DRAIN_TIMEOUT` | 30 | Inference drain timeout before unload (secs) |
//! | `VLM_CORE_POLL_INTERVAL` | 3 | Status poll interval (secs) |
//! | `VLM_CORE_POLL_MAX_ATTEMPTS` | 40 | Status poll attempts |
//! | `VLM_CORE_SHUTDOWN_TIMEOUT` | 30 | Graceful shutdown timeout (secs) |
//! | `VLM_CORE_SWAP_ETA` | 45 | Swap ETA reported to callers (secs) |
//! | `VLM_CORE_LOG_FORMAT` | json | `json` or `pretty` |
//! | `VLM_CORE_LOG_LEVEL` | info | Log filter directive |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::models::SwapConfig;
use crate::poller::PollConfig;
use crate::telemetry::{LogConfig, LogFormat};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8001";
const DEFAULT_CATALOG: &str = "config/models.toml";

/// Effective service configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub bind_addr: String,
    pub catalog_path: String,
    pub environment: String,
    pub load_timeout_secs: u64,
    pub unload_timeout_secs: u64,
    pub drain_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_max_attempts: u32,
    pub poll_max_wait_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub swap_eta_secs: u64,
    pub log_format: String,
    pub log_level: String,
}

/// All service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub bind_addr: SocketAddr,
    pub catalog_path: PathBuf,
    pub environment: String,
    pub swap: SwapConfig,
    pub poll: PollConfig,
    pub shutdown_timeout: Duration,
    pub swap_eta: Duration,
    pub log: LogConfig,
}

/// Parse a `u32` env var, returning `default` on missing or invalid.
fn parse_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u32>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Seconds from env with a floor of one second.
fn parse_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(parse_u64(key, default).max(1))
}

fn parse_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val.trim().to_string(),
        _ => default.to_string(),
    }
}

fn load_bind_addr() -> SocketAddr {
    let fallback = SocketAddr::from(([127, 0, 0, 1], 8001));
    parse_string("VLM_CORE_BIND_ADDR", DEFAULT_BIND_ADDR)
        .parse()
        .unwrap_or(fallback)
}

fn load_swap_config() -> SwapConfig {
    SwapConfig {
        load_timeout: parse_secs("VLM_CORE_LOAD_TIMEOUT", 300),
        unload_timeout: parse_secs("VLM_CORE_UNLOAD_TIMEOUT", 60),
        drain_timeout: parse_secs("VLM_CORE_DRAIN_TIMEOUT", 30),
    }
}

fn load_poll_config() -> PollConfig {
    PollConfig {
        interval: parse_secs("VLM_CORE_POLL_INTERVAL", 3),
        max_attempts: parse_u32("VLM_CORE_POLL_MAX_ATTEMPTS", 40).max(1),
    }
}

fn load_log_config() -> LogConfig {
    let format = match parse_string("VLM_CORE_LOG_FORMAT", "json").to_ascii_lowercase().as_str() {
        "pretty" => LogFormat::Pretty,
        _ => LogFormat::Json,
    };
    LogConfig {
        format,
        level: parse_string("VLM_CORE_LOG_LEVEL", "info"),
        output_path: None,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    EnvConfig {
        bind_addr: load_bind_addr(),
        catalog_path: PathBuf::from(parse_string("VLM_CORE_CATALOG", DEFAULT_CATALOG)),
        environment: parse_string("VLM_CORE_ENV", "dev"),
        swap: load_swap_config(),
        poll: load_poll_config(),
        shutdown_timeout: parse_secs("VLM_CORE_SHUTDOWN_TIMEOUT", 30),
        swap_eta: Duration::from_secs(parse_u64("VLM_CORE_SWAP_ETA", 45)),
        log: load_log_config(),
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            bind_addr: self.bind_addr.to_string(),
            catalog_path: self.catalog_path.display().to_string(),
            environment: self.environment.clone(),
            load_timeout_secs: self.swap.load_timeout.as_secs(),
            unload_timeout_secs: self.swap.unload_timeout.as_secs(),
            drain_timeout_secs: self.swap.drain_timeout.as_secs(),
            poll_interval_secs: self.poll.interval.as_secs(),
            poll_max_attempts: self.poll.max_attempts,
            poll_max_wait_secs: self.poll.max_wait().as_secs(),
            shutdown_timeout_secs: self.shutdown_timeout.as_secs(),
            swap_eta_secs: self.swap_eta.as_secs(),
            log_format: match self.log.format {
                LogFormat::Json => "json".to_string(),
                LogFormat::Pretty => "pretty".to_string(),
            },
            log_level: self.log.level.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "VLM_CORE_BIND_ADDR",
        "VLM_CORE_CATALOG",
        "VLM_CORE_ENV",
        "VLM_CORE_LOAD_TIMEOUT",
        "VLM_CORE_UNLOAD_TIMEOUT",
        "VLM_CORE_DRAIN_TIMEOUT",
        "VLM_CORE_POLL_INTERVAL",
        "VLM_CORE_POLL_MAX_ATTEMPTS",
        "VLM_CORE_SHUTDOWN_TIMEOUT",
        "VLM_CORE_SWAP_ETA",
        "VLM_CORE_LOG_FORMAT",
        "VLM_CORE_LOG_LEVEL",
    ];

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:8001");
        assert_eq!(cfg.catalog_path, PathBuf::from("config/models.toml"));
        assert_eq!(cfg.environment, "dev");
        assert_eq!(cfg.swap.load_timeout.as_secs(), 300);
        assert_eq!(cfg.swap.unload_timeout.as_secs(), 60);
        assert_eq!(cfg.swap.drain_timeout.as_secs(), 30);
        assert_eq!(cfg.poll.interval.as_secs(), 3);
        assert_eq!(cfg.poll.max_attempts, 40);
        assert_eq!(cfg.shutdown_timeout.as_secs(), 30);
        assert_eq!(cfg.swap_eta.as_secs(), 45);
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("VLM_CORE_BIND_ADDR", "0.0.0.0:9000");
        std::env::set_var("VLM_CORE_LOAD_TIMEOUT", "600");
        std::env::set_var("VLM_CORE_POLL_MAX_ATTEMPTS", "10");
        std::env::set_var("VLM_CORE_ENV", "prod");
        std::env::set_var("VLM_CORE_LOG_FORMAT", "Pretty");
        let cfg = load();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.swap.load_timeout.as_secs(), 600);
        assert_eq!(cfg.poll.max_attempts, 10);
        assert_eq!(cfg.environment, "prod");
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("VLM_CORE_BIND_ADDR", "not an address");
        std::env::set_var("VLM_CORE_DRAIN_TIMEOUT", "soon");
        std::env::set_var("VLM_CORE_POLL_INTERVAL", "-1");
        let cfg = load();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:8001");
        assert_eq!(cfg.swap.drain_timeout.as_secs(), 30);
        assert_eq!(cfg.poll.interval.as_secs(), 3);
        clear_env_vars();
    }

    #[test]
    fn test_zero_values_hit_floor() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("VLM_CORE_UNLOAD_TIMEOUT", "0");
        std::env::set_var("VLM_CORE_POLL_MAX_ATTEMPTS", "0");
        std::env::set_var("VLM_CORE_SHUTDOWN_TIMEOUT", "0");
        let cfg = load();
        assert_eq!(cfg.swap.unload_timeout.as_secs(), 1);
        assert_eq!(cfg.poll.max_attempts, 1);
        assert_eq!(cfg.shutdown_timeout.as_secs(), 1);
        clear_env_vars();
    }

    #[test]
    fn test_effective_config_contains_all_fields() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let eff = load().effective_config();
        assert_eq!(eff.poll_max_wait_secs, 120);
        assert_eq!(eff.log_format, "json");
        assert!(eff.load_timeout_secs > 0);
        assert!(eff.shutdown_timeout_secs > 0);
        let json = serde_json::to_value(&eff).unwrap();
        assert_eq!(json["catalog_path"], "config/models.toml");
    }
}
