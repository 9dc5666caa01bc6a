//! VLM-CORE service entry point.
//!
//! Bootstraps the model service with:
//! - Configuration loading and logging
//! - Model catalog and registry
//! - HTTP control surface
//! - Signal handling for graceful shutdown
//!
//! ## CLI Subcommands
//!
//! - `vlm-core` or `vlm-core serve` - Run the service (default)
//! - `vlm-core health` - Full health check (exit 0/1)
//! - `vlm-core live` - Liveness probe (exit 0/1)
//! - `vlm-core ready` - Readiness probe (exit 0/1)

use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vlm_core::cli::{get_base_url, run_health, run_list, run_liveness, run_readiness, run_status, run_swap};
use vlm_core::config as vlm_config;
use vlm_core::models::{Catalog, ProcessHost, SwapRequest, DEFAULT_MODE};
use vlm_core::shutdown::ShutdownResult;
use vlm_core::telemetry::init_logging;
use vlm_core::{api, ModelService, ServiceConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "serve" | "" => ExitCode::from(run_server().await as u8),
        "health" => ExitCode::from(run_health(&get_base_url()).await as u8),
        "live" | "liveness" => ExitCode::from(run_liveness(&get_base_url()).await as u8),
        "ready" | "readiness" => ExitCode::from(run_readiness(&get_base_url()).await as u8),
        "status" => {
            let json_output = args.get(2).map(|s| s.as_str()) == Some("--json");
            ExitCode::from(run_status(&get_base_url(), json_output).await as u8)
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("vlm-core {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        "models" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("list");
            match subcommand {
                "list" => ExitCode::from(run_list(&get_base_url()).await as u8),
                "swap" => ExitCode::from(run_swap_command(&args[3..]).await as u8),
                _ => {
                    eprintln!("Unknown models subcommand: {}", subcommand);
                    print_command_help("models");
                    ExitCode::FAILURE
                }
            }
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    vlm_core::cli::config_cmd::run_show();
                    ExitCode::SUCCESS
                }
                "defaults" => {
                    vlm_core::cli::config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => ExitCode::from(vlm_core::cli::config_cmd::run_validate() as u8),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "vlm-core - single-slot VLM service with hot-swap coordination v{}

USAGE:
    vlm-core [COMMAND] [OPTIONS]

COMMANDS:
    serve        Run the service (default when no command given)
    health       Full health check (exit 0 if healthy, 1 if unhealthy)
    live         Liveness probe (exit 0 if alive)
    ready        Readiness probe (exit 0 if a model is serving)
    status       Show the current model and swap status
    models       List models or swap the active model
    config       Show or validate configuration
    version      Show version information
    help         Show this help message

EXAMPLES:
    vlm-core serve
    vlm-core status --json
    vlm-core models list
    vlm-core models swap THUDM/glm-4v-9b --wait
    vlm-core config validate

ENVIRONMENT:
    VLM_CORE_URL         Service URL for client commands (default: http://127.0.0.1:8001)
    VLM_CORE_BIND_ADDR   Listen address for serve (default: 127.0.0.1:8001)
    VLM_CORE_CATALOG     Model catalog file (default: config/models.toml)
    VLM_CORE_ENV         Catalog overlay name (default: dev)
    RUST_LOG             Log filter, overrides VLM_CORE_LOG_LEVEL

EXIT CODES:
    0  Success / Healthy
    1  Failure / Unhealthy
    2  Configuration error
    3  Connection error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "serve" => {
            eprintln!(
                "vlm-core serve - Run the model service

USAGE:
    vlm-core serve

DESCRIPTION:
    Loads the model catalog, starts the HTTP control surface and loads the
    default model in the background. On Ctrl+C the service stops accepting
    swaps, waits for a running swap to finish, then unloads the model.
"
            );
        }
        "health" | "live" | "liveness" | "ready" | "readiness" => {
            eprintln!(
                "vlm-core health | live | ready - Health probes

DESCRIPTION:
    health  Full report; exit 0 when healthy or degraded (running on the
            default model after a failed swap).
    live    Exit 0 when the process answers.
    ready   Exit 0 when a model is loaded and no swap is running.

EXIT CODES:
    0  Healthy / alive / ready
    1  Unhealthy / not ready
    3  Connection error
"
            );
        }
        "status" => {
            eprintln!(
                "vlm-core status - Show swap status

USAGE:
    vlm-core status [--json]
"
            );
        }
        "models" => {
            eprintln!(
                "vlm-core models - Manage the active model

USAGE:
    vlm-core models <SUBCOMMAND> [OPTIONS]

SUBCOMMANDS:
    list                               List models by inference mode
    swap <MODEL> [--mode M] [--wait]   Swap the active model

OPTIONS:
    --mode M   Inference mode (default: one_shot)
    --wait     Poll until the swap settles; exit 0 only if MODEL is active

EXAMPLES:
    vlm-core models list
    vlm-core models swap THUDM/glm-4v-9b --wait
"
            );
        }
        "config" => {
            eprintln!(
                "vlm-core config - Manage configuration

USAGE:
    vlm-core config <SUBCOMMAND>

SUBCOMMANDS:
    show           Show effective configuration
    validate       Validate configuration and the model catalog
    defaults       Show default configuration
"
            );
        }
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'vlm-core help' for general usage.",
                command
            );
        }
    }
}

/// Parse `models swap` arguments and run the swap.
async fn run_swap_command(args: &[String]) -> i32 {
    let mut model = None;
    let mut mode = DEFAULT_MODE.to_string();
    let mut wait = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--mode" => {
                if i + 1 < args.len() {
                    mode = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("Missing value for --mode");
                    return 1;
                }
            }
            "--wait" => {
                wait = true;
                i += 1;
            }
            arg if model.is_none() && !arg.starts_with("--") => {
                model = Some(arg.to_string());
                i += 1;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                return 1;
            }
        }
    }

    let Some(model) = model else {
        eprintln!("Usage: vlm-core models swap <MODEL> [--mode M] [--wait]");
        return 1;
    };

    let poll = vlm_config::load().poll;
    run_swap(&get_base_url(), SwapRequest::new(model, mode), wait, poll).await
}

async fn run_server() -> i32 {
    let env = vlm_config::load();
    if let Err(e) = init_logging(&env.log) {
        eprintln!("Failed to initialize logging: {}", e);
        return 2;
    }

    let catalog = match Catalog::from_file_with_overlay(&env.catalog_path, &env.environment) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(path = %env.catalog_path.display(), error = %e, "failed to load model catalog");
            return 2;
        }
    };

    let host = Arc::new(ProcessHost::new(catalog.launcher.clone()));
    let service = match ModelService::from_catalog(&catalog, host, ServiceConfig::from(&env)) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!(error = %e, "invalid model catalog");
            return 2;
        }
    };
    info!(
        models = service.coordinator().registry().model_count(),
        environment = %env.environment,
        "model catalog loaded"
    );

    let listener = match tokio::net::TcpListener::bind(env.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %env.bind_addr, error = %e, "failed to bind");
            return 1;
        }
    };

    // Default model loads in the background; status reports swapping meanwhile.
    let initializing = service.clone();
    tokio::spawn(async move {
        initializing.coordinator().initialize().await;
    });

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for shutdown signal");
            return;
        }
        info!("shutdown signal received");
        signal.cancel();
    });

    let stopped = shutdown.clone();
    if let Err(e) = api::serve(listener, service.clone(), async move { stopped.cancelled().await }).await {
        error!(error = %e, "server error");
    }

    match service.shutdown().await {
        ShutdownResult::Complete => {
            info!("shutdown complete");
            0
        }
        ShutdownResult::SwapTimeout => {
            warn!("shutdown timed out waiting for a model swap");
            1
        }
        ShutdownResult::DrainTimeout { remaining } => {
            warn!(remaining, "shutdown unloaded with inference in flight");
            0
        }
        ShutdownResult::UnloadFailed(reason) => {
            error!(reason = %reason, "failed to unload model at shutdown");
            1
        }
    }
}
