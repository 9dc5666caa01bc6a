// Copyright 2024-2026 VLM-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Models CLI subcommands: list, status, swap.
//!
//! Connects to a running VLM-CORE service over HTTP.

use crate::api::{AvailableModelsResponse, StatusResponse};
use crate::cli::ApiClient;
use crate::models::{SwapRequest, SwapStatus};
use crate::poller::{PollConfig, StatusPoller};

/// Run `models list`.
///
/// Returns exit code: 0 on success, 3 on connection failure.
pub async fn run_list(base_url: &str) -> i32 {
    let client = match ApiClient::new(base_url) {
        Ok(client) => client,
        Err(e) => return connection_error(e),
    };
    match client.get_available().await {
        Ok(response) => {
            print_available(&response);
            0
        }
        Err(e) => connection_error(e),
    }
}

/// Run `status`, optionally printing raw JSON.
pub async fn run_status(base_url: &str, json: bool) -> i32 {
    let client = match ApiClient::new(base_url) {
        Ok(client) => client,
        Err(e) => return connection_error(e),
    };
    match client.get_status().await {
        Ok(status) if json => match serde_json::to_string_pretty(&status) {
            Ok(text) => {
                println!("{}", text);
                0
            }
            Err(e) => {
                eprintln!("Failed to encode status: {}", e);
                1
            }
        },
        Ok(status) => {
            println!("{}", format_status(&status));
            if status.status == SwapStatus::Error {
                1
            } else {
                0
            }
        }
        Err(e) => connection_error(e),
    }
}

/// Run `models swap <model> [mode] [--wait]`.
///
/// Without `--wait`, exits 0 once the swap is accepted. With `--wait`, polls
/// until the swap settles and exits 0 only if the requested model is active.
pub async fn run_swap(base_url: &str, request: SwapRequest, wait: bool, poll: PollConfig) -> i32 {
    let client = match ApiClient::new(base_url) {
        Ok(client) => client,
        Err(e) => return connection_error(e),
    };

    let accepted = match client.swap(&request).await {
        Ok(accepted) => accepted,
        Err(e) => {
            eprintln!("Swap rejected: {}", e);
            return e.exit_code();
        }
    };

    if accepted.status == SwapStatus::Idle {
        println!(
            "Model '{}' is already active in mode '{}'.",
            accepted.target_model, accepted.inference_mode
        );
        return 0;
    }

    println!(
        "Swapping to '{}' (mode '{}'), estimated {}s.",
        accepted.target_model,
        accepted.inference_mode,
        accepted.eta_seconds.unwrap_or_default()
    );
    if !wait {
        return 0;
    }

    let outcome = StatusPoller::new(poll).poll(&client, &request).await;
    let message = outcome.message(&request);
    if outcome.is_success() {
        println!("{}", message);
        0
    } else {
        eprintln!("{}", message);
        1
    }
}

fn connection_error(e: crate::cli::CliError) -> i32 {
    eprintln!("Error connecting to VLM-CORE service: {}", e);
    eprintln!("Is the service running? Check VLM_CORE_URL.");
    e.exit_code()
}

/// Format a status snapshot for humans.
pub fn format_status(status: &StatusResponse) -> String {
    let mut out = format!(
        "status:  {}\nmodel:   {}\nmode:    {}",
        status_label(status.status),
        status.current_model.as_deref().unwrap_or("<none>"),
        status.inference_mode.as_deref().unwrap_or("<none>"),
    );
    if let Some(target) = &status.target_model {
        out.push_str(&format!("\ntarget:  {}", target));
    }
    if let Some(failure) = &status.last_error {
        out.push_str(&format!(
            "\nerror:   {} stage failed for '{}': {}",
            failure.stage.as_str(),
            failure.requested_model,
            failure.message
        ));
    }
    out
}

fn status_label(status: SwapStatus) -> &'static str {
    match status {
        SwapStatus::Idle => "idle",
        SwapStatus::Swapping => "swapping",
        SwapStatus::Error => "error",
    }
}

/// Print available models grouped by inference mode.
pub fn print_available(response: &AvailableModelsResponse) {
    if response.inference_modes.is_empty() {
        println!("No models available.");
        return;
    }

    for (key, mode) in &response.inference_modes {
        println!("{} ({})", mode.display_name, key);
        println!("  {:<45} {:<16} {:>10}", "NAME", "TYPE", "MAX LEN");
        for (name, model) in &mode.models {
            let active = response.current_model.as_deref() == Some(name.as_str())
                && response.current_mode.as_deref() == Some(key.as_str());
            let max_len = model
                .max_model_len
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{} {:<45} {:<16} {:>10}",
                if active { "*" } else { " " },
                truncate(name, 44),
                truncate(&model.kind, 15),
                max_len,
            );
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
