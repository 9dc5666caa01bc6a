// Copyright 2024-2026 VLM-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Health probe subcommands: health, live, ready.
//!
//! Exit codes: 0 healthy/alive/ready, 1 otherwise, 3 when the service
//! cannot be reached.

use crate::cli::ApiClient;
use crate::health::{HealthReport, HealthState};

/// Full health check. Degraded counts as healthy for the exit code.
pub async fn run_health(base_url: &str) -> i32 {
    let client = match ApiClient::new(base_url) {
        Ok(client) => client,
        Err(e) => return report_error(e),
    };
    match client.get_health().await {
        Ok(report) => {
            print_report(&report);
            match report.status {
                HealthState::Healthy | HealthState::Degraded => 0,
                HealthState::Unhealthy => 1,
            }
        }
        Err(e) => report_error(e),
    }
}

pub async fn run_liveness(base_url: &str) -> i32 {
    let client = match ApiClient::new(base_url) {
        Ok(client) => client,
        Err(e) => return report_error(e),
    };
    match client.is_alive().await {
        Ok(true) => {
            println!("alive");
            0
        }
        Ok(false) => {
            println!("not alive");
            1
        }
        Err(e) => report_error(e),
    }
}

pub async fn run_readiness(base_url: &str) -> i32 {
    let client = match ApiClient::new(base_url) {
        Ok(client) => client,
        Err(e) => return report_error(e),
    };
    match client.get_ready().await {
        Ok(report) if report.ready => {
            println!("ready");
            0
        }
        Ok(report) => {
            println!("not ready: {}", report.reason.as_deref().unwrap_or("model not loaded"));
            1
        }
        Err(e) => report_error(e),
    }
}

fn report_error(e: crate::cli::CliError) -> i32 {
    eprintln!("Error contacting VLM-CORE service: {}", e);
    e.exit_code()
}

/// Format a health report for humans.
pub fn format_report(report: &HealthReport) -> String {
    let mut out = format!(
        "status:        {:?}\nready:         {}\nhost alive:    {}\nmodel status:  {:?}\ncurrent model: {}\nmode:          {}\nuptime:        {}s",
        report.status,
        report.ready,
        report.host_alive,
        report.model_status,
        report.current_model.as_deref().unwrap_or("<none>"),
        report.inference_mode.as_deref().unwrap_or("<none>"),
        report.uptime_secs,
    );
    if let Some(reason) = &report.reason {
        out.push_str(&format!("\nreason:        {}", reason));
    }
    out
}

fn print_report(report: &HealthReport) {
    println!("{}", format_report(report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SwapStatus;

    #[test]
    fn test_format_report_includes_reason() {
        let report = HealthReport {
            status: HealthState::Degraded,
            ready: true,
            accepting_swaps: true,
            host_alive: true,
            model_status: SwapStatus::Idle,
            current_model: Some("qwen".into()),
            inference_mode: Some("one_shot".into()),
            reason: Some("swap to 'glm' failed: oom".into()),
            uptime_secs: 12,
        };
        let text = format_report(&report);
        assert!(text.contains("Degraded"));
        assert!(text.contains("qwen"));
        assert!(text.contains("swap to 'glm' failed"));
    }

    #[tokio::test]
    async fn test_unreachable_service_returns_3() {
        assert_eq!(run_health("http://127.0.0.1:9").await, 3);
        assert_eq!(run_liveness("http://127.0.0.1:9").await, 3);
    }
}
