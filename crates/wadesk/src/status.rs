// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wadesk status` command implementation.
//!
//! Queries the gateway health endpoint for uptime and the number of open
//! event streams. Falls back gracefully when the gateway is not running.

use std::io::IsTerminal;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wadesk_config::model::WadeskConfig;
use wadesk_core::WadeskError;

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
    connections: usize,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub status: String,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub connections: Option<usize>,
    pub endpoint: String,
}

fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

fn health_url(config: &WadeskConfig) -> String {
    let host = match config.server.host.as_str() {
        "0.0.0.0" | "::" => "127.0.0.1",
        host => host,
    };
    format!("http://{host}:{}/health", config.server.port)
}

pub async fn run_status(config: &WadeskConfig, json: bool, plain: bool) -> Result<(), WadeskError> {
    let endpoint = health_url(config);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| WadeskError::Internal(format!("failed to create HTTP client: {e}")))?;

    let health = match client.get(&endpoint).send().await {
        Ok(resp) if resp.status().is_success() => Some(
            resp.json::<HealthResponse>()
                .await
                .map_err(|e| WadeskError::Internal(format!("failed to parse health response: {e}")))?,
        ),
        _ => None,
    };

    let response = match health {
        Some(h) => StatusResponse {
            running: true,
            uptime_human: Some(format_uptime(h.uptime_secs)),
            uptime_secs: Some(h.uptime_secs),
            connections: Some(h.connections),
            status: h.status,
            endpoint,
        },
        None => StatusResponse {
            running: false,
            status: "not running".to_string(),
            uptime_secs: None,
            uptime_human: None,
            connections: None,
            endpoint,
        },
    };

    if json {
        let rendered = serde_json::to_string_pretty(&response)
            .map_err(|e| WadeskError::Internal(format!("failed to render status: {e}")))?;
        println!("{rendered}");
    } else {
        print_status(&response, !plain && std::io::stdout().is_terminal());
    }
    Ok(())
}

fn print_status(status: &StatusResponse, use_color: bool) {
    use colored::Colorize;

    println!();
    println!("  wadesk status");
    println!("  {}", "-".repeat(35));
    match (status.running, use_color) {
        (true, true) => println!(
            "    State:    {} {} (uptime: {})",
            "✓".green(),
            status.status.green(),
            status.uptime_human.as_deref().unwrap_or("-")
        ),
        (true, false) => println!(
            "    State:    [OK] {} (uptime: {})",
            status.status,
            status.uptime_human.as_deref().unwrap_or("-")
        ),
        (false, true) => println!("    State:    {} {}", "✗".red(), "not running".red()),
        (false, false) => println!("    State:    [FAIL] not running"),
    }
    if let Some(connections) = status.connections {
        println!("    Streams:  {connections}");
    }
    println!("    Endpoint: {}", status.endpoint);
    if !status.running {
        println!();
        println!("  Start with: wadesk serve");
    }
    println!();
}
