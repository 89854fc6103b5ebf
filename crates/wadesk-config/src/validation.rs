// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as timer orderings, non-zero limits, and URL schemes.

use crate::diagnostic::ConfigError;
use crate::model::WadeskConfig;

fn invalid(errors: &mut Vec<ConfigError>, message: String) {
    errors.push(ConfigError::Validation { message });
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &WadeskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        invalid(&mut errors, "server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            invalid(
                &mut errors,
                format!("server.host `{host}` is not a valid IP address or hostname"),
            );
        }
    }

    let hub = &config.hub;
    if hub.max_connections == 0 {
        invalid(&mut errors, "hub.max_connections must be at least 1".to_string());
    }
    if hub.heartbeat_interval_secs == 0 {
        invalid(&mut errors, "hub.heartbeat_interval_secs must be at least 1".to_string());
    }
    if hub.heartbeat_interval_secs >= hub.stale_after_secs {
        invalid(
            &mut errors,
            format!(
                "hub.heartbeat_interval_secs ({}) must be below hub.stale_after_secs ({})",
                hub.heartbeat_interval_secs, hub.stale_after_secs
            ),
        );
    }
    if hub.sweep_interval_secs == 0 {
        invalid(&mut errors, "hub.sweep_interval_secs must be at least 1".to_string());
    }
    if hub.outbound_buffer == 0 {
        invalid(&mut errors, "hub.outbound_buffer must be at least 1".to_string());
    }

    if !is_http_url(&config.provider.base_url) {
        invalid(
            &mut errors,
            format!(
                "provider.base_url `{}` must start with http:// or https://",
                config.provider.base_url
            ),
        );
    }
    if config.provider.page_size == 0 {
        invalid(&mut errors, "provider.page_size must be at least 1".to_string());
    }

    if config.cache.max_listings == 0 {
        invalid(&mut errors, "cache.max_listings must be at least 1".to_string());
    }
    if config.cache.fresh_secs > config.cache.max_stale_secs {
        invalid(
            &mut errors,
            format!(
                "cache.fresh_secs ({}) must not exceed cache.max_stale_secs ({})",
                config.cache.fresh_secs, config.cache.max_stale_secs
            ),
        );
    }

    let client = &config.client;
    if !is_http_url(&client.events_url) {
        invalid(
            &mut errors,
            format!(
                "client.events_url `{}` must start with http:// or https://",
                client.events_url
            ),
        );
    }
    if client.growth_factor.is_nan() || client.growth_factor <= 1.0 {
        invalid(
            &mut errors,
            format!("client.growth_factor must be above 1.0, got {}", client.growth_factor),
        );
    }
    if client.base_delay_ms == 0 {
        invalid(&mut errors, "client.base_delay_ms must be at least 1".to_string());
    }
    if client.base_delay_ms > client.max_delay_ms {
        invalid(
            &mut errors,
            format!(
                "client.base_delay_ms ({}) must not exceed client.max_delay_ms ({})",
                client.base_delay_ms, client.max_delay_ms
            ),
        );
    }
    if client.max_attempts == 0 {
        invalid(&mut errors, "client.max_attempts must be at least 1".to_string());
    }
    if client.health_check_interval_secs == 0 {
        invalid(&mut errors, "client.health_check_interval_secs must be at least 1".to_string());
    }

    if config.recovery.capacity == 0 {
        invalid(&mut errors, "recovery.capacity must be at least 1".to_string());
    }

    let poll = &config.poll;
    if poll.interval_secs == 0 {
        invalid(&mut errors, "poll.interval_secs must be at least 1".to_string());
    }
    if poll.conversation_limit == 0 || poll.message_limit == 0 {
        invalid(
            &mut errors,
            "poll.conversation_limit and poll.message_limit must be at least 1".to_string(),
        );
    }

    if config.storage.database_path.trim().is_empty() {
        invalid(&mut errors, "storage.database_path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
