// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./wadesk.toml` > `~/.config/wadesk/wadesk.toml` > `/etc/wadesk/wadesk.toml`
//! with environment variable overrides via `WADESK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::WadeskConfig;

/// Config sections addressable through `WADESK_<SECTION>_<KEY>` variables.
const SECTIONS: &[&str] = &[
    "logging", "server", "hub", "provider", "cache", "client", "recovery", "poll", "storage",
];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/wadesk/wadesk.toml";
pub(crate) const LOCAL_CONFIG: &str = "wadesk.toml";

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("wadesk/wadesk.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/wadesk/wadesk.toml` (system-wide)
/// 3. `~/.config/wadesk/wadesk.toml` (user XDG config)
/// 4. `./wadesk.toml` (local directory)
/// 5. `WADESK_*` environment variables
pub fn load_config() -> Result<WadeskConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<WadeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WadeskConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Build the layered Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(WadeskConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Environment provider mapping `WADESK_HUB_MAX_CONNECTIONS` to `hub.max_connections`.
///
/// Only the first underscore after a known section name becomes a dot, so keys
/// that themselves contain underscores stay intact.
fn env_provider() -> Env {
    Env::prefixed("WADESK_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env key to its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section)
            && let Some(field) = rest.strip_prefix('_')
            && !field.is_empty()
        {
            return format!("{section}.{field}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_key_maps_first_underscore_only() {
        assert_eq!(map_env_key("hub_max_connections"), "hub.max_connections");
        assert_eq!(map_env_key("client_silence_timeout_secs"), "client.silence_timeout_secs");
        assert_eq!(map_env_key("provider_auth_token"), "provider.auth_token");
    }

    #[test]
    fn unknown_section_is_left_alone() {
        assert_eq!(map_env_key("something_else"), "something_else");
        assert_eq!(map_env_key("hub_"), "hub_");
    }
}
