// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for wadesk.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level wadesk configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WadeskConfig {
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP server (gateway) settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Connection registry, heartbeat, and staleness settings.
    #[serde(default)]
    pub hub: HubConfig,

    /// Remote messaging provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Conversation cache freshness settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Event-stream client and reconnection settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Recovery queue settings.
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Polling fallback settings.
    #[serde(default)]
    pub poll: PollConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on every route except `/health` and the provider
    /// webhook. `None` disables auth.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

/// Connection registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// Maximum number of concurrently registered event streams.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Interval between per-connection heartbeat events.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// A connection without a successful write for this long is swept.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// How often the staleness sweep runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Per-connection outbound queue capacity, in frames.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl HubConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_max_connections() -> usize {
    500
}

fn default_heartbeat_interval_secs() -> u64 {
    15
}

fn default_stale_after_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_outbound_buffer() -> usize {
    64
}

/// Remote messaging provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL of the provider's Conversations API.
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Account identifier used as the basic-auth user.
    #[serde(default)]
    pub account_sid: Option<String>,

    /// Account secret used as the basic-auth password.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,

    /// Default page size for listings.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            account_sid: None,
            auth_token: None,
            timeout_secs: default_provider_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

fn default_provider_base_url() -> String {
    "https://conversations.twilio.com/v1".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> usize {
    50
}

/// Conversation cache freshness configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Entries younger than this are served without a refetch.
    #[serde(default = "default_fresh_secs")]
    pub fresh_secs: u64,

    /// Hard limit for serving an entry after a failed refetch. Entries
    /// older than this are evicted.
    #[serde(default = "default_max_stale_secs")]
    pub max_stale_secs: u64,

    /// Upper bound on cached listing pages; the oldest is dropped first.
    #[serde(default = "default_max_listings")]
    pub max_listings: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_secs: default_fresh_secs(),
            max_stale_secs: default_max_stale_secs(),
            max_listings: default_max_listings(),
        }
    }
}

fn default_fresh_secs() -> u64 {
    60
}

fn default_max_stale_secs() -> u64 {
    300
}

fn default_max_listings() -> usize {
    1024
}

/// Event-stream client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// URL of the server's event stream.
    #[serde(default = "default_events_url")]
    pub events_url: String,

    /// Bearer token presented to the server, if it requires one.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Identity used as `author` for outgoing messages.
    #[serde(default = "default_agent_identity")]
    pub agent_identity: String,

    /// First reconnect delay.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Multiplier applied per failed attempt.
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,

    /// Upper bound for a single reconnect delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Failed attempts tolerated before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// How often the stream's liveness is inspected.
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    /// A stream silent for this long (no heartbeat either) is considered dead.
    #[serde(default = "default_silence_timeout_secs")]
    pub silence_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            events_url: default_events_url(),
            bearer_token: None,
            agent_identity: default_agent_identity(),
            base_delay_ms: default_base_delay_ms(),
            growth_factor: default_growth_factor(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            health_check_interval_secs: default_health_check_interval_secs(),
            silence_timeout_secs: default_silence_timeout_secs(),
        }
    }
}

impl ClientConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn silence_timeout(&self) -> Duration {
        Duration::from_secs(self.silence_timeout_secs)
    }
}

fn default_events_url() -> String {
    "http://127.0.0.1:8787/events".to_string()
}

fn default_agent_identity() -> String {
    "agent".to_string()
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_growth_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_health_check_interval_secs() -> u64 {
    5
}

fn default_silence_timeout_secs() -> u64 {
    45
}

/// Recovery queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecoveryConfig {
    /// Pause between replayed entries.
    #[serde(default = "default_replay_delay_ms")]
    pub replay_delay_ms: u64,

    /// Maximum buffered entries; overflow drops the oldest.
    #[serde(default = "default_recovery_capacity")]
    pub capacity: usize,

    /// Entries older than this at drain time trigger a full refetch instead.
    #[serde(default = "default_max_entry_age_secs")]
    pub max_entry_age_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            replay_delay_ms: default_replay_delay_ms(),
            capacity: default_recovery_capacity(),
            max_entry_age_secs: default_max_entry_age_secs(),
        }
    }
}

impl RecoveryConfig {
    pub fn replay_delay(&self) -> Duration {
        Duration::from_millis(self.replay_delay_ms)
    }

    pub fn max_entry_age(&self) -> Duration {
        Duration::from_secs(self.max_entry_age_secs)
    }
}

fn default_replay_delay_ms() -> u64 {
    100
}

fn default_recovery_capacity() -> usize {
    500
}

fn default_max_entry_age_secs() -> u64 {
    600
}

/// Polling fallback configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    /// Minimum interval between ticks.
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Poll even while the push channel is connected.
    #[serde(default)]
    pub always_on: bool,

    /// Conversations inspected per tick.
    #[serde(default = "default_conversation_limit")]
    pub conversation_limit: usize,

    /// Most recent messages fetched per conversation per tick.
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            always_on: false,
            conversation_limit: default_conversation_limit(),
            message_limit: default_message_limit(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_conversation_limit() -> usize {
    50
}

fn default_message_limit() -> usize {
    50
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("wadesk").join("wadesk.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("wadesk.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}
