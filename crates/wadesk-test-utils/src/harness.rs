// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a temp SQLite store, a [`MockProvider`], and a
//! configuration with timers shortened so reconnect and polling paths run
//! within a test's lifetime.

use std::sync::Arc;

use wadesk_config::model::{StorageConfig, WadeskConfig};
use wadesk_core::{MessageStore, WadeskError};
use wadesk_storage::SqliteStorage;

use crate::mock_provider::MockProvider;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: WadeskConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = WadeskConfig::default();
        config.server.port = 0;
        config.hub.heartbeat_interval_secs = 1;
        config.client.base_delay_ms = 50;
        config.client.max_delay_ms = 200;
        config.client.health_check_interval_secs = 1;
        config.client.silence_timeout_secs = 5;
        config.recovery.replay_delay_ms = 1;
        config.poll.interval_secs = 1;
        Self { config }
    }

    /// Cap concurrent event-stream connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.config.hub.max_connections = max;
        self
    }

    /// Require this bearer token on protected routes (and send it from clients).
    pub fn with_bearer_token(mut self, token: &str) -> Self {
        self.config.server.bearer_token = Some(token.to_string());
        self.config.client.bearer_token = Some(token.to_string());
        self
    }

    /// Arbitrary configuration tweaks.
    pub fn configure(mut self, f: impl FnOnce(&mut WadeskConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Build the test harness, creating the temp database.
    pub async fn build(mut self) -> Result<TestHarness, WadeskError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| WadeskError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        self.config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };
        let store = SqliteStorage::new(self.config.storage.clone());
        store.initialize().await?;

        Ok(TestHarness {
            config: self.config,
            provider: MockProvider::new(),
            store: Arc::new(store),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock provider and a real store.
pub struct TestHarness {
    pub config: WadeskConfig,
    pub provider: MockProvider,
    pub store: Arc<SqliteStorage>,
    // Keep temp dir alive for the harness lifetime.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Point the client side of the config at a running server.
    pub fn set_server_url(&mut self, base_url: &str) {
        self.config.client.events_url = format!("{base_url}/events");
    }
}
