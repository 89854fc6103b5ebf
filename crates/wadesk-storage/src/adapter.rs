// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `MessageStore` trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use wadesk_config::model::StorageConfig;
use wadesk_core::types::{DeliveryStatus, Message, UpsertOutcome};
use wadesk_core::{AdapterType, HealthStatus, MessageStore, PluginAdapter, WadeskError};

use crate::database::Database;
use crate::queries::messages;

/// SQLite-backed message store.
///
/// The database is opened lazily by [`MessageStore::initialize`]; every other
/// operation fails with a storage error until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, WadeskError> {
        self.db.get().ok_or_else(|| WadeskError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, WadeskError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), WadeskError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for SqliteStorage {
    async fn initialize(&self) -> Result<(), WadeskError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| WadeskError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), WadeskError> {
        self.db()?.checkpoint().await
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, WadeskError> {
        messages::get_message(self.db()?, id).await
    }

    async fn upsert_message(&self, message: &Message) -> Result<UpsertOutcome, WadeskError> {
        messages::upsert_message(self.db()?, message).await
    }

    async fn update_delivery_status(
        &self,
        id: &str,
        status: DeliveryStatus,
    ) -> Result<bool, WadeskError> {
        messages::update_delivery_status(self.db()?, id, status).await
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, WadeskError> {
        messages::list_messages(self.db()?, conversation_id, limit).await
    }
}
