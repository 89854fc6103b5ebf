// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `MessageStore` with the same identity semantics as SQLite.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use wadesk_core::types::{AdapterType, DeliveryStatus, HealthStatus, Message, UpsertOutcome};
use wadesk_core::{MessageStore, PluginAdapter, WadeskError};

#[derive(Clone, Default)]
pub struct InMemoryStore {
    messages: Arc<Mutex<HashMap<String, Message>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make writes fail, to exercise recovery paths.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check(&self) -> Result<(), WadeskError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(WadeskError::Storage {
                source: "in-memory store set to fail".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PluginAdapter for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, WadeskError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), WadeskError> {
        Ok(())
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn initialize(&self) -> Result<(), WadeskError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), WadeskError> {
        Ok(())
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, WadeskError> {
        Ok(self.messages.lock().await.get(id).cloned())
    }

    async fn upsert_message(&self, message: &Message) -> Result<UpsertOutcome, WadeskError> {
        self.check()?;
        let mut messages = self.messages.lock().await;
        match messages.get_mut(&message.id) {
            None => {
                messages.insert(message.id.clone(), message.clone());
                Ok(UpsertOutcome::Inserted)
            }
            Some(existing) if existing.delivery_status.advances_to(message.delivery_status) => {
                existing.delivery_status = message.delivery_status;
                Ok(UpsertOutcome::StatusUpdated)
            }
            Some(_) => Ok(UpsertOutcome::Unchanged),
        }
    }

    async fn update_delivery_status(
        &self,
        id: &str,
        status: DeliveryStatus,
    ) -> Result<bool, WadeskError> {
        self.check()?;
        let mut messages = self.messages.lock().await;
        match messages.get_mut(id) {
            Some(existing) if existing.delivery_status.advances_to(status) => {
                existing.delivery_status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, WadeskError> {
        let messages = self.messages.lock().await;
        let mut list: Vec<Message> = messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        if let Some(limit) = limit {
            let skip = list.len().saturating_sub(usize::try_from(limit).unwrap_or(0));
            list.drain(..skip);
        }
        Ok(list)
    }
}
