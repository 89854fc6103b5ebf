// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persisted message records.

use async_trait::async_trait;

use crate::error::WadeskError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{DeliveryStatus, Message, UpsertOutcome};

/// Persistence boundary for derived message records.
///
/// Every ingestion path (live push, recovery replay, poll) writes through
/// [`upsert_message`](MessageStore::upsert_message), which is keyed by the
/// provider message id. That idempotence is the only cross-path
/// consistency guarantee.
#[async_trait]
pub trait MessageStore: PluginAdapter {
    /// Prepares the backend (opens connections, runs migrations).
    async fn initialize(&self) -> Result<(), WadeskError>;

    /// Flushes and closes the backend.
    async fn close(&self) -> Result<(), WadeskError>;

    /// Looks a message up by its provider id.
    async fn get_message(&self, id: &str) -> Result<Option<Message>, WadeskError>;

    /// Inserts the message if its id is unknown; otherwise only applies a
    /// forward delivery-status transition.
    async fn upsert_message(&self, message: &Message) -> Result<UpsertOutcome, WadeskError>;

    /// Applies a forward delivery-status transition. Returns `false` when the
    /// id is unknown or the transition is not forward.
    async fn update_delivery_status(
        &self,
        id: &str,
        status: DeliveryStatus,
    ) -> Result<bool, WadeskError>;

    /// Messages of a conversation ordered by `created_at`, then id.
    async fn list_messages(
        &self,
        conversation_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, WadeskError>;
}
