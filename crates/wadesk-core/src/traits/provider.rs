// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait for the remote messaging provider.
//!
//! The provider is the source of truth for conversations and messages. This
//! crate treats it as a black box whose message ids are the dedup key.

use async_trait::async_trait;

use crate::error::WadeskError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ConversationSummary, Message, PageRequest, Participant};

/// Remote messaging provider operations consumed by the cache and poll paths.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Lists conversations, most recently updated first.
    async fn list_conversations(
        &self,
        page: &PageRequest,
    ) -> Result<Vec<ConversationSummary>, WadeskError>;

    /// Lists the participants of a conversation.
    async fn list_participants(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Participant>, WadeskError>;

    /// Lists the most recent messages of a conversation in ascending `created_at` order.
    async fn list_messages(
        &self,
        conversation_id: &str,
        page: &PageRequest,
    ) -> Result<Vec<Message>, WadeskError>;

    /// Creates a message in a conversation and returns the provider's record.
    async fn send_message(
        &self,
        conversation_id: &str,
        body: &str,
        author: &str,
    ) -> Result<Message, WadeskError>;
}
