// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging provider for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` over in-memory conversations.
//! Tests inject remote messages directly (as if delivered while nobody was
//! listening), toggle failures, and count fetches to assert cache behaviour.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use wadesk_core::traits::adapter::PluginAdapter;
use wadesk_core::traits::provider::ProviderAdapter;
use wadesk_core::types::{
    AdapterType, ConversationSummary, DeliveryStatus, HealthStatus, Message, PageRequest,
    Participant,
};
use wadesk_core::WadeskError;

#[derive(Default)]
struct Remote {
    conversations: Vec<ConversationSummary>,
    participants: HashMap<String, Vec<Participant>>,
    messages: HashMap<String, Vec<Message>>,
}

/// In-memory provider with injectable state and call counters.
#[derive(Clone, Default)]
pub struct MockProvider {
    remote: Arc<Mutex<Remote>>,
    failing: Arc<AtomicBool>,
    conversation_fetches: Arc<AtomicUsize>,
    message_fetches: Arc<AtomicUsize>,
    sends: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a conversation (most recently added is listed first).
    pub async fn add_conversation(&self, id: &str) {
        let now = Utc::now();
        let mut remote = self.remote.lock().await;
        remote.conversations.insert(
            0,
            ConversationSummary {
                id: id.to_string(),
                friendly_name: Some(format!("Conversation {id}")),
                state: Some("active".to_string()),
                created_at: now,
                updated_at: now,
                participants: Vec::new(),
            },
        );
        remote.participants.insert(
            id.to_string(),
            vec![Participant {
                id: format!("MB-{id}"),
                identity: None,
                address: Some("whatsapp:+15550001111".to_string()),
            }],
        );
    }

    /// Store a message on the provider side without notifying anyone.
    pub async fn add_message(&self, msg: Message) {
        let mut remote = self.remote.lock().await;
        let list = remote.messages.entry(msg.conversation_id.clone()).or_default();
        list.push(msg);
        list.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn conversation_fetches(&self) -> usize {
        self.conversation_fetches.load(Ordering::SeqCst)
    }

    pub fn message_fetches(&self) -> usize {
        self.message_fetches.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), WadeskError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(WadeskError::provider("mock provider unavailable"))
        } else {
            Ok(())
        }
    }
}

/// Build a message with the given id and creation offset in seconds from now.
pub fn message(id: &str, conversation_id: &str, offset_secs: i64) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        body: format!("body of {id}"),
        author: "whatsapp:+15550001111".to_string(),
        created_at: Utc::now() + chrono::Duration::seconds(offset_secs),
        delivery_status: DeliveryStatus::Sent,
        media: Vec::new(),
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, WadeskError> {
        Ok(match self.check() {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), WadeskError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn list_conversations(
        &self,
        page: &PageRequest,
    ) -> Result<Vec<ConversationSummary>, WadeskError> {
        self.conversation_fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let remote = self.remote.lock().await;
        let start = match &page.after {
            Some(after) => remote
                .conversations
                .iter()
                .position(|c| &c.id == after)
                .map_or(remote.conversations.len(), |i| i + 1),
            None => 0,
        };
        Ok(remote
            .conversations
            .iter()
            .skip(start)
            .take(page.limit)
            .cloned()
            .collect())
    }

    async fn list_participants(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Participant>, WadeskError> {
        self.check()?;
        let remote = self.remote.lock().await;
        Ok(remote
            .participants
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        page: &PageRequest,
    ) -> Result<Vec<Message>, WadeskError> {
        self.message_fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let remote = self.remote.lock().await;
        let all = remote
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default();
        let skip = all.len().saturating_sub(page.limit);
        Ok(all.into_iter().skip(skip).collect())
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        body: &str,
        author: &str,
    ) -> Result<Message, WadeskError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let msg = Message {
            id: format!("IM{}", uuid::Uuid::new_v4().simple()),
            conversation_id: conversation_id.to_string(),
            body: body.to_string(),
            author: author.to_string(),
            created_at: Utc::now(),
            delivery_status: DeliveryStatus::Sent,
            media: Vec::new(),
        };
        self.add_message(msg.clone()).await;
        Ok(msg)
    }
}
