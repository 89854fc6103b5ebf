// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the hub, the sync client, storage, and the provider client.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier of a registered push connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Generate a fresh random connection id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
    Transport,
}

/// Provider-reported delivery state of a message.
///
/// Progress is monotonic along `queued -> sent -> delivered -> read`;
/// `failed` and `undelivered` are terminal and reachable from any state
/// before `read`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryStatus {
    Queued,
    #[default]
    Sent,
    Delivered,
    Read,
    Failed,
    Undelivered,
}

impl DeliveryStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Sent => 1,
            Self::Delivered => 2,
            Self::Read => 3,
            Self::Failed | Self::Undelivered => 4,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Read | Self::Failed | Self::Undelivered)
    }

    /// Whether moving from `self` to `next` is a forward transition.
    ///
    /// Redelivered or out-of-order webhooks must never move a message
    /// backwards (e.g. `read` back to `delivered`).
    pub fn advances_to(self, next: DeliveryStatus) -> bool {
        if self == next || self.is_terminal() {
            return false;
        }
        next.rank() > self.rank()
    }
}

/// A media attachment carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Provider-assigned media id.
    pub sid: String,
    /// MIME type reported by the provider.
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A conversation message. `id` is the provider-assigned dedup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub body: String,
    /// Sender identity (agent identity or customer address).
    pub author: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub delivery_status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaItem>,
}

impl Message {
    /// Ordering key inside a conversation: creation time, then id for ties.
    pub fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, self.id.as_str())
    }
}

/// A participant of a conversation as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Messaging address, e.g. `whatsapp:+15550001111`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Conversation metadata returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Only populated by full (non-lite) listings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<Participant>,
}

/// Items that carry a provider id usable as a pagination cursor.
pub trait ProviderId {
    fn provider_id(&self) -> &str;
}

impl ProviderId for Message {
    fn provider_id(&self) -> &str {
        &self.id
    }
}

impl ProviderId for ConversationSummary {
    fn provider_id(&self) -> &str {
        &self.id
    }
}

/// Page request passed to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub limit: usize,
    /// Provider id of the last item of the previous page.
    pub after: Option<String>,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self { limit, after: None }
    }
}

/// One page of results with its continuation cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl<T: ProviderId> Page<T> {
    /// Build a page from what the provider returned for a request of `limit` items.
    ///
    /// `has_more` is true only when a full page came back; the cursor is the
    /// provider id of the last item on that page.
    pub fn from_fetch(mut items: Vec<T>, limit: usize) -> Self {
        if limit > 0 && items.len() > limit {
            items.truncate(limit);
        }
        let has_more = limit > 0 && items.len() == limit;
        let next_cursor = if has_more {
            items.last().map(|item| item.provider_id().to_string())
        } else {
            None
        };
        Self {
            items,
            next_cursor,
            has_more,
        }
    }
}

/// Result of an identity-based upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum UpsertOutcome {
    /// The id was unknown and the record was created.
    Inserted,
    /// The id was known and its delivery status moved forward.
    StatusUpdated,
    /// The id was known and nothing changed.
    Unchanged,
}

impl UpsertOutcome {
    pub fn is_new(self) -> bool {
        self == Self::Inserted
    }
}

/// Payload of `newMessage` / `newMediaMessage` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub conversation_id: String,
    pub message_id: String,
    pub body: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_items: Vec<MediaItem>,
}

impl From<&Message> for MessagePayload {
    fn from(msg: &Message) -> Self {
        Self {
            conversation_id: msg.conversation_id.clone(),
            message_id: msg.id.clone(),
            body: msg.body.clone(),
            author: msg.author.clone(),
            created_at: msg.created_at,
            media_items: msg.media.clone(),
        }
    }
}

impl MessagePayload {
    /// Rebuild the message record carried by this payload.
    pub fn to_message(&self) -> Message {
        Message {
            id: self.message_id.clone(),
            conversation_id: self.conversation_id.clone(),
            body: self.body.clone(),
            author: self.author.clone(),
            created_at: self.created_at,
            delivery_status: DeliveryStatus::default(),
            media: self.media_items.clone(),
        }
    }
}

/// Payload of `newConversation` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPayload {
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
}

/// An event pushed over the event stream. Serialized as `{"type": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    Connected { message: String },
    /// `timestamp` is milliseconds since the Unix epoch.
    Heartbeat { timestamp: i64 },
    NewMessage { data: MessagePayload },
    NewMediaMessage { data: MessagePayload },
    NewConversation { data: ConversationPayload },
}

impl Event {
    /// A heartbeat stamped with the current time.
    pub fn heartbeat() -> Self {
        Self::Heartbeat {
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// The live event announcing `msg`, media-aware.
    pub fn for_message(msg: &Message) -> Self {
        let data = MessagePayload::from(msg);
        if msg.media.is_empty() {
            Self::NewMessage { data }
        } else {
            Self::NewMediaMessage { data }
        }
    }

    /// Wire name of the event type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Heartbeat { .. } => "heartbeat",
            Self::NewMessage { .. } => "newMessage",
            Self::NewMediaMessage { .. } => "newMediaMessage",
            Self::NewConversation { .. } => "newConversation",
        }
    }

    /// Serialize to the JSON carried in an SSE `data:` frame.
    pub fn to_json(&self) -> Result<String, crate::WadeskError> {
        serde_json::to_string(self).map_err(|e| crate::WadeskError::Internal(format!(
            "failed to serialize {} event: {e}",
            self.name()
        )))
    }
}
