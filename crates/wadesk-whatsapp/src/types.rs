// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types of the provider's Conversations REST API.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use wadesk_core::types::{ConversationSummary, DeliveryStatus, MediaItem, Message, Participant};

#[derive(Debug, Deserialize)]
pub struct ConversationList {
    #[serde(default)]
    pub conversations: Vec<ApiConversation>,
}

#[derive(Debug, Deserialize)]
pub struct ApiConversation {
    pub sid: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub date_updated: Option<DateTime<Utc>>,
}

impl From<ApiConversation> for ConversationSummary {
    fn from(c: ApiConversation) -> Self {
        Self {
            updated_at: c.date_updated.unwrap_or(c.date_created),
            id: c.sid,
            friendly_name: c.friendly_name,
            state: c.state,
            created_at: c.date_created,
            participants: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ParticipantList {
    #[serde(default)]
    pub participants: Vec<ApiParticipant>,
}

#[derive(Debug, Deserialize)]
pub struct ApiParticipant {
    pub sid: String,
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub messaging_binding: Option<MessagingBinding>,
}

#[derive(Debug, Deserialize)]
pub struct MessagingBinding {
    #[serde(default)]
    pub address: Option<String>,
}

impl From<ApiParticipant> for Participant {
    fn from(p: ApiParticipant) -> Self {
        Self {
            id: p.sid,
            identity: p.identity,
            address: p.messaging_binding.and_then(|b| b.address),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ApiMessage {
    pub sid: String,
    pub conversation_sid: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub delivery: Option<DeliverySummary>,
    #[serde(default)]
    pub media: Option<Vec<ApiMedia>>,
}

/// Per-state receipt counters. Each field is `all`, `some`, or `none`.
#[derive(Debug, Default, Deserialize)]
pub struct DeliverySummary {
    #[serde(default)]
    pub sent: Option<String>,
    #[serde(default)]
    pub delivered: Option<String>,
    #[serde(default)]
    pub read: Option<String>,
    #[serde(default)]
    pub failed: Option<String>,
    #[serde(default)]
    pub undelivered: Option<String>,
}

fn any(v: &Option<String>) -> bool {
    matches!(v.as_deref(), Some("all") | Some("some"))
}

fn all(v: &Option<String>) -> bool {
    v.as_deref() == Some("all")
}

impl DeliverySummary {
    pub fn status(&self) -> DeliveryStatus {
        if any(&self.failed) {
            DeliveryStatus::Failed
        } else if any(&self.undelivered) {
            DeliveryStatus::Undelivered
        } else if all(&self.read) {
            DeliveryStatus::Read
        } else if all(&self.delivered) {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Sent
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiMedia {
    pub sid: String,
    pub content_type: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl From<ApiMedia> for MediaItem {
    fn from(m: ApiMedia) -> Self {
        Self {
            sid: m.sid,
            content_type: m.content_type,
            filename: m.filename,
            size: m.size,
        }
    }
}

impl From<ApiMessage> for Message {
    fn from(m: ApiMessage) -> Self {
        Self {
            delivery_status: m.delivery.as_ref().map(DeliverySummary::status).unwrap_or_default(),
            id: m.sid,
            conversation_id: m.conversation_sid,
            body: m.body.unwrap_or_default(),
            author: m.author.unwrap_or_default(),
            created_at: m.date_created,
            media: m
                .media
                .unwrap_or_default()
                .into_iter()
                .map(MediaItem::from)
                .collect(),
        }
    }
}

/// Error body returned by the provider on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_summary_maps_to_status() {
        let summary = |read: &str, delivered: &str, failed: &str| DeliverySummary {
            sent: Some("all".into()),
            delivered: Some(delivered.into()),
            read: Some(read.into()),
            failed: Some(failed.into()),
            undelivered: Some("none".into()),
        };
        assert_eq!(summary("all", "all", "none").status(), DeliveryStatus::Read);
        assert_eq!(summary("some", "all", "none").status(), DeliveryStatus::Delivered);
        assert_eq!(summary("none", "some", "none").status(), DeliveryStatus::Sent);
        assert_eq!(summary("none", "none", "some").status(), DeliveryStatus::Failed);
    }

    #[test]
    fn message_without_delivery_defaults_to_sent() {
        let json = r#"{
            "sid": "IM1",
            "conversation_sid": "CH1",
            "body": null,
            "author": "whatsapp:+15550001111",
            "date_created": "2026-03-01T12:00:00Z",
            "delivery": null,
            "media": [{"sid": "ME1", "content_type": "audio/ogg", "size": 512}]
        }"#;
        let msg: Message = serde_json::from_str::<ApiMessage>(json).unwrap().into();
        assert_eq!(msg.delivery_status, DeliveryStatus::Sent);
        assert_eq!(msg.body, "");
        assert_eq!(msg.media[0].content_type, "audio/ogg");
    }
}
