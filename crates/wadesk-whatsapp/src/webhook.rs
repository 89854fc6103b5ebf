// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider webhook payloads.
//!
//! The provider posts form-encoded bodies with PascalCase keys. Only the
//! fields needed to derive message records are modelled; everything else
//! the provider sends is ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use wadesk_core::types::{DeliveryStatus, MediaItem, Message};
use wadesk_core::WadeskError;

/// Raw webhook form body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProviderWebhook {
    pub event_type: String,
    #[serde(default)]
    pub conversation_sid: Option<String>,
    #[serde(default)]
    pub message_sid: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    /// JSON array of media descriptors, encoded as a string.
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default, alias = "Status")]
    pub delivery_status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WebhookMedia {
    sid: String,
    content_type: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

/// A webhook reduced to what wadesk acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    MessageAdded(Message),
    ConversationAdded {
        conversation_id: String,
        created_at: DateTime<Utc>,
    },
    DeliveryUpdated {
        message_id: String,
        status: DeliveryStatus,
    },
    /// Event types wadesk does not handle.
    Ignored(String),
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, WadeskError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WadeskError::provider(format!("webhook is missing {field}")))
}

fn parse_created(raw: Option<&str>) -> Result<DateTime<Utc>, WadeskError> {
    match raw {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| WadeskError::Provider {
                message: format!("webhook DateCreated `{raw}` is not RFC 3339"),
                source: Some(Box::new(e)),
            }),
        None => Ok(Utc::now()),
    }
}

impl ProviderWebhook {
    /// Interpret the payload. Missing required fields are a provider error.
    pub fn into_event(self) -> Result<WebhookEvent, WadeskError> {
        match self.event_type.as_str() {
            "onMessageAdded" => {
                let media = match self.media.as_deref().filter(|m| !m.is_empty()) {
                    Some(json) => serde_json::from_str::<Vec<WebhookMedia>>(json)
                        .map_err(|e| WadeskError::Provider {
                            message: "webhook Media is not a JSON array".into(),
                            source: Some(Box::new(e)),
                        })?
                        .into_iter()
                        .map(|m| MediaItem {
                            sid: m.sid,
                            content_type: m.content_type,
                            filename: m.filename,
                            size: m.size,
                        })
                        .collect(),
                    None => Vec::new(),
                };
                Ok(WebhookEvent::MessageAdded(Message {
                    id: required(&self.message_sid, "MessageSid")?.to_string(),
                    conversation_id: required(&self.conversation_sid, "ConversationSid")?
                        .to_string(),
                    body: self.body.unwrap_or_default(),
                    author: self.author.unwrap_or_default(),
                    created_at: parse_created(self.date_created.as_deref())?,
                    delivery_status: DeliveryStatus::default(),
                    media,
                }))
            }
            "onConversationAdded" => Ok(WebhookEvent::ConversationAdded {
                conversation_id: required(&self.conversation_sid, "ConversationSid")?.to_string(),
                created_at: parse_created(self.date_created.as_deref())?,
            }),
            "onDeliveryUpdated" => {
                let raw = required(&self.delivery_status, "DeliveryStatus")?;
                let status = raw.parse::<DeliveryStatus>().map_err(|e| WadeskError::Provider {
                    message: format!("unknown delivery status `{raw}`"),
                    source: Some(Box::new(e)),
                })?;
                Ok(WebhookEvent::DeliveryUpdated {
                    message_id: required(&self.message_sid, "MessageSid")?.to_string(),
                    status,
                })
            }
            other => Ok(WebhookEvent::Ignored(other.to_string())),
        }
    }
}
