// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Handles the provider webhook, the conversation listing and message
//! routes, and the public health check.

use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use wadesk_core::WadeskError;
use wadesk_core::types::{
    ConversationPayload, ConversationSummary, Event, Message,
};
use wadesk_sync::{ListingQuery, Origin};
use wadesk_whatsapp::{ProviderWebhook, WebhookEvent};

use crate::server::GatewayState;

/// Header carrying the requesting agent's identity.
pub const AGENT_HEADER: &str = "x-agent-id";

const LISTING_CACHE_CONTROL: &str = "private, max-age=60, stale-while-revalidate=300";

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// A `WadeskError` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub WadeskError);

impl From<WadeskError> for ApiError {
    fn from(e: WadeskError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, limit) = match &self.0 {
            WadeskError::CapacityExceeded { limit } => (StatusCode::TOO_MANY_REQUESTS, Some(*limit)),
            WadeskError::Provider { .. } | WadeskError::Timeout { .. } => {
                (StatusCode::BAD_GATEWAY, None)
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };
        if status.is_server_error() {
            log_failure(&self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                limit,
            }),
        )
            .into_response()
    }
}

/// Transient failures are warnings; anything else is an error.
fn log_failure(e: &WadeskError, what: &str) {
    if e.is_recoverable() {
        warn!(error = %e, "{what}");
    } else {
        error!(error = %e, "{what}");
    }
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
            limit: None,
        }),
    )
        .into_response()
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Open event-stream connections.
    pub connections: usize,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        connections: state.hub.count(),
    })
}

/// POST /webhooks/provider
///
/// Persists and caches message events, then announces new ones to every
/// open stream. Redelivered webhooks are acknowledged without a second
/// broadcast.
pub async fn post_provider_webhook(
    State(state): State<GatewayState>,
    Form(hook): Form<ProviderWebhook>,
) -> Response {
    let event = match hook.into_event() {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "rejecting malformed webhook");
            return bad_request(e.to_string());
        }
    };

    match event {
        WebhookEvent::MessageAdded(msg) => {
            match state.ingestor.ingest(&msg, Origin::Live).await {
                Ok(outcome) if outcome.is_new() => {
                    state.hub.broadcast(&Event::for_message(&msg));
                }
                Ok(outcome) => {
                    debug!(message_id = %msg.id, %outcome, "webhook redelivery");
                }
                Err(e) => return ApiError(e).into_response(),
            }
        }
        WebhookEvent::ConversationAdded {
            conversation_id,
            created_at,
        } => {
            info!(%conversation_id, "conversation added");
            state.ingestor.cache().invalidate_listings();
            state.hub.broadcast(&Event::NewConversation {
                data: ConversationPayload {
                    conversation_id,
                    created_at,
                },
            });
        }
        WebhookEvent::DeliveryUpdated { message_id, status } => {
            let store = state.ingestor.store();
            match store.update_delivery_status(&message_id, status).await {
                Ok(true) => {
                    if let Ok(Some(msg)) = store.get_message(&message_id).await {
                        state.ingestor.cache().merge_message(&msg).await;
                    }
                }
                Ok(false) => debug!(%message_id, %status, "delivery update ignored"),
                Err(e) => return ApiError(e).into_response(),
            }
        }
        WebhookEvent::Ignored(kind) => debug!(%kind, "webhook event ignored"),
    }
    StatusCode::OK.into_response()
}

/// Query parameters for GET /v1/conversations.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingParams {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default)]
    pub lite: bool,
}

/// Response body for GET /v1/conversations. Lite listings name the list
/// `items`, full listings `conversations`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ConversationSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversations: Option<Vec<ConversationSummary>>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub cached: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
    pub timestamp: DateTime<Utc>,
}

/// GET /v1/conversations
pub async fn get_conversations(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(params): Query<ListingParams>,
) -> Response {
    let query = ListingQuery {
        agent: headers
            .get(AGENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        limit: params
            .limit
            .unwrap_or(state.page_size)
            .clamp(1, state.page_size.max(1)),
        after: params.after.filter(|a| !a.is_empty()),
        lite: params.lite,
    };

    let cache = state.ingestor.cache();
    let listing = match cache.get_conversations(&query, params.force_refresh).await {
        Ok(listing) => listing,
        Err(e) => match cache.stale_listing(&query) {
            Some(listing) => {
                log_failure(&e, "listing refresh failed, serving stale listing");
                listing
            }
            None => return ApiError(e).into_response(),
        },
    };

    let page = listing.page;
    let (items, conversations) = if query.lite {
        (Some(page.items), None)
    } else {
        (None, Some(page.items))
    };
    let mut response = Json(ListingResponse {
        items,
        conversations,
        next_cursor: page.next_cursor,
        has_more: page.has_more,
        cached: listing.cached,
        stale: listing.stale,
        timestamp: listing.fetched_at,
    })
    .into_response();
    if !params.force_refresh {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(LISTING_CACHE_CONTROL),
        );
    }
    response
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesParams {
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    pub conversation_id: String,
    pub messages: Vec<Message>,
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

/// GET /v1/conversations/{id}/messages
pub async fn get_messages(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
    Query(params): Query<MessagesParams>,
) -> Response {
    let cache = state.ingestor.cache();
    match cache.get_messages(&conversation_id, params.force_refresh).await {
        Ok(conversation) => Json(MessagesResponse {
            conversation_id: conversation.conversation_id,
            messages: conversation.messages,
            last_synced_at: conversation.last_synced_at,
            stale: conversation.is_stale,
        })
        .into_response(),
        Err(e) => match cache.cached(&conversation_id).await {
            Some(conversation) if conversation.last_synced_at.is_some() => {
                if e.is_recoverable() {
                    warn!(error = %e, %conversation_id, "message refresh failed, serving cached messages");
                } else {
                    error!(error = %e, %conversation_id, "message refresh failed, serving cached messages");
                }
                Json(MessagesResponse {
                    conversation_id: conversation.conversation_id,
                    messages: conversation.messages,
                    last_synced_at: conversation.last_synced_at,
                    stale: true,
                })
                .into_response()
            }
            _ => ApiError(e).into_response(),
        },
    }
}

/// Request body for POST /v1/conversations/{id}/messages.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub body: String,
    /// Defaults to the requesting agent from the agent header.
    #[serde(default)]
    pub author: Option<String>,
}

/// POST /v1/conversations/{id}/messages
pub async fn post_message(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SendRequest>,
) -> Response {
    if request.body.trim().is_empty() {
        return bad_request("message body must not be empty");
    }
    let author = request
        .author
        .or_else(|| {
            headers
                .get(AGENT_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "agent".to_string());

    let msg = match state
        .provider
        .send_message(&conversation_id, &request.body, &author)
        .await
    {
        Ok(msg) => msg,
        Err(e) => return ApiError(e).into_response(),
    };

    match state.ingestor.ingest(&msg, Origin::Live).await {
        Ok(outcome) if outcome.is_new() => {
            state.hub.broadcast(&Event::for_message(&msg));
        }
        Ok(_) => {}
        // The provider accepted it; its webhook will persist it later.
        Err(e) => warn!(error = %e, message_id = %msg.id, "sent message not persisted"),
    }
    (StatusCode::CREATED, Json(msg)).into_response()
}
