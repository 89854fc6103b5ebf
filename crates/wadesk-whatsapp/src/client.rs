// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the provider's Conversations API.
//!
//! Provides [`ProviderClient`], which handles URL construction, basic
//! authentication, a single retry on transient statuses, and mapping of the
//! wire types into wadesk's domain types.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use wadesk_config::model::ProviderConfig;
use wadesk_core::types::{ConversationSummary, Message, PageRequest, Participant};
use wadesk_core::{AdapterType, HealthStatus, PluginAdapter, ProviderAdapter, WadeskError};

use crate::types::{ApiErrorResponse, ApiMessage, ConversationList, MessageList, ParticipantList};

const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Provider REST client.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
    max_retries: u32,
}

impl ProviderClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, WadeskError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WadeskError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        let credentials = match (&config.account_sid, &config.auth_token) {
            (Some(sid), Some(token)) => Some((sid.clone(), token.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            max_retries: 1,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((user, pass)) => req.basic_auth(user, Some(pass)),
            None => req,
        }
    }

    /// Sends the request built by `build`, retrying once on transient statuses,
    /// and decodes a successful body as `T`.
    async fn execute<T, F>(&self, what: &str, build: F) -> Result<T, WadeskError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let response = self
                .authorize(build())
                .send()
                .await
                .map_err(|e| WadeskError::Provider {
                    message: format!("{what}: HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, what, "provider response received");

            if status.is_success() {
                let body = response.text().await.map_err(|e| WadeskError::Provider {
                    message: format!("{what}: failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                return serde_json::from_str(&body).map_err(|e| WadeskError::Provider {
                    message: format!("{what}: failed to parse response: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, what, "transient provider error, will retry");
                attempt += 1;
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }

            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => match api_err.code {
                    Some(code) => format!("{what}: provider returned {status} ({code}): {}", api_err.message),
                    None => format!("{what}: provider returned {status}: {}", api_err.message),
                },
                Err(_) => format!("{what}: provider returned {status}: {body}"),
            };
            return Err(WadeskError::provider(message));
        }
    }
}

/// Returns true for HTTP status codes worth one retry.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

fn page_query(page: &PageRequest) -> Vec<(&'static str, String)> {
    let mut query = vec![("PageSize", page.limit.to_string())];
    if let Some(after) = &page.after {
        query.push(("PageToken", after.clone()));
    }
    query
}

#[async_trait]
impl PluginAdapter for ProviderClient {
    fn name(&self) -> &str {
        "conversations-api"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, WadeskError> {
        match self.list_conversations(&PageRequest::first(1)).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Degraded(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), WadeskError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for ProviderClient {
    async fn list_conversations(
        &self,
        page: &PageRequest,
    ) -> Result<Vec<ConversationSummary>, WadeskError> {
        let url = self.url("Conversations");
        let query = page_query(page);
        let list: ConversationList = self
            .execute("list conversations", || self.client.get(&url).query(&query))
            .await?;
        Ok(list.conversations.into_iter().map(Into::into).collect())
    }

    async fn list_participants(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Participant>, WadeskError> {
        let url = self.url(&format!("Conversations/{conversation_id}/Participants"));
        let list: ParticipantList = self
            .execute("list participants", || self.client.get(&url))
            .await?;
        Ok(list.participants.into_iter().map(Into::into).collect())
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        page: &PageRequest,
    ) -> Result<Vec<Message>, WadeskError> {
        let url = self.url(&format!("Conversations/{conversation_id}/Messages"));
        let mut query = page_query(page);
        query.push(("Order", "desc".to_string()));
        let list: MessageList = self
            .execute("list messages", || self.client.get(&url).query(&query))
            .await?;

        // Fetched newest first so that PageSize keeps the most recent ones.
        let mut messages: Vec<Message> = list.messages.into_iter().map(Into::into).collect();
        messages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(messages)
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        body: &str,
        author: &str,
    ) -> Result<Message, WadeskError> {
        let url = self.url(&format!("Conversations/{conversation_id}/Messages"));
        let form = [("Body", body), ("Author", author)];
        let created: ApiMessage = self
            .execute("send message", || self.client.post(&url).form(&form))
            .await?;
        Ok(created.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wadesk_core::types::DeliveryStatus;
    use wiremock::matchers::{body_string_contains, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> ProviderClient {
        ProviderClient::new(&ProviderConfig {
            base_url: base_url.to_string(),
            account_sid: Some("AC123".into()),
            auth_token: Some("secret".into()),
            timeout_secs: 5,
            page_size: 50,
        })
        .unwrap()
    }

    fn message_json(sid: &str, created: &str) -> serde_json::Value {
        serde_json::json!({
            "sid": sid,
            "conversation_sid": "CH1",
            "body": format!("text {sid}"),
            "author": "whatsapp:+15550001111",
            "date_created": created,
            "delivery": null,
            "media": null
        })
    }

    #[tokio::test]
    async fn list_conversations_passes_paging() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "conversations": [{
                "sid": "CH1",
                "friendly_name": "Support",
                "state": "active",
                "date_created": "2026-03-01T10:00:00Z",
                "date_updated": "2026-03-01T11:00:00Z"
            }],
            "meta": {"page_size": 1}
        });

        Mock::given(method("GET"))
            .and(path("/Conversations"))
            .and(query_param("PageSize", "1"))
            .and(query_param("PageToken", "CH0"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let page = PageRequest {
            limit: 1,
            after: Some("CH0".into()),
        };
        let conversations = client.list_conversations(&page).await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].id, "CH1");
        assert_eq!(conversations[0].friendly_name.as_deref(), Some("Support"));
    }

    #[tokio::test]
    async fn list_messages_returns_ascending() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "messages": [
                message_json("IM2", "2026-03-01T10:00:02Z"),
                message_json("IM1", "2026-03-01T10:00:01Z")
            ]
        });

        Mock::given(method("GET"))
            .and(path("/Conversations/CH1/Messages"))
            .and(query_param("Order", "desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let messages = client
            .list_messages("CH1", &PageRequest::first(50))
            .await
            .unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["IM1", "IM2"]);
    }

    #[tokio::test]
    async fn participants_carry_binding_address() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "participants": [
                {"sid": "MB1", "identity": null, "messaging_binding": {"address": "whatsapp:+15550001111"}},
                {"sid": "MB2", "identity": "agent", "messaging_binding": null}
            ]
        });
        Mock::given(method("GET"))
            .and(path("/Conversations/CH1/Participants"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let participants = test_client(&server.uri())
            .list_participants("CH1")
            .await
            .unwrap();
        assert_eq!(participants[0].address.as_deref(), Some("whatsapp:+15550001111"));
        assert_eq!(participants[1].identity.as_deref(), Some("agent"));
    }

    #[tokio::test]
    async fn send_message_posts_form() {
        let server = MockServer::start().await;
        let mut created = message_json("IM9", "2026-03-01T10:00:09Z");
        created["delivery"] = serde_json::json!({"sent": "all", "delivered": "none", "read": "none", "failed": "none", "undelivered": "none"});

        Mock::given(method("POST"))
            .and(path("/Conversations/CH1/Messages"))
            .and(body_string_contains("Body=hello+there"))
            .and(body_string_contains("Author=agent"))
            .respond_with(ResponseTemplate::new(201).set_body_json(&created))
            .expect(1)
            .mount(&server)
            .await;

        let msg = test_client(&server.uri())
            .send_message("CH1", "hello there", "agent")
            .await
            .unwrap();
        assert_eq!(msg.id, "IM9");
        assert_eq!(msg.delivery_status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn retries_once_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Conversations/CH1/Participants"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Conversations/CH1/Participants"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"participants": []})),
            )
            .mount(&server)
            .await;

        let participants = test_client(&server.uri())
            .list_participants("CH1")
            .await
            .unwrap();
        assert!(participants.is_empty());
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Conversations"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "code": 20404,
                "message": "The requested resource was not found"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .list_conversations(&PageRequest::first(10))
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("20404"), "got: {text}");
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn health_check_reports_degraded_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Conversations"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let status = test_client(&server.uri()).health_check().await.unwrap();
        assert!(matches!(status, HealthStatus::Degraded(_)));
    }
}
