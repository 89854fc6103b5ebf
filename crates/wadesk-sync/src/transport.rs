// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event-stream transport.
//!
//! [`EventTransport`] opens one subscription and yields the raw `data`
//! payload of every frame. [`SseTransport`] is the HTTP implementation,
//! parsing the response body with `eventsource-stream`.

use std::pin::Pin;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, HeaderValue};
use serde::Deserialize;
use tracing::debug;

use wadesk_config::model::ClientConfig;
use wadesk_core::WadeskError;

/// Frame payloads of one open subscription. The stream ends when the
/// server closes the connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, WadeskError>> + Send>>;

/// Opens event-stream subscriptions.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn open(&self) -> Result<FrameStream, WadeskError>;
}

#[derive(Debug, Deserialize)]
struct RejectionBody {
    #[serde(default)]
    limit: Option<usize>,
}

/// Server-Sent Events over HTTP.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
}

impl SseTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, WadeskError> {
        // No overall timeout: the response body is the long-lived stream.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| WadeskError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            url: config.events_url.clone(),
            bearer_token: config.bearer_token.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventTransport for SseTransport {
    async fn open(&self) -> Result<FrameStream, WadeskError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        if let Some(token) = &self.bearer_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(|e| WadeskError::Transport {
            message: format!("event stream request failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let limit = response
                .json::<RejectionBody>()
                .await
                .ok()
                .and_then(|body| body.limit)
                .unwrap_or(0);
            return Err(WadeskError::CapacityExceeded { limit });
        }
        if !status.is_success() {
            return Err(WadeskError::transport(format!(
                "event stream rejected with status {status}"
            )));
        }

        debug!(url = %self.url, "event stream opened");
        let frames = response
            .bytes_stream()
            .eventsource()
            .map(|result| match result {
                Ok(event) => Ok(event.data),
                Err(e) => Err(WadeskError::transport(format!("event stream error: {e}"))),
            });
        Ok(Box::pin(frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, token: Option<&str>) -> ClientConfig {
        ClientConfig {
            events_url: format!("{}/events", server.uri()),
            bearer_token: token.map(str::to_string),
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn yields_frame_payloads() {
        let server = MockServer::start().await;
        let body = "data: {\"type\":\"connected\",\"message\":\"hi\"}\n\n\
                    data: {\"type\":\"heartbeat\",\"timestamp\":1}\n\n";
        Mock::given(method("GET"))
            .and(path("/events"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let transport = SseTransport::new(&config(&server, Some("tok"))).unwrap();
        let frames: Vec<String> = transport
            .open()
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains("connected"));
    }

    #[tokio::test]
    async fn capacity_rejection_maps_to_capacity_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(429).set_body_json(
                serde_json::json!({"error": "connection limit reached", "limit": 3}),
            ))
            .mount(&server)
            .await;

        let transport = SseTransport::new(&config(&server, None)).unwrap();
        match transport.open().await {
            Err(WadeskError::CapacityExceeded { limit }) => assert_eq!(limit, 3),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn unauthorized_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let transport = SseTransport::new(&config(&server, None)).unwrap();
        assert!(matches!(
            transport.open().await,
            Err(WadeskError::Transport { .. })
        ));
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::channel::mpsc;

    use super::*;

    pub(crate) type Frames = mpsc::UnboundedSender<Result<String, WadeskError>>;
    pub(crate) type Script = Result<mpsc::UnboundedReceiver<Result<String, WadeskError>>, WadeskError>;

    /// Hands out pre-scripted open results; once exhausted every open fails.
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<Script>>,
        opens: AtomicUsize,
    }

    impl ScriptedTransport {
        pub(crate) fn new(script: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                opens: AtomicUsize::new(0),
            })
        }

        pub(crate) fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventTransport for ScriptedTransport {
        async fn open(&self) -> Result<FrameStream, WadeskError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(rx)) => Ok(Box::pin(rx)),
                Some(Err(e)) => Err(e),
                None => Err(WadeskError::transport("refused")),
            }
        }
    }

    /// A stream the test feeds frame by frame.
    pub(crate) fn stream() -> (Frames, Script) {
        let (tx, rx) = mpsc::unbounded();
        (tx, Ok(rx))
    }
}
