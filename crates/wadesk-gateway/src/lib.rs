// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for wadesk.
//!
//! Accepts provider webhooks, fans new messages out to every open event
//! stream through the [`Hub`](hub::Hub), and serves cached conversation
//! listings to agent consoles. [`Gateway`] wires the pieces together and
//! runs the server and the staleness sweep as background tasks.

pub mod auth;
pub mod handlers;
pub mod hub;
pub mod liveness;
pub mod server;
pub mod sse;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use wadesk_config::model::{ServerConfig, WadeskConfig};
use wadesk_core::types::{AdapterType, HealthStatus};
use wadesk_core::{MessageStore, PluginAdapter, ProviderAdapter, WadeskError};
use wadesk_sync::{ConversationCache, Ingestor};

use crate::auth::AuthConfig;
use crate::hub::Hub;
use crate::server::{GatewayState, HealthState};

pub use hub::{BroadcastReport, Delivery, EventSink};

struct Running {
    addr: SocketAddr,
    server: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

/// The gateway: HTTP server, connection hub, and staleness sweep.
pub struct Gateway {
    server_config: ServerConfig,
    state: GatewayState,
    running: Mutex<Option<Running>>,
}

impl Gateway {
    pub fn new(
        config: &WadeskConfig,
        provider: Arc<dyn ProviderAdapter>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        let cache = Arc::new(ConversationCache::new(
            provider.clone(),
            &config.cache,
            config.poll.message_limit,
        ));
        let state = GatewayState {
            hub: Arc::new(Hub::new(config.hub.max_connections)),
            ingestor: Ingestor::new(store, cache),
            provider,
            auth: AuthConfig {
                bearer_token: config.server.bearer_token.clone(),
            },
            health: HealthState {
                start_time: std::time::Instant::now(),
            },
            hub_config: config.hub.clone(),
            page_size: config.provider.page_size,
            shutdown: CancellationToken::new(),
        };
        Self {
            server_config: config.server.clone(),
            state,
            running: Mutex::new(None),
        }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.state.hub
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.state.ingestor
    }

    /// Bind, then serve and sweep in the background. Returns the bound
    /// address, which differs from the configured one when port 0 is used.
    pub async fn start(&self) -> Result<SocketAddr, WadeskError> {
        let mut running = self.running.lock().await;
        if let Some(running) = running.as_ref() {
            return Ok(running.addr);
        }
        if self.state.shutdown.is_cancelled() {
            return Err(WadeskError::Internal("gateway was shut down".into()));
        }

        let listener = server::bind(&self.server_config).await?;
        let addr = listener.local_addr().map_err(|e| WadeskError::Transport {
            message: "bound listener has no local address".into(),
            source: Some(Box::new(e)),
        })?;

        let state = self.state.clone();
        let server = tokio::spawn(async move {
            if let Err(e) = server::serve(listener, state).await {
                tracing::error!("gateway server error: {e}");
            }
        });
        let sweeper = liveness::spawn_sweeper(
            self.state.hub.clone(),
            self.state.ingestor.cache().clone(),
            self.state.hub_config.sweep_interval(),
            self.state.hub_config.stale_after(),
            self.state.shutdown.child_token(),
        );

        tracing::info!(
            %addr,
            max_connections = self.state.hub.max_connections(),
            "gateway started"
        );
        *running = Some(Running {
            addr,
            server,
            sweeper,
        });
        Ok(addr)
    }

    /// Resolves once shutdown has been requested.
    pub async fn stopped(&self) {
        self.state.shutdown.cancelled().await;
    }
}

#[async_trait]
impl PluginAdapter for Gateway {
    fn name(&self) -> &str {
        "gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, WadeskError> {
        let running = self.running.lock().await;
        match running.as_ref() {
            Some(r) if !r.server.is_finished() => Ok(HealthStatus::Healthy),
            Some(_) => Ok(HealthStatus::Unhealthy("server stopped".to_string())),
            None => Ok(HealthStatus::Unhealthy("server not started".to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), WadeskError> {
        self.state.shutdown.cancel();
        let running = self.running.lock().await.take();
        if let Some(running) = running {
            running.sweeper.abort();
            if let Err(e) = running.server.await
                && !e.is_cancelled()
            {
                return Err(WadeskError::Internal(format!("gateway task failed: {e}")));
            }
        }
        tracing::info!("gateway stopped");
        Ok(())
    }
}
