// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use wadesk_config::model::{HubConfig, ServerConfig};
use wadesk_core::{ProviderAdapter, WadeskError};
use wadesk_sync::Ingestor;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;
use crate::hub::Hub;
use crate::sse;

/// Health state for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Registry of open event streams.
    pub hub: Arc<Hub>,
    /// Store and cache every accepted message flows through.
    pub ingestor: Ingestor,
    pub provider: Arc<dyn ProviderAdapter>,
    pub auth: AuthConfig,
    pub health: HealthState,
    pub hub_config: HubConfig,
    /// Upper bound on listing page size.
    pub page_size: usize,
    /// Cancelled on shutdown; ends every open event stream.
    pub shutdown: CancellationToken,
}

/// Build the gateway router.
///
/// - GET /health, POST /webhooks/provider (public)
/// - GET /events (with auth)
/// - GET /v1/conversations (with auth)
/// - GET, POST /v1/conversations/{id}/messages (with auth)
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    // The provider cannot present a bearer token.
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/webhooks/provider", post(handlers::post_provider_webhook))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/events", get(sse::events_handler))
        .route("/v1/conversations", get(handlers::get_conversations))
        .route(
            "/v1/conversations/{id}/messages",
            get(handlers::get_messages).post(handlers::post_message),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the configured host:port.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, WadeskError> {
    let addr = format!("{}:{}", config.host, config.port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| WadeskError::Transport {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Serve the gateway on an already bound listener until `state.shutdown`
/// is cancelled.
pub async fn serve(listener: TcpListener, state: GatewayState) -> Result<(), WadeskError> {
    let shutdown = state.shutdown.clone();
    let addr = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_default();
    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| WadeskError::Transport {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Local address of a bound listener, as a base URL.
pub fn base_url(addr: SocketAddr) -> String {
    format!("http://{addr}")
}
