// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events endpoint.
//!
//! `GET /events` registers the caller with the hub, greets it with a
//! `connected` frame, and keeps a heartbeat running until the response body
//! is dropped. Each frame is a single `data: <json>` event:
//!
//! ```text
//! data: {"type":"connected","message":"connected to wadesk event stream"}
//!
//! data: {"type":"heartbeat","timestamp":1767225600000}
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, header},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, Sse},
    },
};
use futures::stream::{self, Stream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use wadesk_core::types::{ConnectionId, Event};

use crate::handlers::ApiError;
use crate::hub::{ChannelSink, Hub};
use crate::liveness::spawn_heartbeat;
use crate::server::GatewayState;

const GREETING: &str = "connected to wadesk event stream";

/// Unregisters the connection and stops its heartbeat when the response
/// body is dropped, whichever side ended it.
struct StreamGuard {
    hub: Arc<Hub>,
    id: ConnectionId,
    cancel: CancellationToken,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.hub.unregister(&self.id);
    }
}

fn frames(
    rx: mpsc::Receiver<Arc<str>>,
    guard: StreamGuard,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let frame = tokio::select! {
            frame = rx.recv() => frame?,
            _ = guard.cancel.cancelled() => return None,
        };
        Some((Ok(SseEvent::default().data(&*frame)), (rx, guard)))
    })
}

/// GET /events
pub async fn events_handler(State(state): State<GatewayState>) -> Response {
    let (tx, rx) = mpsc::channel::<Arc<str>>(state.hub_config.outbound_buffer.max(1));
    let id = match state.hub.register(Arc::new(ChannelSink::new(tx))) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "event stream rejected");
            return ApiError(e).into_response();
        }
    };

    let greeting = Event::Connected {
        message: GREETING.to_string(),
    };
    state.hub.send_to(&id, &greeting);

    let cancel = state.shutdown.child_token();
    spawn_heartbeat(
        state.hub.clone(),
        id.clone(),
        state.hub_config.heartbeat_interval(),
        cancel.clone(),
    );
    let guard = StreamGuard {
        hub: state.hub.clone(),
        id,
        cancel,
    };

    let mut response = Sse::new(frames(rx, guard)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store"),
    );
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
