// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection registry and broadcaster.
//!
//! The hub is the single owner of every open event-stream connection. All
//! sends are non-blocking: a connection whose outbound queue is full loses
//! that frame, a connection whose queue is closed is unregistered on the
//! spot. Broadcasts serialize the event once and never let one connection's
//! failure affect another.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use wadesk_core::types::{ConnectionId, Event};
use wadesk_core::WadeskError;

/// Why a non-blocking send did not deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// The outbound queue is full; the frame is dropped for this connection.
    Full,
    /// The consumer is gone.
    Closed,
}

/// Per-connection outbound side.
pub trait EventSink: Send + Sync {
    fn try_send(&self, frame: Arc<str>) -> Result<(), SinkError>;
}

/// Sink backed by a bounded channel drained by the connection's response stream.
pub struct ChannelSink(mpsc::Sender<Arc<str>>);

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Arc<str>>) -> Self {
        Self(tx)
    }
}

impl EventSink for ChannelSink {
    fn try_send(&self, frame: Arc<str>) -> Result<(), SinkError> {
        self.0.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

struct Connection {
    sink: Arc<dyn EventSink>,
    /// Milliseconds since the hub epoch of the last delivered frame.
    last_write_ms: AtomicU64,
}

/// Result of a targeted send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Dropped,
    /// The write failed and the connection was unregistered.
    Failed,
    /// No such connection.
    Unknown,
}

/// Per-broadcast counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
    pub failed: usize,
}

pub struct Hub {
    connections: DashMap<ConnectionId, Arc<Connection>>,
    /// Slots taken, including registrations still being inserted.
    reserved: AtomicUsize,
    max_connections: usize,
    epoch: Instant,
}

impl Hub {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: DashMap::new(),
            reserved: AtomicUsize::new(0),
            max_connections,
            epoch: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Register a sink, or reject it when the registry is at capacity.
    pub fn register(&self, sink: Arc<dyn EventSink>) -> Result<ConnectionId, WadeskError> {
        self.reserved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |taken| {
                (taken < self.max_connections).then_some(taken + 1)
            })
            .map_err(|_| WadeskError::CapacityExceeded {
                limit: self.max_connections,
            })?;

        let id = ConnectionId::generate();
        self.connections.insert(
            id.clone(),
            Arc::new(Connection {
                sink,
                last_write_ms: AtomicU64::new(self.now_ms()),
            }),
        );
        info!(connection_id = %id, total = self.count(), "event stream registered");
        Ok(id)
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        if self.connections.remove(id).is_some() {
            self.reserved.fetch_sub(1, Ordering::SeqCst);
            info!(connection_id = %id, total = self.count(), "event stream unregistered");
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    fn deliver(&self, conn: &Connection, frame: Arc<str>) -> Result<(), SinkError> {
        conn.sink.try_send(frame)?;
        conn.last_write_ms.store(self.now_ms(), Ordering::SeqCst);
        Ok(())
    }

    /// Send one event to one connection.
    pub fn send_to(&self, id: &ConnectionId, event: &Event) -> Delivery {
        let Some(conn) = self.connections.get(id).map(|c| c.clone()) else {
            return Delivery::Unknown;
        };
        let frame: Arc<str> = match event.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                warn!(error = %e, event = event.name(), "event not serializable");
                return Delivery::Dropped;
            }
        };
        match self.deliver(&conn, frame) {
            Ok(()) => Delivery::Delivered,
            Err(SinkError::Full) => {
                debug!(connection_id = %id, event = event.name(), "outbound queue full, frame dropped");
                Delivery::Dropped
            }
            Err(SinkError::Closed) => {
                warn!(connection_id = %id, event = event.name(), "write failed");
                self.unregister(id);
                Delivery::Failed
            }
        }
    }

    /// Send `event` to every registered connection. Connections whose write
    /// fails are unregistered after the pass; the rest are unaffected.
    pub fn broadcast(&self, event: &Event) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        if self.connections.is_empty() {
            debug!(event = event.name(), "broadcast with no connections");
            return report;
        }
        let frame: Arc<str> = match event.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                warn!(error = %e, event = event.name(), "event not serializable");
                return report;
            }
        };

        let targets: Vec<(ConnectionId, Arc<Connection>)> = self
            .connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (id, conn) in targets {
            match self.deliver(&conn, frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(SinkError::Full) => {
                    warn!(connection_id = %id, event = event.name(), "slow consumer, frame dropped");
                    report.dropped += 1;
                }
                Err(SinkError::Closed) => {
                    report.failed += 1;
                    self.unregister(&id);
                }
            }
        }

        debug!(
            event = event.name(),
            delivered = report.delivered,
            dropped = report.dropped,
            failed = report.failed,
            "broadcast complete"
        );
        report
    }

    /// Unregister every connection with no successful write for longer than
    /// `threshold`.
    pub fn sweep_stale(&self, threshold: Duration) -> Vec<ConnectionId> {
        let now = self.now_ms();
        let limit = threshold.as_millis() as u64;
        let stale: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|entry| now.saturating_sub(entry.last_write_ms.load(Ordering::SeqCst)) > limit)
            .map(|entry| entry.key().clone())
            .collect();

        for id in &stale {
            if self.unregister(id) {
                warn!(connection_id = %id, "stale event stream reclaimed");
            }
        }
        stale
    }
}
