// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heartbeats and the staleness sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use wadesk_core::types::{ConnectionId, Event};
use wadesk_sync::ConversationCache;

use crate::hub::{Delivery, Hub};

/// Send a heartbeat to `id` every `interval` until cancelled or until the
/// connection is gone. The first heartbeat goes out one interval after start.
pub fn spawn_heartbeat(
    hub: Arc<Hub>,
    id: ConnectionId,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => match hub.send_to(&id, &Event::heartbeat()) {
                    Delivery::Delivered | Delivery::Dropped => {}
                    Delivery::Failed | Delivery::Unknown => break,
                },
            }
        }
        debug!(connection_id = %id, "heartbeat stopped");
    })
}

/// Periodically reclaim connections idle for longer than `stale_after`,
/// and cache entries past their stale-serving bound.
pub fn spawn_sweeper(
    hub: Arc<Hub>,
    cache: Arc<ConversationCache>,
    every: Duration,
    stale_after: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let swept = hub.sweep_stale(stale_after);
                    if !swept.is_empty() {
                        debug!(count = swept.len(), "sweep reclaimed connections");
                    }
                    cache.evict_expired();
                }
            }
        }
    })
}
