// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconnection Controller.
//!
//! A single control loop owns the subscription: it opens the transport,
//! forwards parsed events, watches for silence, and schedules reconnects with
//! capped exponential backoff. Because only this loop schedules anything,
//! there is never more than one pending reconnect or health check.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wadesk_config::model::ClientConfig;
use wadesk_core::Event;

use crate::transport::{EventTransport, FrameStream};

/// Observable state of the event subscription.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    /// Initial state, and each (re)connect attempt.
    Connecting,
    Connected,
    Error(String),
    /// Terminal: shut down or out of attempts.
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub growth_factor: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            base: config.base_delay(),
            growth_factor: config.growth_factor,
            max_delay: config.max_delay(),
            max_attempts: config.max_attempts,
        }
    }

    /// `base * growth_factor^attempt`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.growth_factor.powi(attempt.min(i32::MAX as u32) as i32);
        let millis = self.base.as_millis() as f64 * factor;
        let cap = self.max_delay.as_millis() as f64;
        if !millis.is_finite() || millis >= cap {
            self.max_delay
        } else {
            Duration::from_millis(millis as u64)
        }
    }
}

/// Why a live subscription ended.
enum Ended {
    Cancelled,
    Failed(String),
}

pub struct ReconnectController {
    transport: Arc<dyn EventTransport>,
    policy: BackoffPolicy,
    health_check_interval: Duration,
    silence_timeout: Duration,
    state: watch::Sender<ConnectionState>,
}

impl ReconnectController {
    pub fn new(transport: Arc<dyn EventTransport>, config: &ClientConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            transport,
            policy: BackoffPolicy::from_config(config),
            health_check_interval: config.health_check_interval(),
            silence_timeout: config.silence_timeout(),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = %current, to = %next, "connection state changed");
            *current = next;
            true
        });
    }

    /// Run until cancelled or out of attempts. Parsed events are forwarded
    /// to `events`; the loop stops if that receiver is dropped.
    pub async fn run(self, events: mpsc::Sender<Event>, cancel: CancellationToken) {
        let mut attempts: u32 = 0;
        loop {
            self.set(ConnectionState::Connecting);
            let opened = tokio::select! {
                _ = cancel.cancelled() => break,
                opened = self.transport.open() => opened,
            };

            match opened {
                Ok(frames) => {
                    info!("event stream connected");
                    self.set(ConnectionState::Connected);
                    attempts = 0;
                    match self.pump(frames, &events, &cancel).await {
                        Ended::Cancelled => break,
                        Ended::Failed(reason) => {
                            warn!(%reason, "event stream lost");
                            self.set(ConnectionState::Error(reason));
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempts + 1, "event stream connect failed");
                    self.set(ConnectionState::Error(e.to_string()));
                }
            }

            let delay = self.policy.delay_for(attempts);
            attempts += 1;
            if attempts > self.policy.max_attempts {
                error!(
                    max_attempts = self.policy.max_attempts,
                    "giving up on event stream"
                );
                self.set(ConnectionState::Disconnected);
                return;
            }

            debug!(?delay, attempt = attempts, "reconnect scheduled");
            tokio::select! {
                _ = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
        self.set(ConnectionState::Disconnected);
    }

    async fn pump(
        &self,
        mut frames: FrameStream,
        events: &mpsc::Sender<Event>,
        cancel: &CancellationToken,
    ) -> Ended {
        let start = Instant::now() + self.health_check_interval;
        let mut health = tokio::time::interval_at(start, self.health_check_interval);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_frame = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ended::Cancelled,
                frame = frames.next() => match frame {
                    Some(Ok(data)) => {
                        last_frame = Instant::now();
                        match serde_json::from_str::<Event>(&data) {
                            Ok(event) => {
                                if events.send(event).await.is_err() {
                                    return Ended::Cancelled;
                                }
                            }
                            Err(e) => warn!(error = %e, "discarding malformed event"),
                        }
                    }
                    Some(Err(e)) => return Ended::Failed(e.to_string()),
                    None => return Ended::Failed("event stream closed".to_string()),
                },
                _ = health.tick() => {
                    if last_frame.elapsed() >= self.silence_timeout {
                        return Ended::Failed(format!(
                            "no frames for {:?}",
                            self.silence_timeout
                        ));
                    }
                }
            }
        }
    }
}
