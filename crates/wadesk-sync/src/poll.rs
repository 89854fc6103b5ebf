// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Polling fallback.
//!
//! Fetches a snapshot of recent conversations and their latest messages and
//! applies whatever the cache has not seen. Messages present locally but
//! absent remotely are reported, never deleted.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};

use wadesk_config::model::PollConfig;
use wadesk_core::types::PageRequest;
use wadesk_core::{ProviderAdapter, WadeskError};

use crate::source::{ConversationSyncSource, Ingestor, Origin, ReconcileReport, SourceKind};

/// Outcome of one poll tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub conversations: usize,
    /// Remote messages the cache did not have.
    pub merged: usize,
    /// Of those, how many the store already knew.
    pub already_stored: usize,
    /// Cached messages not in the remote snapshot.
    pub local_only: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(PollReport),
    /// Another tick is still running.
    InFlight,
    /// The previous tick started less than one interval ago.
    Throttled,
}

pub struct PollingFallback {
    provider: Arc<dyn ProviderAdapter>,
    interval: Duration,
    conversation_limit: usize,
    message_limit: usize,
    in_flight: AtomicBool,
    last_tick: Mutex<Option<Instant>>,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PollingFallback {
    pub fn new(provider: Arc<dyn ProviderAdapter>, config: &PollConfig) -> Self {
        Self {
            provider,
            interval: config.interval(),
            conversation_limit: config.conversation_limit,
            message_limit: config.message_limit,
            in_flight: AtomicBool::new(false),
            last_tick: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one tick unless one is in flight or the last one started within
    /// the interval.
    pub async fn tick(&self, ingestor: &Ingestor) -> Result<TickOutcome, WadeskError> {
        self.run(ingestor, false).await
    }

    /// Run one tick ignoring the throttle, e.g. to catch up right after a
    /// reconnect. Still refuses to overlap a running tick.
    pub async fn tick_now(&self, ingestor: &Ingestor) -> Result<TickOutcome, WadeskError> {
        self.run(ingestor, true).await
    }

    async fn run(&self, ingestor: &Ingestor, ignore_throttle: bool) -> Result<TickOutcome, WadeskError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(TickOutcome::InFlight);
        }
        let _guard = InFlight(&self.in_flight);

        {
            let mut last = self
                .last_tick
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !ignore_throttle && last.is_some_and(|at| at.elapsed() < self.interval) {
                return Ok(TickOutcome::Throttled);
            }
            *last = Some(Instant::now());
        }

        let report = self.reconcile_snapshot(ingestor).await?;
        if report.merged > 0 {
            info!(
                merged = report.merged,
                conversations = report.conversations,
                "poll applied missed messages"
            );
        } else {
            debug!(conversations = report.conversations, "poll found nothing new");
        }
        Ok(TickOutcome::Completed(report))
    }

    async fn reconcile_snapshot(&self, ingestor: &Ingestor) -> Result<PollReport, WadeskError> {
        let conversations = self
            .provider
            .list_conversations(&PageRequest::first(self.conversation_limit))
            .await?;

        let mut report = PollReport {
            conversations: conversations.len(),
            ..PollReport::default()
        };
        for conversation in &conversations {
            let remote = self
                .provider
                .list_messages(&conversation.id, &PageRequest::first(self.message_limit))
                .await?;
            let cached = ingestor.cache().message_ids(&conversation.id).await;

            report.local_only += cached
                .iter()
                .filter(|id| !remote.iter().any(|m| m.id == **id))
                .count();

            for msg in remote.iter().filter(|m| !cached.contains(&m.id)) {
                let outcome = ingestor.ingest(msg, Origin::Poll).await?;
                report.merged += 1;
                if !outcome.is_new() {
                    report.already_stored += 1;
                }
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl ConversationSyncSource for PollingFallback {
    fn kind(&self) -> SourceKind {
        SourceKind::Poll
    }

    async fn reconcile(&self, ingestor: &Ingestor) -> Result<ReconcileReport, WadeskError> {
        Ok(match self.tick(ingestor).await? {
            TickOutcome::Completed(report) => ReconcileReport {
                applied: report.merged - report.already_stored,
                skipped: report.already_stored,
                invalidated: 0,
                deferred: false,
            },
            TickOutcome::InFlight | TickOutcome::Throttled => ReconcileReport {
                deferred: true,
                ..ReconcileReport::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wadesk_config::model::CacheConfig;
    use wadesk_core::MessageStore;
    use wadesk_test_utils::{InMemoryStore, MockProvider, message};

    use crate::cache::ConversationCache;

    fn setup(provider: &MockProvider, store: &InMemoryStore) -> (PollingFallback, Ingestor) {
        let provider: Arc<dyn ProviderAdapter> = Arc::new(provider.clone());
        let cache = ConversationCache::new(provider.clone(), &CacheConfig::default(), 50);
        let poll = PollingFallback::new(
            provider,
            &PollConfig {
                interval_secs: 30,
                ..PollConfig::default()
            },
        );
        (poll, Ingestor::new(Arc::new(store.clone()), Arc::new(cache)))
    }

    #[tokio::test(start_paused = true)]
    async fn applies_only_unseen_messages() {
        let provider = MockProvider::new();
        let store = InMemoryStore::new();
        provider.add_conversation("CH1").await;
        provider.add_message(message("IM1", "CH1", -20)).await;
        provider.add_message(message("IM2", "CH1", -10)).await;
        let (poll, ingestor) = setup(&provider, &store);
        ingestor.cache().merge_message(&message("IM1", "CH1", -20)).await;
        ingestor.cache().merge_message(&message("IM-local", "CH1", -5)).await;

        let TickOutcome::Completed(report) = poll.tick(&ingestor).await.unwrap() else {
            panic!("expected a completed tick");
        };
        assert_eq!(report.merged, 1);
        assert_eq!(report.local_only, 1);
        assert!(store.get_message("IM2").await.unwrap().is_some());
        assert_eq!(ingestor.cache().message_ids("CH1").await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn throttles_within_interval() {
        let provider = MockProvider::new();
        let store = InMemoryStore::new();
        provider.add_conversation("CH1").await;
        let (poll, ingestor) = setup(&provider, &store);

        assert!(matches!(
            poll.tick(&ingestor).await.unwrap(),
            TickOutcome::Completed(_)
        ));
        assert_eq!(poll.tick(&ingestor).await.unwrap(), TickOutcome::Throttled);
        assert!(matches!(
            poll.tick_now(&ingestor).await.unwrap(),
            TickOutcome::Completed(_)
        ));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(matches!(
            poll.tick(&ingestor).await.unwrap(),
            TickOutcome::Completed(_)
        ));
        assert_eq!(provider.conversation_fetches(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_failure_releases_in_flight_guard() {
        let provider = MockProvider::new();
        let store = InMemoryStore::new();
        let (poll, ingestor) = setup(&provider, &store);

        provider.set_failing(true);
        assert!(poll.tick(&ingestor).await.is_err());
        provider.set_failing(false);
        assert!(matches!(
            poll.tick_now(&ingestor).await.unwrap(),
            TickOutcome::Completed(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_reports_through_source_trait() {
        let provider = MockProvider::new();
        let store = InMemoryStore::new();
        provider.add_conversation("CH1").await;
        provider.add_message(message("IM1", "CH1", -1)).await;
        let (poll, ingestor) = setup(&provider, &store);

        let source: &dyn ConversationSyncSource = &poll;
        let report = source.reconcile(&ingestor).await.unwrap();
        assert_eq!(report.applied, 1);
        assert!(source.reconcile(&ingestor).await.unwrap().deferred);
    }
}
