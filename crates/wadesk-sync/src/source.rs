// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unified ingest path and the sync sources feeding it.
//!
//! Live pushes, recovery replays, and poll results all land through
//! [`Ingestor::ingest`], so every path applies the same identity dedup in
//! the store and the same ordered merge in the cache.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use wadesk_core::types::{Message, UpsertOutcome};
use wadesk_core::{MessageStore, WadeskError};

use crate::cache::ConversationCache;
use crate::reconnect::ConnectionState;
use crate::recovery::RecoveryQueue;

/// Where an ingested message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Origin {
    Live,
    Recovery,
    Poll,
}

/// Persists a message, then merges it into the cache.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn MessageStore>,
    cache: Arc<ConversationCache>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn MessageStore>, cache: Arc<ConversationCache>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<ConversationCache> {
        &self.cache
    }

    /// Upsert into the store and merge into the cache. The store outcome is
    /// returned; a store failure leaves the cache untouched.
    pub async fn ingest(&self, msg: &Message, origin: Origin) -> Result<UpsertOutcome, WadeskError> {
        let outcome = self.store.upsert_message(msg).await?;
        self.cache.merge_message(msg).await;
        debug!(
            message_id = %msg.id,
            conversation_id = %msg.conversation_id,
            %origin,
            %outcome,
            "message ingested"
        );
        Ok(outcome)
    }
}

/// Which source reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SourceKind {
    Push,
    Poll,
}

/// Summary of one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Messages newly persisted.
    pub applied: usize,
    /// Messages already known.
    pub skipped: usize,
    /// Conversations invalidated instead of replayed.
    pub invalidated: usize,
    /// The pass did not run because another one was in flight or throttled.
    pub deferred: bool,
}

/// A way of bringing the local view up to date with the provider.
#[async_trait]
pub trait ConversationSyncSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn reconcile(&self, ingestor: &Ingestor) -> Result<ReconcileReport, WadeskError>;
}

/// Push-side reconciliation: replays what the recovery queue holds.
pub struct PushRecovery {
    queue: Arc<RecoveryQueue>,
}

impl PushRecovery {
    pub fn new(queue: Arc<RecoveryQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl ConversationSyncSource for PushRecovery {
    fn kind(&self) -> SourceKind {
        SourceKind::Push
    }

    async fn reconcile(&self, ingestor: &Ingestor) -> Result<ReconcileReport, WadeskError> {
        Ok(match self.queue.drain(ingestor).await? {
            Some(report) => ReconcileReport {
                applied: report.replayed,
                skipped: report.skipped_duplicates,
                invalidated: report.expired,
                deferred: false,
            },
            None => ReconcileReport {
                deferred: true,
                ..ReconcileReport::default()
            },
        })
    }
}

/// Pick the source for a periodic reconcile given the transport state.
///
/// Push recovery is enough while the stream is healthy; polling covers
/// any other state, or every tick when configured always-on.
pub fn select_source<'a>(
    state: &ConnectionState,
    degraded: bool,
    always_poll: bool,
    push: &'a dyn ConversationSyncSource,
    poll: &'a dyn ConversationSyncSource,
) -> &'a dyn ConversationSyncSource {
    if state.is_connected() && !degraded && !always_poll {
        push
    } else {
        poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wadesk_config::model::CacheConfig;
    use wadesk_test_utils::{InMemoryStore, MockProvider, message};

    fn ingestor(store: &InMemoryStore) -> Ingestor {
        let cache = ConversationCache::new(
            Arc::new(MockProvider::new()),
            &CacheConfig::default(),
            50,
        );
        Ingestor::new(Arc::new(store.clone()), Arc::new(cache))
    }

    #[tokio::test]
    async fn ingest_persists_and_caches_once() {
        let store = InMemoryStore::new();
        let ingestor = ingestor(&store);
        let msg = message("IM1", "CH1", 0);

        assert!(ingestor.ingest(&msg, Origin::Live).await.unwrap().is_new());
        assert_eq!(
            ingestor.ingest(&msg, Origin::Poll).await.unwrap(),
            UpsertOutcome::Unchanged
        );
        assert_eq!(store.len().await, 1);
        assert_eq!(ingestor.cache().message_ids("CH1").await.len(), 1);
    }

    #[tokio::test]
    async fn store_failure_skips_cache() {
        let store = InMemoryStore::new();
        store.set_failing(true);
        let ingestor = ingestor(&store);
        assert!(
            ingestor
                .ingest(&message("IM1", "CH1", 0), Origin::Live)
                .await
                .is_err()
        );
        assert!(ingestor.cache().message_ids("CH1").await.is_empty());
    }

    struct Fixed(SourceKind);

    #[async_trait]
    impl ConversationSyncSource for Fixed {
        fn kind(&self) -> SourceKind {
            self.0
        }

        async fn reconcile(&self, _: &Ingestor) -> Result<ReconcileReport, WadeskError> {
            Ok(ReconcileReport::default())
        }
    }

    #[test]
    fn selection_follows_transport_health() {
        let push = Fixed(SourceKind::Push);
        let poll = Fixed(SourceKind::Poll);
        let pick = |state: ConnectionState, degraded, always| {
            select_source(&state, degraded, always, &push, &poll).kind()
        };
        assert_eq!(pick(ConnectionState::Connected, false, false), SourceKind::Push);
        assert_eq!(pick(ConnectionState::Connected, true, false), SourceKind::Poll);
        assert_eq!(pick(ConnectionState::Connected, false, true), SourceKind::Poll);
        assert_eq!(pick(ConnectionState::Connecting, false, false), SourceKind::Poll);
        assert_eq!(
            pick(ConnectionState::Error("x".into()), false, false),
            SourceKind::Poll
        );
    }
}
