// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side sync runtime.
//!
//! [`SyncClient`] wires the reconnection controller, recovery queue,
//! conversation cache, and polling fallback around one `MessageStore`. Three
//! background tasks run once started: the controller loop, the event loop
//! applying pushed events, and the reconcile timer.
//!
//! A reconnect owes one completed poll: messages pushed while the stream was
//! down only come back that way. Until such a poll completes, every
//! reconcile tick polls, whatever the transport state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wadesk_config::model::WadeskConfig;
use wadesk_core::types::{Event, Message};
use wadesk_core::{MessageStore, ProviderAdapter, WadeskError};

use crate::cache::{CachedConversation, ConversationCache, Listing, ListingQuery};
use crate::poll::{PollingFallback, TickOutcome};
use crate::reconnect::{ConnectionState, ReconnectController};
use crate::recovery::RecoveryQueue;
use crate::source::{
    ConversationSyncSource, Ingestor, Origin, PushRecovery, ReconcileReport, SourceKind,
    select_source,
};
use crate::transport::EventTransport;

/// Buffer between the controller loop and the event loop.
const EVENT_BUFFER: usize = 256;

struct Inner {
    provider: Arc<dyn ProviderAdapter>,
    ingestor: Ingestor,
    recovery: Arc<RecoveryQueue>,
    push: PushRecovery,
    poll: PollingFallback,
    always_poll: bool,
    agent_identity: String,
    state: watch::Receiver<ConnectionState>,
    started: AtomicBool,
    /// Generation of the outstanding catch-up request, 0 when none.
    catch_up: AtomicU64,
    catch_up_requests: AtomicU64,
    cancel: CancellationToken,
}

pub struct SyncClient {
    inner: Arc<Inner>,
    controller: Mutex<Option<ReconnectController>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncClient {
    pub fn new(
        config: &WadeskConfig,
        transport: Arc<dyn EventTransport>,
        provider: Arc<dyn ProviderAdapter>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        let cache = Arc::new(ConversationCache::new(
            provider.clone(),
            &config.cache,
            config.poll.message_limit,
        ));
        let recovery = Arc::new(RecoveryQueue::new(&config.recovery));
        let controller = ReconnectController::new(transport, &config.client);
        let inner = Inner {
            ingestor: Ingestor::new(store, cache),
            push: PushRecovery::new(recovery.clone()),
            poll: PollingFallback::new(provider.clone(), &config.poll),
            provider,
            recovery,
            always_poll: config.poll.always_on,
            agent_identity: config.client.agent_identity.clone(),
            state: controller.subscribe(),
            started: AtomicBool::new(false),
            catch_up: AtomicU64::new(0),
            catch_up_requests: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        };
        Self {
            inner: Arc::new(inner),
            controller: Mutex::new(Some(controller)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the background tasks. Calling it again is a no-op.
    pub fn start(&self) {
        let Some(controller) = self
            .controller
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        else {
            return;
        };

        self.inner.started.store(true, Ordering::SeqCst);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = self.inner.cancel.clone();
        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        tasks.push(tokio::spawn(controller.run(events_tx, cancel)));
        tasks.push(tokio::spawn(event_loop(self.inner.clone(), events_rx)));
        tasks.push(tokio::spawn(reconcile_loop(self.inner.clone())));
        info!("sync client started");
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.clone()
    }

    /// True once reconnection is exhausted; polling is then the only
    /// consistency mechanism and runs on every tick.
    pub fn degraded(&self) -> bool {
        self.inner.degraded()
    }

    /// True while a reconnect's catch-up poll has not completed yet.
    pub fn catch_up_pending(&self) -> bool {
        self.inner.catch_up.load(Ordering::SeqCst) != 0
    }

    pub fn cache(&self) -> &Arc<ConversationCache> {
        self.inner.ingestor.cache()
    }

    pub fn recovery(&self) -> &Arc<RecoveryQueue> {
        &self.inner.recovery
    }

    pub async fn conversations(
        &self,
        query: &ListingQuery,
        force_refresh: bool,
    ) -> Result<Listing, WadeskError> {
        self.cache().get_conversations(query, force_refresh).await
    }

    pub async fn messages(
        &self,
        conversation_id: &str,
        force_refresh: bool,
    ) -> Result<CachedConversation, WadeskError> {
        self.cache().get_messages(conversation_id, force_refresh).await
    }

    /// Send through the provider as the configured agent and apply the
    /// result locally. While the push channel is down the message is also
    /// queued for recovery, since its echo cannot be observed.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        body: &str,
    ) -> Result<Message, WadeskError> {
        let inner = &self.inner;
        let msg = inner
            .provider
            .send_message(conversation_id, body, &inner.agent_identity)
            .await?;
        let connected = inner.state.borrow().is_connected();
        match inner.ingestor.ingest(&msg, Origin::Live).await {
            Ok(_) if connected => {}
            Ok(_) => inner.enqueue(msg.clone()),
            Err(e) => {
                warn!(error = %e, message_id = %msg.id, "sent message not stored, queued for recovery");
                inner.enqueue(msg.clone());
            }
        }
        Ok(msg)
    }

    /// Run the source the current transport state selects, right now.
    pub async fn reconcile_now(&self) -> Result<ReconcileReport, WadeskError> {
        self.inner.reconcile().await
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "sync task ended abnormally");
            }
        }
        debug!("sync client stopped");
    }
}

impl Inner {
    fn degraded(&self) -> bool {
        self.started.load(Ordering::SeqCst)
            && !self.cancel.is_cancelled()
            && *self.state.borrow() == ConnectionState::Disconnected
    }

    fn enqueue(&self, msg: Message) {
        if let Some(evicted) = self.recovery.enqueue(msg) {
            self.ingestor.cache().invalidate(&evicted.conversation_id);
        }
    }

    async fn apply(&self, event: Event) {
        match event {
            Event::NewMessage { data } | Event::NewMediaMessage { data } => {
                let msg = data.to_message();
                if let Err(e) = self.ingestor.ingest(&msg, Origin::Live).await {
                    warn!(error = %e, message_id = %msg.id, "live message not applied, queued for recovery");
                    self.enqueue(msg);
                }
            }
            Event::NewConversation { data } => {
                debug!(conversation_id = %data.conversation_id, "new conversation announced");
                self.ingestor.cache().invalidate_listings();
            }
            Event::Connected { message } => debug!(%message, "server greeting"),
            Event::Heartbeat { .. } => {}
        }
    }

    async fn reconcile(&self) -> Result<ReconcileReport, WadeskError> {
        let state = self.state.borrow().clone();
        // Read before polling: only a poll started after the request settles it.
        let pending = self.catch_up.load(Ordering::SeqCst);
        let source = select_source(
            &state,
            self.degraded(),
            self.always_poll || pending != 0,
            &self.push,
            &self.poll,
        );
        let report = source.reconcile(&self.ingestor).await?;
        if pending != 0 && source.kind() == SourceKind::Poll && !report.deferred {
            self.settle_catch_up(pending);
        }
        debug!(source = %source.kind(), ?report, "reconcile finished");
        Ok(report)
    }

    fn request_catch_up(&self) -> u64 {
        let generation = self.catch_up_requests.fetch_add(1, Ordering::SeqCst) + 1;
        self.catch_up.store(generation, Ordering::SeqCst);
        generation
    }

    fn settle_catch_up(&self, generation: u64) {
        if self
            .catch_up
            .compare_exchange(generation, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            debug!("catch-up poll completed");
        }
    }

    /// On every transition to connected: drain the recovery queue, and after
    /// a reconnect catch up on anything pushed while the stream was down.
    /// A catch-up that fails or cannot run stays pending for the reconcile
    /// timer.
    async fn on_connected(&self, reconnect: bool) {
        if let Err(e) = self.push.reconcile(&self.ingestor).await {
            log_failure(&e, "recovery drain failed");
        }
        if !reconnect {
            return;
        }
        let generation = self.request_catch_up();
        match self.poll.tick_now(&self.ingestor).await {
            Ok(TickOutcome::Completed(_)) => self.settle_catch_up(generation),
            Ok(outcome) => debug!(?outcome, "catch-up poll deferred"),
            Err(e) => log_failure(&e, "catch-up poll failed, retrying on next reconcile"),
        }
    }
}

fn log_failure(e: &WadeskError, what: &str) {
    if e.is_recoverable() {
        warn!(error = %e, "{what}");
    } else {
        error!(error = %e, "{what}");
    }
}

async fn event_loop(inner: Arc<Inner>, mut events: mpsc::Receiver<Event>) {
    let mut state = inner.state.clone();
    let mut connected_before = false;
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => inner.apply(event).await,
                None => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                if state.borrow_and_update().is_connected() {
                    let reconnect = connected_before;
                    connected_before = true;
                    let inner = inner.clone();
                    tokio::spawn(async move { inner.on_connected(reconnect).await });
                }
            }
        }
    }
}

async fn reconcile_loop(inner: Arc<Inner>) {
    let period = inner.poll.interval();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = inner.reconcile().await {
                    log_failure(&e, "periodic reconcile failed");
                }
                inner.ingestor.cache().evict_expired();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use wadesk_core::types::MessagePayload;
    use wadesk_core::MessageStore;
    use wadesk_test_utils::{InMemoryStore, MockProvider, message};

    use crate::transport::scripted::{ScriptedTransport, stream};

    fn config() -> WadeskConfig {
        let mut config = WadeskConfig::default();
        config.client.base_delay_ms = 100;
        config.client.max_attempts = 2;
        config.recovery.replay_delay_ms = 10;
        config.poll.interval_secs = 5;
        config
    }

    fn frame(event: &Event) -> Result<String, WadeskError> {
        Ok(event.to_json().unwrap())
    }

    async fn wait_connected(client: &SyncClient) {
        client
            .subscribe_state()
            .wait_for(ConnectionState::is_connected)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn live_events_reach_store_and_cache() {
        let (tx, script) = stream();
        let store = InMemoryStore::new();
        let client = SyncClient::new(
            &config(),
            ScriptedTransport::new(vec![script]),
            Arc::new(MockProvider::new()),
            Arc::new(store.clone()),
        );
        client.start();
        wait_connected(&client).await;

        let msg = message("IM1", "CH1", 0);
        tx.unbounded_send(frame(&Event::for_message(&msg))).unwrap();
        tx.unbounded_send(frame(&Event::for_message(&msg))).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.len().await, 1);
        assert_eq!(client.cache().message_ids("CH1").await.len(), 1);
        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ingest_is_replayed_after_reconnect() {
        let (tx1, first) = stream();
        let (_tx2, second) = stream();
        let store = InMemoryStore::new();
        let client = SyncClient::new(
            &config(),
            ScriptedTransport::new(vec![first, second]),
            Arc::new(MockProvider::new()),
            Arc::new(store.clone()),
        );
        client.start();
        wait_connected(&client).await;

        store.set_failing(true);
        let msg = message("IM1", "CH1", -1);
        tx1.unbounded_send(Ok(Event::NewMessage {
            data: MessagePayload::from(&msg),
        }
        .to_json()
        .unwrap()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.recovery().len(), 1);

        store.set_failing(false);
        drop(tx1);
        client
            .subscribe_state()
            .wait_for(|s| matches!(s, ConnectionState::Error(_)))
            .await
            .unwrap();
        wait_connected(&client).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(client.recovery().is_empty());
        assert!(store.get_message("IM1").await.unwrap().is_some());
        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn send_while_disconnected_is_queued() {
        let provider = MockProvider::new();
        provider.add_conversation("CH1").await;
        let client = SyncClient::new(
            &config(),
            ScriptedTransport::new(Vec::new()),
            Arc::new(provider.clone()),
            Arc::new(InMemoryStore::new()),
        );

        let sent = client.send_message("CH1", "hello").await.unwrap();
        assert_eq!(sent.author, "agent");
        assert_eq!(client.recovery().len(), 1);
        assert_eq!(client.cache().message_ids("CH1").await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_reconnects_report_degraded_and_poll() {
        let provider = MockProvider::new();
        provider.add_conversation("CH1").await;
        provider.add_message(message("IM1", "CH1", -1)).await;
        let store = InMemoryStore::new();
        let client = SyncClient::new(
            &config(),
            ScriptedTransport::new(Vec::new()),
            Arc::new(provider.clone()),
            Arc::new(store.clone()),
        );
        assert!(!client.degraded());

        client.start();
        client
            .subscribe_state()
            .wait_for(|s| matches!(s, ConnectionState::Error(_)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(client.degraded());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(store.len().await, 1);
        client.shutdown().await;
        assert!(!client.degraded());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_catch_up_poll_is_retried_while_connected() {
        let provider = MockProvider::new();
        provider.add_conversation("CH1").await;
        let store = InMemoryStore::new();
        let (tx1, first) = stream();
        let (_tx2, second) = stream();
        let mut config = config();
        config.client.silence_timeout_secs = 3600;
        let client = SyncClient::new(
            &config,
            ScriptedTransport::new(vec![first, second]),
            Arc::new(provider.clone()),
            Arc::new(store.clone()),
        );
        client.start();
        wait_connected(&client).await;

        // IM2 is pushed while the stream is down, and the provider is
        // unavailable when the client comes back.
        provider.add_message(message("IM2", "CH1", -1)).await;
        provider.set_failing(true);
        drop(tx1);
        client
            .subscribe_state()
            .wait_for(|s| matches!(s, ConnectionState::Error(_)))
            .await
            .unwrap();
        wait_connected(&client).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(client.catch_up_pending());
        assert!(client.cache().message_ids("CH1").await.is_empty());

        provider.set_failing(false);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(client.state().is_connected());
        assert!(!client.catch_up_pending());
        assert!(client.cache().message_ids("CH1").await.contains("IM2"));
        assert!(store.get_message("IM2").await.unwrap().is_some());
        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn completed_catch_up_returns_to_push_recovery() {
        let provider = MockProvider::new();
        provider.add_conversation("CH1").await;
        let (tx1, first) = stream();
        let (_tx2, second) = stream();
        let mut config = config();
        config.client.silence_timeout_secs = 3600;
        let client = SyncClient::new(
            &config,
            ScriptedTransport::new(vec![first, second]),
            Arc::new(provider.clone()),
            Arc::new(InMemoryStore::new()),
        );
        client.start();
        wait_connected(&client).await;

        provider.add_message(message("IM2", "CH1", -1)).await;
        drop(tx1);
        client
            .subscribe_state()
            .wait_for(|s| matches!(s, ConnectionState::Error(_)))
            .await
            .unwrap();
        wait_connected(&client).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!client.catch_up_pending());
        assert!(client.cache().message_ids("CH1").await.contains("IM2"));
        let fetches = provider.conversation_fetches();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(provider.conversation_fetches(), fetches);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn unstarted_client_is_connecting_not_degraded() {
        let client = SyncClient::new(
            &config(),
            ScriptedTransport::new(Vec::new()),
            Arc::new(MockProvider::new()),
            Arc::new(InMemoryStore::new()),
        );
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert!(!client.degraded());
        assert!(!client.catch_up_pending());
    }
}
