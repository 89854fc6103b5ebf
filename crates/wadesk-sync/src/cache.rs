// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation cache with time-bounded freshness and per-conversation merges.
//!
//! Listings are cached per query key (agent, page, lite) and served without a
//! provider round trip while younger than the freshness window. Message lists
//! are cached per conversation; every mutation of one conversation goes
//! through that conversation's async mutex, so a forced refresh and a live
//! merge never interleave.
//!
//! Nothing outlives the stale-serving bound: expired listings are dropped on
//! every insert and, with idle conversations, by [`ConversationCache::evict_expired`].
//! Listing pages are additionally capped, oldest first.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use wadesk_config::model::CacheConfig;
use wadesk_core::types::{ConversationSummary, Message, Page, PageRequest, UpsertOutcome};
use wadesk_core::{ProviderAdapter, WadeskError};

/// Cache key of a conversation listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingQuery {
    /// Requesting agent; listings are cached separately per agent.
    pub agent: Option<String>,
    pub limit: usize,
    pub after: Option<String>,
    /// Skip the per-conversation participant lookups.
    pub lite: bool,
}

impl ListingQuery {
    pub fn first_page(limit: usize) -> Self {
        Self {
            agent: None,
            limit,
            after: None,
            lite: false,
        }
    }
}

/// A listing as served to a caller.
#[derive(Debug, Clone)]
pub struct Listing {
    pub page: Page<ConversationSummary>,
    /// Served from cache rather than fetched for this call.
    pub cached: bool,
    /// Past the freshness window; only returned by [`ConversationCache::stale_listing`].
    pub stale: bool,
    pub fetched_at: DateTime<Utc>,
}

struct ListingEntry {
    page: Page<ConversationSummary>,
    fetched: Instant,
    fetched_at: DateTime<Utc>,
    invalidated: bool,
}

/// Snapshot of one conversation's cached messages.
#[derive(Debug, Clone)]
pub struct CachedConversation {
    pub conversation_id: String,
    /// Ascending by `(created_at, id)`, no duplicate ids.
    pub messages: Vec<Message>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub is_stale: bool,
}

struct MessageState {
    messages: Vec<Message>,
    synced: Option<Instant>,
    last_synced_at: Option<DateTime<Utc>>,
    touched: Instant,
}

impl Default for MessageState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            synced: None,
            last_synced_at: None,
            touched: Instant::now(),
        }
    }
}

#[derive(Default)]
struct ConversationSlot {
    state: Mutex<MessageState>,
    stale: AtomicBool,
}

/// Conversation Cache Service.
pub struct ConversationCache {
    provider: Arc<dyn ProviderAdapter>,
    fresh: Duration,
    max_stale: Duration,
    max_listings: usize,
    message_limit: usize,
    listings: DashMap<ListingQuery, ListingEntry>,
    conversations: DashMap<String, Arc<ConversationSlot>>,
}

impl ConversationCache {
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        config: &CacheConfig,
        message_limit: usize,
    ) -> Self {
        Self {
            provider,
            fresh: Duration::from_secs(config.fresh_secs),
            max_stale: Duration::from_secs(config.max_stale_secs),
            max_listings: config.max_listings.max(1),
            message_limit,
            listings: DashMap::new(),
            conversations: DashMap::new(),
        }
    }

    fn slot(&self, conversation_id: &str) -> Arc<ConversationSlot> {
        self.conversations
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }

    /// Return a listing, fetching from the provider unless a fresh, valid
    /// entry exists. Provider failures propagate and leave the cache as is.
    pub async fn get_conversations(
        &self,
        query: &ListingQuery,
        force_refresh: bool,
    ) -> Result<Listing, WadeskError> {
        if !force_refresh && let Some(listing) = self.fresh_listing(query) {
            debug!(limit = query.limit, "listing served from cache");
            return Ok(listing);
        }

        let request = PageRequest {
            limit: query.limit,
            after: query.after.clone(),
        };
        let mut items = self.provider.list_conversations(&request).await?;
        if !query.lite {
            for summary in &mut items {
                summary.participants = self.provider.list_participants(&summary.id).await?;
            }
        }

        let page = Page::from_fetch(items, query.limit);
        let fetched_at = Utc::now();
        self.make_room_for(query);
        self.listings.insert(
            query.clone(),
            ListingEntry {
                page: page.clone(),
                fetched: Instant::now(),
                fetched_at,
                invalidated: false,
            },
        );
        debug!(
            count = page.items.len(),
            force_refresh, "listing fetched from provider"
        );
        Ok(Listing {
            page,
            cached: false,
            stale: false,
            fetched_at,
        })
    }

    fn fresh_listing(&self, query: &ListingQuery) -> Option<Listing> {
        let entry = self.listings.get(query)?;
        if entry.invalidated || entry.fetched.elapsed() >= self.fresh {
            return None;
        }
        Some(Listing {
            page: entry.page.clone(),
            cached: true,
            stale: false,
            fetched_at: entry.fetched_at,
        })
    }

    /// Drop expired listings, then the oldest ones while a new key would
    /// exceed the cap.
    fn make_room_for(&self, query: &ListingQuery) {
        self.evict_expired_listings();
        if self.listings.contains_key(query) {
            return;
        }
        while self.listings.len() >= self.max_listings {
            let oldest = self
                .listings
                .iter()
                .min_by_key(|entry| entry.fetched)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.listings.remove(&key);
                }
                None => break,
            }
        }
    }

    /// A previously fetched listing no older than the stale-serving bound,
    /// for callers falling back after a provider failure.
    pub fn stale_listing(&self, query: &ListingQuery) -> Option<Listing> {
        let entry = self.listings.get(query)?;
        if entry.fetched.elapsed() > self.max_stale {
            return None;
        }
        Some(Listing {
            page: entry.page.clone(),
            cached: true,
            stale: true,
            fetched_at: entry.fetched_at,
        })
    }

    /// Return a conversation's messages, refetching when forced, stale, or
    /// past the freshness window. A refetch replaces the list wholesale.
    pub async fn get_messages(
        &self,
        conversation_id: &str,
        force_refresh: bool,
    ) -> Result<CachedConversation, WadeskError> {
        let slot = self.slot(conversation_id);
        let mut state = slot.state.lock().await;
        state.touched = Instant::now();

        let fresh = state.synced.is_some_and(|at| at.elapsed() < self.fresh);
        if !force_refresh && fresh && !slot.stale.load(Ordering::SeqCst) {
            return Ok(snapshot(conversation_id, &state, false));
        }

        let fetched = self
            .provider
            .list_messages(conversation_id, &PageRequest::first(self.message_limit))
            .await;
        let mut messages = match fetched {
            Ok(messages) => messages,
            Err(e) => {
                let empty = state.synced.is_none() && state.messages.is_empty();
                drop(state);
                if empty {
                    self.conversations
                        .remove_if(conversation_id, |_, held| Arc::ptr_eq(held, &slot));
                }
                return Err(e);
            }
        };
        messages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        messages.dedup_by(|a, b| a.id == b.id);

        state.messages = messages;
        state.synced = Some(Instant::now());
        state.last_synced_at = Some(Utc::now());
        slot.stale.store(false, Ordering::SeqCst);
        debug!(
            conversation_id,
            count = state.messages.len(),
            "conversation messages refetched"
        );
        Ok(snapshot(conversation_id, &state, false))
    }

    /// Upsert `msg` into its conversation's cached list, creating the
    /// conversation if absent. Known ids only advance their delivery status.
    pub async fn merge_message(&self, msg: &Message) -> UpsertOutcome {
        let slot = self.slot(&msg.conversation_id);
        let mut state = slot.state.lock().await;
        state.touched = Instant::now();

        if let Some(existing) = state.messages.iter_mut().find(|m| m.id == msg.id) {
            if existing.delivery_status.advances_to(msg.delivery_status) {
                existing.delivery_status = msg.delivery_status;
                return UpsertOutcome::StatusUpdated;
            }
            return UpsertOutcome::Unchanged;
        }

        let key = msg.sort_key();
        let at = state.messages.partition_point(|m| m.sort_key() < key);
        state.messages.insert(at, msg.clone());
        UpsertOutcome::Inserted
    }

    /// Mark one conversation stale so the next read bypasses the freshness
    /// window. Listings that contain it are refetched on next access. A
    /// conversation that is not cached has nothing to mark.
    pub fn invalidate(&self, conversation_id: &str) {
        if let Some(slot) = self.conversations.get(conversation_id) {
            slot.stale.store(true, Ordering::SeqCst);
        }
        for mut entry in self.listings.iter_mut() {
            if entry.page.items.iter().any(|c| c.id == conversation_id) {
                entry.invalidated = true;
            }
        }
        debug!(conversation_id, "conversation invalidated");
    }

    /// Force every cached listing to refetch, e.g. after a new conversation.
    pub fn invalidate_listings(&self) {
        for mut entry in self.listings.iter_mut() {
            entry.invalidated = true;
        }
    }

    /// Current cached snapshot without touching the provider.
    pub async fn cached(&self, conversation_id: &str) -> Option<CachedConversation> {
        let slot = self.conversations.get(conversation_id)?.clone();
        let state = slot.state.lock().await;
        Some(snapshot(
            conversation_id,
            &state,
            slot.stale.load(Ordering::SeqCst),
        ))
    }

    /// Ids currently cached for a conversation.
    pub async fn message_ids(&self, conversation_id: &str) -> HashSet<String> {
        match self.conversations.get(conversation_id).map(|s| s.clone()) {
            Some(slot) => slot
                .state
                .lock()
                .await
                .messages
                .iter()
                .map(|m| m.id.clone())
                .collect(),
            None => HashSet::new(),
        }
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    pub fn listing_count(&self) -> usize {
        self.listings.len()
    }

    /// Drop listings too old to be served even as a stale fallback, and
    /// conversations untouched for as long. A conversation whose lock is
    /// held is in use and kept. Returns how many entries went.
    pub fn evict_expired(&self) -> usize {
        let listings = self.evict_expired_listings();
        let before = self.conversations.len();
        self.conversations.retain(|_, slot| match slot.state.try_lock() {
            Ok(state) => state.touched.elapsed() <= self.max_stale,
            Err(_) => true,
        });
        let conversations = before.saturating_sub(self.conversations.len());
        if listings + conversations > 0 {
            debug!(listings, conversations, "expired cache entries evicted");
        }
        listings + conversations
    }

    fn evict_expired_listings(&self) -> usize {
        let before = self.listings.len();
        self.listings
            .retain(|_, entry| entry.fetched.elapsed() <= self.max_stale);
        before.saturating_sub(self.listings.len())
    }
}

fn snapshot(conversation_id: &str, state: &MessageState, is_stale: bool) -> CachedConversation {
    CachedConversation {
        conversation_id: conversation_id.to_string(),
        messages: state.messages.clone(),
        last_synced_at: state.last_synced_at,
        is_stale,
    }
}
