// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recovery queue.
//!
//! Holds messages observed while they could not be applied, and replays them
//! in origin order once the subscription is back. Replay goes through the
//! persisted store's identity check, so a message that reached the store by
//! another path is never applied twice.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use wadesk_config::model::RecoveryConfig;
use wadesk_core::WadeskError;
use wadesk_core::types::Message;

use crate::source::{Ingestor, Origin};

#[derive(Debug, Clone)]
struct Entry {
    message: Message,
    origin: DateTime<Utc>,
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub replayed: usize,
    pub skipped_duplicates: usize,
    /// Entries too old to replay; their conversations were invalidated.
    pub expired: usize,
}

pub struct RecoveryQueue {
    entries: Mutex<VecDeque<Entry>>,
    capacity: usize,
    replay_delay: Duration,
    max_entry_age: Duration,
    draining: AtomicBool,
}

fn oldest(entries: &VecDeque<Entry>) -> Option<(usize, DateTime<Utc>)> {
    entries
        .iter()
        .enumerate()
        .min_by_key(|(_, e)| e.origin)
        .map(|(at, e)| (at, e.origin))
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl RecoveryQueue {
    pub fn new(config: &RecoveryConfig) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: config.capacity.max(1),
            replay_delay: config.replay_delay(),
            max_entry_age: config.max_entry_age(),
            draining: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Entry>> {
        // Entries are plain data; a poisoned lock still holds a usable queue.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue `message` for replay, keyed by its creation time. When full the
    /// entry with the oldest origin is evicted and returned so the caller
    /// can invalidate that conversation instead. That may be `message`
    /// itself when it predates everything already queued.
    pub fn enqueue(&self, message: Message) -> Option<Message> {
        let origin = message.created_at;
        let mut entries = self.lock();
        if entries.len() >= self.capacity
            && let Some((at, queued)) = oldest(&entries)
        {
            let evicted = if origin < queued {
                message
            } else {
                match entries.remove(at) {
                    Some(old) => {
                        entries.push_back(Entry { message, origin });
                        old.message
                    }
                    None => message,
                }
            };
            warn!(
                message_id = %evicted.id,
                conversation_id = %evicted.conversation_id,
                "recovery queue full, oldest entry evicted"
            );
            return Some(evicted);
        }
        debug!(message_id = %message.id, queued = entries.len() + 1, "message queued for recovery");
        entries.push_back(Entry { message, origin });
        None
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Replay queued messages in ascending origin order, pacing each apply
    /// by the replay delay.
    ///
    /// Returns `Ok(None)` when another drain is already running. On failure
    /// the failed entry and everything after it stay queued; entries already
    /// applied are not re-queued.
    pub async fn drain(&self, ingestor: &Ingestor) -> Result<Option<DrainReport>, WadeskError> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("recovery drain already in progress");
            return Ok(None);
        }
        let _guard = DrainGuard(&self.draining);

        let mut batch: Vec<Entry> = self.lock().drain(..).collect();
        if batch.is_empty() {
            return Ok(Some(DrainReport::default()));
        }
        batch.sort_by_key(|e| e.origin);

        let mut report = DrainReport::default();
        let max_age = chrono::Duration::from_std(self.max_entry_age)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        let total = batch.len();

        for index in 0..total {
            if index > 0 && !self.replay_delay.is_zero() {
                tokio::time::sleep(self.replay_delay).await;
            }
            let entry = &batch[index];
            if let Err(e) = self.replay(entry, max_age, ingestor, &mut report).await {
                warn!(
                    error = %e,
                    remaining = total - index,
                    "recovery drain interrupted, re-queueing remainder"
                );
                let mut entries = self.lock();
                for entry in batch.drain(index..).rev() {
                    entries.push_front(entry);
                }
                return Err(e);
            }
        }

        info!(
            replayed = report.replayed,
            skipped = report.skipped_duplicates,
            expired = report.expired,
            "recovery drain complete"
        );
        Ok(Some(report))
    }

    async fn replay(
        &self,
        entry: &Entry,
        max_age: chrono::Duration,
        ingestor: &Ingestor,
        report: &mut DrainReport,
    ) -> Result<(), WadeskError> {
        let msg = &entry.message;
        if Utc::now() - entry.origin > max_age {
            ingestor.cache().invalidate(&msg.conversation_id);
            report.expired += 1;
            return Ok(());
        }
        if ingestor.store().get_message(&msg.id).await?.is_some() {
            ingestor.cache().merge_message(msg).await;
            report.skipped_duplicates += 1;
            return Ok(());
        }
        ingestor.ingest(msg, Origin::Recovery).await?;
        report.replayed += 1;
        Ok(())
    }
}
