// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event sync for wadesk consoles.
//!
//! Keeps a local view of conversations consistent with the provider while
//! the push channel comes and goes:
//!
//! - [`ReconnectController`] owns the event subscription and its backoff.
//! - [`RecoveryQueue`] replays messages that could not be applied live.
//! - [`ConversationCache`] serves listings and message lists with bounded
//!   freshness and merges every update by message id.
//! - [`PollingFallback`] reconciles against a provider snapshot when push is
//!   unavailable.
//! - [`SyncClient`] runs all of the above over one `MessageStore`.

pub mod cache;
pub mod client;
pub mod poll;
pub mod reconnect;
pub mod recovery;
pub mod source;
pub mod transport;

pub use cache::{CachedConversation, ConversationCache, Listing, ListingQuery};
pub use client::SyncClient;
pub use poll::{PollReport, PollingFallback, TickOutcome};
pub use reconnect::{BackoffPolicy, ConnectionState, ReconnectController};
pub use recovery::{DrainReport, RecoveryQueue};
pub use source::{ConversationSyncSource, Ingestor, Origin, ReconcileReport, SourceKind};
pub use transport::{EventTransport, FrameStream, SseTransport};
