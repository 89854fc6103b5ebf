// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for wadesk.
//!
//! This crate provides the error type, the domain types (messages, events,
//! pages), and the adapter traits for the remote messaging provider and the
//! message store. Server and client crates depend only on these seams.

pub mod error;
pub mod traits;
pub mod types;

pub use error::WadeskError;
pub use types::{
    AdapterType, ConnectionId, ConversationSummary, DeliveryStatus, Event, HealthStatus, Message,
    Page, PageRequest, UpsertOutcome,
};

pub use traits::{MessageStore, PluginAdapter, ProviderAdapter};
