// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp provider integration for wadesk.
//!
//! [`ProviderClient`] talks to the provider's Conversations REST API and
//! implements `ProviderAdapter`; [`ProviderWebhook`] models the form bodies
//! the provider posts for new messages, new conversations, and receipts.

pub mod client;
pub mod types;
pub mod webhook;

pub use client::ProviderClient;
pub use webhook::{ProviderWebhook, WebhookEvent};
