// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for wadesk integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without a real messaging provider.
//!
//! # Components
//!
//! - [`MockProvider`] - In-memory provider with injectable remote messages
//! - [`InMemoryStore`] - `MessageStore` without SQLite
//! - [`TestHarness`] - Temp SQLite store, mock provider, and tuned config

pub mod harness;
pub mod memory_store;
pub mod mock_provider;

pub use harness::TestHarness;
pub use memory_store::InMemoryStore;
pub use mock_provider::{MockProvider, message};
