// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for wadesk.

use thiserror::Error;

/// The primary error type used across all wadesk adapter traits and core operations.
#[derive(Debug, Error)]
pub enum WadeskError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Remote messaging provider errors (HTTP failure, unexpected status, bad payload).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Push transport errors (stream open failure, broken sink, closed stream).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The connection registry is full; the caller must be rejected explicitly.
    #[error("connection capacity exceeded (limit {limit})")]
    CapacityExceeded { limit: usize },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WadeskError {
    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Whether retrying the same operation later can reasonably succeed.
    ///
    /// Provider, transport, storage, and timeout failures are transient;
    /// configuration and internal errors are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. }
                | Self::Transport { .. }
                | Self::Storage { .. }
                | Self::Timeout { .. }
                | Self::CapacityExceeded { .. }
        )
    }
}
