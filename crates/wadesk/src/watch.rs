// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wadesk watch` command implementation.
//!
//! Runs a [`SyncClient`] against the configured gateway, logging connection
//! state transitions until a shutdown signal arrives.

use std::sync::Arc;

use tracing::{error, info};

use wadesk_config::model::WadeskConfig;
use wadesk_core::{MessageStore, WadeskError};
use wadesk_storage::SqliteStorage;
use wadesk_sync::{ConnectionState, SseTransport, SyncClient};
use wadesk_whatsapp::ProviderClient;

use crate::shutdown;

pub async fn run_watch(config: WadeskConfig) -> Result<(), WadeskError> {
    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let transport = Arc::new(SseTransport::new(&config.client)?);
    let provider = Arc::new(ProviderClient::new(&config.provider)?);
    let client = SyncClient::new(&config, transport, provider, storage.clone());
    info!(url = %config.client.events_url, "watching event stream");
    client.start();

    let cancel = shutdown::install_signal_handler();
    let mut state = client.subscribe_state();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().clone();
                match &current {
                    ConnectionState::Disconnected => {
                        error!("event stream unavailable, continuing on polling only");
                    }
                    other => info!(state = %other, "connection state changed"),
                }
            }
        }
    }

    client.shutdown().await;
    info!(
        pending_recovery = client.recovery().len(),
        conversations = client.cache().conversation_count(),
        "watch stopped"
    );
    storage.close().await?;
    Ok(())
}
