// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wadesk serve` command implementation.
//!
//! Opens the message store, connects the provider client, and runs the
//! gateway until a shutdown signal arrives.

use std::sync::Arc;

use tracing::{info, warn};

use wadesk_config::model::WadeskConfig;
use wadesk_core::{MessageStore, PluginAdapter, WadeskError};
use wadesk_gateway::Gateway;
use wadesk_storage::SqliteStorage;
use wadesk_whatsapp::ProviderClient;

use crate::shutdown;

pub async fn run_serve(config: WadeskConfig) -> Result<(), WadeskError> {
    info!("starting wadesk serve");

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let provider = Arc::new(ProviderClient::new(&config.provider)?);
    if config.provider.account_sid.is_none() {
        warn!("provider credentials not configured, requests are sent unauthenticated");
    }

    let gateway = Gateway::new(&config, provider, storage.clone());
    let addr = gateway.start().await?;
    info!(%addr, "wadesk serving");

    let cancel = shutdown::install_signal_handler();
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = gateway.stopped() => {}
    }

    gateway.shutdown().await?;
    storage.close().await?;
    info!("wadesk serve stopped");
    Ok(())
}
