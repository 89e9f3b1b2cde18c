// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wamux serve` command implementation.
//!
//! Opens the SQLite store, connects to the protocol bridge, restores
//! persisted sessions, and serves the HTTP gateway until SIGINT/SIGTERM.
//! Sessions are closed afterwards within the configured grace period.

use std::sync::Arc;

use tracing::{info, warn};
use wamux_bridge::BridgeClientFactory;
use wamux_config::model::WamuxConfig;
use wamux_core::{HealthStatus, PluginAdapter, WamuxError};
use wamux_gateway::{AuthConfig, GatewayState, build_router};
use wamux_session::{SessionManager, close_with_grace, install_signal_handler};
use wamux_storage::SqliteStore;

/// Runs the `wamux serve` command.
pub async fn run_serve(config: WamuxConfig) -> Result<(), WamuxError> {
    init_tracing(&config.log.level);

    info!("starting wamux serve");

    // Fail-closed: refuse to start a gateway nobody can authenticate to.
    if config.server.bearer_token.is_none() && config.server.tenant_tokens.is_empty() {
        return Err(WamuxError::Config(
            "no API tokens configured. Set server.bearer_token or server.tenant_tokens".into(),
        ));
    }

    let store = Arc::new(SqliteStore::open(config.storage.clone()).await?);
    info!(path = %config.storage.database_path, "storage ready");

    let factory = Arc::new(BridgeClientFactory::new(&config.bridge)?);
    match factory.health_check().await? {
        HealthStatus::Healthy => info!(url = %config.bridge.base_url, "bridge reachable"),
        HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
            warn!(url = %config.bridge.base_url, reason = %reason, "bridge not healthy, continuing")
        }
    }

    let manager = Arc::new(SessionManager::new(
        store,
        factory.clone(),
        config.session.clone(),
    ));

    if config.session.restore_on_startup {
        match manager.restore_sessions().await {
            Ok(count) => info!(count, "sessions restored"),
            Err(e) => warn!(error = %e, "session restore failed, starting empty"),
        }
    }

    let cancel = install_signal_handler();

    let state = GatewayState::new(manager.clone(), &config.server);
    let app = build_router(state, AuthConfig::from_server_config(&config.server));
    let served = wamux_gateway::serve(&config.server, app, cancel.clone()).await;

    // The server may also have stopped on its own error.
    cancel.cancel();
    close_with_grace(&manager, config.server.shutdown_grace()).await;
    if let Err(e) = factory.shutdown().await {
        warn!(error = %e, "bridge factory shutdown failed");
    }
    served?;

    info!("wamux serve shutdown complete");
    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wamux={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
