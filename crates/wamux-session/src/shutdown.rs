// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process signal handling for graceful shutdown.
//!
//! SIGTERM and SIGINT (Ctrl+C) cancel a [`CancellationToken`] that the HTTP
//! server and the binary watch. Closing sessions afterwards is bounded by
//! [`close_with_grace`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::manager::SessionManager;

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => info!("received SIGINT, shutting down"),
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                _ = token_clone.cancelled() => return,
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = ctrl_c => info!("received Ctrl+C, shutting down"),
                _ = token_clone.cancelled() => return,
            }
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Close every session, giving up after `grace`.
///
/// Returns `true` when the manager closed cleanly within the grace period.
pub async fn close_with_grace(manager: &SessionManager, grace: Duration) -> bool {
    match tokio::time::timeout(grace, manager.close()).await {
        Ok(Ok(())) => {
            info!("all sessions closed");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "session manager closed with errors");
            false
        }
        Err(_) => {
            warn!(?grace, "grace period elapsed before sessions closed");
            false
        }
    }
}
