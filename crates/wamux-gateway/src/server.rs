// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use wamux_config::model::ServerConfig;
use wamux_core::WamuxError;
use wamux_session::SessionManager;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Page-size policy for message listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLimits {
    pub default: i64,
    pub max: i64,
}

impl MessageLimits {
    /// Resolve a raw `limit` query value.
    ///
    /// Missing, unparsable, or non-positive values fall back to the default;
    /// anything above the maximum is clamped.
    pub fn resolve(&self, raw: Option<&str>) -> i64 {
        match raw.and_then(|v| v.trim().parse::<i64>().ok()) {
            Some(n) if n > 0 => n.min(self.max),
            _ => self.default,
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub manager: Arc<SessionManager>,
    pub limits: MessageLimits,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(manager: Arc<SessionManager>, config: &ServerConfig) -> Self {
        Self {
            manager,
            limits: MessageLimits {
                default: config.default_message_limit,
                max: config.max_message_limit,
            },
            start_time: Instant::now(),
        }
    }
}

/// Build the full route table.
///
/// `/health` is public; everything under `/sessions` requires a bearer token.
pub fn build_router(state: GatewayState, auth: AuthConfig) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/sessions/create", post(handlers::create_session))
        .route("/sessions/list", get(handlers::list_sessions))
        .route("/sessions/{phone}/status", get(handlers::get_status))
        .route("/sessions/{phone}/connect", post(handlers::connect_session))
        .route("/sessions/{phone}/disconnect", post(handlers::disconnect_session))
        .route("/sessions/{phone}/delete", delete(handlers::delete_session))
        .route("/sessions/{phone}/qr", get(handlers::get_qr))
        .route("/sessions/{phone}/auth/status", get(handlers::get_auth_status))
        .route("/sessions/{phone}/auth/pair-phone", post(handlers::pair_phone))
        .route("/sessions/{phone}/messages", get(handlers::get_messages))
        .route(
            "/sessions/{phone}/messages/read-status",
            post(handlers::update_read_status),
        )
        .route(
            "/sessions/{phone}/messages/unread-count",
            get(handlers::get_unread_count),
        )
        .route(
            "/sessions/{phone}/messages/{chat_id}",
            get(handlers::get_chat_messages),
        )
        .route("/sessions/{phone}/chats", get(handlers::get_chats))
        .route("/sessions/{phone}/chats/{chat_id}", get(handlers::get_chat))
        .route("/sessions/{phone}/chats/{chat_id}/read", post(handlers::mark_chat_read))
        .route("/sessions/{phone}/contacts", get(handlers::get_contacts))
        .route(
            "/sessions/{phone}/contacts/{contact_id}",
            get(handlers::get_contact),
        )
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until `shutdown` is cancelled, then drain in-flight requests.
pub async fn serve(
    config: &ServerConfig,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(), WamuxError> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WamuxError::Transport {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| WamuxError::Transport {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: MessageLimits = MessageLimits {
        default: 50,
        max: 500,
    };

    #[test]
    fn limit_defaults_when_missing_or_bad() {
        assert_eq!(LIMITS.resolve(None), 50);
        assert_eq!(LIMITS.resolve(Some("abc")), 50);
        assert_eq!(LIMITS.resolve(Some("0")), 50);
        assert_eq!(LIMITS.resolve(Some("-3")), 50);
    }

    #[test]
    fn limit_is_clamped_to_max() {
        assert_eq!(LIMITS.resolve(Some("20")), 20);
        assert_eq!(LIMITS.resolve(Some("500")), 500);
        assert_eq!(LIMITS.resolve(Some("10000")), 500);
    }
}
