// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer authentication for the gateway.
//!
//! Two kinds of token are accepted:
//! 1. The admin token, which may touch every tenant and create/list sessions.
//! 2. Tenant tokens, each bound to exactly one tenant phone number.
//!
//! The middleware resolves the token to a [`Principal`] and stores it in the
//! request extensions. Tenant scoping happens in the handlers, once the path
//! phone is known. When no token is configured at all, every request is
//! rejected (fail-closed).

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use wamux_config::model::ServerConfig;
use wamux_core::WamuxError;

use crate::error::ApiError;

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Admin bearer token. If `None`, admin access is disabled.
    pub admin_token: Option<String>,
    /// Tenant-scoped tokens: token -> tenant phone.
    pub tenant_tokens: Arc<BTreeMap<String, String>>,
}

impl AuthConfig {
    pub fn from_server_config(config: &ServerConfig) -> Self {
        Self {
            admin_token: config.bearer_token.clone(),
            tenant_tokens: Arc::new(config.tenant_tokens.clone()),
        }
    }

    fn is_configured(&self) -> bool {
        self.admin_token.is_some() || !self.tenant_tokens.is_empty()
    }

    /// Resolve a presented token.
    pub fn resolve(&self, token: &str) -> Option<Principal> {
        if self.admin_token.as_deref() == Some(token) {
            return Some(Principal::Admin);
        }
        self.tenant_tokens
            .get(token)
            .map(|phone| Principal::Tenant(phone.clone()))
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[redacted]"))
            .field("tenant_tokens", &self.tenant_tokens.len())
            .finish()
    }
}

/// Who is making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Admin,
    /// Holder of a token bound to this tenant phone.
    Tenant(String),
}

impl Principal {
    /// Fail with `Forbidden` unless this principal may act for `phone`.
    pub fn authorize(&self, phone: &str) -> Result<(), WamuxError> {
        match self {
            Principal::Admin => Ok(()),
            Principal::Tenant(own) if own == phone => Ok(()),
            Principal::Tenant(_) => Err(WamuxError::Forbidden(format!(
                "token is not valid for {phone}"
            ))),
        }
    }

    /// Fail with `Forbidden` unless this is the admin.
    pub fn require_admin(&self) -> Result<(), WamuxError> {
        match self {
            Principal::Admin => Ok(()),
            Principal::Tenant(_) => Err(WamuxError::Forbidden("admin token required".into())),
        }
    }
}

/// Middleware that validates the bearer token and attaches the [`Principal`].
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !auth.is_configured() {
        tracing::error!("gateway has no tokens configured -- rejecting request");
        return Err(WamuxError::Unauthorized.into());
    }

    let principal = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| auth.resolve(token));

    match principal {
        Some(principal) => {
            request.extensions_mut().insert(principal);
            Ok(next.run(request).await)
        }
        None => Err(WamuxError::Unauthorized.into()),
    }
}
