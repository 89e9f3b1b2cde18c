// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the wamux session multiplexer.

use thiserror::Error;

/// The primary error type used across all wamux traits and core operations.
#[derive(Debug, Error)]
pub enum WamuxError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// A tenant, message, chat, contact, or device blob does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A device identity is already bound to the session.
    #[error("session already authenticated")]
    AlreadyAuthenticated,

    /// The requested operation does not fit the session's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Protocol client errors (connect failure, pairing failure, bridge unreachable).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Caller presented no valid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Caller is authenticated but may not touch the requested tenant.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed caller input (bad phone number, bad body).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WamuxError {
    /// Shorthand for a missing session.
    pub fn session_not_found(phone: &str) -> Self {
        WamuxError::NotFound {
            kind: "session",
            id: phone.to_string(),
        }
    }

    /// Shorthand for a transport failure without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        WamuxError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WamuxError::NotFound { .. })
    }
}
