// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the wamux session multiplexer.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level wamux configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WamuxConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// HTTP server and access control settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session lifecycle settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Protocol bridge sidecar settings.
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP server configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the HTTP server to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Admin bearer token. Grants access to every tenant and to session
    /// creation/listing. `None` leaves the admin routes unreachable.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Tenant-scoped tokens: token -> tenant phone number.
    #[serde(default)]
    pub tenant_tokens: BTreeMap<String, String>,

    /// Page size for message listings when no `limit` is given.
    #[serde(default = "default_message_limit")]
    pub default_message_limit: i64,

    /// Upper bound applied to caller-supplied `limit` values.
    #[serde(default = "default_max_message_limit")]
    pub max_message_limit: i64,

    /// How long shutdown may take before in-flight work is abandoned.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("tenant_tokens", &self.tenant_tokens.len())
            .field("default_message_limit", &self.default_message_limit)
            .field("max_message_limit", &self.max_message_limit)
            .field("shutdown_grace_secs", &self.shutdown_grace_secs)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            tenant_tokens: BTreeMap::new(),
            default_message_limit: default_message_limit(),
            max_message_limit: default_max_message_limit(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl ServerConfig {
    /// Bind address in `host:port` form.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_message_limit() -> i64 {
    50
}

fn default_max_message_limit() -> i64 {
    500
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("wamux").join("wamux.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("wamux.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Upper bound on how long a QR request waits for the first code.
    #[serde(default = "default_qr_timeout_secs")]
    pub qr_timeout_secs: u64,

    /// Delay between a fresh connect and a phone pairing request.
    #[serde(default = "default_pair_settle_delay_ms")]
    pub pair_settle_delay_ms: u64,

    /// Capacity of each tenant's event queue.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Rebuild sessions from the store at startup.
    #[serde(default = "default_true")]
    pub restore_on_startup: bool,

    /// Reconnect restored sessions that have a bound device.
    #[serde(default = "default_true")]
    pub auto_connect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            qr_timeout_secs: default_qr_timeout_secs(),
            pair_settle_delay_ms: default_pair_settle_delay_ms(),
            event_buffer: default_event_buffer(),
            restore_on_startup: true,
            auto_connect: true,
        }
    }
}

impl SessionConfig {
    pub fn qr_timeout(&self) -> Duration {
        Duration::from_secs(self.qr_timeout_secs)
    }

    pub fn pair_settle_delay(&self) -> Duration {
        Duration::from_millis(self.pair_settle_delay_ms)
    }
}

fn default_qr_timeout_secs() -> u64 {
    60
}

fn default_pair_settle_delay_ms() -> u64 {
    1000
}

fn default_event_buffer() -> usize {
    256
}

fn default_true() -> bool {
    true
}

/// Protocol bridge sidecar configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Base URL of the bridge HTTP API.
    #[serde(default = "default_bridge_url")]
    pub base_url: String,

    /// Optional API key sent as a bearer token to the bridge.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Timeout for non-streaming bridge requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_bridge_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secrets() {
        let mut config = WamuxConfig::default();
        config.server.bearer_token = Some("super-secret".into());
        config
            .server
            .tenant_tokens
            .insert("tenant-secret".into(), "+15551230000".into());
        config.bridge.api_key = Some("bridge-secret".into());

        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("tenant-secret"));
        assert!(!debug.contains("bridge-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn durations() {
        let session = SessionConfig::default();
        assert_eq!(session.qr_timeout(), Duration::from_secs(60));
        assert_eq!(session.pair_settle_delay(), Duration::from_millis(1000));
        assert_eq!(ServerConfig::default().bind_addr(), "127.0.0.1:8080");
    }
}
