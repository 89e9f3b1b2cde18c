// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the wamux session multiplexer.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, `WAMUX_*` environment overrides, and miette
//! diagnostics with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use wamux_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("listening on {}", config.server.bind_addr());
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{BridgeConfig, LogConfig, ServerConfig, SessionConfig, StorageConfig, WamuxConfig};

/// Load configuration from the XDG hierarchy and validate it.
///
/// Returns either a valid `WamuxConfig` or every diagnostic found.
pub fn load_and_validate() -> Result<WamuxConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<WamuxConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<WamuxConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Serialize the effective configuration with secrets masked.
pub fn render_effective(config: &WamuxConfig) -> Result<String, ConfigError> {
    let mut masked = config.clone();
    if masked.server.bearer_token.is_some() {
        masked.server.bearer_token = Some("[REDACTED]".into());
    }
    masked.server.tenant_tokens = masked
        .server
        .tenant_tokens
        .values()
        .enumerate()
        .map(|(i, phone)| (format!("[REDACTED-{i}]"), phone.clone()))
        .collect();
    if masked.bridge.api_key.is_some() {
        masked.bridge.api_key = Some("[REDACTED]".into());
    }
    toml::to_string_pretty(&masked).map_err(|e| ConfigError::Other(e.to_string()))
}

fn finish(
    loaded: Result<WamuxConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<WamuxConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Read the TOML files of the standard hierarchy for span resolution.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut sources = Vec::new();

    if let Ok(content) = std::fs::read_to_string(loader::LOCAL_CONFIG) {
        let path = std::env::current_dir()
            .map(|d| d.join(loader::LOCAL_CONFIG).display().to_string())
            .unwrap_or_else(|_| loader::LOCAL_CONFIG.to_string());
        sources.push((path, content));
    }

    let user = loader::user_config_path();
    if let Ok(content) = std::fs::read_to_string(&user) {
        sources.push((user.display().to_string(), content));
    }

    if let Ok(content) = std::fs::read_to_string(loader::SYSTEM_CONFIG) {
        sources.push((loader::SYSTEM_CONFIG.to_string(), content));
    }

    sources
}
