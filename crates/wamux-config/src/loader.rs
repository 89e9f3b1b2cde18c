// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./wamux.toml` > `~/.config/wamux/wamux.toml` > `/etc/wamux/wamux.toml`
//! with environment variable overrides via `WAMUX_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::WamuxConfig;

/// Top-level sections recognised by the env provider.
const SECTIONS: &[&str] = &["log", "server", "storage", "session", "bridge"];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/wamux/wamux.toml";
pub(crate) const LOCAL_CONFIG: &str = "wamux.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/wamux/wamux.toml` (system-wide)
/// 3. `~/.config/wamux/wamux.toml` (user XDG config)
/// 4. `./wamux.toml` (local directory)
/// 5. `WAMUX_*` environment variables
pub fn load_config() -> Result<WamuxConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<WamuxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WamuxConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WamuxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WamuxConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(WamuxConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

pub(crate) fn user_config_path() -> std::path::PathBuf {
    dirs::config_dir()
        .map(|d| d.join("wamux/wamux.toml"))
        .unwrap_or_default()
}

/// Create the environment variable provider.
///
/// Only the first underscore after the section name becomes a dot, so
/// `WAMUX_SERVER_BEARER_TOKEN` maps to `server.bearer_token`, never
/// `server.bearer.token`.
fn env_provider() -> Env {
    Env::prefixed("WAMUX_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a prefix-stripped env key onto a dotted config path.
///
/// figment hands keys over in their original case, so the key is lowercased
/// before matching section names.
pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}
