// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes. All failures are collected; nothing fails fast.

use wamux_core::types::is_valid_phone;

use crate::diagnostic::ConfigError;
use crate::model::WamuxConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &WamuxConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.log.level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::invalid(
            "log.level",
            format!(
                "`{}` is not one of {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    let server = &config.server;
    if server.host.trim().is_empty() {
        errors.push(ConfigError::invalid("server.host", "must not be empty"));
    }
    if server.port == 0 {
        errors.push(ConfigError::invalid("server.port", "must not be 0"));
    }
    if server.max_message_limit < 1 {
        errors.push(ConfigError::invalid(
            "server.max_message_limit",
            format!("must be at least 1, got {}", server.max_message_limit),
        ));
    }
    if server.default_message_limit < 1 || server.default_message_limit > server.max_message_limit
    {
        errors.push(ConfigError::invalid(
            "server.default_message_limit",
            format!(
                "must be between 1 and server.max_message_limit ({}), got {}",
                server.max_message_limit, server.default_message_limit
            ),
        ));
    }
    if server
        .bearer_token
        .as_deref()
        .is_some_and(|t| t.trim().is_empty())
    {
        errors.push(ConfigError::invalid(
            "server.bearer_token",
            "must not be empty when set",
        ));
    }
    for (token, phone) in &server.tenant_tokens {
        if token.trim().is_empty() {
            errors.push(ConfigError::invalid(
                "server.tenant_tokens",
                "tokens must not be empty",
            ));
        }
        if !is_valid_phone(phone) {
            errors.push(ConfigError::invalid(
                "server.tenant_tokens",
                format!("`{phone}` is not an E.164 phone number"),
            ));
        }
        if server.bearer_token.as_deref() == Some(token.as_str()) {
            errors.push(ConfigError::invalid(
                "server.tenant_tokens",
                "a tenant token must differ from the admin bearer token",
            ));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid(
            "storage.database_path",
            "must not be empty",
        ));
    }

    if config.session.qr_timeout_secs == 0 {
        errors.push(ConfigError::invalid(
            "session.qr_timeout_secs",
            "must be greater than 0",
        ));
    }
    if config.session.event_buffer == 0 {
        errors.push(ConfigError::invalid(
            "session.event_buffer",
            "must be greater than 0",
        ));
    }

    let base_url = config.bridge.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ConfigError::invalid(
            "bridge.base_url",
            format!("`{base_url}` must start with http:// or https://"),
        ));
    }
    if config.bridge.request_timeout_secs == 0 {
        errors.push(ConfigError::invalid(
            "bridge.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(errors: &[ConfigError]) -> Vec<String> {
        errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::Validation { field, .. } => Some(field.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&WamuxConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = WamuxConfig::default();
        config.server.port = 0;
        config.session.qr_timeout_secs = 0;
        config.bridge.base_url = "ftp://bridge".into();

        let errors = validate_config(&config).unwrap_err();
        let fields = fields(&errors);
        assert_eq!(errors.len(), 3);
        assert!(fields.contains(&"server.port".to_string()));
        assert!(fields.contains(&"session.qr_timeout_secs".to_string()));
        assert!(fields.contains(&"bridge.base_url".to_string()));
    }

    #[test]
    fn default_limit_must_not_exceed_max() {
        let mut config = WamuxConfig::default();
        config.server.default_message_limit = 600;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["server.default_message_limit"]);
    }

    #[test]
    fn tenant_tokens_must_map_to_phone_numbers() {
        let mut config = WamuxConfig::default();
        config
            .server
            .tenant_tokens
            .insert("tok".into(), "not-a-phone".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["server.tenant_tokens"]);
    }

    #[test]
    fn tenant_token_cannot_equal_admin_token() {
        let mut config = WamuxConfig::default();
        config.server.bearer_token = Some("same".into());
        config
            .server
            .tenant_tokens
            .insert("same".into(), "+15551230000".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = WamuxConfig::default();
        config.log.level = "verbose".into();
        assert!(validate_config(&config).is_err());

        config.log.level = "DEBUG".into();
        assert!(validate_config(&config).is_ok());
    }
}
