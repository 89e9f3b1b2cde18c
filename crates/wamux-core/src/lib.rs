// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the wamux session multiplexer.
//!
//! This crate provides the trait definitions, error type, event model, and
//! domain types shared by the store, the session manager, the bridge client,
//! and the HTTP gateway.

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::WamuxError;
pub use events::{ClientEvent, ContactInfo, IncomingMessage, PairInfo, QrEvent, Receipt};
pub use types::{
    AdapterType, ChatMetadata, Contact, HealthStatus, Message, MessageContent, SessionRecord,
    SessionStatus, SessionUpdate,
};

pub use traits::{ClientFactory, PluginAdapter, ProtocolClient, SessionStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            WamuxError::session_not_found("+15550001111").to_string(),
            "session not found: +15550001111"
        );
        assert_eq!(
            WamuxError::AlreadyAuthenticated.to_string(),
            "session already authenticated"
        );
        let timeout = WamuxError::Timeout {
            duration: std::time::Duration::from_secs(60),
        };
        assert_eq!(timeout.to_string(), "operation timed out after 60s");
        let storage = WamuxError::Storage {
            source: Box::new(std::io::Error::other("disk full")),
        };
        assert_eq!(storage.to_string(), "storage error: disk full");
    }

    #[test]
    fn not_found_helper() {
        assert!(WamuxError::session_not_found("+1").is_not_found());
        assert!(!WamuxError::transport("down").is_not_found());
    }

    #[test]
    fn adapter_type_round_trip() {
        use std::str::FromStr;

        for variant in [AdapterType::Storage, AdapterType::Protocol] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn traits_are_object_safe() {
        fn _store(_: &dyn SessionStore) {}
        fn _client(_: &dyn ProtocolClient) {}
        fn _factory(_: &dyn ClientFactory) {}
    }
}
