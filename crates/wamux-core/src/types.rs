// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the store, the session manager, and the gateway.
//!
//! Persisted timestamps are RFC 3339 UTC strings with millisecond precision,
//! so lexical order equals chronological order inside SQLite.

use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Protocol,
}

/// Lifecycle status of a tenant session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, no device identity bound yet.
    Pending,
    /// A pairing request is in flight.
    Authenticating,
    /// A device identity is bound and the transport is up.
    Authenticated,
    /// Transport is down.
    Disconnected,
    /// The last command or pairing attempt failed.
    Error,
}

impl SessionStatus {
    /// Whether `self -> next` is a legal transition.
    ///
    /// Failures and transport loss may happen in any state, so `Error` and
    /// `Disconnected` are always reachable. `Error` may move anywhere (the
    /// next connect or pair is the retry). Same-state writes are allowed and
    /// act as refreshes.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;

        if self == next || matches!(next, Error | Disconnected) {
            return true;
        }
        match self {
            Pending => matches!(next, Authenticating | Authenticated),
            Authenticating => matches!(next, Authenticated),
            Authenticated => false,
            Disconnected => matches!(next, Authenticating | Authenticated),
            Error => true,
        }
    }

    /// Whether the current QR artifact is meaningful in this status.
    pub fn accepts_pairing_artifact(self) -> bool {
        matches!(self, SessionStatus::Pending | SessionStatus::Authenticating)
    }
}

/// The durable session row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Tenant phone number (unique).
    pub phone_number: String,
    /// External session/device id; `"pending"` until a device is bound.
    pub session_id: String,
    /// Mirror of the in-memory status.
    pub auth_status: SessionStatus,
    pub device_id: Option<String>,
    pub business_name: Option<String>,
    pub platform: Option<String>,
    pub last_seen: String,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionRecord {
    /// A fresh record in `Pending` status stamped with the current time.
    pub fn pending(phone_number: &str) -> Self {
        let now = now_timestamp();
        Self {
            phone_number: phone_number.to_string(),
            session_id: "pending".to_string(),
            auth_status: SessionStatus::Pending,
            device_id: None,
            business_name: None,
            platform: None,
            last_seen: now.clone(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Partial update of a session row. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub auth_status: Option<SessionStatus>,
    pub session_id: Option<String>,
    pub device_id: Option<String>,
    pub business_name: Option<String>,
    pub platform: Option<String>,
}

impl SessionUpdate {
    /// Update that only touches the status (and the last-seen stamp).
    pub fn status(status: SessionStatus) -> Self {
        Self {
            auth_status: Some(status),
            ..Self::default()
        }
    }
}

/// Normalized message payload.
///
/// A closed set of variants: new payload kinds are added as variants, and
/// anything unrecognized is kept as [`MessageContent::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text { text: String },
    Other,
}

impl MessageContent {
    /// The text body, if this is a text message.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text { text } => Some(text),
            MessageContent::Other => None,
        }
    }
}

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Protocol-assigned id, unique per tenant.
    pub id: String,
    pub phone_number: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: MessageContent,
    pub timestamp: String,
    pub is_from_me: bool,
    pub is_group: bool,
    pub is_read: bool,
    pub created_at: String,
}

/// A stored contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    pub contact_id: String,
    pub display_name: Option<String>,
    pub push_name: Option<String>,
    pub is_business: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-chat metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMetadata {
    pub phone_number: String,
    pub chat_id: String,
    pub chat_name: Option<String>,
    pub is_group: bool,
    pub unread_count: i64,
    pub last_message_id: Option<String>,
    pub last_message_timestamp: Option<String>,
    pub muted_until: Option<String>,
    pub pinned: bool,
    pub archived: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl ChatMetadata {
    /// Empty metadata for a chat seen for the first time.
    pub fn new(phone_number: &str, chat_id: &str, is_group: bool) -> Self {
        let now = now_timestamp();
        Self {
            phone_number: phone_number.to_string(),
            chat_id: chat_id.to_string(),
            chat_name: None,
            is_group,
            unread_count: 0,
            last_message_id: None,
            last_message_timestamp: None,
            muted_until: None,
            pinned: false,
            archived: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Format a timestamp the way every table stores it.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The current time in storage format.
pub fn now_timestamp() -> String {
    format_timestamp(&Utc::now())
}

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+[1-9][0-9]{6,14}$").expect("phone regex is valid")
});

/// Whether `phone` is an E.164 international phone number.
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_display_is_lowercase() {
        assert_eq!(SessionStatus::Pending.to_string(), "pending");
        assert_eq!(SessionStatus::Authenticating.to_string(), "authenticating");
        assert_eq!(
            SessionStatus::from_str("authenticated").unwrap(),
            SessionStatus::Authenticated
        );
        assert!(SessionStatus::from_str("Bogus").is_err());
    }

    #[test]
    fn status_serde_matches_display() {
        let json = serde_json::to_string(&SessionStatus::Disconnected).unwrap();
        assert_eq!(json, "\"disconnected\"");
    }

    #[test]
    fn pending_transitions() {
        use SessionStatus::*;
        assert!(Pending.can_transition_to(Authenticating));
        assert!(Pending.can_transition_to(Authenticated));
        assert!(Pending.can_transition_to(Disconnected));
        assert!(Pending.can_transition_to(Error));
    }

    #[test]
    fn authenticated_cannot_go_back_to_pairing() {
        use SessionStatus::*;
        assert!(!Authenticated.can_transition_to(Authenticating));
        assert!(!Authenticated.can_transition_to(Pending));
        assert!(Authenticated.can_transition_to(Disconnected));
    }

    #[test]
    fn error_is_a_universal_source() {
        use SessionStatus::*;
        for next in [Pending, Authenticating, Authenticated, Disconnected] {
            assert!(Error.can_transition_to(next));
        }
    }

    #[test]
    fn nothing_returns_to_pending_except_from_error() {
        use SessionStatus::*;
        assert!(!Authenticating.can_transition_to(Pending));
        assert!(!Disconnected.can_transition_to(Pending));
    }

    #[test]
    fn message_content_serializes_tagged() {
        let text = MessageContent::Text {
            text: "hi".into(),
        };
        assert_eq!(
            serde_json::to_string(&text).unwrap(),
            r#"{"type":"text","text":"hi"}"#
        );
        assert_eq!(
            serde_json::to_string(&MessageContent::Other).unwrap(),
            r#"{"type":"other"}"#
        );
    }

    #[test]
    fn phone_validation() {
        assert!(is_valid_phone("+15551230000"));
        assert!(is_valid_phone("+447911123456"));
        assert!(!is_valid_phone("15551230000"));
        assert!(!is_valid_phone("+0123456789"));
        assert!(!is_valid_phone("+1A"));
        assert!(!is_valid_phone("+1234"));
    }

    #[test]
    fn timestamps_have_millisecond_precision() {
        let ts = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(&ts), "2026-01-01T00:00:00.000Z");
    }
}
