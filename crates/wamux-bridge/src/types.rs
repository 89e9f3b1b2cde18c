// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and response bodies of the bridge HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `POST /devices` body.
///
/// Without `jid` the bridge allocates a fresh, unbound identity; with it the
/// bridge loads the stored identity for that JID.
#[derive(Debug, Clone, Serialize)]
pub struct CreateDeviceRequest<'a> {
    pub phone_number: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jid: Option<&'a str>,
}

/// Device state as reported by the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeviceState {
    /// Bridge-side handle used in every device path.
    pub id: String,
    #[serde(default)]
    pub connected: bool,
    /// Bound account JID, once paired.
    #[serde(default)]
    pub jid: Option<String>,
}

/// `POST /devices/{id}/pair-phone` body.
#[derive(Debug, Clone, Serialize)]
pub struct PairPhoneRequest<'a> {
    pub phone_number: &'a str,
    pub show_push_notification: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairPhoneResponse {
    pub code: String,
}

/// `POST /devices/{id}/mark-read` body.
#[derive(Debug, Clone, Serialize)]
pub struct MarkReadRequest<'a> {
    pub message_ids: &'a [String],
    pub chat_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<&'a str>,
    pub timestamp: DateTime<Utc>,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
}

/// Data of a `qr` event on the device event stream.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QrCodes {
    pub codes: Vec<String>,
}

/// Data of a `pair_error` event on the device event stream.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PairFailure {
    #[serde(default)]
    pub device_id: Option<String>,
    pub error: String,
}

/// Data of `code` and `error` events on the QR stream.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QrPayload {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_omits_missing_jid() {
        let body = CreateDeviceRequest {
            phone_number: "+15551230000",
            jid: None,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"phone_number":"+15551230000"}"#
        );
    }

    #[test]
    fn device_state_defaults() {
        let state: DeviceState = serde_json::from_str(r#"{"id":"d1"}"#).unwrap();
        assert_eq!(state.id, "d1");
        assert!(!state.connected);
        assert!(state.jid.is_none());
    }
}
