// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed events pushed by a protocol client onto its tenant's event queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::MessageContent;

/// One asynchronous event emitted by a [`ProtocolClient`](crate::ProtocolClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientEvent {
    /// An inbound or outbound chat message.
    Message(IncomingMessage),
    /// Delivery/read receipt for one or more messages.
    Receipt(Receipt),
    /// Fresh pairing QR codes; the first one is current.
    Qr { codes: Vec<String> },
    /// A device identity has been bound.
    PairSuccess(PairInfo),
    /// Pairing failed.
    PairError {
        #[serde(default)]
        device_id: Option<String>,
        error: String,
    },
    /// Contact details learned from the protocol (push name, business flag).
    ContactUpdate(ContactInfo),
    /// Transport is up.
    Connected,
    /// Transport is down.
    Disconnected,
}

impl ClientEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::Message(_) => "message",
            ClientEvent::Receipt(_) => "receipt",
            ClientEvent::Qr { .. } => "qr",
            ClientEvent::PairSuccess(_) => "pair_success",
            ClientEvent::PairError { .. } => "pair_error",
            ClientEvent::ContactUpdate(_) => "contact_update",
            ClientEvent::Connected => "connected",
            ClientEvent::Disconnected => "disconnected",
        }
    }
}

/// Message event as delivered by the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_from_me: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub payload: RawPayload,
}

/// The protocol's message body: at most one of the known shapes is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPayload {
    /// Plain conversation text.
    #[serde(default)]
    pub conversation: Option<String>,
    /// Extended text (links, quotes, mentions).
    #[serde(default)]
    pub extended_text: Option<String>,
    /// Name of any other payload shape (image, sticker, poll...).
    #[serde(default)]
    pub other_kind: Option<String>,
}

impl RawPayload {
    /// Classify the payload into the closed [`MessageContent`] set.
    ///
    /// A non-empty conversation wins, then extended text; everything else
    /// becomes [`MessageContent::Other`].
    pub fn normalize(&self) -> MessageContent {
        if let Some(text) = self.conversation.as_deref().filter(|t| !t.is_empty()) {
            return MessageContent::Text {
                text: text.to_string(),
            };
        }
        if let Some(text) = &self.extended_text {
            return MessageContent::Text { text: text.clone() };
        }
        MessageContent::Other
    }
}

/// Receipt kinds reported by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptKind {
    Delivered,
    Sender,
    Retry,
    /// The peer read the messages.
    Read,
    /// Another of the tenant's own devices read the messages.
    ReadSelf,
    Played,
    #[serde(other)]
    Other,
}

impl ReceiptKind {
    /// Whether this receipt means the messages were actually read.
    pub fn is_read(self) -> bool {
        matches!(self, ReceiptKind::Read | ReceiptKind::ReadSelf)
    }
}

/// A receipt covering one or more messages in a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub kind: ReceiptKind,
    pub chat_id: String,
    #[serde(default)]
    pub sender_id: Option<String>,
    pub message_ids: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Details of a newly bound device identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairInfo {
    pub device_id: String,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

/// Contact details learned from the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub contact_id: String,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_business: bool,
}

/// Events on the one-shot QR stream returned by
/// [`ProtocolClient::qr_channel`](crate::ProtocolClient::qr_channel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QrEvent {
    Code { code: String },
    Timeout,
    Success,
    Error { message: String },
}
