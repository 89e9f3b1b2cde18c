// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol client abstraction.
//!
//! A [`ProtocolClient`] owns one device's connection to the messaging
//! network. The session manager drives it through commands and consumes its
//! events through the sender handed over in [`ProtocolClient::register_events`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::error::WamuxError;
use crate::events::{ClientEvent, QrEvent};
use crate::traits::adapter::PluginAdapter;

/// One device's connection to the messaging network.
#[async_trait]
pub trait ProtocolClient: Send + Sync + 'static {
    /// Open the transport. Errors if already connected.
    async fn connect(&self) -> Result<(), WamuxError>;

    /// Close the transport. A no-op when not connected.
    async fn disconnect(&self) -> Result<(), WamuxError>;

    fn is_connected(&self) -> bool;

    /// The bound device identity, if pairing has completed.
    fn device_id(&self) -> Option<String>;

    /// Route every future event of this client into `tx`.
    ///
    /// Replaces any previously registered sender.
    fn register_events(&self, tx: mpsc::Sender<ClientEvent>);

    /// Open the QR pairing stream.
    ///
    /// Must be called before [`connect`](Self::connect) on an unbound device.
    async fn qr_channel(&self) -> Result<mpsc::Receiver<QrEvent>, WamuxError>;

    /// Request a pairing code for `target_phone`.
    async fn pair_phone(
        &self,
        target_phone: &str,
        show_push_notification: bool,
    ) -> Result<String, WamuxError>;

    /// Send read receipts for `message_ids` in `chat_id`.
    async fn mark_read(
        &self,
        message_ids: &[String],
        chat_id: &str,
        sender_id: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<(), WamuxError>;
}

/// Builds protocol clients for tenants.
#[async_trait]
pub trait ClientFactory: PluginAdapter {
    /// A client with a brand-new, unbound device identity.
    async fn new_device(&self, phone: &str) -> Result<Arc<dyn ProtocolClient>, WamuxError>;

    /// A client for an already bound device identity.
    async fn from_device(
        &self,
        phone: &str,
        device_id: &str,
    ) -> Result<Arc<dyn ProtocolClient>, WamuxError>;
}
