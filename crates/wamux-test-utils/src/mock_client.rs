// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock protocol client for deterministic testing.
//!
//! `MockClient` implements `ProtocolClient` with scriptable failures, canned
//! pairing artifacts, and event injection through the registered sender.
//! `MockClientFactory` hands out mock clients and keeps them addressable by
//! tenant phone so tests can drive them after the manager created them.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use wamux_core::{
    AdapterType, ClientEvent, ClientFactory, HealthStatus, PairInfo, PluginAdapter,
    ProtocolClient, QrEvent, WamuxError,
};

/// A mark-read command captured by [`MockClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReceipt {
    pub chat_id: String,
    pub sender_id: Option<String>,
    pub message_ids: Vec<String>,
}

/// A scriptable protocol client.
///
/// Defaults: connects successfully, pairs with `MOCK-CODE`, and yields a
/// single QR code `2@mock-qr`.
pub struct MockClient {
    connected: AtomicBool,
    device_id: Mutex<Option<String>>,
    events: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    connect_failures: Mutex<VecDeque<String>>,
    pair_code: Mutex<String>,
    pair_failure: Mutex<Option<String>>,
    qr_codes: Mutex<Vec<String>>,
    hold_qr: AtomicBool,
    held_qr: Mutex<Vec<mpsc::Sender<QrEvent>>>,
    read_receipts: Mutex<Vec<ReadReceipt>>,
}

impl MockClient {
    /// An unbound client.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            device_id: Mutex::new(None),
            events: Mutex::new(None),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            connect_failures: Mutex::new(VecDeque::new()),
            pair_code: Mutex::new("MOCK-CODE".to_string()),
            pair_failure: Mutex::new(None),
            qr_codes: Mutex::new(vec!["2@mock-qr".to_string()]),
            hold_qr: AtomicBool::new(false),
            held_qr: Mutex::new(Vec::new()),
            read_receipts: Mutex::new(Vec::new()),
        }
    }

    /// A client already bound to `device_id`.
    pub fn with_device(device_id: &str) -> Self {
        let client = Self::new();
        client.bind_device(device_id);
        client
    }

    /// Bind a device identity without emitting any event.
    pub fn bind_device(&self, device_id: &str) {
        *lock(&self.device_id) = Some(device_id.to_string());
    }

    /// Make the next `connect` fail with `message`. Calls stack.
    pub fn fail_next_connect(&self, message: &str) {
        lock(&self.connect_failures).push_back(message.to_string());
    }

    pub fn set_pair_code(&self, code: &str) {
        *lock(&self.pair_code) = code.to_string();
    }

    /// Make every `pair_phone` fail with `message`.
    pub fn fail_pairing(&self, message: &str) {
        *lock(&self.pair_failure) = Some(message.to_string());
    }

    /// Codes emitted, in order, by the next QR stream.
    pub fn set_qr_codes(&self, codes: Vec<String>) {
        *lock(&self.qr_codes) = codes;
    }

    /// Keep QR streams open without ever emitting a code.
    pub fn hold_qr_stream(&self) {
        self.hold_qr.store(true, Ordering::SeqCst);
    }

    /// How many times `connect` was called.
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// How many times `disconnect` was called.
    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Mark-read commands received so far.
    pub fn read_receipts(&self) -> Vec<ReadReceipt> {
        lock(&self.read_receipts).clone()
    }

    /// Push an event to the registered sender.
    ///
    /// Returns `false` when no sender is registered or the receiver is gone.
    pub async fn emit(&self, event: ClientEvent) -> bool {
        let tx = lock(&self.events).clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Bind the device and emit the pairing success event.
    pub async fn complete_pairing(&self, info: PairInfo) -> bool {
        self.bind_device(&info.device_id);
        self.emit(ClientEvent::PairSuccess(info)).await
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ProtocolClient for MockClient {
    async fn connect(&self) -> Result<(), WamuxError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let failure = lock(&self.connect_failures).pop_front();
        if let Some(message) = failure {
            return Err(WamuxError::transport(message));
        }
        if self.connected.swap(true, Ordering::SeqCst) {
            return Err(WamuxError::InvalidState("already connected".into()));
        }
        self.emit(ClientEvent::Connected).await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), WamuxError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if self.connected.swap(false, Ordering::SeqCst) {
            self.emit(ClientEvent::Disconnected).await;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn device_id(&self) -> Option<String> {
        lock(&self.device_id).clone()
    }

    fn register_events(&self, tx: mpsc::Sender<ClientEvent>) {
        *lock(&self.events) = Some(tx);
    }

    async fn qr_channel(&self) -> Result<mpsc::Receiver<QrEvent>, WamuxError> {
        let codes = lock(&self.qr_codes).clone();
        let (tx, rx) = mpsc::channel(codes.len().max(1));
        if self.hold_qr.load(Ordering::SeqCst) {
            lock(&self.held_qr).push(tx);
            return Ok(rx);
        }
        for code in codes {
            // Capacity covers every code.
            let _ = tx.try_send(QrEvent::Code { code });
        }
        Ok(rx)
    }

    async fn pair_phone(
        &self,
        _target_phone: &str,
        _show_push_notification: bool,
    ) -> Result<String, WamuxError> {
        if !self.is_connected() {
            return Err(WamuxError::InvalidState("not connected".into()));
        }
        if let Some(message) = lock(&self.pair_failure).clone() {
            return Err(WamuxError::transport(message));
        }
        Ok(lock(&self.pair_code).clone())
    }

    async fn mark_read(
        &self,
        message_ids: &[String],
        chat_id: &str,
        sender_id: Option<&str>,
        _timestamp: DateTime<Utc>,
    ) -> Result<(), WamuxError> {
        if !self.is_connected() {
            return Err(WamuxError::InvalidState("not connected".into()));
        }
        lock(&self.read_receipts).push(ReadReceipt {
            chat_id: chat_id.to_string(),
            sender_id: sender_id.map(str::to_string),
            message_ids: message_ids.to_vec(),
        });
        Ok(())
    }
}

/// Factory handing out [`MockClient`]s, one per tenant.
pub struct MockClientFactory {
    clients: Mutex<HashMap<String, Arc<MockClient>>>,
    created: AtomicUsize,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            created: AtomicUsize::new(0),
            failure: Mutex::new(None),
            delay: Mutex::new(None),
        }
    }

    /// The most recent client built for `phone`.
    pub fn client(&self, phone: &str) -> Option<Arc<MockClient>> {
        lock(&self.clients).get(phone).cloned()
    }

    /// Total clients constructed.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Make every construction fail with `message` (`None` to stop).
    pub fn fail_construction(&self, message: Option<&str>) {
        *lock(&self.failure) = message.map(str::to_string);
    }

    /// Sleep for `delay` inside every construction (`None` to stop).
    pub fn delay_construction(&self, delay: Option<Duration>) {
        *lock(&self.delay) = delay;
    }

    async fn build(
        &self,
        phone: &str,
        client: MockClient,
    ) -> Result<Arc<dyn ProtocolClient>, WamuxError> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = lock(&self.failure).clone() {
            return Err(WamuxError::transport(message));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        let client = Arc::new(client);
        lock(&self.clients).insert(phone.to_string(), client.clone());
        Ok(client)
    }
}

impl Default for MockClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockClientFactory {
    fn name(&self) -> &str {
        "mock-client"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Protocol
    }

    async fn health_check(&self) -> Result<HealthStatus, WamuxError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), WamuxError> {
        Ok(())
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    async fn new_device(&self, phone: &str) -> Result<Arc<dyn ProtocolClient>, WamuxError> {
        self.build(phone, MockClient::new()).await
    }

    async fn from_device(
        &self,
        phone: &str,
        device_id: &str,
    ) -> Result<Arc<dyn ProtocolClient>, WamuxError> {
        self.build(phone, MockClient::with_device(device_id)).await
    }
}
