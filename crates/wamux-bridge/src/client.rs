// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the bridge API and the per-device protocol client.
//!
//! [`BridgeApi`] handles request construction, authentication, error body
//! decoding, and one retry on transient statuses. [`BridgeClient`] drives one
//! bridge device through it and pumps the device's SSE event stream into the
//! sender registered by the session manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use wamux_config::BridgeConfig;
use wamux_core::{ClientEvent, ProtocolClient, QrEvent, WamuxError};

use crate::sse::{self, EventStream};
use crate::types::{
    ApiErrorResponse, DeviceState, MarkReadRequest, PairPhoneRequest, PairPhoneResponse,
};

/// Capacity of the channel handed out by [`BridgeClient::qr_channel`].
const QR_BUFFER: usize = 8;

/// Connection-level timeout. Per-request timeouts apply to non-streaming calls
/// only, since event streams stay open indefinitely.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Authenticated HTTP access to the bridge.
#[derive(Debug, Clone)]
pub struct BridgeApi {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    max_retries: u32,
}

impl BridgeApi {
    pub fn new(config: &BridgeConfig) -> Result<Self, WamuxError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| WamuxError::Config(format!("invalid bridge API key: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| WamuxError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            max_retries: 1,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a JSON request and decode a JSON response.
    ///
    /// On transient errors (429, 502, 503), retries once after a short delay.
    pub async fn call<B, R>(&self, method: Method, path: &str, body: Option<&B>) -> Result<R, WamuxError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.send(method, path, body).await?;
        response.json::<R>().await.map_err(|e| WamuxError::Transport {
            message: format!("failed to parse bridge response for {path}: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// Like [`call`](Self::call) but ignores the response body.
    pub async fn call_empty<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<(), WamuxError>
    where
        B: Serialize + ?Sized,
    {
        self.send(method, path, body).await.map(|_| ())
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, WamuxError>
    where
        B: Serialize + ?Sized,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, path, "retrying bridge request after transient error");
                tokio::time::sleep(Duration::from_millis(500)).await;
            }

            let mut request = self
                .http
                .request(method.clone(), self.url(path))
                .timeout(self.request_timeout);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await.map_err(request_failed)?;

            let status = response.status();
            debug!(status = %status, attempt, path, "bridge response received");
            if status.is_success() {
                return Ok(response);
            }

            let error = error_from_response(status, response).await;
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, error = %error, "transient bridge error, will retry");
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_error.unwrap_or_else(|| WamuxError::transport("bridge request failed after retries")))
    }

    /// Open a Server-Sent Events stream.
    pub async fn stream(&self, method: Method, path: &str) -> Result<reqwest::Response, WamuxError> {
        let response = self
            .http
            .request(method, self.url(path))
            .header("accept", "text/event-stream")
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(error_from_response(status, response).await)
        }
    }
}

fn request_failed(e: reqwest::Error) -> WamuxError {
    let what = if e.is_timeout() { "timed out" } else { "failed" };
    WamuxError::Transport {
        message: format!("bridge request {what}: {e}"),
        source: Some(Box::new(e)),
    }
}

async fn error_from_response(status: StatusCode, response: reqwest::Response) -> WamuxError {
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(api_err) => format!("bridge error ({status}): {}", api_err.error),
        Err(_) => format!("bridge returned {status}: {body}"),
    };
    WamuxError::transport(message)
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 502 | 503)
}

/// State shared between a [`BridgeClient`] and its event pump.
struct Shared {
    connected: AtomicBool,
    jid: Mutex<Option<String>>,
    events: Mutex<Option<mpsc::Sender<ClientEvent>>>,
}

impl Shared {
    fn sender(&self) -> Option<mpsc::Sender<ClientEvent>> {
        lock(&self.events).clone()
    }

    /// Fold an event into the client's own view of the device.
    fn observe(&self, event: &ClientEvent) {
        match event {
            ClientEvent::PairSuccess(info) => {
                *lock(&self.jid) = Some(info.device_id.clone());
            }
            ClientEvent::Connected => self.connected.store(true, Ordering::SeqCst),
            ClientEvent::Disconnected => self.connected.store(false, Ordering::SeqCst),
            _ => {}
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One bridge device, driven through the bridge HTTP API.
pub struct BridgeClient {
    api: BridgeApi,
    phone: String,
    /// Bridge-side device handle.
    handle: String,
    shared: Arc<Shared>,
    pump: Mutex<Option<CancellationToken>>,
}

impl BridgeClient {
    pub(crate) fn new(api: BridgeApi, phone: &str, state: DeviceState) -> Self {
        Self {
            api,
            phone: phone.to_string(),
            handle: state.id,
            shared: Arc::new(Shared {
                connected: AtomicBool::new(state.connected),
                jid: Mutex::new(state.jid),
                events: Mutex::new(None),
            }),
            pump: Mutex::new(None),
        }
    }

    /// The bridge-side device handle.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    fn path(&self, suffix: &str) -> String {
        format!("/devices/{}{suffix}", self.handle)
    }

    /// Refresh connection state and bound JID from the bridge.
    pub async fn refresh(&self) -> Result<DeviceState, WamuxError> {
        let state: DeviceState = self.api.call(Method::GET, &self.path(""), None::<&()>).await?;
        self.apply_state(&state);
        Ok(state)
    }

    fn apply_state(&self, state: &DeviceState) {
        self.shared.connected.store(state.connected, Ordering::SeqCst);
        if state.jid.is_some() {
            *lock(&self.shared.jid) = state.jid.clone();
        }
    }

    /// Start forwarding the device event stream, replacing any running pump.
    async fn start_pump(&self) -> Result<(), WamuxError> {
        let response = self.api.stream(Method::GET, &self.path("/events")).await?;
        let events = sse::parse_event_stream(response);

        let cancel = CancellationToken::new();
        if let Some(previous) = lock(&self.pump).replace(cancel.clone()) {
            previous.cancel();
        }
        tokio::spawn(pump_events(
            self.phone.clone(),
            events,
            self.shared.clone(),
            cancel,
        ));
        Ok(())
    }

    fn stop_pump(&self) {
        if let Some(cancel) = lock(&self.pump).take() {
            cancel.cancel();
        }
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.stop_pump();
    }
}

/// Forward decoded events until the stream ends or `cancel` fires.
///
/// A stream that ends without cancellation means the transport is gone, so a
/// synthetic `Disconnected` is delivered.
async fn pump_events(
    phone: String,
    mut events: EventStream<ClientEvent>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    debug!(tenant = %phone, "bridge event pump started");
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return,
            next = events.next() => next,
        };
        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                warn!(tenant = %phone, error = %e, "dropping undecodable bridge event");
                continue;
            }
            None => break,
        };

        shared.observe(&event);
        let Some(tx) = shared.sender() else {
            continue;
        };
        if tx.send(event).await.is_err() {
            debug!(tenant = %phone, "event receiver closed, stopping pump");
            return;
        }
    }

    if !cancel.is_cancelled() {
        warn!(tenant = %phone, "bridge event stream ended");
        shared.connected.store(false, Ordering::SeqCst);
        if let Some(tx) = shared.sender() {
            let _ = tx.send(ClientEvent::Disconnected).await;
        }
    }
}

#[async_trait]
impl ProtocolClient for BridgeClient {
    async fn connect(&self) -> Result<(), WamuxError> {
        if self.is_connected() {
            return Err(WamuxError::InvalidState("already connected".into()));
        }
        // Subscribe first so the connected event is not missed.
        self.start_pump().await?;
        match self
            .api
            .call::<(), DeviceState>(Method::POST, &self.path("/connect"), None)
            .await
        {
            Ok(state) => {
                self.apply_state(&state);
                self.shared.connected.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                self.stop_pump();
                Err(e)
            }
        }
    }

    async fn disconnect(&self) -> Result<(), WamuxError> {
        if !self.is_connected() {
            return Ok(());
        }
        self.stop_pump();
        self.api
            .call_empty(Method::POST, &self.path("/disconnect"), None::<&()>)
            .await?;
        self.shared.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn device_id(&self) -> Option<String> {
        lock(&self.shared.jid).clone()
    }

    fn register_events(&self, tx: mpsc::Sender<ClientEvent>) {
        *lock(&self.shared.events) = Some(tx);
    }

    async fn qr_channel(&self) -> Result<mpsc::Receiver<QrEvent>, WamuxError> {
        let response = self.api.stream(Method::POST, &self.path("/qr")).await?;
        let mut stream = sse::parse_qr_stream(response);
        let (tx, rx) = mpsc::channel(QR_BUFFER);
        let phone = self.phone.clone();

        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                let event = match item {
                    Ok(event) => event,
                    Err(e) => QrEvent::Error {
                        message: e.to_string(),
                    },
                };
                let done = !matches!(event, QrEvent::Code { .. });
                if tx.send(event).await.is_err() || done {
                    break;
                }
            }
            debug!(tenant = %phone, "QR stream finished");
        });
        Ok(rx)
    }

    async fn pair_phone(
        &self,
        target_phone: &str,
        show_push_notification: bool,
    ) -> Result<String, WamuxError> {
        let body = PairPhoneRequest {
            phone_number: target_phone,
            show_push_notification,
        };
        let response: PairPhoneResponse = self
            .api
            .call(Method::POST, &self.path("/pair-phone"), Some(&body))
            .await?;
        Ok(response.code)
    }

    async fn mark_read(
        &self,
        message_ids: &[String],
        chat_id: &str,
        sender_id: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<(), WamuxError> {
        let body = MarkReadRequest {
            message_ids,
            chat_id,
            sender_id,
            timestamp,
        };
        self.api
            .call_empty(Method::POST, &self.path("/mark-read"), Some(&body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer, api_key: Option<&str>) -> BridgeApi {
        BridgeApi::new(&BridgeConfig {
            base_url: server.uri(),
            api_key: api_key.map(str::to_string),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    fn client(server: &MockServer) -> BridgeClient {
        BridgeClient::new(
            api(server, None),
            "+15551230000",
            DeviceState {
                id: "d1".into(),
                connected: false,
                jid: None,
            },
        )
    }

    async fn mount_events(server: &MockServer, sse: &str) {
        Mock::given(method("GET"))
            .and(path("/devices/d1/events"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse.to_string()),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn sends_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devices/d1"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "d1", "connected": true})),
            )
            .mount(&server)
            .await;

        let client = BridgeClient::new(
            api(&server, Some("secret")),
            "+15551230000",
            DeviceState {
                id: "d1".into(),
                ..DeviceState::default()
            },
        );
        let state = client.refresh().await.unwrap();
        assert!(state.connected);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn connect_forwards_events() {
        let server = MockServer::start().await;
        mount_events(
            &server,
            "event: connected\ndata: {}\n\nevent: pair_success\ndata: {\"device_id\":\"123@s.whatsapp.net\"}\n\n",
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/devices/d1/connect"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "d1", "connected": true})),
            )
            .mount(&server)
            .await;

        let client = client(&server);
        let (tx, mut rx) = mpsc::channel(8);
        client.register_events(tx);
        client.connect().await.unwrap();

        assert_eq!(rx.recv().await, Some(ClientEvent::Connected));
        assert!(matches!(rx.recv().await, Some(ClientEvent::PairSuccess(_))));
        assert_eq!(client.device_id().as_deref(), Some("123@s.whatsapp.net"));

        // The canned body ends the stream, which reads as a transport loss.
        assert_eq!(rx.recv().await, Some(ClientEvent::Disconnected));
    }

    #[tokio::test]
    async fn connect_error_surfaces_bridge_message() {
        let server = MockServer::start().await;
        mount_events(&server, "").await;
        Mock::given(method("POST"))
            .and(path("/devices/d1/connect"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(serde_json::json!({"error": "device logged out"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).connect().await.unwrap_err();
        assert!(matches!(err, WamuxError::Transport { .. }));
        assert!(err.to_string().contains("device logged out"), "got: {err}");
    }

    #[tokio::test]
    async fn transient_error_is_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/devices/d1/pair-phone"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/devices/d1/pair-phone"))
            .and(body_json(serde_json::json!({
                "phone_number": "+15551230000",
                "show_push_notification": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": "ABCD-1234"})))
            .mount(&server)
            .await;

        let code = client(&server)
            .pair_phone("+15551230000", true)
            .await
            .unwrap();
        assert_eq!(code, "ABCD-1234");
    }

    #[tokio::test]
    async fn qr_channel_yields_first_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/devices/d1/qr"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(
                        "event: code\ndata: {\"code\":\"2@one\"}\n\nevent: success\ndata: {}\n\n",
                    ),
            )
            .mount(&server)
            .await;

        let mut rx = client(&server).qr_channel().await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(QrEvent::Code {
                code: "2@one".into()
            })
        );
        assert_eq!(rx.recv().await, Some(QrEvent::Success));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn disconnect_is_noop_when_not_connected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/devices/d1/disconnect"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        client(&server).disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn mark_read_posts_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/devices/d1/mark-read"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .mark_read(&["m1".to_string()], "c1", Some("c1"), Utc::now())
            .await
            .unwrap();
    }
}
