// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parsers for the bridge's device event and QR streams.
//!
//! Converts a reqwest response byte stream into typed events using the
//! `eventsource-stream` crate. Unknown event names are skipped so the bridge
//! can add event kinds without breaking older clients.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;

use wamux_core::{ClientEvent, QrEvent, WamuxError};

use crate::types::{PairFailure, QrCodes, QrPayload};

/// Boxed stream of decoded events.
pub type EventStream<T> = Pin<Box<dyn Stream<Item = Result<T, WamuxError>> + Send>>;

/// Parse the `GET /devices/{id}/events` stream into [`ClientEvent`]s.
pub fn parse_event_stream(response: reqwest::Response) -> EventStream<ClientEvent> {
    parse_with(response, decode_client_event)
}

/// Parse the `POST /devices/{id}/qr` stream into [`QrEvent`]s.
pub fn parse_qr_stream(response: reqwest::Response) -> EventStream<QrEvent> {
    parse_with(response, decode_qr_event)
}

fn parse_with<T: Send + 'static>(
    response: reqwest::Response,
    decode: fn(&str, &str) -> Option<Result<T, WamuxError>>,
) -> EventStream<T> {
    let mapped = response
        .bytes_stream()
        .eventsource()
        .filter_map(move |result| async move {
            match result {
                Ok(event) => decode(&event.event, &event.data),
                Err(e) => Some(Err(WamuxError::transport(format!("SSE stream error: {e}")))),
            }
        });
    Box::pin(mapped)
}

fn parse<T: DeserializeOwned>(name: &str, data: &str) -> Result<T, WamuxError> {
    serde_json::from_str(data).map_err(|e| WamuxError::Transport {
        message: format!("failed to parse {name} event: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Decode one device event. `None` for event names this client does not know.
pub fn decode_client_event(name: &str, data: &str) -> Option<Result<ClientEvent, WamuxError>> {
    let event = match name {
        "message" => parse(name, data).map(ClientEvent::Message),
        "receipt" => parse(name, data).map(ClientEvent::Receipt),
        "qr" => parse::<QrCodes>(name, data).map(|qr| ClientEvent::Qr { codes: qr.codes }),
        "pair_success" => parse(name, data).map(ClientEvent::PairSuccess),
        "pair_error" => parse::<PairFailure>(name, data).map(|f| ClientEvent::PairError {
            device_id: f.device_id,
            error: f.error,
        }),
        "contact_update" => parse(name, data).map(ClientEvent::ContactUpdate),
        "connected" => Ok(ClientEvent::Connected),
        "disconnected" => Ok(ClientEvent::Disconnected),
        _ => return None,
    };
    Some(event)
}

/// Decode one QR stream event. `None` for unknown event names.
pub fn decode_qr_event(name: &str, data: &str) -> Option<Result<QrEvent, WamuxError>> {
    let event = match name {
        "code" => parse::<QrPayload>(name, data).and_then(|p| match p.code {
            Some(code) => Ok(QrEvent::Code { code }),
            None => Err(WamuxError::transport("code event without a code")),
        }),
        "timeout" => Ok(QrEvent::Timeout),
        "success" => Ok(QrEvent::Success),
        "error" => parse::<QrPayload>(name, data).map(|p| QrEvent::Error {
            message: p.message.unwrap_or_else(|| "pairing failed".to_string()),
        }),
        _ => return None,
    };
    Some(event)
}
