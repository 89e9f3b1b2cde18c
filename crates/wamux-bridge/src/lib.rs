// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol client backed by an external WhatsApp bridge sidecar.
//!
//! The bridge owns the protocol implementation (pairing, encryption, wire
//! format). This crate drives it over HTTP and consumes its Server-Sent
//! Events:
//!
//! - `POST /devices` allocates or loads a device and returns its handle
//! - `POST /devices/{id}/connect`, `/disconnect`, `/pair-phone`, `/mark-read`
//! - `POST /devices/{id}/qr` streams pairing QR events
//! - `GET /devices/{id}/events` streams client events

pub mod client;
pub mod factory;
pub mod sse;
pub mod types;

pub use client::{BridgeApi, BridgeClient};
pub use factory::BridgeClientFactory;
