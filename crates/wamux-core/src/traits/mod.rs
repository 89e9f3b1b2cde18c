// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod client;
pub mod store;

pub use adapter::PluginAdapter;
pub use client::{ClientFactory, ProtocolClient};
pub use store::SessionStore;
