// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the wamux session manager.
//!
//! A thin axum layer over [`wamux_session::SessionManager`]: session
//! lifecycle, pairing, and per-tenant message, chat, and contact reads.
//! Token-to-tenant binding is enforced here; the manager trusts its caller.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::{AuthConfig, Principal};
pub use error::ApiError;
pub use server::{GatewayState, MessageLimits, build_router, serve};
