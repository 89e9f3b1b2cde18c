// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle management for wamux.
//!
//! [`SessionManager`] owns one [`Session`] per tenant phone number, drives
//! each session's protocol client, and feeds client events through the
//! [`EventRouter`] into the shared [`SessionStore`](wamux_core::SessionStore).

pub mod manager;
pub mod router;
pub mod session;
pub mod shutdown;

pub use manager::SessionManager;
pub use router::EventRouter;
pub use session::{Session, SessionInfo, SessionState, Transition};
pub use shutdown::{close_with_grace, install_signal_handler};
