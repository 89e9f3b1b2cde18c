// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Every function takes a [`Database`](crate::Database)
//! and runs on its single connection thread.

pub mod chats;
pub mod contacts;
pub mod devices;
pub mod messages;
pub mod sessions;

/// Current time in the storage timestamp format, computed by SQLite.
pub(crate) const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";
