// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for wamux integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic tests without a protocol bridge.
//!
//! # Components
//!
//! - [`MockClient`] / [`MockClientFactory`] - scriptable protocol clients
//! - [`MemoryStore`] - in-memory session store
//! - [`TestHarness`] - temp SQLite store plus a session manager

pub mod harness;
pub mod memory_store;
pub mod mock_client;

pub use harness::{TestHarness, TestHarnessBuilder, text_message};
pub use memory_store::MemoryStore;
pub use mock_client::{MockClient, MockClientFactory, ReadReceipt};
