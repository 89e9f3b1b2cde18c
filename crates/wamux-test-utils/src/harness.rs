// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end session tests.
//!
//! `TestHarness` assembles a real SQLite store in a temp directory, a
//! [`MockClientFactory`], and a [`SessionManager`] on top of them.

use std::sync::Arc;
use std::time::Duration;

use wamux_config::model::{SessionConfig, StorageConfig};
use wamux_core::events::RawPayload;
use wamux_core::{ClientEvent, IncomingMessage, SessionStatus, SessionStore, WamuxError};
use wamux_session::SessionManager;
use wamux_storage::SqliteStore;

use crate::mock_client::{MockClient, MockClientFactory};

/// How long [`TestHarness::wait_for_status`] polls before giving up.
const STATUS_WAIT: Duration = Duration::from_secs(2);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    session: SessionConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            session: SessionConfig {
                qr_timeout_secs: 2,
                pair_settle_delay_ms: 0,
                ..SessionConfig::default()
            },
        }
    }

    /// Replace the session settings.
    pub fn with_session_config(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Build the harness, creating the temp database.
    pub async fn build(self) -> Result<TestHarness, WamuxError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| WamuxError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();

        let store = Arc::new(
            SqliteStore::open(StorageConfig {
                database_path: db_path.clone(),
                wal_mode: true,
            })
            .await?,
        );
        let factory = Arc::new(MockClientFactory::new());
        let manager = Arc::new(SessionManager::new(
            store.clone(),
            factory.clone(),
            self.session,
        ));

        Ok(TestHarness {
            manager,
            store,
            factory,
            db_path,
            _temp_dir: temp_dir,
        })
    }
}

/// A session manager over a temp SQLite store and mock clients.
pub struct TestHarness {
    pub manager: Arc<SessionManager>,
    /// SQLite store (temp DB, removed on drop).
    pub store: Arc<SqliteStore>,
    pub factory: Arc<MockClientFactory>,
    db_path: String,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default test settings.
    pub async fn new() -> Result<Self, WamuxError> {
        Self::builder().build().await
    }

    /// Path of the temp database, for opening a second store on it.
    pub fn database_path(&self) -> String {
        self.db_path.clone()
    }

    /// The mock client the manager built for `phone`.
    pub fn client(&self, phone: &str) -> Result<Arc<MockClient>, WamuxError> {
        self.factory
            .client(phone)
            .ok_or_else(|| WamuxError::session_not_found(phone))
    }

    /// Emit `event` from the tenant's mock client.
    pub async fn inject(&self, phone: &str, event: ClientEvent) -> Result<(), WamuxError> {
        if self.client(phone)?.emit(event).await {
            Ok(())
        } else {
            Err(WamuxError::Internal(format!("no event receiver for {phone}")))
        }
    }

    /// Poll until the live session reports `status`.
    pub async fn wait_for_status(
        &self,
        phone: &str,
        status: SessionStatus,
    ) -> Result<(), WamuxError> {
        let deadline = tokio::time::Instant::now() + STATUS_WAIT;
        loop {
            if self.manager.get_session_status(phone).await? == status {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(WamuxError::Timeout {
                    duration: STATUS_WAIT,
                });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until the store holds `count` messages for `phone`.
    pub async fn wait_for_messages(&self, phone: &str, count: usize) -> Result<(), WamuxError> {
        let deadline = tokio::time::Instant::now() + STATUS_WAIT;
        loop {
            if self.store.get_messages(phone, -1).await?.len() >= count {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(WamuxError::Timeout {
                    duration: STATUS_WAIT,
                });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// An inbound one-to-one text message from `chat_id`, stamped now.
pub fn text_message(id: &str, chat_id: &str, text: &str) -> IncomingMessage {
    IncomingMessage {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        sender_id: chat_id.to_string(),
        timestamp: chrono::Utc::now(),
        is_from_me: false,
        is_group: false,
        payload: RawPayload {
            conversation: Some(text.to_string()),
            ..RawPayload::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_creates_and_persists_sessions() {
        let harness = TestHarness::new().await.unwrap();
        harness.manager.create_session("+15551230000").await.unwrap();

        let record = harness.store.get_session("+15551230000").await.unwrap();
        assert_eq!(record.unwrap().auth_status, SessionStatus::Pending);
        assert_eq!(harness.factory.created(), 1);
    }

    #[tokio::test]
    async fn injected_messages_are_persisted() {
        let harness = TestHarness::new().await.unwrap();
        harness.manager.create_session("+15551230000").await.unwrap();
        harness
            .inject(
                "+15551230000",
                ClientEvent::Message(text_message("m1", "c1@s.whatsapp.net", "hi")),
            )
            .await
            .unwrap();

        harness.wait_for_messages("+15551230000", 1).await.unwrap();
        let messages = harness.store.get_messages("+15551230000", 10).await.unwrap();
        assert_eq!(messages[0].content.text(), Some("hi"));
    }

    #[tokio::test]
    async fn inject_without_session_fails() {
        let harness = TestHarness::new().await.unwrap();
        assert!(
            harness
                .inject("+15551230000", ClientEvent::Connected)
                .await
                .is_err()
        );
    }
}
