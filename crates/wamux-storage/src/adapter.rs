// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`SessionStore`] trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use wamux_config::model::StorageConfig;
use wamux_core::{
    AdapterType, ChatMetadata, Contact, HealthStatus, Message, PluginAdapter, SessionRecord,
    SessionStore, SessionUpdate, WamuxError,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed session store.
///
/// The database is opened lazily by [`SessionStore::initialize`]; every
/// other call fails until then.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a store for the configured database path without opening it.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Create and initialize a store in one step.
    pub async fn open(config: StorageConfig) -> Result<Self, WamuxError> {
        let store = Self::new(config);
        store.initialize().await?;
        Ok(store)
    }

    fn db(&self) -> Result<&Database, WamuxError> {
        self.db.get().ok_or_else(|| WamuxError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, WamuxError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        let ping = db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await;
        Ok(match ping {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), WamuxError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn initialize(&self) -> Result<(), WamuxError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| WamuxError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), WamuxError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Sessions ---

    async fn create_session(&self, session: &SessionRecord) -> Result<(), WamuxError> {
        queries::sessions::create_session(self.db()?, session).await
    }

    async fn get_session(&self, phone: &str) -> Result<Option<SessionRecord>, WamuxError> {
        queries::sessions::get_session(self.db()?, phone).await
    }

    async fn update_session(
        &self,
        phone: &str,
        update: &SessionUpdate,
    ) -> Result<(), WamuxError> {
        queries::sessions::update_session(self.db()?, phone, update).await
    }

    async fn delete_session(&self, phone: &str) -> Result<(), WamuxError> {
        queries::sessions::delete_session(self.db()?, phone).await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, WamuxError> {
        queries::sessions::list_sessions(self.db()?).await
    }

    // --- Messages ---

    async fn save_message(&self, message: &Message) -> Result<(), WamuxError> {
        queries::messages::save_message(self.db()?, message).await
    }

    async fn get_messages(&self, phone: &str, limit: i64) -> Result<Vec<Message>, WamuxError> {
        queries::messages::get_messages(self.db()?, phone, limit).await
    }

    async fn get_chat_messages(
        &self,
        phone: &str,
        chat_id: &str,
        limit: i64,
    ) -> Result<Vec<Message>, WamuxError> {
        queries::messages::get_chat_messages(self.db()?, phone, chat_id, limit).await
    }

    async fn update_message_read_status(
        &self,
        phone: &str,
        message_id: &str,
        is_read: bool,
    ) -> Result<bool, WamuxError> {
        queries::messages::update_message_read_status(self.db()?, phone, message_id, is_read)
            .await
    }

    async fn get_unread_message_count(&self, phone: &str) -> Result<i64, WamuxError> {
        queries::messages::get_unread_message_count(self.db()?, phone).await
    }

    // --- Contacts ---

    async fn save_contact(&self, contact: &Contact) -> Result<(), WamuxError> {
        queries::contacts::save_contact(self.db()?, contact).await
    }

    async fn get_contacts(&self, phone: &str) -> Result<Vec<Contact>, WamuxError> {
        queries::contacts::get_contacts(self.db()?, phone).await
    }

    async fn get_contact(
        &self,
        phone: &str,
        contact_id: &str,
    ) -> Result<Option<Contact>, WamuxError> {
        queries::contacts::get_contact(self.db()?, phone, contact_id).await
    }

    // --- Chat metadata ---

    async fn save_chat_metadata(&self, metadata: &ChatMetadata) -> Result<(), WamuxError> {
        queries::chats::save_chat_metadata(self.db()?, metadata).await
    }

    async fn get_chat_metadata(
        &self,
        phone: &str,
        chat_id: &str,
    ) -> Result<Option<ChatMetadata>, WamuxError> {
        queries::chats::get_chat_metadata(self.db()?, phone, chat_id).await
    }

    async fn get_chats(&self, phone: &str) -> Result<Vec<ChatMetadata>, WamuxError> {
        queries::chats::get_chats(self.db()?, phone).await
    }

    async fn update_chat_unread_count(
        &self,
        phone: &str,
        chat_id: &str,
        count: i64,
    ) -> Result<(), WamuxError> {
        queries::chats::update_chat_unread_count(self.db()?, phone, chat_id, count).await
    }

    async fn record_chat_activity(&self, message: &Message) -> Result<(), WamuxError> {
        queries::chats::record_chat_activity(self.db()?, message).await
    }

    async fn refresh_chat_unread_count(
        &self,
        phone: &str,
        chat_id: &str,
    ) -> Result<i64, WamuxError> {
        queries::chats::refresh_chat_unread_count(self.db()?, phone, chat_id).await
    }

    // --- Device blobs ---

    async fn save_device_data(
        &self,
        phone: &str,
        key: &str,
        value: &[u8],
    ) -> Result<(), WamuxError> {
        queries::devices::save_device_data(self.db()?, phone, key, value).await
    }

    async fn get_device_data(
        &self,
        phone: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, WamuxError> {
        queries::devices::get_device_data(self.db()?, phone, key).await
    }

    async fn delete_device_data(&self, phone: &str, key: &str) -> Result<(), WamuxError> {
        queries::devices::delete_device_data(self.db()?, phone, key).await
    }

    async fn get_device_keys(&self, phone: &str) -> Result<Vec<String>, WamuxError> {
        queries::devices::get_device_keys(self.db()?, phone).await
    }
}
