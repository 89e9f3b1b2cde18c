// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence interface for sessions and their tenant-scoped data.

use async_trait::async_trait;

use crate::error::WamuxError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatMetadata, Contact, Message, SessionRecord, SessionUpdate};

/// Store for sessions, messages, contacts, chat metadata, and device blobs.
///
/// Every call is keyed first by the tenant phone number. Deleting a session
/// removes every row the tenant owns.
#[async_trait]
pub trait SessionStore: PluginAdapter {
    /// Initializes the backend (migrations, connections).
    async fn initialize(&self) -> Result<(), WamuxError>;

    /// Closes the backend, flushing pending writes.
    async fn close(&self) -> Result<(), WamuxError>;

    // --- Sessions ---

    /// Insert a new session row. Fails if the tenant already has one.
    async fn create_session(&self, session: &SessionRecord) -> Result<(), WamuxError>;

    async fn get_session(&self, phone: &str) -> Result<Option<SessionRecord>, WamuxError>;

    /// Apply a partial update and refresh `last_seen`/`updated_at`.
    async fn update_session(&self, phone: &str, update: &SessionUpdate)
    -> Result<(), WamuxError>;

    /// Delete the session and everything the tenant owns.
    async fn delete_session(&self, phone: &str) -> Result<(), WamuxError>;

    /// All sessions, newest-created first.
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, WamuxError>;

    // --- Messages ---

    /// Insert or, on a repeated id, update content and read flag.
    async fn save_message(&self, message: &Message) -> Result<(), WamuxError>;

    /// Newest-first messages for a tenant.
    async fn get_messages(&self, phone: &str, limit: i64) -> Result<Vec<Message>, WamuxError>;

    /// Newest-first messages for one chat.
    async fn get_chat_messages(
        &self,
        phone: &str,
        chat_id: &str,
        limit: i64,
    ) -> Result<Vec<Message>, WamuxError>;

    /// Set the read flag. Returns whether a message matched.
    async fn update_message_read_status(
        &self,
        phone: &str,
        message_id: &str,
        is_read: bool,
    ) -> Result<bool, WamuxError>;

    /// Count of inbound messages not yet read.
    async fn get_unread_message_count(&self, phone: &str) -> Result<i64, WamuxError>;

    // --- Contacts ---

    async fn save_contact(&self, contact: &Contact) -> Result<(), WamuxError>;

    async fn get_contacts(&self, phone: &str) -> Result<Vec<Contact>, WamuxError>;

    async fn get_contact(
        &self,
        phone: &str,
        contact_id: &str,
    ) -> Result<Option<Contact>, WamuxError>;

    // --- Chat metadata ---

    async fn save_chat_metadata(&self, metadata: &ChatMetadata) -> Result<(), WamuxError>;

    async fn get_chat_metadata(
        &self,
        phone: &str,
        chat_id: &str,
    ) -> Result<Option<ChatMetadata>, WamuxError>;

    /// Chats ordered by most recent message.
    async fn get_chats(&self, phone: &str) -> Result<Vec<ChatMetadata>, WamuxError>;

    async fn update_chat_unread_count(
        &self,
        phone: &str,
        chat_id: &str,
        count: i64,
    ) -> Result<(), WamuxError>;

    /// Fold a stored message into its chat's metadata row, creating the row
    /// on first sight. User fields (name, pinned, archived, muted) are kept.
    async fn record_chat_activity(&self, message: &Message) -> Result<(), WamuxError>;

    /// Recompute a chat's unread count from its stored messages.
    async fn refresh_chat_unread_count(
        &self,
        phone: &str,
        chat_id: &str,
    ) -> Result<i64, WamuxError>;

    // --- Device blobs ---

    async fn save_device_data(
        &self,
        phone: &str,
        key: &str,
        value: &[u8],
    ) -> Result<(), WamuxError>;

    async fn get_device_data(&self, phone: &str, key: &str)
    -> Result<Option<Vec<u8>>, WamuxError>;

    async fn delete_device_data(&self, phone: &str, key: &str) -> Result<(), WamuxError>;

    async fn get_device_keys(&self, phone: &str) -> Result<Vec<String>, WamuxError>;
}
