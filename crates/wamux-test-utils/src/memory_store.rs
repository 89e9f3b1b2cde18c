// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `SessionStore` for unit tests that do not need SQLite.
//!
//! Mirrors the SQLite store's observable behavior: child rows require an
//! existing session, deleting a session cascades, and orderings match.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use wamux_core::types::now_timestamp;
use wamux_core::{
    AdapterType, ChatMetadata, Contact, HealthStatus, Message, PluginAdapter, SessionRecord,
    SessionStore, SessionUpdate, WamuxError,
};

type Key = (String, String);

#[derive(Default)]
struct Tables {
    sessions: BTreeMap<String, SessionRecord>,
    messages: BTreeMap<Key, Message>,
    contacts: BTreeMap<Key, Contact>,
    chats: BTreeMap<Key, ChatMetadata>,
    devices: BTreeMap<Key, Vec<u8>>,
}

impl Tables {
    fn require_session(&self, phone: &str) -> Result<(), WamuxError> {
        if self.sessions.contains_key(phone) {
            Ok(())
        } else {
            Err(storage_error("FOREIGN KEY constraint failed"))
        }
    }

    fn unread_in_chat(&self, phone: &str, chat_id: &str) -> i64 {
        self.messages
            .values()
            .filter(|m| m.phone_number == phone && m.chat_id == chat_id)
            .filter(|m| !m.is_read && !m.is_from_me)
            .count() as i64
    }
}

fn key(phone: &str, id: &str) -> Key {
    (phone.to_string(), id.to_string())
}

fn storage_error(message: &str) -> WamuxError {
    WamuxError::Storage {
        source: message.to_string().into(),
    }
}

/// A `SessionStore` backed by in-memory maps.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail with a storage error until reset.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Whether [`SessionStore::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn read(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> Result<std::sync::MutexGuard<'_, Tables>, WamuxError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(storage_error("injected write failure"));
        }
        Ok(self.read())
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, WamuxError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), WamuxError> {
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn initialize(&self) -> Result<(), WamuxError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), WamuxError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn create_session(&self, session: &SessionRecord) -> Result<(), WamuxError> {
        let mut tables = self.write()?;
        if tables.sessions.contains_key(&session.phone_number) {
            return Err(storage_error("UNIQUE constraint failed: sessions.phone_number"));
        }
        tables
            .sessions
            .insert(session.phone_number.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, phone: &str) -> Result<Option<SessionRecord>, WamuxError> {
        Ok(self.read().sessions.get(phone).cloned())
    }

    async fn update_session(
        &self,
        phone: &str,
        update: &SessionUpdate,
    ) -> Result<(), WamuxError> {
        let mut tables = self.write()?;
        let record = tables
            .sessions
            .get_mut(phone)
            .ok_or_else(|| WamuxError::session_not_found(phone))?;
        if let Some(status) = update.auth_status {
            record.auth_status = status;
        }
        if let Some(session_id) = &update.session_id {
            record.session_id = session_id.clone();
        }
        if update.device_id.is_some() {
            record.device_id = update.device_id.clone();
        }
        if update.business_name.is_some() {
            record.business_name = update.business_name.clone();
        }
        if update.platform.is_some() {
            record.platform = update.platform.clone();
        }
        let now = now_timestamp();
        record.last_seen = now.clone();
        record.updated_at = now;
        Ok(())
    }

    async fn delete_session(&self, phone: &str) -> Result<(), WamuxError> {
        let mut tables = self.write()?;
        tables.sessions.remove(phone);
        tables.messages.retain(|(p, _), _| p != phone);
        tables.contacts.retain(|(p, _), _| p != phone);
        tables.chats.retain(|(p, _), _| p != phone);
        tables.devices.retain(|(p, _), _| p != phone);
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, WamuxError> {
        let mut sessions: Vec<_> = self.read().sessions.values().cloned().collect();
        sessions.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.phone_number.cmp(&b.phone_number))
        });
        Ok(sessions)
    }

    async fn save_message(&self, message: &Message) -> Result<(), WamuxError> {
        let mut tables = self.write()?;
        tables.require_session(&message.phone_number)?;
        let k = key(&message.phone_number, &message.id);
        match tables.messages.get_mut(&k) {
            Some(existing) => {
                existing.content = message.content.clone();
                existing.is_read = message.is_read;
            }
            None => {
                tables.messages.insert(k, message.clone());
            }
        }
        Ok(())
    }

    async fn get_messages(&self, phone: &str, limit: i64) -> Result<Vec<Message>, WamuxError> {
        let tables = self.read();
        Ok(newest_first(
            tables.messages.values().filter(|m| m.phone_number == phone),
            limit,
        ))
    }

    async fn get_chat_messages(
        &self,
        phone: &str,
        chat_id: &str,
        limit: i64,
    ) -> Result<Vec<Message>, WamuxError> {
        let tables = self.read();
        Ok(newest_first(
            tables
                .messages
                .values()
                .filter(|m| m.phone_number == phone && m.chat_id == chat_id),
            limit,
        ))
    }

    async fn update_message_read_status(
        &self,
        phone: &str,
        message_id: &str,
        is_read: bool,
    ) -> Result<bool, WamuxError> {
        let mut tables = self.write()?;
        Ok(match tables.messages.get_mut(&key(phone, message_id)) {
            Some(message) => {
                message.is_read = is_read;
                true
            }
            None => false,
        })
    }

    async fn get_unread_message_count(&self, phone: &str) -> Result<i64, WamuxError> {
        Ok(self
            .read()
            .messages
            .values()
            .filter(|m| m.phone_number == phone && !m.is_read && !m.is_from_me)
            .count() as i64)
    }

    async fn save_contact(&self, contact: &Contact) -> Result<(), WamuxError> {
        let mut tables = self.write()?;
        tables.require_session(&contact.phone_number)?;
        let k = key(&contact.phone_number, &contact.contact_id);
        match tables.contacts.get_mut(&k) {
            Some(existing) => {
                if contact.display_name.is_some() {
                    existing.display_name = contact.display_name.clone();
                }
                if contact.push_name.is_some() {
                    existing.push_name = contact.push_name.clone();
                }
                existing.is_business = contact.is_business;
                existing.updated_at = now_timestamp();
            }
            None => {
                tables.contacts.insert(k, contact.clone());
            }
        }
        Ok(())
    }

    async fn get_contacts(&self, phone: &str) -> Result<Vec<Contact>, WamuxError> {
        let mut contacts: Vec<_> = self
            .read()
            .contacts
            .values()
            .filter(|c| c.phone_number == phone)
            .cloned()
            .collect();
        contacts.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.contact_id.cmp(&b.contact_id))
        });
        Ok(contacts)
    }

    async fn get_contact(
        &self,
        phone: &str,
        contact_id: &str,
    ) -> Result<Option<Contact>, WamuxError> {
        Ok(self.read().contacts.get(&key(phone, contact_id)).cloned())
    }

    async fn save_chat_metadata(&self, metadata: &ChatMetadata) -> Result<(), WamuxError> {
        let mut tables = self.write()?;
        tables.require_session(&metadata.phone_number)?;
        tables.chats.insert(
            key(&metadata.phone_number, &metadata.chat_id),
            metadata.clone(),
        );
        Ok(())
    }

    async fn get_chat_metadata(
        &self,
        phone: &str,
        chat_id: &str,
    ) -> Result<Option<ChatMetadata>, WamuxError> {
        Ok(self.read().chats.get(&key(phone, chat_id)).cloned())
    }

    async fn get_chats(&self, phone: &str) -> Result<Vec<ChatMetadata>, WamuxError> {
        let mut chats: Vec<_> = self
            .read()
            .chats
            .values()
            .filter(|c| c.phone_number == phone)
            .cloned()
            .collect();
        // Newest activity first, chats without messages last.
        chats.sort_by(|a, b| {
            match (&a.last_message_timestamp, &b.last_message_timestamp) {
                (Some(x), Some(y)) => y.cmp(x),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| a.chat_id.cmp(&b.chat_id))
        });
        Ok(chats)
    }

    async fn update_chat_unread_count(
        &self,
        phone: &str,
        chat_id: &str,
        count: i64,
    ) -> Result<(), WamuxError> {
        let mut tables = self.write()?;
        if let Some(chat) = tables.chats.get_mut(&key(phone, chat_id)) {
            chat.unread_count = count;
            chat.updated_at = now_timestamp();
        }
        Ok(())
    }

    async fn record_chat_activity(&self, message: &Message) -> Result<(), WamuxError> {
        let mut tables = self.write()?;
        tables.require_session(&message.phone_number)?;
        let unread = tables.unread_in_chat(&message.phone_number, &message.chat_id);
        let chat = tables
            .chats
            .entry(key(&message.phone_number, &message.chat_id))
            .or_insert_with(|| {
                ChatMetadata::new(&message.phone_number, &message.chat_id, message.is_group)
            });
        chat.is_group = message.is_group;
        let newer = chat
            .last_message_timestamp
            .as_deref()
            .is_none_or(|ts| message.timestamp.as_str() >= ts);
        if newer {
            chat.last_message_id = Some(message.id.clone());
            chat.last_message_timestamp = Some(message.timestamp.clone());
        }
        chat.unread_count = unread;
        chat.updated_at = now_timestamp();
        Ok(())
    }

    async fn refresh_chat_unread_count(
        &self,
        phone: &str,
        chat_id: &str,
    ) -> Result<i64, WamuxError> {
        let mut tables = self.write()?;
        let unread = tables.unread_in_chat(phone, chat_id);
        if let Some(chat) = tables.chats.get_mut(&key(phone, chat_id)) {
            chat.unread_count = unread;
            chat.updated_at = now_timestamp();
        }
        Ok(unread)
    }

    async fn save_device_data(
        &self,
        phone: &str,
        key_name: &str,
        value: &[u8],
    ) -> Result<(), WamuxError> {
        let mut tables = self.write()?;
        tables.require_session(phone)?;
        tables.devices.insert(key(phone, key_name), value.to_vec());
        Ok(())
    }

    async fn get_device_data(
        &self,
        phone: &str,
        key_name: &str,
    ) -> Result<Option<Vec<u8>>, WamuxError> {
        Ok(self.read().devices.get(&key(phone, key_name)).cloned())
    }

    async fn delete_device_data(&self, phone: &str, key_name: &str) -> Result<(), WamuxError> {
        self.write()?.devices.remove(&key(phone, key_name));
        Ok(())
    }

    async fn get_device_keys(&self, phone: &str) -> Result<Vec<String>, WamuxError> {
        Ok(self
            .read()
            .devices
            .keys()
            .filter(|(p, _)| p == phone)
            .map(|(_, k)| k.clone())
            .collect())
    }
}

fn newest_first<'a>(messages: impl Iterator<Item = &'a Message>, limit: i64) -> Vec<Message> {
    let mut out: Vec<Message> = messages.cloned().collect();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    if limit >= 0 {
        out.truncate(limit as usize);
    }
    out
}
