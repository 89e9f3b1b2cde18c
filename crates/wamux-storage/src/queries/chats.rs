// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat metadata operations.

use rusqlite::params;
use wamux_core::{ChatMetadata, Message, WamuxError};

use crate::database::Database;
use crate::queries::NOW;

const COLUMNS: &str = "phone_number, chat_id, chat_name, is_group, unread_count, last_message_id,
                       last_message_timestamp, muted_until, pinned, archived, created_at, updated_at";

/// Unread inbound messages of chat `?2` for tenant `?1`.
const UNREAD_IN_CHAT: &str = "(SELECT COUNT(*) FROM messages
                               WHERE phone_number = ?1 AND chat_id = ?2
                                 AND is_read = 0 AND is_from_me = 0)";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMetadata> {
    Ok(ChatMetadata {
        phone_number: row.get(0)?,
        chat_id: row.get(1)?,
        chat_name: row.get(2)?,
        is_group: row.get(3)?,
        unread_count: row.get(4)?,
        last_message_id: row.get(5)?,
        last_message_timestamp: row.get(6)?,
        muted_until: row.get(7)?,
        pinned: row.get(8)?,
        archived: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Insert or overwrite a chat's metadata row.
pub async fn save_chat_metadata(db: &Database, metadata: &ChatMetadata) -> Result<(), WamuxError> {
    let m = metadata.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO chat_metadata (phone_number, chat_id, chat_name, is_group,
                                                unread_count, last_message_id,
                                                last_message_timestamp, muted_until, pinned,
                                                archived, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                     ON CONFLICT (phone_number, chat_id) DO UPDATE SET
                         chat_name = excluded.chat_name,
                         unread_count = excluded.unread_count,
                         last_message_id = excluded.last_message_id,
                         last_message_timestamp = excluded.last_message_timestamp,
                         muted_until = excluded.muted_until,
                         pinned = excluded.pinned,
                         archived = excluded.archived,
                         updated_at = {NOW}"
                ),
                params![
                    m.phone_number,
                    m.chat_id,
                    m.chat_name,
                    m.is_group,
                    m.unread_count,
                    m.last_message_id,
                    m.last_message_timestamp,
                    m.muted_until,
                    m.pinned,
                    m.archived,
                    m.created_at,
                    m.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_chat_metadata(
    db: &Database,
    phone: &str,
    chat_id: &str,
) -> Result<Option<ChatMetadata>, WamuxError> {
    let phone = phone.to_string();
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM chat_metadata WHERE phone_number = ?1 AND chat_id = ?2"
            ))?;
            match stmt.query_row(params![phone, chat_id], from_row) {
                Ok(chat) => Ok(Some(chat)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Chats of a tenant, most recent activity first; chats without messages last.
pub async fn get_chats(db: &Database, phone: &str) -> Result<Vec<ChatMetadata>, WamuxError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM chat_metadata
                 WHERE phone_number = ?1
                 ORDER BY last_message_timestamp DESC NULLS LAST, chat_id"
            ))?;
            let rows = stmt.query_map(params![phone], from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Overwrite a chat's unread count. A missing chat is left alone.
pub async fn update_chat_unread_count(
    db: &Database,
    phone: &str,
    chat_id: &str,
    count: i64,
) -> Result<(), WamuxError> {
    let phone = phone.to_string();
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "UPDATE chat_metadata SET unread_count = ?3, updated_at = {NOW}
                     WHERE phone_number = ?1 AND chat_id = ?2"
                ),
                params![phone, chat_id, count],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fold a stored message into its chat row in one statement.
///
/// The last-message pointer only moves forward in time, the unread count is
/// recomputed from `messages`, and user-set fields are never touched.
pub async fn record_chat_activity(db: &Database, message: &Message) -> Result<(), WamuxError> {
    let m = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO chat_metadata (phone_number, chat_id, is_group, last_message_id,
                                                last_message_timestamp, unread_count)
                     VALUES (?1, ?2, ?3, ?4, ?5, {UNREAD_IN_CHAT})
                     ON CONFLICT (phone_number, chat_id) DO UPDATE SET
                         is_group = excluded.is_group,
                         last_message_id = CASE
                             WHEN chat_metadata.last_message_timestamp IS NULL
                               OR excluded.last_message_timestamp >= chat_metadata.last_message_timestamp
                             THEN excluded.last_message_id
                             ELSE chat_metadata.last_message_id
                         END,
                         last_message_timestamp = MAX(
                             COALESCE(chat_metadata.last_message_timestamp, ''),
                             excluded.last_message_timestamp
                         ),
                         unread_count = excluded.unread_count,
                         updated_at = {NOW}"
                ),
                params![m.phone_number, m.chat_id, m.is_group, m.id, m.timestamp],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Recompute a chat's unread count from `messages` and return it.
pub async fn refresh_chat_unread_count(
    db: &Database,
    phone: &str,
    chat_id: &str,
) -> Result<i64, WamuxError> {
    let phone = phone.to_string();
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "UPDATE chat_metadata SET unread_count = {UNREAD_IN_CHAT}, updated_at = {NOW}
                     WHERE phone_number = ?1 AND chat_id = ?2"
                ),
                params![phone, chat_id],
            )?;
            conn.query_row(
                &format!("SELECT {UNREAD_IN_CHAT}"),
                params![phone, chat_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}
