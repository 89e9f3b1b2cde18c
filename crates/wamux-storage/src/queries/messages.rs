// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message operations.
//!
//! Content is stored as the JSON form of [`MessageContent`].

use rusqlite::params;
use wamux_core::{Message, MessageContent, WamuxError};

use crate::database::Database;

const COLUMNS: &str = "id, phone_number, chat_id, sender_id, content, timestamp,
                       is_from_me, is_group, is_read, created_at";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let raw: String = row.get(4)?;
    let content: MessageContent = serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Message {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        chat_id: row.get(2)?,
        sender_id: row.get(3)?,
        content,
        timestamp: row.get(5)?,
        is_from_me: row.get(6)?,
        is_group: row.get(7)?,
        is_read: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Insert a message. A repeated `(phone_number, id)` updates the content and
/// read flag instead.
pub async fn save_message(db: &Database, message: &Message) -> Result<(), WamuxError> {
    let content = serde_json::to_string(&message.content).map_err(|e| WamuxError::Storage {
        source: Box::new(e),
    })?;
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, phone_number, chat_id, sender_id, content, timestamp,
                                       is_from_me, is_group, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT (phone_number, id) DO UPDATE SET
                     content = excluded.content,
                     is_read = excluded.is_read",
                params![
                    message.id,
                    message.phone_number,
                    message.chat_id,
                    message.sender_id,
                    content,
                    message.timestamp,
                    message.is_from_me,
                    message.is_group,
                    message.is_read,
                    message.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The tenant's newest `limit` messages, newest first.
pub async fn get_messages(db: &Database, phone: &str, limit: i64) -> Result<Vec<Message>, WamuxError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE phone_number = ?1
                 ORDER BY timestamp DESC, created_at DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![phone, limit], from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The newest `limit` messages of one chat, newest first.
pub async fn get_chat_messages(
    db: &Database,
    phone: &str,
    chat_id: &str,
    limit: i64,
) -> Result<Vec<Message>, WamuxError> {
    let phone = phone.to_string();
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE phone_number = ?1 AND chat_id = ?2
                 ORDER BY timestamp DESC, created_at DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![phone, chat_id, limit], from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Set the read flag of one message. Returns whether it exists.
pub async fn update_message_read_status(
    db: &Database,
    phone: &str,
    message_id: &str,
    is_read: bool,
) -> Result<bool, WamuxError> {
    let phone = phone.to_string();
    let message_id = message_id.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET is_read = ?3 WHERE phone_number = ?1 AND id = ?2",
                params![phone, message_id, is_read],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(changed > 0)
}

/// Inbound messages the tenant has not read yet.
pub async fn get_unread_message_count(db: &Database, phone: &str) -> Result<i64, WamuxError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE phone_number = ?1 AND is_read = 0 AND is_from_me = 0",
                params![phone],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_with_session;

    const PHONE: &str = "+15551230000";

    fn make_message(id: &str, chat: &str, ts: &str, from_me: bool) -> Message {
        Message {
            id: id.to_string(),
            phone_number: PHONE.to_string(),
            chat_id: chat.to_string(),
            sender_id: "peer@s.whatsapp.net".to_string(),
            content: MessageContent::Text {
                text: format!("body of {id}"),
            },
            timestamp: ts.to_string(),
            is_from_me: from_me,
            is_group: false,
            is_read: false,
            created_at: ts.to_string(),
        }
    }

    #[tokio::test]
    async fn messages_are_listed_newest_first_with_limit() {
        let (db, _dir) = setup_with_session(PHONE).await;
        for (id, ts) in [
            ("m1", "2026-01-01T00:00:01.000Z"),
            ("m3", "2026-01-01T00:00:03.000Z"),
            ("m2", "2026-01-01T00:00:02.000Z"),
        ] {
            save_message(&db, &make_message(id, "chat-a", ts, false))
                .await
                .unwrap();
        }

        let ids: Vec<String> = get_messages(&db, PHONE, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["m3", "m2"]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn chat_messages_are_filtered() {
        let (db, _dir) = setup_with_session(PHONE).await;
        save_message(&db, &make_message("a1", "chat-a", "2026-01-01T00:00:01.000Z", false))
            .await
            .unwrap();
        save_message(&db, &make_message("b1", "chat-b", "2026-01-01T00:00:02.000Z", false))
            .await
            .unwrap();

        let chat_a = get_chat_messages(&db, PHONE, "chat-a", 50).await.unwrap();
        assert_eq!(chat_a.len(), 1);
        assert_eq!(chat_a[0].id, "a1");
        assert_eq!(chat_a[0].content.text(), Some("body of a1"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_id_updates_content_and_read_flag() {
        let (db, _dir) = setup_with_session(PHONE).await;
        let mut message = make_message("m1", "chat-a", "2026-01-01T00:00:01.000Z", false);
        save_message(&db, &message).await.unwrap();

        message.content = MessageContent::Other;
        message.is_read = true;
        save_message(&db, &message).await.unwrap();

        let stored = get_messages(&db, PHONE, 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, MessageContent::Other);
        assert!(stored[0].is_read);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unread_count_ignores_own_and_read_messages() {
        let (db, _dir) = setup_with_session(PHONE).await;
        save_message(&db, &make_message("in1", "c", "2026-01-01T00:00:01.000Z", false))
            .await
            .unwrap();
        save_message(&db, &make_message("in2", "c", "2026-01-01T00:00:02.000Z", false))
            .await
            .unwrap();
        save_message(&db, &make_message("out1", "c", "2026-01-01T00:00:03.000Z", true))
            .await
            .unwrap();
        assert_eq!(get_unread_message_count(&db, PHONE).await.unwrap(), 2);

        assert!(update_message_read_status(&db, PHONE, "in1", true).await.unwrap());
        assert_eq!(get_unread_message_count(&db, PHONE).await.unwrap(), 1);

        assert!(!update_message_read_status(&db, PHONE, "nope", true).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn message_requires_session_row() {
        let (db, _dir) = setup_with_session(PHONE).await;
        let mut orphan = make_message("m1", "c", "2026-01-01T00:00:01.000Z", false);
        orphan.phone_number = "+15559999999".into();
        assert!(save_message(&db, &orphan).await.is_err());
        db.close().await.unwrap();
    }
}
