// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact operations.

use rusqlite::params;
use wamux_core::{Contact, WamuxError};

use crate::database::Database;

const COLUMNS: &str =
    "phone_number, contact_id, display_name, push_name, is_business, created_at, updated_at";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        phone_number: row.get(0)?,
        contact_id: row.get(1)?,
        display_name: row.get(2)?,
        push_name: row.get(3)?,
        is_business: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Insert or update a contact. Names already known are kept when the update
/// carries none.
pub async fn save_contact(db: &Database, contact: &Contact) -> Result<(), WamuxError> {
    let contact = contact.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contacts (phone_number, contact_id, display_name, push_name,
                                       is_business, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (phone_number, contact_id) DO UPDATE SET
                     display_name = COALESCE(excluded.display_name, contacts.display_name),
                     push_name = COALESCE(excluded.push_name, contacts.push_name),
                     is_business = excluded.is_business,
                     updated_at = excluded.updated_at",
                params![
                    contact.phone_number,
                    contact.contact_id,
                    contact.display_name,
                    contact.push_name,
                    contact.is_business,
                    contact.created_at,
                    contact.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All contacts of a tenant ordered by display name.
pub async fn get_contacts(db: &Database, phone: &str) -> Result<Vec<Contact>, WamuxError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM contacts
                 WHERE phone_number = ?1
                 ORDER BY display_name, contact_id"
            ))?;
            let rows = stmt.query_map(params![phone], from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_contact(
    db: &Database,
    phone: &str,
    contact_id: &str,
) -> Result<Option<Contact>, WamuxError> {
    let phone = phone.to_string();
    let contact_id = contact_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM contacts WHERE phone_number = ?1 AND contact_id = ?2"
            ))?;
            match stmt.query_row(params![phone, contact_id], from_row) {
                Ok(contact) => Ok(Some(contact)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_with_session;
    use wamux_core::types::now_timestamp;

    const PHONE: &str = "+15551230000";

    fn contact(id: &str, display: Option<&str>, push: Option<&str>) -> Contact {
        let now = now_timestamp();
        Contact {
            phone_number: PHONE.to_string(),
            contact_id: id.to_string(),
            display_name: display.map(str::to_string),
            push_name: push.map(str::to_string),
            is_business: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn contacts_are_sorted_by_display_name() {
        let (db, _dir) = setup_with_session(PHONE).await;
        save_contact(&db, &contact("b@s.whatsapp.net", Some("Zed"), None))
            .await
            .unwrap();
        save_contact(&db, &contact("a@s.whatsapp.net", Some("Alice"), None))
            .await
            .unwrap();

        let names: Vec<Option<String>> = get_contacts(&db, PHONE)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.display_name)
            .collect();
        assert_eq!(names, vec![Some("Alice".into()), Some("Zed".into())]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_keeps_known_names() {
        let (db, _dir) = setup_with_session(PHONE).await;
        save_contact(&db, &contact("a@s.whatsapp.net", Some("Alice"), Some("ali")))
            .await
            .unwrap();
        let mut update = contact("a@s.whatsapp.net", None, Some("alice!"));
        update.is_business = true;
        save_contact(&db, &update).await.unwrap();

        let stored = get_contact(&db, PHONE, "a@s.whatsapp.net")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.display_name.as_deref(), Some("Alice"));
        assert_eq!(stored.push_name.as_deref(), Some("alice!"));
        assert!(stored.is_business);
        assert_eq!(get_contacts(&db, PHONE).await.unwrap().len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_contact_is_none() {
        let (db, _dir) = setup_with_session(PHONE).await;
        assert!(get_contact(&db, PHONE, "nobody").await.unwrap().is_none());
        db.close().await.unwrap();
    }
}
