// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session row operations.

use std::str::FromStr;

use rusqlite::params;
use wamux_core::{SessionRecord, SessionStatus, SessionUpdate, WamuxError};

use crate::database::Database;
use crate::queries::NOW;

const COLUMNS: &str = "phone_number, session_id, auth_status, device_id, business_name, platform,
                       last_seen, created_at, updated_at";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    let status: String = row.get(2)?;
    let auth_status = SessionStatus::from_str(&status).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(SessionRecord {
        phone_number: row.get(0)?,
        session_id: row.get(1)?,
        auth_status,
        device_id: row.get(3)?,
        business_name: row.get(4)?,
        platform: row.get(5)?,
        last_seen: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Insert a session row. Fails on a duplicate phone number.
pub async fn create_session(db: &Database, session: &SessionRecord) -> Result<(), WamuxError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (phone_number, session_id, auth_status, device_id,
                                       business_name, platform, last_seen, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    session.phone_number,
                    session.session_id,
                    session.auth_status.to_string(),
                    session.device_id,
                    session.business_name,
                    session.platform,
                    session.last_seen,
                    session.created_at,
                    session.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_session(db: &Database, phone: &str) -> Result<Option<SessionRecord>, WamuxError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM sessions WHERE phone_number = ?1"
            ))?;
            match stmt.query_row(params![phone], from_row) {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Apply a partial update. `None` fields keep their stored value;
/// `last_seen` and `updated_at` are always refreshed.
pub async fn update_session(
    db: &Database,
    phone: &str,
    update: &SessionUpdate,
) -> Result<(), WamuxError> {
    let phone_owned = phone.to_string();
    let update = update.clone();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "UPDATE sessions SET
                        auth_status = COALESCE(?2, auth_status),
                        session_id = COALESCE(?3, session_id),
                        device_id = COALESCE(?4, device_id),
                        business_name = COALESCE(?5, business_name),
                        platform = COALESCE(?6, platform),
                        last_seen = {NOW},
                        updated_at = {NOW}
                     WHERE phone_number = ?1"
                ),
                params![
                    phone_owned,
                    update.auth_status.map(|s| s.to_string()),
                    update.session_id,
                    update.device_id,
                    update.business_name,
                    update.platform,
                ],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if changed == 0 {
        return Err(WamuxError::session_not_found(phone));
    }
    Ok(())
}

/// Delete a session row. Child rows go with it through `ON DELETE CASCADE`.
pub async fn delete_session(db: &Database, phone: &str) -> Result<(), WamuxError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM sessions WHERE phone_number = ?1",
                params![phone],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Every session, most recently created first.
pub async fn list_sessions(db: &Database) -> Result<Vec<SessionRecord>, WamuxError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM sessions ORDER BY created_at DESC, phone_number"
            ))?;
            let rows = stmt.query_map([], from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
