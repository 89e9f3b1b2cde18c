// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opaque per-tenant device blobs used by protocol clients.

use rusqlite::params;
use wamux_core::WamuxError;

use crate::database::Database;
use crate::queries::NOW;

pub async fn save_device_data(
    db: &Database,
    phone: &str,
    key: &str,
    value: &[u8],
) -> Result<(), WamuxError> {
    let phone = phone.to_string();
    let key = key.to_string();
    let value = value.to_vec();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO device_storage (phone_number, key, value)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT (phone_number, key) DO UPDATE SET
                         value = excluded.value,
                         updated_at = {NOW}"
                ),
                params![phone, key, value],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_device_data(
    db: &Database,
    phone: &str,
    key: &str,
) -> Result<Option<Vec<u8>>, WamuxError> {
    let phone = phone.to_string();
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            match conn.query_row(
                "SELECT value FROM device_storage WHERE phone_number = ?1 AND key = ?2",
                params![phone, key],
                |row| row.get(0),
            ) {
                Ok(value) => Ok(Some(value)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn delete_device_data(db: &Database, phone: &str, key: &str) -> Result<(), WamuxError> {
    let phone = phone.to_string();
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM device_storage WHERE phone_number = ?1 AND key = ?2",
                params![phone, key],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Keys stored for a tenant, sorted.
pub async fn get_device_keys(db: &Database, phone: &str) -> Result<Vec<String>, WamuxError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT key FROM device_storage WHERE phone_number = ?1 ORDER BY key")?;
            let rows = stmt.query_map(params![phone], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
