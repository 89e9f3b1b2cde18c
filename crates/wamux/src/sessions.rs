// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wamux sessions` command implementation.
//!
//! Reads persisted session records straight from the database, so it works
//! whether or not `wamux serve` is running.

use std::io::IsTerminal;

use serde::Serialize;
use wamux_config::model::WamuxConfig;
use wamux_core::{SessionRecord, SessionStatus, SessionStore, WamuxError};
use wamux_storage::SqliteStore;

/// One row of `--json` output.
#[derive(Debug, Serialize)]
pub struct SessionRow {
    pub phone_number: String,
    pub status: SessionStatus,
    pub device_id: Option<String>,
    pub platform: Option<String>,
    pub last_seen: String,
}

impl From<SessionRecord> for SessionRow {
    fn from(record: SessionRecord) -> Self {
        Self {
            phone_number: record.phone_number,
            status: record.auth_status,
            device_id: record.device_id,
            platform: record.platform,
            last_seen: record.last_seen,
        }
    }
}

/// Run the `wamux sessions` command.
pub async fn run_sessions(config: &WamuxConfig, json: bool, plain: bool) -> Result<(), WamuxError> {
    let store = SqliteStore::open(config.storage.clone()).await?;
    let rows: Vec<SessionRow> = store
        .list_sessions()
        .await?
        .into_iter()
        .map(SessionRow::from)
        .collect();
    store.close().await?;

    if json {
        let rendered = serde_json::to_string_pretty(&rows)
            .map_err(|e| WamuxError::Internal(format!("failed to render sessions: {e}")))?;
        println!("{rendered}");
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_table(&rows, use_color);
    }
    Ok(())
}

fn print_table(rows: &[SessionRow], use_color: bool) {
    println!();
    println!("  wamux sessions ({})", rows.len());
    println!("  {}", "-".repeat(72));

    if rows.is_empty() {
        println!("    no sessions");
        println!();
        return;
    }

    for row in rows {
        let status = format!("{:<14}", row.status.to_string());
        let status = if use_color {
            use colored::Colorize;
            match row.status {
                SessionStatus::Authenticated => status.green().to_string(),
                SessionStatus::Error => status.red().to_string(),
                SessionStatus::Disconnected => status.yellow().to_string(),
                _ => status,
            }
        } else {
            status
        };
        println!(
            "    {:<16} {} {:<20} {}",
            row.phone_number,
            status,
            short_device(row.device_id.as_deref()),
            row.last_seen
        );
    }
    println!();
}

/// Device ids are long JIDs; the user part is enough to tell them apart.
fn short_device(device_id: Option<&str>) -> &str {
    match device_id {
        Some(id) => id.split('@').next().unwrap_or(id),
        None => "-",
    }
}
