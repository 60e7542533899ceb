//! Reminder snapshot tools.
//!
//! A snapshot is a JSON array of rows in the managed table's shape.
//!
//! # Usage
//!
//! ```bash
//! apoteka-cli sync pull --user jo@example.com --out jo.json
//! apoteka-cli sync push --user jo@example.com --file jo.json
//! ```
//!
//! # Environment Variables
//!
//! - `SYNC_URL` - sync service root URL
//! - `SYNC_SERVICE_KEY` - service role key
//! - `SYNC_TABLE` - table name (default `medication_reminders`)

use std::path::Path;

use apoteka_core::{Email, EmailError};
use apoteka_storefront::config::{ConfigError, SyncConfig};
use apoteka_storefront::reminders::sync::{
    MAX_BATCH, RemoteReminder, ReminderSyncClient, SyncError, valid_reminders,
};

#[derive(Debug, thiserror::Error)]
pub enum SyncCommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid user: {0}")]
    User(#[from] EmailError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Snapshot file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn client() -> Result<ReminderSyncClient, SyncCommandError> {
    let config = SyncConfig::from_env()?.ok_or(SyncError::NotConfigured)?;
    Ok(ReminderSyncClient::new(&config))
}

/// Fetch a customer's reminders, log each valid one and optionally write
/// the raw rows to `out`.
///
/// # Errors
///
/// Returns an error if sync is not configured, the user is not an email
/// address, the fetch fails or the snapshot cannot be written.
pub async fn pull(user: &str, out: Option<&Path>) -> Result<(), SyncCommandError> {
    let email = Email::parse(user)?;
    let rows = client()?.fetch(email.as_str()).await?;

    if let Some(out) = out {
        tokio::fs::write(out, serde_json::to_vec_pretty(&rows)?).await?;
        tracing::info!(path = %out.display(), rows = rows.len(), "Snapshot written");
    }

    let total = rows.len();
    let reminders = valid_reminders(rows);
    for reminder in &reminders {
        tracing::info!(
            id = %reminder.id,
            medication = %reminder.medication,
            active = reminder.active,
            slots = reminder.times.len(),
            updated_at = %reminder.updated_at,
            "Reminder"
        );
    }
    tracing::info!(
        user = %email,
        valid = reminders.len(),
        skipped = total - reminders.len(),
        "Sync pull complete"
    );
    Ok(())
}

/// Upload a snapshot file for a customer.
///
/// Rows that fail validation are skipped. Valid rows are re-encoded so the
/// uploaded data is normalized.
///
/// # Errors
///
/// Returns an error if sync is not configured, the file cannot be read or
/// parsed, or an upsert fails.
pub async fn push(user: &str, file: &Path) -> Result<(), SyncCommandError> {
    let email = Email::parse(user)?;
    let bytes = tokio::fs::read(file).await?;
    let rows: Vec<RemoteReminder> = serde_json::from_slice(&bytes)?;
    let total = rows.len();

    let rows: Vec<RemoteReminder> = valid_reminders(rows)
        .iter()
        .map(|reminder| RemoteReminder::from_reminder(email.as_str(), reminder))
        .collect();

    let client = client()?;
    let mut synced = 0;
    for batch in rows.chunks(MAX_BATCH) {
        synced += client.upsert(email.as_str(), batch).await?;
    }

    tracing::info!(
        user = %email,
        synced,
        skipped = total - rows.len(),
        "Sync push complete"
    );
    Ok(())
}
