//! Reminder sync against a managed Postgres table.
//!
//! The table is reached through a PostgREST-shaped REST API
//! (`{url}/rest/v1/{table}`) authenticated with a service key. Rows are
//! keyed by reminder id and scoped by `user_id`; upserts overwrite, so the
//! last writer wins.

use std::sync::Arc;

use apoteka_core::ProductId;
use chrono::{DateTime, NaiveDate, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::config::SyncConfig;

use super::{Reminder, ReminderDraft, ReminderError, day_code, parse_day, parse_time};

/// Most rows accepted in one upsert.
pub const MAX_BATCH: usize = 100;

/// Errors that can occur when syncing reminders.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The sync service returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// No sync service is configured.
    #[error("Reminder sync is not configured")]
    NotConfigured,
}

/// A row of the reminders table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteReminder {
    pub id: Uuid,
    /// Overwritten on upsert, so API callers may omit it.
    #[serde(default)]
    pub user_id: String,
    pub medication: String,
    #[serde(default)]
    pub dosage: Option<String>,
    /// `"HH:MM"` strings.
    pub times: Vec<String>,
    /// Three-letter lowercase weekday codes; empty means every day.
    #[serde(default)]
    pub days: Vec<String>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub updated_at: DateTime<Utc>,
}

const fn default_active() -> bool {
    true
}

impl RemoteReminder {
    /// Row for a local reminder.
    #[must_use]
    pub fn from_reminder(user_id: &str, reminder: &Reminder) -> Self {
        Self {
            id: reminder.id,
            user_id: user_id.to_string(),
            medication: reminder.medication.clone(),
            dosage: Some(reminder.dosage.clone()).filter(|d| !d.is_empty()),
            times: reminder
                .times
                .iter()
                .map(|t| t.format("%H:%M").to_string())
                .collect(),
            days: reminder.days.iter().map(|d| day_code(*d).to_string()).collect(),
            start_date: reminder.start_date,
            end_date: reminder.end_date,
            notes: Some(reminder.notes.clone()).filter(|n| !n.is_empty()),
            active: reminder.active,
            product_id: reminder.product_id,
            updated_at: reminder.updated_at,
        }
    }

    /// Validate a row into a local reminder.
    ///
    /// The row goes through the same rules as a form submission. The
    /// reminder's `created_at` is taken from `updated_at` since the table
    /// does not carry it.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn into_reminder(self) -> Result<Reminder, ReminderError> {
        let times = self
            .times
            .iter()
            .map(|t| parse_time(t))
            .collect::<Result<Vec<_>, _>>()?;
        let days = self
            .days
            .iter()
            .map(|d| parse_day(d))
            .collect::<Result<Vec<_>, _>>()?;

        let valid = ReminderDraft {
            medication: self.medication,
            dosage: self.dosage.unwrap_or_default(),
            times,
            days,
            start_date: Some(self.start_date),
            end_date: self.end_date,
            notes: self.notes.unwrap_or_default(),
            product_id: self.product_id,
        }
        .validate(self.start_date)?;

        Ok(Reminder {
            id: self.id,
            medication: valid.medication,
            dosage: valid.dosage,
            times: valid.times,
            days: valid.days,
            start_date: valid.start_date,
            end_date: valid.end_date,
            notes: valid.notes,
            active: self.active,
            product_id: valid.product_id,
            created_at: self.updated_at,
            updated_at: self.updated_at,
        })
    }
}

/// Client for the reminders table.
#[derive(Clone)]
pub struct ReminderSyncClient {
    inner: Arc<ReminderSyncClientInner>,
}

struct ReminderSyncClientInner {
    client: reqwest::Client,
    /// `{url}/rest/v1/{table}`
    endpoint: String,
    service_key: SecretString,
}

impl ReminderSyncClient {
    /// Create a new sync client.
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            inner: Arc::new(ReminderSyncClientInner {
                client: reqwest::Client::new(),
                endpoint: format!("{}/rest/v1/{}", config.url, config.table),
                service_key: config.service_key.clone(),
            }),
        }
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        let key = self.inner.service_key.expose_secret();
        self.inner
            .client
            .request(method, &self.inner.endpoint)
            .header("apikey", key)
            .bearer_auth(key)
    }

    async fn check(response: reqwest::Response) -> Result<String, SyncError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "Reminder sync service returned non-success status"
            );
            return Err(SyncError::Api {
                status: status.as_u16(),
                message: serde_json::from_str::<serde_json::Value>(&text)
                    .ok()
                    .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                    .unwrap_or_else(|| text.chars().take(200).collect()),
            });
        }

        Ok(text)
    }

    /// Insert or overwrite rows for a user. Every row is stamped with
    /// `user_id` regardless of what it carried. Returns the row count.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn upsert(&self, user_id: &str, rows: &[RemoteReminder]) -> Result<usize, SyncError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let rows: Vec<RemoteReminder> = rows
            .iter()
            .cloned()
            .map(|mut row| {
                row.user_id = user_id.to_string();
                row
            })
            .collect();

        let response = self
            .request(reqwest::Method::POST)
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&rows)
            .send()
            .await?;

        Self::check(response).await?;
        tracing::info!(count = rows.len(), "Reminders upserted");
        Ok(rows.len())
    }

    /// All rows for a user, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    #[instrument(skip(self))]
    pub async fn fetch(&self, user_id: &str) -> Result<Vec<RemoteReminder>, SyncError> {
        let response = self
            .request(reqwest::Method::GET)
            .query(&[
                ("user_id", format!("eq.{user_id}")),
                ("order", "updated_at.desc".to_string()),
            ])
            .send()
            .await?;

        let text = Self::check(response).await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse reminder sync response"
            );
            SyncError::Parse(e)
        })
    }

    /// Delete one of a user's rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: &str, id: Uuid) -> Result<(), SyncError> {
        let response = self
            .request(reqwest::Method::DELETE)
            .query(&[
                ("user_id", format!("eq.{user_id}")),
                ("id", format!("eq.{id}")),
            ])
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}

/// Convert fetched rows into reminders, skipping (and logging) rows that
/// fail validation.
#[must_use]
pub fn valid_reminders(rows: Vec<RemoteReminder>) -> Vec<Reminder> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match row.into_reminder() {
                Ok(reminder) => Some(reminder),
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Skipping invalid synced reminder");
                    None
                }
            }
        })
        .collect()
}
