//! Medication reminders.
//!
//! A visitor keeps a small book of reminders ("Ibuprofen 400 mg at 08:00
//! and 20:00, weekdays") plus a log of which scheduled doses were taken or
//! skipped. The book lives in the session; customers who are logged in can
//! push it to, and pull it from, a managed table (see [`sync`]).
//!
//! Times are wall-clock times in the storefront's local timezone.

mod book;
pub mod sync;

pub use book::{Adherence, MergeOutcome, Occurrence, ReminderBook};

use apoteka_core::{IntakeStatus, ProductId};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Longest medication name accepted.
pub const MAX_MEDICATION_CHARS: usize = 120;
/// Longest dosage text accepted.
pub const MAX_DOSAGE_CHARS: usize = 60;
/// Longest note accepted.
pub const MAX_NOTES_CHARS: usize = 500;
/// Most daily slots one reminder may have.
pub const MAX_TIMES: usize = 8;
/// Most reminders one book may hold.
pub const MAX_REMINDERS: usize = 50;
/// Intake logs older than this many days are dropped on every write.
pub const LOG_RETENTION_DAYS: i64 = 90;

/// Errors from reminder validation and book operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReminderError {
    #[error("Medication name is required")]
    EmptyMedication,

    #[error("Medication name must be at most {MAX_MEDICATION_CHARS} characters")]
    MedicationTooLong,

    #[error("Dosage must be at most {MAX_DOSAGE_CHARS} characters")]
    DosageTooLong,

    #[error("Notes must be at most {MAX_NOTES_CHARS} characters")]
    NotesTooLong,

    #[error("At least one reminder time is required")]
    NoTimes,

    #[error("At most {MAX_TIMES} reminder times are allowed")]
    TooManyTimes,

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Invalid day: {0}")]
    InvalidDay(String),

    #[error("End date cannot be before start date")]
    InvalidDateRange,

    #[error("At most {MAX_REMINDERS} reminders can be kept")]
    TooManyReminders,

    #[error("Reminder not found: {0}")]
    NotFound(Uuid),

    #[error("{0} is not one of this reminder's times")]
    UnknownSlot(NaiveTime),

    #[error("This reminder is not scheduled on {0}")]
    NotScheduled(NaiveDate),

    #[error("Cannot record an intake for a future date")]
    FutureDate,
}

/// The moment an operation happens, in UTC (for timestamps) and local
/// wall-clock time (for schedules).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Now {
    pub utc: DateTime<Utc>,
    pub local: NaiveDateTime,
}

impl Now {
    /// The current moment on this machine.
    #[must_use]
    pub fn current() -> Self {
        let local = Local::now();
        Self {
            utc: local.with_timezone(&Utc),
            local: local.naive_local(),
        }
    }

    /// A fixed moment whose local time equals its UTC time.
    #[must_use]
    pub fn fixed(local: NaiveDateTime) -> Self {
        Self {
            utc: Utc.from_utc_datetime(&local),
            local,
        }
    }

    /// Local calendar date.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.local.date()
    }
}

/// A medication reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub medication: String,
    #[serde(default)]
    pub dosage: String,
    /// Daily slots, sorted and distinct.
    pub times: Vec<NaiveTime>,
    /// Weekdays the reminder applies to; empty means every day.
    #[serde(default)]
    pub days: Vec<Weekday>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
    pub active: bool,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reminder {
    /// Whether a dose is due on `date`: active, within the date range and
    /// on one of the configured weekdays.
    #[must_use]
    pub fn is_scheduled_on(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;

        self.active
            && date >= self.start_date
            && self.end_date.is_none_or(|end| date <= end)
            && (self.days.is_empty() || self.days.contains(&date.weekday()))
    }

    /// Whether `slot` is one of this reminder's times.
    #[must_use]
    pub fn has_slot(&self, slot: NaiveTime) -> bool {
        self.times.contains(&slot)
    }

    /// Earliest daily slot.
    #[must_use]
    pub fn first_slot(&self) -> Option<NaiveTime> {
        self.times.first().copied()
    }

    /// Slots formatted "08:00, 20:00".
    #[must_use]
    pub fn times_label(&self) -> String {
        self.times
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Day codes as the edit form takes them ("mon, wed"), empty for every day.
    #[must_use]
    pub fn day_codes(&self) -> String {
        self.days
            .iter()
            .map(|d| day_code(*d))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Days formatted "Mon, Wed" or "Every day".
    #[must_use]
    pub fn days_label(&self) -> String {
        if self.days.is_empty() {
            return "Every day".to_string();
        }
        self.days
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// User input for creating or editing a reminder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderDraft {
    pub medication: String,
    pub dosage: String,
    pub times: Vec<NaiveTime>,
    pub days: Vec<Weekday>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notes: String,
    pub product_id: Option<ProductId>,
}

/// A draft that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidDraft {
    pub medication: String,
    pub dosage: String,
    pub times: Vec<NaiveTime>,
    pub days: Vec<Weekday>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: String,
    pub product_id: Option<ProductId>,
}

impl ReminderDraft {
    /// Normalize and validate. A missing start date defaults to `today`.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub(crate) fn validate(self, today: NaiveDate) -> Result<ValidDraft, ReminderError> {
        let medication = self.medication.trim().to_string();
        if medication.is_empty() {
            return Err(ReminderError::EmptyMedication);
        }
        if medication.chars().count() > MAX_MEDICATION_CHARS {
            return Err(ReminderError::MedicationTooLong);
        }

        let dosage = self.dosage.trim().to_string();
        if dosage.chars().count() > MAX_DOSAGE_CHARS {
            return Err(ReminderError::DosageTooLong);
        }

        let notes = self.notes.trim().to_string();
        if notes.chars().count() > MAX_NOTES_CHARS {
            return Err(ReminderError::NotesTooLong);
        }

        let mut times = self.times;
        times.sort_unstable();
        times.dedup();
        if times.is_empty() {
            return Err(ReminderError::NoTimes);
        }
        if times.len() > MAX_TIMES {
            return Err(ReminderError::TooManyTimes);
        }

        let days = normalize_days(self.days);

        let start_date = self.start_date.unwrap_or(today);
        if self.end_date.is_some_and(|end| end < start_date) {
            return Err(ReminderError::InvalidDateRange);
        }

        Ok(ValidDraft {
            medication,
            dosage,
            times,
            days,
            start_date,
            end_date: self.end_date,
            notes,
            product_id: self.product_id,
        })
    }
}

/// Sort Monday-first, drop duplicates, and collapse all seven days to
/// "every day".
fn normalize_days(mut days: Vec<Weekday>) -> Vec<Weekday> {
    days.sort_by_key(Weekday::num_days_from_monday);
    days.dedup();
    if days.len() == 7 {
        days.clear();
    }
    days
}

/// Parse a comma- or space-separated list of `HH:MM` times.
///
/// # Errors
///
/// Returns `ReminderError::InvalidTime` naming the first bad entry.
pub fn parse_times(input: &str) -> Result<Vec<NaiveTime>, ReminderError> {
    input
        .split([',', ' ', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_time)
        .collect()
}

/// Parse a single `HH:MM` (or `HH:MM:SS`) time.
///
/// # Errors
///
/// Returns `ReminderError::InvalidTime` if the input is not a valid time.
pub fn parse_time(input: &str) -> Result<NaiveTime, ReminderError> {
    let input = input.trim();
    NaiveTime::parse_from_str(input, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M:%S"))
        .map_err(|_| ReminderError::InvalidTime(input.to_string()))
}

/// Parse a weekday name or abbreviation ("mon", "Tuesday").
///
/// # Errors
///
/// Returns `ReminderError::InvalidDay` if the input is not a weekday.
pub fn parse_day(input: &str) -> Result<Weekday, ReminderError> {
    input
        .trim()
        .parse::<Weekday>()
        .map_err(|_| ReminderError::InvalidDay(input.trim().to_string()))
}

/// Three-letter lowercase weekday code ("mon").
#[must_use]
pub const fn day_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

/// A recorded intake for one slot of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeLog {
    pub reminder_id: Uuid,
    pub date: NaiveDate,
    pub slot: NaiveTime,
    pub status: IntakeStatus,
    pub recorded_at: DateTime<Utc>,
}
