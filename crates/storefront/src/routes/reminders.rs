//! Medication reminder route handlers.
//!
//! The reminder book lives in the session. Logged-in customers can push it
//! to the sync table and pull it back on another device.

use apoteka_core::{IntakeStatus, ProductId};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireCustomer;
use crate::models::session::current_customer;
use crate::models::session_keys;
use crate::reminders::sync::{MAX_BATCH, RemoteReminder, valid_reminders};
use crate::reminders::{
    Adherence, Now, Occurrence, Reminder, ReminderBook, ReminderDraft, ReminderError, parse_day,
    parse_time, parse_times,
};
use crate::routes::{Layout, empty_string_as_none};
use crate::state::AppState;

/// Days covered by the adherence summary, today included.
const ADHERENCE_WINDOW_DAYS: u64 = 7;

// =============================================================================
// Forms
// =============================================================================

/// Create/edit form data.
#[derive(Debug, Deserialize)]
pub struct ReminderForm {
    pub medication: String,
    #[serde(default)]
    pub dosage: String,
    /// `08:00, 20:00`
    pub times: String,
    /// `mon, wed, fri`; blank for every day.
    #[serde(default)]
    pub days: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub product_id: Option<ProductId>,
}

impl ReminderForm {
    /// Parse the free-text fields into a draft.
    ///
    /// # Errors
    ///
    /// Returns `ReminderError::InvalidTime` or `ReminderError::InvalidDay`
    /// naming the first bad entry.
    pub fn into_draft(self) -> std::result::Result<ReminderDraft, ReminderError> {
        let days = self
            .days
            .split([',', ' ', ';'])
            .filter(|s| !s.trim().is_empty())
            .map(parse_day)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ReminderDraft {
            medication: self.medication,
            dosage: self.dosage,
            times: parse_times(&self.times)?,
            days,
            start_date: self.start_date,
            end_date: self.end_date,
            notes: self.notes,
            product_id: self.product_id,
        })
    }
}

/// Pause/resume form data.
#[derive(Debug, Deserialize)]
pub struct ActiveForm {
    pub active: bool,
}

/// What to record for a dose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeAction {
    Taken,
    Skipped,
    Clear,
}

/// Intake form data.
#[derive(Debug, Deserialize)]
pub struct IntakeForm {
    pub date: NaiveDate,
    pub slot: String,
    pub action: IntakeAction,
}

/// Reminder page query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ReminderPageQuery {
    pub notice: Option<String>,
    pub count: Option<usize>,
    pub edit: Option<Uuid>,
}

// =============================================================================
// Templates
// =============================================================================

/// Reminder page template.
#[derive(Template, WebTemplate)]
#[template(path = "reminders/index.html")]
pub struct RemindersIndexTemplate {
    pub layout: Layout,
    pub today: NaiveDate,
    pub occurrences: Vec<Occurrence>,
    pub reminders: Vec<Reminder>,
    pub adherence: Adherence,
    pub editing: Option<Reminder>,
    pub notice: Option<String>,
    pub sync_enabled: bool,
}

impl RemindersIndexTemplate {
    /// "Monday, 12 October"
    #[must_use]
    pub fn today_label(&self) -> String {
        self.today.format("%A, %-d %B").to_string()
    }
}

/// User-facing text for a `?notice=` code.
fn notice_message(code: Option<&str>, count: usize) -> Option<String> {
    match code? {
        "created" => Some("Reminder added.".to_string()),
        "updated" => Some("Reminder saved.".to_string()),
        "deleted" => Some("Reminder deleted.".to_string()),
        "pushed" => Some(format!("Uploaded {count} reminder(s).")),
        "pulled" => Some(format!("Downloaded {count} new or changed reminder(s).")),
        _ => None,
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn load_book(session: &Session) -> Result<ReminderBook> {
    Ok(crate::models::session::load(session, session_keys::REMINDERS).await?)
}

async fn save_book(session: &Session, book: &ReminderBook) -> Result<()> {
    crate::models::session::save(session, session_keys::REMINDERS, book).await?;
    Ok(())
}

fn notice_redirect(code: &str) -> Redirect {
    Redirect::to(&format!("/reminders?notice={code}"))
}

// =============================================================================
// Handlers
// =============================================================================

/// Today's schedule, every reminder and the last week's adherence.
///
/// # Errors
///
/// Returns 500 if the session store fails.
#[instrument(skip(state, session, layout))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ReminderPageQuery>,
    session: Session,
    layout: Layout,
) -> Result<impl IntoResponse> {
    let book = load_book(&session).await?;
    let now = Now::current();
    let today = now.today();
    let from = today
        .checked_sub_days(Days::new(ADHERENCE_WINDOW_DAYS - 1))
        .unwrap_or(today);

    Ok(RemindersIndexTemplate {
        layout,
        today,
        occurrences: book.occurrences_on(today, now.local),
        reminders: book.list().into_iter().cloned().collect(),
        adherence: book.adherence(from, today, now.local),
        editing: query.edit.and_then(|id| book.get(id).cloned()),
        notice: notice_message(query.notice.as_deref(), query.count.unwrap_or(0)),
        sync_enabled: state.sync().is_ok(),
    })
}

/// Create a reminder.
///
/// # Errors
///
/// Returns 400 for invalid input or a full book.
#[instrument(skip(session, form))]
pub async fn create(session: Session, Form(form): Form<ReminderForm>) -> Result<impl IntoResponse> {
    let draft = form.into_draft()?;
    let mut book = load_book(&session).await?;
    let id = book.add(draft, Now::current())?;
    save_book(&session, &book).await?;

    add_breadcrumb("reminders", "Reminder created", Some(&[("id", &id.to_string())]));
    Ok(notice_redirect("created"))
}

/// Edit a reminder.
///
/// # Errors
///
/// Returns 404 for an unknown id, 400 for invalid input.
#[instrument(skip(session, form))]
pub async fn update(
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<ReminderForm>,
) -> Result<impl IntoResponse> {
    let draft = form.into_draft()?;
    let mut book = load_book(&session).await?;
    book.update(id, draft, Now::current())?;
    save_book(&session, &book).await?;
    Ok(notice_redirect("updated"))
}

/// Delete a reminder and its intake logs.
///
/// For a logged-in customer the synced row is deleted too; a failure there
/// is logged and the local delete stands.
///
/// # Errors
///
/// Returns 404 for an unknown id.
#[instrument(skip(state, session))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let mut book = load_book(&session).await?;
    book.remove(id, Now::current())?;
    save_book(&session, &book).await?;

    if let (Some(customer), Ok(sync)) = (current_customer(&session).await, state.sync())
        && let Err(e) = sync.delete(customer.sync_user_id(), id).await
    {
        tracing::warn!(id = %id, error = %e, "Failed to delete synced reminder");
    }

    Ok(notice_redirect("deleted"))
}

/// Pause or resume a reminder.
///
/// # Errors
///
/// Returns 404 for an unknown id.
#[instrument(skip(session))]
pub async fn set_active(
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<ActiveForm>,
) -> Result<impl IntoResponse> {
    let mut book = load_book(&session).await?;
    book.set_active(id, form.active, Now::current())?;
    save_book(&session, &book).await?;
    Ok(Redirect::to("/reminders"))
}

/// Record a dose as taken or skipped, or clear the record.
///
/// # Errors
///
/// Returns 404 for an unknown id, 400 for a bad slot, an unscheduled date
/// or a future date.
#[instrument(skip(session))]
pub async fn intake(
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<IntakeForm>,
) -> Result<impl IntoResponse> {
    let slot = parse_time(&form.slot)?;
    let mut book = load_book(&session).await?;

    match form.action {
        IntakeAction::Taken => {
            book.record_intake(id, form.date, slot, IntakeStatus::Taken, Now::current())?;
        }
        IntakeAction::Skipped => {
            book.record_intake(id, form.date, slot, IntakeStatus::Skipped, Now::current())?;
        }
        IntakeAction::Clear => {
            if book.get(id).is_none() {
                return Err(ReminderError::NotFound(id).into());
            }
            book.clear_intake(id, form.date, slot, Now::current());
        }
    }

    save_book(&session, &book).await?;
    Ok(Redirect::to("/reminders"))
}

/// Upload the session book for the logged-in customer.
///
/// # Errors
///
/// Returns 503 if sync is not configured, 502 if the sync service fails.
#[instrument(skip(state, session, customer))]
pub async fn sync_push(
    State(state): State<AppState>,
    session: Session,
    RequireCustomer(customer): RequireCustomer,
) -> Result<impl IntoResponse> {
    let sync = state.sync()?;
    let book = load_book(&session).await?;
    let user_id = customer.sync_user_id();

    let rows: Vec<RemoteReminder> = book
        .reminders()
        .iter()
        .map(|r| RemoteReminder::from_reminder(user_id, r))
        .collect();

    let mut pushed = 0;
    for chunk in rows.chunks(MAX_BATCH) {
        pushed += sync.upsert(user_id, chunk).await?;
    }

    tracing::info!(count = pushed, "Reminder book pushed");
    Ok(Redirect::to(&format!("/reminders?notice=pushed&count={pushed}")))
}

/// Merge the customer's synced reminders into the session book.
///
/// # Errors
///
/// Returns 503 if sync is not configured, 502 if the sync service fails.
#[instrument(skip(state, session, customer))]
pub async fn sync_pull(
    State(state): State<AppState>,
    session: Session,
    RequireCustomer(customer): RequireCustomer,
) -> Result<impl IntoResponse> {
    let sync = state.sync()?;
    let rows = sync.fetch(customer.sync_user_id()).await?;

    let mut book = load_book(&session).await?;
    let outcome = book.merge_remote(valid_reminders(rows), Now::current());
    save_book(&session, &book).await?;

    tracing::info!(
        inserted = outcome.inserted,
        updated = outcome.updated,
        "Reminder book pulled"
    );
    let count = outcome.inserted + outcome.updated;
    Ok(Redirect::to(&format!("/reminders?notice=pulled&count={count}")))
}
