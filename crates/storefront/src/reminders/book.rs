//! The reminder book: reminders plus their intake logs.

use apoteka_core::IntakeStatus;
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    IntakeLog, LOG_RETENTION_DAYS, MAX_REMINDERS, Now, Reminder, ReminderDraft, ReminderError,
};

/// One scheduled dose on a given day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub reminder_id: Uuid,
    pub medication: String,
    pub dosage: String,
    pub slot: NaiveTime,
    pub status: Option<IntakeStatus>,
    /// Not logged and the slot time has passed.
    pub overdue: bool,
}

impl Occurrence {
    /// Slot formatted "08:00".
    #[must_use]
    pub fn slot_label(&self) -> String {
        self.slot.format("%H:%M").to_string()
    }

    #[must_use]
    pub fn is_taken(&self) -> bool {
        self.status == Some(IntakeStatus::Taken)
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.status == Some(IntakeStatus::Skipped)
    }
}

/// Adherence over a date range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Adherence {
    pub scheduled: u32,
    pub taken: u32,
    pub skipped: u32,
    pub missed: u32,
    /// Rounded percentage of scheduled doses taken, `None` with nothing scheduled.
    pub taken_rate: Option<u32>,
}

/// Result of merging remote reminders into the book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub updated: usize,
}

/// A visitor's reminders and intake logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderBook {
    #[serde(default)]
    reminders: Vec<Reminder>,
    #[serde(default)]
    logs: Vec<IntakeLog>,
}

impl ReminderBook {
    /// Create a reminder from a draft. Returns its id.
    ///
    /// # Errors
    ///
    /// Returns a validation error, or `ReminderError::TooManyReminders` when
    /// the book is full.
    pub fn add(&mut self, draft: ReminderDraft, now: Now) -> Result<Uuid, ReminderError> {
        if self.reminders.len() >= MAX_REMINDERS {
            return Err(ReminderError::TooManyReminders);
        }
        let valid = draft.validate(now.today())?;

        let id = Uuid::new_v4();
        self.reminders.push(Reminder {
            id,
            medication: valid.medication,
            dosage: valid.dosage,
            times: valid.times,
            days: valid.days,
            start_date: valid.start_date,
            end_date: valid.end_date,
            notes: valid.notes,
            active: true,
            product_id: valid.product_id,
            created_at: now.utc,
            updated_at: now.utc,
        });
        self.prune_for(now);
        Ok(id)
    }

    /// Replace a reminder's fields from a draft.
    ///
    /// Logs for slots the reminder no longer has are dropped.
    ///
    /// # Errors
    ///
    /// Returns `ReminderError::NotFound` or a validation error.
    pub fn update(&mut self, id: Uuid, draft: ReminderDraft, now: Now) -> Result<(), ReminderError> {
        let valid = draft.validate(now.today())?;
        let reminder = self
            .reminders
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ReminderError::NotFound(id))?;

        reminder.medication = valid.medication;
        reminder.dosage = valid.dosage;
        reminder.times = valid.times;
        reminder.days = valid.days;
        reminder.start_date = valid.start_date;
        reminder.end_date = valid.end_date;
        reminder.notes = valid.notes;
        reminder.product_id = valid.product_id;
        reminder.updated_at = now.utc;

        let times = reminder.times.clone();
        self.logs
            .retain(|log| log.reminder_id != id || times.contains(&log.slot));
        self.prune_for(now);
        Ok(())
    }

    /// Delete a reminder and its logs.
    ///
    /// # Errors
    ///
    /// Returns `ReminderError::NotFound` if the reminder does not exist.
    pub fn remove(&mut self, id: Uuid, now: Now) -> Result<Reminder, ReminderError> {
        let index = self
            .reminders
            .iter()
            .position(|r| r.id == id)
            .ok_or(ReminderError::NotFound(id))?;
        let removed = self.reminders.remove(index);
        self.logs.retain(|log| log.reminder_id != id);
        self.prune_for(now);
        Ok(removed)
    }

    /// Pause or resume a reminder.
    ///
    /// # Errors
    ///
    /// Returns `ReminderError::NotFound` if the reminder does not exist.
    pub fn set_active(&mut self, id: Uuid, active: bool, now: Now) -> Result<(), ReminderError> {
        let reminder = self
            .reminders
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ReminderError::NotFound(id))?;
        if reminder.active != active {
            reminder.active = active;
            reminder.updated_at = now.utc;
        }
        self.prune_for(now);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Reminder> {
        self.reminders.iter().find(|r| r.id == id)
    }

    /// Reminders sorted by first daily slot, then medication name.
    #[must_use]
    pub fn list(&self) -> Vec<&Reminder> {
        let mut list: Vec<&Reminder> = self.reminders.iter().collect();
        list.sort_by(|a, b| {
            a.first_slot()
                .cmp(&b.first_slot())
                .then_with(|| a.medication.to_lowercase().cmp(&b.medication.to_lowercase()))
        });
        list
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reminders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }

    /// Every intake log, oldest date first.
    #[must_use]
    pub fn logs(&self) -> &[IntakeLog] {
        &self.logs
    }

    /// Whether the reminder with `id` is due on `date`.
    #[must_use]
    pub fn is_scheduled_on(&self, id: Uuid, date: NaiveDate) -> bool {
        self.get(id).is_some_and(|r| r.is_scheduled_on(date))
    }

    fn log_for(&self, id: Uuid, date: NaiveDate, slot: NaiveTime) -> Option<&IntakeLog> {
        self.logs
            .iter()
            .find(|l| l.reminder_id == id && l.date == date && l.slot == slot)
    }

    /// All doses due on `date`, sorted by time then medication.
    #[must_use]
    pub fn occurrences_on(&self, date: NaiveDate, now: NaiveDateTime) -> Vec<Occurrence> {
        let mut occurrences: Vec<Occurrence> = self
            .reminders
            .iter()
            .filter(|r| r.is_scheduled_on(date))
            .flat_map(|r| {
                r.times.iter().map(move |&slot| {
                    let status = self.log_for(r.id, date, slot).map(|l| l.status);
                    Occurrence {
                        reminder_id: r.id,
                        medication: r.medication.clone(),
                        dosage: r.dosage.clone(),
                        slot,
                        status,
                        overdue: status.is_none() && date.and_time(slot) < now,
                    }
                })
            })
            .collect();

        occurrences.sort_by(|a, b| {
            a.slot
                .cmp(&b.slot)
                .then_with(|| a.medication.to_lowercase().cmp(&b.medication.to_lowercase()))
        });
        occurrences
    }

    /// Record a dose as taken or skipped, replacing any earlier record for
    /// the same slot.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown reminder, a slot the reminder does
    /// not have, a date it is not scheduled on, or a future date.
    pub fn record_intake(
        &mut self,
        id: Uuid,
        date: NaiveDate,
        slot: NaiveTime,
        status: IntakeStatus,
        now: Now,
    ) -> Result<(), ReminderError> {
        let reminder = self.get(id).ok_or(ReminderError::NotFound(id))?;
        if !reminder.has_slot(slot) {
            return Err(ReminderError::UnknownSlot(slot));
        }
        if !reminder.is_scheduled_on(date) {
            return Err(ReminderError::NotScheduled(date));
        }
        if date > now.today() {
            return Err(ReminderError::FutureDate);
        }

        self.logs
            .retain(|l| !(l.reminder_id == id && l.date == date && l.slot == slot));
        self.logs.push(IntakeLog {
            reminder_id: id,
            date,
            slot,
            status,
            recorded_at: now.utc,
        });
        self.logs.sort_by_key(|l| (l.date, l.slot));
        self.prune_for(now);
        Ok(())
    }

    /// Forget a recorded dose. Returns whether a record existed.
    pub fn clear_intake(&mut self, id: Uuid, date: NaiveDate, slot: NaiveTime, now: Now) -> bool {
        let before = self.logs.len();
        self.logs
            .retain(|l| !(l.reminder_id == id && l.date == date && l.slot == slot));
        let cleared = self.logs.len() != before;
        self.prune_for(now);
        cleared
    }

    /// Adherence between `from` and `to` inclusive. Doses not yet due at
    /// `now` are not counted.
    #[must_use]
    pub fn adherence(&self, from: NaiveDate, to: NaiveDate, now: NaiveDateTime) -> Adherence {
        let mut result = Adherence::default();

        for date in from.iter_days().take_while(|d| *d <= to) {
            for occurrence in self.occurrences_on(date, now) {
                if date.and_time(occurrence.slot) > now {
                    continue;
                }
                result.scheduled += 1;
                match occurrence.status {
                    Some(IntakeStatus::Taken) => result.taken += 1,
                    Some(IntakeStatus::Skipped) => result.skipped += 1,
                    None => result.missed += 1,
                }
            }
        }

        if result.scheduled > 0 {
            let rate = (f64::from(result.taken) * 100.0 / f64::from(result.scheduled)).round();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let rate = rate as u32;
            result.taken_rate = Some(rate);
        }

        result
    }

    /// Drop logs dated before `before`. Returns how many were dropped.
    pub fn prune_logs(&mut self, before: NaiveDate) -> usize {
        let count = self.logs.len();
        self.logs.retain(|l| l.date >= before);
        count - self.logs.len()
    }

    fn prune_for(&mut self, now: Now) {
        let days = u64::try_from(LOG_RETENTION_DAYS).unwrap_or(0);
        if let Some(cutoff) = now.today().checked_sub_days(Days::new(days)) {
            self.prune_logs(cutoff);
        }
    }

    /// Merge reminders fetched from the sync table.
    ///
    /// Last write wins per id: a remote reminder replaces the local one only
    /// when its `updated_at` is strictly newer, keeping the local
    /// `created_at`. Unknown ids are inserted (subject to the book's
    /// capacity). Logs for slots a newer remote copy no longer has are
    /// dropped.
    pub fn merge_remote(&mut self, records: Vec<Reminder>, now: Now) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for remote in records {
            if let Some(local) = self.reminders.iter_mut().find(|r| r.id == remote.id) {
                if remote.updated_at > local.updated_at {
                    let id = remote.id;
                    let times = remote.times.clone();
                    *local = Reminder {
                        created_at: local.created_at,
                        ..remote
                    };
                    self.logs
                        .retain(|log| log.reminder_id != id || times.contains(&log.slot));
                    outcome.updated += 1;
                }
            } else if self.reminders.len() < MAX_REMINDERS {
                self.reminders.push(remote);
                outcome.inserted += 1;
            } else {
                tracing::warn!(id = %remote.id, "Reminder book full, skipping remote reminder");
            }
        }

        self.prune_for(now);
        outcome
    }

    /// Every reminder, in insertion order.
    #[must_use]
    pub fn reminders(&self) -> &[Reminder] {
        &self.reminders
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(d: NaiveDate, h: u32, m: u32) -> Now {
        Now::fixed(d.and_time(time(h, m)))
    }

    fn draft(medication: &str, times: Vec<NaiveTime>) -> ReminderDraft {
        ReminderDraft {
            medication: medication.to_string(),
            times,
            start_date: Some(date(2025, 3, 1)),
            ..ReminderDraft::default()
        }
    }

    #[test]
    fn test_list_sorted_by_first_slot_then_name() {
        let now = at(date(2025, 3, 1), 7, 0);
        let mut book = ReminderBook::default();
        book.add(draft("Vitamin D", vec![time(9, 0)]), now).unwrap();
        book.add(draft("metformin", vec![time(8, 0), time(20, 0)]), now)
            .unwrap();
        book.add(draft("Aspirin", vec![time(8, 0)]), now).unwrap();

        let names: Vec<&str> = book.list().iter().map(|r| r.medication.as_str()).collect();
        assert_eq!(names, vec!["Aspirin", "metformin", "Vitamin D"]);
    }

    #[test]
    fn test_occurrences_and_overdue() {
        let day = date(2025, 3, 3);
        let mut book = ReminderBook::default();
        let id = book
            .add(draft("Metformin", vec![time(8, 0), time(20, 0)]), at(day, 7, 0))
            .unwrap();
        book.add(draft("Aspirin", vec![time(8, 0)]), at(day, 7, 0))
            .unwrap();
        book.record_intake(id, day, time(8, 0), IntakeStatus::Taken, at(day, 9, 0))
            .unwrap();

        let occurrences = book.occurrences_on(day, day.and_time(time(9, 0)));
        assert_eq!(occurrences.len(), 3);

        assert_eq!(occurrences[0].medication, "Aspirin");
        assert!(occurrences[0].overdue);
        assert_eq!(occurrences[1].medication, "Metformin");
        assert!(occurrences[1].is_taken());
        assert!(!occurrences[1].overdue);
        assert_eq!(occurrences[2].slot_label(), "20:00");
        assert!(!occurrences[2].overdue);
    }

    #[test]
    fn test_record_intake_replaces_previous() {
        let day = date(2025, 3, 3);
        let now = at(day, 21, 0);
        let mut book = ReminderBook::default();
        let id = book.add(draft("Metformin", vec![time(8, 0)]), now).unwrap();

        book.record_intake(id, day, time(8, 0), IntakeStatus::Skipped, now)
            .unwrap();
        book.record_intake(id, day, time(8, 0), IntakeStatus::Taken, now)
            .unwrap();

        assert_eq!(book.logs().len(), 1);
        assert_eq!(book.logs()[0].status, IntakeStatus::Taken);
    }

    #[test]
    fn test_record_intake_rejections() {
        let day = date(2025, 3, 3); // Monday
        let now = at(day, 21, 0);
        let mut book = ReminderBook::default();
        let id = book
            .add(
                ReminderDraft {
                    days: vec![Weekday::Mon],
                    ..draft("Metformin", vec![time(8, 0)])
                },
                now,
            )
            .unwrap();

        let unknown = Uuid::new_v4();
        assert_eq!(
            book.record_intake(unknown, day, time(8, 0), IntakeStatus::Taken, now),
            Err(ReminderError::NotFound(unknown))
        );
        assert_eq!(
            book.record_intake(id, day, time(9, 0), IntakeStatus::Taken, now),
            Err(ReminderError::UnknownSlot(time(9, 0)))
        );
        assert_eq!(
            book.record_intake(id, date(2025, 3, 4), time(8, 0), IntakeStatus::Taken, now),
            Err(ReminderError::NotScheduled(date(2025, 3, 4)))
        );
        assert_eq!(
            book.record_intake(id, date(2025, 3, 10), time(8, 0), IntakeStatus::Taken, now),
            Err(ReminderError::FutureDate)
        );
    }

    #[test]
    fn test_paused_reminder_is_not_scheduled() {
        let day = date(2025, 3, 3);
        let now = at(day, 7, 0);
        let mut book = ReminderBook::default();
        let id = book.add(draft("Metformin", vec![time(8, 0)]), now).unwrap();

        book.set_active(id, false, now).unwrap();
        assert!(!book.is_scheduled_on(id, day));
        assert!(book.occurrences_on(day, now.local).is_empty());

        book.set_active(id, true, now).unwrap();
        assert!(book.is_scheduled_on(id, day));
    }

    #[test]
    fn test_update_drops_logs_for_removed_slots() {
        let day = date(2025, 3, 3);
        let now = at(day, 21, 0);
        let mut book = ReminderBook::default();
        let id = book
            .add(draft("Metformin", vec![time(8, 0), time(20, 0)]), now)
            .unwrap();
        book.record_intake(id, day, time(8, 0), IntakeStatus::Taken, now)
            .unwrap();
        book.record_intake(id, day, time(20, 0), IntakeStatus::Taken, now)
            .unwrap();

        let later = Now::fixed(now.local + Duration::minutes(5));
        book.update(id, draft("Metformin XR", vec![time(20, 0)]), later)
            .unwrap();

        assert_eq!(book.logs().len(), 1);
        assert_eq!(book.logs()[0].slot, time(20, 0));
        let reminder = book.get(id).unwrap();
        assert_eq!(reminder.medication, "Metformin XR");
        assert!(reminder.updated_at > reminder.created_at);
    }

    #[test]
    fn test_remove_cascades_logs() {
        let day = date(2025, 3, 3);
        let now = at(day, 21, 0);
        let mut book = ReminderBook::default();
        let id = book.add(draft("Metformin", vec![time(8, 0)]), now).unwrap();
        book.record_intake(id, day, time(8, 0), IntakeStatus::Taken, now)
            .unwrap();

        book.remove(id, now).unwrap();
        assert!(book.is_empty());
        assert!(book.logs().is_empty());
        assert_eq!(book.remove(id, now), Err(ReminderError::NotFound(id)));
    }

    #[test]
    fn test_clear_intake() {
        let day = date(2025, 3, 3);
        let now = at(day, 21, 0);
        let mut book = ReminderBook::default();
        let id = book.add(draft("Metformin", vec![time(8, 0)]), now).unwrap();
        book.record_intake(id, day, time(8, 0), IntakeStatus::Taken, now)
            .unwrap();

        assert!(book.clear_intake(id, day, time(8, 0), now));
        assert!(!book.clear_intake(id, day, time(8, 0), now));
    }

    #[test]
    fn test_clear_intake_prunes_old_logs() {
        let old_day = date(2025, 1, 1);
        let mut book = ReminderBook::default();
        let id = book
            .add(
                ReminderDraft {
                    start_date: Some(old_day),
                    ..draft("Metformin", vec![time(8, 0)])
                },
                at(old_day, 7, 0),
            )
            .unwrap();
        book.record_intake(id, old_day, time(8, 0), IntakeStatus::Taken, at(old_day, 9, 0))
            .unwrap();

        // Clearing a slot that was never recorded still applies retention.
        assert!(!book.clear_intake(id, date(2025, 6, 1), time(8, 0), at(date(2025, 6, 1), 9, 0)));
        assert!(book.logs().is_empty());
    }

    #[test]
    fn test_adherence_excludes_future_slots() {
        let day1 = date(2025, 3, 3);
        let day2 = date(2025, 3, 4);
        let now = at(day2, 12, 0);
        let mut book = ReminderBook::default();
        let id = book
            .add(draft("Metformin", vec![time(8, 0), time(20, 0)]), now)
            .unwrap();

        book.record_intake(id, day1, time(8, 0), IntakeStatus::Taken, now)
            .unwrap();
        book.record_intake(id, day1, time(20, 0), IntakeStatus::Skipped, now)
            .unwrap();
        book.record_intake(id, day2, time(8, 0), IntakeStatus::Taken, now)
            .unwrap();

        // day2 20:00 is still ahead and must not count as missed.
        let adherence = book.adherence(day1, day2, now.local);
        assert_eq!(adherence.scheduled, 3);
        assert_eq!(adherence.taken, 2);
        assert_eq!(adherence.skipped, 1);
        assert_eq!(adherence.missed, 0);
        assert_eq!(adherence.taken_rate, Some(67));
    }

    #[test]
    fn test_adherence_empty_range() {
        let book = ReminderBook::default();
        let day = date(2025, 3, 3);
        let adherence = book.adherence(day, day, day.and_time(time(23, 0)));
        assert_eq!(adherence, Adherence::default());
    }

    #[test]
    fn test_old_logs_pruned_on_write() {
        let old_day = date(2025, 1, 1);
        let mut book = ReminderBook::default();
        let id = book
            .add(
                ReminderDraft {
                    start_date: Some(old_day),
                    ..draft("Metformin", vec![time(8, 0)])
                },
                at(old_day, 7, 0),
            )
            .unwrap();
        book.record_intake(id, old_day, time(8, 0), IntakeStatus::Taken, at(old_day, 9, 0))
            .unwrap();

        let much_later = at(date(2025, 6, 1), 9, 0);
        book.record_intake(id, date(2025, 6, 1), time(8, 0), IntakeStatus::Taken, much_later)
            .unwrap();

        assert_eq!(book.logs().len(), 1);
        assert_eq!(book.logs()[0].date, date(2025, 6, 1));
    }

    #[test]
    fn test_merge_remote_last_write_wins() {
        let now = at(date(2025, 3, 3), 9, 0);
        let mut book = ReminderBook::default();
        let id = book.add(draft("Metformin", vec![time(8, 0)]), now).unwrap();
        let local = book.get(id).unwrap().clone();

        let stale = Reminder {
            medication: "Stale".to_string(),
            updated_at: local.updated_at - Duration::hours(1),
            ..local.clone()
        };
        let newer = Reminder {
            medication: "Newer".to_string(),
            updated_at: local.updated_at + Duration::hours(1),
            ..local.clone()
        };
        let fresh = Reminder {
            id: Uuid::new_v4(),
            medication: "Fresh".to_string(),
            ..local
        };

        let outcome = book.merge_remote(vec![stale], now);
        assert_eq!(outcome, MergeOutcome::default());
        assert_eq!(book.get(id).unwrap().medication, "Metformin");

        let outcome = book.merge_remote(vec![newer, fresh], now);
        assert_eq!(outcome, MergeOutcome { inserted: 1, updated: 1 });
        assert_eq!(book.get(id).unwrap().medication, "Newer");
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_merge_remote_drops_logs_for_removed_slots() {
        let old_day = date(2024, 11, 4);
        let day = date(2025, 3, 3);
        let now = at(day, 21, 0);
        let mut book = ReminderBook::default();
        let id = book
            .add(
                ReminderDraft {
                    start_date: Some(old_day),
                    ..draft("Metformin", vec![time(8, 0), time(20, 0)])
                },
                at(old_day, 7, 0),
            )
            .unwrap();
        book.record_intake(id, day, time(8, 0), IntakeStatus::Taken, now)
            .unwrap();
        book.record_intake(id, day, time(20, 0), IntakeStatus::Skipped, now)
            .unwrap();
        // Recorded as of its own day, so nothing has aged out yet.
        book.record_intake(id, old_day, time(20, 0), IntakeStatus::Taken, at(old_day, 21, 0))
            .unwrap();
        assert_eq!(book.logs().len(), 3);

        let local = book.get(id).unwrap().clone();
        let remote = Reminder {
            times: vec![time(20, 0)],
            updated_at: now.utc + Duration::minutes(5),
            ..local
        };
        let outcome = book.merge_remote(vec![remote], now);

        assert_eq!(outcome.updated, 1);
        assert_eq!(book.get(id).unwrap().times, vec![time(20, 0)]);
        // The 08:00 log goes with its slot; the November log ages out.
        assert_eq!(book.logs().len(), 1);
        assert_eq!(book.logs()[0].date, day);
        assert_eq!(book.logs()[0].slot, time(20, 0));
    }

    #[test]
    fn test_book_capacity() {
        let now = at(date(2025, 3, 3), 9, 0);
        let mut book = ReminderBook::default();
        for i in 0..MAX_REMINDERS {
            book.add(draft(&format!("Med {i}"), vec![time(8, 0)]), now)
                .unwrap();
        }
        assert_eq!(
            book.add(draft("One more", vec![time(8, 0)]), now),
            Err(ReminderError::TooManyReminders)
        );
    }
}
