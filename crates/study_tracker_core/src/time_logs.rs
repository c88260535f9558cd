//! crates/study_tracker_core/src/time_logs.rs
//!
//! `TimeLogRepository` owns the time-log collection.
//!
//! An entry never spans midnight. A window whose end is at or before its start
//! is split on creation: the first part keeps the original date and runs to
//! `23:59`, the second lands on the next day from `00:00`. Durations are hours
//! rounded to two decimals; the first part is measured to midnight.

use crate::domain::{parse_clock_time, RecordId, TimeLogEntry};
use crate::edit_window::{EditWindowPolicy, Mutation};
use crate::persistence::{PersistenceLayer, TIME_LOGS_KEY};
use crate::ports::{Clock, PortError, PortResult};
use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::sync::Arc;

pub const CONTINUATION_MARKER: &str = " (continued from previous night)";

//=========================================================================================
// Drafts and Planning
//=========================================================================================

/// The user-entered fields of a time log, before validation.
///
/// `begin_edit` hands one of these back so the entry can be resubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeLogDraft {
    pub task: String,
    #[serde(default)]
    pub subject: String,
    pub start_time: String,
    pub end_time: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

/// One entry the draft will produce, before ids and timestamps are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEntry {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration: f64,
    pub notes: String,
}

/// Splits a start/end window into one or two same-day entries.
pub fn plan_entries(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    notes: &str,
) -> PortResult<Vec<PlannedEntry>> {
    if end > start {
        return Ok(vec![PlannedEntry {
            date,
            start_time: start,
            end_time: end,
            duration: hours_between(start, end),
            notes: notes.to_string(),
        }]);
    }

    let next_day = date
        .checked_add_days(Days::new(1))
        .ok_or_else(|| PortError::Validation(format!("{} has no following day", date)))?;
    let before_midnight = round_hours(f64::from(86_400 - seconds_of_day(start)) / 3600.0);
    let after_midnight = round_hours(f64::from(seconds_of_day(end)) / 3600.0);

    let mut planned = Vec::with_capacity(2);
    if before_midnight > 0.0 {
        planned.push(PlannedEntry {
            date,
            start_time: start,
            end_time: last_minute(),
            duration: before_midnight,
            notes: notes.to_string(),
        });
    }
    if after_midnight > 0.0 {
        planned.push(PlannedEntry {
            date: next_day,
            start_time: NaiveTime::MIN,
            end_time: end,
            duration: after_midnight,
            notes: format!("{}{}", notes, CONTINUATION_MARKER),
        });
    }
    Ok(planned)
}

/// Two-decimal rounding applied to every stored duration.
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

fn hours_between(start: NaiveTime, end: NaiveTime) -> f64 {
    round_hours((end - start).num_seconds() as f64 / 3600.0)
}

fn seconds_of_day(time: NaiveTime) -> u32 {
    use chrono::Timelike;
    time.num_seconds_from_midnight()
}

fn last_minute() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN)
}

//=========================================================================================
// Periods
//=========================================================================================

/// A reporting window ending on (and including) a reference day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Today,
    Week,
    Month,
}

impl Period {
    pub fn days(self) -> u64 {
        match self {
            Period::Today => 1,
            Period::Week => 7,
            Period::Month => 30,
        }
    }

    /// First and last day of the window, inclusive.
    pub fn range(self, reference: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = reference
            .checked_sub_days(Days::new(self.days() - 1))
            .unwrap_or(NaiveDate::MIN);
        (start, reference)
    }
}

//=========================================================================================
// TimeLogRepository
//=========================================================================================

pub struct TimeLogRepository {
    entries: Vec<TimeLogEntry>,
    read_only: bool,
    persistence: Arc<PersistenceLayer>,
    policy: EditWindowPolicy,
    clock: Arc<dyn Clock>,
}

impl TimeLogRepository {
    pub fn new(persistence: Arc<PersistenceLayer>, policy: EditWindowPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Vec::new(),
            read_only: false,
            persistence,
            policy,
            clock,
        }
    }

    /// Installs the collection read at boot without writing it back.
    pub fn load(&mut self, entries: Vec<TimeLogEntry>) {
        self.entries = entries;
    }

    /// Blocks writes until `replace_all`; the stored document was unreadable.
    pub fn mark_unreadable(&mut self) {
        self.read_only = true;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Newest first.
    pub fn all(&self) -> &[TimeLogEntry] {
        &self.entries
    }

    pub fn get(&self, id: &RecordId) -> Option<&TimeLogEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub fn for_date(&self, date: NaiveDate) -> Vec<TimeLogEntry> {
        self.entries.iter().filter(|e| e.date == date).cloned().collect()
    }

    pub fn daily_total(&self, date: NaiveDate) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.date == date)
            .map(|e| e.duration)
            .sum()
    }

    pub fn in_period(&self, reference: NaiveDate, period: Period) -> Vec<TimeLogEntry> {
        let (start, end) = period.range(reference);
        self.entries
            .iter()
            .filter(|e| e.date >= start && e.date <= end)
            .cloned()
            .collect()
    }

    pub fn is_editable(&self, id: &RecordId) -> bool {
        self.get(id)
            .is_some_and(|e| self.policy.permits(e.created_at, self.clock.now()))
    }

    /// Validates a draft and stores the one or two entries it produces.
    ///
    /// Returned entries are in collection order (newest first).
    pub async fn add(&mut self, draft: &TimeLogDraft) -> PortResult<Vec<TimeLogEntry>> {
        let task = draft.task.trim();
        if task.is_empty() {
            return Err(PortError::Validation("task must not be empty".to_string()));
        }
        let start = parse_time_field("startTime", &draft.start_time)?;
        let end = parse_time_field("endTime", &draft.end_time)?;
        let notes = draft.notes.trim();

        let planned = plan_entries(draft.date, start, end, notes)?;
        let created_at = self.clock.now();
        let subject = draft.subject.trim().to_string();

        let mut created = Vec::with_capacity(planned.len());
        let mut next = Vec::with_capacity(self.entries.len() + planned.len());
        for part in planned {
            let entry = TimeLogEntry {
                id: RecordId::generate(),
                task: task.to_string(),
                subject: subject.clone(),
                start_time: part.start_time,
                end_time: part.end_time,
                date: part.date,
                duration: part.duration,
                notes: part.notes,
                created_at: Some(created_at),
                extra: Map::new(),
            };
            created.insert(0, entry);
        }
        next.extend(created.iter().cloned());
        next.extend(self.entries.iter().cloned());

        self.commit(next).await?;
        Ok(created)
    }

    pub async fn delete(&mut self, id: &RecordId) -> PortResult<TimeLogEntry> {
        let index = self.index_of(id)?;
        self.policy.ensure(
            Mutation::Delete,
            self.entries[index].created_at,
            self.clock.now(),
            "log",
        )?;

        let mut next = self.entries.clone();
        let removed = next.remove(index);
        self.commit(next).await?;
        Ok(removed)
    }

    /// Starts an edit: removes the entry and returns its fields for resubmission
    /// through `add`, which re-splits an overnight window from scratch.
    pub async fn begin_edit(&mut self, id: &RecordId) -> PortResult<TimeLogDraft> {
        let index = self.index_of(id)?;
        self.policy.ensure(
            Mutation::Edit,
            self.entries[index].created_at,
            self.clock.now(),
            "log",
        )?;

        let mut next = self.entries.clone();
        let removed = next.remove(index);
        self.commit(next).await?;
        Ok(TimeLogDraft {
            task: removed.task,
            subject: removed.subject,
            start_time: removed.start_time.format("%H:%M").to_string(),
            end_time: removed.end_time.format("%H:%M").to_string(),
            date: removed.date,
            notes: removed.notes,
        })
    }

    /// Replaces the whole collection (backup import) and writes it through.
    pub async fn replace_all(&mut self, entries: Vec<TimeLogEntry>) -> PortResult<()> {
        self.persistence.save(TIME_LOGS_KEY, &entries).await?;
        self.entries = entries;
        self.read_only = false;
        Ok(())
    }

    fn index_of(&self, id: &RecordId) -> PortResult<usize> {
        self.entries
            .iter()
            .position(|e| &e.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Time log {} not found", id)))
    }

    async fn commit(&mut self, next: Vec<TimeLogEntry>) -> PortResult<()> {
        if self.read_only {
            return Err(PortError::Storage(
                "Stored time logs could not be read at startup; import a backup before making changes".to_string(),
            ));
        }
        self.persistence.save(TIME_LOGS_KEY, &next).await?;
        self.entries = next;
        Ok(())
    }
}

fn parse_time_field(field: &str, value: &str) -> PortResult<NaiveTime> {
    parse_clock_time(value)
        .ok_or_else(|| PortError::Validation(format!("{} '{}' is not a valid HH:MM time", field, value)))
}
