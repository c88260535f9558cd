//! crates/study_tracker_core/src/scheduler.rs
//!
//! The 2-4-7 revision engine. Pure functions over the session collection:
//! nothing here stores or mutates state.
//!
//! Each milestone is counted from a reference date. `rev2` counts from the day
//! the topic was read; later milestones count from the day the previous one was
//! actually completed, so a late review pushes the rest of the plan back with it.
//! Records from before completion timestamps existed fall back to fixed offsets
//! from `dateRead`.

use crate::domain::{RevisionKind, Revisions, StudySession};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

/// A session whose next milestone is due.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueRevision {
    #[serde(flatten)]
    pub session: StudySession,
    pub revision_type: RevisionKind,
    pub revision_label: &'static str,
    pub days_overdue: i64,
}

/// Returns every session with a due milestone, in input order.
///
/// A session contributes at most one item: its earliest pending milestone.
/// Later milestones stay hidden until the earlier one is completed.
pub fn due_today(sessions: &[StudySession], today: NaiveDate, offset: FixedOffset) -> Vec<DueRevision> {
    sessions
        .iter()
        .filter_map(|session| {
            let kind = next_pending(&session.revisions)?;
            let reference = reference_date(session, kind, offset);
            let days_diff = days_between(reference, today);
            let due_after = kind.offset_days();
            (days_diff >= due_after).then(|| DueRevision {
                session: session.clone(),
                revision_type: kind,
                revision_label: kind.label(),
                days_overdue: days_diff - due_after,
            })
        })
        .collect()
}

/// The earliest milestone not yet done, in fixed `rev2 -> rev4 -> rev7` order.
pub fn next_pending(revisions: &Revisions) -> Option<RevisionKind> {
    RevisionKind::ALL
        .into_iter()
        .find(|kind| !revisions.get(*kind).done)
}

/// The day a milestone's offset is counted from.
pub fn reference_date(session: &StudySession, kind: RevisionKind, offset: FixedOffset) -> NaiveDate {
    let revisions = &session.revisions;
    match kind {
        RevisionKind::Rev2 => session.date_read,
        RevisionKind::Rev4 => completion_day(revisions.rev2.completed_at, offset)
            .unwrap_or_else(|| add_days(session.date_read, 2)),
        RevisionKind::Rev7 => completion_day(revisions.rev4.completed_at, offset)
            .unwrap_or_else(|| add_days(session.date_read, 6)),
    }
}

/// Whole days between two calendar dates, regardless of which comes first.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days().abs()
}

//=========================================================================================
// Schedule Table
//=========================================================================================

/// Where a single milestone stands, for the per-subject schedule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum MilestoneStatus {
    #[serde(rename_all = "camelCase")]
    Done { completed_at: Option<DateTime<Utc>> },
    /// `actively_overdue` is only set once the predecessor is done; an overdue
    /// milestone behind an unfinished one is not actionable yet.
    #[serde(rename_all = "camelCase")]
    Pending { due_date: NaiveDate, actively_overdue: bool },
}

/// One row of the schedule table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    pub session: StudySession,
    pub rev2: MilestoneStatus,
    pub rev4: MilestoneStatus,
    pub rev7: MilestoneStatus,
}

pub fn schedule_row(session: &StudySession, today: NaiveDate, offset: FixedOffset) -> ScheduleRow {
    ScheduleRow {
        session: session.clone(),
        rev2: milestone_status(session, RevisionKind::Rev2, today, offset),
        rev4: milestone_status(session, RevisionKind::Rev4, today, offset),
        rev7: milestone_status(session, RevisionKind::Rev7, today, offset),
    }
}

/// Reports a milestone as done, or predicts its due date.
pub fn milestone_status(
    session: &StudySession,
    kind: RevisionKind,
    today: NaiveDate,
    offset: FixedOffset,
) -> MilestoneStatus {
    let revisions = &session.revisions;
    let revision = revisions.get(kind);
    if revision.done {
        return MilestoneStatus::Done {
            completed_at: revision.completed_at,
        };
    }

    let due_date = predicted_due_date(session, kind, offset);
    let prerequisite_met = kind
        .previous()
        .map_or(true, |previous| revisions.get(previous).done);

    MilestoneStatus::Pending {
        due_date,
        actively_overdue: today > due_date && prerequisite_met,
    }
}

fn predicted_due_date(session: &StudySession, kind: RevisionKind, offset: FixedOffset) -> NaiveDate {
    let revisions = &session.revisions;
    let finished = |rev: RevisionKind| {
        let revision = revisions.get(rev);
        if revision.done {
            completion_day(revision.completed_at, offset)
        } else {
            None
        }
    };

    match kind {
        RevisionKind::Rev2 => add_days(session.date_read, 2),
        RevisionKind::Rev4 => {
            let reference = finished(RevisionKind::Rev2).unwrap_or_else(|| add_days(session.date_read, 2));
            add_days(reference, 4)
        }
        RevisionKind::Rev7 => {
            if let Some(rev4_day) = finished(RevisionKind::Rev4) {
                add_days(rev4_day, 7)
            } else if let Some(rev2_day) = finished(RevisionKind::Rev2) {
                add_days(rev2_day, 4 + 7)
            } else {
                add_days(session.date_read, 6 + 7)
            }
        }
    }
}

fn completion_day(completed_at: Option<DateTime<Utc>>, offset: FixedOffset) -> Option<NaiveDate> {
    completed_at.map(|ts| ts.with_timezone(&offset).date_naive())
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecordId, Revision};
    use chrono::{Offset, TimeZone};
    use serde_json::Map;

    fn utc() -> FixedOffset {
        Utc.fix()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session(id: &str, date_read: NaiveDate) -> StudySession {
        StudySession {
            id: RecordId::from(id),
            subject: "Physics".to_string(),
            topic: format!("topic {}", id),
            date_read,
            created_at: None,
            revisions: Revisions::default(),
            extra: Map::new(),
        }
    }

    fn done_at(y: i32, m: u32, d: u32) -> Revision {
        Revision {
            done: true,
            completed_at: Some(Utc.with_ymd_and_hms(y, m, d, 18, 0, 0).unwrap()),
        }
    }

    #[test]
    fn rev2_becomes_due_two_days_after_reading() {
        let sessions = vec![session("a", date(2024, 1, 1))];

        assert!(due_today(&sessions, date(2024, 1, 2), utc()).is_empty());

        let due = due_today(&sessions, date(2024, 1, 3), utc());
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].revision_type, RevisionKind::Rev2);
        assert_eq!(due[0].revision_label, "2-Day Revision");
        assert_eq!(due[0].days_overdue, 0);

        let late = due_today(&sessions, date(2024, 1, 5), utc());
        assert_eq!(late[0].days_overdue, 2);
    }

    #[test]
    fn rev4_counts_from_actual_rev2_completion() {
        let mut s = session("a", date(2024, 1, 1));
        s.revisions.rev2 = done_at(2024, 1, 4);
        let sessions = vec![s];

        assert!(due_today(&sessions, date(2024, 1, 7), utc()).is_empty());

        let due = due_today(&sessions, date(2024, 1, 8), utc());
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].revision_type, RevisionKind::Rev4);
        assert_eq!(due[0].days_overdue, 0);
    }

    #[test]
    fn legacy_completion_without_timestamp_uses_fallback_offsets() {
        let mut s = session("a", date(2024, 1, 1));
        s.revisions.rev2 = Revision { done: true, completed_at: None };
        let sessions = vec![s.clone()];

        // rev4 reference = dateRead + 2 = Jan 3, due on Jan 7.
        assert!(due_today(&sessions, date(2024, 1, 6), utc()).is_empty());
        assert_eq!(due_today(&sessions, date(2024, 1, 7), utc())[0].revision_type, RevisionKind::Rev4);

        s.revisions.rev4 = Revision { done: true, completed_at: None };
        let sessions = vec![s];
        // rev7 reference = dateRead + 6 = Jan 7, due on Jan 14.
        assert!(due_today(&sessions, date(2024, 1, 13), utc()).is_empty());
        let due = due_today(&sessions, date(2024, 1, 16), utc());
        assert_eq!(due[0].revision_type, RevisionKind::Rev7);
        assert_eq!(due[0].days_overdue, 2);
    }

    #[test]
    fn only_the_earliest_pending_milestone_is_reported() {
        let mut s = session("a", date(2024, 1, 1));
        s.revisions.rev4 = done_at(2024, 1, 2);
        let due = due_today(&[s], date(2024, 3, 1), utc());

        assert_eq!(due.len(), 1);
        assert_eq!(due[0].revision_type, RevisionKind::Rev2);
    }

    #[test]
    fn fully_revised_sessions_are_excluded_and_order_is_stable() {
        let mut finished = session("done", date(2024, 1, 1));
        finished.revisions.rev2 = done_at(2024, 1, 3);
        finished.revisions.rev4 = done_at(2024, 1, 7);
        finished.revisions.rev7 = done_at(2024, 1, 14);

        let sessions = vec![
            session("first", date(2024, 1, 1)),
            finished,
            session("second", date(2023, 12, 1)),
        ];
        let ids: Vec<_> = due_today(&sessions, date(2024, 2, 1), utc())
            .into_iter()
            .map(|d| d.session.id.to_string())
            .collect();

        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn completion_day_follows_the_local_calendar() {
        let mut s = session("a", date(2024, 1, 1));
        // 20:00 UTC on Jan 4 is already Jan 5 in UTC+05:45.
        s.revisions.rev2 = Revision {
            done: true,
            completed_at: Some(Utc.with_ymd_and_hms(2024, 1, 4, 20, 0, 0).unwrap()),
        };
        let nepal = FixedOffset::east_opt(5 * 3600 + 45 * 60).unwrap();

        assert_eq!(reference_date(&s, RevisionKind::Rev4, utc()), date(2024, 1, 4));
        assert_eq!(reference_date(&s, RevisionKind::Rev4, nepal), date(2024, 1, 5));
    }

    #[test]
    fn days_between_is_symmetric() {
        assert_eq!(days_between(date(2024, 1, 1), date(2024, 1, 3)), 2);
        assert_eq!(days_between(date(2024, 1, 3), date(2024, 1, 1)), 2);
        assert_eq!(days_between(date(2024, 2, 28), date(2024, 3, 1)), 2);
    }

    #[test]
    fn schedule_marks_rev4_overdue_only_after_rev2() {
        let s = session("a", date(2024, 1, 1));
        let row = schedule_row(&s, date(2024, 2, 1), utc());

        assert_eq!(
            row.rev2,
            MilestoneStatus::Pending { due_date: date(2024, 1, 3), actively_overdue: true }
        );
        assert_eq!(
            row.rev4,
            MilestoneStatus::Pending { due_date: date(2024, 1, 7), actively_overdue: false }
        );
        assert_eq!(
            row.rev7,
            MilestoneStatus::Pending { due_date: date(2024, 1, 14), actively_overdue: false }
        );
    }

    #[test]
    fn schedule_chains_due_dates_off_completions() {
        let mut s = session("a", date(2024, 1, 1));
        s.revisions.rev2 = done_at(2024, 1, 5);
        let row = schedule_row(&s, date(2024, 1, 6), utc());

        assert!(matches!(row.rev2, MilestoneStatus::Done { completed_at: Some(_) }));
        assert_eq!(
            row.rev4,
            MilestoneStatus::Pending { due_date: date(2024, 1, 9), actively_overdue: false }
        );
        assert_eq!(
            row.rev7,
            MilestoneStatus::Pending { due_date: date(2024, 1, 16), actively_overdue: false }
        );
    }
}
