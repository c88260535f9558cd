//! crates/study_tracker_core/src/domain.rs
//!
//! Defines the pure, core data structures for the study tracker.
//! The serde shapes mirror the persisted JSON documents (`studySessions`,
//! `timeLogs`, `aiRatingsHistory`) so records survive a save/load cycle verbatim.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Identifiers
//=========================================================================================

/// An opaque record identifier.
///
/// New ids are time-ordered UUIDs; imported records keep whatever string they arrived with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//=========================================================================================
// Revision Milestones
//=========================================================================================

/// One of the three spaced-repetition checkpoints of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionKind {
    Rev2,
    Rev4,
    Rev7,
}

impl RevisionKind {
    /// Milestones in the order a learner passes through them.
    pub const ALL: [RevisionKind; 3] = [RevisionKind::Rev2, RevisionKind::Rev4, RevisionKind::Rev7];

    /// Days that must elapse after the reference date before the milestone is due.
    pub fn offset_days(self) -> i64 {
        match self {
            RevisionKind::Rev2 => 2,
            RevisionKind::Rev4 => 4,
            RevisionKind::Rev7 => 7,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RevisionKind::Rev2 => "2-Day Revision",
            RevisionKind::Rev4 => "4-Day Revision",
            RevisionKind::Rev7 => "7-Day Revision",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RevisionKind::Rev2 => "rev2",
            RevisionKind::Rev4 => "rev4",
            RevisionKind::Rev7 => "rev7",
        }
    }

    /// The milestone that logically precedes this one.
    pub fn previous(self) -> Option<RevisionKind> {
        match self {
            RevisionKind::Rev2 => None,
            RevisionKind::Rev4 => Some(RevisionKind::Rev2),
            RevisionKind::Rev7 => Some(RevisionKind::Rev4),
        }
    }
}

impl FromStr for RevisionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rev2" => Ok(RevisionKind::Rev2),
            "rev4" => Ok(RevisionKind::Rev4),
            "rev7" => Ok(RevisionKind::Rev7),
            other => Err(format!("unknown revision type '{}'", other)),
        }
    }
}

/// The state of a single milestone.
///
/// Older backups stored a bare boolean per milestone; deserialization upgrades
/// that shape to `{done, completedAt: null}` so no caller ever sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredRevision")]
pub struct Revision {
    pub done: bool,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRevision {
    Legacy(bool),
    Tracked {
        #[serde(default)]
        done: bool,
        #[serde(default, rename = "completedAt")]
        completed_at: Option<DateTime<Utc>>,
    },
}

impl From<StoredRevision> for Revision {
    fn from(stored: StoredRevision) -> Self {
        match stored {
            StoredRevision::Legacy(done) => Revision {
                done,
                completed_at: None,
            },
            StoredRevision::Tracked { done, completed_at } => Revision { done, completed_at },
        }
    }
}

/// The fixed `rev2`/`rev4`/`rev7` plan of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revisions {
    #[serde(default)]
    pub rev2: Revision,
    #[serde(default)]
    pub rev4: Revision,
    #[serde(default)]
    pub rev7: Revision,
}

impl Revisions {
    pub fn get(&self, kind: RevisionKind) -> &Revision {
        match kind {
            RevisionKind::Rev2 => &self.rev2,
            RevisionKind::Rev4 => &self.rev4,
            RevisionKind::Rev7 => &self.rev7,
        }
    }

    pub fn get_mut(&mut self, kind: RevisionKind) -> &mut Revision {
        match kind {
            RevisionKind::Rev2 => &mut self.rev2,
            RevisionKind::Rev4 => &mut self.rev4,
            RevisionKind::Rev7 => &mut self.rev7,
        }
    }
}

//=========================================================================================
// Records
//=========================================================================================

/// A tracked study topic with its 2-4-7 revision plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: RecordId,
    #[serde(default)]
    pub subject: String,
    pub topic: String,
    pub date_read: NaiveDate,
    /// Missing on records written before the edit window existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revisions: Revisions,
    /// Fields this version does not know about, kept for pass-through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single time-boxed activity attributed to one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeLogEntry {
    pub id: RecordId,
    pub task: String,
    /// Empty when the entry is untagged.
    #[serde(default)]
    pub subject: String,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub date: NaiveDate,
    /// Decimal hours rounded to two places.
    pub duration: f64,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TimeLogEntry {
    pub fn subject(&self) -> Option<&str> {
        if self.subject.is_empty() {
            None
        } else {
            Some(&self.subject)
        }
    }
}

/// The full persisted state, as exported and auto-backed-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub study_sessions: Vec<StudySession>,
    #[serde(default)]
    pub time_logs: Vec<TimeLogEntry>,
    /// Opaque history owned by the insights collaborator.
    #[serde(default)]
    pub ai_ratings_history: Vec<Value>,
}

impl Snapshot {
    pub fn has_records(&self) -> bool {
        !self.study_sessions.is_empty() || !self.time_logs.is_empty()
    }
}

//=========================================================================================
// Subject Palette
//=========================================================================================

/// Display attributes for a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubjectStyle {
    pub name: &'static str,
    pub color: &'static str,
}

pub const SUBJECT_PALETTE: [SubjectStyle; 6] = [
    SubjectStyle { name: "Physics", color: "#818cf8" },
    SubjectStyle { name: "Chemistry", color: "#f472b6" },
    SubjectStyle { name: "Maths", color: "#fb923c" },
    SubjectStyle { name: "Computer", color: "#34d399" },
    SubjectStyle { name: "English", color: "#38bdf8" },
    SubjectStyle { name: "Nepali", color: "#a78bfa" },
];

pub const DEFAULT_SUBJECT_STYLE: SubjectStyle = SubjectStyle {
    name: "Other",
    color: "#6366f1",
};

/// Looks up a subject's style. Unknown subjects are legal and get the default.
pub fn subject_style(subject: &str) -> SubjectStyle {
    SUBJECT_PALETTE
        .iter()
        .copied()
        .find(|style| style.name == subject)
        .unwrap_or(DEFAULT_SUBJECT_STYLE)
}

//=========================================================================================
// Time-of-day Encoding
//=========================================================================================

/// Parses an `HH:MM` (or `HH:MM:SS`) wall-clock time.
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

mod clock_time {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_clock_time(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid time of day '{}'", raw)))
    }
}
