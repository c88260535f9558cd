//! crates/study_tracker_core/src/tracker.rs
//!
//! `StudyTracker` is the single entry point UI collaborators talk to. It boots
//! the persistence tiers, owns both repositories, and after every successful
//! mutation queues an external snapshot sync on the side channel.

use crate::codec::{encode_snapshot, ImportPayload};
use crate::domain::{RecordId, Snapshot, StudySession, TimeLogEntry};
use crate::edit_window::EditWindowPolicy;
use crate::external::{BackupStatus, ExternalSnapshotStore};
use crate::persistence::{PersistenceLayer, AI_RATINGS_HISTORY_KEY, STUDY_SESSIONS_KEY, TIME_LOGS_KEY};
use crate::ports::{Clock, PortResult, SnapshotDirectory};
use crate::recovery::{RecoveryEngine, RecoveryOutcome};
use crate::scheduler::{self, DueRevision, ScheduleRow};
use crate::sessions::{SessionRepository, SubjectFilter};
use crate::side_channel::SideChannel;
use crate::time_logs::{Period, TimeLogDraft, TimeLogRepository};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which collections an import replaced, and with how many records.
/// `None` means the collection was absent from the file and left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub study_sessions: Option<usize>,
    pub time_logs: Option<usize>,
    pub ai_ratings_history: Option<usize>,
}

pub struct StudyTracker {
    persistence: Arc<PersistenceLayer>,
    backup: Arc<ExternalSnapshotStore>,
    side_channel: SideChannel,
    clock: Arc<dyn Clock>,
    sessions: SessionRepository,
    time_logs: TimeLogRepository,
    ai_ratings_history: Vec<Value>,
    recovery: RecoveryOutcome,
}

impl StudyTracker {
    /// Restores the backup capability, runs recovery and loads the collections.
    ///
    /// Never fails: every tier degrades to an empty start.
    pub async fn boot(
        persistence: Arc<PersistenceLayer>,
        backup: Arc<ExternalSnapshotStore>,
        side_channel: SideChannel,
        clock: Arc<dyn Clock>,
        policy: EditWindowPolicy,
    ) -> Self {
        backup.restore_capability().await;

        let state = RecoveryEngine::new(&persistence, &backup).recover().await;
        if state.outcome == RecoveryOutcome::NotNeeded {
            // Keep the mirror seeded from a healthy primary.
            for (key, document) in [
                (STUDY_SESSIONS_KEY, serde_json::to_value(&state.study_sessions)),
                (TIME_LOGS_KEY, serde_json::to_value(&state.time_logs)),
            ] {
                if state.unreadable.contains(&key) {
                    continue;
                }
                match document {
                    Ok(value) => persistence.mirror_in_background(key, value),
                    Err(e) => warn!("Could not re-seed mirror for '{}': {}", key, e),
                }
            }
        }

        let ai_ratings_history = persistence
            .load::<Vec<Value>>(AI_RATINGS_HISTORY_KEY)
            .await
            .unwrap_or_else(|e| {
                warn!("AI ratings history unreadable, starting empty: {}", e);
                None
            })
            .unwrap_or_default();

        let mut sessions = SessionRepository::new(persistence.clone(), policy, clock.clone());
        sessions.load(state.study_sessions);
        let mut time_logs = TimeLogRepository::new(persistence.clone(), policy, clock.clone());
        time_logs.load(state.time_logs);
        if state.unreadable.contains(&STUDY_SESSIONS_KEY) {
            sessions.mark_unreadable();
        }
        if state.unreadable.contains(&TIME_LOGS_KEY) {
            time_logs.mark_unreadable();
        }

        info!(
            "Tracker ready: {} sessions, {} time logs ({:?}).",
            sessions.all().len(),
            time_logs.all().len(),
            state.outcome
        );

        Self {
            persistence,
            backup,
            side_channel,
            clock,
            sessions,
            time_logs,
            ai_ratings_history,
            recovery: state.outcome,
        }
    }

    /// What the boot-time recovery pass did, for user notification.
    pub fn recovery_outcome(&self) -> RecoveryOutcome {
        self.recovery
    }

    /// Collections whose stored copy could not be read by any tier. They stay
    /// read-only until a backup import replaces them.
    pub fn unreadable_collections(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.sessions.is_read_only() {
            keys.push(STUDY_SESSIONS_KEY);
        }
        if self.time_logs.is_read_only() {
            keys.push(TIME_LOGS_KEY);
        }
        keys
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    //=====================================================================================
    // Sessions
    //=====================================================================================

    pub fn sessions(&self) -> &[StudySession] {
        self.sessions.all()
    }

    pub fn topics(&self, filter: &SubjectFilter) -> Vec<StudySession> {
        self.sessions.filtered(filter)
    }

    pub fn is_session_deletable(&self, id: &RecordId) -> bool {
        self.sessions.is_deletable(id)
    }

    pub async fn add_session(&mut self, subject: &str, topic: &str, date_read: NaiveDate) -> PortResult<StudySession> {
        let session = self.sessions.add(subject, topic, date_read).await?;
        self.schedule_backup_sync();
        Ok(session)
    }

    pub async fn delete_session(&mut self, id: &RecordId) -> PortResult<StudySession> {
        let removed = self.sessions.delete(id).await?;
        self.schedule_backup_sync();
        Ok(removed)
    }

    pub async fn complete_revision(&mut self, id: &RecordId, revision_type: &str) -> PortResult<bool> {
        let changed = self.sessions.complete_revision(id, revision_type).await?;
        if changed {
            self.schedule_backup_sync();
        }
        Ok(changed)
    }

    pub fn due_today(&self) -> Vec<DueRevision> {
        scheduler::due_today(self.sessions.all(), self.clock.today(), self.clock.offset())
    }

    pub fn schedule(&self, filter: &SubjectFilter) -> Vec<ScheduleRow> {
        let today = self.clock.today();
        let offset = self.clock.offset();
        self.sessions
            .all()
            .iter()
            .filter(|s| filter.matches(&s.subject))
            .map(|s| scheduler::schedule_row(s, today, offset))
            .collect()
    }

    //=====================================================================================
    // Time Logs
    //=====================================================================================

    pub fn time_logs(&self) -> &[TimeLogEntry] {
        self.time_logs.all()
    }

    pub fn logs_for_date(&self, date: NaiveDate) -> Vec<TimeLogEntry> {
        self.time_logs.for_date(date)
    }

    pub fn daily_total(&self, date: NaiveDate) -> f64 {
        self.time_logs.daily_total(date)
    }

    pub fn logs_in_period(&self, reference: NaiveDate, period: Period) -> Vec<TimeLogEntry> {
        self.time_logs.in_period(reference, period)
    }

    pub fn is_time_log_editable(&self, id: &RecordId) -> bool {
        self.time_logs.is_editable(id)
    }

    pub async fn add_time_log(&mut self, draft: &TimeLogDraft) -> PortResult<Vec<TimeLogEntry>> {
        let created = self.time_logs.add(draft).await?;
        self.schedule_backup_sync();
        Ok(created)
    }

    pub async fn delete_time_log(&mut self, id: &RecordId) -> PortResult<TimeLogEntry> {
        let removed = self.time_logs.delete(id).await?;
        self.schedule_backup_sync();
        Ok(removed)
    }

    pub async fn begin_time_log_edit(&mut self, id: &RecordId) -> PortResult<TimeLogDraft> {
        let draft = self.time_logs.begin_edit(id).await?;
        self.schedule_backup_sync();
        Ok(draft)
    }

    //=====================================================================================
    // Backup Management
    //=====================================================================================

    pub fn ai_ratings_history(&self) -> &[Value] {
        &self.ai_ratings_history
    }

    /// The full in-memory state as one snapshot.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            study_sessions: self.sessions.all().to_vec(),
            time_logs: self.time_logs.all().to_vec(),
            ai_ratings_history: self.ai_ratings_history.clone(),
        }
    }

    pub fn export_snapshot(&self) -> PortResult<String> {
        encode_snapshot(&self.snapshot())
    }

    /// Restores from an export or backup file.
    ///
    /// The whole document is decoded before anything is replaced, so malformed
    /// input leaves the state untouched.
    pub async fn import_snapshot(&mut self, contents: &str) -> PortResult<ImportSummary> {
        let payload = ImportPayload::parse(contents)?;
        let (study_sessions, time_logs, ai_ratings_history) = match payload {
            ImportPayload::LegacySessions(sessions) => (Some(sessions), None, None),
            ImportPayload::Partial {
                study_sessions,
                time_logs,
                ai_ratings_history,
            } => (study_sessions, time_logs, ai_ratings_history),
        };

        let summary = ImportSummary {
            study_sessions: study_sessions.as_ref().map(Vec::len),
            time_logs: time_logs.as_ref().map(Vec::len),
            ai_ratings_history: ai_ratings_history.as_ref().map(Vec::len),
        };

        if let Some(sessions) = study_sessions {
            self.sessions.replace_all(sessions).await?;
        }
        if let Some(logs) = time_logs {
            self.time_logs.replace_all(logs).await?;
        }
        if let Some(history) = ai_ratings_history {
            self.persistence.save(AI_RATINGS_HISTORY_KEY, &history).await?;
            self.ai_ratings_history = history;
        }

        info!("Imported backup: {:?}", summary);
        self.schedule_backup_sync();
        Ok(summary)
    }

    /// Turns on auto-backup. An already-linked directory whose permission can
    /// be granted again is reused instead of `directory`.
    pub async fn link_backup_directory(&mut self, directory: Arc<dyn SnapshotDirectory>) -> PortResult<BackupStatus> {
        if self.backup.is_linked().await && self.backup.reconnect().await == BackupStatus::Active {
            debug!("Reusing the linked backup directory.");
        } else {
            self.backup.link(directory).await?;
        }
        self.schedule_backup_sync();
        Ok(BackupStatus::Active)
    }

    /// Re-requests permission on the linked directory and syncs if it was granted.
    pub async fn reconnect_backup(&mut self) -> BackupStatus {
        let status = self.backup.reconnect().await;
        if status == BackupStatus::Active {
            self.schedule_backup_sync();
        }
        status
    }

    pub async fn unlink_backup_directory(&mut self) -> PortResult<()> {
        self.backup.unlink().await?;
        info!("Auto-backup unlinked.");
        Ok(())
    }

    pub async fn backup_status(&self) -> BackupStatus {
        self.backup.status().await
    }

    /// Waits for every queued mirror and snapshot write.
    pub async fn settle(&self) {
        self.side_channel.settle().await;
    }

    fn schedule_backup_sync(&self) {
        // A snapshot would stand in an empty list for the unreadable collection.
        if self.sessions.is_read_only() || self.time_logs.is_read_only() {
            warn!("Skipping auto-backup sync while stored data is unreadable.");
            return;
        }
        let snapshot = self.snapshot();
        let backup = self.backup.clone();
        self.side_channel.submit(async move {
            let outcome = backup.write(&snapshot).await;
            debug!("Auto-backup sync: {:?}", outcome);
        });
    }
}
