//! crates/study_tracker_core/src/sessions.rs
//!
//! `SessionRepository` owns the study session collection. All mutation goes
//! through its commands. Each command builds the next collection, writes it
//! through to the persistence layer, and only then replaces the in-memory copy.

use crate::domain::{RecordId, Revision, RevisionKind, Revisions, StudySession};
use crate::edit_window::{EditWindowPolicy, Mutation};
use crate::persistence::{PersistenceLayer, STUDY_SESSIONS_KEY};
use crate::ports::{Clock, PortError, PortResult};
use chrono::NaiveDate;
use serde_json::Map;
use std::sync::Arc;
use tracing::debug;

/// Which sessions a topic listing should include.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubjectFilter {
    #[default]
    All,
    Subject(String),
}

impl SubjectFilter {
    pub fn matches(&self, subject: &str) -> bool {
        match self {
            SubjectFilter::All => true,
            SubjectFilter::Subject(wanted) => wanted == subject,
        }
    }
}

impl From<Option<String>> for SubjectFilter {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(subject) if !subject.is_empty() && subject != "all" => SubjectFilter::Subject(subject),
            _ => SubjectFilter::All,
        }
    }
}

pub struct SessionRepository {
    sessions: Vec<StudySession>,
    /// Set when the stored collection could not be read at boot.
    read_only: bool,
    persistence: Arc<PersistenceLayer>,
    policy: EditWindowPolicy,
    clock: Arc<dyn Clock>,
}

impl SessionRepository {
    pub fn new(persistence: Arc<PersistenceLayer>, policy: EditWindowPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Vec::new(),
            read_only: false,
            persistence,
            policy,
            clock,
        }
    }

    /// Installs the collection read at boot without writing it back.
    pub fn load(&mut self, sessions: Vec<StudySession>) {
        self.sessions = sessions;
    }

    /// Refuses every write until `replace_all` installs a known-good collection,
    /// so an unreadable stored document is never overwritten by accident.
    pub fn mark_unreadable(&mut self) {
        self.read_only = true;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Newest first.
    pub fn all(&self) -> &[StudySession] {
        &self.sessions
    }

    pub fn get(&self, id: &RecordId) -> Option<&StudySession> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn filtered(&self, filter: &SubjectFilter) -> Vec<StudySession> {
        self.sessions
            .iter()
            .filter(|s| filter.matches(&s.subject))
            .cloned()
            .collect()
    }

    /// Whether the delete affordance should still be offered for `id`.
    pub fn is_deletable(&self, id: &RecordId) -> bool {
        self.get(id)
            .is_some_and(|s| self.policy.permits(s.created_at, self.clock.now()))
    }

    pub async fn add(&mut self, subject: &str, topic: &str, date_read: NaiveDate) -> PortResult<StudySession> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PortError::Validation("topic must not be empty".to_string()));
        }

        let session = StudySession {
            id: RecordId::generate(),
            subject: subject.trim().to_string(),
            topic: topic.to_string(),
            date_read,
            created_at: Some(self.clock.now()),
            revisions: Revisions::default(),
            extra: Map::new(),
        };
        let mut next = Vec::with_capacity(self.sessions.len() + 1);
        next.push(session.clone());
        next.extend(self.sessions.iter().cloned());
        self.commit(next).await?;

        debug!("Added session {} ({})", session.id, session.topic);
        Ok(session)
    }

    /// Removes a session while it is still inside the edit window.
    pub async fn delete(&mut self, id: &RecordId) -> PortResult<StudySession> {
        let index = self.index_of(id)?;
        self.policy.ensure(
            Mutation::Delete,
            self.sessions[index].created_at,
            self.clock.now(),
            "session",
        )?;

        let mut next = self.sessions.clone();
        let removed = next.remove(index);
        self.commit(next).await?;
        Ok(removed)
    }

    /// Marks a milestone done with the current time.
    ///
    /// Returns `false` without writing when the session is unknown, the revision
    /// type is unknown, or the milestone is already done. Prerequisite order is
    /// deliberately not enforced here; the scheduler only recommends.
    pub async fn complete_revision(&mut self, id: &RecordId, revision_type: &str) -> PortResult<bool> {
        let Ok(kind) = revision_type.parse::<RevisionKind>() else {
            debug!("Ignoring completion of unknown revision type '{}'", revision_type);
            return Ok(false);
        };
        let Some(index) = self.sessions.iter().position(|s| &s.id == id) else {
            return Ok(false);
        };
        if self.sessions[index].revisions.get(kind).done {
            return Ok(false);
        }

        let mut next = self.sessions.clone();
        *next[index].revisions.get_mut(kind) = Revision {
            done: true,
            completed_at: Some(self.clock.now()),
        };
        self.commit(next).await?;
        Ok(true)
    }

    /// Replaces the whole collection (backup import) and writes it through.
    pub async fn replace_all(&mut self, sessions: Vec<StudySession>) -> PortResult<()> {
        self.persistence.save(STUDY_SESSIONS_KEY, &sessions).await?;
        self.sessions = sessions;
        self.read_only = false;
        Ok(())
    }

    fn index_of(&self, id: &RecordId) -> PortResult<usize> {
        self.sessions
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", id)))
    }

    async fn commit(&mut self, next: Vec<StudySession>) -> PortResult<()> {
        if self.read_only {
            return Err(PortError::Storage(
                "Stored sessions could not be read at startup; import a backup before making changes".to_string(),
            ));
        }
        self.persistence.save(STUDY_SESSIONS_KEY, &next).await?;
        self.sessions = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::memory::MemoryStore;
    use crate::side_channel::SideChannel;
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        repo: SessionRepository,
        primary: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        let primary = Arc::new(MemoryStore::default());
        let persistence = Arc::new(PersistenceLayer::new(
            primary.clone(),
            Arc::new(MemoryStore::default()),
            SideChannel::spawn(),
        ));
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()));
        Fixture {
            repo: SessionRepository::new(persistence, EditWindowPolicy::default(), clock.clone()),
            primary,
            clock,
        }
    }

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[tokio::test]
    async fn add_places_new_sessions_first_and_persists() {
        let mut f = fixture();
        f.repo.add("Physics", "Optics", jan(1)).await.unwrap();
        let second = f.repo.add("Maths", "  Limits ", jan(1)).await.unwrap();

        assert_eq!(second.topic, "Limits");
        assert_eq!(f.repo.all()[0].id, second.id);
        let stored = f.primary.value(STUDY_SESSIONS_KEY).unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 2);
        assert_eq!(stored[0]["revisions"]["rev2"]["done"], false);
    }

    #[tokio::test]
    async fn empty_topic_is_rejected_without_writing() {
        let mut f = fixture();
        let result = f.repo.add("Physics", "   ", jan(1)).await;

        assert!(matches!(result, Err(PortError::Validation(_))));
        assert!(f.primary.value(STUDY_SESSIONS_KEY).is_none());
    }

    #[tokio::test]
    async fn delete_is_refused_after_the_window() {
        let mut f = fixture();
        let session = f.repo.add("Physics", "Optics", jan(1)).await.unwrap();

        f.clock.advance(Duration::seconds(5 * 60 + 1));
        let result = f.repo.delete(&session.id).await;

        assert!(matches!(result, Err(PortError::EditWindowExpired(_))));
        assert_eq!(f.repo.all().len(), 1);
        assert!(!f.repo.is_deletable(&session.id));
    }

    #[tokio::test]
    async fn delete_inside_the_window_removes_and_persists() {
        let mut f = fixture();
        let session = f.repo.add("Physics", "Optics", jan(1)).await.unwrap();

        f.clock.advance(Duration::minutes(5));
        assert!(f.repo.is_deletable(&session.id));
        f.repo.delete(&session.id).await.unwrap();

        assert!(f.repo.all().is_empty());
        assert_eq!(f.primary.value(STUDY_SESSIONS_KEY), Some(serde_json::json!([])));
    }

    #[tokio::test]
    async fn complete_revision_is_idempotent() {
        let mut f = fixture();
        let session = f.repo.add("Physics", "Optics", jan(1)).await.unwrap();
        f.clock.advance(Duration::days(3));

        assert!(f.repo.complete_revision(&session.id, "rev2").await.unwrap());
        let first = f.repo.get(&session.id).unwrap().revisions.rev2;
        assert_eq!(first.completed_at, Some(f.clock.now()));

        f.clock.advance(Duration::days(1));
        assert!(!f.repo.complete_revision(&session.id, "rev2").await.unwrap());
        assert_eq!(f.repo.get(&session.id).unwrap().revisions.rev2, first);
    }

    #[tokio::test]
    async fn failed_primary_write_leaves_the_collection_unchanged() {
        let mut f = fixture();
        let kept = f.repo.add("Physics", "Optics", jan(1)).await.unwrap();
        f.primary.set_failing(true);

        assert!(f.repo.add("Maths", "Limits", jan(1)).await.is_err());
        assert!(f.repo.complete_revision(&kept.id, "rev2").await.is_err());
        assert!(f.repo.delete(&kept.id).await.is_err());
        assert!(f.repo.replace_all(Vec::new()).await.is_err());

        assert_eq!(f.repo.all().len(), 1);
        assert_eq!(f.repo.all()[0], kept);
        assert!(!f.repo.all()[0].revisions.rev2.done);
    }

    #[tokio::test]
    async fn unreadable_collection_refuses_writes_until_replaced() {
        let mut f = fixture();
        f.primary.insert(STUDY_SESSIONS_KEY, serde_json::json!({ "broken": true }));
        f.repo.mark_unreadable();

        let result = f.repo.add("Physics", "Optics", jan(1)).await;
        assert!(matches!(result, Err(PortError::Storage(_))));
        assert!(f.repo.all().is_empty());
        assert_eq!(f.primary.value(STUDY_SESSIONS_KEY), Some(serde_json::json!({ "broken": true })));

        f.repo.replace_all(Vec::new()).await.unwrap();
        assert!(!f.repo.is_read_only());
        f.repo.add("Physics", "Optics", jan(1)).await.unwrap();
        assert_eq!(f.repo.all().len(), 1);
    }

    #[tokio::test]
    async fn unknown_targets_are_no_ops() {
        let mut f = fixture();
        let session = f.repo.add("Physics", "Optics", jan(1)).await.unwrap();

        assert!(!f.repo.complete_revision(&session.id, "rev5").await.unwrap());
        assert!(!f.repo.complete_revision(&RecordId::from("missing"), "rev2").await.unwrap());
    }

    #[tokio::test]
    async fn later_milestones_may_be_completed_out_of_order() {
        let mut f = fixture();
        let session = f.repo.add("Physics", "Optics", jan(1)).await.unwrap();

        assert!(f.repo.complete_revision(&session.id, "rev7").await.unwrap());
        let revisions = &f.repo.get(&session.id).unwrap().revisions;
        assert!(revisions.rev7.done);
        assert!(!revisions.rev2.done);
    }

    #[tokio::test]
    async fn filter_by_subject() {
        let mut f = fixture();
        f.repo.add("Physics", "Optics", jan(1)).await.unwrap();
        f.repo.add("Maths", "Limits", jan(1)).await.unwrap();

        assert_eq!(f.repo.filtered(&SubjectFilter::All).len(), 2);
        let maths = f.repo.filtered(&SubjectFilter::from(Some("Maths".to_string())));
        assert_eq!(maths.len(), 1);
        assert_eq!(maths[0].topic, "Limits");
    }
}
