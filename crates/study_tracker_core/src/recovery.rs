//! crates/study_tracker_core/src/recovery.rs
//!
//! Boot-time recovery. Runs once before anything reads the collections and
//! walks the tiers in strict order, stopping at the first one with data:
//!
//! 1. primary store (nothing to do),
//! 2. mirror store (copied back to primary),
//! 3. external snapshot (copied back to primary and mirror).
//!
//! A failing tier is logged and skipped. A collection the primary holds but
//! cannot read is never treated as empty: it is restored from a lower tier
//! or reported in `RecoveredState::unreadable`.

use crate::domain::{Snapshot, StudySession, TimeLogEntry};
use crate::external::ExternalSnapshotStore;
use crate::persistence::{PersistenceLayer, STUDY_SESSIONS_KEY, TIME_LOGS_KEY};
use crate::ports::{PortError, PortResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info, warn};

/// Which fallback tier supplied the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    Mirror,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "provenance", rename_all = "camelCase")]
pub enum RecoveryOutcome {
    /// The primary store already had data.
    NotNeeded,
    Recovered(Provenance),
    /// Every tier was empty or unreadable.
    NothingFound,
}

/// The outcome plus the collections the tracker should start with.
#[derive(Debug, Clone)]
pub struct RecoveredState {
    pub outcome: RecoveryOutcome,
    pub study_sessions: Vec<StudySession>,
    pub time_logs: Vec<TimeLogEntry>,
    /// Keys whose primary document could not be read and that no other tier
    /// could supply. Their stored documents must not be overwritten.
    pub unreadable: Vec<&'static str>,
}

/// Per-key repairs made while the primary store is otherwise trusted.
#[derive(Default)]
struct Repairs {
    provenance: Option<Provenance>,
    unreadable: Vec<&'static str>,
}

pub struct RecoveryEngine<'a> {
    persistence: &'a PersistenceLayer,
    external: &'a ExternalSnapshotStore,
}

impl<'a> RecoveryEngine<'a> {
    pub fn new(persistence: &'a PersistenceLayer, external: &'a ExternalSnapshotStore) -> Self {
        Self {
            persistence,
            external,
        }
    }

    pub async fn recover(&self) -> RecoveredState {
        let sessions = self.persistence.load::<Vec<StudySession>>(STUDY_SESSIONS_KEY).await;
        let logs = self.persistence.load::<Vec<TimeLogEntry>>(TIME_LOGS_KEY).await;

        if has_items(&sessions) || has_items(&logs) {
            let mut repairs = Repairs::default();
            let study_sessions = self
                .resolve(STUDY_SESSIONS_KEY, sessions, |s: Snapshot| s.study_sessions, &mut repairs)
                .await;
            let time_logs = self
                .resolve(TIME_LOGS_KEY, logs, |s: Snapshot| s.time_logs, &mut repairs)
                .await;
            return RecoveredState {
                outcome: repairs
                    .provenance
                    .map_or(RecoveryOutcome::NotNeeded, RecoveryOutcome::Recovered),
                study_sessions,
                time_logs,
                unreadable: repairs.unreadable,
            };
        }

        let mut primary_errors = Vec::new();
        for (key, error) in [
            (STUDY_SESSIONS_KEY, sessions.err()),
            (TIME_LOGS_KEY, logs.err()),
        ] {
            if let Some(e) = error {
                error!("Primary '{}' unreadable: {}", key, e);
                primary_errors.push(key);
            }
        }

        warn!("Primary store is empty. Attempting data recovery...");

        if let Some(state) = self.from_mirror(&primary_errors).await {
            return state;
        }
        if let Some(state) = self.from_external().await {
            return state;
        }

        info!("No recoverable data found; starting empty.");
        RecoveredState {
            outcome: RecoveryOutcome::NothingFound,
            study_sessions: Vec::new(),
            time_logs: Vec::new(),
            unreadable: primary_errors,
        }
    }

    /// Settles one key of a trusted primary store. A read error is repaired
    /// from the mirror, then from the external snapshot, and otherwise
    /// recorded as unreadable.
    async fn resolve<T>(
        &self,
        key: &'static str,
        loaded: PortResult<Option<Vec<T>>>,
        pick: fn(Snapshot) -> Vec<T>,
        repairs: &mut Repairs,
    ) -> Vec<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let e = match loaded {
            Ok(found) => return found.unwrap_or_default(),
            Err(e) => e,
        };
        error!("Primary '{}' unreadable: {}", key, e);

        match self.persistence.load_mirror::<Vec<T>>(key).await {
            Ok(Some(items)) => {
                if let Err(e) = self.persistence.save_primary(key, &items).await {
                    error!("Restored '{}' from mirror but could not write it back: {}", key, e);
                }
                info!("Restored '{}' from mirror store.", key);
                repairs.provenance.get_or_insert(Provenance::Mirror);
                return items;
            }
            Ok(None) => {}
            Err(e) => warn!("Mirror copy of '{}' is unreadable too: {}", key, e),
        }

        if let Some(snapshot) = self.external.read().await {
            let items = pick(snapshot);
            if !items.is_empty() {
                if let Err(e) = self.persistence.save(key, &items).await {
                    error!("Restored '{}' from backup file but could not write it back: {}", key, e);
                }
                info!("Restored '{}' from external backup file.", key);
                repairs.provenance.get_or_insert(Provenance::External);
                return items;
            }
        }

        error!("No readable copy of '{}' exists; it stays read-only until a backup is imported.", key);
        repairs.unreadable.push(key);
        Vec::new()
    }

    async fn from_mirror(&self, primary_errors: &[&'static str]) -> Option<RecoveredState> {
        let loaded = async {
            let sessions = self
                .persistence
                .load_mirror::<Vec<StudySession>>(STUDY_SESSIONS_KEY)
                .await?;
            let logs = self
                .persistence
                .load_mirror::<Vec<TimeLogEntry>>(TIME_LOGS_KEY)
                .await?;
            Ok::<_, PortError>((sessions, logs))
        }
        .await;

        let (sessions, logs) = match loaded {
            Ok(collections) => collections,
            Err(e) => {
                warn!("Mirror recovery failed: {}", e);
                return None;
            }
        };
        let has_sessions = sessions.as_ref().is_some_and(|v| !v.is_empty());
        let has_logs = logs.as_ref().is_some_and(|v| !v.is_empty());
        if !has_sessions && !has_logs {
            return None;
        }

        // A key the mirror lacks keeps its unreadable primary document.
        let mut unreadable = Vec::new();
        for (key, present) in [
            (STUDY_SESSIONS_KEY, sessions.is_some()),
            (TIME_LOGS_KEY, logs.is_some()),
        ] {
            if !present && primary_errors.contains(&key) {
                unreadable.push(key);
            }
        }
        let study_sessions = sessions.unwrap_or_default();
        let time_logs = logs.unwrap_or_default();

        for (key, result) in [
            (
                STUDY_SESSIONS_KEY,
                self.write_back(STUDY_SESSIONS_KEY, &study_sessions, &unreadable).await,
            ),
            (TIME_LOGS_KEY, self.write_back(TIME_LOGS_KEY, &time_logs, &unreadable).await),
        ] {
            if let Err(e) = result {
                error!("Recovered '{}' from mirror but could not write it back: {}", key, e);
            }
        }

        info!("Data recovered from mirror store.");
        Some(RecoveredState {
            outcome: RecoveryOutcome::Recovered(Provenance::Mirror),
            study_sessions,
            time_logs,
            unreadable,
        })
    }

    async fn write_back<T: Serialize>(&self, key: &'static str, items: &[T], skip: &[&'static str]) -> PortResult<()> {
        if skip.contains(&key) {
            return Ok(());
        }
        self.persistence.save_primary(key, items).await
    }

    async fn from_external(&self) -> Option<RecoveredState> {
        let snapshot = self.external.read().await?;
        if !snapshot.has_records() {
            return None;
        }
        let Snapshot {
            study_sessions,
            time_logs,
            ..
        } = snapshot;

        for (key, result) in [
            (STUDY_SESSIONS_KEY, self.persistence.save(STUDY_SESSIONS_KEY, &study_sessions).await),
            (TIME_LOGS_KEY, self.persistence.save(TIME_LOGS_KEY, &time_logs).await),
        ] {
            if let Err(e) = result {
                error!("Recovered '{}' from backup file but could not write it back: {}", key, e);
            }
        }

        info!("Data recovered from external backup file.");
        Some(RecoveredState {
            outcome: RecoveryOutcome::Recovered(Provenance::External),
            study_sessions,
            time_logs,
            unreadable: Vec::new(),
        })
    }
}

fn has_items<T>(loaded: &PortResult<Option<Vec<T>>>) -> bool {
    matches!(loaded, Ok(Some(items)) if !items.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_snapshot;
    use crate::external::BACKUP_FILE_NAME;
    use crate::memory::{MemoryDirectory, MemoryDirectoryOpener, MemoryStore};
    use crate::side_channel::SideChannel;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct Fixture {
        primary: Arc<MemoryStore>,
        mirror: Arc<MemoryStore>,
        channel: SideChannel,
        persistence: PersistenceLayer,
        external: ExternalSnapshotStore,
        dir: Arc<MemoryDirectory>,
    }

    fn fixture() -> Fixture {
        let primary = Arc::new(MemoryStore::default());
        let mirror = Arc::new(MemoryStore::default());
        let channel = SideChannel::spawn();
        let persistence = PersistenceLayer::new(primary.clone(), mirror.clone(), channel.clone());
        let external = ExternalSnapshotStore::new(mirror.clone(), Arc::new(MemoryDirectoryOpener::default()));
        Fixture {
            primary,
            mirror,
            channel,
            persistence,
            external,
            dir: Arc::new(MemoryDirectory::new("/backup")),
        }
    }

    fn session(id: &str, topic: &str) -> Value {
        json!({
            "id": id,
            "subject": "Chemistry",
            "topic": topic,
            "dateRead": "2024-01-01",
            "createdAt": "2024-01-01T08:00:00Z",
            "revisions": {
                "rev2": { "done": false, "completedAt": null },
                "rev4": { "done": false, "completedAt": null },
                "rev7": { "done": false, "completedAt": null }
            }
        })
    }

    fn external_snapshot(topic: &str) -> Vec<u8> {
        let snapshot = Snapshot {
            study_sessions: vec![serde_json::from_value(session("ext", topic)).unwrap()],
            ..Snapshot::default()
        };
        encode_snapshot(&snapshot).unwrap().into_bytes()
    }

    #[tokio::test]
    async fn populated_primary_skips_recovery() {
        let f = fixture();
        f.primary.insert(STUDY_SESSIONS_KEY, json!([session("p", "Primary")]));
        f.mirror.insert(STUDY_SESSIONS_KEY, json!([session("m", "Mirror")]));

        let state = RecoveryEngine::new(&f.persistence, &f.external).recover().await;

        assert_eq!(state.outcome, RecoveryOutcome::NotNeeded);
        assert_eq!(state.study_sessions[0].topic, "Primary");
    }

    #[tokio::test]
    async fn mirror_wins_over_external() {
        let f = fixture();
        f.mirror.insert(STUDY_SESSIONS_KEY, json!([session("m", "Mirror")]));
        f.dir.put_file(BACKUP_FILE_NAME, &external_snapshot("External"));
        f.external.link(f.dir.clone()).await.unwrap();

        let state = RecoveryEngine::new(&f.persistence, &f.external).recover().await;

        assert_eq!(state.outcome, RecoveryOutcome::Recovered(Provenance::Mirror));
        assert_eq!(state.study_sessions[0].topic, "Mirror");
        assert_eq!(f.primary.value(STUDY_SESSIONS_KEY).unwrap()[0]["topic"], "Mirror");
        assert_eq!(f.primary.value(TIME_LOGS_KEY), Some(json!([])));
    }

    #[tokio::test]
    async fn external_snapshot_is_the_last_resort() {
        let f = fixture();
        f.dir.put_file(BACKUP_FILE_NAME, &external_snapshot("External"));
        f.external.link(f.dir.clone()).await.unwrap();

        let state = RecoveryEngine::new(&f.persistence, &f.external).recover().await;
        f.channel.settle().await;

        assert_eq!(state.outcome, RecoveryOutcome::Recovered(Provenance::External));
        assert_eq!(state.study_sessions[0].topic, "External");
        assert_eq!(f.primary.value(STUDY_SESSIONS_KEY).unwrap()[0]["topic"], "External");
        assert_eq!(f.mirror.value(STUDY_SESSIONS_KEY).unwrap()[0]["topic"], "External");
    }

    #[tokio::test]
    async fn broken_tiers_degrade_to_an_empty_start() {
        let f = fixture();
        f.mirror.insert(TIME_LOGS_KEY, json!({ "not": "a list" }));
        f.dir.put_file(BACKUP_FILE_NAME, b"@@@@");
        f.external.link(f.dir.clone()).await.unwrap();

        let state = RecoveryEngine::new(&f.persistence, &f.external).recover().await;

        assert_eq!(state.outcome, RecoveryOutcome::NothingFound);
        assert!(state.study_sessions.is_empty());
        assert!(state.time_logs.is_empty());
    }

    #[tokio::test]
    async fn unavailable_primary_still_boots_from_mirror() {
        let f = fixture();
        f.mirror.insert(STUDY_SESSIONS_KEY, json!([session("m", "Mirror")]));
        f.primary.set_failing(true);

        let state = RecoveryEngine::new(&f.persistence, &f.external).recover().await;

        assert_eq!(state.outcome, RecoveryOutcome::Recovered(Provenance::Mirror));
        assert_eq!(state.study_sessions.len(), 1);
    }

    fn time_log(id: &str) -> Value {
        json!({
            "id": id,
            "task": "Past papers",
            "subject": "Maths",
            "startTime": "09:00",
            "endTime": "10:00",
            "date": "2024-01-01",
            "duration": 1.0,
            "notes": "",
            "createdAt": "2024-01-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn unreadable_primary_key_is_restored_from_the_mirror() {
        let f = fixture();
        f.primary.insert(STUDY_SESSIONS_KEY, json!({ "broken": true }));
        f.primary.insert(TIME_LOGS_KEY, json!([time_log("p")]));
        f.mirror.insert(STUDY_SESSIONS_KEY, json!([session("m", "Mirror")]));

        let state = RecoveryEngine::new(&f.persistence, &f.external).recover().await;
        f.channel.settle().await;

        assert_eq!(state.outcome, RecoveryOutcome::Recovered(Provenance::Mirror));
        assert_eq!(state.study_sessions[0].topic, "Mirror");
        assert_eq!(state.time_logs.len(), 1);
        assert!(state.unreadable.is_empty());
        assert_eq!(f.primary.value(STUDY_SESSIONS_KEY).unwrap()[0]["topic"], "Mirror");
        assert_eq!(f.mirror.value(STUDY_SESSIONS_KEY).unwrap()[0]["topic"], "Mirror");
    }

    #[tokio::test]
    async fn unreadable_primary_key_falls_back_to_the_external_snapshot() {
        let f = fixture();
        f.primary.insert(STUDY_SESSIONS_KEY, json!("garbage"));
        f.primary.insert(TIME_LOGS_KEY, json!([time_log("p")]));
        f.dir.put_file(BACKUP_FILE_NAME, &external_snapshot("External"));
        f.external.link(f.dir.clone()).await.unwrap();

        let state = RecoveryEngine::new(&f.persistence, &f.external).recover().await;

        assert_eq!(state.outcome, RecoveryOutcome::Recovered(Provenance::External));
        assert_eq!(state.study_sessions[0].topic, "External");
        assert_eq!(state.time_logs[0].id.as_str(), "p");
    }

    #[tokio::test]
    async fn unrecoverable_key_is_reported_and_left_in_place() {
        let f = fixture();
        f.primary.insert(STUDY_SESSIONS_KEY, json!({ "broken": true }));
        f.primary.insert(TIME_LOGS_KEY, json!([time_log("p")]));

        let state = RecoveryEngine::new(&f.persistence, &f.external).recover().await;
        f.channel.settle().await;

        assert_eq!(state.outcome, RecoveryOutcome::NotNeeded);
        assert_eq!(state.unreadable, vec![STUDY_SESSIONS_KEY]);
        assert_eq!(f.primary.value(STUDY_SESSIONS_KEY), Some(json!({ "broken": true })));
        assert_eq!(f.mirror.value(STUDY_SESSIONS_KEY), None);
    }

    #[tokio::test]
    async fn mirror_fallback_keeps_an_unreadable_key_it_cannot_supply() {
        let f = fixture();
        f.primary.insert(STUDY_SESSIONS_KEY, json!({ "broken": true }));
        f.mirror.insert(TIME_LOGS_KEY, json!([time_log("m")]));

        let state = RecoveryEngine::new(&f.persistence, &f.external).recover().await;

        assert_eq!(state.outcome, RecoveryOutcome::Recovered(Provenance::Mirror));
        assert_eq!(state.unreadable, vec![STUDY_SESSIONS_KEY]);
        assert_eq!(f.primary.value(STUDY_SESSIONS_KEY), Some(json!({ "broken": true })));
        assert_eq!(f.primary.value(TIME_LOGS_KEY).unwrap()[0]["id"], "m");
    }
}
