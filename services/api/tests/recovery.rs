mod common;

use chrono::NaiveDate;
use common::TestEnv;
use study_tracker_core::codec::decode_document;
use study_tracker_core::external::BACKUP_FILE_NAME;
use study_tracker_core::{BackupStatus, Provenance, RecoveryOutcome};
use study_tracker_core::time_logs::TimeLogDraft;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn fresh_install_starts_empty() {
    let env = TestEnv::new();
    let tracker = env.boot().await;

    assert_eq!(tracker.recovery_outcome(), RecoveryOutcome::NothingFound);
    assert!(tracker.sessions().is_empty());
    assert_eq!(tracker.backup_status().await, BackupStatus::Unlinked);
}

#[tokio::test]
async fn data_survives_a_restart() {
    let env = TestEnv::new();
    {
        let mut tracker = env.boot().await;
        tracker.add_session("Physics", "Optics", date(2024, 2, 1)).await.unwrap();
        tracker.settle().await;
    }

    let tracker = env.boot().await;
    assert_eq!(tracker.recovery_outcome(), RecoveryOutcome::NotNeeded);
    assert_eq!(tracker.sessions()[0].topic, "Optics");
}

#[tokio::test]
async fn wiped_primary_is_restored_from_the_mirror() {
    let env = TestEnv::new();
    {
        let mut tracker = env.boot().await;
        tracker.add_session("Chemistry", "Moles", date(2024, 2, 1)).await.unwrap();
        let draft = TimeLogDraft {
            task: "Lab report".to_string(),
            subject: "Chemistry".to_string(),
            start_time: "23:00".to_string(),
            end_time: "01:30".to_string(),
            date: date(2024, 2, 1),
            notes: String::new(),
        };
        tracker.add_time_log(&draft).await.unwrap();
        tracker.settle().await;
    }
    assert!(env.mirror_dir().join("studySessions.json").is_file());

    env.wipe_primary().await;
    let tracker = env.boot().await;

    assert_eq!(tracker.recovery_outcome(), RecoveryOutcome::Recovered(Provenance::Mirror));
    assert_eq!(tracker.sessions()[0].topic, "Moles");
    assert_eq!(tracker.time_logs().len(), 2);
    drop(tracker);

    // Written back, so the next boot trusts the primary again.
    let tracker = env.boot().await;
    assert_eq!(tracker.recovery_outcome(), RecoveryOutcome::NotNeeded);
}

#[tokio::test]
async fn corrupt_primary_document_falls_back_to_the_mirror() {
    let env = TestEnv::new();
    {
        let mut tracker = env.boot().await;
        tracker.add_session("Maths", "Series", date(2024, 2, 1)).await.unwrap();
        tracker.settle().await;
    }

    let primary = api_lib::bootstrap::open_primary(&env.config()).await.unwrap();
    sqlx::query("UPDATE kv_entries SET value = '{broken'")
        .execute(primary.pool())
        .await
        .unwrap();

    let tracker = env.boot().await;
    assert_eq!(tracker.recovery_outcome(), RecoveryOutcome::Recovered(Provenance::Mirror));
    assert_eq!(tracker.sessions()[0].topic, "Series");
}

#[tokio::test]
async fn backup_directory_is_the_last_resort() {
    let env = TestEnv::with_backup_dir();
    {
        let mut tracker = env.boot().await;
        assert_eq!(tracker.backup_status().await, BackupStatus::Active);
        tracker.add_session("English", "Sonnets", date(2024, 2, 1)).await.unwrap();
        tracker.settle().await;
    }

    let raw = std::fs::read_to_string(env.backup_dir().join(BACKUP_FILE_NAME)).unwrap();
    assert!(!raw.trim_start().starts_with('{'));
    assert_eq!(decode_document(&raw).unwrap()["studySessions"][0]["topic"], "Sonnets");

    env.wipe_primary().await;
    std::fs::remove_dir_all(env.mirror_dir()).unwrap();

    let tracker = env.boot().await;
    tracker.settle().await;

    assert_eq!(tracker.recovery_outcome(), RecoveryOutcome::Recovered(Provenance::External));
    assert_eq!(tracker.sessions()[0].topic, "Sonnets");
    assert!(env.mirror_dir().join("studySessions.json").is_file());
}

#[tokio::test]
async fn one_unreadable_collection_is_restored_without_touching_the_other() {
    let env = TestEnv::new();
    {
        let mut tracker = env.boot().await;
        tracker.add_session("Physics", "Waves", date(2024, 2, 1)).await.unwrap();
        let draft = TimeLogDraft {
            task: "Problem set".to_string(),
            subject: "Physics".to_string(),
            start_time: "07:00".to_string(),
            end_time: "07:30".to_string(),
            date: date(2024, 2, 2),
            notes: String::new(),
        };
        tracker.add_time_log(&draft).await.unwrap();
        tracker.settle().await;
    }

    let primary = api_lib::bootstrap::open_primary(&env.config()).await.unwrap();
    sqlx::query("UPDATE kv_entries SET value = '{broken' WHERE key = 'studySessions'")
        .execute(primary.pool())
        .await
        .unwrap();

    let tracker = env.boot().await;
    tracker.settle().await;

    assert_eq!(tracker.recovery_outcome(), RecoveryOutcome::Recovered(Provenance::Mirror));
    assert_eq!(tracker.sessions()[0].topic, "Waves");
    assert_eq!(tracker.time_logs().len(), 1);
    let mirrored = std::fs::read_to_string(env.mirror_dir().join("studySessions.json")).unwrap();
    assert!(mirrored.contains("Waves"));
}
