//! Shared fixture for the service integration tests: a temp directory holding
//! the SQLite primary store, the mirror directory and a backup directory.

#![allow(dead_code)]

use api_lib::bootstrap::{boot_tracker, open_primary};
use api_lib::config::Config;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use study_tracker_core::{FixedClock, StudyTracker};
use tempfile::TempDir;

pub struct TestEnv {
    pub root: TempDir,
    pub clock: Arc<FixedClock>,
    pub with_backup_dir: bool,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            clock: Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 2, 2, 8, 0, 0).unwrap())),
            with_backup_dir: false,
        }
    }

    pub fn with_backup_dir() -> Self {
        Self {
            with_backup_dir: true,
            ..Self::new()
        }
    }

    pub fn mirror_dir(&self) -> PathBuf {
        self.root.path().join("mirror")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.path().join("backup")
    }

    pub fn config(&self) -> Config {
        let mut vars = HashMap::new();
        vars.insert(
            "DATABASE_URL",
            format!("sqlite://{}?mode=rwc", self.root.path().join("primary.db").display()),
        );
        vars.insert("MIRROR_DIR", self.mirror_dir().display().to_string());
        if self.with_backup_dir {
            vars.insert("BACKUP_DIR", self.backup_dir().display().to_string());
        }
        Config::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    pub async fn boot(&self) -> StudyTracker {
        let config = self.config();
        let primary = open_primary(&config).await.unwrap();
        boot_tracker(&config, primary, self.clock.clone()).await
    }

    /// Deletes every document from the primary store.
    pub async fn wipe_primary(&self) {
        let primary = open_primary(&self.config()).await.unwrap();
        sqlx::query("DELETE FROM kv_entries")
            .execute(primary.pool())
            .await
            .unwrap();
    }
}
