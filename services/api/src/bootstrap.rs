//! services/api/src/bootstrap.rs
//!
//! Wires the concrete adapters into a booted `StudyTracker`: SQLite primary
//! store, file mirror store, filesystem backup directory, system clock.

use crate::adapters::{DbAdapter, FileMirrorStore, FsDirectoryOpener, FsSnapshotDirectory};
use crate::config::Config;
use crate::error::ApiError;
use chrono::Duration;
use std::sync::Arc;
use study_tracker_core::{
    Clock, EditWindowPolicy, ExternalSnapshotStore, PersistenceLayer, SideChannel, StudyTracker, SystemClock,
};
use tracing::{info, warn};

/// Connects the primary store and runs its migrations.
pub async fn open_primary(config: &Config) -> Result<DbAdapter, ApiError> {
    info!("Connecting to database...");
    let db = DbAdapter::connect(&config.database_url).await?;
    info!("Running database migrations...");
    db.run_migrations().await?;
    info!("Database migrations complete.");
    Ok(db)
}

/// Boots the tracker on top of an already-migrated primary store.
pub async fn boot_tracker(
    config: &Config,
    primary: DbAdapter,
    clock: Arc<dyn Clock>,
) -> StudyTracker {
    let mirror = Arc::new(FileMirrorStore::new(config.mirror_dir.clone()));
    let side_channel = SideChannel::spawn();
    let persistence = Arc::new(PersistenceLayer::new(
        Arc::new(primary),
        mirror.clone(),
        side_channel.clone(),
    ));
    // The backup directory reference lives in the mirror store.
    let backup = Arc::new(ExternalSnapshotStore::new(mirror, Arc::new(FsDirectoryOpener)));
    let policy = EditWindowPolicy::new(Duration::minutes(config.edit_window_minutes));

    // A configured directory is linked before recovery so it can serve as the
    // last tier even when the mirror (which remembers the link) is gone.
    if let Some(dir) = &config.backup_dir {
        backup.restore_capability().await;
        if !backup.is_linked().await {
            match backup.link(Arc::new(FsSnapshotDirectory::new(dir.clone()))).await {
                Ok(()) => info!("Auto-backup linked to {} from configuration.", dir.display()),
                Err(e) => warn!("Could not link BACKUP_DIR {}: {}", dir.display(), e),
            }
        }
    }

    StudyTracker::boot(persistence, backup, side_channel, clock, policy).await
}

/// `open_primary` followed by `boot_tracker` with the system clock.
pub async fn boot_from_config(config: &Config) -> Result<StudyTracker, ApiError> {
    let primary = open_primary(config).await?;
    Ok(boot_tracker(config, primary, Arc::new(SystemClock)).await)
}
