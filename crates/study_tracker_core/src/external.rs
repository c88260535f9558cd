//! crates/study_tracker_core/src/external.rs
//!
//! The external snapshot store: a full-state backup file kept in a directory the
//! user picked outside the app's own storage.
//!
//! The directory capability is held separately from its permission. Once linked,
//! the reference is only dropped by an explicit `unlink`; a denied permission or a
//! failed write leaves it in place so the next use can ask again.

use crate::codec::{encode_snapshot, ImportPayload};
use crate::domain::Snapshot;
use crate::persistence::BACKUP_HANDLE_KEY;
use crate::ports::{
    AccessMode, DirectoryOpener, KeyValueStore, PermissionState, PortError, PortResult,
    SnapshotDirectory,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// The well-known backup file name inside the linked directory.
pub const BACKUP_FILE_NAME: &str = "StudyTracker_AutoBackup.backup";

/// How the integration looks to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackupStatus {
    Unlinked,
    Active,
    /// A directory is linked but permission is not currently granted.
    NeedsReconnect,
}

/// What a background sync did. Purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Written,
    NotLinked,
    PermissionMissing,
    Failed,
}

pub struct ExternalSnapshotStore {
    capability: RwLock<Option<Arc<dyn SnapshotDirectory>>>,
    handles: Arc<dyn KeyValueStore>,
    opener: Arc<dyn DirectoryOpener>,
}

impl ExternalSnapshotStore {
    /// `handles` is where the directory reference is remembered across runs.
    pub fn new(handles: Arc<dyn KeyValueStore>, opener: Arc<dyn DirectoryOpener>) -> Self {
        Self {
            capability: RwLock::new(None),
            handles,
            opener,
        }
    }

    /// Re-acquires the directory reference saved by a previous run, if any.
    ///
    /// The reference is kept even when permission is not granted right now.
    pub async fn restore_capability(&self) {
        let locator = match self.handles.get(BACKUP_HANDLE_KEY).await {
            Ok(Some(Value::String(locator))) => locator,
            Ok(Some(other)) => {
                warn!("Ignoring unreadable backup directory reference: {}", other);
                return;
            }
            Ok(None) => return,
            Err(e) => {
                warn!("Could not restore backup directory reference: {}", e);
                return;
            }
        };

        let directory = self.opener.open(&locator);
        if verify_permission(directory.as_ref(), AccessMode::ReadWrite).await {
            info!("Backup directory '{}' restored.", locator);
        } else {
            info!("Backup directory '{}' restored; permission must be granted again.", locator);
        }
        *self.capability.write().await = Some(directory);
    }

    /// Links a newly chosen directory and remembers it for future runs.
    pub async fn link(&self, directory: Arc<dyn SnapshotDirectory>) -> PortResult<()> {
        if !verify_permission(directory.as_ref(), AccessMode::ReadWrite).await {
            return Err(PortError::PermissionDenied(
                "Failed to set up auto-backup. Ensure you grant permission.".to_string(),
            ));
        }

        let locator = directory.locator();
        self.handles
            .put(BACKUP_HANDLE_KEY, &Value::String(locator.clone()))
            .await?;
        *self.capability.write().await = Some(directory);
        info!("Auto-backup linked to '{}'.", locator);
        Ok(())
    }

    /// Asks again for permission on the already-linked directory instead of picking a new one.
    pub async fn reconnect(&self) -> BackupStatus {
        match self.current().await {
            None => BackupStatus::Unlinked,
            Some(directory) => {
                if verify_permission(directory.as_ref(), AccessMode::ReadWrite).await {
                    BackupStatus::Active
                } else {
                    BackupStatus::NeedsReconnect
                }
            }
        }
    }

    /// Forgets the linked directory. The only way the reference is ever cleared.
    pub async fn unlink(&self) -> PortResult<()> {
        *self.capability.write().await = None;
        self.handles.remove(BACKUP_HANDLE_KEY).await
    }

    pub async fn status(&self) -> BackupStatus {
        match self.current().await {
            None => BackupStatus::Unlinked,
            Some(directory) => match directory.query_permission(AccessMode::ReadWrite).await {
                PermissionState::Granted => BackupStatus::Active,
                _ => BackupStatus::NeedsReconnect,
            },
        }
    }

    pub async fn is_linked(&self) -> bool {
        self.current().await.is_some()
    }

    /// Writes the snapshot to the backup file. Failures are logged, never returned.
    pub async fn write(&self, snapshot: &Snapshot) -> SyncOutcome {
        let Some(directory) = self.current().await else {
            debug!("Auto-backup not linked; skipping.");
            return SyncOutcome::NotLinked;
        };

        if !verify_permission(directory.as_ref(), AccessMode::ReadWrite).await {
            warn!("Auto-backup skipped: permission not granted (will retry on next change).");
            return SyncOutcome::PermissionMissing;
        }

        let result = async {
            let encoded = encode_snapshot(snapshot)?;
            directory.write_file(BACKUP_FILE_NAME, encoded.as_bytes()).await
        }
        .await;

        match result {
            Ok(()) => SyncOutcome::Written,
            Err(e) => {
                error!("Auto-backup save failed: {}", e);
                SyncOutcome::Failed
            }
        }
    }

    /// Reads and decodes the backup file, if there is a readable one.
    pub async fn read(&self) -> Option<Snapshot> {
        let directory = self.current().await?;

        if !verify_permission(directory.as_ref(), AccessMode::Read).await {
            warn!("Backup directory is not readable right now.");
            return None;
        }

        let bytes = match directory.read_file(BACKUP_FILE_NAME).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Could not read backup file: {}", e);
                return None;
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        match ImportPayload::parse(&text) {
            Ok(payload) => Some(payload.into_snapshot()),
            Err(e) => {
                warn!("Backup file could not be decoded: {}", e);
                None
            }
        }
    }

    async fn current(&self) -> Option<Arc<dyn SnapshotDirectory>> {
        self.capability.read().await.clone()
    }
}

/// Checks permission, silently requesting it when it is not granted yet.
async fn verify_permission(directory: &dyn SnapshotDirectory, mode: AccessMode) -> bool {
    if directory.query_permission(mode).await == PermissionState::Granted {
        return true;
    }
    directory.request_permission(mode).await == PermissionState::Granted
}
