//! services/api/src/adapters/backup_dir.rs
//!
//! A `SnapshotDirectory` backed by a plain filesystem directory, plus the opener
//! that turns a stored path back into one.
//!
//! Permission is derived from the directory itself on every call: a missing
//! directory is undecided until a request creates it, a read-only or
//! non-directory path is denied.

use crate::adapters::file_store::write_atomically;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use study_tracker_core::ports::{
    AccessMode, DirectoryOpener, PermissionState, PortError, PortResult, SnapshotDirectory,
};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FsSnapshotDirectory {
    root: PathBuf,
}

impl FsSnapshotDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl SnapshotDirectory for FsSnapshotDirectory {
    fn locator(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }

    async fn query_permission(&self, mode: AccessMode) -> PermissionState {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if !meta.is_dir() => PermissionState::Denied,
            Ok(meta) => match mode {
                AccessMode::Read => PermissionState::Granted,
                AccessMode::ReadWrite if meta.permissions().readonly() => PermissionState::Denied,
                AccessMode::ReadWrite => PermissionState::Granted,
            },
            Err(e) if e.kind() == ErrorKind::NotFound => PermissionState::Prompt,
            Err(e) => {
                debug!("Backup directory {} is not accessible: {}", self.root.display(), e);
                PermissionState::Denied
            }
        }
    }

    async fn request_permission(&self, mode: AccessMode) -> PermissionState {
        let current = self.query_permission(mode).await;
        if current != PermissionState::Prompt || mode == AccessMode::Read {
            return current;
        }

        match tokio::fs::create_dir_all(&self.root).await {
            Ok(()) => self.query_permission(mode).await,
            Err(e) => {
                warn!("Could not create backup directory {}: {}", self.root.display(), e);
                PermissionState::Denied
            }
        }
    }

    async fn read_file(&self, name: &str) -> PortResult<Option<Vec<u8>>> {
        let path = self.root.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortError::Storage(format!("{}: {}", path.display(), e))),
        }
    }

    async fn write_file(&self, name: &str, contents: &[u8]) -> PortResult<()> {
        write_atomically(&self.root, name, contents)
            .await
            .map_err(|e| PortError::Storage(format!("{}: {}", self.root.join(name).display(), e)))
    }
}

/// Re-opens backup directories from their stored path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDirectoryOpener;

impl DirectoryOpener for FsDirectoryOpener {
    fn open(&self, locator: &str) -> Arc<dyn SnapshotDirectory> {
        Arc::new(FsSnapshotDirectory::new(locator))
    }
}
