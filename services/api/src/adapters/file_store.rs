//! services/api/src/adapters/file_store.rs
//!
//! The mirror store: a second `KeyValueStore` kept as one JSON file per key in
//! its own directory, so it survives a wiped or corrupted database.

use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use study_tracker_core::{KeyValueStore, PortError, PortResult};
use tokio::io::AsyncWriteExt;

/// Replaces `dir/name` so that readers never observe a partial file.
///
/// The contents go to a temp file in the same directory, are fsynced, and the
/// temp file is then renamed over the target.
pub(crate) async fn write_atomically(dir: &Path, name: &str, contents: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let final_path = dir.join(name);
    let temp_path = dir.join(format!("{}.tmp.{}", name, std::process::id()));

    let mut file = tokio::fs::File::create(&temp_path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&temp_path, &final_path).await
}

#[derive(Debug, Clone)]
pub struct FileMirrorStore {
    dir: PathBuf,
}

impl FileMirrorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_name(key: &str) -> PortResult<String> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(PortError::Validation(format!("'{}' is not a valid mirror key", key)));
        }
        Ok(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyValueStore for FileMirrorStore {
    async fn get(&self, key: &str) -> PortResult<Option<Value>> {
        let path = self.dir.join(Self::file_name(key)?);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PortError::Storage(format!("{}: {}", path.display(), e))),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| PortError::Storage(format!("{} is corrupt: {}", path.display(), e)))
    }

    async fn put(&self, key: &str, value: &Value) -> PortResult<()> {
        let name = Self::file_name(key)?;
        let contents = serde_json::to_vec_pretty(value).map_err(|e| PortError::Unexpected(e.to_string()))?;
        write_atomically(&self.dir, &name, &contents)
            .await
            .map_err(|e| PortError::Storage(format!("{}: {}", self.dir.join(&name).display(), e)))
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        let path = self.dir.join(Self::file_name(key)?);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Storage(format!("{}: {}", path.display(), e))),
        }
    }
}
