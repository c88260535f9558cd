//! crates/study_tracker_core/src/persistence.rs
//!
//! The write-through persistence layer. Every save lands in the primary store
//! before returning; the mirror copy is queued on the side channel and may
//! finish later. Mirror failures are logged and never reach the caller.

use crate::ports::{KeyValueStore, PortError, PortResult};
use crate::side_channel::SideChannel;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

//=========================================================================================
// Persisted Keys
//=========================================================================================

pub const STUDY_SESSIONS_KEY: &str = "studySessions";
pub const TIME_LOGS_KEY: &str = "timeLogs";
pub const AI_RATINGS_HISTORY_KEY: &str = "aiRatingsHistory";
/// Where the external backup directory reference lives (in the mirror store).
pub const BACKUP_HANDLE_KEY: &str = "autoBackupFolderHandle";

//=========================================================================================
// PersistenceLayer
//=========================================================================================

pub struct PersistenceLayer {
    primary: Arc<dyn KeyValueStore>,
    mirror: Arc<dyn KeyValueStore>,
    side_channel: SideChannel,
}

impl PersistenceLayer {
    pub fn new(
        primary: Arc<dyn KeyValueStore>,
        mirror: Arc<dyn KeyValueStore>,
        side_channel: SideChannel,
    ) -> Self {
        Self {
            primary,
            mirror,
            side_channel,
        }
    }

    /// Writes `data` to the primary store, then queues the mirror copy.
    ///
    /// Only a primary failure is reported.
    pub async fn save<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> PortResult<()> {
        let value = to_document(data)?;
        self.primary.put(key, &value).await?;
        self.mirror_in_background(key, value);
        Ok(())
    }

    /// Writes only to the primary store.
    pub async fn save_primary<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> PortResult<()> {
        let value = to_document(data)?;
        self.primary.put(key, &value).await
    }

    /// Queues a best-effort mirror write of an already-encoded document.
    pub fn mirror_in_background(&self, key: &str, value: Value) {
        let mirror = self.mirror.clone();
        let key = key.to_string();
        self.side_channel.submit(async move {
            if let Err(e) = mirror.put(&key, &value).await {
                warn!("Mirror save failed for '{}': {}", key, e);
            }
        });
    }

    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> PortResult<Option<T>> {
        load_from(self.primary.as_ref(), key).await
    }

    pub async fn load_mirror<T: DeserializeOwned>(&self, key: &str) -> PortResult<Option<T>> {
        load_from(self.mirror.as_ref(), key).await
    }
}

fn to_document<T: Serialize + ?Sized>(data: &T) -> PortResult<Value> {
    serde_json::to_value(data).map_err(|e| PortError::Unexpected(e.to_string()))
}

async fn load_from<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> PortResult<Option<T>> {
    match store.get(key).await? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| PortError::Storage(format!("'{}' is not readable: {}", key, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn save_writes_primary_then_mirror() {
        let primary = Arc::new(MemoryStore::default());
        let mirror = Arc::new(MemoryStore::default());
        let channel = SideChannel::spawn();
        let layer = PersistenceLayer::new(primary.clone(), mirror.clone(), channel.clone());

        layer.save(TIME_LOGS_KEY, &vec![json!({"id": "1"})]).await.unwrap();
        assert_eq!(primary.value(TIME_LOGS_KEY), Some(json!([{"id": "1"}])));

        channel.settle().await;
        assert_eq!(mirror.value(TIME_LOGS_KEY), Some(json!([{"id": "1"}])));
    }

    #[tokio::test]
    async fn mirror_failure_is_swallowed() {
        let primary = Arc::new(MemoryStore::default());
        let mirror = Arc::new(MemoryStore::failing());
        let channel = SideChannel::spawn();
        let layer = PersistenceLayer::new(primary.clone(), mirror, channel.clone());

        layer.save(STUDY_SESSIONS_KEY, &Vec::<Value>::new()).await.unwrap();
        channel.settle().await;

        assert_eq!(primary.value(STUDY_SESSIONS_KEY), Some(json!([])));
    }

    #[tokio::test]
    async fn primary_failure_is_reported() {
        let layer = PersistenceLayer::new(
            Arc::new(MemoryStore::failing()),
            Arc::new(MemoryStore::default()),
            SideChannel::spawn(),
        );

        let result = layer.save(STUDY_SESSIONS_KEY, &Vec::<Value>::new()).await;
        assert!(matches!(result, Err(PortError::Storage(_))));
    }

    #[tokio::test]
    async fn unreadable_documents_are_storage_errors() {
        let primary = Arc::new(MemoryStore::default());
        primary.insert(TIME_LOGS_KEY, json!("not a list"));
        let layer = PersistenceLayer::new(primary, Arc::new(MemoryStore::default()), SideChannel::spawn());

        let loaded = layer.load::<Vec<Value>>(TIME_LOGS_KEY).await;
        assert!(matches!(loaded, Err(PortError::Storage(_))));
        assert!(layer.load::<Vec<Value>>(STUDY_SESSIONS_KEY).await.unwrap().is_none());
    }
}
