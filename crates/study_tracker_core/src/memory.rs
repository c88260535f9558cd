//! crates/study_tracker_core/src/memory.rs
//!
//! In-memory adapters for the storage ports. Used for ephemeral runs and as
//! deterministic doubles in tests.

use crate::ports::{
    AccessMode, DirectoryOpener, KeyValueStore, PermissionState, PortError, PortResult,
    SnapshotDirectory,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

//=========================================================================================
// MemoryStore
//=========================================================================================

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    failing: AtomicBool,
}

impl MemoryStore {
    /// A store whose every operation fails, standing in for an unavailable backend.
    pub fn failing() -> Self {
        let store = Self::default();
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn insert(&self, key: &str, value: Value) {
        lock(&self.entries).insert(key.to_string(), value);
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        lock(&self.entries).get(key).cloned()
    }

    fn check(&self) -> PortResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PortError::Storage("memory store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> PortResult<Option<Value>> {
        self.check()?;
        Ok(self.value(key))
    }

    async fn put(&self, key: &str, value: &Value) -> PortResult<()> {
        self.check()?;
        self.insert(key, value.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.check()?;
        lock(&self.entries).remove(key);
        Ok(())
    }
}

//=========================================================================================
// MemoryDirectory
//=========================================================================================

/// A fake external directory whose permission answers can be scripted.
pub struct MemoryDirectory {
    locator: String,
    files: Mutex<HashMap<String, Vec<u8>>>,
    current: Mutex<PermissionState>,
    /// What a silent request resolves to.
    on_request: Mutex<PermissionState>,
    fail_writes: AtomicBool,
}

impl MemoryDirectory {
    pub fn new(locator: &str) -> Self {
        Self {
            locator: locator.to_string(),
            files: Mutex::new(HashMap::new()),
            current: Mutex::new(PermissionState::Granted),
            on_request: Mutex::new(PermissionState::Granted),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_permission(&self, current: PermissionState, on_request: PermissionState) {
        *lock(&self.current) = current;
        *lock(&self.on_request) = on_request;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn put_file(&self, name: &str, contents: &[u8]) {
        lock(&self.files).insert(name.to_string(), contents.to_vec());
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        lock(&self.files).get(name).cloned()
    }
}

#[async_trait]
impl SnapshotDirectory for MemoryDirectory {
    fn locator(&self) -> String {
        self.locator.clone()
    }

    async fn query_permission(&self, _mode: AccessMode) -> PermissionState {
        *lock(&self.current)
    }

    async fn request_permission(&self, _mode: AccessMode) -> PermissionState {
        let granted = *lock(&self.on_request);
        *lock(&self.current) = granted;
        granted
    }

    async fn read_file(&self, name: &str) -> PortResult<Option<Vec<u8>>> {
        Ok(self.file(name))
    }

    async fn write_file(&self, name: &str, contents: &[u8]) -> PortResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Storage("disk full".to_string()));
        }
        self.put_file(name, contents);
        Ok(())
    }
}

/// Opens previously registered `MemoryDirectory` instances by locator.
#[derive(Default)]
pub struct MemoryDirectoryOpener {
    directories: Mutex<HashMap<String, Arc<MemoryDirectory>>>,
}

impl MemoryDirectoryOpener {
    pub fn register(&self, directory: Arc<MemoryDirectory>) {
        lock(&self.directories).insert(directory.locator(), directory);
    }
}

impl DirectoryOpener for MemoryDirectoryOpener {
    fn open(&self, locator: &str) -> Arc<dyn SnapshotDirectory> {
        let mut directories = lock(&self.directories);
        let directory = directories
            .entry(locator.to_string())
            .or_insert_with(|| Arc::new(MemoryDirectory::new(locator)))
            .clone();
        directory
    }
}
