//! crates/study_tracker_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the tracker's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the concrete stores (SQLite, mirror files, external directories).

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde_json::Value;
use std::sync::Arc;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port and repository operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    /// The record is past its edit/delete window. The message is meant for the user.
    #[error("{0}")]
    EditWindowExpired(String),
    #[error("Malformed import: {0}")]
    MalformedImport(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// The primary store could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports
//=========================================================================================

/// A durable key/value store holding whole JSON documents per key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<Value>>;

    async fn put(&self, key: &str, value: &Value) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;
}

/// The access level asked of an external directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

/// The current answer to a permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// Not decided yet; a request may still grant it.
    Prompt,
}

/// A capability to a single user-chosen directory outside the app's own storage.
///
/// Holding a capability says nothing about whether it is usable right now;
/// callers check permission before every read or write.
#[async_trait]
pub trait SnapshotDirectory: Send + Sync {
    /// A persistable reference that `DirectoryOpener::open` turns back into a capability.
    fn locator(&self) -> String;

    async fn query_permission(&self, mode: AccessMode) -> PermissionState;

    /// Attempts to obtain `mode` without user interaction.
    async fn request_permission(&self, mode: AccessMode) -> PermissionState;

    async fn read_file(&self, name: &str) -> PortResult<Option<Vec<u8>>>;

    /// Replaces `name` atomically; readers never observe a partial file.
    async fn write_file(&self, name: &str, contents: &[u8]) -> PortResult<()>;
}

/// Re-hydrates a persisted directory reference.
pub trait DirectoryOpener: Send + Sync {
    fn open(&self, locator: &str) -> Arc<dyn SnapshotDirectory>;
}

//=========================================================================================
// Time
//=========================================================================================

/// The source of "now" and of the local calendar.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The UTC offset used to turn timestamps into calendar days.
    fn offset(&self) -> FixedOffset;

    fn local_date(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        timestamp.with_timezone(&self.offset()).date_naive()
    }

    fn today(&self) -> NaiveDate {
        self.local_date(self.now())
    }
}
