//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the primary store. It implements
//! the `KeyValueStore` port from the `core` crate on top of SQLite using `sqlx`,
//! keeping one JSON document per collection key in the `kv_entries` table.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use study_tracker_core::{KeyValueStore, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `KeyValueStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct KvRecord {
    key: String,
    value: String,
}
impl KvRecord {
    fn to_domain(self) -> PortResult<Value> {
        serde_json::from_str(&self.value)
            .map_err(|e| PortError::Storage(format!("Stored document '{}' is corrupt: {}", self.key, e)))
    }
}

//=========================================================================================
// `KeyValueStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl KeyValueStore for DbAdapter {
    async fn get(&self, key: &str) -> PortResult<Option<Value>> {
        let record = sqlx::query_as::<_, KvRecord>("SELECT key, value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Storage(e.to_string()))?;

        record.map(KvRecord::to_domain).transpose()
    }

    async fn put(&self, key: &str, value: &Value) -> PortResult<()> {
        let document = serde_json::to_string(value).map_err(|e| PortError::Unexpected(e.to_string()))?;
        sqlx::query(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(document)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Storage(e.to_string()))?;
        Ok(())
    }
}
