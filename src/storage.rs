//! Storage gateway.
//!
//! Key-value persistence over a fixed set of dataset keys. Every value is a
//! JSON snapshot. Backends implement [`KeyValueStore`]; the engine talks to
//! them through [`StorageGateway`], which adds typed (de)serialization and
//! the "log and fall back to default" read path.
//!
//! There are no cross-key transactions. `set_multiple` / `get_multiple` fan
//! out concurrently and each key succeeds or fails on its own.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// One key per logical dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Progress,
    Badges,
    Quests,
    Exercises,
    Planning,
    Notes,
    Summaries,
    PomodoroSessions,
    /// Timestamp of the last daily/weekly quest boundary check.
    QuestCheck,
}

impl StorageKey {
    pub const ALL: [StorageKey; 9] = [
        StorageKey::Progress,
        StorageKey::Badges,
        StorageKey::Quests,
        StorageKey::Exercises,
        StorageKey::Planning,
        StorageKey::Notes,
        StorageKey::Summaries,
        StorageKey::PomodoroSessions,
        StorageKey::QuestCheck,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::Progress => "progress",
            StorageKey::Badges => "badges",
            StorageKey::Quests => "quests",
            StorageKey::Exercises => "exercises",
            StorageKey::Planning => "planning",
            StorageKey::Notes => "notes",
            StorageKey::Summaries => "summaries",
            StorageKey::PomodoroSessions => "pomodoro_sessions",
            StorageKey::QuestCheck => "quest_check",
        }
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// Raw async key-value backend. Clones must share the same underlying data.
pub trait KeyValueStore: Clone + Send + Sync + 'static {
    fn set(
        &self,
        key: StorageKey,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<()>> + Send;

    fn get(&self, key: StorageKey)
    -> impl Future<Output = Result<Option<serde_json::Value>>> + Send;

    fn remove(&self, key: StorageKey) -> impl Future<Output = Result<()>> + Send;
}

// ---------------------------------------------------------------------------
// SQLite backend
// ---------------------------------------------------------------------------

/// SQLite-backed store. One row per key in `kv_store`.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect (creating the file if needed) and run migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options: SqliteConnectOptions = url.parse()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options.create_if_missing(true))
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// A private in-memory database (for testing).
    pub async fn in_memory() -> Result<Self> {
        // Each in-memory connection is its own database, so pin the pool to one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    async fn set(&self, key: StorageKey, value: serde_json::Value) -> Result<()> {
        let text = serde_json::to_string(&value)?;
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key.as_str())
        .bind(text)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: StorageKey) -> Result<Option<serde_json::Value>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((text,)) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, key: StorageKey) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Process-local store. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<StorageKey, serde_json::Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    async fn set(&self, key: StorageKey, value: serde_json::Value) -> Result<()> {
        self.entries.write().await.insert(key, value);
        Ok(())
    }

    async fn get(&self, key: StorageKey) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.read().await.get(&key).cloned())
    }

    async fn remove(&self, key: StorageKey) -> Result<()> {
        self.entries.write().await.remove(&key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Typed access to a [`KeyValueStore`].
#[derive(Clone)]
pub struct StorageGateway<S> {
    store: S,
}

impl<S: KeyValueStore> StorageGateway<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Serialize and store `value`, returning it on success.
    pub async fn set<T: Serialize>(&self, key: StorageKey, value: T) -> Result<T> {
        let json = serde_json::to_value(&value)?;
        self.store.set(key, json).await?;
        debug!(key = %key, "stored");
        Ok(value)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>> {
        match self.store.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_value(json)?)),
            None => Ok(None),
        }
    }

    pub async fn remove(&self, key: StorageKey) -> Result<()> {
        self.store.remove(key).await?;
        debug!(key = %key, "removed");
        Ok(())
    }

    /// Read `key`, logging any failure and falling back to `T::default()`.
    pub async fn get_or_default<T: DeserializeOwned + Default>(&self, key: StorageKey) -> T {
        self.get_or_else(key, T::default).await
    }

    /// Read `key`, logging any failure and falling back to `fallback()`.
    pub async fn get_or_else<T, F>(&self, key: StorageKey, fallback: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        match self.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => fallback(),
            Err(e) => {
                warn!(key = %key, error = %e, "storage read failed, using default");
                fallback()
            }
        }
    }

    /// Store `value`, logging instead of propagating failure.
    pub async fn persist<T: Serialize>(&self, key: StorageKey, value: &T) {
        if let Err(e) = self.set(key, value).await {
            warn!(key = %key, error = %e, "storage write failed");
        }
    }

    /// Write several keys concurrently. Results are in input order.
    pub async fn set_multiple(&self, entries: Vec<(StorageKey, serde_json::Value)>) -> Vec<Result<()>> {
        let mut set = JoinSet::new();
        for (index, (key, value)) in entries.into_iter().enumerate() {
            let store = self.store.clone();
            set.spawn(async move { (index, store.set(key, value).await) });
        }
        collect_ordered(set).await
    }

    /// Read several keys concurrently. A failed read maps to `None`.
    pub async fn get_multiple(
        &self,
        keys: &[StorageKey],
    ) -> HashMap<StorageKey, Option<serde_json::Value>> {
        let mut set = JoinSet::new();
        for &key in keys {
            let store = self.store.clone();
            set.spawn(async move { (key, store.get(key).await) });
        }

        let mut out = HashMap::with_capacity(keys.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((key, Ok(value))) => {
                    out.insert(key, value);
                }
                Ok((key, Err(e))) => {
                    warn!(key = %key, error = %e, "storage read failed");
                    out.insert(key, None);
                }
                Err(e) => warn!(error = %e, "storage read task failed"),
            }
        }
        out
    }
}

async fn collect_ordered(mut set: JoinSet<(usize, Result<()>)>) -> Vec<Result<()>> {
    let mut results: Vec<(usize, Result<()>)> = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(pair) => results.push(pair),
            Err(e) => results.push((usize::MAX, Err(Error::Other(format!("storage task failed: {e}"))))),
        }
    }
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, r)| r).collect()
}
