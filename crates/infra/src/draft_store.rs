//! Draft persistence backends.
//!
//! Two implementations of the engine's `DraftStore` port: an in-memory map
//! for tests and dev, and a SQLite-backed store for the app. The SQLite
//! store keeps a lazily initialized connection pool and runs each query on
//! a dedicated thread with its own runtime, since the port itself is
//! synchronous and callers may already be inside a tokio runtime.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::Context;
use sqlx::{Row, SqlitePool};
use tokio::runtime::Runtime;

use orderpad_entry::{DraftError, DraftSnapshot, DraftStore};

/// In-memory draft store.
///
/// Stores each snapshot as serialized JSON, so reads observe one consistent
/// value, the same way a real key-value backend would.
#[derive(Debug, Default)]
pub struct InMemoryDraftStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for InMemoryDraftStore {
    fn write(&self, key: &str, snapshot: &DraftSnapshot) -> Result<(), DraftError> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| DraftError::storage(format!("serialize draft: {e}")))?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DraftError::storage("lock poisoned"))?;
        entries.insert(key.to_string(), json);
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<DraftSnapshot>, DraftError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| DraftError::storage("lock poisoned"))?;
        entries
            .get(key)
            .map(|json| {
                serde_json::from_str(json)
                    .map_err(|e| DraftError::storage(format!("deserialize draft: {e}")))
            })
            .transpose()
    }

    fn clear(&self, key: &str) -> Result<(), DraftError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DraftError::storage("lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// SQLite-backed draft store.
///
/// The database is initialized on first use. Cheap to clone and safe to
/// share across threads.
#[derive(Debug, Clone)]
pub struct SqliteDraftStore {
    db_path: PathBuf,
    pool: Arc<tokio::sync::Mutex<Option<SqlitePool>>>,
}

impl SqliteDraftStore {
    /// Store backed by the default per-user database,
    /// `{app_data_dir}/orderpad/drafts.db`.
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::at_path(default_db_path()?))
    }

    /// Store backed by an explicit database file (tests, custom setups).
    pub fn at_path(db_path: PathBuf) -> Self {
        Self {
            db_path,
            pool: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Initialize the database connection (called lazily on first use).
    async fn ensure_initialized(&self) -> anyhow::Result<()> {
        let mut pool_guard = self.pool.lock().await;
        if pool_guard.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create draft directory at {parent:?}"))?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", self.db_path.to_string_lossy());
        let pool = SqlitePool::connect(&db_url)
            .await
            .with_context(|| format!("failed to open draft database at {:?}", self.db_path))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS drafts (
                key       TEXT PRIMARY KEY,
                data      TEXT NOT NULL,
                saved_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create drafts table")?;

        *pool_guard = Some(pool);
        Ok(())
    }

    /// Get the pool, initializing if necessary.
    async fn get_pool(&self) -> anyhow::Result<SqlitePool> {
        self.ensure_initialized().await?;
        let pool_guard = self.pool.lock().await;
        Ok(pool_guard.as_ref().unwrap().clone())
    }

    /// Run a storage future to completion from the synchronous port.
    ///
    /// Callers are often already inside a tokio runtime (the session driver
    /// persists on every mutation), and blocking that thread with a nested
    /// runtime panics. Each query therefore runs on a dedicated thread with
    /// its own runtime, which works from both sync and async callers.
    fn run<T, F>(&self, op: F) -> Result<T, DraftError>
    where
        T: Send,
        F: Future<Output = anyhow::Result<T>> + Send,
    {
        std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let rt = Runtime::new()
                        .map_err(|e| DraftError::storage(format!("failed to create runtime: {e}")))?;
                    rt.block_on(op)
                        .map_err(|e| DraftError::storage(format!("{e:#}")))
                })
                .join()
                .unwrap_or_else(|_| Err(DraftError::storage("draft store thread panicked")))
        })
    }
}

impl DraftStore for SqliteDraftStore {
    fn write(&self, key: &str, snapshot: &DraftSnapshot) -> Result<(), DraftError> {
        let data = serde_json::to_string(snapshot)
            .map_err(|e| DraftError::storage(format!("serialize draft: {e}")))?;
        let saved_at = snapshot.saved_at.to_rfc3339();

        self.run(async {
            let pool = self.get_pool().await?;
            sqlx::query(
                r#"
                INSERT INTO drafts (key, data, saved_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key)
                DO UPDATE SET
                    data = excluded.data,
                    saved_at = excluded.saved_at
                "#,
            )
            .bind(key)
            .bind(&data)
            .bind(&saved_at)
            .execute(&pool)
            .await
            .context("failed to upsert draft")?;
            Ok(())
        })
    }

    fn read(&self, key: &str) -> Result<Option<DraftSnapshot>, DraftError> {
        let data: Option<String> = self.run(async {
            let pool = self.get_pool().await?;
            let row = sqlx::query(
                r#"
                SELECT data
                FROM drafts
                WHERE key = ?1
                "#,
            )
            .bind(key)
            .fetch_optional(&pool)
            .await
            .context("failed to fetch draft")?;

            match row {
                Some(row) => Ok(Some(row.try_get::<String, _>("data")?)),
                None => Ok(None),
            }
        })?;

        data.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| DraftError::storage(format!("deserialize draft: {e}")))
        })
        .transpose()
    }

    fn clear(&self, key: &str) -> Result<(), DraftError> {
        self.run(async {
            let pool = self.get_pool().await?;
            sqlx::query(
                r#"
                DELETE FROM drafts
                WHERE key = ?1
                "#,
            )
            .bind(key)
            .execute(&pool)
            .await
            .context("failed to delete draft")?;
            Ok(())
        })
    }
}

/// Resolve the path to the SQLite draft database:
/// `{app_data_dir}/orderpad/drafts.db`.
fn default_db_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory")?;

    let mut dir = base;
    dir.push("orderpad");
    dir.push("drafts.db");
    Ok(dir)
}
