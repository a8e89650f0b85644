//! SQLite Persistent Nonce Store
//!
//! Provides durable nonce storage that survives process restarts, so a
//! challenge issued by one process can be consumed by another.
//! Uses connection pooling via r2d2 for concurrent access.
//!
//! Expiry is stored as unix seconds. `take` is a single
//! `DELETE ... RETURNING` statement, so two connections racing on the same
//! key cannot both receive the row.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::traits::{NonceStore, StorageError, StorageResult};

/// SQLite-backed nonce store with connection pooling
#[derive(Clone)]
pub struct SqliteNonceStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteNonceStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Get a connection from the pool
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS challenge_nonces (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_challenge_nonces_expires_at
                ON challenge_nonces(expires_at);
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    /// Number of rows held, expired ones included
    pub fn count(&self) -> Result<u64, StorageError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM challenge_nonces", [], |row| row.get(0))
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(count as u64)
    }

    // Synchronous helper methods for the trait implementations

    fn put_sync(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let expires_at = unix_now()?.saturating_add(ttl.as_secs()) as i64;

        conn.execute(
            "INSERT OR REPLACE INTO challenge_nonces (key, value, expires_at) VALUES (?1, ?2, ?3)",
            params![key, value, expires_at],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn take_sync(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let now = unix_now()? as i64;

        let row: Option<(String, i64)> = conn
            .query_row(
                "DELETE FROM challenge_nonces WHERE key = ?1 RETURNING value, expires_at",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(row.and_then(|(value, expires_at)| (now < expires_at).then_some(value)))
    }

    fn purge_expired_sync(&self) -> Result<u64, StorageError> {
        let conn = self.conn()?;
        let now = unix_now()? as i64;

        let removed = conn
            .execute(
                "DELETE FROM challenge_nonces WHERE expires_at <= ?1",
                params![now],
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(removed as u64)
    }
}

fn unix_now() -> Result<u64, StorageError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| StorageError::InvalidData(e.to_string()))
}

#[async_trait]
impl NonceStore for SqliteNonceStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        self.put_sync(key, value, ttl)
    }

    async fn take(&self, key: &str) -> StorageResult<Option<String>> {
        self.take_sync(key)
    }

    async fn purge_expired(&self) -> StorageResult<u64> {
        self.purge_expired_sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn test_put_and_take() {
        let store = SqliteNonceStore::in_memory().unwrap();
        store.put("challenge:a", "n1", TTL).await.unwrap();

        assert_eq!(store.take("challenge:a").await.unwrap(), Some("n1".to_string()));
        assert_eq!(store.take("challenge:a").await.unwrap(), None);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let store = SqliteNonceStore::in_memory().unwrap();
        store.put("challenge:a", "n1", TTL).await.unwrap();
        store.put("challenge:a", "n2", TTL).await.unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.take("challenge:a").await.unwrap(), Some("n2".to_string()));
    }

    #[tokio::test]
    async fn test_expired_reads_as_absent() {
        let store = SqliteNonceStore::in_memory().unwrap();
        store.put("challenge:a", "n1", Duration::ZERO).await.unwrap();

        assert_eq!(store.take("challenge:a").await.unwrap(), None);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = SqliteNonceStore::in_memory().unwrap();
        store.put("challenge:old", "n", Duration::ZERO).await.unwrap();
        store.put("challenge:live", "n", TTL).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("nonces.db");

        {
            let store = SqliteNonceStore::new(&path).unwrap();
            store.put("challenge:a", "n1", TTL).await.unwrap();
        }

        let reopened = SqliteNonceStore::new(&path).unwrap();
        assert_eq!(reopened.take("challenge:a").await.unwrap(), Some("n1".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_take_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteNonceStore::new(dir.path().join("race.db")).unwrap();
        store.put("challenge:race", "nonce", TTL).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.take("challenge:race").await }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
