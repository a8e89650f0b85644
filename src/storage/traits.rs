//! Storage Trait Definitions
//!
//! Defines the nonce store the challenge protocol depends on.
//! Implementations can use SQLite (production) or in-memory (testing).

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Short-lived key/value store for issued challenge nonces
///
/// Implementations:
/// - `SqliteNonceStore` - Durable storage with SQLite
/// - `MemoryNonceStore` - In-process storage for tests and single-node use
///
/// Expired entries must read as absent, whether or not they have been purged.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Store `value` under `key` for `ttl`, replacing any existing entry
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()>;

    /// Atomically fetch and delete `key`
    ///
    /// Of any number of concurrent callers, at most one observes `Some`.
    async fn take(&self, key: &str) -> StorageResult<Option<String>>;

    /// Drop expired entries, returning how many were removed
    async fn purge_expired(&self) -> StorageResult<u64>;
}

/// Store key for the live challenge of `address`
pub fn challenge_key(address: &str) -> String {
    format!("challenge:{}", address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_key_namespace() {
        assert_eq!(
            challenge_key("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"),
            "challenge:bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
    }
}
