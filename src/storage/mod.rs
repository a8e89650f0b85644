//! Storage Layer Module
//!
//! Provides persistence for issued challenge nonces.
//!
//! This module contains:
//! - The `NonceStore` trait the challenge protocol depends on
//! - SQLite implementation for durable, multi-process use
//! - In-memory implementation for testing

pub mod memory;
pub mod sqlite;
pub mod traits;

// Re-exports for convenience
pub use memory::MemoryNonceStore;
pub use sqlite::SqliteNonceStore;
pub use traits::{challenge_key, NonceStore, StorageError, StorageResult};

#[cfg(test)]
pub use traits::MockNonceStore;
