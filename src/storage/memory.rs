//! In-Memory Nonce Store
//!
//! Provides in-process storage for testing and single-node deployments.
//! Data is lost when the service restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::traits::{NonceStore, StorageResult};

/// Map size that triggers the first expiry sweep
const MIN_SWEEP_AT: usize = 64;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

struct Inner {
    entries: HashMap<String, Entry>,
    /// `put` sweeps expired entries once the map reaches this size
    sweep_at: usize,
}

impl Inner {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        self.sweep_at = MIN_SWEEP_AT.max(self.entries.len() * 2);
        before - self.entries.len()
    }
}

/// In-memory nonce store
///
/// A single mutex guards the map, so `take` is one critical section.
/// Challenges that are never redeemed are swept by `put` whenever the map
/// has doubled since the last sweep, so memory stays proportional to the
/// number of live challenges.
#[derive(Clone)]
pub struct MemoryNonceStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryNonceStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                sweep_at: MIN_SWEEP_AT,
            })),
        }
    }

    /// Number of entries held, expired ones not yet swept included
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }
}

impl Default for MemoryNonceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        let mut inner = self.inner.lock().await;
        inner.entries.insert(key.to_string(), entry);
        if inner.entries.len() >= inner.sweep_at {
            inner.sweep(Instant::now());
        }
        Ok(())
    }

    async fn take(&self, key: &str) -> StorageResult<Option<String>> {
        let entry = self.inner.lock().await.entries.remove(key);
        let now = Instant::now();
        Ok(entry.filter(|e| e.is_live(now)).map(|e| e.value))
    }

    async fn purge_expired(&self) -> StorageResult<u64> {
        let removed = self.inner.lock().await.sweep(Instant::now());
        Ok(removed as u64)
    }
}
