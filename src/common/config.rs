//! Environment-based Configuration for btcauth
//!
//! Nothing here is secret; the verifier holds no keys.
//!
//! # Environment Variables
//!
//! - `BTCAUTH_NETWORK` - "mainnet", "testnet" or "any" (default: "any")
//! - `BTCAUTH_CHALLENGE_TTL_SECS` - challenge lifetime, 1..=86400 (default: 300)
//! - `BTCAUTH_APP_NAME` - name shown in the challenge message (default: "btcauth")
//! - `BTCAUTH_NONCE_STORE` - "sqlite" or "memory" (default: "sqlite")
//! - `BTCAUTH_SQLITE_PATH` - sqlite file for the sqlite store (default: "data/challenges.db")
//! - `BTCAUTH_LOG_LEVEL` - trace, debug, info, warn, error (default: "info")
//! - `BTCAUTH_LOG_JSON` - "1" for JSON log lines (default: "0")

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::address::Network;
use crate::challenge::types::{ChallengeConfig, DEFAULT_APP_NAME};
use super::error::BtcAuthError;
use crate::storage::{MemoryNonceStore, NonceStore, SqliteNonceStore, StorageError};

const MAX_TTL_SECS: u64 = 86_400;
const DEFAULT_TTL_SECS: u64 = 300;
const DEFAULT_SQLITE_PATH: &str = "data/challenges.db";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Which nonce store backs the challenge service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceStoreKind {
    Memory,
    Sqlite,
}

impl NonceStoreKind {
    /// Whether issued challenges survive the process that issued them
    pub fn is_persistent(&self) -> bool {
        matches!(self, NonceStoreKind::Sqlite)
    }
}

impl FromStr for NonceStoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(NonceStoreKind::Memory),
            "sqlite" => Ok(NonceStoreKind::Sqlite),
            _ => Err(ConfigError::InvalidValue(
                "BTCAUTH_NONCE_STORE".to_string(),
                format!("unknown store: {} (use 'memory' or 'sqlite')", s),
            )),
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Accepted address network (`None` accepts both)
    pub network: Option<Network>,

    pub challenge_ttl: Duration,

    pub app_name: String,

    pub nonce_store: NonceStoreKind,

    pub sqlite_path: PathBuf,

    pub log_level: String,

    pub log_json: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            network: None,
            challenge_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            app_name: DEFAULT_APP_NAME.to_string(),
            nonce_store: NonceStoreKind::Sqlite,
            sqlite_path: PathBuf::from(DEFAULT_SQLITE_PATH),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl AuthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup` (environment in production, a map in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network = match lookup("BTCAUTH_NETWORK") {
            None => None,
            Some(value) if value.eq_ignore_ascii_case("any") => None,
            Some(value) => Some(value.parse::<Network>().map_err(|_| {
                ConfigError::InvalidValue(
                    "BTCAUTH_NETWORK".to_string(),
                    format!("unknown network: {} (use mainnet, testnet or any)", value),
                )
            })?),
        };

        let ttl_secs = match lookup("BTCAUTH_CHALLENGE_TTL_SECS") {
            None => DEFAULT_TTL_SECS,
            Some(value) => value.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "BTCAUTH_CHALLENGE_TTL_SECS".to_string(),
                    "must be a number".to_string(),
                )
            })?,
        };
        if ttl_secs == 0 || ttl_secs > MAX_TTL_SECS {
            return Err(ConfigError::InvalidValue(
                "BTCAUTH_CHALLENGE_TTL_SECS".to_string(),
                format!("must be between 1 and {}", MAX_TTL_SECS),
            ));
        }

        let app_name = lookup("BTCAUTH_APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
        if app_name.trim().is_empty() || app_name.contains('\n') {
            return Err(ConfigError::InvalidValue(
                "BTCAUTH_APP_NAME".to_string(),
                "must be a non-empty single line".to_string(),
            ));
        }

        let nonce_store = match lookup("BTCAUTH_NONCE_STORE") {
            None => NonceStoreKind::Sqlite,
            Some(value) => value.parse()?,
        };

        let sqlite_path = lookup("BTCAUTH_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SQLITE_PATH));

        let log_level = lookup("BTCAUTH_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_json = lookup("BTCAUTH_LOG_JSON").map(|v| v == "1").unwrap_or(false);

        Ok(Self {
            network,
            challenge_ttl: Duration::from_secs(ttl_secs),
            app_name,
            nonce_store,
            sqlite_path,
            log_level,
            log_json,
        })
    }

    /// Protocol configuration for `ChallengeService`
    pub fn challenge_config(&self) -> ChallengeConfig {
        ChallengeConfig {
            ttl: self.challenge_ttl,
            app_name: self.app_name.clone(),
            network: self.network,
        }
    }

    /// Open the configured nonce store
    pub fn open_nonce_store(&self) -> Result<Arc<dyn NonceStore>, StorageError> {
        match self.nonce_store {
            NonceStoreKind::Memory => Ok(Arc::new(MemoryNonceStore::new())),
            NonceStoreKind::Sqlite => Ok(Arc::new(SqliteNonceStore::new(&self.sqlite_path)?)),
        }
    }

    /// Open the configured store for callers whose challenges must outlive
    /// the current process, such as separate CLI invocations
    pub fn open_persistent_nonce_store(&self) -> Result<Arc<dyn NonceStore>, BtcAuthError> {
        if !self.nonce_store.is_persistent() {
            return Err(ConfigError::InvalidValue(
                "BTCAUTH_NONCE_STORE".to_string(),
                "the memory store forgets challenges when the process exits; use sqlite"
                    .to_string(),
            )
            .into());
        }
        Ok(self.open_nonce_store()?)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("=== btcauth Configuration ===");
        println!(
            "Network: {}",
            self.network
                .map(|n| n.to_string())
                .unwrap_or_else(|| "any".to_string())
        );
        println!("Challenge TTL: {}s", self.challenge_ttl.as_secs());
        println!("App Name: {}", self.app_name);
        match self.nonce_store {
            NonceStoreKind::Memory => println!("Nonce Store: memory"),
            NonceStoreKind::Sqlite => {
                println!("Nonce Store: sqlite ({})", self.sqlite_path.display())
            }
        }
        println!("Log Level: {}", self.log_level);
        println!("Log Format: {}", if self.log_json { "json" } else { "pretty" });
        println!("=============================");
    }
}
