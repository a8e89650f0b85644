//! Challenge Protocol Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::address::{AddressFamily, Network};

/// Challenge lifetime unless configured otherwise
pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(300);

/// Random bytes per nonce (hex-encoded to 32 characters)
pub const NONCE_BYTES: usize = 16;

pub const DEFAULT_APP_NAME: &str = "btcauth";

/// Protocol configuration, handed to the service at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeConfig {
    /// How long an issued nonce stays redeemable
    pub ttl: Duration,
    /// Name shown in the first line of the challenge message
    pub app_name: String,
    /// Only accept addresses for this network (`None` accepts both)
    pub network: Option<Network>,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CHALLENGE_TTL,
            app_name: DEFAULT_APP_NAME.to_string(),
            network: None,
        }
    }
}

/// An issued challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub address: String,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl Challenge {
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero());
        self.issued_at + ttl
    }
}

/// What the caller hands back to the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub nonce: String,
    /// Exact text the wallet must sign
    pub message: String,
    pub expires_in_seconds: u32,
    /// Timestamp embedded in `message`; echoed back on verification
    pub issued_at: String,
}

/// Successful verification result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedAddress {
    pub address: String,
    pub family: AddressFamily,
    pub network: Network,
}
