//! Challenge-Response Module
//!
//! Passwordless login over Bitcoin message signing:
//!
//! 1. `request_challenge(address)` issues a random nonce and the exact text
//!    the wallet must sign, and stores the nonce with a TTL
//! 2. The wallet signs the text with the key behind `address`
//! 3. `verify_challenge(address, signature, nonce, timestamp)` takes the nonce
//!    (atomically, once), rebuilds the text and verifies the signature
//!
//! ## Components
//!
//! - **types**: configuration and result types
//! - **template**: the message template and timestamp format
//! - **sources**: injectable clock and randomness
//! - **service**: the protocol itself

pub mod service;
pub mod sources;
pub mod template;
pub mod types;

// Re-exports
pub use service::{AuthError, ChallengeService};
pub use sources::{Clock, OsRandom, RandomSource, SystemClock};
pub use template::{build_challenge_message, format_timestamp, parse_timestamp};
pub use types::{
    AuthenticatedAddress, Challenge, ChallengeConfig, ChallengeResponse, DEFAULT_CHALLENGE_TTL,
    NONCE_BYTES,
};
