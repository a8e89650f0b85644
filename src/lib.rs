//! btcauth - Bitcoin Signed-Message Login
//!
//! Verifies that a wallet signature proves control of a Bitcoin address,
//! without talking to a node, and wraps that in a single-use challenge flow.
//!
//! ## Address Families
//!
//! 1. **P2PKH** (`1...`, `m...`/`n...`) - recoverable ECDSA, Base58Check
//! 2. **P2WPKH** (`bc1q...`/`tb1q...`) - recoverable ECDSA, Bech32
//! 3. **P2TR** (`bc1p...`/`tb1p...`) - BIP-340 Schnorr, Bech32m
//!
//! ## Layers
//!
//! - `codec`: Base58Check, Bech32, Bech32m
//! - `address`: classification, decoding, derivation
//! - `message`: the "Bitcoin Signed Message" digest
//! - `signature`: ECDSA recovery and Schnorr verification
//! - `challenge`: nonce issuance and consumption
//! - `storage`: nonce stores (memory, SQLite)
//! - `common`: configuration, errors, logging

pub mod address;
pub mod challenge;
pub mod codec;
pub mod common;
pub mod message;
pub mod signature;
pub mod storage;

// Re-exports: address model
pub use address::{AddressError, AddressFamily, DecodedAddress, Network};

// Re-exports: message hashing
pub use message::{message_hash, MessageDigest};

// Re-exports: verification
pub use signature::{
    Signature, SignatureError, SignatureVerifier, Verification, VerificationFailure, VerifyError,
};

// Re-exports: challenge protocol
pub use challenge::{
    AuthError, AuthenticatedAddress, ChallengeConfig, ChallengeResponse, ChallengeService,
};

// Re-exports: storage
pub use storage::{MemoryNonceStore, NonceStore, SqliteNonceStore, StorageError};

// Re-exports: ambient
pub use common::{AuthConfig, BtcAuthError};
