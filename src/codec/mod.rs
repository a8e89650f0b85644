//! Address Codec Layer
//!
//! Pure, stateless encoders/decoders for the three Bitcoin address encodings:
//!
//! - **base58**: Base58Check (legacy P2PKH)
//! - **bech32**: Bech32 (BIP-173, witness v0) and Bech32m (BIP-350, witness v1+)
//!
//! Both wrap the codecs shipped with the `bitcoin` crate and map their failures
//! onto [`CodecError`]. No elliptic-curve code lives here.

pub mod base58;
pub mod bech32;

use thiserror::Error;

pub use bech32::{ChecksumFailure, SegwitProgram, Variant};

/// Codec errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid character {0:?}")]
    InvalidCharacter(char),

    #[error("base58check checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid bech32 checksum: {0}")]
    InvalidChecksum(ChecksumFailure),

    #[error("mixed-case bech32 string")]
    MixedCase,

    #[error("invalid encoded length: {0}")]
    InvalidLength(usize),

    #[error("missing bech32 separator")]
    MissingSeparator,

    #[error("unknown human-readable part: {0}")]
    InvalidHrp(String),

    #[error("invalid witness version: {0}")]
    InvalidWitnessVersion(u8),

    #[error("invalid witness program length: {0}")]
    InvalidProgramLength(usize),

    #[error("non-zero or excess padding in 5-bit data")]
    InvalidPadding,
}
