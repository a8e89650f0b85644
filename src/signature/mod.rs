//! Signature Verification
//!
//! Dispatches on the target address family:
//!
//! - P2PKH / P2WPKH: recoverable ECDSA, 65-byte `flag || r || s` envelope
//!   ([`ecdsa`])
//! - P2TR: BIP-340 Schnorr against the x-only key in the address ([`schnorr`])
//!
//! Two outcome tiers are kept apart. Input that cannot even be parsed
//! (bad base64, wrong envelope length, flag byte out of range, undecodable
//! address) is a [`VerifyError`]. Well-formed input that simply does not
//! verify is `Ok(Verification::Invalid(..))` carrying the reason.

pub mod ecdsa;
pub mod schnorr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use secp256k1::{Secp256k1, VerifyOnly};
use thiserror::Error;

use crate::address::{self, AddressError, AddressFamily, DecodedAddress};
use crate::message::{message_hash, MessageDigest};

pub use ecdsa::EcdsaEnvelope;
pub use schnorr::SchnorrSignature;

// ============================================================================
// Errors and outcomes
// ============================================================================

/// Signature could not be parsed (malformed-input tier)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature is not valid base64")]
    InvalidBase64,

    #[error("invalid signature length: {0} bytes")]
    InvalidLength(usize),

    #[error("invalid signature flag byte: {0} (expected 27..=34)")]
    InvalidFlagByte(u8),
}

/// Why a well-formed signature did not verify
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationFailure {
    #[error("recovery id {0} does not yield a curve point")]
    InvalidRecoveryId(u8),

    #[error("r or s outside 1..n-1")]
    ScalarOutOfRange,

    #[error("public key recovery failed")]
    RecoveryFailed,

    #[error("recovered key belongs to {derived}")]
    AddressMismatch { derived: String },

    #[error("schnorr signature must be 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("address does not carry a valid x-only public key")]
    InvalidPublicKey,

    #[error("signature bytes rejected by secp256k1")]
    InvalidSignature,

    #[error("schnorr verification failed")]
    SchnorrCheckFailed,

    #[error("signature algorithm does not match {0} address")]
    FamilyMismatch(AddressFamily),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid {
        /// Address re-derived from the recovered key (ECDSA only)
        derived_address: Option<String>,
    },
    Invalid(VerificationFailure),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid { .. })
    }

    pub fn failure(&self) -> Option<&VerificationFailure> {
        match self {
            Verification::Valid { .. } => None,
            Verification::Invalid(failure) => Some(failure),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// A parsed signature, tagged by algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    EcdsaRecoverable(EcdsaEnvelope),
    Schnorr(SchnorrSignature),
}

impl Signature {
    /// Decode base64 and parse for the algorithm `family` uses
    pub fn decode(family: AddressFamily, encoded: &str) -> Result<Self, SignatureError> {
        let raw = decode_base64(encoded)?;
        Self::from_bytes(family, &raw)
    }

    pub fn from_bytes(family: AddressFamily, raw: &[u8]) -> Result<Self, SignatureError> {
        if family.uses_ecdsa() {
            EcdsaEnvelope::from_bytes(raw).map(Signature::EcdsaRecoverable)
        } else {
            SchnorrSignature::from_slice(raw).map(Signature::Schnorr)
        }
    }
}

pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, SignatureError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|_| SignatureError::InvalidBase64)
}

// ============================================================================
// Verifier
// ============================================================================

/// Verification-only secp256k1 context plus family dispatch
#[derive(Clone)]
pub struct SignatureVerifier {
    secp: Secp256k1<VerifyOnly>,
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureVerifier {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::verification_only(),
        }
    }

    /// Verify a base64 signature over `message` for `address`
    ///
    /// Schnorr signatures of the wrong length verify as
    /// `Invalid(InvalidSignatureLength)` instead of erroring.
    pub fn verify(
        &self,
        address: &str,
        message: &str,
        signature_base64: &str,
    ) -> Result<Verification, VerifyError> {
        let target = address::decode(address)?;
        let raw = decode_base64(signature_base64)?;
        let digest = message_hash(message);

        if target.family.uses_ecdsa() {
            let envelope = EcdsaEnvelope::from_bytes(&raw)?;
            Ok(self.verify_ecdsa(address, &target, &digest, &envelope))
        } else {
            Ok(schnorr::verify_bytes(&self.secp, &target, &digest, &raw))
        }
    }

    /// Verify an already-parsed signature
    pub fn verify_parsed(
        &self,
        address: &str,
        target: &DecodedAddress,
        digest: &MessageDigest,
        signature: &Signature,
    ) -> Verification {
        match signature {
            Signature::EcdsaRecoverable(envelope) => {
                self.verify_ecdsa(address, target, digest, envelope)
            }
            Signature::Schnorr(sig) => self.verify_schnorr(target, digest, sig),
        }
    }

    pub fn verify_ecdsa(
        &self,
        address: &str,
        target: &DecodedAddress,
        digest: &MessageDigest,
        envelope: &EcdsaEnvelope,
    ) -> Verification {
        ecdsa::verify(&self.secp, address, target, digest, envelope)
    }

    pub fn verify_schnorr(
        &self,
        target: &DecodedAddress,
        digest: &MessageDigest,
        signature: &SchnorrSignature,
    ) -> Verification {
        schnorr::verify(&self.secp, target, digest, signature)
    }
}
