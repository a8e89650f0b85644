//! Recoverable ECDSA verification (P2PKH, P2WPKH)
//!
//! The 65-byte envelope is `flag || r || s` (Bitcoin Core `signmessage`
//! convention): `flag - 27` carries the recovery id in its low two bits and
//! `flag >= 31` marks a compressed public key.
//!
//! Verification recovers the signer's key from `(r, s, recovery_id)` and the
//! message digest, derives an address of the target's own family and network
//! from it, and compares strings.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1};

use super::{SignatureError, Verification, VerificationFailure};
use crate::address::{self, DecodedAddress};
use crate::message::MessageDigest;

/// secp256k1 group order n
const CURVE_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

const FLAG_MIN: u8 = 27;
const FLAG_MAX: u8 = 34;
const FLAG_COMPRESSED: u8 = 31;

/// Parsed `flag || r || s` envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdsaEnvelope {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// 0..=3
    pub recovery_id: u8,
    /// Derive the address from the compressed key serialization
    pub compressed: bool,
}

impl EcdsaEnvelope {
    pub const LEN: usize = 65;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != Self::LEN {
            return Err(SignatureError::InvalidLength(bytes.len()));
        }

        let flag = bytes[0];
        if !(FLAG_MIN..=FLAG_MAX).contains(&flag) {
            return Err(SignatureError::InvalidFlagByte(flag));
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[1..33]);
        s.copy_from_slice(&bytes[33..65]);

        Ok(Self {
            r,
            s,
            recovery_id: (flag - FLAG_MIN) % 4,
            compressed: flag >= FLAG_COMPRESSED,
        })
    }

    /// Header byte this envelope serializes with
    pub fn flag(&self) -> u8 {
        FLAG_MIN + self.recovery_id + if self.compressed { 4 } else { 0 }
    }

    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0] = self.flag();
        out[1..33].copy_from_slice(&self.r);
        out[33..65].copy_from_slice(&self.s);
        out
    }

    fn compact(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }
}

/// Recover the signing key for `digest`
pub fn recover_public_key<C: secp256k1::Verification>(
    secp: &Secp256k1<C>,
    digest: &MessageDigest,
    envelope: &EcdsaEnvelope,
) -> Result<PublicKey, VerificationFailure> {
    if !is_valid_scalar(&envelope.r) || !is_valid_scalar(&envelope.s) {
        return Err(VerificationFailure::ScalarOutOfRange);
    }

    let recovery_id = RecoveryId::from_i32(envelope.recovery_id as i32)
        .map_err(|_| VerificationFailure::InvalidRecoveryId(envelope.recovery_id))?;
    let signature = RecoverableSignature::from_compact(&envelope.compact(), recovery_id)
        .map_err(|_| VerificationFailure::InvalidSignature)?;

    let message = Message::from_digest(digest.to_bytes());
    secp.recover_ecdsa(&message, &signature).map_err(|_| {
        // ids 2 and 3 select x = r + n, which is off-curve for almost every r
        if envelope.recovery_id >= 2 {
            VerificationFailure::InvalidRecoveryId(envelope.recovery_id)
        } else {
            VerificationFailure::RecoveryFailed
        }
    })
}

/// Verify `envelope` over `digest` against `address`
///
/// `target` must be the decoded form of `address`. Never fails: every
/// problem during recovery or derivation is reported as
/// [`Verification::Invalid`].
pub fn verify<C: secp256k1::Verification>(
    secp: &Secp256k1<C>,
    address: &str,
    target: &DecodedAddress,
    digest: &MessageDigest,
    envelope: &EcdsaEnvelope,
) -> Verification {
    if !target.family.uses_ecdsa() {
        return Verification::Invalid(VerificationFailure::FamilyMismatch(target.family));
    }

    let public_key = match recover_public_key(secp, digest, envelope) {
        Ok(key) => key,
        Err(failure) => return Verification::Invalid(failure),
    };

    let derived = if envelope.compressed {
        address::derive_address(target.family, target.network, &public_key.serialize())
    } else {
        address::derive_address(
            target.family,
            target.network,
            &public_key.serialize_uncompressed(),
        )
    };

    match derived {
        Ok(derived) if derived == address => Verification::Valid {
            derived_address: Some(derived),
        },
        Ok(derived) => Verification::Invalid(VerificationFailure::AddressMismatch { derived }),
        Err(_) => Verification::Invalid(VerificationFailure::FamilyMismatch(target.family)),
    }
}

/// 0 < scalar < n, big-endian
fn is_valid_scalar(scalar: &[u8; 32]) -> bool {
    scalar.iter().any(|&b| b != 0) && scalar.as_slice() < CURVE_ORDER.as_slice()
}
