//! BIP-340 Schnorr verification (P2TR)
//!
//! The address payload is the x-only public key itself, so verification is a
//! direct check against it. No tweak is applied.

use secp256k1::{schnorr, Message, Secp256k1, XOnlyPublicKey};

use super::{SignatureError, Verification, VerificationFailure};
use crate::address::{AddressFamily, DecodedAddress};
use crate::message::MessageDigest;

/// 64-byte BIP-340 signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchnorrSignature([u8; 64]);

impl SchnorrSignature {
    pub const LEN: usize = 64;

    /// Accepts 64 bytes, or 65 with a leading header byte that is dropped
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SignatureError> {
        let body = match bytes.len() {
            64 => bytes,
            65 => &bytes[1..],
            other => return Err(SignatureError::InvalidLength(other)),
        };
        let mut out = [0u8; 64];
        out.copy_from_slice(body);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

/// Verify raw signature bytes; a wrong length is a verification failure, not an error
pub fn verify_bytes<C: secp256k1::Verification>(
    secp: &Secp256k1<C>,
    target: &DecodedAddress,
    digest: &MessageDigest,
    signature: &[u8],
) -> Verification {
    match SchnorrSignature::from_slice(signature) {
        Ok(signature) => verify(secp, target, digest, &signature),
        Err(_) => {
            Verification::Invalid(VerificationFailure::InvalidSignatureLength(signature.len()))
        }
    }
}

pub fn verify<C: secp256k1::Verification>(
    secp: &Secp256k1<C>,
    target: &DecodedAddress,
    digest: &MessageDigest,
    signature: &SchnorrSignature,
) -> Verification {
    if target.family != AddressFamily::P2TR {
        return Verification::Invalid(VerificationFailure::FamilyMismatch(target.family));
    }

    let public_key = match XOnlyPublicKey::from_slice(&target.payload) {
        Ok(key) => key,
        Err(_) => return Verification::Invalid(VerificationFailure::InvalidPublicKey),
    };
    let signature = match schnorr::Signature::from_slice(signature.as_bytes()) {
        Ok(sig) => sig,
        Err(_) => return Verification::Invalid(VerificationFailure::InvalidSignature),
    };

    let message = Message::from_digest(digest.to_bytes());
    match secp.verify_schnorr(&signature, &message, &public_key) {
        Ok(()) => Verification::Valid {
            derived_address: None,
        },
        Err(_) => Verification::Invalid(VerificationFailure::SchnorrCheckFailed),
    }
}
