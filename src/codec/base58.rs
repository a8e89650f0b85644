//! Base58Check
//!
//! `version || payload || sha256d(version || payload)[..4]`, base58 encoded with the
//! Bitcoin alphabet. The conversion and checksum come from `bitcoin::base58`; this
//! module splits off the version byte and maps failures onto [`CodecError`].

use bitcoin::base58;

use super::CodecError;

const ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Longest string we are willing to run the quadratic conversion on
const MAX_ENCODED_LEN: usize = 128;

const CHECKSUM_LEN: usize = 4;

/// Encode `payload` under `version` as Base58Check
pub fn encode(payload: &[u8], version: u8) -> String {
    let mut data = Vec::with_capacity(1 + payload.len());
    data.push(version);
    data.extend_from_slice(payload);
    base58::encode_check(&data)
}

/// Decode a Base58Check string into `(version, payload)`
pub fn decode(encoded: &str) -> Result<(u8, Vec<u8>), CodecError> {
    if encoded.len() > MAX_ENCODED_LEN {
        return Err(CodecError::InvalidLength(encoded.len()));
    }

    let data = base58::decode_check(encoded).map_err(|err| match err {
        base58::Error::Decode(e) => CodecError::InvalidCharacter(
            first_invalid_char(encoded).unwrap_or_else(|| char::from(e.invalid_base58_character())),
        ),
        base58::Error::TooShort(e) => CodecError::InvalidLength(e.invalid_base58_length()),
        _ => CodecError::ChecksumMismatch,
    })?;

    // Checksum verified but nothing in front of it
    let (&version, payload) = data
        .split_first()
        .ok_or(CodecError::InvalidLength(CHECKSUM_LEN))?;
    Ok((version, payload.to_vec()))
}

/// The library reports the offending byte; report the whole character instead
fn first_invalid_char(encoded: &str) -> Option<char> {
    encoded.chars().find(|&c| !ALPHABET.contains(c))
}
