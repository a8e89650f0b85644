//! Bech32 / Bech32m segwit address codec
//!
//! Checksums, charset handling and 5/8-bit regrouping come from `bitcoin::bech32`.
//! This module adds the rules a login address needs on top:
//!
//! - witness v0 must carry a Bech32 (BIP-173) checksum and v1+ a Bech32m
//!   (BIP-350) one. A string valid under the *other* constant decodes to
//!   [`ChecksumFailure::WrongVariant`], distinct from a plain [`ChecksumFailure::BadValue`]
//! - only the `bc` and `tb` human-readable parts decode
//! - total length 8..=90

use std::fmt;

use bitcoin::bech32::primitives::decode::{CharError, UncheckedHrpstring, UncheckedHrpstringError};
use bitcoin::bech32::{segwit, Bech32, Bech32m, Fe32, Hrp};
use serde::Serialize;

use super::CodecError;

/// Total string length bounds (BIP-173)
pub const MIN_LENGTH: usize = 8;
pub const MAX_LENGTH: usize = 90;

/// Highest segwit witness version
const MAX_WITNESS_VERSION: u8 = 16;

/// Human-readable parts accepted on decode
const SEGWIT_HRPS: [&str; 2] = ["bc", "tb"];

// ============================================================================
// Types
// ============================================================================

/// Checksum constant family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// BIP-173, witness v0
    Bech32,
    /// BIP-350, witness v1+
    Bech32m,
}

impl Variant {
    /// The variant a segwit address of `witness_version` must use
    pub fn for_witness_version(witness_version: u8) -> Self {
        if witness_version == 0 {
            Variant::Bech32
        } else {
            Variant::Bech32m
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Bech32 => write!(f, "bech32"),
            Variant::Bech32m => write!(f, "bech32m"),
        }
    }
}

/// Why a checksum was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumFailure {
    /// Residue matches neither constant
    BadValue,
    /// Checksum is valid, but under the wrong constant for the witness version
    WrongVariant { expected: Variant, found: Variant },
}

impl fmt::Display for ChecksumFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumFailure::BadValue => write!(f, "checksum does not verify"),
            ChecksumFailure::WrongVariant { expected, found } => {
                write!(f, "expected {} checksum, found {}", expected, found)
            }
        }
    }
}

/// A decoded segwit address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegwitProgram {
    /// Human-readable part, lowercased
    pub hrp: String,
    pub witness_version: u8,
    pub program: Vec<u8>,
}

// ============================================================================
// Segwit encode / decode
// ============================================================================

/// Encode a witness program, choosing Bech32 for v0 and Bech32m for v1+
///
/// Any well-formed human-readable part is accepted here; only decoding is
/// restricted to `bc`/`tb`.
pub fn encode(hrp: &str, witness_version: u8, program: &[u8]) -> Result<String, CodecError> {
    check_program(witness_version, program.len())?;

    let parsed = Hrp::parse(hrp).map_err(|_| CodecError::InvalidHrp(hrp.to_string()))?;
    let version = Fe32::try_from(witness_version)
        .map_err(|_| CodecError::InvalidWitnessVersion(witness_version))?;

    segwit::encode(parsed, version, program).map_err(|err| match err {
        segwit::EncodeError::TooLong(e) => CodecError::InvalidLength(e.0),
        _ => CodecError::InvalidProgramLength(program.len()),
    })
}

/// Decode a segwit address string
///
/// Enforces length bounds, single case, charset, human-readable part, checksum
/// (including the variant required by the witness version), padding and
/// program length.
pub fn decode(encoded: &str) -> Result<SegwitProgram, CodecError> {
    let len = encoded.len();
    if !(MIN_LENGTH..=MAX_LENGTH).contains(&len) {
        return Err(CodecError::InvalidLength(len));
    }

    let unchecked = UncheckedHrpstring::new(encoded).map_err(|err| parse_error(encoded, err))?;

    let hrp = unchecked.hrp().to_lowercase();
    if !SEGWIT_HRPS.contains(&hrp.as_str()) {
        return Err(CodecError::InvalidHrp(hrp));
    }

    let (found, mut checked) = if unchecked.has_valid_checksum::<Bech32>() {
        (Variant::Bech32, unchecked.remove_checksum::<Bech32>())
    } else if unchecked.has_valid_checksum::<Bech32m>() {
        (Variant::Bech32m, unchecked.remove_checksum::<Bech32m>())
    } else {
        return Err(CodecError::InvalidChecksum(ChecksumFailure::BadValue));
    };

    // Every data character is already known to be in the charset
    let witness_version = match checked.data_part_ascii_no_checksum().first() {
        Some(&c) => Fe32::from_char_unchecked(c).to_u8(),
        None => return Err(CodecError::InvalidProgramLength(0)),
    };
    if witness_version > MAX_WITNESS_VERSION {
        return Err(CodecError::InvalidWitnessVersion(witness_version));
    }

    let expected = Variant::for_witness_version(witness_version);
    if found != expected {
        return Err(CodecError::InvalidChecksum(ChecksumFailure::WrongVariant {
            expected,
            found,
        }));
    }

    checked.remove_witness_version();
    checked
        .validate_segwit_padding()
        .map_err(|_| CodecError::InvalidPadding)?;
    let program: Vec<u8> = checked.byte_iter().collect();
    check_program(witness_version, program.len())?;

    Ok(SegwitProgram {
        hrp,
        witness_version,
        program,
    })
}

fn check_program(witness_version: u8, len: usize) -> Result<(), CodecError> {
    if witness_version > MAX_WITNESS_VERSION {
        return Err(CodecError::InvalidWitnessVersion(witness_version));
    }
    if !(2..=40).contains(&len) {
        return Err(CodecError::InvalidProgramLength(len));
    }
    if witness_version == 0 && len != 20 && len != 32 {
        return Err(CodecError::InvalidProgramLength(len));
    }
    Ok(())
}

fn parse_error(encoded: &str, err: UncheckedHrpstringError) -> CodecError {
    match err {
        UncheckedHrpstringError::Char(CharError::MissingSeparator) => CodecError::MissingSeparator,
        UncheckedHrpstringError::Char(CharError::MixedCase) => CodecError::MixedCase,
        UncheckedHrpstringError::Char(CharError::InvalidChar(c)) => CodecError::InvalidCharacter(c),
        UncheckedHrpstringError::Hrp(_) => CodecError::InvalidHrp(
            encoded
                .rfind('1')
                .map(|sep| encoded[..sep].to_ascii_lowercase())
                .unwrap_or_default(),
        ),
        _ => CodecError::InvalidLength(encoded.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G_HASH160: &str = "751e76e8199196d454941c45d1b3a323f1433bd6";
    const BIP173_P2WPKH: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    const BIP350_P2TR: &str = "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0";

    #[test]
    fn test_decode_bip173_vector() {
        let decoded = decode(BIP173_P2WPKH).unwrap();
        assert_eq!(decoded.hrp, "bc");
        assert_eq!(decoded.witness_version, 0);
        assert_eq!(hex::encode(&decoded.program), G_HASH160);
    }

    #[test]
    fn test_encode_bip173_vector() {
        let program = hex::decode(G_HASH160).unwrap();
        assert_eq!(encode("bc", 0, &program).unwrap(), BIP173_P2WPKH);
        assert_eq!(
            encode("tb", 0, &program).unwrap(),
            "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx"
        );
    }

    #[test]
    fn test_bech32m_taproot() {
        let decoded = decode(BIP350_P2TR).unwrap();
        assert_eq!(decoded.witness_version, 1);
        assert_eq!(decoded.program.len(), 32);
        assert_eq!(encode("bc", 1, &decoded.program).unwrap(), BIP350_P2TR);

        let program: Vec<u8> = (0u8..32).collect();
        assert_eq!(
            encode("bc", 1, &program).unwrap(),
            "bc1pqqqsyqcyq5rqwzqfpg9scrgwpugpzysnzs23v9ccrydpk8qarc0sg5tmnz"
        );
    }

    #[test]
    fn test_wrong_variant_is_distinct_from_bad_value() {
        // witness v1 carrying a bech32 (v0) checksum
        let result = decode("bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqh2y7hd");
        assert_eq!(
            result,
            Err(CodecError::InvalidChecksum(ChecksumFailure::WrongVariant {
                expected: Variant::Bech32m,
                found: Variant::Bech32,
            }))
        );

        // witness v0 carrying a bech32m checksum
        let result = decode("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kemeawh");
        assert_eq!(
            result,
            Err(CodecError::InvalidChecksum(ChecksumFailure::WrongVariant {
                expected: Variant::Bech32,
                found: Variant::Bech32m,
            }))
        );

        let result = decode("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t5");
        assert_eq!(
            result,
            Err(CodecError::InvalidChecksum(ChecksumFailure::BadValue))
        );
    }

    #[test]
    fn test_wrong_variant_fixture_matches_library_encoder() {
        use bitcoin::bech32::{ByteIterExt, Fe32IterExt};

        let program = hex::decode(G_HASH160).unwrap();
        let hrp = Hrp::parse("bc").unwrap();
        let mislabelled: String = program
            .iter()
            .copied()
            .bytes_to_fes()
            .with_checksum::<Bech32m>(&hrp)
            .with_witness_version(segwit::VERSION_0)
            .chars()
            .collect();
        assert_eq!(mislabelled, "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kemeawh");
    }

    #[test]
    fn test_foreign_hrp_rejected_on_decode() {
        let program = hex::decode(G_HASH160).unwrap();
        let litecoin = encode("ltc", 0, &program).unwrap();
        assert!(litecoin.starts_with("ltc1q"));
        assert_eq!(
            decode(&litecoin),
            Err(CodecError::InvalidHrp("ltc".to_string()))
        );

        let regtest = encode("bcrt", 1, &[9u8; 32]).unwrap();
        assert_eq!(
            decode(&regtest),
            Err(CodecError::InvalidHrp("bcrt".to_string()))
        );
    }

    #[test]
    fn test_matches_library_segwit_encoder() {
        let program = [0x22u8; 32];
        let theirs = segwit::encode(
            Hrp::parse("bc").unwrap(),
            segwit::VERSION_1,
            &program,
        )
        .unwrap();
        assert_eq!(encode("bc", 1, &program).unwrap(), theirs);
    }

    #[test]
    fn test_case_rules() {
        let upper = BIP173_P2WPKH.to_uppercase();
        assert_eq!(decode(&upper).unwrap().hrp, "bc");

        let mixed = "bc1qW508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
        assert_eq!(decode(mixed), Err(CodecError::MixedCase));
    }

    #[test]
    fn test_length_bounds() {
        let too_long = format!("bc1{}", "q".repeat(88));
        assert_eq!(too_long.len(), 91);
        assert_eq!(decode(&too_long), Err(CodecError::InvalidLength(91)));

        assert_eq!(decode("bc1qqqq"), Err(CodecError::InvalidLength(7)));
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(decode("qw508d6qejxtdg4y"), Err(CodecError::MissingSeparator));
        assert_eq!(
            decode("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3tb"),
            Err(CodecError::InvalidCharacter('b'))
        );
        assert_eq!(
            decode("bc1 w508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"),
            Err(CodecError::InvalidCharacter(' '))
        );
    }

    #[test]
    fn test_encode_rejects_bad_programs() {
        assert_eq!(
            encode("bc", 0, &[0u8; 21]),
            Err(CodecError::InvalidProgramLength(21))
        );
        assert_eq!(
            encode("bc", 1, &[0u8; 41]),
            Err(CodecError::InvalidProgramLength(41))
        );
        assert_eq!(
            encode("bc", 17, &[0u8; 32]),
            Err(CodecError::InvalidWitnessVersion(17))
        );
    }

    #[test]
    fn test_roundtrip() {
        for (version, len) in [(0u8, 20usize), (0, 32), (1, 32), (2, 40)] {
            let program: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_mul(29)).collect();
            for hrp in ["bc", "tb"] {
                let encoded = encode(hrp, version, &program).unwrap();
                let decoded = decode(&encoded).unwrap();
                assert_eq!(decoded.hrp, hrp);
                assert_eq!(decoded.witness_version, version);
                assert_eq!(decoded.program, program);
            }
        }
    }
}
