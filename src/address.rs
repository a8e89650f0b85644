//! Bitcoin Address Model
//!
//! Classifies an address string into one of the three supported families and
//! decodes it into its payload:
//!
//! | Family | Prefix | Encoding | Payload |
//! |--------|--------|----------|---------|
//! | P2PKH  | `1` (mainnet), `m`/`n` (testnet) | Base58Check | 20-byte hash160 |
//! | P2WPKH | `bc1q` / `tb1q` | Bech32, witness v0 | 20-byte hash160 |
//! | P2TR   | `bc1p` / `tb1p` | Bech32m, witness v1 | 32-byte x-only key |
//!
//! Everything else (P2SH `3...`/`2...`, P2WSH, uppercase bech32) is rejected
//! as an unsupported format.

use std::fmt;
use std::str::FromStr;

use bitcoin::hashes::{hash160, Hash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{base58, bech32, CodecError};

/// Base58Check version bytes for P2PKH
const P2PKH_MAINNET_VERSION: u8 = 0x00;
const P2PKH_TESTNET_VERSION: u8 = 0x6f;

const HASH160_LEN: usize = 20;
const XONLY_KEY_LEN: usize = 32;

// ============================================================================
// Types
// ============================================================================

/// Address family; selects both the codec and the signature algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    P2PKH,
    P2WPKH,
    P2TR,
}

impl AddressFamily {
    /// Accepted string length range (inclusive), checked before decoding
    pub fn length_bounds(&self) -> (usize, usize) {
        match self {
            AddressFamily::P2PKH => (25, 34),
            AddressFamily::P2WPKH => (42, 62),
            AddressFamily::P2TR => (62, 62),
        }
    }

    /// Payload size carried by this family
    pub fn payload_len(&self) -> usize {
        match self {
            AddressFamily::P2PKH | AddressFamily::P2WPKH => HASH160_LEN,
            AddressFamily::P2TR => XONLY_KEY_LEN,
        }
    }

    /// Whether signatures for this family are recoverable ECDSA (vs. Schnorr)
    pub fn uses_ecdsa(&self) -> bool {
        !matches!(self, AddressFamily::P2TR)
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::P2PKH => write!(f, "P2PKH"),
            AddressFamily::P2WPKH => write!(f, "P2WPKH"),
            AddressFamily::P2TR => write!(f, "P2TR"),
        }
    }
}

/// Bitcoin network; only affects prefixes, never the signature math
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Segwit human-readable part
    pub fn hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "bc",
            Network::Testnet => "tb",
        }
    }

    pub fn from_hrp(hrp: &str) -> Option<Self> {
        match hrp {
            "bc" => Some(Network::Mainnet),
            "tb" => Some(Network::Testnet),
            _ => None,
        }
    }

    /// Base58Check version byte for P2PKH
    pub fn p2pkh_version(&self) -> u8 {
        match self {
            Network::Mainnet => P2PKH_MAINNET_VERSION,
            Network::Testnet => P2PKH_TESTNET_VERSION,
        }
    }

    fn from_p2pkh_version(version: u8) -> Option<Self> {
        match version {
            P2PKH_MAINNET_VERSION => Some(Network::Mainnet),
            P2PKH_TESTNET_VERSION => Some(Network::Testnet),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            other => Err(AddressError::UnknownNetwork(other.to_string())),
        }
    }
}

/// A fully decoded address. Lives for the duration of one verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub family: AddressFamily,
    pub network: Network,
    /// hash160 (P2PKH, P2WPKH) or x-only public key (P2TR)
    pub payload: Vec<u8>,
}

impl DecodedAddress {
    /// Re-encode to the canonical address string
    pub fn encode(&self) -> Result<String, AddressError> {
        match self.family {
            AddressFamily::P2PKH => Ok(base58::encode(&self.payload, self.network.p2pkh_version())),
            AddressFamily::P2WPKH => Ok(bech32::encode(self.network.hrp(), 0, &self.payload)?),
            AddressFamily::P2TR => Ok(bech32::encode(self.network.hrp(), 1, &self.payload)?),
        }
    }
}

/// Address errors (malformed-input tier)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("unsupported address format: {0}")]
    UnsupportedAddressFormat(String),

    #[error("invalid {family} address length: {length} (expected {min}..={max})")]
    InvalidAddressLength {
        family: AddressFamily,
        length: usize,
        min: usize,
        max: usize,
    },

    #[error("address encoding: {0}")]
    Codec(#[from] CodecError),

    #[error("wrong witness version: expected {expected}, got {actual}")]
    WrongWitnessVersion { expected: u8, actual: u8 },

    #[error("unexpected base58 version byte: 0x{0:02x}")]
    UnexpectedVersionByte(u8),

    #[error("invalid {family} payload length: {actual} (expected {expected})")]
    InvalidPayloadLength {
        family: AddressFamily,
        expected: usize,
        actual: usize,
    },

    #[error("address is for {actual}, expected {expected}")]
    NetworkMismatch { expected: Network, actual: Network },

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("cannot derive a {0} address from a public key")]
    NotDerivable(AddressFamily),
}

// ============================================================================
// Classification / validation / decoding
// ============================================================================

/// Classify by literal prefix
pub fn classify(address: &str) -> Result<AddressFamily, AddressError> {
    match address.as_bytes() {
        [b'b', b'c', b'1', b'q', ..] | [b't', b'b', b'1', b'q', ..] => Ok(AddressFamily::P2WPKH),
        [b'b', b'c', b'1', b'p', ..] | [b't', b'b', b'1', b'p', ..] => Ok(AddressFamily::P2TR),
        [b'1', ..] | [b'm', ..] | [b'n', ..] => Ok(AddressFamily::P2PKH),
        _ => Err(AddressError::UnsupportedAddressFormat(truncate(address))),
    }
}

/// Classify and apply the family's length bounds
pub fn validate(address: &str) -> Result<AddressFamily, AddressError> {
    let family = classify(address)?;
    let (min, max) = family.length_bounds();
    let length = address.len();
    if length < min || length > max {
        return Err(AddressError::InvalidAddressLength {
            family,
            length,
            min,
            max,
        });
    }
    Ok(family)
}

/// Validate and decode into family, network and payload
pub fn decode(address: &str) -> Result<DecodedAddress, AddressError> {
    let family = validate(address)?;

    let (network, payload) = match family {
        AddressFamily::P2PKH => {
            let (version, payload) = base58::decode(address)?;
            let network = Network::from_p2pkh_version(version)
                .ok_or(AddressError::UnexpectedVersionByte(version))?;
            (network, payload)
        }
        AddressFamily::P2WPKH => decode_witness(address, 0)?,
        AddressFamily::P2TR => decode_witness(address, 1)?,
    };

    let expected = family.payload_len();
    if payload.len() != expected {
        return Err(AddressError::InvalidPayloadLength {
            family,
            expected,
            actual: payload.len(),
        });
    }

    Ok(DecodedAddress {
        family,
        network,
        payload,
    })
}

fn decode_witness(address: &str, expected_version: u8) -> Result<(Network, Vec<u8>), AddressError> {
    let decoded = bech32::decode(address)?;
    let network = Network::from_hrp(&decoded.hrp).ok_or(CodecError::InvalidHrp(decoded.hrp))?;
    if decoded.witness_version != expected_version {
        return Err(AddressError::WrongWitnessVersion {
            expected: expected_version,
            actual: decoded.witness_version,
        });
    }
    Ok((network, decoded.program))
}

/// Derive the address of `family` on `network` for a serialized secp256k1
/// public key (33-byte compressed or 65-byte uncompressed).
pub fn derive_address(
    family: AddressFamily,
    network: Network,
    public_key: &[u8],
) -> Result<String, AddressError> {
    let key_hash = hash160::Hash::hash(public_key).to_byte_array();
    match family {
        AddressFamily::P2PKH => Ok(base58::encode(&key_hash, network.p2pkh_version())),
        AddressFamily::P2WPKH => Ok(bech32::encode(network.hrp(), 0, &key_hash)?),
        AddressFamily::P2TR => Err(AddressError::NotDerivable(family)),
    }
}

/// Keep error payloads bounded when echoing client input
fn truncate(address: &str) -> String {
    address.chars().take(16).collect()
}
