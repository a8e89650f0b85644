//! Bitcoin Signed Message Hash
//!
//! `sha256d(0x18 || "Bitcoin Signed Message:\n" || compact_size(len) || message)`
//!
//! Wallet and verifier must agree on this bit-for-bit; any deviation shows up
//! only as every signature failing to verify.

use std::fmt;

use sha2::{Digest, Sha256};

/// Length-prefixed magic, the leading 0x18 is the length of the text that follows
pub const SIGNED_MESSAGE_MAGIC: &[u8] = b"\x18Bitcoin Signed Message:\n";

/// 32-byte double-SHA256 digest of a signed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageDigest([u8; 32]);

impl MessageDigest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for MessageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash `text` the way Bitcoin wallets do for `signmessage`
pub fn message_hash(text: &str) -> MessageDigest {
    let bytes = text.as_bytes();

    let mut preimage = Vec::with_capacity(SIGNED_MESSAGE_MAGIC.len() + 9 + bytes.len());
    preimage.extend_from_slice(SIGNED_MESSAGE_MAGIC);
    write_compact_size(&mut preimage, bytes.len() as u64);
    preimage.extend_from_slice(bytes);

    let first = Sha256::digest(&preimage);
    MessageDigest(Sha256::digest(first).into())
}

/// Append Bitcoin's CompactSize encoding of `n`
pub fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}
