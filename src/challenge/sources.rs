//! Clock and randomness, injected so the protocol can be driven deterministically in tests

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Cryptographically secure random bytes
#[cfg_attr(test, mockall::automock)]
pub trait RandomSource: Send + Sync {
    fn random_bytes(&self, len: usize) -> Vec<u8>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_random_length_and_variety() {
        let a = OsRandom.random_bytes(16);
        let b = OsRandom.random_bytes(16);
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
        assert!(OsRandom.random_bytes(0).is_empty());
    }

    #[test]
    fn test_system_clock_is_current() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
