//! Challenge-Response Service
//!
//! ```text
//! request_challenge ──► ISSUED ──verify_challenge──► CONSUMED
//!                          │
//!                          └──── ttl elapses ──────► EXPIRED
//! ```
//!
//! Both terminal states look the same to a later verify call: the nonce is
//! gone. A failed verification does not restore it.

use std::sync::Arc;

use thiserror::Error;

use super::sources::{Clock, OsRandom, RandomSource, SystemClock};
use super::template::{build_challenge_message, format_timestamp, parse_timestamp};
use super::types::{
    AuthenticatedAddress, Challenge, ChallengeConfig, ChallengeResponse, NONCE_BYTES,
};
use crate::address::{self, AddressError, AddressFamily, DecodedAddress};
use crate::common::logging::{
    generate_correlation_id, log_challenge_issued, log_challenge_rejected, log_verification_event,
};
use crate::message::message_hash;
use crate::signature::{
    decode_base64, Signature, SignatureError, SignatureVerifier, Verification, VerificationFailure,
};
use crate::storage::{challenge_key, NonceStore, StorageError};

/// Challenge protocol errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("challenge expired or not found")]
    ChallengeExpiredOrNotFound,

    #[error("nonce does not match the issued challenge")]
    NonceMismatch,

    #[error("signature verification failed: {0}")]
    VerificationFailed(VerificationFailure),

    #[error("nonce store error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Rejected before any nonce was touched or any curve math ran
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            AuthError::Address(_) | AuthError::Signature(_) | AuthError::InvalidTimestamp(_)
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Address(AddressError::UnsupportedAddressFormat(_)) => {
                "UNSUPPORTED_ADDRESS_FORMAT"
            }
            AuthError::Address(AddressError::InvalidAddressLength { .. }) => {
                "INVALID_ADDRESS_LENGTH"
            }
            AuthError::Address(AddressError::NetworkMismatch { .. }) => "NETWORK_MISMATCH",
            AuthError::Address(_) => "INVALID_ADDRESS",
            AuthError::Signature(_) => "INVALID_SIGNATURE_ENCODING",
            AuthError::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
            AuthError::ChallengeExpiredOrNotFound => "CHALLENGE_EXPIRED_OR_NOT_FOUND",
            AuthError::NonceMismatch => "NONCE_MISMATCH",
            AuthError::VerificationFailed(_) => "VERIFICATION_FAILED",
            AuthError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

/// Issues challenges and verifies signed responses
pub struct ChallengeService {
    store: Arc<dyn NonceStore>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
    verifier: SignatureVerifier,
    config: ChallengeConfig,
}

impl ChallengeService {
    /// Service with the system clock and OS randomness
    pub fn new(store: Arc<dyn NonceStore>, config: ChallengeConfig) -> Self {
        Self::with_sources(store, Arc::new(SystemClock), Arc::new(OsRandom), config)
    }

    pub fn with_sources(
        store: Arc<dyn NonceStore>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
        config: ChallengeConfig,
    ) -> Self {
        Self {
            store,
            clock,
            random,
            verifier: SignatureVerifier::new(),
            config,
        }
    }

    pub fn config(&self) -> &ChallengeConfig {
        &self.config
    }

    /// Issue a challenge for `address`
    ///
    /// The address is fully decoded first; nothing is stored for an address
    /// that could never verify.
    pub async fn request_challenge(&self, address: &str) -> Result<ChallengeResponse, AuthError> {
        let correlation_id = generate_correlation_id();

        let target = match self.decode_address(address) {
            Ok(target) => target,
            Err(err) => {
                log_challenge_rejected(address, &err, &correlation_id);
                return Err(err);
            }
        };

        let challenge = Challenge {
            address: address.to_string(),
            nonce: hex::encode(self.random.random_bytes(NONCE_BYTES)),
            issued_at: self.clock.now(),
            ttl: self.config.ttl,
        };
        let issued_at = format_timestamp(challenge.issued_at);
        let message = build_challenge_message(
            &self.config.app_name,
            &challenge.address,
            &challenge.nonce,
            &issued_at,
        );

        if let Err(err) = self
            .store
            .put(&challenge_key(address), &challenge.nonce, challenge.ttl)
            .await
        {
            let err = AuthError::from(err);
            log_challenge_rejected(address, &err, &correlation_id);
            return Err(err);
        }

        log_challenge_issued(address, target.family, challenge.ttl, &correlation_id);

        Ok(ChallengeResponse {
            nonce: challenge.nonce,
            message,
            expires_in_seconds: u32::try_from(challenge.ttl.as_secs()).unwrap_or(u32::MAX),
            issued_at,
        })
    }

    /// Consume the challenge for `address` and verify `signature_base64`
    /// over the message rebuilt from `nonce` and `timestamp`
    pub async fn verify_challenge(
        &self,
        address: &str,
        signature_base64: &str,
        nonce: &str,
        timestamp: &str,
    ) -> Result<AuthenticatedAddress, AuthError> {
        let correlation_id = generate_correlation_id();

        let result = self
            .verify_inner(address, signature_base64, nonce, timestamp)
            .await;

        log_verification_event(
            address,
            result.as_ref().map(|auth| auth.family),
            &correlation_id,
        );
        result
    }

    async fn verify_inner(
        &self,
        address: &str,
        signature_base64: &str,
        nonce: &str,
        timestamp: &str,
    ) -> Result<AuthenticatedAddress, AuthError> {
        // Malformed input is rejected before the nonce is taken
        let target = self.decode_address(address)?;
        if parse_timestamp(timestamp).is_none() {
            return Err(AuthError::InvalidTimestamp(timestamp.chars().take(64).collect()));
        }
        let signature = parse_signature(target.family, signature_base64)?;

        let stored = self
            .store
            .take(&challenge_key(address))
            .await?
            .ok_or(AuthError::ChallengeExpiredOrNotFound)?;
        if stored != nonce {
            return Err(AuthError::NonceMismatch);
        }

        let message = build_challenge_message(&self.config.app_name, address, nonce, timestamp);
        let digest = message_hash(&message);
        let signature = signature.map_err(AuthError::VerificationFailed)?;

        match self
            .verifier
            .verify_parsed(address, &target, &digest, &signature)
        {
            Verification::Valid { .. } => Ok(AuthenticatedAddress {
                address: address.to_string(),
                family: target.family,
                network: target.network,
            }),
            Verification::Invalid(failure) => Err(AuthError::VerificationFailed(failure)),
        }
    }

    fn decode_address(&self, address: &str) -> Result<DecodedAddress, AuthError> {
        let target = address::decode(address)?;
        if let Some(expected) = self.config.network {
            if target.network != expected {
                return Err(AddressError::NetworkMismatch {
                    expected,
                    actual: target.network,
                }
                .into());
            }
        }
        Ok(target)
    }
}

/// Outer error: malformed. Inner error: well-formed but can never verify
/// (a Schnorr signature of the wrong length), which still consumes the nonce.
fn parse_signature(
    family: AddressFamily,
    signature_base64: &str,
) -> Result<Result<Signature, VerificationFailure>, SignatureError> {
    let raw = decode_base64(signature_base64)?;
    match Signature::from_bytes(family, &raw) {
        Ok(signature) => Ok(Ok(signature)),
        Err(SignatureError::InvalidLength(len)) if !family.uses_ecdsa() => {
            Ok(Err(VerificationFailure::InvalidSignatureLength(len)))
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Network;
    use crate::challenge::sources::{MockClock, MockRandomSource};
    use crate::storage::{MemoryNonceStore, MockNonceStore};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;
    use secp256k1::{Keypair, Message, Secp256k1, SecretKey};
    use std::time::Duration;

    const FIXED_NONCE: &str = "000102030405060708090a0b0c0d0e0f";
    const FIXED_TIME: &str = "2026-10-19T12:00:00Z";

    fn fixed_clock() -> Arc<MockClock> {
        let mut clock = MockClock::new();
        clock
            .expect_now()
            .returning(|| Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap());
        Arc::new(clock)
    }

    fn fixed_random() -> Arc<MockRandomSource> {
        let mut random = MockRandomSource::new();
        random
            .expect_random_bytes()
            .with(eq(NONCE_BYTES))
            .returning(|len| (0..len as u8).collect());
        Arc::new(random)
    }

    fn service_with(store: Arc<dyn NonceStore>, config: ChallengeConfig) -> ChallengeService {
        ChallengeService::with_sources(store, fixed_clock(), fixed_random(), config)
    }

    fn memory_service() -> (ChallengeService, MemoryNonceStore) {
        let store = MemoryNonceStore::new();
        let service = service_with(Arc::new(store.clone()), ChallengeConfig::default());
        (service, store)
    }

    /// Wallet-side signing for tests: `(address, signature_base64)` per family
    fn sign(family: AddressFamily, network: Network, message: &str) -> (String, String) {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[0x21u8; 32]).unwrap();
        let digest = Message::from_digest(message_hash(message).to_bytes());

        match family {
            AddressFamily::P2TR => {
                let keypair = Keypair::from_secret_key(&secp, &secret);
                let (xonly, _) = keypair.x_only_public_key();
                let address =
                    crate::codec::bech32::encode(network.hrp(), 1, &xonly.serialize()).unwrap();
                let sig = secp.sign_schnorr_no_aux_rand(&digest, &keypair);
                (address, STANDARD.encode(&sig[..]))
            }
            _ => {
                let public = secret.public_key(&secp);
                let address =
                    address::derive_address(family, network, &public.serialize()).unwrap();
                let (recovery_id, compact) =
                    secp.sign_ecdsa_recoverable(&digest, &secret).serialize_compact();
                let mut raw = vec![31 + recovery_id.to_i32() as u8];
                raw.extend_from_slice(&compact);
                (address, STANDARD.encode(&raw))
            }
        }
    }

    fn address_for(family: AddressFamily) -> String {
        sign(family, Network::Mainnet, "").0
    }

    fn expected_message(address: &str) -> String {
        build_challenge_message("btcauth", address, FIXED_NONCE, FIXED_TIME)
    }

    #[tokio::test]
    async fn test_request_challenge_deterministic() {
        let (service, store) = memory_service();
        let address = address_for(AddressFamily::P2WPKH);

        let response = service.request_challenge(&address).await.unwrap();
        assert_eq!(response.nonce, FIXED_NONCE);
        assert_eq!(response.issued_at, FIXED_TIME);
        assert_eq!(response.expires_in_seconds, 300);
        assert_eq!(response.message, expected_message(&address));

        assert_eq!(
            store.take(&challenge_key(&address)).await.unwrap(),
            Some(FIXED_NONCE.to_string())
        );
    }

    #[tokio::test]
    async fn test_full_flow_every_family() {
        for family in [AddressFamily::P2PKH, AddressFamily::P2WPKH, AddressFamily::P2TR] {
            let (service, _) = memory_service();
            let address = address_for(family);

            let challenge = service.request_challenge(&address).await.unwrap();
            let (signed_for, signature) = sign(family, Network::Mainnet, &challenge.message);
            assert_eq!(signed_for, address);

            let authenticated = service
                .verify_challenge(&address, &signature, &challenge.nonce, &challenge.issued_at)
                .await
                .unwrap();
            assert_eq!(authenticated.address, address);
            assert_eq!(authenticated.family, family);
            assert_eq!(authenticated.network, Network::Mainnet);
        }
    }

    #[tokio::test]
    async fn test_nonce_single_use() {
        let (service, _) = memory_service();
        let address = address_for(AddressFamily::P2PKH);
        let challenge = service.request_challenge(&address).await.unwrap();
        let (_, signature) = sign(AddressFamily::P2PKH, Network::Mainnet, &challenge.message);

        service
            .verify_challenge(&address, &signature, &challenge.nonce, &challenge.issued_at)
            .await
            .unwrap();

        let replay = service
            .verify_challenge(&address, &signature, &challenge.nonce, &challenge.issued_at)
            .await;
        assert!(matches!(replay, Err(AuthError::ChallengeExpiredOrNotFound)));
    }

    #[tokio::test]
    async fn test_never_issued() {
        let (service, _) = memory_service();
        let address = address_for(AddressFamily::P2PKH);
        let (_, signature) = sign(AddressFamily::P2PKH, Network::Mainnet, "anything");

        let result = service
            .verify_challenge(&address, &signature, FIXED_NONCE, FIXED_TIME)
            .await;
        assert!(matches!(result, Err(AuthError::ChallengeExpiredOrNotFound)));
    }

    #[tokio::test]
    async fn test_nonce_mismatch_consumes_challenge() {
        let (service, store) = memory_service();
        let address = address_for(AddressFamily::P2WPKH);
        let challenge = service.request_challenge(&address).await.unwrap();
        let (_, signature) = sign(AddressFamily::P2WPKH, Network::Mainnet, &challenge.message);

        let result = service
            .verify_challenge(&address, &signature, &"ff".repeat(16), &challenge.issued_at)
            .await;
        assert!(matches!(result, Err(AuthError::NonceMismatch)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_bad_signature_is_terminal() {
        let (service, _) = memory_service();
        let address = address_for(AddressFamily::P2PKH);
        let challenge = service.request_challenge(&address).await.unwrap();
        let (_, wrong) = sign(AddressFamily::P2PKH, Network::Mainnet, "some other text");
        let (_, right) = sign(AddressFamily::P2PKH, Network::Mainnet, &challenge.message);

        let first = service
            .verify_challenge(&address, &wrong, &challenge.nonce, &challenge.issued_at)
            .await;
        assert!(matches!(
            first,
            Err(AuthError::VerificationFailed(VerificationFailure::AddressMismatch { .. }))
        ));

        let retry = service
            .verify_challenge(&address, &right, &challenge.nonce, &challenge.issued_at)
            .await;
        assert!(matches!(retry, Err(AuthError::ChallengeExpiredOrNotFound)));
    }

    #[tokio::test]
    async fn test_tampered_timestamp_fails_verification() {
        let (service, _) = memory_service();
        let address = address_for(AddressFamily::P2TR);
        let challenge = service.request_challenge(&address).await.unwrap();
        let (_, signature) = sign(AddressFamily::P2TR, Network::Mainnet, &challenge.message);

        let result = service
            .verify_challenge(&address, &signature, &challenge.nonce, "2026-10-19T12:00:01Z")
            .await;
        assert!(matches!(
            result,
            Err(AuthError::VerificationFailed(VerificationFailure::SchnorrCheckFailed))
        ));
    }

    #[tokio::test]
    async fn test_malformed_input_keeps_challenge() {
        let (service, store) = memory_service();
        let address = address_for(AddressFamily::P2PKH);
        service.request_challenge(&address).await.unwrap();

        let bad_base64 = service
            .verify_challenge(&address, "%%%", FIXED_NONCE, FIXED_TIME)
            .await
            .unwrap_err();
        assert!(bad_base64.is_malformed_input());

        let bad_flag = STANDARD.encode([26u8; 65]);
        let result = service
            .verify_challenge(&address, &bad_flag, FIXED_NONCE, FIXED_TIME)
            .await;
        assert!(matches!(
            result,
            Err(AuthError::Signature(SignatureError::InvalidFlagByte(26)))
        ));

        let bad_time = service
            .verify_challenge(&address, &STANDARD.encode([31u8; 65]), FIXED_NONCE, "noon")
            .await;
        assert!(matches!(bad_time, Err(AuthError::InvalidTimestamp(_))));

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_short_schnorr_signature_consumes_challenge() {
        let (service, store) = memory_service();
        let address = address_for(AddressFamily::P2TR);
        service.request_challenge(&address).await.unwrap();

        let result = service
            .verify_challenge(&address, &STANDARD.encode([1u8; 63]), FIXED_NONCE, FIXED_TIME)
            .await;
        assert!(matches!(
            result,
            Err(AuthError::VerificationFailed(
                VerificationFailure::InvalidSignatureLength(63)
            ))
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unsupported_address_stores_nothing() {
        let mut store = MockNonceStore::new();
        store.expect_put().never();
        let service = service_with(Arc::new(store), ChallengeConfig::default());

        let result = service
            .request_challenge("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy")
            .await;
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Address(AddressError::UnsupportedAddressFormat(_))
        ));
        assert_eq!(err.error_code(), "UNSUPPORTED_ADDRESS_FORMAT");
        assert!(err.is_malformed_input());
    }

    #[tokio::test]
    async fn test_store_receives_namespaced_key_and_ttl() {
        let address = address_for(AddressFamily::P2PKH);
        let key = challenge_key(&address);

        let mut store = MockNonceStore::new();
        store
            .expect_put()
            .withf(move |k, v, ttl| k == key && v == FIXED_NONCE && *ttl == Duration::from_secs(60))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let config = ChallengeConfig {
            ttl: Duration::from_secs(60),
            ..ChallengeConfig::default()
        };
        let service = service_with(Arc::new(store), config);
        let response = service.request_challenge(&address).await.unwrap();
        assert_eq!(response.expires_in_seconds, 60);
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces() {
        let mut store = MockNonceStore::new();
        store
            .expect_take()
            .returning(|_| Err(StorageError::Connection("down".to_string())));
        let service = service_with(Arc::new(store), ChallengeConfig::default());

        let address = address_for(AddressFamily::P2PKH);
        let (_, signature) = sign(AddressFamily::P2PKH, Network::Mainnet, "x");
        let err = service
            .verify_challenge(&address, &signature, FIXED_NONCE, FIXED_TIME)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
        assert!(!err.is_malformed_input());
    }

    #[tokio::test]
    async fn test_network_policy() {
        let store = MemoryNonceStore::new();
        let config = ChallengeConfig {
            network: Some(Network::Testnet),
            ..ChallengeConfig::default()
        };
        let service = service_with(Arc::new(store.clone()), config);

        let mainnet = address_for(AddressFamily::P2WPKH);
        let err = service.request_challenge(&mainnet).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Address(AddressError::NetworkMismatch {
                expected: Network::Testnet,
                actual: Network::Mainnet
            })
        ));
        assert!(store.is_empty().await);

        let (testnet, _) = sign(AddressFamily::P2WPKH, Network::Testnet, "");
        let challenge = service.request_challenge(&testnet).await.unwrap();
        let (_, signature) = sign(AddressFamily::P2WPKH, Network::Testnet, &challenge.message);
        let authenticated = service
            .verify_challenge(&testnet, &signature, &challenge.nonce, &challenge.issued_at)
            .await
            .unwrap();
        assert_eq!(authenticated.network, Network::Testnet);
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_nonce() {
        let store = MemoryNonceStore::new();
        let mut random = MockRandomSource::new();
        let mut counter = 0u8;
        random.expect_random_bytes().returning(move |len| {
            counter += 1;
            vec![counter; len]
        });
        let service = ChallengeService::with_sources(
            Arc::new(store),
            fixed_clock(),
            Arc::new(random),
            ChallengeConfig::default(),
        );

        let address = address_for(AddressFamily::P2PKH);
        let first = service.request_challenge(&address).await.unwrap();
        let second = service.request_challenge(&address).await.unwrap();
        assert_ne!(first.nonce, second.nonce);

        let (_, signature) = sign(AddressFamily::P2PKH, Network::Mainnet, &first.message);
        let result = service
            .verify_challenge(&address, &signature, &first.nonce, &first.issued_at)
            .await;
        assert!(matches!(result, Err(AuthError::NonceMismatch)));
    }
}
