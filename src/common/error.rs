//! Common Error Types for btcauth
//!
//! Provides unified error handling across all modules.

use thiserror::Error;

use crate::address::AddressError;
use crate::challenge::AuthError;
use crate::codec::CodecError;
use crate::signature::{SignatureError, VerifyError};
use crate::storage::StorageError;

/// Root error type for btcauth
#[derive(Debug, Error)]
pub enum BtcAuthError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Base58Check / Bech32 decoding errors
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("address error: {0}")]
    Address(#[from] AddressError),

    /// Signature envelope errors
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    /// Challenge protocol errors
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<VerifyError> for BtcAuthError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Address(e) => BtcAuthError::Address(e),
            VerifyError::Signature(e) => BtcAuthError::Signature(e),
        }
    }
}

impl BtcAuthError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BtcAuthError::Storage(_) | BtcAuthError::Auth(AuthError::Storage(_)) | BtcAuthError::Io(_)
        )
    }

    /// Get error code for logs and API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            BtcAuthError::Config(_) => "CONFIG_ERROR",
            BtcAuthError::Logging(_) => "LOGGING_ERROR",
            BtcAuthError::Codec(_) => "CODEC_ERROR",
            BtcAuthError::Address(_) => "INVALID_ADDRESS",
            BtcAuthError::Signature(_) => "INVALID_SIGNATURE_ENCODING",
            BtcAuthError::Auth(e) => e.error_code(),
            BtcAuthError::Storage(_) => "STORAGE_ERROR",
            BtcAuthError::Validation(_) => "VALIDATION_ERROR",
            BtcAuthError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using BtcAuthError
pub type Result<T> = std::result::Result<T, BtcAuthError>;
