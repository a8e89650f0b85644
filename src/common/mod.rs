//! Common Infrastructure Module
//!
//! Shared utilities and configuration for btcauth.
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{AuthConfig, ConfigError, NonceStoreKind};
pub use error::{BtcAuthError, Result};
pub use logging::{
    challenge_rejected_event, generate_correlation_id, init_from_config, init_logging,
    log_challenge_issued, log_challenge_rejected, log_security_event, log_verification_event,
    ErrorDetails, EventCategory, LogEvent, LogLevel, LoggingError,
};
