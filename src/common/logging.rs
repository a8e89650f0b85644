//! Structured Logging for btcauth
//!
//! Provides structured logging with:
//! - JSON output for log aggregation services
//! - Correlation IDs tying a challenge request to its verification
//! - Security events for malformed or hostile input
//!
//! Addresses are logged. Nonces and signatures never are.
//!
//! # Usage
//!
//! ```rust,no_run
//! use btcauth::common::logging::{init_logging, LogLevel};
//!
//! // Initialize at startup
//! init_logging(LogLevel::Info, true).unwrap(); // JSON mode for production
//!
//! // Log events
//! tracing::info!(target: "btcauth::challenge", "issuing challenge");
//! ```

use serde::Serialize;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::config::AuthConfig;
use crate::address::AddressFamily;
use crate::challenge::AuthError;

// ============================================================================
// Log Levels
// ============================================================================

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Challenge issuance
    Challenge,
    /// Signature verification outcomes
    Verification,
    /// Malformed input, replay attempts
    Security,
    /// Startup, maintenance
    System,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (RFC 3339)
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    /// Human-readable message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional structured data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// Error details for error events
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.as_str().to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

// ============================================================================
// Event Helpers
// ============================================================================

/// Log a security-related event
pub fn log_security_event(
    event_type: &str,
    success: bool,
    details: serde_json::Value,
    correlation_id: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Warn };
    let mut event = LogEvent::new(level, EventCategory::Security, event_type).with_data(
        serde_json::json!({
            "success": success,
            "details": details
        }),
    );

    if let Some(id) = correlation_id {
        event = event.with_correlation_id(id);
    }

    if success {
        tracing::info!(target: "btcauth::security", "{}", event.to_json());
    } else {
        tracing::warn!(target: "btcauth::security", "{}", event.to_json());
    }
}

/// Log an issued challenge
pub fn log_challenge_issued(
    address: &str,
    family: AddressFamily,
    ttl: Duration,
    correlation_id: &str,
) {
    let event = LogEvent::new(LogLevel::Info, EventCategory::Challenge, "challenge_issued")
        .with_correlation_id(correlation_id)
        .with_data(serde_json::json!({
            "address": address,
            "family": family.to_string(),
            "ttl_secs": ttl.as_secs()
        }));

    tracing::info!(target: "btcauth::challenge", "{}", event.to_json());
}

/// Event for a challenge request refused before a nonce was stored
pub fn challenge_rejected_event(address: &str, err: &AuthError, correlation_id: &str) -> LogEvent {
    LogEvent::new(LogLevel::Warn, EventCategory::Challenge, "challenge_rejected")
        .with_correlation_id(correlation_id)
        .with_data(serde_json::json!({
            "address": address,
            "malformed_input": err.is_malformed_input()
        }))
        .with_error(err.error_code(), err.to_string())
}

/// Log a refused challenge request
pub fn log_challenge_rejected(address: &str, err: &AuthError, correlation_id: &str) {
    let event = challenge_rejected_event(address, err, correlation_id);
    tracing::warn!(target: "btcauth::challenge", "{}", event.to_json());
}

/// Log the outcome of a verification attempt
///
/// Malformed input goes to the security target; everything else to verify.
pub fn log_verification_event(
    address: &str,
    outcome: Result<AddressFamily, &AuthError>,
    correlation_id: &str,
) {
    match outcome {
        Ok(family) => {
            let event = LogEvent::new(LogLevel::Info, EventCategory::Verification, "verified")
                .with_correlation_id(correlation_id)
                .with_data(serde_json::json!({
                    "address": address,
                    "family": family.to_string()
                }));
            tracing::info!(target: "btcauth::verify", "{}", event.to_json());
        }
        Err(err) if err.is_malformed_input() => {
            log_security_event(
                "malformed_input",
                false,
                serde_json::json!({
                    "address": address,
                    "code": err.error_code(),
                    "reason": err.to_string()
                }),
                Some(correlation_id),
            );
        }
        Err(err) => {
            let event =
                LogEvent::new(LogLevel::Warn, EventCategory::Verification, "verification_failed")
                    .with_correlation_id(correlation_id)
                    .with_data(serde_json::json!({ "address": address }))
                    .with_error(err.error_code(), err.to_string());
            tracing::warn!(target: "btcauth::verify", "{}", event.to_json());
        }
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// # Arguments
/// * `level` - Minimum log level to output
/// * `json_format` - Use JSON format (recommended for production)
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("btcauth={}", level.as_str())));

    if json_format {
        // JSON format for production
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );

        subscriber
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        // Pretty format for development
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );

        subscriber
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from AuthConfig
pub fn init_from_config(config: &AuthConfig) -> Result<(), LoggingError> {
    init_logging(LogLevel::from(config.log_level.as_str()), config.log_json)
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

// ============================================================================
// Correlation IDs
// ============================================================================

/// Generate a unique correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis() as u64;
    format!("{:x}-{:08x}", millis & 0xFFFF_FFFF, rand::random::<u32>())
}
