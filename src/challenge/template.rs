//! Challenge message template
//!
//! Issuance and verification must produce byte-identical text from the same
//! `(address, nonce, timestamp)` triple, so the timestamp is carried as the
//! exact string that was embedded, never re-formatted.

use chrono::{DateTime, SecondsFormat, Utc};

pub fn build_challenge_message(app_name: &str, address: &str, nonce: &str, issued_at: &str) -> String {
    format!(
        "{} wants you to sign in with your Bitcoin account:\n{}\n\nNonce: {}\nIssued At: {}",
        app_name, address, nonce, issued_at
    )
}

/// RFC3339, UTC, whole seconds (`2026-10-19T12:00:00Z`)
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
