use std::collections::BTreeMap;

use thiserror::Error;

use crate::streaming::TransferError;
use crate::validation::ValidationError;

/// Patterns (lowercase) that indicate credential material in server-supplied text.
/// Used by `contains_sensitive()` for case-insensitive matching.
pub(crate) const SENSITIVE_PATTERNS: &[&str] = &["x-api-key", "api_key", "apikey", "authorization:"];

/// Returns true if the message contains any sensitive pattern (case-insensitive).
fn contains_sensitive(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Sanitizes server-supplied text before it is stored in an error or logged.
/// If sensitive content is detected, returns the fallback instead.
pub(crate) fn sanitize_message(msg: &str, fallback: &str) -> String {
    if contains_sensitive(msg) {
        fallback.into()
    } else {
        msg.to_string()
    }
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum ClientError {
    // ── Auth ──────────────────────────────────────────────────────────────────
    #[error("API key is unauthorized")]
    Unauthorized,

    // ── Local preconditions ───────────────────────────────────────────────────
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // ── API ───────────────────────────────────────────────────────────────────
    #[error("Service error {code}: {message}")]
    Service {
        code: i64,
        message: String,
        issues: BTreeMap<String, Vec<String>>,
    },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    // ── Transfer ──────────────────────────────────────────────────────────────
    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    // ── Network ───────────────────────────────────────────────────────────────
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // ── Dispatch ──────────────────────────────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Job {index} panicked")]
    JobPanicked { index: usize },

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Authentication failures abort the calling operation and are never
    /// retried with the same credential.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }

    /// Errors raised locally before any network I/O; fixing the input fixes them.
    pub fn is_recoverable_by_caller(&self) -> bool {
        matches!(self, ClientError::Validation(_) | ClientError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns one instance of every variant for exhaustive checks.
    fn all_variants() -> Vec<ClientError> {
        vec![
            ClientError::Unauthorized,
            ClientError::Validation(ValidationError::MissingGeometry {
                candidates: vec!["Wkt", "GeoJson"],
            }),
            ClientError::Config("chunk size".into()),
            ClientError::Service {
                code: 400,
                message: "Invalid date".into(),
                issues: BTreeMap::new(),
            },
            ClientError::InvalidResponse("missing Data".into()),
            ClientError::Transfer(TransferError::Cancelled),
            ClientError::ConnectionFailed("timeout".into()),
            ClientError::Cancelled,
            ClientError::JobPanicked { index: 3 },
            ClientError::Internal("something broke".into()),
        ]
    }

    #[test]
    fn all_variants_have_nonempty_display() {
        for variant in all_variants() {
            let text = variant.to_string();
            assert!(!text.trim().is_empty(), "Empty display for {:?}", variant);
        }
    }

    #[test]
    fn only_unauthorized_is_fatal() {
        for variant in all_variants() {
            let expected = matches!(variant, ClientError::Unauthorized);
            assert_eq!(variant.is_fatal(), expected, "is_fatal for {:?}", variant);
        }
    }

    #[test]
    fn validation_is_recoverable_by_caller() {
        let err: ClientError = ValidationError::AmbiguousGeometry {
            provided: vec!["Wkt", "GeoJson"],
        }
        .into();
        assert!(err.is_recoverable_by_caller());
        assert!(!ClientError::Unauthorized.is_recoverable_by_caller());
        assert!(!ClientError::ConnectionFailed("x".into()).is_recoverable_by_caller());
    }

    #[test]
    fn sanitize_message_replaces_credential_text() {
        assert_eq!(
            sanitize_message("rejected X-API-KEY abc123", "redacted"),
            "redacted"
        );
        assert_eq!(sanitize_message("Invalid date", "redacted"), "Invalid date");
    }

    #[test]
    fn service_error_display_includes_code_and_message() {
        let err = ClientError::Service {
            code: 402,
            message: "Insufficient credits".into(),
            issues: BTreeMap::new(),
        };
        let text = err.to_string();
        assert!(text.contains("402"));
        assert!(text.contains("Insufficient credits"));
    }
}
