//! Error taxonomy shared by the payload builder and the settlement poller.
//!
//! Every failure carries structured context (field names, HTTP status,
//! Bakong application codes) so callers can branch on it without parsing
//! messages.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, KhqrError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KhqrError {
    /// Bad or oversized input to an encoder, or a malformed request argument.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The assembled payload failed its own checksum self-check.
    #[error("checksum mismatch: expected {expected}, found {actual}")]
    Checksum { expected: String, actual: String },

    /// Network-level failure talking to the settlement API.
    #[error("transport failure{}: {message}", timeout_suffix(.timeout))]
    Transport { message: String, timeout: bool },

    /// Credential missing, invalid, expired, or refused.
    #[error("authorization failed{}: {message}", http_suffix(.status))]
    Auth { status: Option<u16>, message: String },

    /// The settlement API answered with something we cannot interpret.
    #[error("malformed settlement response{}: {detail}", http_suffix(.status))]
    Protocol { status: Option<u16>, detail: String },

    /// Remote throttling.
    #[error("settlement API rate limited (HTTP {status})")]
    RateLimited { status: u16 },

    /// Remote server-side failure (5xx).
    #[error("settlement API unavailable (HTTP {status}{})", code_suffix(.error_code))]
    Upstream { status: u16, error_code: Option<i64> },

    /// Configuration file missing or unreadable.
    #[error("configuration error: {0}")]
    Config(String),
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

fn code_suffix(error_code: &Option<i64>) -> String {
    error_code
        .map(|c| format!(", errorCode {c}"))
        .unwrap_or_default()
}

fn timeout_suffix(timeout: &bool) -> &'static str {
    if *timeout {
        " (timeout)"
    } else {
        ""
    }
}

impl KhqrError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        KhqrError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the polling loop may absorb this error and try again on the
    /// next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KhqrError::Transport { .. }
                | KhqrError::Protocol { .. }
                | KhqrError::RateLimited { .. }
                | KhqrError::Upstream { .. }
        )
    }

    /// HTTP status attached to the error, when the failure came from a response.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            KhqrError::Auth { status, .. } | KhqrError::Protocol { status, .. } => *status,
            KhqrError::RateLimited { status } | KhqrError::Upstream { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(KhqrError::Transport {
            message: "refused".into(),
            timeout: false
        }
        .is_retryable());
        assert!(KhqrError::RateLimited { status: 429 }.is_retryable());
        assert!(KhqrError::Upstream {
            status: 503,
            error_code: None
        }
        .is_retryable());
        assert!(KhqrError::Protocol {
            status: None,
            detail: "not json".into()
        }
        .is_retryable());
        assert!(!KhqrError::Auth {
            status: Some(401),
            message: "expired".into()
        }
        .is_retryable());
        assert!(!KhqrError::validation("amount", "negative").is_retryable());
    }

    #[test]
    fn test_display_carries_context() {
        let err = KhqrError::Auth {
            status: Some(403),
            message: "IP not allowed".into(),
        };
        assert_eq!(
            err.to_string(),
            "authorization failed (HTTP 403): IP not allowed"
        );
        let err = KhqrError::Upstream {
            status: 500,
            error_code: Some(7),
        };
        assert_eq!(
            err.to_string(),
            "settlement API unavailable (HTTP 500, errorCode 7)"
        );
        let err = KhqrError::Transport {
            message: "connect refused".into(),
            timeout: false,
        };
        assert_eq!(err.to_string(), "transport failure: connect refused");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(KhqrError::RateLimited { status: 429 }.http_status(), Some(429));
        assert_eq!(
            KhqrError::validation("merchant_name", "missing").http_status(),
            None
        );
    }
}
