//! Error types for tfretry

use std::fmt;
use std::time::Duration;

/// Structured, non-retryable failure reported by the remote system
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct RemoteError {
    pub status: Option<u16>,
    pub error_code: Option<String>,
    pub detail: String,
}

impl RemoteError {
    pub fn new(status: u16, error_code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            error_code: Some(error_code.into()),
            detail: detail.into(),
        }
    }

    /// A failure with no HTTP status or remote error code attached
    pub fn unclassified(detail: impl Into<String>) -> Self {
        Self {
            status: None,
            error_code: None,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.status, &self.error_code) {
            (Some(status), Some(code)) => write!(f, "HTTP {} {}: {}", status, code, self.detail),
            (Some(status), None) => write!(f, "HTTP {}: {}", status, self.detail),
            (None, Some(code)) => write!(f, "{}: {}", code, self.detail),
            (None, None) => f.write_str(&self.detail),
        }
    }
}

/// Failure returned by a refresh function
///
/// Only `Remote` stops the poller. Every other variant is retried until the
/// poll timeout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("remote object not found")]
    NotFound,

    #[error("service unavailable")]
    Unavailable,

    #[error("connection reset by peer")]
    ConnectionReset,

    #[error(transparent)]
    Remote(RemoteError),

    #[error("{0}")]
    Transient(String),
}

impl RefreshError {
    pub fn transient(message: impl fmt::Display) -> Self {
        RefreshError::Transient(message.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, RefreshError::Remote(_))
    }

    /// Converts any refresh failure into a non-retryable one
    pub fn into_fatal(self) -> RemoteError {
        match self {
            RefreshError::Remote(err) => err,
            RefreshError::NotFound => RemoteError {
                status: Some(404),
                error_code: None,
                detail: "remote object not found".to_string(),
            },
            RefreshError::Unavailable => RemoteError {
                status: Some(503),
                error_code: None,
                detail: "service unavailable".to_string(),
            },
            other => RemoteError::unclassified(other.to_string()),
        }
    }
}

/// Error type for poll operations
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(
        "timeout while waiting for state to become target (last state: {}, timeout: {timeout:?}){}",
        state_or_none(.last_state),
        error_suffix(.last_error)
    )]
    Timeout {
        timeout: Duration,
        last_state: Option<String>,
        last_error: Option<String>,
    },

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("{}", cancel_reason(.deadline_exceeded))]
    Cancelled { deadline_exceeded: bool },

    #[error("unexpected state '{state}', wanted target '{}'", .expected.join(", "))]
    UnexpectedState {
        state: String,
        expected: Vec<String>,
    },

    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: u32 },

    #[error("Invalid poll configuration: {0}")]
    InvalidConf(String),

    #[error("poller already reached a final state")]
    Finished,
}

impl PollError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollError::Cancelled { .. })
    }

    /// Remote error code, when the failure came from the remote system
    pub fn error_code(&self) -> Option<&str> {
        match self {
            PollError::Remote(err) => err.error_code.as_deref(),
            _ => None,
        }
    }
}

fn state_or_none(state: &Option<String>) -> &str {
    state.as_deref().unwrap_or("none")
}

fn error_suffix(error: &Option<String>) -> String {
    error
        .as_ref()
        .map(|e| format!(": last error: {}", e))
        .unwrap_or_default()
}

fn cancel_reason(deadline_exceeded: &bool) -> &'static str {
    if *deadline_exceeded {
        "context deadline exceeded"
    } else {
        "context cancelled"
    }
}

/// Result type alias for poll operations
pub type Result<T> = std::result::Result<T, PollError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_display_includes_status_and_code() {
        let err = RemoteError::new(403, "USER_UNAUTHORIZED", "not allowed");
        assert_eq!(err.to_string(), "HTTP 403 USER_UNAUTHORIZED: not allowed");

        let err = RemoteError::unclassified("listing failed");
        assert_eq!(err.to_string(), "listing failed");
    }

    #[test]
    fn only_remote_refresh_errors_are_fatal() {
        assert!(RefreshError::NotFound.is_retryable());
        assert!(RefreshError::Unavailable.is_retryable());
        assert!(RefreshError::ConnectionReset.is_retryable());
        assert!(RefreshError::transient("boom").is_retryable());
        assert!(!RefreshError::Remote(RemoteError::unclassified("x")).is_retryable());
    }

    #[test]
    fn into_fatal_keeps_structured_errors() {
        let remote = RemoteError::new(400, "INVALID_GROUP_ID", "bad id");
        assert_eq!(RefreshError::Remote(remote.clone()).into_fatal(), remote);

        let wrapped = RefreshError::transient("socket closed").into_fatal();
        assert_eq!(wrapped.status, None);
        assert_eq!(wrapped.detail, "socket closed");

        assert_eq!(RefreshError::NotFound.into_fatal().status, Some(404));
    }

    #[test]
    fn timeout_message_reports_last_state_and_error() {
        let err = PollError::Timeout {
            timeout: Duration::from_secs(60),
            last_state: Some("CREATING".to_string()),
            last_error: Some("socket closed".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("last state: CREATING"));
        assert!(message.contains("last error: socket closed"));
        assert!(err.is_timeout());

        let err = PollError::Timeout {
            timeout: Duration::from_secs(1),
            last_state: None,
            last_error: None,
        };
        assert!(err.to_string().contains("last state: none"));
    }

    #[test]
    fn error_code_only_for_remote_errors() {
        let err = PollError::Remote(RemoteError::new(409, "CANNOT_UPDATE_PAUSED_CLUSTER", "paused"));
        assert_eq!(err.error_code(), Some("CANNOT_UPDATE_PAUSED_CLUSTER"));
        assert_eq!(PollError::Finished.error_code(), None);
    }
}
