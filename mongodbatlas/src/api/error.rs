use thiserror::Error;
use tfretry::{RefreshError, RemoteError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Connection reset by peer: {0}")]
    ConnectionReset(String),

    #[error("API returned error (HTTP {status}{}): {detail}", code_suffix(.error_code))]
    ApiError {
        status: u16,
        error_code: Option<String>,
        detail: String,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,
}

fn code_suffix(error_code: &Option<String>) -> String {
    error_code
        .as_ref()
        .map(|code| format!(" {}", code))
        .unwrap_or_default()
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } => Some(*status),
            ApiError::AuthError => Some(401),
            ApiError::RateLimited => Some(429),
            ApiError::ServiceUnavailable => Some(503),
            ApiError::RequestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Stable error code reported by Atlas, e.g. `CLUSTER_NOT_FOUND`
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ApiError::ApiError { error_code, .. } => error_code.as_deref(),
            _ => None,
        }
    }
}

impl From<ApiError> for RefreshError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::ConnectionReset(_) => RefreshError::ConnectionReset,
            ApiError::ServiceUnavailable => RefreshError::Unavailable,
            ApiError::ApiError { status: 404, .. } => RefreshError::NotFound,
            ApiError::ApiError { status: 503, .. } => RefreshError::Unavailable,
            ApiError::ApiError {
                status,
                error_code: Some(error_code),
                detail,
            } => RefreshError::Remote(RemoteError::new(status, error_code, detail)),
            ApiError::AuthError => RefreshError::Remote(RemoteError::new(
                401,
                "UNAUTHORIZED",
                "authentication failed",
            )),
            other => RefreshError::transient(other),
        }
    }
}
