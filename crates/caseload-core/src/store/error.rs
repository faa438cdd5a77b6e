use std::sync::Arc;

use thiserror::Error;

/// Errors raised by the remote store and surfaced through loaders and gates.
///
/// `Clone` because one failed fetch is handed to every caller that joined it.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - check the anon key")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(Arc<reqwest::Error>),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl StoreError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => StoreError::Unauthorized,
            403 => StoreError::AccessDenied(truncated),
            404 => StoreError::NotFound(truncated),
            409 => StoreError::Conflict(truncated),
            429 => StoreError::RateLimited,
            500..=599 => StoreError::ServerError(truncated),
            _ => StoreError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Network(Arc::new(err))
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::TaskFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            StoreError::from_status(StatusCode::UNAUTHORIZED, ""),
            StoreError::Unauthorized
        ));
        assert!(matches!(
            StoreError::from_status(StatusCode::FORBIDDEN, "nope"),
            StoreError::AccessDenied(ref b) if b == "nope"
        ));
        assert!(matches!(
            StoreError::from_status(StatusCode::CONFLICT, "dup"),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            StoreError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            StoreError::RateLimited
        ));
        assert!(matches!(
            StoreError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
            StoreError::ServerError(_)
        ));
        assert!(matches!(
            StoreError::from_status(StatusCode::BAD_REQUEST, "bad filter"),
            StoreError::InvalidResponse(ref m) if m.contains("400") && m.contains("bad filter")
        ));
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(2000);
        match StoreError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            StoreError::ServerError(msg) => {
                assert!(msg.len() < 600);
                assert!(msg.ends_with("(truncated, 2000 total bytes)"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let body = "é".repeat(400);
        let msg = StoreError::truncate_body(&body);
        assert!(msg.contains("truncated, 800 total bytes"));
    }
}
