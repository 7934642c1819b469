//! Error Types for the profcache API
//!
//! This module defines error handling for the HTTP layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as `{"error": <message>, "code": <CODE>}` with
//! the status code of their category.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use profcache_core::{FetchError, KeyError, ProfcacheError, ProjectionError, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Request Errors (400)
    // ========================================================================
    /// Path key is not a valid cache key
    InvalidKey,

    /// Action segment is not one of raw, download, web-view
    InvalidAction,

    /// Query string could not be parsed
    InvalidQuery,

    // ========================================================================
    // Fetch Errors (404)
    // ========================================================================
    /// Session credentials could not be loaded
    CredentialLoad,

    /// Upstream rejected the session
    AuthenticationFailed,

    /// Upstream data retrieval failed
    UpstreamFailed,

    /// No stored document exists for the key
    DocumentNotFound,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Persistence backend is unreachable or unwritable
    StorageUnavailable,

    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidKey | ErrorCode::InvalidAction | ErrorCode::InvalidQuery => {
                StatusCode::BAD_REQUEST
            }

            // Every fetch failure is projected uniformly.
            ErrorCode::CredentialLoad
            | ErrorCode::AuthenticationFailed
            | ErrorCode::UpstreamFailed
            | ErrorCode::DocumentNotFound => StatusCode::NOT_FOUND,

            ErrorCode::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidKey => "Invalid key",
            ErrorCode::InvalidAction => "Invalid action",
            ErrorCode::InvalidQuery => "Invalid query string",
            ErrorCode::CredentialLoad => "Error loading credentials",
            ErrorCode::AuthenticationFailed => "Error during upstream authentication",
            ErrorCode::UpstreamFailed => "Error fetching data",
            ErrorCode::DocumentNotFound => "No stored document for key",
            ErrorCode::StorageUnavailable => "Storage unavailable",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response returned by every endpoint on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable error message
    #[serde(rename = "error")]
    pub message: String,

    /// Error code categorizing the error
    pub code: ErrorCode,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_key(err: &KeyError) -> Self {
        Self::new(ErrorCode::InvalidKey, format!("Invalid key: {}", err))
    }

    pub fn invalid_action() -> Self {
        Self::from_code(ErrorCode::InvalidAction)
    }

    /// Path segments that failed to decode, e.g. invalid UTF-8.
    pub fn invalid_path(rejection: &impl fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidKey, format!("Invalid key: {}", rejection))
    }

    pub fn invalid_query(rejection: &impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidQuery,
            format!("Invalid query string: {}", rejection),
        )
    }

    pub fn document_not_found(key: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::DocumentNotFound,
            format!("No stored document for {}", key),
        )
    }

    pub fn storage_unavailable() -> Self {
        Self::from_code(ErrorCode::StorageUnavailable)
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        let code = match err {
            FetchError::CredentialLoad(_) => ErrorCode::CredentialLoad,
            FetchError::Authentication(_) => ErrorCode::AuthenticationFailed,
            FetchError::Upstream(_) => ErrorCode::UpstreamFailed,
        };
        // The Display form already carries the client-facing prefix.
        ApiError::new(code, err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        // Log the full error, return a generic one to avoid leaking paths or DSNs.
        tracing::error!(error = %err, "Storage error");
        match err {
            StorageError::Unavailable { .. } => ApiError::storage_unavailable(),
            StorageError::CorruptEntry { .. } => {
                ApiError::internal_error("Stored entry could not be read")
            }
        }
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::InvalidAction(_) => ApiError::invalid_action(),
        }
    }
}

impl From<KeyError> for ApiError {
    fn from(err: KeyError) -> Self {
        ApiError::invalid_key(&err)
    }
}

impl From<ProfcacheError> for ApiError {
    fn from(err: ProfcacheError) -> Self {
        match err {
            ProfcacheError::Key(e) => e.into(),
            ProfcacheError::Storage(e) => e.into(),
            ProfcacheError::Fetch(e) => e.into(),
            ProfcacheError::Projection(e) => e.into(),
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let err = ApiError::invalid_action();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": "Invalid action", "code": "INVALID_ACTION"})
        );
    }

    #[test]
    fn test_fetch_errors_are_not_found() {
        let cases = [
            (
                FetchError::CredentialLoad("cookies.json missing".to_string()),
                ErrorCode::CredentialLoad,
                "Error loading credentials: cookies.json missing",
            ),
            (
                FetchError::Authentication("session expired".to_string()),
                ErrorCode::AuthenticationFailed,
                "Error during upstream authentication: session expired",
            ),
            (
                FetchError::Upstream("timed out".to_string()),
                ErrorCode::UpstreamFailed,
                "Error fetching data: timed out",
            ),
        ];

        for (fetch_err, code, message) in cases {
            let err = ApiError::from(ProfcacheError::from(fetch_err));
            assert_eq!(err.code, code);
            assert_eq!(err.message, message);
            assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn test_storage_unavailable_hides_reason() {
        let err = ApiError::from(StorageError::unavailable("connect to 10.0.0.5:5432 refused"));
        assert_eq!(err.code, ErrorCode::StorageUnavailable);
        assert_eq!(err.message, "Storage unavailable");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_invalid_key_is_bad_request() {
        let err = ApiError::from(KeyError::LeadingDot);
        assert_eq!(err.code, ErrorCode::InvalidKey);
        assert!(err.message.starts_with("Invalid key: "));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_action_message_is_fixed() {
        let err = ApiError::from(ProjectionError::InvalidAction("delete".to_string()));
        assert_eq!(err.message, "Invalid action");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_query_is_bad_request() {
        let err = ApiError::invalid_query(&"duplicate field `cache`");
        assert_eq!(err.code, ErrorCode::InvalidQuery);
        assert_eq!(err.message, "Invalid query string: duplicate field `cache`");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
