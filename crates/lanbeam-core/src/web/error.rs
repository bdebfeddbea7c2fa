//! HTTP error handling for the web API.
//!
//! Core errors become JSON bodies of the form
//! `{"code": "E004", "message": "...", "details": "..."}` with a status
//! derived from the error code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// API error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Error code (e.g., "E004" for a missing file)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable error message
    pub message: String,
    /// Additional details about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip)]
    status: Option<StatusCode>,
}

impl ApiError {
    /// Create a new API error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            details: None,
            status: None,
        }
    }

    /// Create a new API error with code and message.
    #[must_use]
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::new(message)
        }
    }

    /// Add details to the error.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Get the HTTP status code for this error.
    ///
    /// An explicit status wins; otherwise the code decides.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        if let Some(status) = self.status {
            return status;
        }
        match self.code.as_deref() {
            Some("E001") => StatusCode::SERVICE_UNAVAILABLE,
            Some("E002") => StatusCode::BAD_GATEWAY,
            Some("E003" | "E005") => StatusCode::CONFLICT,
            Some("E004") => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Create a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: Some(StatusCode::BAD_REQUEST),
            ..Self::new(message)
        }
    }

    /// Create a payload too large error.
    #[must_use]
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self {
            status: Some(StatusCode::PAYLOAD_TOO_LARGE),
            ..Self::new(message)
        }
    }

    /// Create an internal server error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

impl From<crate::error::Error> for ApiError {
    fn from(err: crate::error::Error) -> Self {
        use crate::error::Error;

        let status = match &err {
            Error::InvalidPath(_) | Error::ProtocolError(_) => Some(StatusCode::BAD_REQUEST),
            _ => None,
        };

        Self {
            code: err.code().map(String::from),
            message: err.to_string(),
            details: None,
            status,
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("I/O error: {err}"))
    }
}

/// Result type for web handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_api_error_creation() {
        let err = ApiError::new("Something went wrong");
        assert!(err.code.is_none());
        assert_eq!(err.message, "Something went wrong");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            ApiError::with_code("E001", "").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::with_code("E002", "").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::with_code("E004", "").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::bad_request("no file").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::payload_too_large("big").status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_from_core_error() {
        let api_err: ApiError = Error::FileNotFound("/tmp/gone.txt".into()).into();
        assert_eq!(api_err.code, Some("E004".into()));
        assert!(api_err.message.contains("/tmp/gone.txt"));
        assert_eq!(api_err.status_code(), StatusCode::NOT_FOUND);

        let api_err: ApiError = Error::InvalidPath("a directory".into()).into();
        assert_eq!(api_err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_serialization() {
        let err = ApiError::with_code("E004", "file not found").with_details("checked twice");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"code\":\"E004\""));
        assert!(json.contains("\"details\":\"checked twice\""));
        assert!(!json.contains("status"));

        let json = serde_json::to_string(&ApiError::new("oops")).unwrap();
        assert!(!json.contains("code"));
        assert!(!json.contains("details"));
    }
}
