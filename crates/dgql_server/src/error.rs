//! Typed errors for the HTTP server.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Server error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Startup errors
    InvalidConfig,
    InvalidAddress,
    Bind,
    Accept,

    // Request errors
    InvalidRequest,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,

    // Response errors
    InternalError,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::InvalidAddress => "INVALID_ADDRESS",
            Self::Bind => "BIND",
            Self::Accept => "ACCEPT",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the client caused this error (4xx equivalent).
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest
                | Self::NotFound
                | Self::MethodNotAllowed
                | Self::PayloadTooLarge
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Server error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{code}] {message}")]
pub struct ServerError {
    pub code: ErrorCode,
    pub message: String,
}

impl ServerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, message)
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

/// Serialized as a GraphQL error object.
impl Serialize for ServerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        #[derive(Serialize)]
        struct Extensions {
            code: ErrorCode,
        }

        let mut state = serializer.serialize_struct("ServerError", 2)?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("extensions", &Extensions { code: self.code })?;
        state.end()
    }
}

/// Type alias for server results.
pub type ServerResult<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_properties() {
        assert!(ErrorCode::InvalidRequest.is_client_error());
        assert!(ErrorCode::PayloadTooLarge.is_client_error());
        assert!(!ErrorCode::Bind.is_client_error());
        assert!(!ErrorCode::InternalError.is_client_error());
        assert_eq!(ErrorCode::MethodNotAllowed.to_string(), "METHOD_NOT_ALLOWED");
    }

    #[test]
    fn test_error_display() {
        let err = ServerError::invalid_request("missing field `query`");
        assert_eq!(err.to_string(), "[INVALID_REQUEST] missing field `query`");
    }

    #[test]
    fn test_error_serialization() {
        let err = ServerError::internal("boom");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "boom", "extensions": {"code": "INTERNAL_ERROR"}})
        );
    }
}
