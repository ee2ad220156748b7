//! Error types for CiteForge
//!
//! Provides:
//! - `AppError` for configuration, storage and transport failures
//! - `SourceError` for the outcome of a single collaborator call
//! - Machine-readable error codes for reports and logs

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidIdentifier,

    // Resource errors (4xxx)
    NotFound,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    UpstreamError,
    UpstreamTimeout,
    MalformedResponse,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidIdentifier => 1002,

            ErrorCode::NotFound => 4001,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::UpstreamTimeout => 8002,
            ErrorCode::MalformedResponse => 8003,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid publication identifier: {raw:?}")]
    InvalidIdentifier { raw: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Store rejected write: {message}")]
    Store { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidIdentifier { .. } => ErrorCode::InvalidIdentifier,
            AppError::Database(_) | AppError::Store { .. } => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Whether the error invalidates the whole run rather than one node
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Validation { .. }
                | AppError::InvalidIdentifier { .. }
                | AppError::Configuration { .. }
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: err.to_string(),
            field,
        }
    }
}

/// Outcome of a failed call to a metadata provider or document source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The identifier does not resolve. Never retried.
    #[error("not found")]
    NotFound,

    /// Network, server-side or rate-limit failure. Retried.
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// The call did not complete within its timeout. Retried.
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The response could not be interpreted. Never retried.
    #[error("malformed response: {message}")]
    Malformed { message: String },
}

impl SourceError {
    /// Whether another attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient { .. } | SourceError::Timeout { .. })
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SourceError::NotFound => ErrorCode::NotFound,
            SourceError::Transient { .. } => ErrorCode::UpstreamError,
            SourceError::Timeout { .. } => ErrorCode::UpstreamTimeout,
            SourceError::Malformed { .. } => ErrorCode::MalformedResponse,
        }
    }

    /// Classify an HTTP status returned by an upstream service
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        if status == reqwest::StatusCode::NOT_FOUND {
            SourceError::NotFound
        } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            SourceError::Transient {
                message: format!("{} returned {}", context, status),
            }
        } else {
            SourceError::Malformed {
                message: format!("{} returned {}", context, status),
            }
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() || err.is_builder() {
            SourceError::Malformed {
                message: err.to_string(),
            }
        } else {
            SourceError::Transient {
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::InvalidIdentifier { raw: " ".into() };
        assert_eq!(err.code(), ErrorCode::InvalidIdentifier);
        assert_eq!(err.code().as_code(), 1002);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_store_error_is_not_fatal() {
        let err = AppError::Store {
            message: "connection reset".into(),
        };
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_source_error_transience() {
        assert!(!SourceError::NotFound.is_transient());
        assert!(SourceError::Timeout { timeout_ms: 10 }.is_transient());
        assert!(SourceError::Transient { message: "503".into() }.is_transient());
        assert!(!SourceError::Malformed { message: "bad xml".into() }.is_transient());
    }

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode;

        assert_eq!(
            SourceError::from_status(StatusCode::NOT_FOUND, "arxiv"),
            SourceError::NotFound
        );
        assert!(SourceError::from_status(StatusCode::BAD_GATEWAY, "arxiv").is_transient());
        assert!(SourceError::from_status(StatusCode::TOO_MANY_REQUESTS, "arxiv").is_transient());
        assert!(!SourceError::from_status(StatusCode::BAD_REQUEST, "arxiv").is_transient());
    }
}
