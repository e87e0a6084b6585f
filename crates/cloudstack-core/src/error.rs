//! Error types for CloudStack operations.
//!
//! This module provides the error type shared by every CloudStack client crate, including
//! HTTP status code mapping and the error payload CloudStack embeds in failed responses.

use serde::Deserialize;
use thiserror::Error;

/// Main error type for CloudStack operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The management server rejected the command with a CloudStack error payload
    #[error("CloudStack API error {code}: {message}")]
    Api {
        /// CloudStack `errorcode` (431 for bad parameters, 530 for internal errors, ...)
        code: u16,
        /// CloudStack `errortext`
        message: String,
    },

    /// Management server is unavailable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Failed to decode an API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Operation timed out
    #[error("Timeout waiting for management server: {0}")]
    Timeout(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Specialized result type for CloudStack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error payload carried inside a `<command>response` envelope when a command fails.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ApiErrorPayload {
    /// CloudStack error code
    #[serde(rename = "errorcode")]
    pub error_code: u16,
    /// Internal CloudStack exception code
    #[serde(rename = "cserrorcode", default)]
    pub cs_error_code: Option<u32>,
    /// Human-readable error text
    #[serde(rename = "errortext", default)]
    pub error_text: String,
}

impl ApiErrorPayload {
    /// Extract the error payload from a failed response body.
    ///
    /// CloudStack wraps the payload in a single key named after the command, so the first
    /// top-level value that decodes as an error payload wins.
    #[must_use]
    pub fn from_body(body: &serde_json::Value) -> Option<Self> {
        body.as_object()?
            .values()
            .find_map(|inner| serde_json::from_value(inner.clone()).ok())
    }
}

impl From<ApiErrorPayload> for Error {
    fn from(payload: ApiErrorPayload) -> Self {
        Self::Api {
            code: payload.error_code,
            message: payload.error_text,
        }
    }
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Api { .. } => "API_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        match self {
            Self::Api { code, .. } => *code >= 500,
            Self::ConfigError(_) | Self::ParseError(_) | Self::ServiceUnavailable(_) => true,
            _ => false,
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
