//! # Error Handling Module
//!
//! A single error enum covers both the expected refusals of the record store
//! (`NotFound`, `NotReady`, `EmptyInput`) and the transport and startup
//! failures of the server. Store refusals travel through handlers with `?`
//! like any other error and are turned into HTTP responses at the edge.
//!
//! Client-facing messages are fixed strings. Internal messages may carry ids
//! and sizes but never secret material.

use thiserror::Error;

/// Result type alias for the hash server library
pub type Result<T> = std::result::Result<T, HashServerError>;

/// Error types for the hash server
///
/// ## Error Categories
///
/// - **Refusals**: expected outcomes of store operations, reported to callers
/// - **Request Errors**: malformed or oversized client requests
/// - **Server Errors**: listener, connection and response-building failures
/// - **Configuration Errors**: invalid settings found at startup
/// - **Internal Errors**: anything else that should not happen
#[derive(Error, Debug)]
pub enum HashServerError {
    /// No record exists for the requested id
    #[error("No record with id {id}")]
    NotFound {
        /// Requested id
        id: u64,
    },

    /// The record exists but is younger than the minimum age
    #[error("Record {id} is not ready, retry in {retry_after_secs}s")]
    NotReady {
        /// Requested id
        id: u64,
        /// Whole seconds until the digest becomes available
        retry_after_secs: u64,
    },

    /// Submission carried no secret
    #[error("Submission has no secret")]
    EmptyInput,

    /// Request body exceeded the configured limit
    #[error("Payload too large (max: {limit} bytes)")]
    PayloadTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// Request did not finish within the configured timeout
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// Invalid client request
    #[error("Invalid request: {message}")]
    RequestError {
        /// Internal error message for logging
        message: String,
    },

    /// HTTP server operation failed
    #[error("Server error: {message}")]
    ServerError {
        /// Internal error message for logging
        message: String,
        /// Optional source error for error chain analysis
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Server configuration is invalid
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Internal error message for logging
        message: String,
        /// Optional source error for error chain analysis
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    InternalError {
        /// Internal error message for logging
        message: String,
        /// Optional source error for error chain analysis
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl HashServerError {
    /// Create a not-found refusal for `id`
    #[inline]
    #[must_use]
    pub fn not_found(id: u64) -> Self {
        Self::NotFound { id }
    }

    /// Create a not-ready refusal for `id`
    #[inline]
    #[must_use]
    pub fn not_ready(id: u64, retry_after_secs: u64) -> Self {
        Self::NotReady {
            id,
            retry_after_secs,
        }
    }

    /// Create an empty-input refusal
    #[inline]
    #[must_use]
    pub fn empty_input() -> Self {
        Self::EmptyInput
    }

    /// Create a payload-too-large error
    #[inline]
    #[must_use]
    pub fn payload_too_large(limit: usize) -> Self {
        Self::PayloadTooLarge { limit }
    }

    /// Create a timeout error
    #[inline]
    #[must_use]
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Create a new request error with message
    #[inline]
    pub fn request_error<T>(message: T) -> Self
    where
        T: Into<String>,
    {
        Self::RequestError {
            message: message.into(),
        }
    }

    /// Create a new server error with message and optional source
    #[inline]
    pub fn server_error<T>(message: T, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self
    where
        T: Into<String>,
    {
        Self::ServerError {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error with message and optional source
    #[inline]
    pub fn config_error<T>(message: T, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self
    where
        T: Into<String>,
    {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new internal error with message and optional source
    #[inline]
    pub fn internal_error<T>(message: T, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self
    where
        T: Into<String>,
    {
        Self::InternalError {
            message: message.into(),
            source,
        }
    }

    /// Get the HTTP status code for this error
    ///
    /// - `NotFound` maps to 404
    /// - `NotReady` and `Timeout` map to 503 (retry later)
    /// - `EmptyInput` and request errors map to 400
    /// - `PayloadTooLarge` maps to 413
    /// - Server, configuration and internal errors map to 500
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::NotReady { .. } | Self::Timeout { .. } => 503,
            Self::EmptyInput | Self::RequestError { .. } => 400,
            Self::PayloadTooLarge { .. } => 413,
            Self::ServerError { .. } | Self::ConfigError { .. } | Self::InternalError { .. } => 500,
        }
    }

    /// Get the sanitized error message for client responses
    #[inline]
    #[must_use]
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "Not found",
            Self::NotReady { .. } => "Hash not ready",
            Self::EmptyInput => "Missing password",
            Self::PayloadTooLarge { .. } => "Payload too large",
            Self::Timeout { .. } => "Request timed out",
            Self::RequestError { .. } => "Bad request",
            Self::ServerError { .. } | Self::InternalError { .. } => "Internal server error",
            Self::ConfigError { .. } => "Service unavailable",
        }
    }

    /// Get the internal error message for logging
    #[must_use]
    pub fn internal_message(&self) -> String {
        match self {
            Self::ServerError { message, .. }
            | Self::RequestError { message }
            | Self::ConfigError { message, .. }
            | Self::InternalError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Seconds a client should wait before retrying, if this error is transient
    #[inline]
    #[must_use]
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::NotReady {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Check if this error should be logged at ERROR level
    ///
    /// Refusals and bad requests are part of normal traffic and log at WARN.
    #[inline]
    #[must_use]
    pub fn is_critical(&self) -> bool {
        match self {
            Self::NotFound { .. }
            | Self::NotReady { .. }
            | Self::EmptyInput
            | Self::PayloadTooLarge { .. }
            | Self::Timeout { .. }
            | Self::RequestError { .. } => false,
            Self::ServerError { .. } | Self::ConfigError { .. } | Self::InternalError { .. } => true,
        }
    }
}

impl From<std::io::Error> for HashServerError {
    #[inline]
    fn from(err: std::io::Error) -> Self {
        Self::server_error(format!("I/O error: {err}"), Some(Box::new(err)))
    }
}

impl From<serde_json::Error> for HashServerError {
    #[inline]
    fn from(err: serde_json::Error) -> Self {
        Self::internal_error(format!("JSON serialization error: {err}"), Some(Box::new(err)))
    }
}

impl From<hyper::Error> for HashServerError {
    #[inline]
    fn from(err: hyper::Error) -> Self {
        Self::server_error(format!("Hyper error: {err}"), Some(Box::new(err)))
    }
}

impl From<hyper::http::Error> for HashServerError {
    #[inline]
    fn from(err: hyper::http::Error) -> Self {
        Self::server_error(format!("HTTP error: {err}"), Some(Box::new(err)))
    }
}
