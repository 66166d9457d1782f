//! Domain error types
//!
//! This module defines the error hierarchy for georef. Single-request and
//! single-partition failures are usually converted into data (see
//! [`PartitionFailure`](crate::core::fetch::PartitionFailure) and
//! [`RowOutcome`](crate::core::normalize::RowOutcome)); only the errors that
//! make a whole operation meaningless surface to the caller.
//! None of these types expose third-party HTTP client types.

use thiserror::Error;

/// Main georef error type
///
/// This is the primary error type used throughout the library.
#[derive(Debug, Error)]
pub enum GeorefError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Georef API errors (transport, status, payload)
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// An entity layer name that the API does not expose
    #[error("Unknown entity type: {0}")]
    UnknownEntity(String),

    /// A region or sub-region could not be fetched (fail-fast mode only)
    #[error("Partition error: {0}")]
    Partition(String),

    /// Malformed input rows
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation was interrupted by a shutdown signal
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Georef API errors
///
/// Every variant carries the descriptor of the failed request
/// (`endpoint?query`) so a recorded failure can be traced back to the
/// partition or address batch that produced it.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Failed to connect to the API server
    #[error("Failed to connect to {request}: {message}")]
    ConnectionFailed { request: String, message: String },

    /// The request did not complete in time
    #[error("Request timeout for {request}")]
    Timeout { request: String },

    /// The server answered 429
    #[error("Rate limit exceeded for {request}")]
    RateLimited { request: String },

    /// Client error (4xx)
    #[error("Client error for {request}: {status} - {message}")]
    ClientError {
        request: String,
        status: u16,
        message: String,
    },

    /// Server error (5xx)
    #[error("Server error for {request}: {status} - {message}")]
    ServerError {
        request: String,
        status: u16,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Invalid response from {request}: {message}")]
    InvalidResponse { request: String, message: String },

    /// Quota headers were missing or malformed
    #[error("Quota information unavailable: {0}")]
    QuotaUnavailable(String),
}

impl ApiError {
    /// HTTP status code associated with the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ClientError { status, .. } | ApiError::ServerError { status, .. } => {
                Some(*status)
            }
            ApiError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Whether a retry has a reasonable chance of succeeding
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::ConnectionFailed { .. }
                | ApiError::Timeout { .. }
                | ApiError::RateLimited { .. }
                | ApiError::ServerError { .. }
        )
    }

    /// Whether the server could not be reached at all
    ///
    /// Meaningful on the final error of a retried request: a timeout that
    /// outlived every retry counts as unreachable.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ApiError::ConnectionFailed { .. } | ApiError::Timeout { .. }
        )
    }

    /// Short reason string used in error rows and failure records
    pub fn reason(&self) -> String {
        match self {
            ApiError::ConnectionFailed { message, .. } => format!("disconnected: {message}"),
            ApiError::Timeout { .. } => "timeout".to_string(),
            ApiError::RateLimited { .. } => "rate limited".to_string(),
            ApiError::ClientError { message, .. } | ApiError::ServerError { message, .. } => {
                message.clone()
            }
            ApiError::InvalidResponse { message, .. } => format!("invalid response: {message}"),
            ApiError::QuotaUnavailable(message) => message.clone(),
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for GeorefError {
    fn from(err: std::io::Error) -> Self {
        GeorefError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for GeorefError {
    fn from(err: serde_json::Error) -> Self {
        GeorefError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for GeorefError {
    fn from(err: toml::de::Error) -> Self {
        GeorefError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<csv::Error> for GeorefError {
    fn from(err: csv::Error) -> Self {
        GeorefError::Serialization(format!("CSV error: {err}"))
    }
}

impl From<regex::Error> for GeorefError {
    fn from(err: regex::Error) -> Self {
        GeorefError::Configuration(format!("Invalid pattern: {err}"))
    }
}
