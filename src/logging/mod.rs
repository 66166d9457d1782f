//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output with configurable log levels
//! - Optional JSON file logging with rotation
//! - Domain-specific logging macros for fetch and normalization runs
//!
//! # Example
//!
//! ```no_run
//! use georef::logging::init_logging;
//! use georef::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a collection fetch
///
/// # Example
///
/// ```no_run
/// use georef::log_fetch_start;
/// use georef::domain::EntityType;
///
/// log_fetch_start!(EntityType::Streets, "https://apis.datos.gob.ar/georef/api/");
/// ```
#[macro_export]
macro_rules! log_fetch_start {
    ($entity:expr, $base_url:expr) => {
        tracing::info!(
            entity = %$entity,
            base_url = %$base_url,
            "Starting fetch"
        );
    };
}

/// Log the completion of a collection fetch
///
/// # Example
///
/// ```no_run
/// use georef::log_fetch_complete;
/// use georef::domain::EntityType;
/// use std::time::Duration;
///
/// log_fetch_complete!(EntityType::Provinces, 24, 0, Duration::from_millis(350));
/// ```
#[macro_export]
macro_rules! log_fetch_complete {
    ($entity:expr, $count:expr, $failures:expr, $duration:expr) => {
        tracing::info!(
            entity = %$entity,
            count = $count,
            failures = $failures,
            duration_ms = $duration.as_millis(),
            "Fetch completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use georef::log_error_with_context;
/// use georef::domain::GeorefError;
///
/// let error = GeorefError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a batch processing operation
///
/// # Example
///
/// ```no_run
/// use georef::log_batch_processing;
///
/// log_batch_processing!(100, 1000);
/// ```
#[macro_export]
macro_rules! log_batch_processing {
    ($current:expr, $total:expr) => {
        tracing::debug!(
            current = $current,
            total = $total,
            progress_pct = ($current as f64 / ($total as f64).max(1.0) * 100.0),
            "Processing batch"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use georef::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying request"
        );
    };
}
