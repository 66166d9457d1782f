//! Configuration schema types
//!
//! Every field carries a serde default, so an empty TOML document (or no
//! file at all) yields a working configuration against the hosted API.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};

/// Base URL of the hosted Georef API.
///
/// The bearer token is only ever sent to this deployment.
pub const DEFAULT_BASE_URL: &str = "https://apis.datos.gob.ar/georef/api/";

/// Main georef configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeorefConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Georef API connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Bulk fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Rate governor settings
    #[serde(default)]
    pub rate: RateConfig,

    /// Diff settings
    #[serde(default)]
    pub diff: DiffConfig,

    /// Address normalization settings
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GeorefConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.api.validate()?;
        self.fetch.validate()?;
        self.rate.validate()?;
        self.diff.validate()?;
        self.normalize.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Georef API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the deployment, with trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token for the hosted API (optional)
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub token: Option<SecretString>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    /// TLS certificate verification enabled
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_seconds: default_timeout_seconds(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            tls_verify: true,
        }
    }
}

impl ApiConfig {
    /// Creates a connection config for `base_url` with every other setting
    /// taken from `self`
    pub fn with_base_url(&self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            ..self.clone()
        }
    }

    /// Whether `base_url` points at the hosted deployment
    pub fn is_hosted(&self) -> bool {
        normalize_base_url(self.base_url.clone()) == DEFAULT_BASE_URL
    }

    fn validate(&self) -> Result<(), String> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!(
                "api.base_url must start with http:// or https://, got '{}'",
                self.base_url
            ));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| format!("api.base_url '{}' is not a valid URL: {e}", self.base_url))?;

        if self.timeout_seconds == 0 {
            return Err("api.timeout_seconds must be greater than 0".to_string());
        }
        if self.connect_timeout_seconds == 0 {
            return Err("api.connect_timeout_seconds must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Appends the trailing slash endpoint paths are joined against
pub fn normalize_base_url(mut base_url: String) -> String {
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    base_url
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_retries > 10 {
            return Err("fetch.retry.max_retries cannot exceed 10".to_string());
        }
        if self.backoff_multiplier < 1.0 {
            return Err("fetch.retry.backoff_multiplier must be at least 1.0".to_string());
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(
                "fetch.retry.initial_delay_ms cannot exceed fetch.retry.max_delay_ms".to_string(),
            );
        }
        Ok(())
    }
}

/// Bulk fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Largest page size the API accepts
    #[serde(default = "default_page_cap")]
    pub page_cap: usize,

    /// Concurrent partition requests
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Abort on the first failed partition
    #[serde(default)]
    pub fail_fast: bool,

    /// Largest `max + inicio` the API accepts
    #[serde(default = "default_max_pagination_window")]
    pub max_pagination_window: usize,

    /// Per-task retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_cap: default_page_cap(),
            max_concurrency: default_max_concurrency(),
            fail_fast: false,
            max_pagination_window: default_max_pagination_window(),
            retry: RetryConfig::default(),
        }
    }
}

impl FetchConfig {
    fn validate(&self) -> Result<(), String> {
        if self.page_cap == 0 || self.page_cap > 5000 {
            return Err("fetch.page_cap must be between 1 and 5000".to_string());
        }
        if self.max_concurrency == 0 || self.max_concurrency > 64 {
            return Err("fetch.max_concurrency must be between 1 and 64".to_string());
        }
        if self.max_pagination_window < self.page_cap {
            return Err(
                "fetch.max_pagination_window cannot be smaller than fetch.page_cap".to_string(),
            );
        }
        self.retry.validate()
    }
}

/// Fallback quota tiers and estimate tuning for the rate governor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateConfig {
    /// Requests per second assumed when quota headers are unavailable
    #[serde(default = "default_fallback_per_second")]
    pub fallback_per_second: u64,

    /// Requests per minute assumed when quota headers are unavailable
    #[serde(default = "default_fallback_per_minute")]
    pub fallback_per_minute: u64,

    /// Requests per hour assumed when quota headers are unavailable
    #[serde(default = "default_fallback_per_hour")]
    pub fallback_per_hour: u64,

    /// Requests per day assumed when quota headers are unavailable
    #[serde(default = "default_fallback_per_day")]
    pub fallback_per_day: u64,

    /// Fraction of extra requests reserved for fallbacks and retries
    #[serde(default = "default_retry_inflation")]
    pub retry_inflation: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            fallback_per_second: default_fallback_per_second(),
            fallback_per_minute: default_fallback_per_minute(),
            fallback_per_hour: default_fallback_per_hour(),
            fallback_per_day: default_fallback_per_day(),
            retry_inflation: default_retry_inflation(),
        }
    }
}

impl RateConfig {
    fn validate(&self) -> Result<(), String> {
        if self.fallback_per_second == 0 {
            return Err("rate.fallback_per_second must be greater than 0".to_string());
        }
        if !(0.0..=10.0).contains(&self.retry_inflation) {
            return Err("rate.retry_inflation must be between 0.0 and 10.0".to_string());
        }
        Ok(())
    }
}

/// Output format of the diff command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputExtension {
    /// Nested JSON report
    #[default]
    Json,
    /// Flat CSV table
    Csv,
    /// Both of the above
    Both,
}

impl OutputExtension {
    pub fn writes_json(&self) -> bool {
        matches!(self, OutputExtension::Json | OutputExtension::Both)
    }

    pub fn writes_csv(&self) -> bool {
        matches!(self, OutputExtension::Csv | OutputExtension::Both)
    }
}

impl std::str::FromStr for OutputExtension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputExtension::Json),
            "csv" => Ok(OutputExtension::Csv),
            "both" => Ok(OutputExtension::Both),
            other => Err(format!(
                "Invalid extension '{other}'. Must be one of: json, csv, both"
            )),
        }
    }
}

/// Diff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Deployment the target is compared against
    #[serde(default = "default_base_url")]
    pub origin_url: String,

    /// Directory for report files
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Report format
    #[serde(default)]
    pub extension: OutputExtension,

    /// Extra field-path patterns excluded from every layer
    #[serde(default)]
    pub exclude_paths: Vec<String>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            origin_url: default_base_url(),
            output_dir: default_output_dir(),
            extension: OutputExtension::default(),
            exclude_paths: Vec::new(),
        }
    }
}

impl DiffConfig {
    fn validate(&self) -> Result<(), String> {
        url::Url::parse(&self.origin_url)
            .map_err(|e| format!("diff.origin_url '{}' is not a valid URL: {e}", self.origin_url))?;

        if self.output_dir.trim().is_empty() {
            return Err("diff.output_dir cannot be empty".to_string());
        }

        for pattern in &self.exclude_paths {
            regex::Regex::new(pattern)
                .map_err(|e| format!("diff.exclude_paths entry '{pattern}' is invalid: {e}"))?;
        }
        Ok(())
    }
}

/// Address normalization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Rows read and written per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Addresses per bulk request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent bulk requests within a chunk
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Column prefix of the normalized output fields
    #[serde(default)]
    pub prefix: Option<String>,

    /// Name of the input column holding the address
    #[serde(default = "default_address_column")]
    pub address_column: String,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
            prefix: None,
            address_column: default_address_column(),
        }
    }
}

impl NormalizeConfig {
    fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("normalize.chunk_size must be greater than 0".to_string());
        }
        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err("normalize.batch_size must be between 1 and 1000".to_string());
        }
        if self.batch_size > self.chunk_size {
            return Err("normalize.batch_size cannot exceed normalize.chunk_size".to_string());
        }
        if self.max_concurrency == 0 || self.max_concurrency > 64 {
            return Err("normalize.max_concurrency must be between 1 and 64".to_string());
        }
        if self.address_column.trim().is_empty() {
            return Err("normalize.address_column cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log file directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local_enabled = true".to_string());
        }
        Ok(())
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_connect_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_page_cap() -> usize {
    5000
}

fn default_max_concurrency() -> usize {
    8
}

fn default_max_pagination_window() -> usize {
    10000
}

fn default_fallback_per_second() -> u64 {
    5
}

fn default_fallback_per_minute() -> u64 {
    150
}

fn default_fallback_per_hour() -> u64 {
    4000
}

fn default_fallback_per_day() -> u64 {
    20000
}

fn default_retry_inflation() -> f64 {
    0.6
}

fn default_output_dir() -> String {
    "./reports".to_string()
}

fn default_chunk_size() -> usize {
    5000
}

fn default_batch_size() -> usize {
    1000
}

fn default_address_column() -> String {
    "direccion".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
