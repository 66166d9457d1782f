//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{normalize_base_url, GeorefConfig};
use super::secret_string;
use crate::domain::errors::GeorefError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into GeorefConfig
/// 4. Applies environment variable overrides (GEOREF_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use georef::config::loader::load_config;
///
/// let config = load_config("georef.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<GeorefConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(GeorefError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        GeorefError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Loads configuration from `path`, or from defaults when the file is absent
///
/// Environment overrides and validation apply in both cases, so a bare
/// `GEOREF_API_TOKEN` works without any configuration file.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<GeorefConfig> {
    let path = path.as_ref();
    if path.exists() {
        return load_config(path);
    }

    tracing::debug!(
        path = %path.display(),
        "Configuration file not found, using defaults"
    );
    parse_config("")
}

/// Parses configuration from TOML text
///
/// Applies `${VAR}` substitution, `GEOREF_*` overrides and validation.
pub fn parse_config(contents: &str) -> Result<GeorefConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: GeorefConfig = toml::from_str(&contents)
        .map_err(|e| GeorefError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.api.base_url = normalize_base_url(config.api.base_url);
    config.diff.origin_url = normalize_base_url(config.diff.origin_url);

    config.validate().map_err(|e| {
        GeorefError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        // Comments are passed through untouched
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(GeorefError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using the GEOREF_* prefix
///
/// Environment variables follow the pattern: GEOREF_<SECTION>_<KEY>
/// For example: GEOREF_API_BASE_URL, GEOREF_FETCH_MAX_CONCURRENCY
fn apply_env_overrides(config: &mut GeorefConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("GEOREF_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // API overrides
    if let Ok(val) = std::env::var("GEOREF_API_BASE_URL") {
        config.api.base_url = val;
    }
    if let Ok(val) = std::env::var("GEOREF_API_TOKEN") {
        if !val.is_empty() {
            config.api.token = Some(secret_string(val));
        }
    }
    if let Ok(val) = std::env::var("GEOREF_API_TIMEOUT_SECONDS") {
        if let Ok(timeout) = val.parse() {
            config.api.timeout_seconds = timeout;
        }
    }
    if let Ok(val) = std::env::var("GEOREF_API_TLS_VERIFY") {
        config.api.tls_verify = val.parse().unwrap_or(true);
    }

    // Fetch overrides
    if let Ok(val) = std::env::var("GEOREF_FETCH_PAGE_CAP") {
        if let Ok(cap) = val.parse() {
            config.fetch.page_cap = cap;
        }
    }
    if let Ok(val) = std::env::var("GEOREF_FETCH_MAX_CONCURRENCY") {
        if let Ok(concurrency) = val.parse() {
            config.fetch.max_concurrency = concurrency;
        }
    }
    if let Ok(val) = std::env::var("GEOREF_FETCH_FAIL_FAST") {
        config.fetch.fail_fast = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("GEOREF_FETCH_MAX_RETRIES") {
        if let Ok(retries) = val.parse() {
            config.fetch.retry.max_retries = retries;
        }
    }

    // Diff overrides
    if let Ok(val) = std::env::var("GEOREF_DIFF_ORIGIN_URL") {
        config.diff.origin_url = val;
    }
    if let Ok(val) = std::env::var("GEOREF_DIFF_OUTPUT_DIR") {
        config.diff.output_dir = val;
    }
    if let Ok(val) = std::env::var("GEOREF_DIFF_EXTENSION") {
        match val.parse() {
            Ok(extension) => config.diff.extension = extension,
            Err(e) => tracing::warn!(error = %e, "Ignoring GEOREF_DIFF_EXTENSION override"),
        }
    }

    // Normalize overrides
    if let Ok(val) = std::env::var("GEOREF_NORMALIZE_CHUNK_SIZE") {
        if let Ok(size) = val.parse() {
            config.normalize.chunk_size = size;
        }
    }
    if let Ok(val) = std::env::var("GEOREF_NORMALIZE_BATCH_SIZE") {
        if let Ok(size) = val.parse() {
            config.normalize.batch_size = size;
        }
    }
    if let Ok(val) = std::env::var("GEOREF_NORMALIZE_PREFIX") {
        config.normalize.prefix = Some(val);
    }

    // Logging overrides
    if let Ok(val) = std::env::var("GEOREF_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("GEOREF_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("GEOREF_LOADER_TEST_VAR", "test_value");
        let input = "token = \"${GEOREF_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "token = \"test_value\"");
        std::env::remove_var("GEOREF_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("GEOREF_LOADER_MISSING_VAR");
        let input = "token = \"${GEOREF_LOADER_MISSING_VAR}\"";
        let result = substitute_env_vars(input);
        assert!(result.is_err());
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        std::env::remove_var("GEOREF_LOADER_COMMENTED_VAR");
        let input = "# token = \"${GEOREF_LOADER_COMMENTED_VAR}\"\nlog_level = \"info\"";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("${GEOREF_LOADER_COMMENTED_VAR}"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(matches!(result, Err(GeorefError::Configuration(_))));
    }

    #[test]
    fn test_load_config_or_default_missing_file() {
        let config = load_config_or_default("nonexistent-georef.toml").unwrap();
        assert_eq!(config.fetch.page_cap, 5000);
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[application]
log_level = "debug"

[api]
base_url = "http://localhost:5000/api"
token = "abc"

[fetch]
max_concurrency = 4

[fetch.retry]
max_retries = 2

[diff]
extension = "both"
exclude_paths = ["^nombre$"]

[normalize]
chunk_size = 200
batch_size = 50
prefix = "norm"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.api.base_url, "http://localhost:5000/api/");
        assert_eq!(
            config.api.token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("abc".to_string())
        );
        assert_eq!(config.fetch.max_concurrency, 4);
        assert_eq!(config.fetch.retry.max_retries, 2);
        assert!(config.diff.extension.writes_csv());
        assert_eq!(config.normalize.prefix.as_deref(), Some("norm"));
    }

    #[test]
    fn test_load_config_invalid_values() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[normalize]\nbatch_size = 0\n")
            .unwrap();
        temp_file.flush().unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("normalize.batch_size"));
    }
}
