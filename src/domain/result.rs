//! Result type alias for georef

use super::errors::GeorefError;

/// Result type alias for georef operations
///
/// # Examples
///
/// ```
/// use georef::domain::result::Result;
/// use georef::domain::errors::GeorefError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(GeorefError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, GeorefError>;
