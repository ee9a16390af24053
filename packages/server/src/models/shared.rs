use serde::{Deserialize, Deserializer};

use crate::error::AppError;

/// Serde helper for partial-update semantics on nullable fields.
///
/// * JSON field absent  => `None`          (don't update)
/// * JSON field = null  => `Some(None)`    (set to NULL)
/// * JSON field = value => `Some(Some(v))` (set to value)
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// Validate a trimmed, required text field (1-`max` Unicode characters).
pub fn validate_text(value: &str, name: &str, max: usize) -> Result<(), AppError> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{name} must be 1-{max} characters"
        )));
    }
    Ok(())
}

/// Validate an optional text field; when present it follows [`validate_text`].
pub fn validate_optional_text(
    value: Option<&str>,
    name: &str,
    max: usize,
) -> Result<(), AppError> {
    match value {
        Some(v) => validate_text(v, name, max),
        None => Ok(()),
    }
}

pub fn validate_duration(duration: Option<i32>) -> Result<(), AppError> {
    if let Some(d) = duration
        && d < 0
    {
        return Err(AppError::Validation("Duration must be >= 0".into()));
    }
    Ok(())
}

/// Trim and drop empty strings.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
