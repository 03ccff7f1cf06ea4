use crate::error::GtfError;
use regex::Regex;

/// Check `value` against a fixed allow-list
pub fn validate_allowed(name: &str, value: &str, allowed: &[&str]) -> Result<(), GtfError> {
    if allowed.contains(&value) {
        return Ok(());
    }

    Err(GtfError::InvalidArgument {
        name: name.to_string(),
        value: value.to_string(),
        expected: format!("one of {}", allowed.join(", ")),
    })
}

/// Check `value` against a regular expression, `format` describes it for the error message
pub fn validate_pattern(
    name: &str,
    value: &str,
    pattern: &Regex,
    format: &str,
) -> Result<(), GtfError> {
    if pattern.is_match(value) {
        return Ok(());
    }

    Err(GtfError::InvalidArgument {
        name: name.to_string(),
        value: value.to_string(),
        expected: format.to_string(),
    })
}
