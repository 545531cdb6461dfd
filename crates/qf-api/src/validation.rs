use validator::Validate;

use crate::error::ApiError;

/// Longest subject or topic name accepted.
pub const MAX_NAME_LEN: usize = 100;

/// Run the `validator` rules derived on a request payload.
pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))
}

/// Validate a subject or topic name taken from a path segment.
///
/// # Examples
/// ```
/// use qf_api::validation::validate_name;
///
/// assert!(validate_name("topic", "fractions").is_ok());
/// assert!(validate_name("topic", "  ").is_err());
/// ```
pub fn validate_name(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{field} cannot be empty")));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(ApiError::Validation(format!(
            "{field} cannot contain control characters"
        )));
    }
    Ok(())
}
