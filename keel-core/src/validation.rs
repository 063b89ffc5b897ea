//! Field validation shared by services and agent operations.

use crate::ValidationError;

/// Maximum length of names and titles, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum length of free-text descriptions, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 10_000;

/// Trim a name and check it is non-empty and within [`MAX_NAME_LEN`].
pub fn validate_name(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(trimmed.to_string())
}

/// Check a description is within [`MAX_DESCRIPTION_LEN`]. Empty is allowed.
pub fn validate_description(field: &str, value: &str) -> Result<String, ValidationError> {
    if value.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_DESCRIPTION_LEN,
        });
    }
    Ok(value.to_string())
}

/// Drop blank acceptance criteria and trim the rest.
pub fn normalize_criteria(criteria: &[String]) -> Vec<String> {
    criteria
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}
