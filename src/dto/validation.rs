//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::roster::MAX_SKATER_NUMBER_LEN;

/// Longest accepted roster identifier.
pub const MAX_ROSTER_ID_LEN: usize = 64;

/// Validates that a roster ID is 1 to 64 ASCII letters, digits, `-` or `_`.
///
/// Roster IDs are file stems, so anything else could never name a loaded roster.
///
/// # Examples
///
/// ```ignore
/// validate_roster_id("toast-2024") // Ok
/// validate_roster_id("")           // Err - empty
/// validate_roster_id("../etc")     // Err - invalid characters
/// ```
pub fn validate_roster_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_ROSTER_ID_LEN {
        let mut err = ValidationError::new("roster_id_length");
        err.message = Some(
            format!(
                "Roster ID must be 1 to {MAX_ROSTER_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("roster_id_format");
        err.message =
            Some("Roster ID must contain only letters, digits, '-' or '_'".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a skater number is 1 to 4 characters without whitespace.
pub fn validate_skater_number(number: &str) -> Result<(), ValidationError> {
    let length = number.chars().count();
    if length == 0 || length > MAX_SKATER_NUMBER_LEN {
        let mut err = ValidationError::new("skater_number_length");
        err.message = Some(
            format!(
                "Skater number must be 1 to {MAX_SKATER_NUMBER_LEN} characters (got {length})"
            )
            .into(),
        );
        return Err(err);
    }

    if number.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("skater_number_format");
        err.message = Some("Skater number must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}
