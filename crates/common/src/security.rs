//! Identifier validation for values that end up in file names or URL paths.

use crate::{Result, ScholarError};

/// Maximum accepted identifier length.
const MAX_ID_LENGTH: usize = 128;

/// Validate an identifier used as a single path component.
///
/// - Rejects empty or whitespace-only ids
/// - Rejects `..`, path separators and anything outside `[A-Za-z0-9_-]`
/// - Enforces a length limit
pub fn validate_identifier(kind: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(ScholarError::Validation(format!("{kind} id cannot be empty")));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(ScholarError::Validation(format!(
            "{kind} id exceeds maximum length of {MAX_ID_LENGTH} characters"
        )));
    }

    if id.contains("..") {
        return Err(ScholarError::Validation(format!(
            "{kind} id '{id}' contains '..' which is not allowed"
        )));
    }

    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(ScholarError::Validation(format!(
            "{kind} id '{id}' contains invalid character '{bad}'"
        )));
    }

    Ok(())
}

/// Validate an id used as a file name: any text that stays a single path component.
///
/// Unlike [`validate_identifier`], dots, spaces and non-ASCII letters are
/// accepted. Rejects empty ids, `.` and `..`, separators, NUL and control
/// characters, and ids over the length limit.
pub fn validate_file_component(kind: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(ScholarError::Validation(format!("{kind} id cannot be empty")));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(ScholarError::Validation(format!(
            "{kind} id exceeds maximum length of {MAX_ID_LENGTH} bytes"
        )));
    }

    if id == "." || id == ".." {
        return Err(ScholarError::Validation(format!(
            "{kind} id '{id}' is not a file name"
        )));
    }

    if let Some(bad) = id
        .chars()
        .find(|c| matches!(c, '/' | '\\') || c.is_control())
    {
        return Err(ScholarError::Validation(format!(
            "{kind} id '{}' contains invalid character {bad:?}",
            id.escape_debug()
        )));
    }

    Ok(())
}
