//! Input validation helpers
//!
//! Centralized text length constants and validation functions for
//! values arriving through path and query parameters, where the
//! derive-based validation on request bodies cannot reach.

use crate::utils::AppError;

// ── Text length limits ──────────────────────────────────────────────

/// Entity names: restaurant id, resolver names, etc.
pub const MAX_NAME_LEN: usize = 200;

/// Notes, messages, reasons
pub const MAX_NOTE_LEN: usize = 500;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

/// Validate a mailbox key from the request path.
pub fn validate_mailbox_key(key: &str) -> Result<(), AppError> {
    if !shared::keys::is_valid_key(key) {
        return Err(AppError::validation(format!("invalid mailbox key: {key:?}")));
    }
    Ok(())
}
