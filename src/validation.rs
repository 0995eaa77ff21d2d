//! Input validation for identity fields.
//!
//! All user-supplied identity data is validated at the boundary before it
//! reaches the directory: usernames are constrained to a safe identifier
//! alphabet and emails to a pragmatic well-formedness check (no
//! deliverability guarantee). Errors carry the field, a stable code, and a
//! human-readable message so the calling layer can render them per field.

use std::fmt;

use serde::Serialize;

/// Username length bounds (inclusive).
pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;

/// Validation error with field context.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
pub struct ValidationError {
    /// Field that failed validation.
    pub field: &'static str,
    /// Stable code for programmatic handling.
    pub code: ValidationErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, code: ValidationErrorCode, message: impl Into<String>) -> Self {
        Self {
            field,
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorCode {
    /// Value is required but empty.
    Required,
    /// Value is outside its length bounds.
    InvalidLength,
    /// Value contains disallowed characters.
    InvalidCharacters,
    /// Email is not well-formed.
    InvalidEmail,
}

/// Validate a username: 3-30 ASCII alphanumeric characters or underscores.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::new(
            "username",
            ValidationErrorCode::Required,
            "Username is required",
        ));
    }

    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::new(
            "username",
            ValidationErrorCode::InvalidLength,
            format!(
                "Username must be {}-{} characters",
                USERNAME_MIN_LEN, USERNAME_MAX_LEN
            ),
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ValidationError::new(
            "username",
            ValidationErrorCode::InvalidCharacters,
            "Username may only contain letters, numbers, and underscores",
        ));
    }

    Ok(())
}

/// Validate email format.
///
/// Accepts most valid addresses while rejecting obviously malformed ones:
/// exactly one `@`, a non-empty local part without leading/trailing/double
/// dots, and a dotted domain of alphanumerics, dots, and hyphens.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let invalid = |message: &str| {
        ValidationError::new(
            "email",
            ValidationErrorCode::InvalidEmail,
            message.to_string(),
        )
    };

    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err(invalid("Invalid email format")),
    };

    if local.is_empty() || local.len() > 64 {
        return Err(invalid("Invalid email local part"));
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Err(invalid("Invalid email local part"));
    }

    if domain.is_empty() || domain.len() > 255 || !domain.contains('.') {
        return Err(invalid("Invalid email domain"));
    }
    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(invalid("Invalid email domain characters"));
    }

    Ok(())
}
