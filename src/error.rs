//! Error taxonomy for authentication and authorization flows.
//!
//! Every condition here is an expected, recoverable outcome that callers are
//! meant to handle and render: nothing in this crate signals a failed login or
//! a denied permission check by panicking. The calling layer decides how each
//! kind maps onto its own surface (HTTP status, UI message, CLI exit code).
//!
//! # Credential errors
//!
//! A wrong username and a wrong password both surface as
//! [`AuthError::InvalidCredentials`]. Distinguishing them would let an
//! attacker enumerate valid usernames; the audit log records the precise
//! reason instead.

use crate::password::PasswordViolation;
use crate::role::{Permission, Role};
use crate::validation::ValidationError;
use uuid::Uuid;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Expected failure conditions for authentication and authorization.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// Input failed a shape/format check (username format, email format).
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A new password failed the strength policy. Carries every violated
    /// rule, not just the first.
    #[error("password does not meet policy: {}", format_violations(.0))]
    WeakPassword(Vec<PasswordViolation>),

    /// Username or email already taken (case-insensitive).
    #[error("{0} already exists")]
    Conflict(&'static str),

    /// No user with the given id.
    #[error("user {0} not found")]
    UserNotFound(Uuid),

    /// Wrong username or wrong password. Deliberately indistinguishable.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The account exists but has been deactivated.
    #[error("account is deactivated")]
    AccountDisabled,

    /// The account is locked after repeated credential failures.
    #[error("account is locked due to too many failed attempts")]
    AccountLocked,

    /// The actor attempted an operation on their own account where that is
    /// forbidden (e.g. self-deactivation).
    #[error("cannot {0} your own account")]
    SelfOperation(&'static str),

    /// No valid session for the presented token.
    #[error("authentication required")]
    NotAuthenticated,

    /// The actor lacks the required permission.
    #[error("access denied: requires permission {0}")]
    PermissionDenied(Permission),

    /// The actor's role rank is below the required role.
    #[error("access denied: requires role {0} or higher")]
    RoleDenied(Role),

    /// The actor's role rank does not allow managing the target user.
    #[error("insufficient role to manage this user")]
    CannotManage,
}

impl AuthError {
    /// Stable snake_case code for this error kind, used in audit detail maps
    /// and structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::WeakPassword(_) => "weak_password",
            Self::Conflict(_) => "conflict",
            Self::UserNotFound(_) => "not_found",
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccountDisabled => "account_disabled",
            Self::AccountLocked => "account_locked",
            Self::SelfOperation(_) => "self_operation",
            Self::NotAuthenticated => "not_authenticated",
            Self::PermissionDenied(_) => "permission_denied",
            Self::RoleDenied(_) => "permission_denied",
            Self::CannotManage => "permission_denied",
        }
    }

    /// Whether this error represents a denied authorization decision (as
    /// opposed to a failed one). Audit entries use the distinction.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated
                | Self::PermissionDenied(_)
                | Self::RoleDenied(_)
                | Self::CannotManage
        )
    }
}

fn format_violations(violations: &[PasswordViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        assert_eq!(AuthError::InvalidCredentials.kind(), "invalid_credentials");
        assert_eq!(AuthError::AccountLocked.kind(), "account_locked");
        assert_eq!(AuthError::Conflict("username").kind(), "conflict");
        assert_eq!(
            AuthError::PermissionDenied(Permission::CreateUsers).kind(),
            "permission_denied"
        );
    }

    #[test]
    fn test_denials() {
        assert!(AuthError::NotAuthenticated.is_denial());
        assert!(AuthError::PermissionDenied(Permission::CreateUsers).is_denial());
        assert!(AuthError::RoleDenied(Role::Manager).is_denial());
        assert!(!AuthError::InvalidCredentials.is_denial());
        assert!(!AuthError::AccountLocked.is_denial());
    }

    #[test]
    fn test_weak_password_lists_every_violation() {
        let err = AuthError::WeakPassword(vec![
            PasswordViolation::MissingUppercase,
            PasswordViolation::MissingDigit,
        ]);
        let msg = err.to_string();
        assert!(msg.contains("uppercase"));
        assert!(msg.contains("digit"));
    }

    #[test]
    fn test_credential_error_message() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "invalid username or password"
        );
    }
}
