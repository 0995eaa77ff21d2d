//! Authentication configuration.
//!
//! Tunable knobs for session lifetime, lockout, and audit retention. Defaults
//! match common operational policy (8 hour sessions, lockout after 5 failed
//! attempts) and can be overridden via the builder or environment variables.
//!
//! # Usage
//!
//! ```ignore
//! use airlock::AuthConfig;
//! use std::time::Duration;
//!
//! let config = AuthConfig::builder()
//!     .session_lifetime(Duration::from_secs(4 * 60 * 60))
//!     .max_failed_logins(3)
//!     .build();
//! ```

use std::time::Duration;

/// Configuration for the authentication manager.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// How long a session remains valid after login. Expiry is fixed at
    /// creation time; activity does not extend it.
    pub session_lifetime: Duration,

    /// Failed login attempts before the account is locked.
    pub max_failed_logins: u32,

    /// Maximum number of audit entries retained. Oldest entries are dropped
    /// first once the cap is reached.
    pub audit_capacity: usize,
}

impl Default for AuthConfig {
    /// Defaults: 8 hour sessions, lockout after 5 failures, 1000 audit entries.
    fn default() -> Self {
        Self {
            session_lifetime: Duration::from_secs(8 * 60 * 60),
            max_failed_logins: 5,
            audit_capacity: 1000,
        }
    }
}

impl AuthConfig {
    /// Create a new builder.
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything missing or unparseable.
    ///
    /// - `AIRLOCK_SESSION_LIFETIME_SECS`
    /// - `AIRLOCK_MAX_FAILED_LOGINS`
    /// - `AIRLOCK_AUDIT_CAPACITY`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let session_lifetime = std::env::var("AIRLOCK_SESSION_LIFETIME_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_lifetime);

        let max_failed_logins = std::env::var("AIRLOCK_MAX_FAILED_LOGINS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_failed_logins);

        let audit_capacity = std::env::var("AIRLOCK_AUDIT_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.audit_capacity);

        Self {
            session_lifetime,
            max_failed_logins,
            audit_capacity,
        }
    }
}

/// Builder for [`AuthConfig`].
#[derive(Debug, Clone, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the session lifetime.
    pub fn session_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.session_lifetime = lifetime;
        self
    }

    /// Set the failed-login threshold for lockout.
    pub fn max_failed_logins(mut self, max: u32) -> Self {
        self.config.max_failed_logins = max;
        self
    }

    /// Set the audit log retention cap.
    pub fn audit_capacity(mut self, capacity: usize) -> Self {
        self.config.audit_capacity = capacity;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> AuthConfig {
        self.config
    }
}
