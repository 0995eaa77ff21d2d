//! # Airlock
//!
//! Role-based authentication, session, and authorization core for internal
//! operations dashboards.
//!
//! This crate provides an embeddable, in-memory security layer: credential
//! verification, session lifecycle, a six-level role hierarchy with granular
//! permissions and per-user overrides, login lockout, and a bounded audit
//! trail. It has no opinion about the surface in front of it (HTTP, UI, CLI);
//! the calling layer maps [`AuthError`] kinds onto its own responses.
//!
//! ## Features
//!
//! - **Credential verification**: salted iterated SHA-256 hashes compared in
//!   constant time
//! - **Sessions**: unguessable bearer tokens, fixed lifetime, lazy expiry
//! - **Roles and permissions**: closed enums, static bundles, per-user grant
//!   and denial overrides
//! - **Lockout**: accounts lock after repeated failed logins
//! - **Audit trail**: every mutation and every denied or failed attempt,
//!   bounded retention, mirrored to structured `tracing` events
//!
//! ## Quick Start
//!
//! ```ignore
//! use airlock::{Actor, AuthConfig, AuthManager, NewUser, Origin, Permission, Role};
//!
//! let auth = AuthManager::new(AuthConfig::from_env());
//! airlock::seed_demo_accounts(&auth)?;
//!
//! let login = auth.login("admin", "Admin@123", Origin::default())?;
//! let admin = auth.require_permission(&login.token, Permission::CreateUsers)?;
//!
//! auth.create_user(Actor::User(admin.id), NewUser {
//!     username: "jsmith".into(),
//!     email: "jsmith@ops.example.com".into(),
//!     password: "Str0ng!Pass".into(),
//!     role: Role::Agent,
//!     first_name: "Jo".into(),
//!     last_name: "Smith".into(),
//!     department: "Customer Service".into(),
//!     must_change_password: true,
//! })?;
//! # Ok::<(), airlock::AuthError>(())
//! ```
//!
//! ## Concurrency
//!
//! Every store is internally synchronized; share [`AuthManager`] via `Arc`
//! across threads. Compound state transitions (failed-login counting and
//! lockout, uniqueness checks on insert) each run inside a single critical
//! section.

mod audit;
mod auth;
pub mod authz;
mod config;
mod error;
mod password;
mod role;
mod seed;
mod session;
mod user;
pub mod validation;

// Re-exports
pub use audit::{AuditAction, AuditEntry, AuditFilter, AuditLog, AuditOutcome, ResourceType};
pub use auth::{AuthManager, LoginSuccess};
pub use config::{AuthConfig, AuthConfigBuilder};
pub use error::{AuthError, Result};
pub use password::{
    hash_password, verify_password, PasswordPolicy, PasswordViolation, SPECIAL_CHARS,
};
pub use role::{Permission, Role, UnknownIdentifier};
pub use seed::seed_demo_accounts;
pub use session::{Origin, Session, SessionStore, SessionToken};
pub use user::{Actor, NewUser, User, UserDirectory, UserProfile, UserUpdate};
