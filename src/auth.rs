//! Authentication manager.
//!
//! [`AuthManager`] composes the user directory, session store, and audit log
//! into the login/logout, lockout, password, and user-administration flows.
//! It is an explicit process-wide service: construct it once at startup and
//! share it (`Arc`) with every request handler, rather than tying it to any
//! single caller's state.
//!
//! # Guards
//!
//! The [`require_auth`](AuthManager::require_auth),
//! [`require_permission`](AuthManager::require_permission), and
//! [`require_role`](AuthManager::require_role) methods are the interceptor
//! equivalents of decorator-style handler wrapping: call one at the top of a
//! handler and propagate its error. Denials are both returned to the caller
//! and recorded in the audit log — the two channels always move together.
//!
//! # Session invalidation on password change
//!
//! Changing or resetting a password invalidates every session of the
//! affected user. This is a deliberate hardening choice: a password change is
//! most often a response to suspected compromise, and any concurrent device
//! re-authenticates with the new credential.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEntry, AuditFilter, AuditLog, AuditOutcome, ResourceType};
use crate::authz;
use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::password::{hash_password, verify_password, PasswordPolicy};
use crate::role::{Permission, Role};
use crate::session::{Origin, Session, SessionStore, SessionToken};
use crate::user::{Actor, NewUser, User, UserDirectory, UserUpdate};

/// Successful login outcome.
///
/// When `must_change_password` is set the caller must route the user through
/// a password change before granting full access; the session is otherwise
/// valid.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub token: SessionToken,
    pub must_change_password: bool,
}

/// Orchestrates authentication, session lifecycle, and user administration.
pub struct AuthManager {
    config: AuthConfig,
    password_policy: PasswordPolicy,
    users: Arc<UserDirectory>,
    sessions: Arc<SessionStore>,
    audit: Arc<AuditLog>,
}

impl AuthManager {
    /// Create a manager with fresh, empty stores.
    pub fn new(config: AuthConfig) -> Self {
        let audit_capacity = config.audit_capacity;
        Self {
            config,
            password_policy: PasswordPolicy::default(),
            users: Arc::new(UserDirectory::new()),
            sessions: Arc::new(SessionStore::new()),
            audit: Arc::new(AuditLog::new(audit_capacity)),
        }
    }

    /// The user directory service.
    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    /// The session store service.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The password strength policy in force.
    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.password_policy
    }

    // ========================================================================
    // User management
    // ========================================================================

    /// Create a user.
    ///
    /// A user actor must hold `create_users`; [`Actor::System`] bypasses the
    /// check (bootstrap/seeding). Validates username format, email format,
    /// and password strength; uniqueness is enforced atomically by the
    /// directory. Role validity is guaranteed by the type.
    pub fn create_user(&self, actor: Actor, new_user: NewUser) -> Result<User> {
        self.check_actor_permission(actor, Permission::CreateUsers, "")?;

        crate::validation::validate_username(&new_user.username)?;
        crate::validation::validate_email(&new_user.email)?;
        self.password_policy
            .validate(&new_user.password)
            .map_err(AuthError::WeakPassword)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash: hash_password(&new_user.password),
            role: new_user.role,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            department: new_user.department,
            is_active: true,
            is_locked: false,
            failed_login_attempts: 0,
            last_login: None,
            created_at: now,
            updated_at: now,
            created_by: actor,
            password_changed_at: if new_user.must_change_password {
                None
            } else {
                Some(now)
            },
            must_change_password: new_user.must_change_password,
            custom_permissions: Default::default(),
            denied_permissions: Default::default(),
        };

        self.users.insert(user.clone())?;

        self.record(
            actor,
            AuditAction::CreateUser,
            ResourceType::User,
            user.id.to_string(),
            json!({ "username": user.username, "role": user.role }),
            AuditOutcome::Success,
        );

        Ok(user)
    }

    /// Apply a profile update. A user actor must hold `edit_users`, plus
    /// `assign_roles` when the update changes the role.
    pub fn update_user(&self, user_id: Uuid, actor: Actor, update: UserUpdate) -> Result<()> {
        self.check_actor_permission(actor, Permission::EditUsers, user_id.to_string())?;
        if update.role.is_some() {
            self.check_actor_permission(actor, Permission::AssignRoles, user_id.to_string())?;
        }

        if let Some(email) = &update.email {
            crate::validation::validate_email(email)?;
        }

        let changed = update.changed_fields();
        self.users.update(user_id, update)?;

        self.record(
            actor,
            AuditAction::UpdateUser,
            ResourceType::User,
            user_id.to_string(),
            json!({ "fields": changed }),
            AuditOutcome::Success,
        );

        Ok(())
    }

    /// Soft-delete a user: deactivate and invalidate all their sessions.
    ///
    /// Fails with [`AuthError::SelfOperation`] when the actor targets
    /// themself. A user actor needs `delete_users` and must outrank the
    /// target ([`authz::can_manage`]).
    pub fn deactivate_user(&self, user_id: Uuid, actor: Actor) -> Result<()> {
        if actor.user_id() == Some(user_id) {
            return Err(AuthError::SelfOperation("deactivate"));
        }

        self.check_actor_permission(actor, Permission::DeleteUsers, user_id.to_string())?;

        let target = self
            .users
            .get(user_id)
            .ok_or(AuthError::UserNotFound(user_id))?;

        if let Actor::User(actor_id) = actor {
            let acting = self
                .users
                .get(actor_id)
                .ok_or(AuthError::UserNotFound(actor_id))?;
            if !authz::can_manage(&acting, &target) {
                self.record(
                    actor,
                    AuditAction::AccessDenied,
                    ResourceType::User,
                    user_id.to_string(),
                    json!({ "reason": "cannot_manage", "target_role": target.role }),
                    AuditOutcome::Denied,
                );
                return Err(AuthError::CannotManage);
            }
        }

        self.users.modify(user_id, |user| {
            user.is_active = false;
            user.updated_at = Utc::now();
        })?;

        let invalidated = self.sessions.invalidate_for_user(user_id);
        tracing::info!(
            user_id = %user_id,
            username = %target.username,
            sessions_invalidated = invalidated,
            "User deactivated"
        );

        self.record(
            actor,
            AuditAction::DeactivateUser,
            ResourceType::User,
            user_id.to_string(),
            json!({ "username": target.username, "sessions_invalidated": invalidated }),
            AuditOutcome::Success,
        );

        Ok(())
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Authenticate and create a session.
    ///
    /// Unknown usernames and wrong passwords both fail with
    /// [`AuthError::InvalidCredentials`]; the audit log records which it was.
    /// Reaching the failed-attempt limit locks the account atomically with
    /// the counter increment; the locked state is reported from the *next*
    /// attempt on.
    pub fn login(&self, username: &str, password: &str, origin: Origin) -> Result<LoginSuccess> {
        let Some(user) = self.users.get_by_username(username) else {
            self.audit.record(
                AuditEntry::new(
                    None,
                    username,
                    AuditAction::LoginAttempt,
                    ResourceType::Session,
                    "",
                    json!({ "reason": "user_not_found" }),
                    AuditOutcome::Failure,
                )
                .with_ip(origin.ip_address.clone()),
            );
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_active {
            self.audit.record(
                AuditEntry::new(
                    Some(user.id),
                    &user.username,
                    AuditAction::LoginAttempt,
                    ResourceType::Session,
                    "",
                    json!({ "reason": "account_disabled" }),
                    AuditOutcome::Failure,
                )
                .with_ip(origin.ip_address.clone()),
            );
            return Err(AuthError::AccountDisabled);
        }

        if user.is_locked {
            self.audit.record(
                AuditEntry::new(
                    Some(user.id),
                    &user.username,
                    AuditAction::LoginAttempt,
                    ResourceType::Session,
                    "",
                    json!({ "reason": "account_locked" }),
                    AuditOutcome::Failure,
                )
                .with_ip(origin.ip_address.clone()),
            );
            return Err(AuthError::AccountLocked);
        }

        // Hashing is the one CPU-bound step; keep it outside the write lock.
        if !verify_password(password, &user.password_hash) {
            // Increment and (possibly) lock in one critical section so
            // concurrent failures cannot race past the limit.
            let max = self.config.max_failed_logins;
            let (attempts, locked_now) = self.users.modify(user.id, |u| {
                u.failed_login_attempts += 1;
                if u.failed_login_attempts >= max && !u.is_locked {
                    u.is_locked = true;
                    (u.failed_login_attempts, true)
                } else {
                    (u.failed_login_attempts, false)
                }
            })?;

            if locked_now {
                tracing::warn!(
                    username = %user.username,
                    attempts,
                    "Account locked after repeated failed logins"
                );
                self.audit.record(
                    AuditEntry::new(
                        Some(user.id),
                        &user.username,
                        AuditAction::AccountLocked,
                        ResourceType::User,
                        user.id.to_string(),
                        json!({ "attempts": attempts }),
                        AuditOutcome::Failure,
                    )
                    .with_ip(origin.ip_address.clone()),
                );
            } else {
                self.audit.record(
                    AuditEntry::new(
                        Some(user.id),
                        &user.username,
                        AuditAction::LoginAttempt,
                        ResourceType::Session,
                        "",
                        json!({ "reason": "invalid_password", "attempts": attempts }),
                        AuditOutcome::Failure,
                    )
                    .with_ip(origin.ip_address.clone()),
                );
            }

            return Err(AuthError::InvalidCredentials);
        }

        self.users.modify(user.id, |u| {
            u.failed_login_attempts = 0;
            u.last_login = Some(Utc::now());
        })?;

        let token = self
            .sessions
            .create(&user, self.config.session_lifetime, origin.clone());

        self.audit.record(
            AuditEntry::new(
                Some(user.id),
                &user.username,
                AuditAction::Login,
                ResourceType::Session,
                "",
                json!({}),
                AuditOutcome::Success,
            )
            .with_ip(origin.ip_address),
        );

        Ok(LoginSuccess {
            token,
            must_change_password: user.must_change_password,
        })
    }

    /// End a session. Idempotent: an unknown or already-ended token is a
    /// no-op, not an error.
    pub fn logout(&self, token: &SessionToken) {
        if let Some(session) = self.sessions.invalidate(token) {
            self.audit.record(AuditEntry::new(
                Some(session.user_id),
                &session.username,
                AuditAction::Logout,
                ResourceType::Session,
                "",
                json!({}),
                AuditOutcome::Success,
            ));
        }
    }

    /// Resolve the session for a token, applying lazy expiry.
    pub fn current_session(&self, token: &SessionToken) -> Option<Session> {
        self.sessions.resolve(token)
    }

    /// Resolve the user behind a token. `None` when the session is missing,
    /// expired, or the user has since been deactivated.
    pub fn current_user(&self, token: &SessionToken) -> Option<User> {
        let session = self.sessions.resolve(token)?;
        self.users.get(session.user_id).filter(|u| u.is_active)
    }

    /// Whether the token maps to a live session.
    pub fn is_authenticated(&self, token: &SessionToken) -> bool {
        self.current_session(token).is_some()
    }

    // ========================================================================
    // Passwords
    // ========================================================================

    /// Change a password, verifying the current one first.
    ///
    /// Clears the must-change flag and invalidates every session of the user
    /// (see module docs).
    pub fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self
            .users
            .get(user_id)
            .ok_or(AuthError::UserNotFound(user_id))?;

        if !verify_password(current_password, &user.password_hash) {
            self.audit.record(AuditEntry::new(
                Some(user.id),
                &user.username,
                AuditAction::ChangePassword,
                ResourceType::User,
                user.id.to_string(),
                json!({ "reason": "invalid_current_password" }),
                AuditOutcome::Failure,
            ));
            return Err(AuthError::InvalidCredentials);
        }

        if let Err(violations) = self.password_policy.validate(new_password) {
            self.audit.record(AuditEntry::new(
                Some(user.id),
                &user.username,
                AuditAction::ChangePassword,
                ResourceType::User,
                user.id.to_string(),
                json!({ "reason": "weak_password" }),
                AuditOutcome::Failure,
            ));
            return Err(AuthError::WeakPassword(violations));
        }

        let new_hash = hash_password(new_password);
        self.users.modify(user_id, |u| {
            u.password_hash = new_hash;
            u.must_change_password = false;
            u.password_changed_at = Some(Utc::now());
            u.updated_at = Utc::now();
        })?;

        self.sessions.invalidate_for_user(user_id);

        self.record(
            Actor::User(user_id),
            AuditAction::ChangePassword,
            ResourceType::User,
            user_id.to_string(),
            json!({}),
            AuditOutcome::Success,
        );

        Ok(())
    }

    /// Reset a password to a generated temporary one, returned exactly once
    /// in plaintext. Sets the must-change flag, clears lockout state, and
    /// invalidates the user's sessions. A user actor needs `edit_users`.
    pub fn reset_password(&self, user_id: Uuid, actor: Actor) -> Result<String> {
        self.check_actor_permission(actor, Permission::EditUsers, user_id.to_string())?;

        let target = self
            .users
            .get(user_id)
            .ok_or(AuthError::UserNotFound(user_id))?;

        let temp_password = self.password_policy.generate_temporary();
        let new_hash = hash_password(&temp_password);

        self.users.modify(user_id, |u| {
            u.password_hash = new_hash;
            u.must_change_password = true;
            u.is_locked = false;
            u.failed_login_attempts = 0;
            u.updated_at = Utc::now();
        })?;

        self.sessions.invalidate_for_user(user_id);

        // The temporary password itself is never logged or stored.
        self.record(
            actor,
            AuditAction::ResetPassword,
            ResourceType::User,
            user_id.to_string(),
            json!({ "username": target.username }),
            AuditOutcome::Success,
        );

        Ok(temp_password)
    }

    /// Clear a lockout. A user actor needs `edit_users`.
    pub fn unlock_user(&self, user_id: Uuid, actor: Actor) -> Result<()> {
        self.check_actor_permission(actor, Permission::EditUsers, user_id.to_string())?;

        let target = self
            .users
            .get(user_id)
            .ok_or(AuthError::UserNotFound(user_id))?;

        self.users.modify(user_id, |u| {
            u.is_locked = false;
            u.failed_login_attempts = 0;
            u.updated_at = Utc::now();
        })?;

        self.record(
            actor,
            AuditAction::UnlockUser,
            ResourceType::User,
            user_id.to_string(),
            json!({ "username": target.username }),
            AuditOutcome::Success,
        );

        Ok(())
    }

    // ========================================================================
    // Authorization
    // ========================================================================

    /// Whether the token's user holds a permission. `false` when not
    /// authenticated.
    pub fn has_permission(&self, token: &SessionToken, permission: Permission) -> bool {
        self.current_user(token)
            .map(|u| authz::has_permission(&u, permission))
            .unwrap_or(false)
    }

    /// Whether the token's user holds the role or a higher one.
    pub fn has_role_or_higher(&self, token: &SessionToken, role: Role) -> bool {
        self.current_user(token)
            .map(|u| authz::has_role_or_higher(&u, role))
            .unwrap_or(false)
    }

    /// Guard: require a live session. Returns the user or
    /// [`AuthError::NotAuthenticated`], audited as denied.
    pub fn require_auth(&self, token: &SessionToken) -> Result<User> {
        match self.current_user(token) {
            Some(user) => Ok(user),
            None => {
                self.audit.record(AuditEntry::new(
                    None,
                    "anonymous",
                    AuditAction::AccessDenied,
                    ResourceType::Session,
                    "",
                    json!({ "reason": "not_authenticated" }),
                    AuditOutcome::Denied,
                ));
                Err(AuthError::NotAuthenticated)
            }
        }
    }

    /// Guard: require a live session holding a permission.
    pub fn require_permission(
        &self,
        token: &SessionToken,
        permission: Permission,
    ) -> Result<User> {
        let user = self.require_auth(token)?;
        if authz::has_permission(&user, permission) {
            Ok(user)
        } else {
            self.audit.record(AuditEntry::new(
                Some(user.id),
                &user.username,
                AuditAction::AccessDenied,
                ResourceType::Session,
                "",
                json!({ "required_permission": permission }),
                AuditOutcome::Denied,
            ));
            Err(AuthError::PermissionDenied(permission))
        }
    }

    /// Guard: require a live session at or above a role.
    pub fn require_role(&self, token: &SessionToken, role: Role) -> Result<User> {
        let user = self.require_auth(token)?;
        if authz::has_role_or_higher(&user, role) {
            Ok(user)
        } else {
            self.audit.record(AuditEntry::new(
                Some(user.id),
                &user.username,
                AuditAction::AccessDenied,
                ResourceType::Session,
                "",
                json!({ "required_role": role }),
                AuditOutcome::Denied,
            ));
            Err(AuthError::RoleDenied(role))
        }
    }

    // ========================================================================
    // Audit
    // ========================================================================

    /// Query the audit log.
    pub fn get_audit_log(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.audit.query(filter)
    }

    /// Resolve an actor to a display name for the audit trail.
    fn actor_name(&self, actor: Actor) -> String {
        match actor {
            Actor::System => "system".to_string(),
            Actor::User(id) => self
                .users
                .get(id)
                .map(|u| u.username)
                .unwrap_or_else(|| id.to_string()),
        }
    }

    fn record(
        &self,
        actor: Actor,
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: String,
        details: serde_json::Value,
        outcome: AuditOutcome,
    ) {
        self.audit.record(AuditEntry::new(
            actor.user_id(),
            self.actor_name(actor),
            action,
            resource_type,
            resource_id,
            details,
            outcome,
        ));
    }

    /// Permission check for administrative operations. [`Actor::System`]
    /// always passes; a user actor must exist, be active, and hold the
    /// permission. Denials are audited.
    fn check_actor_permission(
        &self,
        actor: Actor,
        permission: Permission,
        resource_id: impl Into<String>,
    ) -> Result<()> {
        let Actor::User(actor_id) = actor else {
            return Ok(());
        };

        let acting = self
            .users
            .get(actor_id)
            .ok_or(AuthError::UserNotFound(actor_id))?;

        if authz::has_permission(&acting, permission) {
            return Ok(());
        }

        self.audit.record(AuditEntry::new(
            Some(acting.id),
            &acting.username,
            AuditAction::AccessDenied,
            ResourceType::User,
            resource_id.into(),
            json!({ "required_permission": permission }),
            AuditOutcome::Denied,
        ));
        Err(AuthError::PermissionDenied(permission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn manager() -> AuthManager {
        AuthManager::new(AuthConfig::default())
    }

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{username}@ops.example.com"),
            password: format!("{username}P@ss1x"),
            role,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            department: "Operations".to_string(),
            must_change_password: false,
        }
    }

    fn create(auth: &AuthManager, username: &str, role: Role) -> User {
        auth.create_user(Actor::System, new_user(username, role))
            .unwrap()
    }

    fn login(auth: &AuthManager, username: &str) -> LoginSuccess {
        auth.login(username, &format!("{username}P@ss1x"), Origin::default())
            .unwrap()
    }

    #[test]
    fn test_login_success_creates_session() {
        let auth = manager();
        let user = create(&auth, "alice", Role::Agent);

        let outcome = login(&auth, "alice");
        assert!(!outcome.must_change_password);
        assert!(auth.is_authenticated(&outcome.token));
        assert_eq!(auth.current_user(&outcome.token).unwrap().id, user.id);

        let refreshed = auth.users().get(user.id).unwrap();
        assert!(refreshed.last_login.is_some());
    }

    #[test]
    fn test_login_is_case_insensitive_on_username() {
        let auth = manager();
        create(&auth, "alice", Role::Agent);
        assert!(auth.login("ALICE", "aliceP@ss1x", Origin::default()).is_ok());
    }

    #[test]
    fn test_unknown_user_and_wrong_password_same_error_kind() {
        let auth = manager();
        create(&auth, "alice", Role::Agent);

        let unknown = auth
            .login("nobody", "whatever", Origin::default())
            .unwrap_err();
        let wrong = auth
            .login("alice", "wrongwrong", Origin::default())
            .unwrap_err();

        assert_eq!(unknown.kind(), "invalid_credentials");
        assert_eq!(wrong.kind(), "invalid_credentials");

        // The audit trail distinguishes what the caller cannot.
        let attempts =
            auth.get_audit_log(&AuditFilter::default().action(AuditAction::LoginAttempt));
        let reasons: Vec<&str> = attempts
            .iter()
            .filter_map(|e| e.details.get("reason").and_then(|r| r.as_str()))
            .collect();
        assert!(reasons.contains(&"user_not_found"));
        assert!(reasons.contains(&"invalid_password"));
    }

    #[test]
    fn test_lockout_after_repeated_failures() {
        let auth = manager();
        let user = create(&auth, "alice", Role::Agent);

        for _ in 0..4 {
            let err = auth
                .login("alice", "wrongwrong", Origin::default())
                .unwrap_err();
            assert_eq!(err.kind(), "invalid_credentials");
        }

        // Fifth failure crosses the limit: still invalid_credentials, but
        // the account locks and the lock is audited.
        let fifth = auth
            .login("alice", "wrongwrong", Origin::default())
            .unwrap_err();
        assert_eq!(fifth.kind(), "invalid_credentials");
        assert!(auth.users().get(user.id).unwrap().is_locked);
        assert!(!auth
            .get_audit_log(&AuditFilter::default().action(AuditAction::AccountLocked))
            .is_empty());

        // Sixth attempt, even with the right password, reports the lock.
        let sixth = auth
            .login("alice", "aliceP@ss1x", Origin::default())
            .unwrap_err();
        assert!(matches!(sixth, AuthError::AccountLocked));
    }

    #[test]
    fn test_successful_login_resets_failure_counter() {
        let auth = manager();
        let user = create(&auth, "alice", Role::Agent);

        auth.login("alice", "wrongwrong", Origin::default()).ok();
        auth.login("alice", "wrongwrong", Origin::default()).ok();
        login(&auth, "alice");

        assert_eq!(auth.users().get(user.id).unwrap().failed_login_attempts, 0);
    }

    #[test]
    fn test_disabled_account_cannot_login() {
        let auth = manager();
        let admin = create(&auth, "admin1", Role::Admin);
        let agent = create(&auth, "alice", Role::Agent);

        auth.deactivate_user(agent.id, Actor::User(admin.id)).unwrap();

        let err = auth
            .login("alice", "aliceP@ss1x", Origin::default())
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountDisabled));
    }

    #[test]
    fn test_logout_is_idempotent() {
        let auth = manager();
        create(&auth, "alice", Role::Agent);
        let outcome = login(&auth, "alice");

        auth.logout(&outcome.token);
        assert!(!auth.is_authenticated(&outcome.token));
        // A second logout (and one with a bogus token) is a no-op.
        auth.logout(&outcome.token);
        auth.logout(&SessionToken::from("bogus"));

        let logouts = auth.get_audit_log(&AuditFilter::default().action(AuditAction::Logout));
        assert_eq!(logouts.len(), 1);
    }

    #[test]
    fn test_expired_session_behaves_logged_out() {
        let config = AuthConfig::builder()
            .session_lifetime(Duration::ZERO)
            .build();
        let auth = AuthManager::new(config);
        create(&auth, "alice", Role::Agent);

        let outcome = login(&auth, "alice");
        assert!(!auth.is_authenticated(&outcome.token));
        assert!(auth.current_user(&outcome.token).is_none());
    }

    #[test]
    fn test_create_user_conflicts() {
        let auth = manager();
        create(&auth, "bob", Role::Agent);

        // Case-only difference still conflicts.
        let mut dup = new_user("BOB", Role::Agent);
        dup.email = "other@ops.example.com".to_string();
        let err = auth.create_user(Actor::System, dup).unwrap_err();
        assert!(matches!(err, AuthError::Conflict("username")));

        let mut email_dup = new_user("carol", Role::Agent);
        email_dup.email = "bob@ops.example.com".to_string();
        let err = auth.create_user(Actor::System, email_dup).unwrap_err();
        assert!(matches!(err, AuthError::Conflict("email")));
    }

    #[test]
    fn test_create_user_validates_inputs() {
        let auth = manager();

        let mut bad_username = new_user("ab", Role::Agent);
        bad_username.email = "ok@ops.example.com".to_string();
        assert!(matches!(
            auth.create_user(Actor::System, bad_username),
            Err(AuthError::Validation(_))
        ));

        let mut bad_email = new_user("carol", Role::Agent);
        bad_email.email = "not-an-email".to_string();
        assert!(matches!(
            auth.create_user(Actor::System, bad_email),
            Err(AuthError::Validation(_))
        ));

        let mut weak = new_user("dave", Role::Agent);
        weak.password = "weak".to_string();
        assert!(matches!(
            auth.create_user(Actor::System, weak),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_change_password_full_flow() {
        let auth = manager();
        let user = create(&auth, "alice", Role::Agent);
        let outcome = login(&auth, "alice");

        // Wrong current password.
        let err = auth
            .change_password(user.id, "wrongwrong", "NewP@ss1word")
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        // Weak new password carries the violation list.
        let err = auth
            .change_password(user.id, "aliceP@ss1x", "weak")
            .unwrap_err();
        match err {
            AuthError::WeakPassword(violations) => assert!(!violations.is_empty()),
            other => panic!("expected WeakPassword, got {other:?}"),
        }

        // Success invalidates existing sessions.
        auth.change_password(user.id, "aliceP@ss1x", "NewP@ss1word")
            .unwrap();
        assert!(!auth.is_authenticated(&outcome.token));

        // Old password no longer works; the new one does.
        assert!(auth
            .login("alice", "aliceP@ss1x", Origin::default())
            .is_err());
        assert!(auth
            .login("alice", "NewP@ss1word", Origin::default())
            .is_ok());
    }

    #[test]
    fn test_reset_password_issues_compliant_temporary() {
        let auth = manager();
        let admin = create(&auth, "admin1", Role::Admin);
        let user = create(&auth, "alice", Role::Agent);

        // Lock the account first; reset must clear the lockout.
        for _ in 0..5 {
            auth.login("alice", "wrongwrong", Origin::default()).ok();
        }
        assert!(auth.users().get(user.id).unwrap().is_locked);

        let temp = auth.reset_password(user.id, Actor::User(admin.id)).unwrap();
        assert!(auth.password_policy().validate(&temp).is_ok());

        let refreshed = auth.users().get(user.id).unwrap();
        assert!(!refreshed.is_locked);
        assert_eq!(refreshed.failed_login_attempts, 0);
        assert!(refreshed.must_change_password);

        // Temporary password logs in but signals the forced change.
        let outcome = auth.login("alice", &temp, Origin::default()).unwrap();
        assert!(outcome.must_change_password);

        // The plaintext never reaches the audit log.
        for entry in auth.get_audit_log(&AuditFilter::default().limit(1000)) {
            assert!(!entry.details.to_string().contains(&temp));
        }
    }

    #[test]
    fn test_unlock_user() {
        let auth = manager();
        let admin = create(&auth, "admin1", Role::Admin);
        let user = create(&auth, "alice", Role::Agent);

        for _ in 0..5 {
            auth.login("alice", "wrongwrong", Origin::default()).ok();
        }
        assert!(auth.users().get(user.id).unwrap().is_locked);

        auth.unlock_user(user.id, Actor::User(admin.id)).unwrap();
        assert!(!auth.users().get(user.id).unwrap().is_locked);
        assert!(auth.login("alice", "aliceP@ss1x", Origin::default()).is_ok());
    }

    #[test]
    fn test_deactivation_invalidates_sessions() {
        let auth = manager();
        let admin = create(&auth, "admin1", Role::Admin);
        let user = create(&auth, "alice", Role::Agent);

        let outcome = login(&auth, "alice");
        assert!(auth.is_authenticated(&outcome.token));

        auth.deactivate_user(user.id, Actor::User(admin.id)).unwrap();
        assert!(!auth.is_authenticated(&outcome.token));
        assert!(auth.current_user(&outcome.token).is_none());
    }

    #[test]
    fn test_cannot_deactivate_self() {
        let auth = manager();
        let admin = create(&auth, "admin1", Role::Admin);

        let err = auth
            .deactivate_user(admin.id, Actor::User(admin.id))
            .unwrap_err();
        assert!(matches!(err, AuthError::SelfOperation(_)));
        assert!(auth.users().get(admin.id).unwrap().is_active);
    }

    #[test]
    fn test_deactivation_respects_role_hierarchy() {
        let auth = manager();
        let admin = create(&auth, "admin1", Role::Admin);
        let peer = create(&auth, "admin2", Role::Admin);

        // Peers cannot manage each other.
        let err = auth
            .deactivate_user(peer.id, Actor::User(admin.id))
            .unwrap_err();
        assert!(matches!(err, AuthError::CannotManage));
    }

    #[test]
    fn test_update_user_requires_assign_roles_for_role_change() {
        let auth = manager();
        let manager_user = create(&auth, "boss", Role::Manager);
        let agent = create(&auth, "alice", Role::Agent);

        // Managers lack edit_users entirely.
        let update = UserUpdate {
            department: Some("Dispatch".to_string()),
            ..Default::default()
        };
        let err = auth
            .update_user(agent.id, Actor::User(manager_user.id), update)
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::PermissionDenied(Permission::EditUsers)
        ));

        // Admins hold both edit_users and assign_roles.
        let admin = create(&auth, "admin1", Role::Admin);
        let update = UserUpdate {
            role: Some(Role::SeniorAgent),
            ..Default::default()
        };
        auth.update_user(agent.id, Actor::User(admin.id), update)
            .unwrap();
        assert_eq!(auth.users().get(agent.id).unwrap().role, Role::SeniorAgent);

        let updates = auth.get_audit_log(&AuditFilter::default().action(AuditAction::UpdateUser));
        assert_eq!(updates[0].details["fields"][0], "role");
    }

    #[test]
    fn test_update_user_cannot_alias_existing_email() {
        let auth = manager();
        let admin = create(&auth, "admin1", Role::Admin);
        create(&auth, "alice", Role::Agent);
        let bob = create(&auth, "bob", Role::Agent);

        let update = UserUpdate {
            email: Some("ALICE@ops.example.com".to_string()),
            ..Default::default()
        };
        let err = auth
            .update_user(bob.id, Actor::User(admin.id), update)
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict("email")));

        // Uniqueness holds afterwards.
        let holders = auth
            .users()
            .all()
            .iter()
            .filter(|u| u.email.eq_ignore_ascii_case("alice@ops.example.com"))
            .count();
        assert_eq!(holders, 1);
        assert_eq!(auth.users().get(bob.id).unwrap().email, "bob@ops.example.com");
    }

    #[test]
    fn test_agent_cannot_create_users() {
        let auth = manager();
        let agent = create(&auth, "alice", Role::Agent);

        let err = auth
            .create_user(Actor::User(agent.id), new_user("bob", Role::Agent))
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::PermissionDenied(Permission::CreateUsers)
        ));

        // The denial and the surfaced error moved together.
        let denials =
            auth.get_audit_log(&AuditFilter::default().action(AuditAction::AccessDenied));
        assert_eq!(denials.len(), 1);
        assert_eq!(denials[0].outcome, AuditOutcome::Denied);
    }

    #[test]
    fn test_guards() {
        let auth = manager();
        create(&auth, "alice", Role::Agent);
        let outcome = login(&auth, "alice");

        // require_auth passes for a live session.
        let user = auth.require_auth(&outcome.token).unwrap();
        assert_eq!(user.username, "alice");

        // Permission the agent role holds.
        assert!(auth
            .require_permission(&outcome.token, Permission::ViewTransactions)
            .is_ok());
        // One it does not.
        assert!(matches!(
            auth.require_permission(&outcome.token, Permission::ApproveRefund),
            Err(AuthError::PermissionDenied(Permission::ApproveRefund))
        ));

        // Role guard.
        assert!(auth.require_role(&outcome.token, Role::Agent).is_ok());
        assert!(matches!(
            auth.require_role(&outcome.token, Role::Manager),
            Err(AuthError::RoleDenied(Role::Manager))
        ));

        // No session at all.
        assert!(matches!(
            auth.require_auth(&SessionToken::from("bogus")),
            Err(AuthError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_permission_queries_are_false_when_unauthenticated() {
        let auth = manager();
        let token = SessionToken::from("bogus");
        assert!(!auth.has_permission(&token, Permission::ViewTransactions));
        assert!(!auth.has_role_or_higher(&token, Role::Viewer));
    }

    #[test]
    fn test_end_to_end_admin_and_agent() {
        let auth = manager();
        crate::seed::seed_demo_accounts(&auth).unwrap();

        let admin_login = auth
            .login("admin", "Admin@123", Origin::default())
            .unwrap();
        let admin = auth.current_user(&admin_login.token).unwrap();

        // Admin creates a new agent.
        let bob = auth
            .create_user(
                Actor::User(admin.id),
                NewUser {
                    username: "bob".to_string(),
                    email: "bob@x.com".to_string(),
                    password: "Bob@Pass1".to_string(),
                    role: Role::Agent,
                    first_name: "Bob".to_string(),
                    last_name: "Ng".to_string(),
                    department: "Ops".to_string(),
                    must_change_password: false,
                },
            )
            .unwrap();
        assert_eq!(bob.role, Role::Agent);

        // Creating the same username again conflicts.
        let err = auth
            .create_user(
                Actor::User(admin.id),
                NewUser {
                    username: "bob".to_string(),
                    email: "bob2@x.com".to_string(),
                    password: "Bob@Pass1".to_string(),
                    role: Role::Agent,
                    first_name: "Bob".to_string(),
                    last_name: "Ng".to_string(),
                    department: "Ops".to_string(),
                    must_change_password: false,
                },
            )
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict("username")));

        // An agent may not create users.
        let agent_login = auth
            .login("agent", "Agent@123", Origin::default())
            .unwrap();
        let agent = auth.current_user(&agent_login.token).unwrap();
        let err = auth
            .create_user(Actor::User(agent.id), new_user("eve", Role::Agent))
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::PermissionDenied(Permission::CreateUsers)
        ));
    }
}
