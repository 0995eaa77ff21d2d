//! User records and the in-memory user directory.
//!
//! The password hash is crate-private and deliberately absent from the
//! serializable [`UserProfile`]; nothing outside the authentication boundary
//! can observe it. Users are never physically deleted — deactivation flips
//! the active flag and the manager cascades session invalidation.
//!
//! [`UserDirectory`] is an explicit, process-wide service: construct it once
//! and share it, rather than tying user storage to any single caller's
//! session. Username and email uniqueness (case-insensitive) is enforced
//! inside a single write-lock critical section so concurrent creates cannot
//! race past the check.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::role::{Permission, Role};

/// Who performed an operation: a real user or the system itself (bootstrap,
/// seeding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// The system, outside any session (bootstrap/seeding).
    System,
    /// An authenticated user.
    User(Uuid),
}

impl Actor {
    /// The acting user's id, if any.
    pub fn user_id(self) -> Option<Uuid> {
        match self {
            Actor::System => None,
            Actor::User(id) => Some(id),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::User(id) => write!(f, "{id}"),
        }
    }
}

/// A user account.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique identifier.
    pub id: Uuid,
    /// Unique username (case-insensitive).
    pub username: String,
    /// Unique email (case-insensitive).
    pub email: String,
    /// Salted iterated hash; never leaves the authentication boundary.
    pub(crate) password_hash: String,
    /// Assigned role.
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub department: String,
    /// Deactivated users cannot log in and hold no effective permissions.
    pub is_active: bool,
    /// Locked after repeated credential failures; cleared by unlock/reset.
    pub is_locked: bool,
    pub failed_login_attempts: u32,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Actor,
    pub password_changed_at: Option<DateTime<Utc>>,
    /// Set by password reset; the login outcome signals the caller to force
    /// a change before granting full access.
    pub must_change_password: bool,
    /// Permissions granted beyond the role bundle.
    pub custom_permissions: HashSet<Permission>,
    /// Permissions explicitly removed even if the role grants them.
    pub denied_permissions: HashSet<Permission>,
}

impl User {
    /// Full display name.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Serializable view of this user. The password hash is not part of the
    /// serialization contract.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            department: self.department.clone(),
            is_active: self.is_active,
            is_locked: self.is_locked,
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
            must_change_password: self.must_change_password,
        }
    }
}

/// Outbound user representation. Deliberately omits the password hash and
/// the internal lockout counter.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub department: String,
    pub is_active: bool,
    pub is_locked: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub must_change_password: bool,
}

/// Inputs for creating a user. The plaintext password is consumed by the
/// manager and only the hash is retained.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub department: String,
    /// Force a password change on first login (provisioned accounts).
    pub must_change_password: bool,
}

/// Mutable fields for a profile update. Only what is representable here can
/// change through [`crate::AuthManager::update_user`]; everything else
/// (password hash, lockout state, timestamps) moves through dedicated
/// operations.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
    pub role: Option<Role>,
    pub custom_permissions: Option<HashSet<Permission>>,
    pub denied_permissions: Option<HashSet<Permission>>,
}

impl UserUpdate {
    /// Names of the fields this update touches, for the audit trail.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.email.is_some() {
            fields.push("email");
        }
        if self.first_name.is_some() {
            fields.push("first_name");
        }
        if self.last_name.is_some() {
            fields.push("last_name");
        }
        if self.department.is_some() {
            fields.push("department");
        }
        if self.is_active.is_some() {
            fields.push("is_active");
        }
        if self.role.is_some() {
            fields.push("role");
        }
        if self.custom_permissions.is_some() {
            fields.push("custom_permissions");
        }
        if self.denied_permissions.is_some() {
            fields.push("denied_permissions");
        }
        fields
    }

    /// Whether the update changes anything at all.
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    pub(crate) fn apply(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(department) = self.department {
            user.department = department;
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(custom) = self.custom_permissions {
            user.custom_permissions = custom;
        }
        if let Some(denied) = self.denied_permissions {
            user.denied_permissions = denied;
        }
        user.updated_at = Utc::now();
    }
}

// ============================================================================
// Directory
// ============================================================================

/// In-memory user directory keyed by user id.
///
/// Internally synchronized; share via `Arc`.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<HashMap<Uuid, User>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new user, enforcing case-insensitive username and email
    /// uniqueness atomically with the insert.
    pub fn insert(&self, user: User) -> Result<()> {
        let mut users = self.users.write();

        if users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&user.username))
        {
            return Err(AuthError::Conflict("username"));
        }
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AuthError::Conflict("email"));
        }

        users.insert(user.id, user);
        Ok(())
    }

    /// Look up by id.
    pub fn get(&self, id: Uuid) -> Option<User> {
        self.users.read().get(&id).cloned()
    }

    /// Look up by username, case-insensitive.
    pub fn get_by_username(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned()
    }

    /// Look up by email, case-insensitive.
    pub fn get_by_email(&self, email: &str) -> Option<User> {
        self.users
            .read()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    /// All users, in no particular order.
    pub fn all(&self) -> Vec<User> {
        self.users.read().values().cloned().collect()
    }

    /// Number of users (active or not).
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether the directory holds no users.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Apply a profile update under the write lock. A changed email is
    /// checked for case-insensitive uniqueness against every other user in
    /// the same critical section as the write, so an update cannot alias an
    /// existing address any more than an insert can.
    pub(crate) fn update(&self, id: Uuid, update: UserUpdate) -> Result<()> {
        let mut users = self.users.write();

        if let Some(email) = &update.email {
            if users
                .values()
                .any(|u| u.id != id && u.email.eq_ignore_ascii_case(email))
            {
                return Err(AuthError::Conflict("email"));
            }
        }

        let user = users.get_mut(&id).ok_or(AuthError::UserNotFound(id))?;
        update.apply(user);
        Ok(())
    }

    /// Run a mutation against a user under the write lock and return the
    /// closure's result. The single critical section is what makes compound
    /// transitions (failed-counter increment then lockout) atomic.
    pub(crate) fn modify<R>(&self, id: Uuid, f: impl FnOnce(&mut User) -> R) -> Result<R> {
        let mut users = self.users.write();
        let user = users.get_mut(&id).ok_or(AuthError::UserNotFound(id))?;
        Ok(f(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(username: &str, email: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "salt$hash".to_string(),
            role: Role::Agent,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            department: String::new(),
            is_active: true,
            is_locked: false,
            failed_login_attempts: 0,
            last_login: None,
            created_at: now,
            updated_at: now,
            created_by: Actor::System,
            password_changed_at: Some(now),
            must_change_password: false,
            custom_permissions: HashSet::new(),
            denied_permissions: HashSet::new(),
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let dir = UserDirectory::new();
        let user = sample_user("alice", "alice@ops.example.com");
        let id = user.id;
        dir.insert(user).unwrap();

        assert_eq!(dir.get(id).unwrap().username, "alice");
        assert_eq!(dir.get_by_username("ALICE").unwrap().id, id);
        assert_eq!(dir.get_by_email("Alice@Ops.Example.Com").unwrap().id, id);
        assert!(dir.get_by_username("bob").is_none());
    }

    #[test]
    fn test_username_conflict_is_case_insensitive() {
        let dir = UserDirectory::new();
        dir.insert(sample_user("alice", "alice@ops.example.com"))
            .unwrap();

        let err = dir
            .insert(sample_user("Alice", "other@ops.example.com"))
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict("username")));
    }

    #[test]
    fn test_email_conflict_is_case_insensitive() {
        let dir = UserDirectory::new();
        dir.insert(sample_user("alice", "alice@ops.example.com"))
            .unwrap();

        let err = dir
            .insert(sample_user("bob", "ALICE@ops.example.com"))
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict("email")));
    }

    #[test]
    fn test_update_cannot_take_anothers_email() {
        let dir = UserDirectory::new();
        let alice = sample_user("alice", "alice@ops.example.com");
        let bob = sample_user("bob", "bob@ops.example.com");
        let bob_id = bob.id;
        dir.insert(alice).unwrap();
        dir.insert(bob).unwrap();

        // Case-only difference still conflicts.
        let err = dir
            .update(
                bob_id,
                UserUpdate {
                    email: Some("ALICE@ops.example.com".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict("email")));
        assert_eq!(dir.get(bob_id).unwrap().email, "bob@ops.example.com");

        // Re-casing your own address is not a conflict.
        dir.update(
            bob_id,
            UserUpdate {
                email: Some("Bob@ops.example.com".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(dir.get(bob_id).unwrap().email, "Bob@ops.example.com");
    }

    #[test]
    fn test_modify_unknown_user() {
        let dir = UserDirectory::new();
        let err = dir.modify(Uuid::new_v4(), |u| u.is_locked = true).unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound(_)));
    }

    #[test]
    fn test_update_applies_only_set_fields() {
        let mut user = sample_user("alice", "alice@ops.example.com");
        let before = user.updated_at;

        let update = UserUpdate {
            department: Some("Dispatch".to_string()),
            role: Some(Role::Manager),
            ..Default::default()
        };
        assert_eq!(update.changed_fields(), vec!["department", "role"]);
        update.apply(&mut user);

        assert_eq!(user.department, "Dispatch");
        assert_eq!(user.role, Role::Manager);
        assert_eq!(user.username, "alice");
        assert!(user.updated_at >= before);
    }

    #[test]
    fn test_profile_has_no_hash() {
        let user = sample_user("alice", "alice@ops.example.com");
        let json = serde_json::to_string(&user.profile()).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("salt$hash"));
        assert!(json.contains("\"username\":\"alice\""));
    }
}
