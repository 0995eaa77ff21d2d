//! Authorization evaluator.
//!
//! Pure functions over user state and the static role table — no I/O, no
//! clock, no store access. The effective permission set is derived on every
//! call rather than stored, so role changes and override edits take effect
//! immediately.
//!
//! All predicates return `false` rather than erroring for inactive users;
//! a deactivated account holds no effective permissions regardless of its
//! role or explicit grants.

use std::collections::HashSet;

use crate::role::{Permission, Role};
use crate::user::User;

/// Effective permissions: role bundle, plus explicit grants, minus explicit
/// denials. Denials win over both the role and the grants.
pub fn effective_permissions(user: &User) -> HashSet<Permission> {
    let mut perms: HashSet<Permission> = user.role.permissions().iter().copied().collect();
    perms.extend(user.custom_permissions.iter().copied());
    for denied in &user.denied_permissions {
        perms.remove(denied);
    }
    perms
}

/// Whether the user holds a permission. Always `false` for inactive users.
pub fn has_permission(user: &User, permission: Permission) -> bool {
    if !user.is_active {
        return false;
    }
    effective_permissions(user).contains(&permission)
}

/// Whether the user holds at least one of the permissions.
pub fn has_any_permission(user: &User, permissions: &[Permission]) -> bool {
    if !user.is_active {
        return false;
    }
    let effective = effective_permissions(user);
    permissions.iter().any(|p| effective.contains(p))
}

/// Whether the user holds every one of the permissions.
pub fn has_all_permissions(user: &User, permissions: &[Permission]) -> bool {
    if !user.is_active {
        return false;
    }
    let effective = effective_permissions(user);
    permissions.iter().all(|p| effective.contains(p))
}

/// Whether the user's role ranks at or above the required role.
pub fn has_role_or_higher(user: &User, role: Role) -> bool {
    if !user.is_active {
        return false;
    }
    user.role.rank() >= role.rank()
}

/// Whether `actor` may manage `target`: never themself, and only users of
/// strictly lower rank. Peers cannot manage each other through this path.
pub fn can_manage(actor: &User, target: &User) -> bool {
    if actor.id == target.id {
        return false;
    }
    actor.role.rank() > target.role.rank()
}
