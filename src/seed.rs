//! Demo account seeding.
//!
//! Populates an empty directory with one account per role so a fresh
//! deployment is immediately usable. Demo credentials follow a fixed,
//! documented pattern and are for development and evaluation only; a
//! production deployment creates its own accounts and never calls this.

use crate::auth::AuthManager;
use crate::error::Result;
use crate::role::Role;
use crate::user::{Actor, NewUser};

/// One demo account per role. Passwords follow the `Name@123` pattern.
const DEMO_ACCOUNTS: [(&str, &str, Role, &str, &str); 6] = [
    ("admin", "Admin@123", Role::Admin, "Alex", "Morgan"),
    ("superadmin", "Super@123", Role::SuperAdmin, "Sam", "Reyes"),
    ("manager", "Manager@123", Role::Manager, "Maria", "Chen"),
    ("senior_agent", "Senior@123", Role::SeniorAgent, "Jordan", "Lee"),
    ("agent", "Agent@123", Role::Agent, "Taylor", "Brooks"),
    ("viewer", "Viewer@123", Role::Viewer, "Riley", "Park"),
];

/// Seed the demo accounts into an empty directory.
///
/// A no-op when any users already exist, so calling it on every startup is
/// safe and never clobbers real accounts.
pub fn seed_demo_accounts(auth: &AuthManager) -> Result<()> {
    if !auth.users().is_empty() {
        tracing::debug!("User directory not empty, skipping demo seed");
        return Ok(());
    }

    for (username, password, role, first_name, last_name) in DEMO_ACCOUNTS {
        auth.create_user(
            Actor::System,
            NewUser {
                username: username.to_string(),
                email: format!("{username}@ops.example.com"),
                password: password.to_string(),
                role,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                department: "Operations".to_string(),
                must_change_password: false,
            },
        )?;
    }

    tracing::info!(count = DEMO_ACCOUNTS.len(), "Seeded demo accounts");
    Ok(())
}
