//! Append-only audit log of security-relevant actions.
//!
//! Every mutating operation and every failed or denied authentication and
//! authorization attempt is recorded here — the user-facing error and the
//! audit entry always move together. Entries are immutable once written.
//!
//! Retention is a fixed-capacity ring: once full, the oldest entries are
//! dropped first. This is a bounded-memory policy, not a completeness
//! guarantee — deployments that need durable audit trails must ship entries
//! to external storage before they rotate out.
//!
//! Each recorded entry is mirrored as a structured `tracing` event (warn for
//! failures and denials, info for successes) so the audit trail shows up in
//! ordinary log aggregation too.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

/// Actions captured in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateUser,
    UpdateUser,
    DeactivateUser,
    ChangePassword,
    ResetPassword,
    UnlockUser,
    Login,
    LoginAttempt,
    AccountLocked,
    Logout,
    AccessDenied,
}

impl AuditAction {
    /// Stable SCREAMING_SNAKE_CASE identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateUser => "CREATE_USER",
            Self::UpdateUser => "UPDATE_USER",
            Self::DeactivateUser => "DEACTIVATE_USER",
            Self::ChangePassword => "CHANGE_PASSWORD",
            Self::ResetPassword => "RESET_PASSWORD",
            Self::UnlockUser => "UNLOCK_USER",
            Self::Login => "LOGIN",
            Self::LoginAttempt => "LOGIN_ATTEMPT",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            Self::Logout => "LOGOUT",
            Self::AccessDenied => "ACCESS_DENIED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Action completed.
    Success,
    /// Action failed (bad credentials, validation, conflict).
    Failure,
    /// Action was refused by an authorization check.
    Denied,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failure => f.write_str("failure"),
            Self::Denied => f.write_str("denied"),
        }
    }
}

/// Kind of resource an entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    User,
    Session,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Session => f.write_str("session"),
        }
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Acting user id; `None` for the system or an unauthenticated caller.
    pub actor_id: Option<Uuid>,
    /// Actor name as presented (the attempted username for failed logins).
    pub actor_name: String,
    pub action: AuditAction,
    pub resource_type: ResourceType,
    /// Id of the affected resource; empty when not applicable.
    pub resource_id: String,
    /// Free-form context. Never contains secrets.
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub outcome: AuditOutcome,
}

impl AuditEntry {
    /// Build an entry stamped with a fresh id and the current time.
    pub fn new(
        actor_id: Option<Uuid>,
        actor_name: impl Into<String>,
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        details: serde_json::Value,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor_id,
            actor_name: actor_name.into(),
            action,
            resource_type,
            resource_id: resource_id.into(),
            details,
            ip_address: None,
            outcome,
        }
    }

    /// Attach the originating address.
    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }
}

/// Filters for querying the audit log. Unset fields match everything.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub resource_type: Option<ResourceType>,
    /// Maximum entries returned, newest first.
    pub limit: usize,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            actor_id: None,
            action: None,
            resource_type: None,
            limit: 100,
        }
    }
}

impl AuditFilter {
    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(actor_id) = self.actor_id {
            if entry.actor_id != Some(actor_id) {
                return false;
            }
        }
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        if let Some(resource_type) = self.resource_type {
            if entry.resource_type != resource_type {
                return false;
            }
        }
        true
    }
}

/// Bounded in-memory audit log.
///
/// Internally synchronized; share via `Arc`.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLog {
    /// Create a log retaining at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Append an entry, dropping the oldest if at capacity, and mirror it as
    /// a tracing event.
    pub fn record(&self, entry: AuditEntry) {
        match entry.outcome {
            AuditOutcome::Success => tracing::info!(
                action = %entry.action,
                actor = %entry.actor_name,
                resource_type = %entry.resource_type,
                resource_id = %entry.resource_id,
                outcome = %entry.outcome,
                "audit"
            ),
            AuditOutcome::Failure | AuditOutcome::Denied => tracing::warn!(
                action = %entry.action,
                actor = %entry.actor_name,
                resource_type = %entry.resource_type,
                resource_id = %entry.resource_id,
                outcome = %entry.outcome,
                "audit"
            ),
        }

        let mut entries = self.entries.lock();
        entries.push_back(entry);
        // Holds for any capacity, including zero (retain nothing).
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Query entries newest-first, applying the filter and its limit.
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(filter.limit)
            .cloned()
            .collect()
    }

    /// Total entries currently retained.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
