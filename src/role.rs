//! Roles and permissions.
//!
//! Both are closed enums: an invalid role or permission identifier is rejected
//! at the system boundary when parsing, and cannot exist inside business
//! logic. String forms are snake_case and stable — they are the identifiers
//! the calling layer sees in serialized permission sets and audit entries.
//!
//! Roles form a total order from lowest to highest privilege. Each role maps
//! to a static default permission bundle; per-user grants and denials are
//! layered on top by the authorization evaluator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Roles
// ============================================================================

/// User roles, ordered from lowest to highest privilege.
///
/// The derived `Ord` follows declaration order and matches [`Role::rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access.
    Viewer,
    /// Standard customer service operations.
    Agent,
    /// Handles escalations, sees advanced reports.
    SeniorAgent,
    /// Approves refunds, resolves escalations, views everything.
    Manager,
    /// Full access including user management.
    Admin,
    /// Full system access, can manage admins.
    SuperAdmin,
}

impl Role {
    /// Every role, lowest privilege first.
    pub const ALL: [Role; 6] = [
        Role::Viewer,
        Role::Agent,
        Role::SeniorAgent,
        Role::Manager,
        Role::Admin,
        Role::SuperAdmin,
    ];

    /// Hierarchy level. Higher means more access.
    pub fn rank(self) -> u8 {
        match self {
            Role::Viewer => 10,
            Role::Agent => 30,
            Role::SeniorAgent => 50,
            Role::Manager => 70,
            Role::Admin => 90,
            Role::SuperAdmin => 100,
        }
    }

    /// Stable snake_case identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Agent => "agent",
            Role::SeniorAgent => "senior_agent",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Default permission bundle for this role.
    ///
    /// The table is static and not editable at runtime; per-user overrides
    /// are applied by [`crate::authz::effective_permissions`].
    pub fn permissions(self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::SuperAdmin => &Permission::ALL,
            Role::Admin => &[
                ViewTransactions,
                ViewAllTransactions,
                EditTransactions,
                DeleteTransactions,
                ExportTransactions,
                ViewRefunds,
                RequestRefund,
                ApproveRefund,
                RejectRefund,
                ViewEscalations,
                CreateEscalation,
                ResolveEscalation,
                UseAiAssistant,
                ViewAiHistory,
                ViewBasicAnalytics,
                ViewAdvancedAnalytics,
                ExportReports,
                ViewUsers,
                CreateUsers,
                EditUsers,
                DeleteUsers,
                AssignRoles,
                ViewAuditLog,
                ManageSettings,
                ViewSystemHealth,
            ],
            Role::Manager => &[
                ViewTransactions,
                ViewAllTransactions,
                EditTransactions,
                ExportTransactions,
                ViewRefunds,
                RequestRefund,
                ApproveRefund,
                RejectRefund,
                ViewEscalations,
                CreateEscalation,
                ResolveEscalation,
                UseAiAssistant,
                ViewAiHistory,
                ViewBasicAnalytics,
                ViewAdvancedAnalytics,
                ExportReports,
                ViewUsers,
                ViewAuditLog,
            ],
            Role::SeniorAgent => &[
                ViewTransactions,
                ViewAllTransactions,
                EditTransactions,
                ExportTransactions,
                ViewRefunds,
                RequestRefund,
                ViewEscalations,
                CreateEscalation,
                ResolveEscalation,
                UseAiAssistant,
                ViewAiHistory,
                ViewBasicAnalytics,
                ViewAdvancedAnalytics,
            ],
            Role::Agent => &[
                ViewTransactions,
                EditTransactions,
                ViewRefunds,
                RequestRefund,
                ViewEscalations,
                CreateEscalation,
                UseAiAssistant,
                ViewBasicAnalytics,
            ],
            Role::Viewer => &[
                ViewTransactions,
                ViewRefunds,
                ViewEscalations,
                ViewBasicAnalytics,
            ],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownIdentifier {
                what: "role",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// Permissions
// ============================================================================

/// Granular capabilities checked independently of role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    // Transactions
    ViewTransactions,
    ViewAllTransactions,
    EditTransactions,
    DeleteTransactions,
    ExportTransactions,

    // Refunds
    ViewRefunds,
    RequestRefund,
    ApproveRefund,
    RejectRefund,

    // Escalations
    ViewEscalations,
    CreateEscalation,
    ResolveEscalation,

    // AI assistant
    UseAiAssistant,
    ViewAiHistory,

    // Analytics
    ViewBasicAnalytics,
    ViewAdvancedAnalytics,
    ExportReports,

    // User management
    ViewUsers,
    CreateUsers,
    EditUsers,
    DeleteUsers,
    AssignRoles,

    // System
    ViewAuditLog,
    ManageSettings,
    ViewSystemHealth,
}

impl Permission {
    /// Every permission.
    pub const ALL: [Permission; 25] = [
        Permission::ViewTransactions,
        Permission::ViewAllTransactions,
        Permission::EditTransactions,
        Permission::DeleteTransactions,
        Permission::ExportTransactions,
        Permission::ViewRefunds,
        Permission::RequestRefund,
        Permission::ApproveRefund,
        Permission::RejectRefund,
        Permission::ViewEscalations,
        Permission::CreateEscalation,
        Permission::ResolveEscalation,
        Permission::UseAiAssistant,
        Permission::ViewAiHistory,
        Permission::ViewBasicAnalytics,
        Permission::ViewAdvancedAnalytics,
        Permission::ExportReports,
        Permission::ViewUsers,
        Permission::CreateUsers,
        Permission::EditUsers,
        Permission::DeleteUsers,
        Permission::AssignRoles,
        Permission::ViewAuditLog,
        Permission::ManageSettings,
        Permission::ViewSystemHealth,
    ];

    /// Stable snake_case identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ViewTransactions => "view_transactions",
            Permission::ViewAllTransactions => "view_all_transactions",
            Permission::EditTransactions => "edit_transactions",
            Permission::DeleteTransactions => "delete_transactions",
            Permission::ExportTransactions => "export_transactions",
            Permission::ViewRefunds => "view_refunds",
            Permission::RequestRefund => "request_refund",
            Permission::ApproveRefund => "approve_refund",
            Permission::RejectRefund => "reject_refund",
            Permission::ViewEscalations => "view_escalations",
            Permission::CreateEscalation => "create_escalation",
            Permission::ResolveEscalation => "resolve_escalation",
            Permission::UseAiAssistant => "use_ai_assistant",
            Permission::ViewAiHistory => "view_ai_history",
            Permission::ViewBasicAnalytics => "view_basic_analytics",
            Permission::ViewAdvancedAnalytics => "view_advanced_analytics",
            Permission::ExportReports => "export_reports",
            Permission::ViewUsers => "view_users",
            Permission::CreateUsers => "create_users",
            Permission::EditUsers => "edit_users",
            Permission::DeleteUsers => "delete_users",
            Permission::AssignRoles => "assign_roles",
            Permission::ViewAuditLog => "view_audit_log",
            Permission::ManageSettings => "manage_settings",
            Permission::ViewSystemHealth => "view_system_health",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownIdentifier {
                what: "permission",
                value: s.to_string(),
            })
    }
}

/// Parse failure for a role or permission identifier.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {what}: {value}")]
pub struct UnknownIdentifier {
    what: &'static str,
    value: String,
}
