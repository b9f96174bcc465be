//! Roles and permissions
//!
//! Roles are fixed; each maps to a static permission set. Handlers check a
//! single [`Permission`] rather than a role, so the mapping can change here
//! without touching the API layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User role stored in `users.role`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Staff,
    Viewer,
}

/// Fine-grained permission checked by handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    UsersManage,
    VenuesWrite,
    InventoryRead,
    InventoryWrite,
    DocumentsRead,
    DocumentsWrite,
    DocumentsApprove,
    PerformancesRead,
    PerformancesWrite,
    ScheduleRead,
    ScheduleWrite,
    AnalyticsRead,
}

const ALL: &[Permission] = &[
    Permission::UsersManage,
    Permission::VenuesWrite,
    Permission::InventoryRead,
    Permission::InventoryWrite,
    Permission::DocumentsRead,
    Permission::DocumentsWrite,
    Permission::DocumentsApprove,
    Permission::PerformancesRead,
    Permission::PerformancesWrite,
    Permission::ScheduleRead,
    Permission::ScheduleWrite,
    Permission::AnalyticsRead,
];

const MANAGER: &[Permission] = &[
    Permission::VenuesWrite,
    Permission::InventoryRead,
    Permission::InventoryWrite,
    Permission::DocumentsRead,
    Permission::DocumentsWrite,
    Permission::DocumentsApprove,
    Permission::PerformancesRead,
    Permission::PerformancesWrite,
    Permission::ScheduleRead,
    Permission::ScheduleWrite,
    Permission::AnalyticsRead,
];

const STAFF: &[Permission] = &[
    Permission::InventoryRead,
    Permission::InventoryWrite,
    Permission::DocumentsRead,
    Permission::DocumentsWrite,
    Permission::PerformancesRead,
    Permission::PerformancesWrite,
    Permission::ScheduleRead,
    Permission::ScheduleWrite,
    Permission::AnalyticsRead,
];

const VIEWER: &[Permission] = &[
    Permission::InventoryRead,
    Permission::DocumentsRead,
    Permission::PerformancesRead,
    Permission::ScheduleRead,
];

impl Role {
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::Admin => ALL,
            Role::Manager => MANAGER,
            Role::Staff => STAFF,
            Role::Viewer => VIEWER,
        }
    }

    pub fn has(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Staff => "STAFF",
            Role::Viewer => "VIEWER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "MANAGER" => Ok(Role::Manager),
            "STAFF" => Ok(Role::Staff),
            "VIEWER" => Ok(Role::Viewer),
            other => Err(crate::Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_has_everything() {
        for p in ALL {
            assert!(Role::Admin.has(*p), "admin lacks {:?}", p);
        }
    }

    #[test]
    fn test_manager_cannot_manage_users() {
        assert!(!Role::Manager.has(Permission::UsersManage));
        assert!(Role::Manager.has(Permission::DocumentsApprove));
    }

    #[test]
    fn test_staff_cannot_approve_or_edit_venues() {
        assert!(!Role::Staff.has(Permission::DocumentsApprove));
        assert!(!Role::Staff.has(Permission::VenuesWrite));
        assert!(Role::Staff.has(Permission::ScheduleWrite));
    }

    #[test]
    fn test_viewer_is_read_only() {
        assert!(Role::Viewer.has(Permission::InventoryRead));
        assert!(!Role::Viewer.has(Permission::InventoryWrite));
        assert!(!Role::Viewer.has(Permission::AnalyticsRead));
    }

    #[test]
    fn test_role_round_trip_text() {
        assert_eq!("staff".parse::<Role>().unwrap(), Role::Staff);
        assert_eq!(Role::Manager.to_string(), "MANAGER");
        assert!("director".parse::<Role>().is_err());
    }
}
