use serde::Serialize;

use edugate_core::UserId;

use crate::{PermissionTree, ResolvedRoleFields, Role, RoleLevel};

/// Evaluation snapshot of one user's access profile.
///
/// Always built whole (profile columns plus the role's permission tree) and
/// shared behind an `Arc`; it is never patched after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRole {
    pub user_id: UserId,
    pub role: Role,
    pub level: RoleLevel,
    pub is_active: bool,
    pub is_suspended: bool,
    pub permissions: PermissionTree,
}

impl UserRole {
    pub fn new(user_id: UserId, fields: ResolvedRoleFields, permissions: PermissionTree) -> Self {
        Self {
            user_id,
            role: fields.role,
            level: fields.level,
            is_active: fields.is_active,
            is_suspended: fields.is_suspended,
            permissions,
        }
    }

    /// Active and not suspended.
    pub fn is_in_good_standing(&self) -> bool {
        self.is_active && !self.is_suspended
    }
}
