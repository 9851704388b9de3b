//! Boolean algebra over the cached role.
//!
//! Rules are written by composing small predicates (`and`, `or`, `not`,
//! `xor`, role and permission combinators). Every predicate is a pure read of
//! an immutable snapshot and resolves to `false` when no role is cached, so
//! the evaluator is total and fails closed.
//!
//! - No IO
//! - No panics
//! - No mutation of role state

use std::sync::Arc;

use crate::{Action, Feature, Permission, Resource, RoleType, UserRole};

/// Composable predicates over a role snapshot.
#[derive(Debug, Clone, Default)]
pub struct RoleBooleanAlgebra {
    role: Option<Arc<UserRole>>,
}

impl RoleBooleanAlgebra {
    pub fn new(role: Option<Arc<UserRole>>) -> Self {
        Self { role }
    }

    /// An algebra with nothing cached; every predicate is `false`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn for_role(role: UserRole) -> Self {
        Self::new(Some(Arc::new(role)))
    }

    pub fn role(&self) -> Option<&UserRole> {
        self.role.as_deref()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Primitives
    // ─────────────────────────────────────────────────────────────────────────

    pub fn and(a: bool, b: bool) -> bool {
        a && b
    }

    pub fn or(a: bool, b: bool) -> bool {
        a || b
    }

    pub fn not(a: bool) -> bool {
        !a
    }

    pub fn xor(a: bool, b: bool) -> bool {
        a != b
    }

    /// N-ary AND. Empty input is `true`.
    pub fn all(values: &[bool]) -> bool {
        values.iter().all(|v| *v)
    }

    /// N-ary OR. Empty input is `false`.
    pub fn any(values: &[bool]) -> bool {
        values.iter().any(|v| *v)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Role combinators
    // ─────────────────────────────────────────────────────────────────────────

    pub fn has_exact_role(&self, role: RoleType) -> bool {
        self.role().is_some_and(|r| r.role.matches(role))
    }

    pub fn has_any_role(&self, roles: &[RoleType]) -> bool {
        self.role()
            .is_some_and(|r| roles.iter().any(|role| r.role.matches(*role)))
    }

    /// Every listed role must match. With a single tag per user this only
    /// holds for lists naming one distinct role.
    pub fn has_all_roles(&self, roles: &[RoleType]) -> bool {
        self.role()
            .is_some_and(|r| roles.iter().all(|role| r.role.matches(*role)))
    }

    /// `role_level >= floor(min_role)`, independent of the role tag.
    pub fn has_higher_role(&self, min_role: RoleType) -> bool {
        self.role().is_some_and(|r| r.level >= min_role.floor())
    }

    /// `role_level <= ceiling(max_role)`, independent of the role tag.
    pub fn has_lower_role(&self, max_role: RoleType) -> bool {
        self.role().is_some_and(|r| r.level <= max_role.ceiling())
    }

    /// Active and not suspended.
    pub fn is_in_good_standing(&self) -> bool {
        self.role().is_some_and(UserRole::is_in_good_standing)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permission combinators
    // ─────────────────────────────────────────────────────────────────────────

    pub fn has_exact_permission(&self, permission: Permission) -> bool {
        self.role().is_some_and(|r| r.permissions.allows(permission))
    }

    pub fn has_any_permission(&self, permissions: &[Permission]) -> bool {
        self.role()
            .is_some_and(|r| permissions.iter().any(|p| r.permissions.allows(*p)))
    }

    pub fn has_all_permissions(&self, permissions: &[Permission]) -> bool {
        self.role()
            .is_some_and(|r| permissions.iter().all(|p| r.permissions.allows(*p)))
    }

    /// Dotted `resource.action` lookup; unknown or malformed paths are denied.
    pub fn has_permission_path(&self, path: &str) -> bool {
        self.role().is_some_and(|r| r.permissions.allows_path(path))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Composites
    // ─────────────────────────────────────────────────────────────────────────

    /// Check a feature's registered requirement, tightened by an optional
    /// minimum role and extra permissions.
    pub fn can_access_feature(
        &self,
        feature: Feature,
        required_role: Option<RoleType>,
        required_permissions: &[Permission],
    ) -> bool {
        if self.role.is_none() {
            return false;
        }

        let baseline = feature.requirement();
        let mut result = true;

        if baseline.requires_good_standing {
            result = Self::and(result, self.is_in_good_standing());
        }
        if let Some(min_role) = baseline.min_role {
            result = Self::and(result, self.has_higher_role(min_role));
        }
        if !baseline.permissions.is_empty() {
            result = Self::and(result, self.has_any_permission(baseline.permissions));
        }
        if let Some(role) = required_role {
            result = Self::and(result, self.has_higher_role(role));
        }
        if !required_permissions.is_empty() {
            result = Self::and(result, self.has_all_permissions(required_permissions));
        }

        result
    }

    pub fn can_perform_action(&self, action: Action, resource: Resource) -> bool {
        self.has_exact_permission(Permission::new(resource, action))
    }
}
