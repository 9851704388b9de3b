//! `PermissionCheck`: per-action view over a role snapshot.
//!
//! Screens ask domain questions ("can this user create jobs?") rather than
//! composing predicates themselves. Every answer is an algebra composition of
//! the coarse role, the active/suspended state and specific permissions. The
//! checker is a snapshot: it reflects the cache at the time it was taken.

use std::collections::BTreeMap;

use serde::Serialize;

use edugate_core::UserId;

use crate::{Permission, Role, RoleBooleanAlgebra, RoleType};

type A = RoleBooleanAlgebra;

#[derive(Debug, Clone, Default)]
pub struct PermissionCheck {
    algebra: RoleBooleanAlgebra,
}

impl PermissionCheck {
    pub fn new(algebra: RoleBooleanAlgebra) -> Self {
        Self { algebra }
    }

    pub fn algebra(&self) -> &RoleBooleanAlgebra {
        &self.algebra
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.algebra.role().map(|r| r.user_id)
    }

    pub fn is_admin(&self) -> bool {
        self.algebra.has_exact_role(RoleType::Admin)
    }

    pub fn is_teacher(&self) -> bool {
        self.algebra.has_exact_role(RoleType::Teacher)
    }

    /// Active and not suspended.
    pub fn is_active(&self) -> bool {
        self.algebra.is_in_good_standing()
    }

    fn standing_and(&self, permission: Permission) -> bool {
        A::and(self.is_active(), self.algebra.has_exact_permission(permission))
    }

    fn standing_and_admin_or(&self, permission: Permission) -> bool {
        A::and(
            self.is_active(),
            A::or(self.is_admin(), self.algebra.has_exact_permission(permission)),
        )
    }

    // Courses

    pub fn can_view_courses(&self) -> bool {
        self.standing_and(Permission::COURSES_VIEW)
    }

    pub fn can_create_courses(&self) -> bool {
        self.standing_and(Permission::COURSES_CREATE)
    }

    pub fn can_edit_courses(&self) -> bool {
        self.standing_and(Permission::COURSES_EDIT)
    }

    pub fn can_delete_courses(&self) -> bool {
        self.standing_and(Permission::COURSES_DELETE)
    }

    pub fn can_publish_courses(&self) -> bool {
        self.standing_and(Permission::COURSES_PUBLISH)
    }

    /// Admins manage any course; teachers manage courses they own (or, with
    /// no owner given, courses in general) when they hold `courses.edit`.
    pub fn can_manage_course(&self, owner: Option<UserId>) -> bool {
        let owns = match (owner, self.user_id()) {
            (None, _) => true,
            (Some(owner), Some(me)) => owner == me,
            (Some(_), None) => false,
        };
        let teacher_owner = A::all(&[
            self.is_teacher(),
            self.algebra.has_exact_permission(Permission::COURSES_EDIT),
            owns,
        ]);
        A::and(self.is_active(), A::or(self.is_admin(), teacher_owner))
    }

    // Panels and administration

    pub fn can_access_admin_panel(&self) -> bool {
        A::and(self.is_active(), self.is_admin())
    }

    pub fn can_access_teacher_panel(&self) -> bool {
        A::and(
            self.is_active(),
            self.algebra.has_any_role(&[RoleType::Admin, RoleType::Teacher]),
        )
    }

    pub fn can_view_users(&self) -> bool {
        self.standing_and_admin_or(Permission::USERS_VIEW)
    }

    pub fn can_manage_users(&self) -> bool {
        A::all(&[
            self.is_active(),
            self.is_admin(),
            self.algebra.has_exact_permission(Permission::USERS_MANAGE),
        ])
    }

    pub fn can_view_analytics(&self) -> bool {
        A::and(
            self.algebra.has_higher_role(RoleType::Teacher),
            self.standing_and_admin_or(Permission::ANALYTICS_VIEW),
        )
    }

    pub fn can_export_analytics(&self) -> bool {
        A::and(
            self.can_view_analytics(),
            self.algebra.has_exact_permission(Permission::ANALYTICS_EXPORT),
        )
    }

    pub fn can_approve_content(&self) -> bool {
        self.standing_and_admin_or(Permission::CONTENT_APPROVE)
    }

    pub fn can_moderate_discussions(&self) -> bool {
        self.standing_and_admin_or(Permission::DISCUSSIONS_MODERATE)
    }

    pub fn can_manage_payments(&self) -> bool {
        A::all(&[
            self.is_active(),
            self.is_admin(),
            self.algebra.has_exact_permission(Permission::PAYMENTS_MANAGE),
        ])
    }

    // Job portal

    pub fn can_view_jobs(&self) -> bool {
        self.standing_and(Permission::JOBS_VIEW)
    }

    pub fn can_create_jobs(&self) -> bool {
        A::and(
            self.algebra.has_any_role(&[RoleType::Admin, RoleType::Teacher]),
            self.standing_and(Permission::JOBS_CREATE),
        )
    }

    pub fn can_edit_jobs(&self) -> bool {
        A::and(
            self.algebra.has_any_role(&[RoleType::Admin, RoleType::Teacher]),
            self.standing_and(Permission::JOBS_EDIT),
        )
    }

    pub fn can_delete_jobs(&self) -> bool {
        self.standing_and_admin_or(Permission::JOBS_DELETE)
    }

    pub fn can_manage_jobs(&self) -> bool {
        self.standing_and_admin_or(Permission::JOBS_MANAGE)
    }

    pub fn can_approve_jobs(&self) -> bool {
        A::all(&[
            self.is_active(),
            self.is_admin(),
            self.algebra.has_exact_permission(Permission::JOBS_APPROVE),
        ])
    }

    pub fn can_view_job_applications(&self) -> bool {
        A::and(
            self.is_active(),
            self.algebra
                .has_any_permission(&[Permission::APPLICATIONS_VIEW, Permission::JOBS_MANAGE]),
        )
    }

    pub fn can_manage_job_applications(&self) -> bool {
        self.standing_and(Permission::APPLICATIONS_MANAGE)
    }

    pub fn can_manage_companies(&self) -> bool {
        self.standing_and_admin_or(Permission::COMPANIES_MANAGE)
    }

    /// Every check evaluated once, for display and diagnostics.
    pub fn summary(&self) -> PermissionSummary {
        let checks = [
            ("is_admin", self.is_admin()),
            ("is_teacher", self.is_teacher()),
            ("is_active", self.is_active()),
            ("can_view_courses", self.can_view_courses()),
            ("can_create_courses", self.can_create_courses()),
            ("can_edit_courses", self.can_edit_courses()),
            ("can_delete_courses", self.can_delete_courses()),
            ("can_publish_courses", self.can_publish_courses()),
            ("can_manage_course", self.can_manage_course(None)),
            ("can_access_admin_panel", self.can_access_admin_panel()),
            ("can_access_teacher_panel", self.can_access_teacher_panel()),
            ("can_view_users", self.can_view_users()),
            ("can_manage_users", self.can_manage_users()),
            ("can_view_analytics", self.can_view_analytics()),
            ("can_export_analytics", self.can_export_analytics()),
            ("can_approve_content", self.can_approve_content()),
            ("can_moderate_discussions", self.can_moderate_discussions()),
            ("can_manage_payments", self.can_manage_payments()),
            ("can_view_jobs", self.can_view_jobs()),
            ("can_create_jobs", self.can_create_jobs()),
            ("can_edit_jobs", self.can_edit_jobs()),
            ("can_delete_jobs", self.can_delete_jobs()),
            ("can_manage_jobs", self.can_manage_jobs()),
            ("can_approve_jobs", self.can_approve_jobs()),
            ("can_view_job_applications", self.can_view_job_applications()),
            ("can_manage_job_applications", self.can_manage_job_applications()),
        ];

        let role = self.algebra.role();
        PermissionSummary {
            user_id: self.user_id(),
            role: role.map(|r| r.role),
            role_level: role.map(|r| r.level.value()),
            granted: role
                .map(|r| r.permissions.granted().map(|p| p.to_string()).collect())
                .unwrap_or_default(),
            checks: checks.into_iter().collect(),
        }
    }
}

/// Serializable snapshot of every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionSummary {
    pub user_id: Option<UserId>,
    pub role: Option<Role>,
    pub role_level: Option<i32>,
    pub granted: Vec<String>,
    pub checks: BTreeMap<&'static str, bool>,
}
