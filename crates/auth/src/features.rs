//! Feature registry.
//!
//! Each screen-level feature names the baseline it requires. Callers may
//! tighten it further through [`RoleBooleanAlgebra::can_access_feature`].
//!
//! [`RoleBooleanAlgebra::can_access_feature`]: crate::RoleBooleanAlgebra::can_access_feature

use serde::{Deserialize, Serialize};

use crate::{Permission, RoleType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    AdminPanel,
    TeacherPanel,
    CourseManagement,
    Analytics,
    UserManagement,
    ContentModeration,
    JobPortal,
    JobPosting,
    Discussions,
    Payments,
}

/// Baseline requirement of a feature.
///
/// `permissions` is satisfied when any one of them is granted; an empty
/// list imposes no permission requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureRequirement {
    pub min_role: Option<RoleType>,
    pub permissions: &'static [Permission],
    pub requires_good_standing: bool,
}

impl Feature {
    pub const ALL: [Feature; 10] = [
        Feature::AdminPanel,
        Feature::TeacherPanel,
        Feature::CourseManagement,
        Feature::Analytics,
        Feature::UserManagement,
        Feature::ContentModeration,
        Feature::JobPortal,
        Feature::JobPosting,
        Feature::Discussions,
        Feature::Payments,
    ];

    pub fn requirement(&self) -> FeatureRequirement {
        use crate::Permission as P;

        match self {
            Feature::AdminPanel => requirement(Some(RoleType::Admin), &[]),
            Feature::TeacherPanel => requirement(Some(RoleType::Teacher), &[]),
            Feature::CourseManagement => requirement(
                Some(RoleType::Teacher),
                &[P::COURSES_CREATE, P::COURSES_EDIT, P::COURSES_MANAGE],
            ),
            Feature::Analytics => requirement(Some(RoleType::Teacher), &[P::ANALYTICS_VIEW]),
            Feature::UserManagement => requirement(Some(RoleType::Admin), &[P::USERS_MANAGE]),
            Feature::ContentModeration => requirement(
                Some(RoleType::Teacher),
                &[P::CONTENT_APPROVE, P::DISCUSSIONS_MODERATE],
            ),
            Feature::JobPortal => requirement(None, &[P::JOBS_VIEW]),
            Feature::JobPosting => {
                requirement(Some(RoleType::Teacher), &[P::JOBS_CREATE, P::JOBS_MANAGE])
            }
            Feature::Discussions => requirement(None, &[]),
            Feature::Payments => requirement(Some(RoleType::Admin), &[P::PAYMENTS_MANAGE]),
        }
    }
}

fn requirement(
    min_role: Option<RoleType>,
    permissions: &'static [Permission],
) -> FeatureRequirement {
    FeatureRequirement {
        min_role,
        permissions,
        requires_good_standing: true,
    }
}
