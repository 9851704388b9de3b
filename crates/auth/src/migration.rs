//! Role derivation for profiles created before roles existed.
//!
//! Legacy profiles only carry a free-text occupation. Migration maps it to a
//! coarse role and level. Text that is neither administrative nor teaching is
//! handled by an explicit [`UnrecognizedOccupationPolicy`].

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ProfileUpdate, Role, RoleLevel};

/// What to assign when the occupation text matches no known keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnrecognizedOccupationPolicy {
    /// Treat every migrated user as staff.
    AssignTeacher,
    AssignUnprivileged,
}

/// Current product rule: unrecognized occupations migrate as teachers.
/// Pending product confirmation; switch via configuration.
pub const DEFAULT_UNRECOGNIZED_OCCUPATION_POLICY: UnrecognizedOccupationPolicy =
    UnrecognizedOccupationPolicy::AssignTeacher;

impl Default for UnrecognizedOccupationPolicy {
    fn default() -> Self {
        DEFAULT_UNRECOGNIZED_OCCUPATION_POLICY
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown occupation policy '{0}' (expected 'teacher' or 'unprivileged')")]
pub struct UnknownOccupationPolicy(pub String);

impl FromStr for UnrecognizedOccupationPolicy {
    type Err = UnknownOccupationPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teacher" | "assign_teacher" => Ok(Self::AssignTeacher),
            "unprivileged" | "assign_unprivileged" => Ok(Self::AssignUnprivileged),
            other => Err(UnknownOccupationPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupationClass {
    Administrative,
    Teaching,
    Unrecognized,
}

const ADMINISTRATIVE_KEYWORDS: &[&str] = &["admin", "principal", "dean"];
const TEACHING_KEYWORDS: &[&str] = &["teacher", "instructor", "tutor", "lecturer", "professor"];

/// Case-insensitive keyword match. Administrative keywords win over teaching
/// ones ("Admin Teacher" is administrative).
pub fn classify_occupation(occupation: &str) -> OccupationClass {
    let text = occupation.to_lowercase();
    if ADMINISTRATIVE_KEYWORDS.iter().any(|k| text.contains(k)) {
        OccupationClass::Administrative
    } else if TEACHING_KEYWORDS.iter().any(|k| text.contains(k)) {
        OccupationClass::Teaching
    } else {
        OccupationClass::Unrecognized
    }
}

/// The profile write that migrates a legacy record.
///
/// Without an occupation the record gets the provisioning defaults: level 1,
/// no role flags, active and not suspended.
pub fn role_update_for_occupation(
    occupation: Option<&str>,
    policy: UnrecognizedOccupationPolicy,
) -> ProfileUpdate {
    let Some(occupation) = occupation.map(str::trim).filter(|o| !o.is_empty()) else {
        return ProfileUpdate::for_role(Role::Unprivileged, RoleLevel::DEFAULT)
            .with_status(true, false);
    };

    match classify_occupation(occupation) {
        OccupationClass::Administrative => {
            ProfileUpdate::for_role(Role::Admin, RoleLevel::ADMIN_MIGRATED)
        }
        OccupationClass::Teaching => {
            ProfileUpdate::for_role(Role::Teacher, RoleLevel::TEACHER_MIGRATED)
        }
        OccupationClass::Unrecognized => {
            tracing::debug!(
                %occupation,
                ?policy,
                "occupation not recognized; applying fallback policy"
            );
            match policy {
                UnrecognizedOccupationPolicy::AssignTeacher => {
                    ProfileUpdate::for_role(Role::Teacher, RoleLevel::TEACHER_MIGRATED)
                }
                UnrecognizedOccupationPolicy::AssignUnprivileged => {
                    ProfileUpdate::for_role(Role::Unprivileged, RoleLevel::DEFAULT)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(update: &ProfileUpdate) -> (Option<bool>, Option<bool>, Option<i32>) {
        (update.is_admin, update.is_teacher, update.role_level)
    }

    #[test]
    fn school_admin_becomes_admin() {
        let update = role_update_for_occupation(Some("School Admin"), Default::default());
        assert_eq!(flags(&update), (Some(true), Some(false), Some(9)));
    }

    #[test]
    fn math_teacher_becomes_teacher() {
        let update = role_update_for_occupation(Some("Math Teacher"), Default::default());
        assert_eq!(flags(&update), (Some(false), Some(true), Some(6)));
    }

    #[test]
    fn unrecognized_defaults_to_teacher() {
        let update = role_update_for_occupation(Some("Student"), Default::default());
        assert_eq!(flags(&update), (Some(false), Some(true), Some(6)));
    }

    #[test]
    fn unrecognized_can_be_unprivileged() {
        let update = role_update_for_occupation(
            Some("Student"),
            UnrecognizedOccupationPolicy::AssignUnprivileged,
        );
        assert_eq!(flags(&update), (Some(false), Some(false), Some(1)));
    }

    #[test]
    fn no_occupation_gets_provisioning_defaults() {
        for occupation in [None, Some(""), Some("   ")] {
            let update = role_update_for_occupation(occupation, Default::default());
            assert_eq!(update.role_level, Some(1));
            assert_eq!(update.is_active, Some(true));
            assert_eq!(update.is_suspended, Some(false));
            assert_eq!(update.is_admin, Some(false));
        }
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(classify_occupation("INSTRUCTOR"), OccupationClass::Teaching);
        assert_eq!(classify_occupation("Vice Principal"), OccupationClass::Administrative);
        assert_eq!(classify_occupation("Administrator and tutor"), OccupationClass::Administrative);
        assert_eq!(classify_occupation("Engineer"), OccupationClass::Unrecognized);
    }

    #[test]
    fn policy_parses() {
        assert_eq!(
            "unprivileged".parse::<UnrecognizedOccupationPolicy>().unwrap(),
            UnrecognizedOccupationPolicy::AssignUnprivileged
        );
        assert!("staff".parse::<UnrecognizedOccupationPolicy>().is_err());
    }
}
