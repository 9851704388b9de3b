//! Coarse role model.
//!
//! Storage keeps two independent flags (`is_admin`, `is_teacher`) plus a
//! numeric `role_level`. In memory the flags collapse into a single [`Role`]
//! tag so the "both flags set" state cannot be represented; the level stays a
//! separate attribute and is compared on its own.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use edugate_core::{DomainError, DomainResult};

/// The closed set of named roles that can be queried or looked up in the
/// permission store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    Admin,
    Teacher,
}

impl RoleType {
    pub const ALL: [RoleType; 2] = [RoleType::Admin, RoleType::Teacher];

    /// Storage key of the role (`permissions` table, logs).
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::Admin => "admin",
            RoleType::Teacher => "teacher",
        }
    }

    /// Minimum level a holder of this role is expected to have.
    pub fn floor(&self) -> RoleLevel {
        match self {
            RoleType::Teacher => RoleLevel(5),
            RoleType::Admin => RoleLevel(8),
        }
    }

    /// Maximum level of this role's band.
    pub fn ceiling(&self) -> RoleLevel {
        match self {
            RoleType::Teacher => RoleLevel(7),
            RoleType::Admin => RoleLevel(10),
        }
    }
}

impl core::fmt::Display for RoleType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for RoleType {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(RoleType::Admin),
            "teacher" => Ok(RoleType::Teacher),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// A user's coarse role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Neither flag set. Legacy records land here.
    #[default]
    Unprivileged,
    Teacher,
    Admin,
}

impl Role {
    /// Build a role from the stored flags, rejecting the contradictory
    /// `is_admin && is_teacher` combination.
    pub fn try_from_flags(is_admin: bool, is_teacher: bool) -> DomainResult<Self> {
        match (is_admin, is_teacher) {
            (true, true) => Err(DomainError::invariant(
                "a profile cannot be both admin and teacher",
            )),
            _ => Ok(Self::from_flags_lenient(is_admin, is_teacher)),
        }
    }

    /// Build a role from the stored flags; when both are set the admin flag wins.
    pub fn from_flags_lenient(is_admin: bool, is_teacher: bool) -> Self {
        if is_admin {
            Role::Admin
        } else if is_teacher {
            Role::Teacher
        } else {
            Role::Unprivileged
        }
    }

    /// `(is_admin, is_teacher)` as persisted.
    pub fn flags(&self) -> (bool, bool) {
        match self {
            Role::Unprivileged => (false, false),
            Role::Teacher => (false, true),
            Role::Admin => (true, false),
        }
    }

    pub fn matches(&self, role: RoleType) -> bool {
        matches!(
            (self, role),
            (Role::Admin, RoleType::Admin) | (Role::Teacher, RoleType::Teacher)
        )
    }

    /// Which shared permission tree this role reads. Unprivileged users get none.
    pub fn permission_key(&self) -> Option<RoleType> {
        match self {
            Role::Admin => Some(RoleType::Admin),
            Role::Teacher => Some(RoleType::Teacher),
            Role::Unprivileged => None,
        }
    }
}

impl From<RoleType> for Role {
    fn from(value: RoleType) -> Self {
        match value {
            RoleType::Admin => Role::Admin,
            RoleType::Teacher => Role::Teacher,
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Role::Unprivileged => f.write_str("unprivileged"),
            Role::Teacher => f.write_str("teacher"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

/// Numeric seniority. Higher is more privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleLevel(pub i32);

impl RoleLevel {
    /// Level of a freshly provisioned profile.
    pub const DEFAULT: RoleLevel = RoleLevel(1);
    /// Level assigned when migration derives a teacher.
    pub const TEACHER_MIGRATED: RoleLevel = RoleLevel(6);
    /// Level assigned when migration derives an admin.
    pub const ADMIN_MIGRATED: RoleLevel = RoleLevel(9);

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl Default for RoleLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl core::fmt::Display for RoleLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
