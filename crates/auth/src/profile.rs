//! Stored profile record and partial updates.
//!
//! Only the role columns matter to access control; every other column is
//! carried through untouched in [`UserProfile::attributes`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use edugate_core::{DomainError, DomainResult, UserId};

use crate::{Role, RoleLevel};

/// One row of the profiles table.
///
/// Role columns are optional because profiles created before roles existed
/// do not carry them until they are migrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub is_admin: Option<bool>,
    #[serde(default)]
    pub is_teacher: Option<bool>,
    #[serde(default)]
    pub role_level: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_suspended: Option<bool>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    /// A profile as first provisioned: level 1, no role flags, active.
    pub fn provisioned(id: UserId) -> Self {
        Self {
            id,
            is_admin: Some(false),
            is_teacher: Some(false),
            role_level: Some(RoleLevel::DEFAULT.value()),
            is_active: Some(true),
            is_suspended: Some(false),
            occupation: None,
            updated_at: None,
            attributes: serde_json::Map::new(),
        }
    }

    /// A pre-roles profile with none of the role columns populated.
    pub fn legacy(id: UserId, occupation: Option<&str>) -> Self {
        Self {
            id,
            is_admin: None,
            is_teacher: None,
            role_level: None,
            is_active: None,
            is_suspended: None,
            occupation: occupation.map(str::to_string),
            updated_at: None,
            attributes: serde_json::Map::new(),
        }
    }

    /// Whether any role column has been populated (i.e. already migrated).
    pub fn has_role_fields(&self) -> bool {
        self.is_admin.is_some() || self.is_teacher.is_some() || self.role_level.is_some()
    }

    pub fn role_fields(&self) -> RoleFields {
        RoleFields {
            is_admin: self.is_admin,
            is_teacher: self.is_teacher,
            role_level: self.role_level,
            is_active: self.is_active,
            is_suspended: self.is_suspended,
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &ProfileUpdate, at: DateTime<Utc>) {
        if let Some(v) = update.is_admin {
            self.is_admin = Some(v);
        }
        if let Some(v) = update.is_teacher {
            self.is_teacher = Some(v);
        }
        if let Some(v) = update.role_level {
            self.role_level = Some(v);
        }
        if let Some(v) = update.is_active {
            self.is_active = Some(v);
        }
        if let Some(v) = update.is_suspended {
            self.is_suspended = Some(v);
        }
        self.updated_at = Some(at);
    }
}

/// The role columns as read from storage.
///
/// `is_active`/`is_suspended` are `None` when the backing schema predates
/// those columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFields {
    pub is_admin: Option<bool>,
    pub is_teacher: Option<bool>,
    pub role_level: Option<i32>,
    pub is_active: Option<bool>,
    pub is_suspended: Option<bool>,
}

/// Role columns with every default applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRoleFields {
    pub role: Role,
    pub level: RoleLevel,
    pub is_active: bool,
    pub is_suspended: bool,
}

impl RoleFields {
    /// Apply defaults: missing flags are false, a missing level is
    /// [`RoleLevel::DEFAULT`], missing status columns mean active and not
    /// suspended. Contradictory flags resolve to admin.
    pub fn resolve(&self) -> ResolvedRoleFields {
        let is_admin = self.is_admin.unwrap_or(false);
        let is_teacher = self.is_teacher.unwrap_or(false);
        if is_admin && is_teacher {
            tracing::warn!("profile has both admin and teacher flags; treating as admin");
        }

        ResolvedRoleFields {
            role: Role::from_flags_lenient(is_admin, is_teacher),
            level: self.role_level.map(RoleLevel).unwrap_or_default(),
            is_active: self.is_active.unwrap_or(true),
            is_suspended: self.is_suspended.unwrap_or(false),
        }
    }
}

/// A partial write to a profile's role columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_teacher: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_level: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_suspended: Option<bool>,
}

impl ProfileUpdate {
    /// Set both flags from a role tag, plus the level.
    pub fn for_role(role: Role, level: RoleLevel) -> Self {
        let (is_admin, is_teacher) = role.flags();
        Self {
            is_admin: Some(is_admin),
            is_teacher: Some(is_teacher),
            role_level: Some(level.value()),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, is_active: bool, is_suspended: bool) -> Self {
        self.is_active = Some(is_active);
        self.is_suspended = Some(is_suspended);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the update touches the status columns.
    pub fn has_status_fields(&self) -> bool {
        self.is_active.is_some() || self.is_suspended.is_some()
    }

    /// Drop the status columns (for schemas that lack them).
    pub fn without_status_fields(mut self) -> Self {
        self.is_active = None;
        self.is_suspended = None;
        self
    }

    /// Reject empty updates and updates that could leave both role flags set.
    ///
    /// Raising one flag requires clearing the other in the same write, since
    /// the stored row may already carry it.
    pub fn validate(&self) -> DomainResult<()> {
        if self.is_empty() {
            return Err(DomainError::validation("profile update is empty"));
        }
        if self.is_admin == Some(true) && self.is_teacher == Some(true) {
            return Err(DomainError::invariant(
                "a profile cannot be both admin and teacher",
            ));
        }
        let raises_alone = |flag: Option<bool>, other: Option<bool>| {
            flag == Some(true) && other != Some(false)
        };
        if raises_alone(self.is_admin, self.is_teacher)
            || raises_alone(self.is_teacher, self.is_admin)
        {
            return Err(DomainError::invariant(
                "setting a role flag must clear the other one in the same update",
            ));
        }
        if let Some(level) = self.role_level {
            if level < 0 {
                return Err(DomainError::validation("role_level must not be negative"));
            }
        }
        Ok(())
    }
}
