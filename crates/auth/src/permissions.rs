//! Permission identifiers and the per-role permission tree.
//!
//! A permission is a `(resource, action)` pair drawn from two closed
//! enumerations, written `resource.action` on the wire (e.g. `courses.create`).
//! The stored tree is a two-level JSON object keyed the same way; lookups are
//! total and anything absent or unparseable is denied.

use core::str::FromStr;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use thiserror::Error;

macro_rules! keyword_enum {
    (
        $(#[$meta:meta])* $name:ident, $kind:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = PermissionParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(PermissionParseError::UnknownSegment {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

keyword_enum!(
    /// Resource half of a permission path.
    Resource, "resource" {
        Courses => "courses",
        Lessons => "lessons",
        Jobs => "jobs",
        Applications => "applications",
        Companies => "companies",
        Users => "users",
        Analytics => "analytics",
        Content => "content",
        Discussions => "discussions",
        Feedback => "feedback",
        Events => "events",
        Payments => "payments",
        Settings => "settings",
    }
);

keyword_enum!(
    /// Action half of a permission path.
    Action, "action" {
        View => "view",
        Create => "create",
        Edit => "edit",
        Delete => "delete",
        Manage => "manage",
        Approve => "approve",
        Publish => "publish",
        Moderate => "moderate",
        Export => "export",
        Apply => "apply",
    }
);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermissionParseError {
    #[error("permission path '{0}' is not of the form resource.action")]
    Malformed(String),

    #[error("unknown {kind} '{value}'")]
    UnknownSegment { kind: &'static str, value: String },
}

/// A single `(resource, action)` permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }

    pub const COURSES_VIEW: Permission = Permission::new(Resource::Courses, Action::View);
    pub const COURSES_CREATE: Permission = Permission::new(Resource::Courses, Action::Create);
    pub const COURSES_EDIT: Permission = Permission::new(Resource::Courses, Action::Edit);
    pub const COURSES_DELETE: Permission = Permission::new(Resource::Courses, Action::Delete);
    pub const COURSES_PUBLISH: Permission = Permission::new(Resource::Courses, Action::Publish);
    pub const COURSES_MANAGE: Permission = Permission::new(Resource::Courses, Action::Manage);

    pub const JOBS_VIEW: Permission = Permission::new(Resource::Jobs, Action::View);
    pub const JOBS_CREATE: Permission = Permission::new(Resource::Jobs, Action::Create);
    pub const JOBS_EDIT: Permission = Permission::new(Resource::Jobs, Action::Edit);
    pub const JOBS_DELETE: Permission = Permission::new(Resource::Jobs, Action::Delete);
    pub const JOBS_MANAGE: Permission = Permission::new(Resource::Jobs, Action::Manage);
    pub const JOBS_APPROVE: Permission = Permission::new(Resource::Jobs, Action::Approve);

    pub const APPLICATIONS_VIEW: Permission = Permission::new(Resource::Applications, Action::View);
    pub const APPLICATIONS_MANAGE: Permission =
        Permission::new(Resource::Applications, Action::Manage);
    pub const COMPANIES_MANAGE: Permission = Permission::new(Resource::Companies, Action::Manage);

    pub const USERS_VIEW: Permission = Permission::new(Resource::Users, Action::View);
    pub const USERS_MANAGE: Permission = Permission::new(Resource::Users, Action::Manage);

    pub const ANALYTICS_VIEW: Permission = Permission::new(Resource::Analytics, Action::View);
    pub const ANALYTICS_EXPORT: Permission = Permission::new(Resource::Analytics, Action::Export);

    pub const CONTENT_APPROVE: Permission = Permission::new(Resource::Content, Action::Approve);
    pub const DISCUSSIONS_VIEW: Permission = Permission::new(Resource::Discussions, Action::View);
    pub const DISCUSSIONS_MODERATE: Permission =
        Permission::new(Resource::Discussions, Action::Moderate);
    pub const PAYMENTS_MANAGE: Permission = Permission::new(Resource::Payments, Action::Manage);
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.resource, self.action)
    }
}

impl FromStr for Permission {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(resource), Some(action), None) => {
                Ok(Permission::new(resource.parse()?, action.parse()?))
            }
            _ => Err(PermissionParseError::Malformed(s.to_string())),
        }
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The permission tree shared by every holder of one role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionTree {
    leaves: BTreeMap<Permission, bool>,
}

impl PermissionTree {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder-style grant, mostly for tests and seed data.
    pub fn with(mut self, permission: Permission) -> Self {
        self.grant(permission, true);
        self
    }

    pub fn grant(&mut self, permission: Permission, allowed: bool) {
        self.leaves.insert(permission, allowed);
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Total lookup: absent leaves are denied.
    pub fn allows(&self, permission: Permission) -> bool {
        self.leaves.get(&permission).copied().unwrap_or(false)
    }

    /// Lookup by dotted path. Paths naming unknown resources or actions are denied.
    pub fn allows_path(&self, path: &str) -> bool {
        path.parse::<Permission>()
            .map(|p| self.allows(p))
            .unwrap_or(false)
    }

    /// Granted permissions, in stable order.
    pub fn granted(&self) -> impl Iterator<Item = Permission> + '_ {
        self.leaves.iter().filter(|(_, v)| **v).map(|(k, _)| *k)
    }

    /// Read the stored nested form, `{resource: {action: bool}}`.
    ///
    /// Never fails: unknown resources/actions and non-boolean leaves are
    /// skipped, and a non-object root yields an empty tree.
    pub fn from_json(value: &JsonValue) -> Self {
        let mut tree = Self::empty();
        let Some(resources) = value.as_object() else {
            return tree;
        };

        for (resource_key, actions) in resources {
            let Ok(resource) = resource_key.parse::<Resource>() else {
                tracing::trace!(resource = %resource_key, "skipping unknown permission resource");
                continue;
            };
            let Some(actions) = actions.as_object() else {
                continue;
            };
            for (action_key, allowed) in actions {
                let (Ok(action), Some(allowed)) = (action_key.parse::<Action>(), allowed.as_bool())
                else {
                    tracing::trace!(
                        resource = %resource_key,
                        action = %action_key,
                        "skipping unusable permission leaf"
                    );
                    continue;
                };
                tree.grant(Permission::new(resource, action), allowed);
            }
        }

        tree
    }

    pub fn to_json(&self) -> JsonValue {
        let mut nested: BTreeMap<&'static str, BTreeMap<&'static str, bool>> = BTreeMap::new();
        for (permission, allowed) in &self.leaves {
            nested
                .entry(permission.resource.as_str())
                .or_default()
                .insert(permission.action.as_str(), *allowed);
        }
        JsonValue::Object(
            nested
                .into_iter()
                .map(|(resource, actions)| {
                    let actions = actions
                        .into_iter()
                        .map(|(action, allowed)| (action.to_string(), JsonValue::Bool(allowed)))
                        .collect();
                    (resource.to_string(), JsonValue::Object(actions))
                })
                .collect(),
        )
    }
}

impl FromIterator<Permission> for PermissionTree {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), PermissionTree::with)
    }
}

impl Serialize for PermissionTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PermissionTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}
