//! `edugate-auth`: role-based access control core.
//!
//! Role model, permission tree, boolean algebra evaluator and the session role
//! cache. This crate is decoupled from storage and transport: it performs no
//! IO and has no async code. Loading roles lives in `edugate-infra`.

pub mod algebra;
pub mod cache;
pub mod checker;
pub mod features;
pub mod migration;
pub mod permissions;
pub mod profile;
pub mod roles;
pub mod user_role;

pub use algebra::RoleBooleanAlgebra;
pub use cache::{SessionRoleCache, SessionState};
pub use checker::{PermissionCheck, PermissionSummary};
pub use features::{Feature, FeatureRequirement};
pub use migration::{
    DEFAULT_UNRECOGNIZED_OCCUPATION_POLICY, OccupationClass, UnknownOccupationPolicy,
    UnrecognizedOccupationPolicy, classify_occupation, role_update_for_occupation,
};
pub use permissions::{Action, Permission, PermissionParseError, PermissionTree, Resource};
pub use profile::{ProfileUpdate, ResolvedRoleFields, RoleFields, UserProfile};
pub use roles::{Role, RoleLevel, RoleType, UnknownRole};
pub use user_role::UserRole;
