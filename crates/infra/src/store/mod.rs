//! Data-access boundary for profiles, permission trees and the bulk role
//! migration procedure.
//!
//! The traits are async and storage-agnostic; in-memory implementations back
//! tests and local development, Postgres implementations back production.

pub mod in_memory;
pub mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use edugate_auth::{PermissionTree, ProfileUpdate, RoleFields, RoleType, UserProfile};
use edugate_core::UserId;

pub use in_memory::{InMemoryMigrationProcedure, InMemoryPermissionStore, InMemoryProfileStore};
pub use postgres::{PostgresMigrationProcedure, PostgresPermissionStore, PostgresProfileStore};

/// Version of the profiles table.
///
/// `Legacy` tables predate the `is_active`/`is_suspended` columns; readers
/// then assume active and not suspended, and writers must not touch them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSchema {
    Legacy,
    Extended,
}

impl ProfileSchema {
    pub fn supports_status_columns(&self) -> bool {
        matches!(self, ProfileSchema::Extended)
    }
}

/// Storage operation error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(UserId),

    /// The write names a column the backing schema does not have.
    #[error("column '{0}' is not supported by the profile schema")]
    UnsupportedColumn(&'static str),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("database error during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Profile rows, keyed by user id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Which profile columns exist.
    async fn schema(&self) -> Result<ProfileSchema, StoreError>;

    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError>;

    /// Read only the role columns available in `schema`.
    async fn fetch_role_fields(
        &self,
        user_id: UserId,
        schema: ProfileSchema,
    ) -> Result<Option<RoleFields>, StoreError>;

    /// Partial update; absent fields are left untouched.
    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<(), StoreError>;
}

/// Per-role permission trees.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Fetch the trees for all requested roles in one round trip. Roles with
    /// no stored tree are absent from the result.
    async fn fetch_trees(
        &self,
        roles: &[RoleType],
    ) -> Result<HashMap<RoleType, PermissionTree>, StoreError>;
}

/// Server-side backfill of role columns for legacy profiles.
#[async_trait]
pub trait MigrationProcedure: Send + Sync {
    /// Returns whether the procedure reported success.
    async fn migrate_user(&self, user_id: UserId) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S> ProfileStore for Arc<S>
where
    S: ProfileStore + ?Sized,
{
    async fn schema(&self) -> Result<ProfileSchema, StoreError> {
        (**self).schema().await
    }

    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        (**self).fetch_profile(user_id).await
    }

    async fn fetch_role_fields(
        &self,
        user_id: UserId,
        schema: ProfileSchema,
    ) -> Result<Option<RoleFields>, StoreError> {
        (**self).fetch_role_fields(user_id, schema).await
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<(), StoreError> {
        (**self).update_profile(user_id, update).await
    }
}

#[async_trait]
impl<S> PermissionStore for Arc<S>
where
    S: PermissionStore + ?Sized,
{
    async fn fetch_trees(
        &self,
        roles: &[RoleType],
    ) -> Result<HashMap<RoleType, PermissionTree>, StoreError> {
        (**self).fetch_trees(roles).await
    }
}

#[async_trait]
impl<S> MigrationProcedure for Arc<S>
where
    S: MigrationProcedure + ?Sized,
{
    async fn migrate_user(&self, user_id: UserId) -> Result<bool, StoreError> {
        (**self).migrate_user(user_id).await
    }
}
