//! Role/permission loader.
//!
//! Turns a user id into a complete [`UserRole`]: the profile's role columns
//! (read according to the detected schema version) plus the shared permission
//! tree for the user's role. A missing or failing profile is an error; a
//! missing, failing or slow permission fetch degrades to an empty tree.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::OnceCell;

use edugate_auth::{PermissionTree, Role, RoleType, UserProfile, UserRole};
use edugate_core::UserId;

use crate::config::DEFAULT_PERMISSION_LOAD_TIMEOUT;
use crate::store::{PermissionStore, ProfileSchema, ProfileStore, StoreError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no profile for user {0}")]
    ProfileMissing(UserId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("load timed out after {0:?}")]
    TimedOut(Duration),
}

/// A loaded role plus whether its permission tree had to be defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedRole {
    pub role: UserRole,
    pub permissions_degraded: bool,
}

pub struct RoleLoader<P, R> {
    profiles: P,
    permissions: R,
    schema: OnceCell<ProfileSchema>,
    permission_timeout: Duration,
}

impl<P, R> RoleLoader<P, R>
where
    P: ProfileStore,
    R: PermissionStore,
{
    pub fn new(profiles: P, permissions: R) -> Self {
        Self {
            profiles,
            permissions,
            schema: OnceCell::new(),
            permission_timeout: DEFAULT_PERMISSION_LOAD_TIMEOUT,
        }
    }

    pub fn with_permission_timeout(mut self, timeout: Duration) -> Self {
        self.permission_timeout = timeout;
        self
    }

    pub fn profiles(&self) -> &P {
        &self.profiles
    }

    /// The profile schema version, detected once.
    ///
    /// Detection failures fall back to the legacy column set for this call
    /// only, so a transient error is not memoised.
    pub async fn schema(&self) -> ProfileSchema {
        match self.schema.get_or_try_init(|| self.profiles.schema()).await {
            Ok(schema) => *schema,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "profile schema detection failed; reading legacy columns"
                );
                ProfileSchema::Legacy
            }
        }
    }

    pub async fn load_profile(&self, user_id: UserId) -> Result<UserProfile, LoadError> {
        self.profiles
            .fetch_profile(user_id)
            .await?
            .ok_or(LoadError::ProfileMissing(user_id))
    }

    pub async fn load_role(&self, user_id: UserId) -> Result<UserRole, LoadError> {
        Ok(self.load_role_detailed(user_id).await?.role)
    }

    pub async fn load_role_detailed(&self, user_id: UserId) -> Result<LoadedRole, LoadError> {
        let schema = self.schema().await;
        let fields = self
            .profiles
            .fetch_role_fields(user_id, schema)
            .await?
            .ok_or(LoadError::ProfileMissing(user_id))?
            .resolve();

        let (permissions, permissions_degraded) = self.permission_tree(user_id, fields.role).await;

        tracing::debug!(
            %user_id,
            role = %fields.role,
            level = fields.level.value(),
            permissions_degraded,
            "role loaded"
        );

        Ok(LoadedRole {
            role: UserRole::new(user_id, fields, permissions),
            permissions_degraded,
        })
    }

    /// Fetch both shared trees in one query and pick the one for `role`.
    async fn permission_tree(&self, user_id: UserId, role: Role) -> (PermissionTree, bool) {
        let Some(key) = role.permission_key() else {
            return (PermissionTree::empty(), false);
        };

        let fetch = self.permissions.fetch_trees(&RoleType::ALL);
        let fetched = tokio::time::timeout(self.permission_timeout, fetch).await;

        match fetched {
            Ok(Ok(mut trees)) => match trees.remove(&key) {
                Some(tree) => (tree, false),
                None => {
                    tracing::warn!(%user_id, role = %key, "no permission tree stored for role");
                    (PermissionTree::empty(), true)
                }
            },
            Ok(Err(e)) => {
                tracing::warn!(
                    %user_id,
                    error = %e,
                    "permission fetch failed; continuing without permissions"
                );
                (PermissionTree::empty(), true)
            }
            Err(_) => {
                tracing::warn!(
                    %user_id,
                    timeout_ms = self.permission_timeout.as_millis() as u64,
                    "permission fetch timed out; continuing without permissions"
                );
                (PermissionTree::empty(), true)
            }
        }
    }
}
