//! `RoleService`: the consumer-facing access-control API.
//!
//! One service instance per signed-in device session. It owns the session
//! role cache, loads roles through [`RoleLoader`] with bounded waits, and
//! performs the few role mutations (admin role updates, migrations). Evaluator
//! calls never touch storage; they read snapshots of the cache.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use edugate_auth::{
    PermissionCheck, ProfileUpdate, RoleBooleanAlgebra, RoleType, SessionRoleCache, SessionState,
    UnrecognizedOccupationPolicy, UserProfile, UserRole, role_update_for_occupation,
};
use edugate_core::{DomainError, UserId};

use crate::config::RbacConfig;
use crate::loader::{LoadError, LoadedRole, RoleLoader};
use crate::store::{MigrationProcedure, PermissionStore, ProfileStore, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    /// The signed-in session lacks the role the operation requires.
    #[error("forbidden: operation requires the '{0}' role")]
    Unauthorized(RoleType),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("no profile for user {0}")]
    ProfileMissing(UserId),

    #[error("role migration procedure reported failure for user {0}")]
    MigrationRejected(UserId),
}

/// Outcome of session establishment.
#[derive(Debug)]
pub enum SessionInit {
    /// Profile and role loaded with their permission tree.
    Loaded,
    /// Profile and role loaded, but the permission tree was defaulted to empty.
    Degraded,
    /// Nothing was loaded; the session continues with no role.
    Failed(LoadError),
}

impl SessionInit {
    pub fn is_loaded(&self) -> bool {
        !matches!(self, SessionInit::Failed(_))
    }
}

/// Result of [`RoleService::check_and_migrate_user`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The profile already had role columns; nothing was written.
    AlreadyMigrated,
    Migrated,
}

pub struct RoleService<P, R, M> {
    cache: Arc<SessionRoleCache>,
    loader: RoleLoader<P, R>,
    migrations: M,
    load_timeout: Duration,
    occupation_policy: UnrecognizedOccupationPolicy,
}

impl<P, R, M> RoleService<P, R, M>
where
    P: ProfileStore,
    R: PermissionStore,
    M: MigrationProcedure,
{
    pub fn new(profiles: P, permissions: R, migrations: M, config: &RbacConfig) -> Self {
        Self::with_cache(SessionRoleCache::arc(), profiles, permissions, migrations, config)
    }

    /// Build around an existing cache (e.g. one shared with UI state).
    pub fn with_cache(
        cache: Arc<SessionRoleCache>,
        profiles: P,
        permissions: R,
        migrations: M,
        config: &RbacConfig,
    ) -> Self {
        Self {
            cache,
            loader: RoleLoader::new(profiles, permissions)
                .with_permission_timeout(config.permission_load_timeout),
            migrations,
            load_timeout: config.role_load_timeout,
            occupation_policy: config.occupation_policy,
        }
    }

    pub fn cache(&self) -> &Arc<SessionRoleCache> {
        &self.cache
    }

    async fn bounded<T, F>(&self, load: F) -> Result<T, LoadError>
    where
        F: Future<Output = Result<T, LoadError>>,
    {
        tokio::time::timeout(self.load_timeout, load)
            .await
            .map_err(|_| LoadError::TimedOut(self.load_timeout))?
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Loading
    // ─────────────────────────────────────────────────────────────────────────

    /// Load profile and role for a freshly signed-in user.
    ///
    /// Another user's cached state is dropped first. On failure or timeout
    /// the cache is emptied, even if it held this user's earlier role, and
    /// every check denies.
    #[tracing::instrument(skip(self))]
    pub async fn establish_session(&self, user_id: UserId) -> SessionInit {
        if self.cache.current_user().is_some_and(|current| current != user_id) {
            self.cache.clear();
        }

        let loaded = self
            .bounded(async {
                let profile = self.loader.load_profile(user_id).await?;
                let role = self.loader.load_role_detailed(user_id).await?;
                Ok((profile, role))
            })
            .await;

        match loaded {
            Ok((profile, LoadedRole { role, permissions_degraded })) => {
                self.cache
                    .replace(SessionState::new(user_id).with_profile(profile).with_role(role));
                if permissions_degraded {
                    tracing::warn!(%user_id, "session established with degraded permissions");
                    SessionInit::Degraded
                } else {
                    tracing::info!(%user_id, "session established");
                    SessionInit::Loaded
                }
            }
            Err(e) => {
                self.cache.clear();
                tracing::error!(
                    %user_id,
                    error = %e,
                    "session role load failed; continuing without a role"
                );
                SessionInit::Failed(e)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn load_user_profile(&self, user_id: UserId) -> Option<UserProfile> {
        match self.bounded(self.loader.load_profile(user_id)).await {
            Ok(profile) => {
                let cached = profile.clone();
                self.cache.update_for(user_id, |state| state.with_profile(cached));
                Some(profile)
            }
            Err(e) => {
                tracing::error!(%user_id, error = %e, "failed to load user profile");
                None
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn load_user_role(&self, user_id: UserId) -> Option<Arc<UserRole>> {
        match self.bounded(self.loader.load_role(user_id)).await {
            Ok(role) => {
                let role = Arc::new(role);
                let cached = Arc::clone(&role);
                self.cache.update_for(user_id, |mut state| {
                    state.role = Some(cached);
                    state
                });
                Some(role)
            }
            Err(e) => {
                tracing::error!(%user_id, error = %e, "failed to load user role");
                None
            }
        }
    }

    /// Snapshot checker; valid until the next cache mutation.
    pub fn permission_checker(&self) -> PermissionCheck {
        self.cache.permission_checker()
    }

    pub fn boolean_algebra(&self) -> RoleBooleanAlgebra {
        self.cache.algebra()
    }

    /// Sign-out: `loaded → empty`.
    pub fn clear_user_data(&self) {
        if let Some(user_id) = self.cache.current_user() {
            tracing::info!(%user_id, "clearing session role data");
        }
        self.cache.clear();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Write role columns on another user's profile. Admin sessions only.
    ///
    /// The target's own session is not refreshed; if the target is the
    /// signed-in user the local role is reloaded.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_user_role(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<(), SessionError> {
        if !self.cache.algebra().has_exact_role(RoleType::Admin) {
            tracing::warn!(target_user = %user_id, "role update rejected: caller is not an admin");
            return Err(SessionError::Unauthorized(RoleType::Admin));
        }

        let update = self.fit_to_schema(update).await;
        update.validate()?;
        self.loader.profiles().update_profile(user_id, &update).await?;
        tracing::info!(target_user = %user_id, ?update, "user role updated");

        self.refresh_if_current(user_id).await;
        Ok(())
    }

    /// Derive role columns from the occupation text and write them.
    #[tracing::instrument(skip(self))]
    pub async fn migrate_user_role(
        &self,
        user_id: UserId,
        occupation: Option<&str>,
    ) -> Result<(), SessionError> {
        let update = role_update_for_occupation(occupation, self.occupation_policy);
        let update = self.fit_to_schema(update).await;
        update.validate()?;

        self.loader.profiles().update_profile(user_id, &update).await?;
        tracing::info!(%user_id, ?update, "user role migrated");

        self.refresh_if_current(user_id).await;
        Ok(())
    }

    /// Run the server-side migration for a legacy profile. A profile that
    /// already has any role column is left untouched.
    #[tracing::instrument(skip(self))]
    pub async fn check_and_migrate_user(
        &self,
        user_id: UserId,
    ) -> Result<MigrationOutcome, SessionError> {
        let profile = self
            .loader
            .profiles()
            .fetch_profile(user_id)
            .await?
            .ok_or(SessionError::ProfileMissing(user_id))?;

        if profile.has_role_fields() {
            tracing::debug!(%user_id, "profile already has role fields; skipping migration");
            return Ok(MigrationOutcome::AlreadyMigrated);
        }

        if !self.migrations.migrate_user(user_id).await? {
            tracing::error!(%user_id, "role migration procedure failed");
            return Err(SessionError::MigrationRejected(user_id));
        }

        tracing::info!(%user_id, "legacy profile migrated");
        self.refresh_if_current(user_id).await;
        Ok(MigrationOutcome::Migrated)
    }

    async fn fit_to_schema(&self, update: ProfileUpdate) -> ProfileUpdate {
        if update.has_status_fields() && !self.loader.schema().await.supports_status_columns() {
            tracing::debug!("dropping status columns unsupported by the profile schema");
            update.without_status_fields()
        } else {
            update
        }
    }

    /// `loaded → loaded`: reload the signed-in user's role after a write.
    ///
    /// If the reload fails the cached role is dropped rather than left stale.
    async fn refresh_if_current(&self, user_id: UserId) {
        if self.cache.current_user() != Some(user_id) {
            return;
        }
        if self.load_user_role(user_id).await.is_none() {
            tracing::warn!(%user_id, "role reload after write failed; dropping cached role");
            self.cache.update_for(user_id, |mut state| {
                state.role = None;
                state
            });
        }
    }
}
