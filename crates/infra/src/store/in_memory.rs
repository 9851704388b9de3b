//! In-memory stores for tests/dev.
//!
//! Each store counts reads and writes and can be told to fail or stall, so
//! tests can assert that a code path did (or did not) touch storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use edugate_auth::{
    PermissionTree, ProfileUpdate, RoleFields, RoleType, UserProfile, role_update_for_occupation,
};
use edugate_core::UserId;

use super::{MigrationProcedure, PermissionStore, ProfileSchema, ProfileStore, StoreError};

fn poisoned() -> StoreError {
    StoreError::Unavailable("in-memory store lock poisoned".to_string())
}

/// Shared switches for simulated failures and latency.
#[derive(Debug, Default)]
struct Faults {
    failing: AtomicBool,
    failing_reads: AtomicBool,
    delay_ms: AtomicUsize,
}

impl Faults {
    async fn apply(&self, operation: &str) -> Result<(), StoreError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("simulated failure in {operation}")));
        }
        Ok(())
    }

    async fn apply_read(&self, operation: &str) -> Result<(), StoreError> {
        self.apply(operation).await?;
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("simulated read failure in {operation}")));
        }
        Ok(())
    }

    fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as usize, Ordering::SeqCst);
    }
}

/// In-memory profiles table.
#[derive(Debug)]
pub struct InMemoryProfileStore {
    rows: RwLock<HashMap<UserId, UserProfile>>,
    schema: ProfileSchema,
    faults: Faults,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::with_schema(ProfileSchema::Extended)
    }

    pub fn with_schema(schema: ProfileSchema) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            schema,
            faults: Faults::default(),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert or replace a row directly (seeding; not counted as a write).
    pub fn insert(&self, profile: UserProfile) {
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(profile.id, profile);
        }
    }

    pub fn get(&self, user_id: UserId) -> Option<UserProfile> {
        self.rows.read().ok()?.get(&user_id).cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.faults.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail reads only; writes keep succeeding.
    pub fn set_failing_reads(&self, failing: bool) {
        self.faults.failing_reads.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.faults.set_delay(delay);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn schema(&self) -> Result<ProfileSchema, StoreError> {
        Ok(self.schema)
    }

    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        self.faults.apply_read("fetch_profile").await?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(&user_id).cloned())
    }

    async fn fetch_role_fields(
        &self,
        user_id: UserId,
        schema: ProfileSchema,
    ) -> Result<Option<RoleFields>, StoreError> {
        self.faults.apply_read("fetch_role_fields").await?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        if schema.supports_status_columns() && !self.schema.supports_status_columns() {
            return Err(StoreError::UnsupportedColumn("is_active"));
        }

        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(&user_id).map(|profile| {
            let mut fields = profile.role_fields();
            if !schema.supports_status_columns() {
                fields.is_active = None;
                fields.is_suspended = None;
            }
            fields
        }))
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<(), StoreError> {
        self.faults.apply("update_profile").await?;
        if update.has_status_fields() && !self.schema.supports_status_columns() {
            return Err(StoreError::UnsupportedColumn(if update.is_active.is_some() {
                "is_active"
            } else {
                "is_suspended"
            }));
        }

        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let profile = rows.get_mut(&user_id).ok_or(StoreError::NotFound(user_id))?;
        profile.apply(update, Utc::now());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory role permissions table.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    trees: RwLock<HashMap<RoleType, PermissionTree>>,
    faults: Faults,
    queries: AtomicUsize,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn insert(&self, role: RoleType, tree: PermissionTree) {
        if let Ok(mut trees) = self.trees.write() {
            trees.insert(role, tree);
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.faults.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.faults.set_delay(delay);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn fetch_trees(
        &self,
        roles: &[RoleType],
    ) -> Result<HashMap<RoleType, PermissionTree>, StoreError> {
        self.faults.apply("fetch_trees").await?;
        self.queries.fetch_add(1, Ordering::SeqCst);
        let trees = self.trees.read().map_err(|_| poisoned())?;
        Ok(roles
            .iter()
            .filter_map(|role| trees.get(role).map(|tree| (*role, tree.clone())))
            .collect())
    }
}

/// Backfills role columns on the in-memory profiles table, mirroring the
/// server-side procedure: legacy rows get the provisioning defaults.
#[derive(Debug)]
pub struct InMemoryMigrationProcedure {
    profiles: Arc<InMemoryProfileStore>,
    invocations: AtomicUsize,
}

impl InMemoryMigrationProcedure {
    pub fn new(profiles: Arc<InMemoryProfileStore>) -> Self {
        Self {
            profiles,
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MigrationProcedure for InMemoryMigrationProcedure {
    async fn migrate_user(&self, user_id: UserId) -> Result<bool, StoreError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        let Some(profile) = self.profiles.get(user_id) else {
            return Ok(false);
        };
        if profile.has_role_fields() {
            return Ok(true);
        }

        let mut update = role_update_for_occupation(None, Default::default());
        if !self.profiles.schema.supports_status_columns() {
            update = update.without_status_fields();
        }
        self.profiles.update_profile(user_id, &update).await?;
        Ok(true)
    }
}
