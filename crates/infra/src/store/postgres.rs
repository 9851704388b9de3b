//! Postgres-backed stores.
//!
//! Tables (see `migrations/`):
//! - `profiles`: one row per user; role columns nullable for legacy rows.
//! - `role_permissions`: `role_name` → `jsonb` permission tree.
//! - `migrate_user_roles(uuid) returns boolean`: server-side backfill.
//!
//! The profile schema version is detected from `information_schema` once per
//! store and memoised.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tokio::sync::OnceCell;

use edugate_auth::{PermissionTree, ProfileUpdate, RoleFields, RoleType, UserProfile};
use edugate_core::UserId;

use super::{MigrationProcedure, PermissionStore, ProfileSchema, ProfileStore, StoreError};

fn map_sqlx_error(operation: &'static str, source: sqlx::Error) -> StoreError {
    tracing::debug!(operation, error = %source, "postgres operation failed");
    StoreError::Database { operation, source }
}

pub struct PostgresProfileStore {
    pool: PgPool,
    schema: OnceCell<ProfileSchema>,
}

impl PostgresProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema: OnceCell::new(),
        }
    }

    async fn detect_schema(&self) -> Result<ProfileSchema, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS present
            FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name = 'profiles'
              AND column_name IN ('is_active', 'is_suspended')
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("detect_profile_schema", e))?;

        let present: i64 = row
            .try_get("present")
            .map_err(|e| map_sqlx_error("detect_profile_schema", e))?;

        let schema = if present == 2 {
            ProfileSchema::Extended
        } else {
            ProfileSchema::Legacy
        };
        tracing::info!(?schema, "detected profile schema");
        Ok(schema)
    }
}

#[async_trait]
impl ProfileStore for PostgresProfileStore {
    async fn schema(&self) -> Result<ProfileSchema, StoreError> {
        self.schema
            .get_or_try_init(|| self.detect_schema())
            .await
            .copied()
    }

    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query("SELECT to_jsonb(p) AS profile FROM profiles p WHERE p.id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_profile", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value: serde_json::Value = row
            .try_get("profile")
            .map_err(|e| map_sqlx_error("fetch_profile", e))?;
        let profile = serde_json::from_value(value)
            .map_err(|e| StoreError::Malformed(format!("profile {}: {}", user_id, e)))?;
        Ok(Some(profile))
    }

    async fn fetch_role_fields(
        &self,
        user_id: UserId,
        schema: ProfileSchema,
    ) -> Result<Option<RoleFields>, StoreError> {
        let sql = match schema {
            ProfileSchema::Extended => {
                r#"
                SELECT is_admin, is_teacher, role_level, is_active, is_suspended
                FROM profiles
                WHERE id = $1
                "#
            }
            ProfileSchema::Legacy => {
                r#"
                SELECT is_admin, is_teacher, role_level
                FROM profiles
                WHERE id = $1
                "#
            }
        };

        let row = sqlx::query(sql)
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_role_fields", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let read = |e| map_sqlx_error("fetch_role_fields", e);
        let mut fields = RoleFields {
            is_admin: row.try_get("is_admin").map_err(read)?,
            is_teacher: row.try_get("is_teacher").map_err(read)?,
            role_level: row.try_get("role_level").map_err(read)?,
            is_active: None,
            is_suspended: None,
        };
        if schema.supports_status_columns() {
            fields.is_active = row.try_get("is_active").map_err(read)?;
            fields.is_suspended = row.try_get("is_suspended").map_err(read)?;
        }
        Ok(Some(fields))
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<(), StoreError> {
        let schema = self.schema().await?;

        let result = if schema.supports_status_columns() {
            sqlx::query(
                r#"
                UPDATE profiles SET
                    is_admin     = COALESCE($2, is_admin),
                    is_teacher   = COALESCE($3, is_teacher),
                    role_level   = COALESCE($4, role_level),
                    is_active    = COALESCE($5, is_active),
                    is_suspended = COALESCE($6, is_suspended),
                    updated_at   = now()
                WHERE id = $1
                "#,
            )
            .bind(user_id.as_uuid())
            .bind(update.is_admin)
            .bind(update.is_teacher)
            .bind(update.role_level)
            .bind(update.is_active)
            .bind(update.is_suspended)
            .execute(&self.pool)
            .await
        } else {
            if update.has_status_fields() {
                return Err(StoreError::UnsupportedColumn("is_active"));
            }
            sqlx::query(
                r#"
                UPDATE profiles SET
                    is_admin   = COALESCE($2, is_admin),
                    is_teacher = COALESCE($3, is_teacher),
                    role_level = COALESCE($4, role_level),
                    updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(user_id.as_uuid())
            .bind(update.is_admin)
            .bind(update.is_teacher)
            .bind(update.role_level)
            .execute(&self.pool)
            .await
        }
        .map_err(|e| map_sqlx_error("update_profile", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(user_id));
        }
        Ok(())
    }
}

pub struct PostgresPermissionStore {
    pool: PgPool,
}

impl PostgresPermissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for PostgresPermissionStore {
    async fn fetch_trees(
        &self,
        roles: &[RoleType],
    ) -> Result<HashMap<RoleType, PermissionTree>, StoreError> {
        let names: Vec<&str> = roles.iter().map(RoleType::as_str).collect();

        let rows = sqlx::query(
            r#"
            SELECT role_name, permissions
            FROM role_permissions
            WHERE role_name = ANY($1)
            "#,
        )
        .bind(&names)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_permission_trees", e))?;

        let mut trees = HashMap::with_capacity(rows.len());
        for row in rows {
            let name: String = row
                .try_get("role_name")
                .map_err(|e| map_sqlx_error("fetch_permission_trees", e))?;
            let permissions: serde_json::Value = row
                .try_get("permissions")
                .map_err(|e| map_sqlx_error("fetch_permission_trees", e))?;

            match name.parse::<RoleType>() {
                Ok(role) => {
                    trees.insert(role, PermissionTree::from_json(&permissions));
                }
                Err(e) => tracing::warn!(error = %e, "ignoring permission row for unknown role"),
            }
        }
        Ok(trees)
    }
}

pub struct PostgresMigrationProcedure {
    pool: PgPool,
}

impl PostgresMigrationProcedure {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MigrationProcedure for PostgresMigrationProcedure {
    async fn migrate_user(&self, user_id: UserId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT migrate_user_roles($1) AS migrated")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate_user_roles", e))?;

        let migrated: Option<bool> = row
            .try_get("migrated")
            .map_err(|e| map_sqlx_error("migrate_user_roles", e))?;
        Ok(migrated.unwrap_or(false))
    }
}
