//! Black-box tests for the session role service over in-memory stores.
//!
//! Covers the sign-in → check → mutate → sign-out lifecycle, fail-closed
//! behaviour on load failures and timeouts, the admin-only mutation gate,
//! and migration idempotency.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use edugate_auth::{
    Permission, PermissionTree, ProfileUpdate, Role, RoleLevel, RoleType, UserProfile,
};
use edugate_core::{DomainError, UserId};
use edugate_infra::{
    InMemoryMigrationProcedure, InMemoryPermissionStore, InMemoryProfileStore, LoadError,
    MigrationOutcome, ProfileSchema, RbacConfig, RoleService, SessionError, SessionInit,
};

type Service = RoleService<
    Arc<InMemoryProfileStore>,
    Arc<InMemoryPermissionStore>,
    Arc<InMemoryMigrationProcedure>,
>;

struct Harness {
    profiles: Arc<InMemoryProfileStore>,
    permissions: Arc<InMemoryPermissionStore>,
    migrations: Arc<InMemoryMigrationProcedure>,
    service: Service,
}

fn harness_with(profiles: Arc<InMemoryProfileStore>, config: RbacConfig) -> Harness {
    let permissions = InMemoryPermissionStore::arc();
    permissions.insert(
        RoleType::Admin,
        PermissionTree::empty()
            .with(Permission::USERS_VIEW)
            .with(Permission::USERS_MANAGE)
            .with(Permission::ANALYTICS_VIEW)
            .with(Permission::CONTENT_APPROVE)
            .with(Permission::COURSES_CREATE),
    );
    permissions.insert(
        RoleType::Teacher,
        PermissionTree::empty()
            .with(Permission::COURSES_VIEW)
            .with(Permission::COURSES_CREATE)
            .with(Permission::COURSES_EDIT),
    );
    let migrations = Arc::new(InMemoryMigrationProcedure::new(Arc::clone(&profiles)));
    let service = RoleService::new(
        Arc::clone(&profiles),
        Arc::clone(&permissions),
        Arc::clone(&migrations),
        &config,
    );
    Harness { profiles, permissions, migrations, service }
}

fn harness() -> Harness {
    harness_with(InMemoryProfileStore::arc(), RbacConfig::default())
}

fn admin_profile(id: UserId) -> UserProfile {
    let mut profile = UserProfile::provisioned(id);
    profile.is_admin = Some(true);
    profile.role_level = Some(9);
    profile
}

fn teacher_profile(id: UserId) -> UserProfile {
    let mut profile = UserProfile::provisioned(id);
    profile.is_teacher = Some(true);
    profile.role_level = Some(6);
    profile
}

// ─────────────────────────────────────────────────────────────────────────────
// Session lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sign_in_check_and_sign_out() {
    let h = harness();
    let id = UserId::new();
    h.profiles.insert(teacher_profile(id));

    let init = h.service.establish_session(id).await;
    assert!(matches!(init, SessionInit::Loaded));

    let checker = h.service.permission_checker();
    assert!(checker.is_teacher());
    assert!(checker.can_create_courses());
    assert!(checker.can_access_teacher_panel());
    assert!(!checker.can_access_admin_panel());
    assert!(!checker.can_manage_users());

    h.service.clear_user_data();
    let checker = h.service.permission_checker();
    assert!(!checker.is_teacher());
    assert!(!checker.can_create_courses());
    assert!(h.service.cache().snapshot().is_none());
}

#[tokio::test]
async fn signing_in_as_another_user_drops_previous_state() {
    let h = harness();
    let admin = UserId::new();
    let other = UserId::new();
    h.profiles.insert(admin_profile(admin));

    h.service.establish_session(admin).await;
    assert!(h.service.permission_checker().is_admin());

    // `other` has no profile row: the load fails and nothing of `admin` remains.
    let init = h.service.establish_session(other).await;
    assert!(matches!(init, SessionInit::Failed(LoadError::ProfileMissing(_))));
    assert!(!h.service.permission_checker().is_admin());
    assert!(!h.service.cache().is_loaded());
}

#[tokio::test]
async fn failed_profile_load_is_fail_closed() {
    let h = harness();
    let id = UserId::new();
    h.profiles.insert(admin_profile(id));
    h.profiles.set_failing(true);

    assert!(!h.service.establish_session(id).await.is_loaded());
    assert!(h.service.load_user_profile(id).await.is_none());
    assert!(h.service.load_user_role(id).await.is_none());

    let algebra = h.service.boolean_algebra();
    assert!(!algebra.has_exact_role(RoleType::Admin));
    assert!(!algebra.has_permission_path("users.manage"));
    assert!(!h.service.permission_checker().can_manage_users());
}

#[tokio::test]
async fn failed_reload_of_same_user_empties_cache() {
    let h = harness();
    let id = UserId::new();
    h.profiles.insert(admin_profile(id));
    assert!(h.service.establish_session(id).await.is_loaded());
    assert!(h.service.permission_checker().is_admin());

    h.profiles.set_failing(true);
    let init = h.service.establish_session(id).await;

    assert!(!init.is_loaded());
    assert!(!h.service.cache().is_loaded());
    assert!(!h.service.permission_checker().is_admin());
    assert!(!h.service.boolean_algebra().has_exact_role(RoleType::Admin));
}

#[tokio::test]
async fn slow_profile_store_times_out_to_empty_role() {
    let config = RbacConfig {
        role_load_timeout: Duration::from_millis(50),
        ..RbacConfig::default()
    };
    let h = harness_with(InMemoryProfileStore::arc(), config);
    let id = UserId::new();
    h.profiles.insert(admin_profile(id));
    h.profiles.set_delay(Duration::from_millis(500));

    let init = h.service.establish_session(id).await;
    assert!(matches!(init, SessionInit::Failed(LoadError::TimedOut(_))));
    assert!(!h.service.permission_checker().is_admin());
}

#[tokio::test]
async fn slow_permission_store_degrades_but_keeps_coarse_role() {
    let config = RbacConfig {
        permission_load_timeout: Duration::from_millis(20),
        ..RbacConfig::default()
    };
    let h = harness_with(InMemoryProfileStore::arc(), config);
    let id = UserId::new();
    h.profiles.insert(admin_profile(id));
    h.permissions.set_delay(Duration::from_millis(300));

    let init = h.service.establish_session(id).await;
    assert!(matches!(init, SessionInit::Degraded));

    let checker = h.service.permission_checker();
    assert!(checker.is_admin());
    assert!(!checker.can_manage_users());
    assert!(!checker.can_view_analytics());
}

#[tokio::test]
async fn legacy_schema_defaults_status_columns() {
    let profiles = Arc::new(InMemoryProfileStore::with_schema(ProfileSchema::Legacy));
    let h = harness_with(profiles, RbacConfig::default());
    let id = UserId::new();
    let mut row = teacher_profile(id);
    row.is_active = Some(false);
    row.is_suspended = Some(true);
    h.profiles.insert(row);

    let role = h.service.load_user_role(id).await.unwrap();
    assert!(role.is_active);
    assert!(!role.is_suspended);
}

// ─────────────────────────────────────────────────────────────────────────────
// Admin mutation gate
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn non_admin_update_is_rejected_without_writing() {
    let h = harness();
    let teacher = UserId::new();
    let target = UserId::new();
    h.profiles.insert(teacher_profile(teacher));
    h.profiles.insert(UserProfile::provisioned(target));
    h.service.establish_session(teacher).await;

    let update = ProfileUpdate::for_role(Role::Admin, RoleLevel(10));
    let result = h.service.update_user_role(target, update).await;

    assert!(matches!(result, Err(SessionError::Unauthorized(RoleType::Admin))));
    assert_eq!(h.profiles.writes(), 0);
    assert_eq!(h.profiles.get(target).unwrap().is_admin, Some(false));
}

#[tokio::test]
async fn update_without_session_is_rejected_without_writing() {
    let h = harness();
    let target = UserId::new();
    h.profiles.insert(UserProfile::provisioned(target));

    let update = ProfileUpdate::for_role(Role::Teacher, RoleLevel(6));
    assert!(h.service.update_user_role(target, update).await.is_err());
    assert_eq!(h.profiles.writes(), 0);
}

#[tokio::test]
async fn admin_updates_another_user_without_touching_own_session() {
    let h = harness();
    let admin = UserId::new();
    let target = UserId::new();
    h.profiles.insert(admin_profile(admin));
    h.profiles.insert(UserProfile::provisioned(target));
    h.service.establish_session(admin).await;

    let update = ProfileUpdate::for_role(Role::Teacher, RoleLevel(6));
    h.service.update_user_role(target, update).await.unwrap();

    let row = h.profiles.get(target).unwrap();
    assert_eq!(row.is_teacher, Some(true));
    assert_eq!(row.role_level, Some(6));
    assert_eq!(h.service.cache().current_user(), Some(admin));
    assert!(h.service.permission_checker().is_admin());
}

#[tokio::test]
async fn admin_update_on_legacy_schema_drops_status_columns() {
    let profiles = Arc::new(InMemoryProfileStore::with_schema(ProfileSchema::Legacy));
    let h = harness_with(profiles, RbacConfig::default());
    let admin = UserId::new();
    let target = UserId::new();
    h.profiles.insert(admin_profile(admin));
    h.profiles.insert(UserProfile::legacy(target, None));
    h.service.establish_session(admin).await;

    let update = ProfileUpdate::for_role(Role::Teacher, RoleLevel(6)).with_status(true, false);
    h.service.update_user_role(target, update).await.unwrap();
    assert_eq!(h.profiles.get(target).unwrap().is_teacher, Some(true));
}

#[tokio::test]
async fn admin_demoting_self_refreshes_cache() {
    let h = harness();
    let admin = UserId::new();
    h.profiles.insert(admin_profile(admin));
    h.service.establish_session(admin).await;

    let update = ProfileUpdate::for_role(Role::Teacher, RoleLevel(6));
    h.service.update_user_role(admin, update).await.unwrap();

    let checker = h.service.permission_checker();
    assert!(!checker.is_admin());
    assert!(checker.is_teacher());
    assert!(!checker.can_manage_users());
}

#[tokio::test]
async fn failed_reload_after_self_demotion_drops_cached_role() {
    let h = harness();
    let admin = UserId::new();
    h.profiles.insert(admin_profile(admin));
    h.service.establish_session(admin).await;

    // The write succeeds but the follow-up role read fails.
    h.profiles.set_failing_reads(true);
    let update = ProfileUpdate::for_role(Role::Teacher, RoleLevel(6));
    h.service.update_user_role(admin, update).await.unwrap();

    assert_eq!(h.profiles.get(admin).unwrap().is_admin, Some(false));
    assert!(h.service.cache().role().is_none());
    assert!(!h.service.permission_checker().is_admin());
    assert!(!h.service.permission_checker().can_manage_users());
}

#[tokio::test]
async fn one_sided_flag_update_is_rejected_without_writing() {
    let h = harness();
    let admin = UserId::new();
    let target = UserId::new();
    h.profiles.insert(admin_profile(admin));
    h.profiles.insert(admin_profile(target));
    h.service.establish_session(admin).await;

    let teacher_only = ProfileUpdate {
        is_teacher: Some(true),
        ..Default::default()
    };
    let result = h.service.update_user_role(target, teacher_only).await;

    assert!(matches!(
        result,
        Err(SessionError::Domain(DomainError::InvariantViolation(_)))
    ));
    assert_eq!(h.profiles.writes(), 0);
    let row = h.profiles.get(target).unwrap();
    assert_eq!(row.is_admin, Some(true));
    assert_eq!(row.is_teacher, Some(false));

    let swap = ProfileUpdate {
        is_admin: Some(false),
        is_teacher: Some(true),
        ..Default::default()
    };
    h.service.update_user_role(target, swap).await.unwrap();
    let row = h.profiles.get(target).unwrap();
    assert_eq!(row.role_fields().resolve().role, Role::Teacher);
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn occupation_migration_examples() {
    let h = harness();
    let cases = [
        ("School Admin", Some(true), Some(false), Some(9)),
        ("Math Teacher", Some(false), Some(true), Some(6)),
        ("Student", Some(false), Some(true), Some(6)),
    ];

    for (occupation, is_admin, is_teacher, level) in cases {
        let id = UserId::new();
        h.profiles.insert(UserProfile::legacy(id, Some(occupation)));
        h.service.migrate_user_role(id, Some(occupation)).await.unwrap();

        let row = h.profiles.get(id).unwrap();
        assert_eq!(row.is_admin, is_admin, "{occupation}");
        assert_eq!(row.is_teacher, is_teacher, "{occupation}");
        assert_eq!(row.role_level, level, "{occupation}");
    }
}

#[tokio::test]
async fn migration_without_occupation_writes_defaults() {
    let h = harness();
    let id = UserId::new();
    h.profiles.insert(UserProfile::legacy(id, None));

    h.service.migrate_user_role(id, None).await.unwrap();

    let row = h.profiles.get(id).unwrap();
    assert_eq!(row.is_admin, Some(false));
    assert_eq!(row.is_teacher, Some(false));
    assert_eq!(row.role_level, Some(1));
    assert_eq!(row.is_active, Some(true));
    assert_eq!(row.is_suspended, Some(false));
}

#[tokio::test]
async fn unrecognized_occupation_policy_is_configurable() {
    let config = RbacConfig::from_lookup(|var| {
        (var == "EDUGATE_UNRECOGNIZED_OCCUPATION").then(|| "unprivileged".to_string())
    })
    .unwrap();
    let h = harness_with(InMemoryProfileStore::arc(), config);
    let id = UserId::new();
    h.profiles.insert(UserProfile::legacy(id, Some("Student")));

    h.service.migrate_user_role(id, Some("Student")).await.unwrap();

    let row = h.profiles.get(id).unwrap();
    assert_eq!(row.is_teacher, Some(false));
    assert_eq!(row.role_level, Some(1));
}

#[tokio::test]
async fn migrating_missing_profile_fails() {
    let h = harness();
    let result = h.service.migrate_user_role(UserId::new(), Some("Teacher")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn check_and_migrate_is_idempotent() {
    let h = harness();
    let id = UserId::new();
    h.profiles.insert(UserProfile::legacy(id, None));

    assert_eq!(h.service.check_and_migrate_user(id).await.unwrap(), MigrationOutcome::Migrated);
    assert_eq!(h.migrations.invocations(), 1);
    let writes = h.profiles.writes();

    assert_eq!(
        h.service.check_and_migrate_user(id).await.unwrap(),
        MigrationOutcome::AlreadyMigrated
    );
    assert_eq!(h.migrations.invocations(), 1);
    assert_eq!(h.profiles.writes(), writes);
}

#[tokio::test]
async fn check_and_migrate_skips_already_migrated_profile() {
    let h = harness();
    let id = UserId::new();
    let mut row = UserProfile::legacy(id, None);
    row.role_level = Some(3);
    h.profiles.insert(row);

    for _ in 0..2 {
        assert!(h.service.check_and_migrate_user(id).await.is_ok());
    }
    assert_eq!(h.migrations.invocations(), 0);
    assert_eq!(h.profiles.writes(), 0);
}

#[tokio::test]
async fn check_and_migrate_missing_profile_fails() {
    let h = harness();
    let result = h.service.check_and_migrate_user(UserId::new()).await;
    assert!(matches!(result, Err(SessionError::ProfileMissing(_))));
}

// ─────────────────────────────────────────────────────────────────────────────
// Atomicity
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_mixed_role_state() {
    let h = harness();
    let admin = UserId::new();
    h.profiles.insert(admin_profile(admin));
    h.service.establish_session(admin).await;

    let cache = Arc::clone(h.service.cache());
    let done = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..4 {
        let cache = Arc::clone(&cache);
        let done = Arc::clone(&done);
        readers.push(tokio::task::spawn_blocking(move || {
            while !done.load(Ordering::SeqCst) {
                let Some(role) = cache.role() else { continue };
                match role.role {
                    Role::Admin => {
                        assert_eq!(role.level, RoleLevel(9));
                        assert!(role.permissions.allows(Permission::USERS_MANAGE));
                    }
                    Role::Teacher => {
                        assert_eq!(role.level, RoleLevel(6));
                        assert!(!role.permissions.allows(Permission::USERS_MANAGE));
                        assert!(role.permissions.allows(Permission::COURSES_EDIT));
                    }
                    Role::Unprivileged => panic!("unexpected unprivileged role"),
                }
            }
        }));
    }

    let update = ProfileUpdate::for_role(Role::Teacher, RoleLevel(6));
    h.service.update_user_role(admin, update).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(cache.role().unwrap().role, Role::Teacher);
}
