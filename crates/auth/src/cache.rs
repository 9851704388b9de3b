//! Session role cache.
//!
//! Holds at most one signed-in user's profile and role. Writers always build
//! a complete [`SessionState`] first and install it with a single pointer swap,
//! so readers see either the old state or the new one, never a mix.

use std::sync::{Arc, RwLock};

use edugate_core::UserId;

use crate::{PermissionCheck, RoleBooleanAlgebra, UserProfile, UserRole};

/// Everything cached for the signed-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user_id: UserId,
    pub profile: Option<UserProfile>,
    pub role: Option<Arc<UserRole>>,
}

impl SessionState {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            profile: None,
            role: None,
        }
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = Some(Arc::new(role));
        self
    }
}

/// Single-slot cache: `empty` or `loaded`.
#[derive(Debug, Default)]
pub struct SessionRoleCache {
    slot: RwLock<Option<Arc<SessionState>>>,
}

impl SessionRoleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// The current state. A poisoned lock reads as empty.
    pub fn snapshot(&self) -> Option<Arc<SessionState>> {
        match self.slot.read() {
            Ok(guard) => guard.clone(),
            Err(_) => {
                tracing::error!("session role cache lock poisoned; treating as empty");
                None
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_some()
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.snapshot().map(|s| s.user_id)
    }

    pub fn role(&self) -> Option<Arc<UserRole>> {
        self.snapshot().and_then(|s| s.role.clone())
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.snapshot().and_then(|s| s.profile.clone())
    }

    /// Install a new state wholesale (`empty → loaded`, `loaded → loaded`).
    pub fn replace(&self, state: SessionState) {
        let next = Some(Arc::new(state));
        match self.slot.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Derive the next state from the current one and install it.
    ///
    /// `f` receives the current state only if it belongs to `user_id`; a
    /// different user's state is discarded. The derivation runs under the
    /// write lock so concurrent updates cannot interleave.
    pub fn update_for<F>(&self, user_id: UserId, f: F)
    where
        F: FnOnce(SessionState) -> SessionState,
    {
        let mut guard = match self.slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let base = guard
            .as_deref()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .unwrap_or_else(|| SessionState::new(user_id));
        *guard = Some(Arc::new(f(base)));
    }

    /// `loaded → empty` (sign-out).
    pub fn clear(&self) {
        match self.slot.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    pub fn algebra(&self) -> RoleBooleanAlgebra {
        RoleBooleanAlgebra::new(self.role())
    }

    pub fn permission_checker(&self) -> PermissionCheck {
        PermissionCheck::new(self.algebra())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{Permission, PermissionTree, Role, RoleLevel, RoleType};

    fn role(user_id: UserId, role: Role, level: i32, tree: PermissionTree) -> UserRole {
        UserRole {
            user_id,
            role,
            level: RoleLevel(level),
            is_active: true,
            is_suspended: false,
            permissions: tree,
        }
    }

    #[test]
    fn starts_empty_and_denies() {
        let cache = SessionRoleCache::new();
        assert!(!cache.is_loaded());
        assert!(!cache.algebra().has_exact_role(RoleType::Admin));
        assert!(!cache.permission_checker().is_active());
    }

    #[test]
    fn load_then_clear() {
        let cache = SessionRoleCache::new();
        let id = UserId::new();
        let next = role(id, Role::Admin, 9, PermissionTree::empty());
        cache.replace(SessionState::new(id).with_role(next));
        assert_eq!(cache.current_user(), Some(id));
        assert!(cache.algebra().has_exact_role(RoleType::Admin));

        cache.clear();
        assert!(!cache.is_loaded());
        assert!(cache.role().is_none());
    }

    #[test]
    fn snapshots_outlive_replacement() {
        let cache = SessionRoleCache::new();
        let id = UserId::new();
        let next = role(id, Role::Teacher, 6, PermissionTree::empty());
        cache.replace(SessionState::new(id).with_role(next));
        let before = cache.permission_checker();

        let next = role(id, Role::Admin, 9, PermissionTree::empty());
        cache.replace(SessionState::new(id).with_role(next));

        assert!(before.is_teacher());
        assert!(cache.permission_checker().is_admin());
    }

    #[test]
    fn update_for_discards_other_users_state() {
        let cache = SessionRoleCache::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let next = role(alice, Role::Admin, 9, PermissionTree::empty());
        cache.replace(SessionState::new(alice).with_role(next));

        cache.update_for(bob, |s| s.with_profile(crate::UserProfile::provisioned(bob)));

        let state = cache.snapshot().unwrap();
        assert_eq!(state.user_id, bob);
        assert!(state.role.is_none());
        assert!(state.profile.is_some());
    }

    #[test]
    fn concurrent_readers_never_see_mixed_roles() {
        let cache = Arc::new(SessionRoleCache::new());
        let id = UserId::new();
        let old_tree = PermissionTree::empty().with(Permission::COURSES_VIEW);
        let old = role(id, Role::Teacher, 6, old_tree);
        let new = role(id, Role::Admin, 9, PermissionTree::empty().with(Permission::USERS_MANAGE));
        cache.replace(SessionState::new(id).with_role(old.clone()));

        let writer = {
            let cache = Arc::clone(&cache);
            let (old, new) = (old.clone(), new.clone());
            thread::spawn(move || {
                for i in 0..2_000 {
                    let next = if i % 2 == 0 { new.clone() } else { old.clone() };
                    cache.replace(SessionState::new(id).with_role(next));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let (old, new) = (old.clone(), new.clone());
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let seen = cache.role().expect("role stays loaded");
                        assert!(*seen == old || *seen == new, "observed a mixed role");
                        let consistent = match seen.role {
                            Role::Teacher => seen.permissions.allows(Permission::COURSES_VIEW),
                            Role::Admin => seen.permissions.allows(Permission::USERS_MANAGE),
                            Role::Unprivileged => false,
                        };
                        assert!(consistent);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
