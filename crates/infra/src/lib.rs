//! Infrastructure layer: profile/permission storage, the role loader and the
//! session-scoped `RoleService`.

pub mod config;
pub mod loader;
pub mod session;
pub mod store;

pub use config::{ConfigError, RbacConfig};
pub use loader::{LoadError, LoadedRole, RoleLoader};
pub use session::{MigrationOutcome, RoleService, SessionError, SessionInit};
pub use store::{
    InMemoryMigrationProcedure, InMemoryPermissionStore, InMemoryProfileStore, MigrationProcedure,
    PermissionStore, PostgresMigrationProcedure, PostgresPermissionStore, PostgresProfileStore,
    ProfileSchema, ProfileStore, StoreError,
};
