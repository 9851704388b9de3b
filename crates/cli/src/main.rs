//! `edugate-rbac`: operator tool for user roles.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL`: Postgres connection string (or `--database-url`)
//! - `EDUGATE_ROLE_LOAD_TIMEOUT_MS`, `EDUGATE_PERMISSION_LOAD_TIMEOUT_MS`: load deadlines
//! - `EDUGATE_UNRECOGNIZED_OCCUPATION`: `teacher` or `unprivileged`
//! - `EDUGATE_LOG_FORMAT`: `json` or `pretty`; `RUST_LOG` sets the filter

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::PgPool;

use edugate_auth::{ProfileUpdate, Role, RoleLevel};
use edugate_core::UserId;
use edugate_infra::{
    PostgresMigrationProcedure, PostgresPermissionStore, PostgresProfileStore, RbacConfig,
    RoleService, SessionInit,
};

type PgRoleService =
    RoleService<PostgresProfileStore, PostgresPermissionStore, PostgresMigrationProcedure>;

/// Inspect and manage user roles.
#[derive(Parser, Debug)]
#[command(name = "edugate-rbac")]
#[command(version, about, long_about = None)]
struct Args {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a user's role and print every permission check as JSON.
    Inspect { user_id: UserId },

    /// Derive role columns from an occupation and write them.
    Migrate {
        user_id: UserId,
        /// Free-text occupation; omitted means provisioning defaults
        #[arg(long)]
        occupation: Option<String>,
    },

    /// Run the server-side migration if the profile has no role columns yet.
    CheckMigrate { user_id: UserId },

    /// Change another user's role, acting as an admin.
    SetRole {
        /// The admin performing the change
        #[arg(long = "as", value_name = "ADMIN_ID")]
        acting_admin: UserId,
        target: UserId,
        #[arg(long, value_enum)]
        role: RoleArg,
        #[arg(long)]
        level: Option<i32>,
        /// Suspend (or with `--active`, reactivate) the target
        #[arg(long, conflicts_with = "active")]
        suspend: bool,
        #[arg(long)]
        active: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Unprivileged,
    Teacher,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Unprivileged => Role::Unprivileged,
            RoleArg::Teacher => Role::Teacher,
            RoleArg::Admin => Role::Admin,
        }
    }
}

fn default_level(role: Role) -> RoleLevel {
    match role {
        Role::Unprivileged => RoleLevel::DEFAULT,
        Role::Teacher => RoleLevel::TEACHER_MIGRATED,
        Role::Admin => RoleLevel::ADMIN_MIGRATED,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    edugate_observability::init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = RbacConfig::from_env().context("invalid configuration")?;
    if args.database_url.is_some() {
        config.database_url = args.database_url;
    }

    let pool = PgPool::connect(config.require_database_url()?)
        .await
        .context("failed to connect to Postgres")?;
    let service: PgRoleService = RoleService::new(
        PostgresProfileStore::new(pool.clone()),
        PostgresPermissionStore::new(pool.clone()),
        PostgresMigrationProcedure::new(pool),
        &config,
    );

    match args.command {
        Command::Inspect { user_id } => inspect(&service, user_id).await,
        Command::Migrate { user_id, occupation } => {
            service.migrate_user_role(user_id, occupation.as_deref()).await?;
            println!("migrated {user_id}");
            Ok(())
        }
        Command::CheckMigrate { user_id } => {
            let outcome = service.check_and_migrate_user(user_id).await?;
            println!("{user_id}: {outcome:?}");
            Ok(())
        }
        Command::SetRole { acting_admin, target, role, level, suspend, active } => {
            if let SessionInit::Failed(e) = service.establish_session(acting_admin).await {
                bail!("could not load role for {acting_admin}: {e}");
            }

            let role = Role::from(role);
            let level = level.map(RoleLevel).unwrap_or_else(|| default_level(role));
            let mut update = ProfileUpdate::for_role(role, level);
            if suspend || active {
                update = update.with_status(!suspend, suspend);
            }

            service.update_user_role(target, update).await?;
            println!("updated {target} to {role} (level {})", level.value());
            Ok(())
        }
    }
}

async fn inspect(service: &PgRoleService, user_id: UserId) -> Result<()> {
    match service.establish_session(user_id).await {
        SessionInit::Loaded => {}
        SessionInit::Degraded => tracing::warn!(%user_id, "permission tree unavailable"),
        SessionInit::Failed(e) => bail!("could not load role for {user_id}: {e}"),
    }

    let summary = service.permission_checker().summary();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
