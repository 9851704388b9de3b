//! Configuration loading and representation.
//!
//! Read from the process environment:
//!
//! | Variable | Default |
//! |---|---|
//! | `DATABASE_URL` | none (required for the Postgres stores) |
//! | `EDUGATE_ROLE_LOAD_TIMEOUT_MS` | `5000` |
//! | `EDUGATE_PERMISSION_LOAD_TIMEOUT_MS` | `3000` |
//! | `EDUGATE_UNRECOGNIZED_OCCUPATION` | `teacher` |

use std::time::Duration;

use thiserror::Error;

use edugate_auth::{UnknownOccupationPolicy, UnrecognizedOccupationPolicy};

pub const DEFAULT_ROLE_LOAD_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_PERMISSION_LOAD_TIMEOUT: Duration = Duration::from_millis(3_000);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} must be a positive number of milliseconds, got '{value}'")]
    InvalidDuration { var: &'static str, value: String },

    #[error("EDUGATE_UNRECOGNIZED_OCCUPATION: {0}")]
    InvalidPolicy(#[from] UnknownOccupationPolicy),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbacConfig {
    pub database_url: Option<String>,
    /// Upper bound on a profile/role load during session setup.
    pub role_load_timeout: Duration,
    /// Upper bound on the permission-tree fetch inside a role load.
    pub permission_load_timeout: Duration,
    pub occupation_policy: UnrecognizedOccupationPolicy,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            role_load_timeout: DEFAULT_ROLE_LOAD_TIMEOUT,
            permission_load_timeout: DEFAULT_PERMISSION_LOAD_TIMEOUT,
            occupation_policy: UnrecognizedOccupationPolicy::default(),
        }
    }
}

impl RbacConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        if let Some(value) = lookup("EDUGATE_ROLE_LOAD_TIMEOUT_MS") {
            config.role_load_timeout = parse_millis("EDUGATE_ROLE_LOAD_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("EDUGATE_PERMISSION_LOAD_TIMEOUT_MS") {
            config.permission_load_timeout =
                parse_millis("EDUGATE_PERMISSION_LOAD_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("EDUGATE_UNRECOGNIZED_OCCUPATION") {
            config.occupation_policy = value.parse()?;
        }

        Ok(config)
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}

fn parse_millis(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidDuration {
            var,
            value: value.to_string(),
        }),
    }
}
