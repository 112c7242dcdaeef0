//! File-based configuration for processes hosting the queue.
//!
//! The configuration is a JSON document. Every field has a default, so an
//! empty object is valid as long as the database URL comes from
//! [`DATABASE_URL_ENV`].

use crate::queue::services::DEFAULT_ACTIVITY_RETENTION_DAYS;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use thiserror::Error;

/// Environment variable overriding [`CeQueueConfig::database_url`].
pub const DATABASE_URL_ENV: &str = "CE_QUEUE_DATABASE_URL";

const DEFAULT_POOL_SIZE: u32 = 4;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum CeQueueConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Offending path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid configuration document.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// `pool_size` is zero.
    #[error("pool_size must be at least 1")]
    InvalidPoolSize,

    /// `activity_retention_days` is zero.
    #[error("activity_retention_days must be at least 1")]
    InvalidRetention,

    /// Neither the file nor the environment provide a database URL.
    #[error("no database URL configured; set database_url or {DATABASE_URL_ENV}")]
    MissingDatabaseUrl,
}

/// Settings of a process hosting the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CeQueueConfig {
    /// `PostgreSQL` connection URL.
    pub database_url: Option<String>,
    /// Maximum number of pooled connections.
    pub pool_size: u32,
    /// Name recorded on activity rows archived by this process.
    pub node_name: Option<String>,
    /// Days of activity history kept by the cleaner.
    pub activity_retention_days: u32,
    /// Whether the engine starts right after an upgrade, which drops the
    /// queue.
    pub upgraded: bool,
    /// Workers known to be alive, used to release orphaned leases.
    pub known_worker_uuids: BTreeSet<String>,
}

impl Default for CeQueueConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            pool_size: DEFAULT_POOL_SIZE,
            node_name: None,
            activity_retention_days: DEFAULT_ACTIVITY_RETENTION_DAYS,
            upgraded: false,
            known_worker_uuids: BTreeSet::new(),
        }
    }
}

impl CeQueueConfig {
    /// Reads, overrides from the environment, and validates the file at
    /// `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueConfigError`] when the file cannot be read or parsed,
    /// or when validation fails.
    pub fn load(path: &Utf8Path) -> Result<Self, CeQueueConfigError> {
        let bytes = read_config_file(path).map_err(|source| CeQueueConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_json_slice(&bytes)
    }

    /// Parses a JSON document, applies environment overrides, and
    /// validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueConfigError`] when parsing or validation fails.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, CeQueueConfigError> {
        let config: Self = serde_json::from_slice(bytes)?;
        let overridden = config.with_env_overrides();
        overridden.validate()?;
        Ok(overridden)
    }

    /// Replaces the database URL with [`DATABASE_URL_ENV`] when set.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = env::var(DATABASE_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
        {
            self.database_url = Some(url);
        }
        self
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueConfigError::InvalidPoolSize`] or
    /// [`CeQueueConfigError::InvalidRetention`].
    pub const fn validate(&self) -> Result<(), CeQueueConfigError> {
        if self.pool_size == 0 {
            return Err(CeQueueConfigError::InvalidPoolSize);
        }
        if self.activity_retention_days == 0 {
            return Err(CeQueueConfigError::InvalidRetention);
        }
        Ok(())
    }

    /// Returns the configured database URL.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueConfigError::MissingDatabaseUrl`] when none is set.
    pub fn database_url(&self) -> Result<&str, CeQueueConfigError> {
        self.database_url
            .as_deref()
            .ok_or(CeQueueConfigError::MissingDatabaseUrl)
    }
}

fn read_config_file(path: &Utf8Path) -> std::io::Result<Vec<u8>> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "config path has no file name",
        )
    })?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.read(file_name)
}
