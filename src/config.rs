//! Typed adapter configuration and environment-selected loading.
//!
//! ```json
//! {
//!   "env": "development",
//!   "database": { "name": "my_database", "path": "./data" },
//!   "operation_timeout_ms": 5000
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DatastoreError, DatastoreResult};

/// Environment variable selecting which configuration file to load.
pub const ENV_VAR: &str = "DATASTORE_ENV";

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_VAR: &str = "DATASTORE_CONFIG_DIR";

pub const DEFAULT_ENV: &str = "development";
pub const DEFAULT_CONFIG_DIR: &str = "config";
pub const DEFAULT_DATABASE: &str = "my_database";

/// Connection parameters for the logical database behind an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database opened by `connect` when the call does not name one.
    pub name: String,
    /// Directory holding `<database>.json` files. `None` keeps data in memory only.
    pub path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DATABASE.to_string(),
            path: None,
        }
    }
}

/// Adapter configuration. Built once, then shared immutably by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    pub env: String,
    pub database: DatabaseConfig,
    /// Deadline applied to every async operation.
    pub operation_timeout_ms: Option<u64>,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            env: DEFAULT_ENV.to_string(),
            database: DatabaseConfig::default(),
            operation_timeout_ms: None,
        }
    }
}

impl DatastoreConfig {
    /// Config for the given database name, everything else defaulted.
    pub fn for_database(name: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig {
                name: name.into(),
                path: None,
            },
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database.path = Some(path.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.operation_timeout_ms = Some(timeout_ms);
        self
    }

    /// Load the process-wide configuration.
    ///
    /// Reads `$DATASTORE_CONFIG_DIR/datastore.$DATASTORE_ENV.json`. A missing
    /// file yields the defaults for the selected environment.
    pub fn load() -> DatastoreResult<Self> {
        let env = std::env::var(ENV_VAR).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let dir = std::env::var(CONFIG_DIR_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
        Self::load_env(dir, &env)
    }

    /// Load `datastore.<env>.json` from `dir`, falling back to defaults if it is absent.
    pub fn load_env(dir: impl AsRef<Path>, env: &str) -> DatastoreResult<Self> {
        let path = Self::file_for(dir, env);
        if !path.exists() {
            tracing::debug!(path = %path.display(), env, "no configuration file, using defaults");
            return Ok(Self {
                env: env.to_string(),
                ..Self::default()
            });
        }

        let mut config = Self::from_path(&path)?;
        config.env = env.to_string();
        Ok(config)
    }

    /// Path of the configuration file for an environment.
    pub fn file_for(dir: impl AsRef<Path>, env: &str) -> PathBuf {
        dir.as_ref().join(format!("datastore.{}.json", env))
    }

    pub fn from_path(path: impl AsRef<Path>) -> DatastoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DatastoreError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> DatastoreResult<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| DatastoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DatastoreResult<()> {
        validate_database_name(&self.database.name)
            .map_err(|reason| DatastoreError::Config(format!("database.name: {}", reason)))?;
        if self.operation_timeout_ms == Some(0) {
            return Err(DatastoreError::Config(
                "operation_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Database names double as file stems, so they are restricted to a portable set.
pub(crate) fn validate_database_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("database name is empty".into());
    }
    if name.starts_with('.') {
        return Err(format!("database name {:?} starts with '.'", name));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(format!("database name {:?} contains {:?}", name, c));
    }
    Ok(())
}
