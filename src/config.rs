//! Store bootstrap configuration read from the environment.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file in the working directory. Every required key must be present and
//! non-empty before a connection is attempted.

use std::{env, path::PathBuf};

use log::trace;
use thiserror::Error;

pub const DATABASE_VAR: &str = "SHIPMENTS_DATABASE";
pub const SCHEMA_VAR: &str = "SHIPMENTS_DB_SCHEMA";
pub const TABLE_VAR: &str = "SHIPMENTS_DB_TABLE";
pub const REPORTS_DIR_VAR: &str = "SHIPMENTS_REPORTS_DIR";

pub const DEFAULT_REPORTS_DIR: &str = "Exports";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {key}")]
    Missing { key: &'static str },
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database: PathBuf,
    pub schema_name: String,
    pub table: String,
}

impl StoreConfig {
    /// Loads `.env` (when present) and reads the store settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the store settings through `lookup`, which maps a key to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &'static str| {
            trace!("Retrieving environment variable {key}");
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing { key })
        };
        let database = PathBuf::from(require(DATABASE_VAR)?);
        let schema_name = require(SCHEMA_VAR)?;
        let table = require(TABLE_VAR)?;
        ensure_identifier(SCHEMA_VAR, &schema_name)?;
        ensure_identifier(TABLE_VAR, &table)?;
        Ok(Self {
            database,
            schema_name,
            table,
        })
    }
}

/// Reports directory from the environment, falling back to `Exports`.
pub fn reports_dir_from_env() -> PathBuf {
    dotenv::dotenv().ok();
    env::var(REPORTS_DIR_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORTS_DIR))
}

fn ensure_identifier(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected letters, digits and underscores".to_string(),
        })
    }
}
