//! # Configuration Module
//!
//! Runtime settings for the kitchen binary, read from the environment after
//! loading an optional `.env` file.

use anyhow::{Context, Result};
use std::env;

// Defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Database connection settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection string
    pub url: String,
    /// Upper bound of the connection pool
    pub max_connections: u32,
}

/// Configuration structure for the kitchen binary
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    /// User the CLI acts as; `None` means signed out
    pub user_id: Option<String>,
    pub log_format: LogFormat,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            user_id: None,
            log_format: LogFormat::default(),
        }
    }
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read the configuration from the environment
    ///
    /// `DATABASE_URL` is required; `KITCHEN_USER_ID`, `DB_MAX_CONNECTIONS` and
    /// `LOG_FORMAT` are optional.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("DB_MAX_CONNECTIONS is not a number: {raw}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let user_id = lookup("KITCHEN_USER_ID")
            .map(|user| user.trim().to_string())
            .filter(|user| !user.is_empty());

        let log_format = lookup("LOG_FORMAT")
            .map(|value| LogFormat::parse(&value))
            .unwrap_or_default();

        Ok(Self {
            database: DatabaseConfig {
                url,
                max_connections,
            },
            user_id,
            log_format,
        })
    }
}
