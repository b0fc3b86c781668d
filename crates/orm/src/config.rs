//! Repository and pool configuration
//!
//! Values default to conservative settings and can be overridden through
//! `AUTUMN_*` environment variables.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Behaviour of the query engine shared by every repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Largest accepted page size; `None` disables the check
    pub limit_max: Option<u64>,
    /// Page size applied when the context does not ask for one
    pub limit_default: Option<u64>,
    /// Skip malformed criteria instead of failing
    pub ignore_invalid_criteria: bool,
    /// Skip unknown or malformed sort requests instead of failing
    pub ignore_invalid_sorting: bool,
    /// Search with `MATCH ... AGAINST` instead of `LIKE` chains
    pub full_text_search: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            limit_max: Some(1000),
            limit_default: None,
            ignore_invalid_criteria: false,
            ignore_invalid_sorting: false,
            full_text_search: false,
        }
    }
}

impl RepositoryConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ModelResult<Self> {
        let mut config = Self::default();

        if let Ok(value) = env::var("AUTUMN_LIMIT_MAX") {
            config.limit_max = parse_optional("AUTUMN_LIMIT_MAX", &value)?;
        }
        if let Ok(value) = env::var("AUTUMN_LIMIT_DEFAULT") {
            config.limit_default = parse_optional("AUTUMN_LIMIT_DEFAULT", &value)?;
        }
        if let Ok(value) = env::var("AUTUMN_IGNORE_INVALID_CRITERIA") {
            config.ignore_invalid_criteria = parse_flag("AUTUMN_IGNORE_INVALID_CRITERIA", &value)?;
        }
        if let Ok(value) = env::var("AUTUMN_IGNORE_INVALID_SORTING") {
            config.ignore_invalid_sorting = parse_flag("AUTUMN_IGNORE_INVALID_SORTING", &value)?;
        }
        if let Ok(value) = env::var("AUTUMN_FULL_TEXT_SEARCH") {
            config.full_text_search = parse_flag("AUTUMN_FULL_TEXT_SEARCH", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ModelResult<()> {
        if let (Some(default), Some(max)) = (self.limit_default, self.limit_max) {
            if default > max {
                return Err(ModelError::Configuration(format!(
                    "limit_default ({}) exceeds limit_max ({})",
                    default, max
                )));
            }
        }
        if self.limit_max == Some(0) {
            return Err(ModelError::Configuration(
                "limit_max must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Connection pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
            idle_timeout: Some(600),  // 10 minutes
            max_lifetime: Some(1800), // 30 minutes
            test_before_acquire: true,
        }
    }
}

impl PoolConfig {
    /// Load pool settings from `DATABASE_*` environment variables
    pub fn from_env() -> ModelResult<Self> {
        let mut config = Self::default();

        if let Ok(value) = env::var("DATABASE_MAX_CONNECTIONS") {
            config.max_connections = parse_value("DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Ok(value) = env::var("DATABASE_MIN_CONNECTIONS") {
            config.min_connections = parse_value("DATABASE_MIN_CONNECTIONS", &value)?;
        }
        if let Ok(value) = env::var("DATABASE_ACQUIRE_TIMEOUT") {
            config.acquire_timeout = parse_value("DATABASE_ACQUIRE_TIMEOUT", &value)?;
        }

        if config.min_connections > config.max_connections {
            return Err(ModelError::Configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                config.min_connections, config.max_connections
            )));
        }
        Ok(config)
    }
}

fn parse_value<T: FromStr>(field: &str, value: &str) -> ModelResult<T> {
    value.trim().parse().map_err(|_| {
        ModelError::Configuration(format!("{} has invalid value '{}'", field, value))
    })
}

fn parse_optional(field: &str, value: &str) -> ModelResult<Option<u64>> {
    match value.trim() {
        "" | "none" | "off" => Ok(None),
        other => parse_value(field, other).map(Some),
    }
}

fn parse_flag(field: &str, value: &str) -> ModelResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ModelError::Configuration(format!(
            "{} expects a boolean, got '{}'",
            field, value
        ))),
    }
}
