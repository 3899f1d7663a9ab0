//! Runtime configuration
//!
//! `ShelfConfig` carries the few knobs the store has: the page size used by
//! `read_many` when the caller gives no `limit`, the log level, and where the
//! file-backed store keeps its data. Values come from defaults, then the
//! environment, then whatever the host (or the CLI) overrides explicitly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logging::{self, LogLevel};

/// Page size applied by `read_many` when `limit` is omitted
pub const DEFAULT_LIMIT: usize = 10;

/// Collection keys must be strictly longer than this
pub const MIN_KEY_LEN: usize = 3;

pub const DATA_ENV_VAR: &str = "SHELFBASE_DATA";
pub const LIMIT_ENV_VAR: &str = "SHELFBASE_DEFAULT_LIMIT";

const DEFAULT_DATA_FILE: &str = "shelfbase.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShelfConfig {
    pub default_limit: usize,
    pub log_level: String,
    pub data_path: PathBuf,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        ShelfConfig {
            default_limit: DEFAULT_LIMIT,
            log_level: LogLevel::Warn.as_str().to_string(),
            data_path: PathBuf::from(DEFAULT_DATA_FILE),
        }
    }
}

impl ShelfConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `SHELFBASE_DATA`, `SHELFBASE_DEFAULT_LIMIT`
    /// and `SHELFBASE_LOG`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var(DATA_ENV_VAR) {
            if !path.trim().is_empty() {
                config.data_path = PathBuf::from(path);
            }
        }

        if let Some(limit) = std::env::var(LIMIT_ENV_VAR)
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
        {
            config.default_limit = limit;
        }

        if let Some(level) = std::env::var(logging::LOG_ENV_VAR)
            .ok()
            .and_then(|raw| LogLevel::parse(&raw))
        {
            config.log_level = level.as_str().to_string();
        }

        config
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level.as_str().to_string();
        self
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    /// Parsed log level, falling back to WARN
    pub fn level(&self) -> LogLevel {
        LogLevel::parse(&self.log_level).unwrap_or(LogLevel::Warn)
    }

    /// Push the configured log level into the global logger
    pub fn apply_logging(&self) {
        logging::set_log_level(self.level());
    }
}
