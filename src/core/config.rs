//! Configuration for the council core and its server.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{CouncilError, CouncilResult};
use crate::council::roster::CouncilRoster;

/// Environment variable overriding the HTTP port.
pub const ENV_PORT: &str = "COUNCIL_PORT";
/// Environment variable enabling `SQLite` persistence at the given path.
pub const ENV_SQLITE_PATH: &str = "COUNCIL_SQLITE_PATH";
/// Environment variable toggling over-completion in progress tracking.
pub const ENV_ALLOW_OVER_COMPLETION: &str = "COUNCIL_ALLOW_OVER_COMPLETION";
/// Environment variable enabling debug logging.
pub const ENV_DEBUG: &str = "COUNCIL_DEBUG";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CouncilConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Persistence settings.
    pub storage: StorageConfig,
    /// Conversation store settings.
    pub store: StoreConfig,
    /// Progress tracking settings.
    pub progress: ProgressConfig,
    /// Council members and chairman.
    pub roster: CouncilRoster,
    /// Verbose logging.
    pub debug: bool,
}

impl CouncilConfig {
    /// Parse a JSON configuration document. Missing sections fall back to defaults.
    ///
    /// # Errors
    /// Returns an error if the document is malformed or fails validation.
    pub fn from_json_str(raw: &str) -> CouncilResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the default configuration and apply `COUNCIL_*` environment overrides.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed or the result is invalid.
    pub fn from_env() -> CouncilResult<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns an error if a value cannot be parsed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> CouncilResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port.trim().parse().map_err(|_| {
                CouncilError::InvalidConfig(format!("{ENV_PORT} must be a port number, got {port:?}"))
            })?;
        }

        if let Some(path) = lookup(ENV_SQLITE_PATH) {
            let path = path.trim();
            self.storage.sqlite_path = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }

        if let Some(flag) = lookup(ENV_ALLOW_OVER_COMPLETION) {
            self.progress.allow_over_completion = parse_flag(ENV_ALLOW_OVER_COMPLETION, &flag)?;
        }

        if let Some(flag) = lookup(ENV_DEBUG) {
            self.debug = parse_flag(ENV_DEBUG, &flag)?;
        }

        Ok(())
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> CouncilResult<()> {
        if self.server.port == 0 {
            return Err(CouncilError::InvalidConfig(
                "server.port must be > 0".to_string(),
            ));
        }

        if self.store.event_capacity == 0 {
            return Err(CouncilError::InvalidConfig(
                "store.event_capacity must be > 0".to_string(),
            ));
        }

        let table = &self.storage.table;
        if table.is_empty()
            || !table
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(CouncilError::InvalidConfig(format!(
                "storage.table must be a plain identifier, got {table:?}"
            )));
        }

        self.roster.validate()
    }
}

fn parse_flag(key: &str, raw: &str) -> CouncilResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CouncilError::InvalidConfig(format!(
            "{key} must be a boolean, got {other:?}"
        ))),
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8001 }
    }
}

/// Persistence settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` database path. `None` keeps conversations in memory only.
    pub sqlite_path: Option<PathBuf>,
    /// Conversation table name.
    pub table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: None,
            table: "conversations".to_string(),
        }
    }
}

/// Conversation store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Capacity of the change-notification channel. Slow subscribers lag past it.
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { event_capacity: 256 }
    }
}

/// Progress tracking settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Allow `completed` to exceed `total` (percentage may then exceed 100).
    pub allow_over_completion: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            allow_over_completion: true,
        }
    }
}
