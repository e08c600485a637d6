//! Client configuration.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::lifecycle::{DEFAULT_MAX_CODE_ATTEMPTS, MoveCommit, RoomManager};
use crate::store::{DEFAULT_MAX_ATTEMPTS, FirebaseBackend, RoomStore};

/// Environment variable overriding `database_url`.
pub const DATABASE_URL_ENV: &str = "TICTACTOE_DATABASE_URL";
/// Environment variable overriding `auth_token`.
pub const AUTH_TOKEN_ENV: &str = "TICTACTOE_AUTH_TOKEN";

/// Settings for reaching the room store and pacing the client.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct RoomsConfig {
    /// Realtime database root URL.
    #[serde(default)]
    database_url: String,

    /// Database secret or ID token, sent as `?auth=`.
    #[serde(default)]
    auth_token: Option<String>,

    /// Path under which room documents live.
    #[serde(default = "default_collection")]
    collection: String,

    /// Delay between polls of the joined room.
    #[serde(default = "default_sync_interval_ms")]
    sync_interval_ms: u64,

    /// Optimistic transaction attempts before giving up.
    #[serde(default = "default_max_transaction_attempts")]
    max_transaction_attempts: u32,

    /// Fresh codes tried when hosting.
    #[serde(default = "default_max_code_attempts")]
    max_code_attempts: u32,

    /// How moves are written back.
    #[serde(default)]
    move_commit: MoveCommit,

    /// Per-request timeout for store calls.
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
}

fn default_collection() -> String {
    "rooms".to_string()
}

fn default_sync_interval_ms() -> u64 {
    200
}

fn default_max_transaction_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_max_code_attempts() -> u32 {
    DEFAULT_MAX_CODE_ATTEMPTS
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            auth_token: None,
            collection: default_collection(),
            sync_interval_ms: default_sync_interval_ms(),
            max_transaction_attempts: default_max_transaction_attempts(),
            max_code_attempts: default_max_code_attempts(),
            move_commit: MoveCommit::default(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl RoomsConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(collection = %config.collection, move_commit = %config.move_commit, "Config loaded successfully");
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise defaults, then applies
    /// environment overrides.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = if path.as_ref().exists() {
            Self::from_file(path)?
        } else {
            info!("No config file, using defaults");
            Self::default()
        };
        Ok(config.with_overrides(
            std::env::var(DATABASE_URL_ENV).ok(),
            std::env::var(AUTH_TOKEN_ENV).ok(),
        ))
    }

    /// Replaces the store location and credentials where given.
    pub fn with_overrides(mut self, database_url: Option<String>, auth_token: Option<String>) -> Self {
        if let Some(url) = database_url.filter(|u| !u.is_empty()) {
            debug!("Database URL overridden");
            self.database_url = url;
        }
        if let Some(token) = auth_token.filter(|t| !t.is_empty()) {
            debug!("Auth token overridden");
            self.auth_token = Some(token);
        }
        self
    }

    /// Poll interval as a duration.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// Builds a store over the realtime database.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub fn open_store(&self) -> Result<RoomStore, ConfigError> {
        if self.database_url.is_empty() {
            warn!("No database URL configured");
            return Err(ConfigError::new(format!(
                "database_url is not set (config file or {})",
                DATABASE_URL_ENV
            )));
        }
        let backend = FirebaseBackend::new(
            &self.database_url,
            &self.collection,
            self.auth_token.clone(),
            Duration::from_millis(self.request_timeout_ms),
        )
        .map_err(|e| ConfigError::new(format!("Failed to build store client: {}", e)))?;
        Ok(RoomStore::new(Arc::new(backend), self.max_transaction_attempts))
    }

    /// Builds a lifecycle manager over `store` with these settings.
    pub fn manager(&self, store: RoomStore) -> RoomManager {
        RoomManager::new(store, self.move_commit, self.max_code_attempts)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_gets_defaults() {
        let config: RoomsConfig = toml::from_str(
            r#"
            database_url = "https://example.firebasedatabase.app"
            move_commit = "transaction"
            "#,
        )
        .unwrap();
        assert_eq!(config.collection(), "rooms");
        assert_eq!(*config.sync_interval_ms(), 200);
        assert_eq!(*config.max_transaction_attempts(), 25);
        assert_eq!(*config.move_commit(), MoveCommit::Transaction);
        assert!(config.auth_token().is_none());
    }

    #[test]
    fn test_overrides_ignore_empty_values() {
        let config = RoomsConfig::default()
            .with_overrides(Some("https://db.example".into()), Some(String::new()));
        assert_eq!(config.database_url(), "https://db.example");
        assert!(config.auth_token().is_none());
    }

    #[test]
    fn test_open_store_requires_url() {
        let err = RoomsConfig::default().open_store().unwrap_err();
        assert!(err.message.contains("database_url"));
    }
}
