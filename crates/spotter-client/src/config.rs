//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so a session can start with zero
//! configuration against the per-user database.

use std::path::PathBuf;
use std::time::Duration;

use spotter_shared::constants::DEFAULT_SUBSCRIPTION_BUFFER;

use crate::matching::MatchStrategy;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Database file to open instead of the per-user data directory.
    /// Env: `SPOTTER_DB_PATH`
    /// Default: none (use the platform data directory).
    pub database_path: Option<PathBuf>,

    /// How a detected mutual like becomes a match document.
    /// Env: `SPOTTER_MATCH_STRATEGY` (`deterministic` / `query`)
    /// Default: `deterministic`
    pub match_strategy: MatchStrategy,

    /// Re-fetch live queries on this interval as well, to see writes made
    /// by other processes sharing the database file.
    /// Env: `SPOTTER_POLL_MS` (0 disables)
    /// Default: disabled.
    pub poll_interval: Option<Duration>,

    /// Whether the match notifier announces matches that already existed
    /// when it started.
    /// Env: `SPOTTER_ANNOUNCE_EXISTING` (true/false)
    /// Default: `false`
    pub announce_existing_matches: bool,

    /// Snapshots buffered per live subscription.
    /// Env: `SPOTTER_SUBSCRIPTION_BUFFER`
    /// Default: [`DEFAULT_SUBSCRIPTION_BUFFER`]
    pub subscription_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            match_strategy: MatchStrategy::default(),
            poll_interval: None,
            announce_existing_matches: false,
            subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("SPOTTER_DB_PATH") {
            if !path.trim().is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = lookup("SPOTTER_MATCH_STRATEGY") {
            match val.parse::<MatchStrategy>() {
                Ok(strategy) => config.match_strategy = strategy,
                Err(e) => {
                    tracing::warn!(value = %val, error = %e, "Invalid SPOTTER_MATCH_STRATEGY, using default");
                }
            }
        }

        if let Some(val) = lookup("SPOTTER_POLL_MS") {
            match val.trim().parse::<u64>() {
                Ok(0) => config.poll_interval = None,
                Ok(ms) => config.poll_interval = Some(Duration::from_millis(ms)),
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid SPOTTER_POLL_MS, polling disabled");
                }
            }
        }

        if let Some(val) = lookup("SPOTTER_ANNOUNCE_EXISTING") {
            config.announce_existing_matches = val != "false" && val != "0";
        }

        if let Some(val) = lookup("SPOTTER_SUBSCRIPTION_BUFFER") {
            match val.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.subscription_buffer = n,
                _ => {
                    tracing::warn!(value = %val, "Invalid SPOTTER_SUBSCRIPTION_BUFFER, using default");
                }
            }
        }

        config
    }
}
