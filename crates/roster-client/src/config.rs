//! Registry configuration loaded from environment variables.
//!
//! Every setting has a default so the registry can start with zero
//! configuration.

use std::path::PathBuf;
use std::time::Duration;

use roster_shared::constants::{
    DEFAULT_EVENT_CAPACITY, ENRICHMENT_TIMEOUT_MS, RECENT_CONVERSATION_MAX,
};

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RosterConfig {
    /// SQLite database file.
    /// Env: `ROSTER_DB_PATH`
    /// Default: `None`, meaning the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Maximum number of recent conversations in the unfiltered directory.
    /// Env: `ROSTER_RECENT_LIMIT`
    /// Default: `25`
    pub recent_limit: usize,

    /// Upper bound for the name lookup done when a phone recipient is
    /// first created.
    /// Env: `ROSTER_ENRICHMENT_TIMEOUT_MS`
    /// Default: `2000`
    pub enrichment_timeout: Duration,

    /// Capacity of the invalidation channel. Slow subscribers that fall
    /// further behind than this miss notifications.
    /// Env: `ROSTER_EVENT_CAPACITY`
    /// Default: `256`
    pub event_capacity: usize,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            recent_limit: RECENT_CONVERSATION_MAX,
            enrichment_timeout: Duration::from_millis(ENRICHMENT_TIMEOUT_MS),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl RosterConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("ROSTER_DB_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = lookup("ROSTER_RECENT_LIMIT") {
            match val.parse::<usize>() {
                Ok(n) => config.recent_limit = n,
                Err(_) => tracing::warn!(value = %val, "Invalid ROSTER_RECENT_LIMIT, using default"),
            }
        }

        if let Some(val) = lookup("ROSTER_ENRICHMENT_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.enrichment_timeout = Duration::from_millis(ms),
                Err(_) => tracing::warn!(
                    value = %val,
                    "Invalid ROSTER_ENRICHMENT_TIMEOUT_MS, using default"
                ),
            }
        }

        if let Some(val) = lookup("ROSTER_EVENT_CAPACITY") {
            match val.parse::<usize>() {
                // broadcast::channel panics on zero capacity
                Ok(n) if n > 0 => config.event_capacity = n,
                _ => tracing::warn!(value = %val, "Invalid ROSTER_EVENT_CAPACITY, using default"),
            }
        }

        config
    }
}
