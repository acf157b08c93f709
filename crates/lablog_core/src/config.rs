//! Store and logging configuration.
//!
//! # Responsibility
//! - Carry the knobs callers may set without touching store internals.
//! - Deserialize from partial documents, falling back to defaults.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// SQLite takes the busy timeout as a C `int` of milliseconds.
const MAX_BUSY_TIMEOUT_MS: u64 = i32::MAX as u64;

/// What deleting a still-referenced user does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Reject the delete while any reagent or process references the user.
    #[default]
    Restrict,
    /// Delete every reagent and process referencing the user, then the user.
    Cascade,
}

/// Settings applied by `SqliteLabStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub user_delete_policy: DeletePolicy,
    /// How long a write waits for the database lock before failing.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            user_delete_policy: DeletePolicy::Restrict,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    pub fn with_user_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.user_delete_policy = policy;
        self
    }

    /// Lock-wait bound, clamped to the largest value SQLite accepts.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms.min(MAX_BUSY_TIMEOUT_MS))
    }
}

/// Settings for `init_logging`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// One of `trace|debug|info|warn|error`, case-insensitive.
    #[serde(default = "default_level_string")]
    pub level: String,
    /// Absolute directory for rolling log files.
    pub log_dir: PathBuf,
}

impl LogSettings {
    /// Settings with the build-mode default level.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            level: default_level_string(),
            log_dir: log_dir.into(),
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

fn default_level_string() -> String {
    default_log_level().to_string()
}
