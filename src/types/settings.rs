use serde::{Deserialize, Serialize};

use super::change::SubscriptionScope;

/// Top-level synchronizer settings container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncSettings {
    /// Name of the remote collection holding bookmark rows.
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub subscription_scope: SubscriptionScope,
    /// Drop change events that explicitly belong to another owner instead of refetching.
    #[serde(default = "default_true")]
    pub filter_foreign_events: bool,
    #[serde(default)]
    pub fetch: FetchSettings,
    /// SQLite file backing the local store. `None` uses the platform data directory.
    #[serde(default)]
    pub database_path: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            subscription_scope: SubscriptionScope::default(),
            filter_foreign_events: true,
            fetch: FetchSettings::default(),
            database_path: None,
        }
    }
}

/// Retry policy for list fetches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchSettings {
    /// Total attempts per fetch, including the first one. Values below 1 act as 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_collection() -> String {
    "bookmarks".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}
