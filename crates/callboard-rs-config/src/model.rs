//! Configuration schema for Callboard.

use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Root config for the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CallboardConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl CallboardConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> CallboardConfigBuilder {
        CallboardConfigBuilder::new()
    }
}

/// Builder for assembling a `CallboardConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct CallboardConfigBuilder {
    config: CallboardConfig,
}

impl CallboardConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: CallboardConfig::default(),
        }
    }

    /// Replace the remote source configuration.
    pub fn source(mut self, source: SourceConfig) -> Self {
        self.config.source = source;
        self
    }

    /// Replace the sync configuration.
    pub fn sync(mut self, sync: SyncConfig) -> Self {
        self.config.sync = sync;
        self
    }

    /// Replace the dashboard configuration.
    pub fn dashboard(mut self, dashboard: DashboardConfig) -> Self {
        self.config.dashboard = dashboard;
        self
    }

    /// Finalize and return the built `CallboardConfig`.
    pub fn build(self) -> CallboardConfig {
        self.config
    }
}

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: Option<String>,
    /// Inline API key. Takes precedence over `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_db_schema")]
    pub schema: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_order_column")]
    pub order_column: String,
    /// Transport timeout for bulk reads. `None` waits indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Upper bound for connecting and joining the change subscription.
    #[serde(default = "default_subscribe_timeout_secs")]
    pub subscribe_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            api_key_env: default_api_key_env(),
            schema: default_db_schema(),
            table: default_table(),
            order_column: default_order_column(),
            request_timeout_secs: None,
            heartbeat_secs: default_heartbeat_secs(),
            subscribe_timeout_secs: default_subscribe_timeout_secs(),
        }
    }
}

impl SourceConfig {
    /// Resolve the API key from the inline value or the named env var.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = self.api_key.as_ref().filter(|key| !key.trim().is_empty()) {
            return Ok(key.clone());
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnv(self.api_key_env.clone()))
    }
}

fn default_api_key_env() -> String {
    "SUPABASE_ANON_KEY".to_string()
}

fn default_db_schema() -> String {
    "public".to_string()
}

fn default_table() -> String {
    "calls".to_string()
}

fn default_order_column() -> String {
    "created_at".to_string()
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_subscribe_timeout_secs() -> u64 {
    10
}

/// How change notifications are reconciled into the local store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Any change triggers a full refetch that replaces the store.
    #[default]
    Refetch,
    /// Changes are patched into the store by id.
    Incremental,
}

/// Sync controller settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    #[serde(default)]
    pub policy: ReconcilePolicy,
    /// Capacity of the controller's command queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            policy: ReconcilePolicy::default(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_queue_capacity() -> usize {
    64
}

/// Terminal dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardConfig {
    /// Route shown on startup (`home`, `meetings`, `leads`, `calls`).
    #[serde(default = "default_initial_route")]
    pub initial_route: String,
    /// Redraw tick in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            initial_route: default_initial_route(),
            tick_ms: default_tick_ms(),
        }
    }
}

fn default_initial_route() -> String {
    "home".to_string()
}

fn default_tick_ms() -> u64 {
    250
}
