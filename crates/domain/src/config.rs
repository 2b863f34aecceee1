//! Configuration structures
//!
//! Core-owned configuration for the indexer. Loading (environment variables
//! with file fallback) lives in the infra crate; these are the parsed
//! shapes.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_CHECKPOINT_KEY, DEFAULT_EVENT_TYPES, DEFAULT_IGNORED_SOURCES,
    DEFAULT_LOGIN_URL, DEFAULT_LOOKBACK_HOURS, DEFAULT_REPORTING_SCOPE, DEFAULT_REPORTING_URL,
};

/// Optional forward-proxy routing.
///
/// Absent ⇒ all requests go direct. The token, when set, authenticates to
/// the proxy itself and is distinct from the application bearer credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Certificate-based confidential-client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub client_id: String,
    pub tenant_id: String,

    /// Vault holding the certificate bundle
    pub vault_name: String,

    /// Secret name of the PEM bundle inside the vault
    pub certificate_name: String,

    /// Login authority base URL
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Requested scopes; defaults to `{api_base_url}/.default`
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Activity feed enumeration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Event-type subscriptions to poll
    #[serde(default = "default_event_types")]
    pub event_types: Vec<String>,

    /// Sources whose events are dropped from the batch
    #[serde(default = "default_ignored_sources")]
    pub ignored_sources: Vec<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            event_types: default_event_types(),
            ignored_sources: default_ignored_sources(),
        }
    }
}

/// Message-trace reporting endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    #[serde(default = "default_reporting_url")]
    pub reporting_url: String,

    #[serde(default = "default_reporting_scope")]
    pub scope: String,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self { reporting_url: default_reporting_url(), scope: default_reporting_scope() }
    }
}

/// Checkpoint-driven scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Poll interval in seconds
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Checkpoint key in the checkpoint store
    #[serde(default = "default_checkpoint_key")]
    pub checkpoint_key: String,

    /// Window start fallback when no checkpoint exists
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            checkpoint_key: default_checkpoint_key(),
            lookback_hours: default_lookback_hours(),
        }
    }
}

/// Top-level indexer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub auth: AuthConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub trace: TraceConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
}

impl IndexerConfig {
    /// Scopes to request, defaulting to the management API's `.default`
    /// scope when none are configured.
    #[must_use]
    pub fn effective_scopes(&self) -> Vec<String> {
        if self.auth.scopes.is_empty() {
            vec![format!("{}/.default", self.feed.api_base_url.trim_end_matches('/'))]
        } else {
            self.auth.scopes.clone()
        }
    }
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_event_types() -> Vec<String> {
    DEFAULT_EVENT_TYPES.iter().map(|s| (*s).to_string()).collect()
}

fn default_ignored_sources() -> Vec<String> {
    DEFAULT_IGNORED_SOURCES.iter().map(|s| (*s).to_string()).collect()
}

fn default_reporting_url() -> String {
    DEFAULT_REPORTING_URL.to_string()
}

fn default_reporting_scope() -> String {
    DEFAULT_REPORTING_SCOPE.to_string()
}

fn default_interval_seconds() -> u64 {
    300
}

fn default_checkpoint_key() -> String {
    DEFAULT_CHECKPOINT_KEY.to_string()
}

fn default_lookback_hours() -> i64 {
    DEFAULT_LOOKBACK_HOURS
}
