//! Configuration loader
//!
//! Loads indexer configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `AUDITFLOW_CLIENT_ID`: App registration client id
//! - `AUDITFLOW_TENANT_ID`: Tenant id (also the publisher identifier)
//! - `AUDITFLOW_VAULT_NAME`: Vault holding the certificate bundle
//! - `AUDITFLOW_CERTIFICATE_NAME`: Secret name of the PEM bundle
//! - `AUDITFLOW_SCOPES`: Comma-separated scopes (default: `{api}/.default`)
//! - `AUDITFLOW_API_BASE_URL`: Management API base URL
//! - `AUDITFLOW_LOGIN_URL`: Login authority base URL
//! - `AUDITFLOW_PROXY_URI` / `AUDITFLOW_PROXY_TOKEN`: Optional forward proxy
//! - `AUDITFLOW_EVENT_TYPES`: Comma-separated event types
//! - `AUDITFLOW_IGNORED_SOURCES`: Comma-separated ignored sources
//! - `AUDITFLOW_INTERVAL_SECONDS`: Poll interval
//!
//! ## File Locations
//! The loader probes `./config.{json,toml}` and `./auditflow.{json,toml}`
//! in the working directory, two parent levels, and next to the
//! executable.

use std::path::{Path, PathBuf};

use auditflow_domain::{
    AuditFlowError, AuthConfig, FeedConfig, IndexerConfig, ProxyConfig, Result, ScheduleConfig,
    TraceConfig,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `AuditFlowError::Config` if configuration cannot be loaded from
/// either source.
pub fn load() -> Result<IndexerConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// The four identity variables are required; everything else falls back to
/// defaults matching the upstream service.
///
/// # Errors
/// Returns `AuditFlowError::Config` if required variables are missing.
pub fn load_from_env() -> Result<IndexerConfig> {
    let client_id = env_var("AUDITFLOW_CLIENT_ID")?;
    let tenant_id = env_var("AUDITFLOW_TENANT_ID")?;
    let vault_name = env_var("AUDITFLOW_VAULT_NAME")?;
    let certificate_name = env_var("AUDITFLOW_CERTIFICATE_NAME")?;

    let mut feed = FeedConfig::default();
    if let Ok(api_base_url) = std::env::var("AUDITFLOW_API_BASE_URL") {
        feed.api_base_url = api_base_url;
    }
    feed.event_types = env_list("AUDITFLOW_EVENT_TYPES", feed.event_types);
    feed.ignored_sources = env_list("AUDITFLOW_IGNORED_SOURCES", feed.ignored_sources);

    let mut auth = AuthConfig {
        client_id,
        tenant_id,
        vault_name,
        certificate_name,
        login_url: auditflow_domain::constants::DEFAULT_LOGIN_URL.to_string(),
        scopes: Vec::new(),
    };
    if let Ok(login_url) = std::env::var("AUDITFLOW_LOGIN_URL") {
        auth.login_url = login_url;
    }
    auth.scopes = env_list("AUDITFLOW_SCOPES", Vec::new());

    let mut trace = TraceConfig::default();
    if let Ok(reporting_url) = std::env::var("AUDITFLOW_REPORTING_URL") {
        trace.reporting_url = reporting_url;
    }
    if let Ok(scope) = std::env::var("AUDITFLOW_REPORTING_SCOPE") {
        trace.scope = scope;
    }

    let mut schedule = ScheduleConfig::default();
    if let Ok(interval) = std::env::var("AUDITFLOW_INTERVAL_SECONDS") {
        schedule.interval_seconds = interval.parse::<u64>().map_err(|e| {
            AuditFlowError::Config(format!("Invalid poll interval: {}", e))
        })?;
    }

    let proxy = std::env::var("AUDITFLOW_PROXY_URI").ok().map(|uri| ProxyConfig {
        uri,
        token: std::env::var("AUDITFLOW_PROXY_TOKEN").ok(),
    });

    Ok(IndexerConfig { auth, feed, trace, schedule, proxy })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `AuditFlowError::Config` if the file is missing, the format is
/// invalid, or required fields are absent.
pub fn load_from_file(path: Option<PathBuf>) -> Result<IndexerConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AuditFlowError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            AuditFlowError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| AuditFlowError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<IndexerConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| AuditFlowError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AuditFlowError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(AuditFlowError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("auditflow.json"),
            cwd.join("auditflow.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
            cwd.join("../../config.json"),
            cwd.join("../../config.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("auditflow.json"),
                exe_dir.join("auditflow.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        AuditFlowError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse a comma-separated list from an environment variable
///
/// Entries are trimmed and empties dropped; an unset variable or one that
/// yields no entries falls back to `default`.
fn env_list(key: &str, default: Vec<String>) -> Vec<String> {
    let parsed: Vec<String> = std::env::var(key)
        .ok()
        .map(|raw| {
            raw.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if parsed.is_empty() {
        default
    } else {
        parsed
    }
}
