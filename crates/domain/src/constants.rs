//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Upstream endpoints
pub const DEFAULT_API_BASE_URL: &str = "https://manage.office.com";
pub const DEFAULT_LOGIN_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_REPORTING_URL: &str =
    "https://reports.office365.com/ecp/reportingwebservice/reporting.svc";
pub const DEFAULT_REPORTING_SCOPE: &str = "https://outlook.office365.com/.default";

// Feed configuration defaults
pub const DEFAULT_EVENT_TYPES: [&str; 5] = [
    "Audit.AzureActiveDirectory",
    "Audit.Exchange",
    "Audit.SharePoint",
    "Audit.General",
    "DLP.All",
];
pub const DEFAULT_IGNORED_SOURCES: [&str; 1] = ["Cloud App Security"];

// Checkpointing
pub const DEFAULT_CHECKPOINT_KEY: &str = "last_successful_fetch_on";
pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

// Credential lifecycle
pub const CREDENTIAL_REFRESH_THRESHOLD_SECS: i64 = 300;

// Wire format for window bounds: no sub-second precision, no zone suffix
pub const API_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
