//! Common data types used throughout the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::API_TIMESTAMP_FORMAT;
use crate::errors::{AuditFlowError, Result};

/// Half-open poll window `[start, end)` supplied by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a new window.
    ///
    /// # Errors
    /// Returns `AuditFlowError::InvalidInput` unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(AuditFlowError::InvalidInput(format!(
                "time window start {start} must precede end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Window start in the upstream wire format (`yyyy-MM-ddTHH:mm:ss`).
    ///
    /// Sub-second precision is dropped by truncation, not rounding.
    pub fn api_start(&self) -> String {
        format_api_timestamp(self.start)
    }

    /// Window end in the upstream wire format.
    pub fn api_end(&self) -> String {
        format_api_timestamp(self.end)
    }
}

/// Render a timestamp in the upstream wire format, truncating sub-second
/// precision and omitting the timezone suffix.
pub fn format_api_timestamp(at: DateTime<Utc>) -> String {
    at.format(API_TIMESTAMP_FORMAT).to_string()
}

/// A bearer credential issued for a fixed scope set.
///
/// Immutable once issued; the provider replaces the whole value on refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Access token for API authentication
    pub access_token: String,

    /// Token type (always "Bearer" for the client-credentials grant)
    pub token_type: String,

    /// Scopes this credential was issued for
    pub scopes: Vec<String>,

    /// Absolute expiration timestamp (UTC)
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create a new credential with an expiry calculated from `expires_in`.
    #[must_use]
    pub fn new(
        access_token: String,
        token_type: String,
        scopes: Vec<String>,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token,
            token_type,
            scopes,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
        }
    }

    /// Check whether the credential is expired or will expire within the
    /// given threshold (the safety margin forcing proactive refresh).
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        Utc::now() + chrono::Duration::seconds(threshold_seconds) >= self.expires_at
    }

    /// Value for the `Authorization` request header.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Upstream-provided pointer to a batch of events, resolved by a second
/// HTTP fetch. Resolved exactly once per fetch cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentReference {
    #[serde(rename = "contentUri")]
    pub content_uri: String,

    #[serde(rename = "contentType", default)]
    pub content_type: Option<String>,

    #[serde(rename = "contentId", default)]
    pub content_id: Option<String>,
}

/// One audit/trace record.
///
/// Opaque beyond the `Source` field used for filtering; passed through to
/// the sink unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditEvent(pub serde_json::Value);

impl AuditEvent {
    /// The record's `Source` field, when present and textual.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.0.get("Source").and_then(serde_json::Value::as_str)
    }
}

/// Per-event-type subscription status as reported by the upstream API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "contentType")]
    pub content_type: String,

    #[serde(default)]
    pub status: Option<String>,
}
