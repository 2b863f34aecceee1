//! Activity feed client
//!
//! Enumerates subscribed event types over a time window, following
//! pagination cursors, resolving each content reference exactly once, and
//! filtering events by source.

use std::sync::Arc;

use async_trait::async_trait;
use auditflow_core::ActivityFeedSource;
use auditflow_domain::{
    AuditEvent, AuditFlowError, ContentReference, IndexerConfig, Result, Subscription, TimeWindow,
};
use reqwest::header::HeaderMap;
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::auth::CredentialProvider;
use crate::http::TransportResponse;

/// Pagination cursor header candidates, checked in order; upstream API
/// revisions disagree on the name. Header lookup itself is
/// case-insensitive.
const NEXT_PAGE_HEADERS: [&str; 2] = ["NextPageUri", "NextPageUrl"];

/// Configuration for [`ActivityFeedClient`].
#[derive(Debug, Clone)]
pub struct ActivityFeedConfig {
    pub api_base_url: String,

    /// Tenant identifier used both in the feed path and as the
    /// `PublisherIdentifier` query parameter
    pub tenant_id: String,

    /// Event-type subscriptions to poll
    pub event_types: Vec<String>,

    /// Sources whose events are dropped from the batch
    pub ignored_sources: Vec<String>,
}

impl ActivityFeedConfig {
    /// Normalize caller-supplied lists: trim entries, drop empties,
    /// deduplicate event types while preserving first-seen order.
    pub fn new(
        api_base_url: impl Into<String>,
        tenant_id: impl Into<String>,
        event_types: Vec<String>,
        ignored_sources: Vec<String>,
    ) -> Self {
        let mut seen = Vec::new();
        for event_type in event_types {
            let trimmed = event_type.trim().to_string();
            if !trimmed.is_empty() && !seen.contains(&trimmed) {
                seen.push(trimmed);
            }
        }

        let ignored_sources = ignored_sources
            .into_iter()
            .map(|source| source.trim().to_string())
            .filter(|source| !source.is_empty())
            .collect();

        Self {
            api_base_url: api_base_url.into(),
            tenant_id: tenant_id.into(),
            event_types: seen,
            ignored_sources,
        }
    }

    pub fn from_config(config: &IndexerConfig) -> Self {
        Self::new(
            config.feed.api_base_url.clone(),
            config.auth.tenant_id.clone(),
            config.feed.event_types.clone(),
            config.feed.ignored_sources.clone(),
        )
    }
}

/// Activity feed client over the management API.
pub struct ActivityFeedClient {
    config: ActivityFeedConfig,
    provider: Arc<CredentialProvider>,
}

impl ActivityFeedClient {
    pub fn new(config: ActivityFeedConfig, provider: Arc<CredentialProvider>) -> Self {
        Self { config, provider }
    }

    /// Fetch every event for the window across all subscribed event types.
    ///
    /// Events are appended in discovery order: event type, then page, then
    /// content reference, then in-batch order. A failure on any listing
    /// page or content reference aborts the whole window fetch so a
    /// partial batch is never mistaken for a complete one.
    #[instrument(skip(self, cancel), fields(start = %window.api_start(), end = %window.api_end()))]
    pub async fn fetch_window(
        &self,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<AuditEvent>> {
        let mut events = Vec::new();

        for event_type in &self.config.event_types {
            if let Err(err) = self.fetch_event_type(event_type, window, cancel, &mut events).await
            {
                error!(event_type = %event_type, error = %err, "aborting window fetch");
                return Err(err);
            }
        }

        info!(count = events.len(), "window fetch complete");
        Ok(events)
    }

    async fn fetch_event_type(
        &self,
        event_type: &str,
        window: &TimeWindow,
        cancel: &CancellationToken,
        events: &mut Vec<AuditEvent>,
    ) -> Result<()> {
        let mut next_uri = Some(self.content_listing_url(event_type, window));
        let mut pages = 0usize;

        while let Some(listing_uri) = next_uri {
            let response = self.request(&listing_uri, cancel).await?;
            pages += 1;

            let references: Vec<ContentReference> = response.json().map_err(|err| {
                AuditFlowError::ResponseParseFailed { url: listing_uri.clone(), cause: err.to_string() }
            })?;

            next_uri = next_page_uri(&response.headers);

            debug!(event_type, page = pages, references = references.len(), "listing page received");

            for reference in references {
                let content = self.request(&reference.content_uri, cancel).await?;
                let batch: Vec<AuditEvent> = content.json().map_err(|err| {
                    AuditFlowError::ResponseParseFailed {
                        url: reference.content_uri.clone(),
                        cause: err.to_string(),
                    }
                })?;

                events.extend(batch.into_iter().filter(|event| !self.is_ignored(event)));
            }
        }

        Ok(())
    }

    /// List current upstream subscriptions.
    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let url = format!(
            "{}?PublisherIdentifier={}",
            self.activity_url("/subscriptions/list"),
            self.config.tenant_id
        );
        self.provider.request_json(Method::GET, &url, None).await
    }

    /// Start a subscription for every configured event type.
    ///
    /// Idempotent upstream: starting an already-started subscription
    /// returns its current state.
    pub async fn start_subscriptions(&self) -> Result<Vec<Subscription>> {
        let mut results = Vec::with_capacity(self.config.event_types.len());

        for event_type in &self.config.event_types {
            let url = format!(
                "{}?contentType={}&PublisherIdentifier={}",
                self.activity_url("/subscriptions/start"),
                event_type,
                self.config.tenant_id
            );
            let subscription = self.provider.request_json(Method::POST, &url, None).await?;
            results.push(subscription);
        }

        Ok(results)
    }

    async fn request(&self, url: &str, cancel: &CancellationToken) -> Result<TransportResponse> {
        tokio::select! {
            _ = cancel.cancelled() => Err(AuditFlowError::Cancelled),
            result = self.provider.authorized_request(Method::GET, url, None) => result,
        }
    }

    fn is_ignored(&self, event: &AuditEvent) -> bool {
        event
            .source()
            .is_some_and(|source| self.config.ignored_sources.iter().any(|s| s == source))
    }

    fn activity_url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/v1.0/{}/activity/feed{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.tenant_id,
            endpoint
        )
    }

    fn content_listing_url(&self, event_type: &str, window: &TimeWindow) -> String {
        format!(
            "{}?contentType={}&startTime={}&endTime={}&PublisherIdentifier={}",
            self.activity_url("/subscriptions/content"),
            event_type,
            window.api_start(),
            window.api_end(),
            self.config.tenant_id
        )
    }
}

#[async_trait]
impl ActivityFeedSource for ActivityFeedClient {
    async fn fetch_window(
        &self,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<AuditEvent>> {
        ActivityFeedClient::fetch_window(self, window, cancel).await
    }
}

/// Extract the next-page cursor from response headers: first candidate
/// name that is present and non-empty wins.
fn next_page_uri(headers: &HeaderMap) -> Option<String> {
    NEXT_PAGE_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    use super::*;

    fn sample_config() -> ActivityFeedConfig {
        ActivityFeedConfig::new(
            "https://manage.office.com",
            "tenant-1",
            vec!["Audit.Exchange".to_string()],
            vec!["Cloud App Security".to_string()],
        )
    }

    fn sample_window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_event_types_are_trimmed_and_deduplicated() {
        let config = ActivityFeedConfig::new(
            "https://manage.office.com",
            "tenant-1",
            vec![
                " Audit.Exchange ".to_string(),
                "Audit.Exchange".to_string(),
                String::new(),
                "Audit.General".to_string(),
            ],
            Vec::new(),
        );

        assert_eq!(config.event_types, vec!["Audit.Exchange", "Audit.General"]);
    }

    #[test]
    fn test_from_config_wires_feed_section() {
        let config: IndexerConfig = serde_json::from_str(
            r#"{
                "auth": {
                    "client_id": "c",
                    "tenant_id": "tenant-1",
                    "vault_name": "v",
                    "certificate_name": "cert"
                },
                "feed": {"event_types": ["Audit.Exchange", "Audit.Exchange"]}
            }"#,
        )
        .unwrap();

        let feed_config = ActivityFeedConfig::from_config(&config);
        assert_eq!(feed_config.tenant_id, "tenant-1");
        assert_eq!(feed_config.api_base_url, "https://manage.office.com");
        // Duplicates collapse during normalization
        assert_eq!(feed_config.event_types, vec!["Audit.Exchange"]);
        assert_eq!(feed_config.ignored_sources, vec!["Cloud App Security"]);
    }

    #[test]
    fn test_content_listing_url_carries_window_and_publisher() {
        let client = ActivityFeedClient {
            config: sample_config(),
            provider: test_provider(),
        };

        let url = client.content_listing_url("Audit.Exchange", &sample_window());
        assert_eq!(
            url,
            "https://manage.office.com/api/v1.0/tenant-1/activity/feed/subscriptions/content\
             ?contentType=Audit.Exchange&startTime=2024-01-01T00:00:00\
             &endTime=2024-01-01T00:05:00&PublisherIdentifier=tenant-1"
        );
    }

    #[test]
    fn test_next_page_uri_candidate_order() {
        let mut headers = HeaderMap::new();
        headers.insert("NextPageUri", HeaderValue::from_static("https://page/uri"));
        headers.insert("NextPageUrl", HeaderValue::from_static("https://page/url"));
        assert_eq!(next_page_uri(&headers).as_deref(), Some("https://page/uri"));

        let mut headers = HeaderMap::new();
        headers.insert("NextPageUrl", HeaderValue::from_static("https://page/url"));
        assert_eq!(next_page_uri(&headers).as_deref(), Some("https://page/url"));

        // Header lookup is case-insensitive
        let mut headers = HeaderMap::new();
        headers.insert("nextpageuri", HeaderValue::from_static("https://page/lower"));
        assert_eq!(next_page_uri(&headers).as_deref(), Some("https://page/lower"));

        assert_eq!(next_page_uri(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert("NextPageUri", HeaderValue::from_static(""));
        assert_eq!(next_page_uri(&headers), None);
    }

    #[test]
    fn test_ignored_source_filter() {
        let client = ActivityFeedClient {
            config: sample_config(),
            provider: test_provider(),
        };

        assert!(client.is_ignored(&AuditEvent(json!({"Source": "Cloud App Security"}))));
        assert!(!client.is_ignored(&AuditEvent(json!({"Source": "Exchange"}))));
        // Events without a source are kept; only the filter field is known
        assert!(!client.is_ignored(&AuditEvent(json!({"Operation": "Send"}))));
    }

    fn test_provider() -> Arc<CredentialProvider> {
        use async_trait::async_trait;
        use auditflow_core::SecretStore;
        use crate::auth::CredentialProviderConfig;
        use crate::http::Transport;

        struct NoSecrets;

        #[async_trait]
        impl SecretStore for NoSecrets {
            async fn get_secret(&self, name: &str) -> Result<String> {
                Err(AuditFlowError::SecretUnavailable(name.to_string()))
            }
        }

        Arc::new(CredentialProvider::new(
            CredentialProviderConfig::new(
                "client-1",
                "tenant-1",
                "http://login.invalid",
                "cert",
                Vec::new(),
            ),
            Arc::new(NoSecrets),
            Arc::new(Transport::new(None).expect("transport")),
        ))
    }
}
