//! Message-trace client
//!
//! Trace-style sources expose a single non-paginated report endpoint with
//! the window bounds embedded in an OData filter string; the batch comes
//! back under a `{d:{results:[...]}}` envelope.

use std::sync::Arc;

use async_trait::async_trait;
use auditflow_core::ActivityFeedSource;
use auditflow_domain::{AuditEvent, AuditFlowError, IndexerConfig, Result, TimeWindow};
use reqwest::Method;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::auth::CredentialProvider;

/// Configuration for [`MessageTraceClient`].
#[derive(Debug, Clone)]
pub struct MessageTraceConfig {
    pub reporting_url: String,
}

impl MessageTraceConfig {
    pub fn from_config(config: &IndexerConfig) -> Self {
        Self { reporting_url: config.trace.reporting_url.clone() }
    }
}

/// Message-trace report client.
pub struct MessageTraceClient {
    config: MessageTraceConfig,
    provider: Arc<CredentialProvider>,
}

#[derive(Debug, Deserialize)]
struct TraceEnvelope {
    #[serde(default)]
    d: Option<TraceResults>,
}

#[derive(Debug, Deserialize)]
struct TraceResults {
    #[serde(default)]
    results: Option<Vec<AuditEvent>>,
}

impl MessageTraceClient {
    pub fn new(config: MessageTraceConfig, provider: Arc<CredentialProvider>) -> Self {
        Self { config, provider }
    }

    /// Fetch every trace record in the window with one request.
    ///
    /// An absent or empty envelope means zero traces, not an error.
    #[instrument(skip(self, cancel), fields(start = %window.api_start(), end = %window.api_end()))]
    pub async fn fetch_window(
        &self,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<AuditEvent>> {
        let url = self.trace_url(window);

        let envelope: TraceEnvelope = tokio::select! {
            _ = cancel.cancelled() => return Err(AuditFlowError::Cancelled),
            result = self.provider.request_json(Method::GET, &url, None) => result?,
        };

        let traces = envelope.d.and_then(|d| d.results).unwrap_or_default();
        info!(count = traces.len(), "trace fetch complete");
        Ok(traces)
    }

    fn trace_url(&self, window: &TimeWindow) -> String {
        // Quoting matches the upstream OData contract exactly; the whole
        // filter travels as one percent-encoded query value.
        let filter = format!(
            "StartDate eq datetime'{}' and EndDate eq datetime'{}'",
            window.api_start(),
            window.api_end()
        );
        format!(
            "{}/MessageTrace?$format=Json&$filter={}",
            self.config.reporting_url.trim_end_matches('/'),
            urlencoding::encode(&filter)
        )
    }
}

#[async_trait]
impl ActivityFeedSource for MessageTraceClient {
    async fn fetch_window(
        &self,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<AuditEvent>> {
        MessageTraceClient::fetch_window(self, window, cancel).await
    }
}
