//! Credential provider with near-expiry caching
//!
//! Owns the cached `Credential` and the `Certificate` it was derived from.
//! Constructed once per process; expiry is handled internally, so callers
//! never tear it down. At most one exchange is in flight per instance:
//! the cache lives behind an async mutex held across the exchange, so
//! concurrent callers queue on it and observe the fresh credential instead
//! of issuing their own.

use std::sync::Arc;

use auditflow_core::SecretStore;
use auditflow_domain::constants::CREDENTIAL_REFRESH_THRESHOLD_SECS;
use auditflow_domain::{AuditFlowError, Credential, IndexerConfig, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::certificate::Certificate;
use super::confidential::ConfidentialClient;
use crate::http::{Transport, TransportResponse};

/// Configuration for [`CredentialProvider`].
#[derive(Debug, Clone)]
pub struct CredentialProviderConfig {
    pub client_id: String,
    pub tenant_id: String,
    pub login_url: String,

    /// Secret name of the certificate bundle in the vault
    pub certificate_name: String,

    /// Scopes requested for every credential issued by this provider
    pub scopes: Vec<String>,

    /// Safety margin in seconds: refresh this long before actual expiry
    pub refresh_threshold_seconds: i64,
}

impl CredentialProviderConfig {
    pub fn new(
        client_id: impl Into<String>,
        tenant_id: impl Into<String>,
        login_url: impl Into<String>,
        certificate_name: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            tenant_id: tenant_id.into(),
            login_url: login_url.into(),
            certificate_name: certificate_name.into(),
            scopes,
            refresh_threshold_seconds: CREDENTIAL_REFRESH_THRESHOLD_SECS,
        }
    }

    /// Provider settings for the management-API feed.
    pub fn from_config(config: &IndexerConfig) -> Self {
        Self::new(
            config.auth.client_id.clone(),
            config.auth.tenant_id.clone(),
            config.auth.login_url.clone(),
            config.auth.certificate_name.clone(),
            config.effective_scopes(),
        )
    }

    /// Provider settings for the message-trace reporting endpoint, which
    /// requires its own scope set.
    pub fn for_tracing(config: &IndexerConfig) -> Self {
        Self::new(
            config.auth.client_id.clone(),
            config.auth.tenant_id.clone(),
            config.auth.login_url.clone(),
            config.auth.certificate_name.clone(),
            vec![config.trace.scope.clone()],
        )
    }
}

/// Certificate-backed credential provider with authorized request helpers.
pub struct CredentialProvider {
    config: CredentialProviderConfig,
    secrets: Arc<dyn SecretStore>,
    confidential: ConfidentialClient,
    transport: Arc<Transport>,
    cached: Mutex<Option<Credential>>,
}

impl CredentialProvider {
    /// Create a provider. The transport instance is shared: resource
    /// requests use it directly and the token exchange reaches it through
    /// the dispatcher adapter, so both travel the same proxy route.
    pub fn new(
        config: CredentialProviderConfig,
        secrets: Arc<dyn SecretStore>,
        transport: Arc<Transport>,
    ) -> Self {
        let confidential = ConfidentialClient::new(
            config.client_id.clone(),
            &config.login_url,
            &config.tenant_id,
            transport.clone(),
        );

        Self { config, secrets, confidential, transport, cached: Mutex::new(None) }
    }

    /// Get a valid credential, exchanging only when the cache is empty or
    /// inside the safety margin.
    pub async fn get_credential(&self) -> Result<Credential> {
        let mut cached = self.cached.lock().await;

        if let Some(credential) = cached.as_ref() {
            if !credential.is_expired(self.config.refresh_threshold_seconds) {
                debug!("serving cached credential");
                return Ok(credential.clone());
            }
            debug!("cached credential inside safety margin; refreshing");
        }

        // Drop the stale value before the exchange so a failure never
        // leaves a half-usable credential behind.
        *cached = None;

        let credential = self.exchange().await?;
        *cached = Some(credential.clone());

        info!(
            scopes = %credential.scopes.join(" "),
            expires_at = %credential.expires_at,
            "credential acquired"
        );
        Ok(credential)
    }

    async fn exchange(&self) -> Result<Credential> {
        let bundle = self.secrets.get_secret(&self.config.certificate_name).await?;
        if bundle.trim().is_empty() {
            return Err(AuditFlowError::SecretUnavailable(format!(
                "secret '{}' is empty",
                self.config.certificate_name
            )));
        }

        let certificate = Certificate::from_pem_bundle(&bundle)?;
        self.confidential.acquire_token(&certificate, &self.config.scopes).await
    }

    /// Issue an authenticated request.
    ///
    /// Attaches the bearer credential (and a JSON content type when a body
    /// is present) and fails with `UpstreamRequestFailed` on any
    /// non-success status.
    pub async fn authorized_request(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<TransportResponse> {
        let credential = self.get_credential().await?;

        let mut headers = HeaderMap::new();
        let authorization = HeaderValue::from_str(&credential.authorization_header())
            .map_err(|err| {
                AuditFlowError::AuthenticationFailed(format!("credential not header-safe: {err}"))
            })?;
        headers.insert(AUTHORIZATION, authorization);

        let payload = match body {
            Some(value) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Some(serde_json::to_vec(&value).map_err(|err| {
                    AuditFlowError::InvalidInput(format!("unserializable request body: {err}"))
                })?)
            }
            None => None,
        };

        let response = self.transport.send(method, url, headers, payload).await?;

        if !response.status.is_success() {
            return Err(AuditFlowError::UpstreamRequestFailed {
                status: response.status.as_u16(),
                url: url.to_string(),
                body: response.body_snippet(),
            });
        }

        Ok(response)
    }

    /// Authenticated request with a typed JSON response.
    ///
    /// Parse failures surface as `ResponseParseFailed`, distinct from
    /// transport failures because they are never worth retrying.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let response = self.authorized_request(method, url, body).await?;
        response.json().map_err(|err| AuditFlowError::ResponseParseFailed {
            url: url.to_string(),
            cause: err.to_string(),
        })
    }
}
