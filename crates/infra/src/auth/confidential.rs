//! Confidential-client token exchange
//!
//! Implements the client-credentials grant authenticated by a certificate
//! assertion. Network calls go through the [`RequestDispatcher`] adapter so
//! the exchange shares the process-wide proxy route with application
//! traffic.

use std::sync::Arc;

use auditflow_domain::{AuditFlowError, Credential, Result};
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;
use url::form_urlencoded;

use super::assertion::build_client_assertion;
use super::certificate::Certificate;
use crate::http::RequestDispatcher;

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Token response from the authorization server (RFC 6749).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: i64,
}

/// Client-credentials exchange bound to one app registration.
pub struct ConfidentialClient {
    client_id: String,
    token_endpoint: String,
    dispatcher: Arc<dyn RequestDispatcher>,
}

impl ConfidentialClient {
    /// Create an exchange client for `{login_url}/{tenant_id}`.
    pub fn new(
        client_id: impl Into<String>,
        login_url: &str,
        tenant_id: &str,
        dispatcher: Arc<dyn RequestDispatcher>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            token_endpoint: format!(
                "{}/{}/oauth2/v2.0/token",
                login_url.trim_end_matches('/'),
                tenant_id
            ),
            dispatcher,
        }
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Exchange a signed client assertion for a bearer credential.
    ///
    /// # Errors
    /// `AuthenticationFailed` when the identity provider rejects the grant;
    /// `ResponseParseFailed` when it answers 2xx with an unreadable body.
    pub async fn acquire_token(
        &self,
        certificate: &Certificate,
        scopes: &[String],
    ) -> Result<Credential> {
        let assertion =
            build_client_assertion(certificate, &self.client_id, &self.token_endpoint, Utc::now())?;

        let form = form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", &scopes.join(" "))
            .append_pair("client_assertion_type", CLIENT_ASSERTION_TYPE)
            .append_pair("client_assertion", &assertion)
            .finish();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));

        debug!(token_endpoint = %self.token_endpoint, "exchanging client assertion for credential");

        let response =
            self.dispatcher.send_post(&self.token_endpoint, headers, form.into_bytes()).await?;

        if !response.status.is_success() {
            return Err(AuditFlowError::AuthenticationFailed(format!(
                "token endpoint returned {}: {}",
                response.status,
                response.body_snippet()
            )));
        }

        let token: TokenResponse = response.json().map_err(|err| {
            AuditFlowError::ResponseParseFailed {
                url: self.token_endpoint.clone(),
                cause: err.to_string(),
            }
        })?;

        Ok(Credential::new(
            token.access_token,
            token.token_type,
            scopes.to_vec(),
            token.expires_in,
        ))
    }
}
