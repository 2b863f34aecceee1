//! Proxy-aware HTTP transport with built-in retry and timeout support.
//!
//! One `Transport` instance is built per process and shared read-only by
//! the credential exchange and every resource fetch. When a proxy is
//! configured, all traffic is dispatched through it, the identity
//! provider's token exchange included.

use std::time::Duration;

use async_trait::async_trait;
use auditflow_domain::{AuditFlowError, ProxyConfig, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, Proxy, StatusCode};
use tracing::debug;

/// Maximum number of response-body bytes attached to error values.
const ERROR_BODY_SNIPPET_LEN: usize = 512;

/// Response from a single transport dispatch.
///
/// Non-success statuses are data, not errors; callers inspect `status`.
#[derive(Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// First value of the named header, if present and valid UTF-8.
    /// Header name matching is case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Truncated body for error diagnostics.
    pub fn body_snippet(&self) -> String {
        let mut text = self.text();
        if text.len() > ERROR_BODY_SNIPPET_LEN {
            let mut cut = ERROR_BODY_SNIPPET_LEN;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        text
    }
}

/// Narrow dispatch interface consumed by the credential exchange.
///
/// The confidential client issues its own network calls; implementing this
/// adapter once against [`Transport`] guarantees the token-exchange path
/// shares the proxy route with application traffic.
#[async_trait]
pub trait RequestDispatcher: Send + Sync {
    async fn send_get(&self, url: &str, headers: HeaderMap) -> Result<TransportResponse>;

    async fn send_post(
        &self,
        url: &str,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<TransportResponse>;
}

/// HTTP transport with optional forward-proxy routing.
#[derive(Clone)]
pub struct Transport {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl Transport {
    /// Start building a new transport.
    pub fn builder() -> TransportBuilder {
        TransportBuilder::default()
    }

    /// Convenience constructor: default settings plus optional proxy.
    pub fn new(proxy: Option<ProxyConfig>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy);
        }
        builder.build()
    }

    /// Dispatch a single request with retry semantics.
    ///
    /// Server errors and connection failures are retried with exponential
    /// backoff up to the configured attempt limit; the final outcome is
    /// always surfaced. Non-2xx statuses never become errors here.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<TransportResponse> {
        let attempts = self.max_attempts.max(1);

        for attempt in 0..attempts {
            debug!(attempt = attempt + 1, %method, url, "sending HTTP request");

            let mut request = self.client.request(method.clone(), url).headers(headers.clone());
            if let Some(ref bytes) = body {
                request = request.body(bytes.clone());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt = attempt + 1, %method, url, %status, "received HTTP response");

                    if status.is_server_error() && attempt + 1 < attempts {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    let headers = response.headers().clone();
                    let body = response.bytes().await.map_err(|err| {
                        AuditFlowError::Network(format!("failed to read response body: {err}"))
                    })?;

                    return Ok(TransportResponse { status, headers, body: body.to_vec() });
                }
                Err(err) => {
                    debug!(attempt = attempt + 1, %method, url, error = %err, "HTTP request failed");

                    if attempt + 1 < attempts && should_retry_error(&err) {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    return Err(AuditFlowError::Network(err.to_string()));
                }
            }
        }

        Err(AuditFlowError::Network(
            "transport exhausted retries without producing a result".into(),
        ))
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = retry_number.saturating_sub(1).min(8) as u32;
        let multiplier = 1u32 << shift;
        self.base_backoff.saturating_mul(multiplier)
    }

    async fn sleep_with_backoff(&self, retry_number: usize) {
        let delay = self.backoff_delay(retry_number);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RequestDispatcher for Transport {
    async fn send_get(&self, url: &str, headers: HeaderMap) -> Result<TransportResponse> {
        self.send(Method::GET, url, headers, None).await
    }

    async fn send_post(
        &self,
        url: &str,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<TransportResponse> {
        self.send(Method::POST, url, headers, Some(body)).await
    }
}

/// Builder for [`Transport`].
#[derive(Debug)]
pub struct TransportBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: Option<String>,
    proxy: Option<ProxyConfig>,
}

impl Default for TransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            user_agent: None,
            proxy: None,
        }
    }
}

impl TransportBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Route every request through the given forward proxy.
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn build(self) -> Result<Transport> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout);

        builder = match self.proxy {
            Some(proxy) => {
                let mut dispatcher = Proxy::all(&proxy.uri).map_err(|err| {
                    AuditFlowError::Config(format!("invalid proxy URI '{}': {err}", proxy.uri))
                })?;

                if let Some(ref token) = proxy.token {
                    let value =
                        HeaderValue::from_str(&format!("Bearer {token}")).map_err(|err| {
                            AuditFlowError::Config(format!("invalid proxy token: {err}"))
                        })?;
                    dispatcher = dispatcher.custom_http_auth(value);
                }

                builder.proxy(dispatcher)
            }
            // Ignore ambient proxy environment variables: routing is an
            // explicit configuration decision.
            None => builder.no_proxy(),
        };

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder
            .build()
            .map_err(|err| AuditFlowError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Transport {
            client,
            max_attempts: self.max_attempts.max(1),
            base_backoff: self.base_backoff,
        })
    }
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_request() || err.is_connect()
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use wiremock::matchers::{any, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport_with_defaults() -> Transport {
        Transport::builder()
            .base_backoff(Duration::from_millis(10))
            .max_attempts(3)
            .build()
            .expect("transport")
    }

    #[tokio::test]
    async fn returns_successful_response_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_with_defaults();
        let response = transport
            .send(Method::GET, &server.uri(), HeaderMap::new(), None)
            .await
            .expect("response");

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "ok");
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                let current = attempts_clone.fetch_add(1, Ordering::SeqCst);
                if current < 2 {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let transport = transport_with_defaults();
        let response = transport
            .send(Method::GET, &server.uri(), HeaderMap::new(), None)
            .await
            .expect("response");

        assert_eq!(response.status, StatusCode::OK);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_with_defaults();
        let response = transport
            .send(Method::GET, &server.uri(), HeaderMap::new(), None)
            .await
            .expect("response");

        // Non-2xx is data for the caller, never an error here
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn surfaces_network_errors_after_retries() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED
        let url = format!("http://{}", addr);

        let transport = Transport::builder()
            .base_backoff(Duration::from_millis(5))
            .max_attempts(2)
            .build()
            .expect("transport");

        let result = transport.send(Method::GET, &url, HeaderMap::new(), None).await;
        assert!(matches!(result, Err(AuditFlowError::Network(_))));
    }

    #[tokio::test]
    async fn proxy_routes_requests_through_configured_dispatcher() {
        // A plain-HTTP proxy receives the absolute-form request, so the mock
        // server stands in for the proxy and records what passed through it.
        let proxy_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("proxied"))
            .expect(1)
            .mount(&proxy_server)
            .await;

        let transport = Transport::builder()
            .proxy(ProxyConfig {
                uri: proxy_server.uri(),
                token: Some("proxy-secret".to_string()),
            })
            .max_attempts(1)
            .build()
            .expect("transport");

        let response = transport
            .send(Method::GET, "http://upstream.invalid/feed", HeaderMap::new(), None)
            .await
            .expect("response");
        assert_eq!(response.status, StatusCode::OK);

        let requests = proxy_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.path(), "/feed");
        // The proxy credential travels in Proxy-Authorization, distinct from
        // the application bearer token
        let proxy_auth = requests[0]
            .headers
            .get("proxy-authorization")
            .and_then(|value| value.to_str().ok());
        assert_eq!(proxy_auth, Some("Bearer proxy-secret"));
    }

    #[tokio::test]
    async fn direct_transport_does_not_use_proxy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = Transport::new(None).expect("transport");
        let response = transport
            .send(Method::GET, &format!("{}/direct", server.uri()), HeaderMap::new(), None)
            .await
            .expect("response");

        assert_eq!(response.status, StatusCode::OK);
        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("proxy-authorization").is_none());
    }

    #[test]
    fn body_snippet_truncates_long_bodies() {
        let response = TransportResponse {
            status: StatusCode::BAD_REQUEST,
            headers: HeaderMap::new(),
            body: vec![b'x'; 2048],
        };
        assert_eq!(response.body_snippet().len(), 512);
    }

    #[test]
    fn invalid_proxy_uri_is_a_config_error() {
        let result = Transport::builder()
            .proxy(ProxyConfig { uri: "not a uri".into(), token: None })
            .build();
        assert!(matches!(result, Err(AuditFlowError::Config(_))));
    }
}
