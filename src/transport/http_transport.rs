use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::ProxyError;

/// HTTP transport client for sending requests to the upstream service.
///
/// One pooled client for the process. Non-streaming calls carry the
/// configured total timeout; streaming calls only bound the connect phase,
/// since a healthy SSE response can legitimately outlive any total timeout.
pub struct HttpTransport {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Create a new transport with connection pooling from the server config.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
        };

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.http_pool_max_idle_per_host.max(1))
            .pool_idle_timeout(pool_idle_timeout)
            .tcp_nodelay(true)
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .unwrap_or_else(|err| {
                tracing::error!(error = %err, "failed to build configured reqwest client, falling back to default client");
                reqwest::Client::new()
            });

        Self {
            client,
            request_timeout: Duration::from_secs(config.timeout),
        }
    }

    /// POST a JSON body and await the full response (total timeout applies).
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Transport`] when the request cannot be sent.
    pub async fn send(
        &self,
        url: &url::Url,
        headers: &http::HeaderMap,
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, ProxyError> {
        self.client
            .post(url.clone())
            .headers(headers.clone())
            .timeout(self.request_timeout)
            .body(body)
            .send()
            .await
            .map_err(|err| ProxyError::Transport(format!("Upstream request failed: {err}")))
    }

    /// POST a JSON body for a streaming response (connect timeout only).
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Transport`] when the request cannot be sent.
    pub async fn send_stream(
        &self,
        url: &url::Url,
        headers: &http::HeaderMap,
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, ProxyError> {
        self.client
            .post(url.clone())
            .headers(headers.clone())
            .body(body)
            .send()
            .await
            .map_err(|err| ProxyError::Transport(format!("Upstream request failed: {err}")))
    }
}
