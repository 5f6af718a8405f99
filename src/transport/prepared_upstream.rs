use crate::config::UpstreamConfig;
use crate::error::ProxyError;

/// Precomputed upstream endpoint and headers used by the hot request path.
#[derive(Debug, Clone)]
pub struct PreparedUpstream {
    chat_completions_url: url::Url,
    static_headers: http::HeaderMap,
}

impl PreparedUpstream {
    /// Build a prepared upstream from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Config`] when the configured base URL cannot be
    /// turned into a chat-completions endpoint.
    pub fn new(upstream: &UpstreamConfig) -> Result<Self, ProxyError> {
        let base = upstream.base_url.trim_end_matches('/');
        let chat_completions_url = url::Url::parse(&format!("{base}/chat/completions"))
            .map_err(|err| {
                ProxyError::Config(format!("Invalid upstream base_url '{base}': {err}"))
            })?;

        let mut static_headers = http::HeaderMap::new();
        static_headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        let key = upstream.api_key.trim();
        if !key.is_empty() {
            // Keyless local upstreams (vLLM and friends) get no auth header.
            if let Ok(value) = http::HeaderValue::from_str(&format!("Bearer {key}")) {
                static_headers.insert(http::header::AUTHORIZATION, value);
            }
        }

        Ok(Self {
            chat_completions_url,
            static_headers,
        })
    }

    #[must_use]
    pub fn chat_completions_url(&self) -> &url::Url {
        &self.chat_completions_url
    }

    #[must_use]
    pub fn static_headers(&self) -> &http::HeaderMap {
        &self.static_headers
    }
}
