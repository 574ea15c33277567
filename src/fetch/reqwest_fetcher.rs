//! Production fetcher on top of `reqwest`.

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use reqwest::header::{HeaderMap, ACCEPT_ENCODING, HOST, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

use super::{FetchError, ResourceFetcher};
use crate::config::RewriterConfig;
use crate::http::{HttpRequest, HttpResponse};
use crate::utils::PROXY_USER_AGENT;

/// Fetches over HTTP(S) with a per-request timeout and a body size cap.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl ReqwestFetcher {
    /// Build a fetcher with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration, max_body_bytes: usize) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(PROXY_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, timeout, max_body_bytes))
    }

    /// Build a fetcher from the server-wide settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn from_config(config: &RewriterConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.fetch_timeout(), config.max_body_bytes())
    }

    /// Reuse an existing client (and its connection pool).
    #[must_use]
    pub fn with_client(client: Client, timeout: Duration, max_body_bytes: usize) -> Self {
        Self {
            client,
            timeout,
            max_body_bytes,
        }
    }

    async fn fetch_inner(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let url_text = request.uri.as_str().to_string();
        if !request.uri.is_http() {
            return Err(FetchError::InvalidUrl {
                url: url_text,
                message: "only http and https can be fetched".to_string(),
            });
        }
        let url = request.uri.to_url().map_err(|e| FetchError::InvalidUrl {
            url: url_text.clone(),
            message: e.to_string(),
        })?;

        let mut headers = forwardable_headers(&request.headers);
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, reqwest::header::HeaderValue::from_static(PROXY_USER_AGENT));
        }

        log::debug!("Fetching {url_text}");
        let response = self
            .client
            .request(request.method.clone(), url)
            .headers(headers)
            .body(request.body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(&url_text, &e))?;

        let status = response.status();
        let response_headers = response.headers().clone();

        // Enforce the limit before reading when the length is advertised
        let expected_size = response.content_length().unwrap_or(0);
        if expected_size > self.max_body_bytes as u64 {
            return Err(FetchError::BodyTooLarge {
                url: url_text,
                limit: self.max_body_bytes,
            });
        }

        let mut buffer = Vec::with_capacity(usize::try_from(expected_size).unwrap_or(0));
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.classify(&url_text, &e))?;
            if buffer.len() + chunk.len() > self.max_body_bytes {
                return Err(FetchError::BodyTooLarge {
                    url: url_text,
                    limit: self.max_body_bytes,
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        log::trace!("Fetched {url_text}: {status}, {} bytes", buffer.len());
        Ok(HttpResponse {
            status,
            headers: response_headers,
            body: buffer,
        })
    }

    fn classify(&self, url: &str, error: &reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}

impl ResourceFetcher for ReqwestFetcher {
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, FetchError>> {
        self.fetch_inner(request).boxed()
    }
}

/// Drop hop-specific headers that must be recomputed for the upstream hop.
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    out.remove(HOST);
    out.remove(ACCEPT_ENCODING);
    out.remove(reqwest::header::CONNECTION);
    out.remove(reqwest::header::CONTENT_LENGTH);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwardable_headers_strip_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, "proxy.local".parse().expect("valid header"));
        headers.insert(reqwest::header::ACCEPT, "text/css".parse().expect("valid header"));
        let out = forwardable_headers(&headers);
        assert!(!out.contains_key(HOST));
        assert!(out.contains_key(reqwest::header::ACCEPT));
    }

    #[tokio::test]
    async fn test_non_http_scheme_rejected() {
        let fetcher =
            ReqwestFetcher::new(Duration::from_secs(1), 1024).expect("client builds");
        let uri = crate::uri::Uri::parse("ftp://example.com/x.css").expect("valid uri");
        let err = fetcher
            .fetch(HttpRequest::get(uri))
            .await
            .expect_err("ftp is not fetchable");
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert_eq!(err.status(), reqwest::StatusCode::BAD_REQUEST);
    }
}
