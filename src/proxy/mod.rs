//! The `/gadgets/proxy` endpoint: fetch one resource and serve it rewritten.

use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, IF_MODIFIED_SINCE};
use std::sync::Arc;
use std::time::Duration;

use crate::concat::is_truthy;
use crate::config::{FeatureConfigSource, RewriterConfig};
use crate::css::CssRewriter;
use crate::fetch::{FetchError, ResourceFetcher};
use crate::http::{HttpRequest, HttpResponse};
use crate::link_rewriter::{ProxyingLinkRewriter, RewriteTarget};
use crate::registry::RewriterRegistry;
use crate::uri::{Uri, UriError};
use crate::utils::is_css_content_type;

pub struct ProxyHandler {
    fetcher: Arc<dyn ResourceFetcher>,
    features: Arc<dyn FeatureConfigSource>,
    registry: RewriterRegistry,
    css_rewriter: CssRewriter,
    proxy_base: Uri,
    concat_base: Uri,
    default_ttl_secs: u64,
    fetch_timeout: Duration,
}

impl ProxyHandler {
    /// # Errors
    ///
    /// Returns [`UriError`] if the configured endpoint paths are not URIs.
    pub fn new(
        config: &RewriterConfig,
        fetcher: Arc<dyn ResourceFetcher>,
        features: Arc<dyn FeatureConfigSource>,
        registry: RewriterRegistry,
        css_rewriter: CssRewriter,
    ) -> Result<Self, UriError> {
        Ok(Self {
            fetcher,
            features,
            registry,
            css_rewriter,
            proxy_base: Uri::parse(config.proxy_path())?,
            concat_base: Uri::parse(config.concat_path())?,
            default_ttl_secs: config.default_ttl_secs(),
            fetch_timeout: config.fetch_timeout(),
        })
    }

    pub async fn handle(&self, request: &HttpRequest) -> HttpResponse {
        if request.header(IF_MODIFIED_SINCE).is_some() {
            return HttpResponse::new(StatusCode::NOT_MODIFIED);
        }

        let Some(raw_url) = request.uri.query_parameter("url") else {
            return HttpResponse::error(StatusCode::BAD_REQUEST, "Missing url parameter");
        };
        let url = match Uri::parse(raw_url) {
            Ok(url) if url.is_http() && url.authority().is_some() => url,
            Ok(_) => {
                return HttpResponse::error(
                    StatusCode::BAD_REQUEST,
                    &format!("Not an absolute http(s) URL: {raw_url}"),
                );
            }
            Err(e) => return HttpResponse::error(e.status(), &e.to_string()),
        };

        let query = &request.uri;
        let target = RewriteTarget {
            container: query
                .query_parameter("container")
                .unwrap_or(request.container.as_str())
                .to_string(),
            gadget: query
                .query_parameter("gadget")
                .and_then(|g| Uri::parse(g).ok())
                .or_else(|| request.gadget.clone()),
            debug: request.debug || is_truthy(query.query_parameter("debug")),
            nocache: request.ignore_cache || is_truthy(query.query_parameter("nocache")),
        };
        let upstream_request = HttpRequest::get(url.clone())
            .with_container(target.container.clone())
            .with_gadget(target.gadget.clone())
            .with_ignore_cache(target.nocache)
            .with_debug(target.debug);

        let fetched = match tokio::time::timeout(
            self.fetch_timeout,
            self.fetcher.fetch(upstream_request.clone()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                secs: self.fetch_timeout.as_secs(),
            }),
        };
        let upstream = match fetched {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Proxy fetch failed: {e}");
                return HttpResponse::error(e.status(), &e.to_string());
            }
        };

        let mut response = if !upstream.is_success() {
            log::debug!("Passing through {} from {url}", upstream.status);
            upstream
        } else if is_css_content_type(upstream.content_type()) {
            match self.rewrite_css(&upstream_request, &target, upstream) {
                Ok(response) => response,
                Err(response) => return response,
            }
        } else {
            let upstream = Arc::new(upstream);
            match self
                .registry
                .rewrite_response(&upstream_request, Arc::clone(&upstream))
            {
                Ok(rewritten) => Arc::unwrap_or_clone(rewritten),
                Err(e) => {
                    log::warn!("Serving {url} unrewritten: {e}");
                    Arc::unwrap_or_clone(upstream)
                }
            }
        };

        let ttl = if target.nocache {
            0
        } else {
            query
                .query_parameter("refresh")
                .and_then(|r| r.parse().ok())
                .unwrap_or(self.default_ttl_secs)
        };
        response.set_cache_ttl(ttl);
        response.set_attachment();
        response
    }

    /// Rewrite a stylesheet response; a parse failure answers 400.
    fn rewrite_css(
        &self,
        upstream_request: &HttpRequest,
        target: &RewriteTarget,
        mut upstream: HttpResponse,
    ) -> Result<HttpResponse, HttpResponse> {
        let feature = self
            .features
            .feature_config(&target.container, target.gadget.as_ref());
        if !feature.enabled() {
            return Ok(upstream);
        }

        let link_rewriter = ProxyingLinkRewriter::new(self.proxy_base.clone(), feature, target.clone())
            .with_concat_base(self.concat_base.clone());
        let body = upstream.body_text();
        match self
            .css_rewriter
            .rewrite_stylesheet(&body, upstream_request.content_base(), &link_rewriter)
        {
            Ok(rewritten) => {
                if rewritten != body {
                    upstream.body = rewritten.into_bytes();
                    upstream.headers.remove(CONTENT_LENGTH);
                }
                Ok(upstream)
            }
            Err(e) => {
                log::warn!("Rejecting malformed stylesheet {}: {e}", upstream_request.uri);
                Err(HttpResponse::error(e.status(), &e.to_string()))
            }
        }
    }
}
