//! The `/gadgets/concat` endpoint.

use futures::stream::{self, StreamExt};
use reqwest::header::{CONTENT_TYPE, IF_MODIFIED_SINCE};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

use super::output::{ConcatWriter, ItemError, OutputMode};
use super::uri_manager::ConcatUriManager;
use super::ConcatType;
use crate::config::{FeatureConfigSource, RewriterConfig};
use crate::css::CssRewriter;
use crate::fetch::{FetchError, ResourceFetcher};
use crate::http::{HttpRequest, HttpResponse};
use crate::link_rewriter::{ProxyingLinkRewriter, RewriteTarget};
use crate::uri::{Uri, UriError};

/// Serves batch requests: fetches every target with bounded concurrency and
/// writes the results, in request order, through the output protocol.
pub struct ConcatHandler {
    manager: ConcatUriManager,
    fetcher: Arc<dyn ResourceFetcher>,
    features: Arc<dyn FeatureConfigSource>,
    css_rewriter: CssRewriter,
    proxy_base: Uri,
    long_ttl_secs: u64,
    default_ttl_secs: u64,
    fetch_timeout: Duration,
    max_concurrent_fetches: usize,
}

impl ConcatHandler {
    /// # Errors
    ///
    /// Returns [`UriError`] if the configured proxy or concat path is not a
    /// valid URI.
    pub fn new(
        config: &RewriterConfig,
        fetcher: Arc<dyn ResourceFetcher>,
        features: Arc<dyn FeatureConfigSource>,
        css_rewriter: CssRewriter,
    ) -> Result<Self, UriError> {
        let manager = ConcatUriManager::new(Uri::parse(config.concat_path())?)
            .with_max_url_length(config.max_concat_url_length());
        Ok(Self {
            manager,
            fetcher,
            features,
            css_rewriter,
            proxy_base: Uri::parse(config.proxy_path())?,
            long_ttl_secs: config.long_ttl_secs(),
            default_ttl_secs: config.default_ttl_secs(),
            fetch_timeout: config.fetch_timeout(),
            max_concurrent_fetches: config.max_concurrent_fetches(),
        })
    }

    #[must_use]
    pub fn manager(&self) -> &ConcatUriManager {
        &self.manager
    }

    pub async fn handle(&self, request: &HttpRequest) -> HttpResponse {
        if request.header(IF_MODIFIED_SINCE).is_some() {
            return HttpResponse::new(StatusCode::NOT_MODIFIED);
        }

        let concat = match self.manager.process(&request.uri) {
            Ok(concat) => concat,
            Err(e) => {
                log::debug!("Rejecting batch request {}: {e}", request.uri);
                return HttpResponse::error(e.status(), &e.to_string());
            }
        };

        let (mode, mime) = match concat.json() {
            Some(token) => (OutputMode::Json(token.to_string()), ConcatType::Js.mime_type()),
            None => (OutputMode::Verbatim, concat.kind().mime_type()),
        };

        let target = concat.target();
        let feature = self
            .features
            .feature_config(&target.container, target.gadget.as_ref());
        let link_rewriter = ProxyingLinkRewriter::new(
            self.proxy_base.clone(),
            Arc::clone(&feature),
            target.clone(),
        )
        .with_concat_base(self.manager.concat_base().clone());
        let css_links =
            (concat.kind() == ConcatType::Css && feature.enabled()).then_some(&link_rewriter);

        log::debug!(
            "Serving batch of {} {} resources",
            concat.targets().len(),
            concat.kind().as_param()
        );

        let mut writer = ConcatWriter::new(mode);
        let mut items = stream::iter(concat.targets().iter().cloned())
            .map(|url| self.fetch_item(target, url, css_links))
            .buffered(self.max_concurrent_fetches.max(1));
        while let Some((url, result)) = items.next().await {
            if !writer.write_item(&url, &result) {
                break;
            }
        }

        // A truncated batch must not be cached
        let ttl = if writer.is_stopped() {
            0
        } else {
            concat.translate_status_refresh(self.long_ttl_secs, self.default_ttl_secs)
        };

        let mut response = HttpResponse::ok(writer.finish());
        response.set_header(CONTENT_TYPE, &format!("{mime}; charset=UTF8"));
        response.set_attachment();
        response.set_cache_ttl(ttl);
        response
    }

    async fn fetch_item(
        &self,
        target: &RewriteTarget,
        url: Uri,
        css_links: Option<&ProxyingLinkRewriter>,
    ) -> (Uri, Result<String, ItemError>) {
        let sub_request = HttpRequest::get(url.clone())
            .with_container(target.container.clone())
            .with_gadget(target.gadget.clone())
            .with_ignore_cache(target.nocache)
            .with_debug(target.debug);

        let fetched = match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(sub_request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                secs: self.fetch_timeout.as_secs(),
            }),
        };

        let result = match fetched {
            Err(e) => {
                log::warn!("Batch item failed: {e}");
                Err(ItemError::from(&e))
            }
            Ok(response) if !response.is_success() => {
                log::warn!("Batch item {url} returned {}", response.status);
                Err(ItemError::upstream(response.status))
            }
            Ok(response) => {
                let body = response.body_text();
                match css_links {
                    Some(link_rewriter) => {
                        match self.css_rewriter.rewrite_stylesheet(&body, &url, link_rewriter) {
                            Ok(rewritten) => Ok(rewritten),
                            Err(e) => {
                                log::warn!("Serving {url} unrewritten: {e}");
                                Ok(body)
                            }
                        }
                    }
                    None => Ok(body),
                }
            }
        };
        (url, result)
    }
}
