pub mod concat;
pub mod config;
pub mod content;
pub mod css;
pub mod dom;
pub mod fetch;
pub mod html_rewriter;
pub mod http;
pub mod link_rewriter;
pub mod proxy;
pub mod registry;
pub mod uri;
pub mod utils;

pub use concat::{ConcatHandler, ConcatType, ConcatUri, ConcatUriError, ConcatUriManager};
pub use config::{
    ConfigError, FeatureConfigSource, RewriteFeatureConfig, RewriterConfig,
    StaticFeatureConfigSource,
};
pub use content::MutableContent;
pub use css::{CssCache, CssParseError, CssRewriter, CssStyleSheet, LruCssCache, NoCssCache};
pub use fetch::{FetchError, ReqwestFetcher, ResourceFetcher};
pub use html_rewriter::HtmlContentRewriter;
pub use http::{HttpRequest, HttpResponse};
pub use link_rewriter::{LinkRewriter, ProxyingLinkRewriter, RewriteTarget};
pub use proxy::ProxyHandler;
pub use registry::{
    ContentRewriter, CssContentRewriter, RewriteContext, RewriterRegistry, RewritingError,
};
pub use uri::{Uri, UriBuilder, UriError};

use std::sync::Arc;

/// Both endpoints wired from one configuration.
pub struct RewritingProxy {
    pub proxy: ProxyHandler,
    pub concat: ConcatHandler,
}

impl RewritingProxy {
    /// Build the endpoints over `fetcher`, with feature configs taken from
    /// `config` and a shared CSS cache sized by it.
    ///
    /// # Errors
    ///
    /// Returns [`UriError`] if the configured endpoint paths are not URIs.
    pub fn new(config: &RewriterConfig, fetcher: Arc<dyn ResourceFetcher>) -> Result<Self, UriError> {
        let features: Arc<dyn FeatureConfigSource> =
            Arc::new(StaticFeatureConfigSource::from(config));
        Self::with_features(config, fetcher, features)
    }

    /// # Errors
    ///
    /// Returns [`UriError`] if the configured endpoint paths are not URIs.
    pub fn with_features(
        config: &RewriterConfig,
        fetcher: Arc<dyn ResourceFetcher>,
        features: Arc<dyn FeatureConfigSource>,
    ) -> Result<Self, UriError> {
        let cache: Arc<dyn CssCache> = if config.css_cache_capacity() == 0 {
            Arc::new(NoCssCache)
        } else {
            Arc::new(LruCssCache::new(config.css_cache_capacity(), config.css_cache_ttl()))
        };
        let css_rewriter = CssRewriter::new(cache);
        let registry = RewriterRegistry::standard(config, Arc::clone(&features), css_rewriter.clone())?;
        Ok(Self {
            proxy: ProxyHandler::new(
                config,
                Arc::clone(&fetcher),
                Arc::clone(&features),
                registry,
                css_rewriter.clone(),
            )?,
            concat: ConcatHandler::new(config, fetcher, features, css_rewriter)?,
        })
    }

    /// Route a request to the endpoint its path names.
    pub async fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let path = request.uri.path();
        if path == self.concat.manager().concat_base().path() {
            self.concat.handle(request).await
        } else {
            self.proxy.handle(request).await
        }
    }
}
