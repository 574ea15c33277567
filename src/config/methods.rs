//! Builder setters and `with_*` modifiers
//!
//! Fluent setters for `RewriteFeatureConfigBuilder` plus consuming `with_*`
//! methods for adjusting a `RewriterConfig` after loading.

use std::collections::HashMap;

use super::builder::RewriteFeatureConfigBuilder;
use super::types::{RewriteFeatureConfig, RewriterConfig};

impl RewriteFeatureConfigBuilder {
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Replace the set of tags the HTML rewriter may touch.
    #[must_use]
    pub fn include_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the include globs. `*` alone means "everything".
    #[must_use]
    pub fn include_urls<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_urls = patterns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn exclude_urls<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_urls = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Refresh hint (seconds) appended to proxied links; `None` omits it.
    #[must_use]
    pub fn expires_secs(mut self, secs: Option<u64>) -> Self {
        self.expires_secs = secs;
        self
    }
}

impl RewriterConfig {
    #[must_use]
    pub fn with_proxy_path(mut self, path: impl Into<String>) -> Self {
        self.proxy_path = path.into();
        self
    }

    #[must_use]
    pub fn with_concat_path(mut self, path: impl Into<String>) -> Self {
        self.concat_path = path.into();
        self
    }

    #[must_use]
    pub fn with_long_ttl_secs(mut self, secs: u64) -> Self {
        self.long_ttl_secs = secs;
        self
    }

    #[must_use]
    pub fn with_default_ttl_secs(mut self, secs: u64) -> Self {
        self.default_ttl_secs = secs;
        self
    }

    #[must_use]
    pub fn with_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Clamped to at least one so batches always make progress.
    #[must_use]
    pub fn with_max_concurrent_fetches(mut self, n: usize) -> Self {
        self.max_concurrent_fetches = n.max(1);
        self
    }

    #[must_use]
    pub fn with_max_concat_url_length(mut self, len: usize) -> Self {
        self.max_concat_url_length = len;
        self
    }

    #[must_use]
    pub fn with_css_cache(mut self, capacity: usize, ttl_secs: Option<u64>) -> Self {
        self.css_cache_capacity = capacity;
        self.css_cache_ttl_secs = ttl_secs;
        self
    }

    #[must_use]
    pub fn with_default_feature(mut self, feature: RewriteFeatureConfig) -> Self {
        self.default_feature = feature;
        self
    }

    /// Register a per-container feature override.
    #[must_use]
    pub fn with_container(
        mut self,
        container: impl Into<String>,
        feature: RewriteFeatureConfig,
    ) -> Self {
        self.containers.insert(container.into(), feature);
        self
    }

    #[must_use]
    pub fn with_containers(mut self, containers: HashMap<String, RewriteFeatureConfig>) -> Self {
        self.containers = containers;
        self
    }
}
