//! Getter methods for the configuration types

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use super::types::{RewriteFeatureConfig, RewriterConfig};

impl RewriteFeatureConfig {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn include_tags(&self) -> &BTreeSet<String> {
        &self.include_tags
    }

    #[must_use]
    pub fn include_urls(&self) -> &[String] {
        &self.include_urls
    }

    #[must_use]
    pub fn exclude_urls(&self) -> &[String] {
        &self.exclude_urls
    }

    #[must_use]
    pub fn expires_secs(&self) -> Option<u64> {
        self.expires_secs
    }

    #[must_use]
    pub fn include_all(&self) -> bool {
        self.include_all
    }

    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

impl RewriterConfig {
    #[must_use]
    pub fn proxy_path(&self) -> &str {
        &self.proxy_path
    }

    #[must_use]
    pub fn concat_path(&self) -> &str {
        &self.concat_path
    }

    #[must_use]
    pub fn long_ttl_secs(&self) -> u64 {
        self.long_ttl_secs
    }

    #[must_use]
    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    #[must_use]
    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_concurrent_fetches.max(1)
    }

    #[must_use]
    pub fn max_concat_url_length(&self) -> usize {
        self.max_concat_url_length
    }

    #[must_use]
    pub fn css_cache_capacity(&self) -> usize {
        self.css_cache_capacity
    }

    #[must_use]
    pub fn css_cache_ttl(&self) -> Option<Duration> {
        self.css_cache_ttl_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn default_feature(&self) -> &RewriteFeatureConfig {
        &self.default_feature
    }

    #[must_use]
    pub fn containers(&self) -> &HashMap<String, RewriteFeatureConfig> {
        &self.containers
    }

    /// Feature config for a container, falling back to the default.
    #[must_use]
    pub fn feature_for(&self, container: &str) -> &RewriteFeatureConfig {
        self.containers
            .get(container)
            .unwrap_or(&self.default_feature)
    }
}
