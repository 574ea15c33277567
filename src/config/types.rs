//! Core configuration types for content rewriting
//!
//! This module contains the per-container feature snapshot and the
//! server-wide settings that define how the proxy rewrites and batches.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use crate::utils::{
    DEFAULT_CONCAT_PATH, DEFAULT_CSS_CACHE_CAPACITY, DEFAULT_CSS_CACHE_TTL_SECS,
    DEFAULT_EXPIRES_SECS, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_LONG_TTL_SECS,
    DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_CONCAT_URL_LENGTH, DEFAULT_MAX_CONCURRENT_FETCHES,
    DEFAULT_PROXY_PATH, DEFAULT_TTL_SECS, REWRITABLE_TAGS,
};

/// Errors raised while building or loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid URL pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Tag '{0}' cannot be rewritten (expected one of style, link, script, img, embed)")]
    UnknownTag(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-container rewriting rules, immutable once built.
///
/// Serialized through [`FeatureConfigSpec`] so the glob patterns are compiled
/// exactly once, whichever way the config was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "FeatureConfigSpec", into = "FeatureConfigSpec")]
pub struct RewriteFeatureConfig {
    pub(crate) enabled: bool,
    pub(crate) include_tags: BTreeSet<String>,
    pub(crate) include_urls: Vec<String>,
    pub(crate) exclude_urls: Vec<String>,
    pub(crate) expires_secs: Option<u64>,

    /// Compiled from `include_urls`; a bare `*` sets `include_all` instead.
    pub(crate) include_compiled: Vec<Regex>,
    pub(crate) exclude_compiled: Vec<Regex>,
    pub(crate) include_all: bool,

    /// Stable hash of the settings above, written into proxied links.
    pub(crate) fingerprint: u64,
}

/// Wire form of [`RewriteFeatureConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FeatureConfigSpec {
    pub enabled: bool,
    pub include_tags: Vec<String>,
    pub include_urls: Vec<String>,
    pub exclude_urls: Vec<String>,
    pub expires: Option<u64>,
}

impl Default for FeatureConfigSpec {
    fn default() -> Self {
        Self {
            enabled: true,
            include_tags: REWRITABLE_TAGS.iter().map(|t| (*t).to_string()).collect(),
            include_urls: vec!["*".to_string()],
            exclude_urls: Vec::new(),
            expires: Some(DEFAULT_EXPIRES_SECS),
        }
    }
}

impl TryFrom<FeatureConfigSpec> for RewriteFeatureConfig {
    type Error = ConfigError;

    fn try_from(spec: FeatureConfigSpec) -> Result<Self, ConfigError> {
        RewriteFeatureConfig::builder()
            .enabled(spec.enabled)
            .include_tags(spec.include_tags)
            .include_urls(spec.include_urls)
            .exclude_urls(spec.exclude_urls)
            .expires_secs(spec.expires)
            .build()
    }
}

impl From<RewriteFeatureConfig> for FeatureConfigSpec {
    fn from(config: RewriteFeatureConfig) -> Self {
        Self {
            enabled: config.enabled,
            include_tags: config.include_tags.into_iter().collect(),
            include_urls: config.include_urls,
            exclude_urls: config.exclude_urls,
            expires: config.expires_secs,
        }
    }
}

impl Default for RewriteFeatureConfig {
    fn default() -> Self {
        // The default spec only contains known tags and the `*` wildcard.
        match Self::try_from(FeatureConfigSpec::default()) {
            Ok(config) => config,
            Err(_) => Self::disabled(),
        }
    }
}

impl RewriteFeatureConfig {
    /// A config that never rewrites anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            include_tags: BTreeSet::new(),
            include_urls: Vec::new(),
            exclude_urls: Vec::new(),
            expires_secs: None,
            include_compiled: Vec::new(),
            exclude_compiled: Vec::new(),
            include_all: false,
            fingerprint: 0,
        }
    }

    /// Parse a feature config from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed JSON, unknown tags or bad patterns.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Decide whether a candidate resource URL may be routed through the proxy.
    ///
    /// Excludes win over includes; a bare `*` include accepts everything that
    /// is not excluded.
    #[must_use]
    pub fn should_rewrite_url(&self, url: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if self.exclude_compiled.iter().any(|re| re.is_match(url)) {
            return false;
        }
        self.include_all || self.include_compiled.iter().any(|re| re.is_match(url))
    }

    /// Whether the HTML rewriter should touch elements with this tag name.
    #[must_use]
    pub fn should_rewrite_tag(&self, tag: &str) -> bool {
        self.enabled && self.include_tags.contains(&tag.to_ascii_lowercase())
    }
}

/// Server-wide settings for the proxy and concat endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriterConfig {
    pub(crate) proxy_path: String,
    pub(crate) concat_path: String,
    pub(crate) long_ttl_secs: u64,
    pub(crate) default_ttl_secs: u64,
    pub(crate) fetch_timeout_secs: u64,
    pub(crate) max_body_bytes: usize,
    pub(crate) max_concurrent_fetches: usize,
    pub(crate) max_concat_url_length: usize,
    pub(crate) css_cache_capacity: usize,
    pub(crate) css_cache_ttl_secs: Option<u64>,
    pub(crate) default_feature: RewriteFeatureConfig,
    pub(crate) containers: HashMap<String, RewriteFeatureConfig>,
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            proxy_path: DEFAULT_PROXY_PATH.to_string(),
            concat_path: DEFAULT_CONCAT_PATH.to_string(),
            long_ttl_secs: DEFAULT_LONG_TTL_SECS,
            default_ttl_secs: DEFAULT_TTL_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            max_concat_url_length: DEFAULT_MAX_CONCAT_URL_LENGTH,
            css_cache_capacity: DEFAULT_CSS_CACHE_CAPACITY,
            css_cache_ttl_secs: Some(DEFAULT_CSS_CACHE_TTL_SECS),
            default_feature: RewriteFeatureConfig::default(),
            containers: HashMap::new(),
        }
    }
}

impl RewriterConfig {
    /// Parse settings from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or invalid features.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not a valid configuration.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let json = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_json(&json)?;
        log::debug!(
            "Loaded rewriter config from {} ({} container overrides)",
            path.display(),
            config.containers.len()
        );
        Ok(config)
    }
}
