//! Builder for `RewriteFeatureConfig`
//!
//! Glob patterns are compiled and the fingerprint computed once in `build()`,
//! so lookups on the hot path never touch the regex compiler.

use regex::Regex;
use std::collections::BTreeSet;
use xxhash_rust::xxh3::Xxh3;

use super::types::{ConfigError, RewriteFeatureConfig};
use crate::utils::{DEFAULT_EXPIRES_SECS, REWRITABLE_TAGS};

/// Compile a glob pattern into an anchored regex
///
/// Everything except `*` is matched literally; `*` matches any sequence.
///
/// # Errors
///
/// Returns an error if the resulting regex pattern is invalid.
fn compile_glob_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    let regex_pattern = regex::escape(pattern).replace(r"\*", ".*");
    let anchored = format!("^{regex_pattern}$");

    Regex::new(&anchored).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

pub struct RewriteFeatureConfigBuilder {
    pub(crate) enabled: bool,
    pub(crate) include_tags: Vec<String>,
    pub(crate) include_urls: Vec<String>,
    pub(crate) exclude_urls: Vec<String>,
    pub(crate) expires_secs: Option<u64>,
}

impl Default for RewriteFeatureConfigBuilder {
    fn default() -> Self {
        Self {
            enabled: true,
            include_tags: REWRITABLE_TAGS.iter().map(|t| (*t).to_string()).collect(),
            include_urls: vec!["*".to_string()],
            exclude_urls: Vec::new(),
            expires_secs: Some(DEFAULT_EXPIRES_SECS),
        }
    }
}

impl RewriteFeatureConfig {
    /// Create a builder starting from the permissive defaults
    /// (enabled, every tag, every URL).
    #[must_use]
    pub fn builder() -> RewriteFeatureConfigBuilder {
        RewriteFeatureConfigBuilder::default()
    }
}

impl RewriteFeatureConfigBuilder {
    /// Validate tags, compile patterns and freeze the config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownTag`] for a tag the HTML rewriter cannot
    /// handle and [`ConfigError::InvalidPattern`] for a pattern that fails to compile.
    pub fn build(self) -> Result<RewriteFeatureConfig, ConfigError> {
        let mut include_tags = BTreeSet::new();
        for tag in &self.include_tags {
            let tag = tag.trim().to_ascii_lowercase();
            if !REWRITABLE_TAGS.contains(&tag.as_str()) {
                return Err(ConfigError::UnknownTag(tag));
            }
            include_tags.insert(tag);
        }

        let include_all = self.include_urls.iter().any(|p| p.trim() == "*");
        let include_compiled = self
            .include_urls
            .iter()
            .filter(|p| p.trim() != "*")
            .map(|p| compile_glob_pattern(p.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude_compiled = self
            .exclude_urls
            .iter()
            .map(|p| compile_glob_pattern(p.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        let fingerprint = fingerprint_settings(
            self.enabled,
            &include_tags,
            &self.include_urls,
            &self.exclude_urls,
            self.expires_secs,
        );

        Ok(RewriteFeatureConfig {
            enabled: self.enabled,
            include_tags,
            include_urls: self.include_urls,
            exclude_urls: self.exclude_urls,
            expires_secs: self.expires_secs,
            include_compiled,
            exclude_compiled,
            include_all,
            fingerprint,
        })
    }
}

fn fingerprint_settings(
    enabled: bool,
    tags: &BTreeSet<String>,
    include_urls: &[String],
    exclude_urls: &[String],
    expires_secs: Option<u64>,
) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.update(&[u8::from(enabled)]);
    for tag in tags {
        hasher.update(tag.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(b"\x01");
    for url in include_urls {
        hasher.update(url.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(b"\x01");
    for url in exclude_urls {
        hasher.update(url.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(&expires_secs.unwrap_or(u64::MAX).to_le_bytes());
    hasher.digest()
}
