//! Lookup of per-container feature configuration.

use std::collections::HashMap;
use std::sync::Arc;

use super::types::{RewriteFeatureConfig, RewriterConfig};
use crate::uri::Uri;

/// Supplies the feature snapshot in force for a container and gadget.
///
/// Implementations must be cheap to call; rewriters query once per request.
pub trait FeatureConfigSource: Send + Sync {
    fn feature_config(&self, container: &str, gadget: Option<&Uri>) -> Arc<RewriteFeatureConfig>;
}

/// Fixed maps of gadget and container overrides over a default.
///
/// A gadget override wins over a container override.
#[derive(Debug, Clone)]
pub struct StaticFeatureConfigSource {
    default: Arc<RewriteFeatureConfig>,
    containers: HashMap<String, Arc<RewriteFeatureConfig>>,
    gadgets: HashMap<String, Arc<RewriteFeatureConfig>>,
}

impl StaticFeatureConfigSource {
    #[must_use]
    pub fn new(default: RewriteFeatureConfig) -> Self {
        Self {
            default: Arc::new(default),
            containers: HashMap::new(),
            gadgets: HashMap::new(),
        }
    }

    /// Override the feature config for one gadget URL.
    #[must_use]
    pub fn with_gadget(mut self, gadget: &Uri, feature: RewriteFeatureConfig) -> Self {
        self.gadgets
            .insert(gadget.without_fragment().as_str().to_string(), Arc::new(feature));
        self
    }

    #[must_use]
    pub fn with_container(
        mut self,
        container: impl Into<String>,
        feature: RewriteFeatureConfig,
    ) -> Self {
        self.containers.insert(container.into(), Arc::new(feature));
        self
    }
}

impl From<&RewriterConfig> for StaticFeatureConfigSource {
    fn from(config: &RewriterConfig) -> Self {
        Self {
            default: Arc::new(config.default_feature().clone()),
            containers: config
                .containers()
                .iter()
                .map(|(name, feature)| (name.clone(), Arc::new(feature.clone())))
                .collect(),
            gadgets: HashMap::new(),
        }
    }
}

impl Default for StaticFeatureConfigSource {
    fn default() -> Self {
        Self::new(RewriteFeatureConfig::default())
    }
}

impl FeatureConfigSource for StaticFeatureConfigSource {
    fn feature_config(&self, container: &str, gadget: Option<&Uri>) -> Arc<RewriteFeatureConfig> {
        if let Some(gadget) = gadget
            && let Some(feature) = self.gadgets.get(gadget.without_fragment().as_str())
        {
            return Arc::clone(feature);
        }
        self.containers
            .get(container)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_override_and_fallback() {
        let off = RewriteFeatureConfig::builder()
            .enabled(false)
            .build()
            .expect("builds");
        let source = StaticFeatureConfigSource::default().with_container("locked", off);

        assert!(!source.feature_config("locked", None).enabled());
        assert!(source.feature_config("default", None).enabled());
    }

    #[test]
    fn test_gadget_override_wins() {
        let gadget = Uri::parse("http://example.com/g.xml#frag").expect("valid uri");
        let off = RewriteFeatureConfig::builder()
            .enabled(false)
            .build()
            .expect("builds");
        let source = StaticFeatureConfigSource::default().with_gadget(&gadget, off);

        let other = Uri::parse("http://example.com/other.xml").expect("valid uri");
        assert!(!source.feature_config("default", Some(&gadget)).enabled());
        assert!(source.feature_config("default", Some(&other)).enabled());
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let feature = RewriteFeatureConfig::builder()
            .include_urls(["http://a.com/*"])
            .exclude_urls(["*.png"])
            .build()
            .expect("builds");
        assert!(feature.should_rewrite_url("http://a.com/x.css"));
        assert!(!feature.should_rewrite_url("http://a.com/x.png"));
        assert!(!feature.should_rewrite_url("http://b.com/x.css"));
    }

    #[test]
    fn test_feature_from_json() {
        let feature = RewriteFeatureConfig::from_json(
            r#"{"include-tags":["Link","script"],"include-urls":["*"],"expires":60}"#,
        )
        .expect("valid json");
        assert!(feature.should_rewrite_tag("link"));
        assert!(!feature.should_rewrite_tag("img"));
        assert_eq!(feature.expires_secs(), Some(60));
        assert!(feature.include_all());
    }
}
