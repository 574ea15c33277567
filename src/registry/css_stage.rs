use reqwest::StatusCode;
use std::sync::Arc;

use super::{ContentRewriter, RewriteContext, RewritingError};
use crate::config::{FeatureConfigSource, RewriterConfig};
use crate::content::MutableContent;
use crate::css::CssRewriter;
use crate::link_rewriter::ProxyingLinkRewriter;
use crate::uri::{Uri, UriError};
use crate::utils::is_css_content_type;

/// Chain stage for whole `text/css` bodies.
pub struct CssContentRewriter {
    features: Arc<dyn FeatureConfigSource>,
    css_rewriter: CssRewriter,
    proxy_base: Uri,
    concat_base: Uri,
}

impl CssContentRewriter {
    /// # Errors
    ///
    /// Returns [`UriError`] if the configured endpoint paths are not URIs.
    pub fn new(
        config: &RewriterConfig,
        features: Arc<dyn FeatureConfigSource>,
        css_rewriter: CssRewriter,
    ) -> Result<Self, UriError> {
        Ok(Self {
            features,
            css_rewriter,
            proxy_base: Uri::parse(config.proxy_path())?,
            concat_base: Uri::parse(config.concat_path())?,
        })
    }
}

impl ContentRewriter for CssContentRewriter {
    fn rewrite(
        &self,
        ctx: &RewriteContext<'_>,
        content: &mut MutableContent,
    ) -> Result<bool, RewritingError> {
        if !is_css_content_type(ctx.content_type()) {
            return Ok(false);
        }
        let feature = self
            .features
            .feature_config(&ctx.request.container, ctx.request.gadget.as_ref());
        if !feature.enabled() || !feature.should_rewrite_tag("style") {
            return Ok(false);
        }

        let link_rewriter = ProxyingLinkRewriter::new(self.proxy_base.clone(), feature, ctx.target())
            .with_concat_base(self.concat_base.clone());
        let original = content.content().to_string();
        let rewritten = self
            .css_rewriter
            .rewrite_stylesheet(&original, ctx.content_base(), &link_rewriter)
            .map_err(|e| RewritingError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

        if rewritten == original {
            return Ok(false);
        }
        content.set_content(rewritten);
        Ok(true)
    }
}
