//! DOM rewriting for HTML responses.
//!
//! Runs four stages in a fixed order over one parsed document:
//!
//! 1. `<style>` elements move into `<head>`, their CSS is rewritten and any
//!    `@import` becomes a `<link rel=stylesheet>` appended to `<head>`.
//! 2. Stylesheet `<link>`s are grouped by `media` and each group is replaced
//!    by batch URLs.
//! 3. Runs of adjacent external scripts are replaced by batch URLs. Inline
//!    scripts stay put and split runs.
//! 4. `img[src]` and `embed[src]` are proxied one by one.
//!
//! Each stage is gated by the feature's included tags. Mutations are applied
//! per element, so the tree is always serializable.

pub mod grouping;

pub use grouping::ScriptRun;

use std::sync::Arc;

use crate::concat::{ConcatType, ConcatUriManager};
use crate::config::{FeatureConfigSource, RewriteFeatureConfig, RewriterConfig};
use crate::content::MutableContent;
use crate::css::CssRewriter;
use crate::dom::{Document, NodeId};
use crate::link_rewriter::{LinkRewriter, ProxyingLinkRewriter, RewriteTarget};
use crate::registry::{ContentRewriter, RewriteContext, RewritingError};
use crate::uri::{Uri, UriError};
use crate::utils::is_html_content_type;
use grouping::{is_javascript, is_stylesheet_link, media_groups, script_runs};

/// Tags whose `src` is proxied directly.
const LEAF_TAGS: [&str; 2] = ["img", "embed"];

pub struct HtmlContentRewriter {
    features: Arc<dyn FeatureConfigSource>,
    css_rewriter: CssRewriter,
    concat: ConcatUriManager,
    proxy_base: Uri,
}

/// Everything one document rewrite needs, resolved up front.
struct Pass<'a> {
    base: &'a Uri,
    feature: &'a RewriteFeatureConfig,
    target: &'a RewriteTarget,
    link_rewriter: &'a ProxyingLinkRewriter,
}

impl HtmlContentRewriter {
    /// # Errors
    ///
    /// Returns [`UriError`] if the configured endpoint paths are not URIs.
    pub fn new(
        config: &RewriterConfig,
        features: Arc<dyn FeatureConfigSource>,
        css_rewriter: CssRewriter,
    ) -> Result<Self, UriError> {
        let concat = ConcatUriManager::new(Uri::parse(config.concat_path())?)
            .with_max_url_length(config.max_concat_url_length());
        Ok(Self {
            features,
            css_rewriter,
            concat,
            proxy_base: Uri::parse(config.proxy_path())?,
        })
    }

    /// Replace the batch URL builder, e.g. to enable versioning.
    #[must_use]
    pub fn with_concat_manager(mut self, concat: ConcatUriManager) -> Self {
        self.concat = concat;
        self
    }

    /// Rewrite `content` as the body of a response with `content_type`,
    /// fetched for `target` from `base`.
    pub fn rewrite_html(
        &self,
        base: &Uri,
        target: &RewriteTarget,
        content_type: &str,
        content: &mut MutableContent,
    ) -> bool {
        // Must precede any DOM access
        if !is_html_content_type(content_type) {
            return false;
        }

        let feature = self
            .features
            .feature_config(&target.container, target.gadget.as_ref());
        if !feature.enabled() {
            return false;
        }

        let link_rewriter =
            ProxyingLinkRewriter::new(self.proxy_base.clone(), Arc::clone(&feature), target.clone())
                .with_concat_base(self.concat.concat_base().clone());
        let pass = Pass {
            base,
            feature: &feature,
            target,
            link_rewriter: &link_rewriter,
        };

        let doc = content.document_mut();
        let mut mutated = false;
        if feature.should_rewrite_tag("style") {
            mutated |= self.consolidate_styles(doc, &pass);
        }
        if feature.should_rewrite_tag("link") {
            mutated |= self.concat_stylesheets(doc, &pass);
        }
        if feature.should_rewrite_tag("script") {
            mutated |= self.concat_scripts(doc, &pass);
        }
        mutated |= rewrite_leaves(doc, &pass);

        if mutated {
            content.document_changed();
        }
        mutated
    }

    fn consolidate_styles(&self, doc: &mut Document, pass: &Pass<'_>) -> bool {
        let styles = doc.elements_by_tag("style");
        if styles.is_empty() {
            return false;
        }

        let had_head = doc.head().is_some();
        let head = doc.ensure_head();
        let mut mutated = !had_head;

        for style in styles {
            if doc.parent(style) != Some(head) {
                doc.append_child(head, style);
                mutated = true;
            }

            let result = self
                .css_rewriter
                .rewrite_style_node(doc, style, pass.base, pass.link_rewriter, true);
            mutated |= result.mutated;

            for import in result.imports {
                let mut attrs = vec![
                    ("rel".to_string(), "stylesheet".to_string()),
                    ("type".to_string(), "text/css".to_string()),
                    ("href".to_string(), import.href),
                ];
                if !import.media.is_empty() {
                    attrs.push(("media".to_string(), import.media));
                }
                let link = doc.create_element("link", attrs);
                doc.append_child(head, link);
                mutated = true;
            }
        }
        mutated
    }

    fn concat_stylesheets(&self, doc: &mut Document, pass: &Pass<'_>) -> bool {
        let links: Vec<NodeId> = doc
            .elements_by_tag("link")
            .into_iter()
            .filter(|&link| is_stylesheet_link(doc, link))
            .collect();

        let groups = media_groups(doc, &links, |link| {
            let href = doc.element(link)?.attr("href")?;
            let resolved = resolve_reference(pass.base, href)?;
            // Already served through an endpoint; leave it where it is
            (!pass.link_rewriter.is_proxied(&resolved)).then_some((link, resolved))
        });

        let mut mutated = false;
        for (media, group) in groups {
            if !group
                .iter()
                .all(|(_, uri)| uri.is_http() && pass.feature.should_rewrite_url(uri.as_str()))
            {
                log::debug!("Leaving stylesheet group {media:?} unbatched");
                continue;
            }
            mutated |= self.apply_batch(doc, pass, "href", &group, ConcatType::Css);
        }
        mutated
    }

    fn concat_scripts(&self, doc: &mut Document, pass: &Pass<'_>) -> bool {
        let scripts: Vec<NodeId> = doc
            .elements_by_tag("script")
            .into_iter()
            .filter(|&script| is_javascript(doc, script))
            .collect();

        let runs = script_runs(doc, &scripts, |script| {
            let src = doc.element(script)?.attr("src")?;
            let resolved = resolve_reference(pass.base, src)?;
            (resolved.is_http()
                && pass.feature.should_rewrite_url(resolved.as_str())
                && !pass.link_rewriter.is_proxied(&resolved))
            .then_some(resolved)
        });

        let mut mutated = false;
        for run in runs {
            if let ScriptRun::Group(group) = run {
                mutated |= self.apply_batch(doc, pass, "src", &group, ConcatType::Js);
            }
        }
        mutated
    }

    /// Point the group's elements at batch URLs, in order, and drop the
    /// elements left over when fewer URLs come back.
    fn apply_batch(
        &self,
        doc: &mut Document,
        pass: &Pass<'_>,
        attr: &str,
        group: &[(NodeId, Uri)],
        kind: ConcatType,
    ) -> bool {
        let targets: Vec<Uri> = group.iter().map(|(_, uri)| uri.clone()).collect();
        let batch_uris =
            self.concat
                .make_concat_uris(pass.target, pass.feature.expires_secs(), &targets, kind);
        if batch_uris.is_empty() {
            return false;
        }

        for (i, (node, _)) in group.iter().enumerate() {
            match batch_uris.get(i) {
                Some(uri) => {
                    if let Some(element) = doc.element_mut(*node) {
                        element.set_attr(attr, uri.as_str());
                    }
                }
                None => doc.detach(*node),
            }
        }
        log::debug!(
            "Batched {} {} reference(s) into {} URL(s)",
            group.len(),
            kind.as_param(),
            batch_uris.len()
        );
        true
    }
}

fn rewrite_leaves(doc: &mut Document, pass: &Pass<'_>) -> bool {
    let mut mutated = false;
    for tag in LEAF_TAGS {
        if !pass.feature.should_rewrite_tag(tag) {
            continue;
        }
        for node in doc.elements_by_tag(tag) {
            let Some(element) = doc.element_mut(node) else {
                continue;
            };
            let Some(src) = element.attr("src") else {
                continue;
            };
            let rewritten = pass.link_rewriter.rewrite(src, pass.base);
            if rewritten != src {
                element.set_attr("src", rewritten);
                mutated = true;
            }
        }
    }
    mutated
}

/// Resolve a tag reference; malformed ones are logged and skipped.
fn resolve_reference(base: &Uri, reference: &str) -> Option<Uri> {
    match base.resolve_str(reference.trim()) {
        Ok(resolved) => Some(resolved),
        Err(e) => {
            log::warn!("Skipping malformed reference {reference:?}: {e}");
            None
        }
    }
}

impl ContentRewriter for HtmlContentRewriter {
    fn rewrite(
        &self,
        ctx: &RewriteContext<'_>,
        content: &mut MutableContent,
    ) -> Result<bool, RewritingError> {
        Ok(self.rewrite_html(ctx.content_base(), &ctx.target(), ctx.content_type(), content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticFeatureConfigSource;

    fn rewriter(feature: RewriteFeatureConfig) -> HtmlContentRewriter {
        let source = StaticFeatureConfigSource::new(feature);
        HtmlContentRewriter::new(&RewriterConfig::default(), Arc::new(source), CssRewriter::default())
            .expect("default paths are valid")
    }

    fn run(rewriter: &HtmlContentRewriter, content_type: &str, html: &str) -> (bool, MutableContent) {
        let base = Uri::parse("http://x.test/page.html").expect("valid uri");
        let mut content = MutableContent::new(html);
        let mutated = rewriter.rewrite_html(&base, &RewriteTarget::default(), content_type, &mut content);
        (mutated, content)
    }

    #[test]
    fn test_non_html_is_never_parsed() {
        let rewriter = rewriter(RewriteFeatureConfig::default());
        let (mutated, content) = run(&rewriter, "text/plain", "<img src=a.png>");
        assert!(!mutated);
        assert!(!content.is_parsed());
    }

    #[test]
    fn test_disabled_feature_is_a_no_op() {
        let rewriter = rewriter(RewriteFeatureConfig::disabled());
        let (mutated, _) = run(&rewriter, "text/html", "<img src=a.png>");
        assert!(!mutated);
    }

    #[test]
    fn test_style_moves_into_head() {
        let feature = RewriteFeatureConfig::builder()
            .include_tags(["style"])
            .build()
            .expect("valid feature");
        let rewriter = rewriter(feature);
        let (mutated, mut content) = run(
            &rewriter,
            "text/html",
            "<html><head></head><body><style>p { color: red }</style></body></html>",
        );
        assert!(mutated);
        assert_eq!(
            content.content(),
            "<html><head><style>p { color: red }</style></head><body></body></html>"
        );
    }

    #[test]
    fn test_excluded_tag_leaves_images_alone() {
        let feature = RewriteFeatureConfig::builder()
            .include_tags(["script"])
            .build()
            .expect("valid feature");
        let rewriter = rewriter(feature);
        let (mutated, _) = run(&rewriter, "text/html", "<body><img src=a.png></body>");
        assert!(!mutated);
    }
}
