//! Stylesheet parsing, caching and rewriting

mod common;

use common::uri;
use kodegen_tools_rewriter::dom::Document;
use kodegen_tools_rewriter::{
    CssCache, CssRewriter, CssStyleSheet, HtmlContentRewriter, LruCssCache, MutableContent,
    ProxyingLinkRewriter, RewriteFeatureConfig, RewriteTarget, RewriterConfig,
    StaticFeatureConfigSource,
};
use std::sync::Arc;
use std::time::Duration;

fn link_rewriter() -> ProxyingLinkRewriter {
    ProxyingLinkRewriter::new(
        uri("/gadgets/proxy"),
        Arc::new(RewriteFeatureConfig::default()),
        RewriteTarget::default(),
    )
}

#[test]
fn test_import_extracted_into_head_link() {
    let feature = RewriteFeatureConfig::builder()
        .include_tags(["style"])
        .build()
        .expect("valid feature");
    let rewriter = HtmlContentRewriter::new(
        &RewriterConfig::default(),
        Arc::new(StaticFeatureConfigSource::new(feature)),
        CssRewriter::default(),
    )
    .expect("default paths are valid");

    let mut content = MutableContent::new(
        "<html><head></head><body><style>@import url(/a.css);\nbody { background: url(/b.jpg) }</style></body></html>",
    );
    let mutated = rewriter.rewrite_html(
        &uri("http://x.test/page.html"),
        &RewriteTarget::default(),
        "text/html; charset=UTF-8",
        &mut content,
    );
    assert!(mutated);

    let doc = Document::parse(content.content());
    let head = doc.head().expect("head exists");
    let children: Vec<_> = doc
        .children(head)
        .into_iter()
        .filter_map(|c| doc.element(c).map(|e| e.name().to_string()))
        .collect();
    assert_eq!(children, ["style", "link"]);

    let link = doc.elements_by_tag("link")[0];
    let link = doc.element(link).expect("link element");
    assert_eq!(link.attr("rel"), Some("stylesheet"));
    let href = uri(link.attr("href").expect("href set"));
    assert_eq!(href.path(), "/gadgets/proxy");
    assert_eq!(href.query_parameter("url"), Some("http://x.test/a.css"));

    let style_text = doc.text_content(doc.elements_by_tag("style")[0]);
    assert!(!style_text.contains("@import"));
    assert!(style_text.contains("url(\"/gadgets/proxy?"));
    assert!(style_text.contains("http%3A%2F%2Fx.test%2Fb.jpg"));
}

#[test]
fn test_import_media_is_carried_to_link() {
    let mut doc = Document::parse("<style>@import url(print.css) print;</style>");
    let style = doc.elements_by_tag("style")[0];
    let result = CssRewriter::default().rewrite_style_node(
        &mut doc,
        style,
        &uri("http://x.test/"),
        &link_rewriter(),
        true,
    );
    assert_eq!(result.imports.len(), 1);
    assert_eq!(result.imports[0].media, "print");
}

#[test]
fn test_unmodified_sheet_serializes_identically() {
    let text = "/* keep */\n@media screen { a { color : red } }\n.x{}";
    let sheet = CssStyleSheet::parse(text).expect("valid css");
    assert_eq!(sheet.to_css(), text);
    assert_eq!(
        CssRewriter::default()
            .rewrite_stylesheet(text, &uri("http://x.test/"), &link_rewriter())
            .expect("valid css"),
        text
    );
}

#[test]
fn test_cache_returns_independent_copies() {
    let cache = LruCssCache::new(4, Some(Duration::from_secs(60)));
    let sheet = CssStyleSheet::parse("a { background: url(a.png) }").expect("valid css");
    cache.put(1, &sheet);

    let mut first = cache.get(1).expect("cached");
    for url in first.urls_mut() {
        url.set_value("changed.png".to_string());
    }
    assert!(first.is_modified());

    let second = cache.get(1).expect("still cached");
    assert!(!second.is_modified());
    assert_eq!(second.to_css(), "a { background: url(a.png) }");
}

#[test]
fn test_shared_cache_parses_identical_text_once() {
    let cache = Arc::new(LruCssCache::new(8, None));
    let rewriter = CssRewriter::new(cache.clone());
    let base = uri("http://x.test/");
    let text = "a { background: url(a.png) }";
    let first = rewriter
        .rewrite_stylesheet(text, &base, &link_rewriter())
        .expect("valid css");
    let second = rewriter
        .rewrite_stylesheet(text, &base, &link_rewriter())
        .expect("valid css");
    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_malformed_stylesheet_is_an_error_on_the_endpoint_path() {
    let err = CssRewriter::default()
        .rewrite_stylesheet("a { color: red } }", &uri("http://x.test/"), &link_rewriter())
        .expect_err("stray brace");
    assert_eq!(err.status(), reqwest::StatusCode::BAD_REQUEST);
}
