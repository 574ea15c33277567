//! Single-resource proxy endpoint and request routing

mod common;

use common::{MockFetcher, uri};
use kodegen_tools_rewriter::{
    HttpRequest, ResourceFetcher, RewriteFeatureConfig, RewriterConfig, RewritingProxy, UriBuilder,
};
use reqwest::StatusCode;
use reqwest::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use std::sync::Arc;

fn proxy_request(target: &str, extra: &[(&str, &str)]) -> HttpRequest {
    let mut builder = UriBuilder::from_uri(&uri("/gadgets/proxy"));
    for (name, value) in extra {
        builder.add_query_parameter(name, value);
    }
    builder.add_query_parameter("url", target);
    HttpRequest::get(builder.to_uri())
}

fn proxy_over(fetcher: Arc<MockFetcher>, config: &RewriterConfig) -> RewritingProxy {
    let fetcher: Arc<dyn ResourceFetcher> = fetcher;
    RewritingProxy::new(config, fetcher).expect("default paths are valid")
}

fn site() -> MockFetcher {
    MockFetcher::new()
        .with(
            "http://x.test/page.html",
            200,
            "text/html; charset=UTF-8",
            "<html><head></head><body><img src=\"logo.png\"></body></html>",
        )
        .with(
            "http://x.test/css/site.css",
            200,
            "text/css",
            "body { background: url(bg.png) }",
        )
        .with("http://x.test/broken.css", 200, "text/css", "a { } }")
        .with("http://x.test/notes.txt", 200, "text/plain", "<img src=a.png>")
        .with("http://x.test/a.js", 200, "text/javascript", "a();")
}

#[tokio::test]
async fn test_html_is_rewritten_and_served_as_attachment() {
    let proxy = proxy_over(Arc::new(site()), &RewriterConfig::default());
    let response = proxy
        .handle(&proxy_request("http://x.test/page.html", &[("container", "default")]))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header(CONTENT_TYPE), Some("text/html; charset=UTF-8"));
    assert_eq!(
        response.header(CONTENT_DISPOSITION),
        Some("attachment; filename=p.txt")
    );
    assert_eq!(response.header(CACHE_CONTROL), Some("public,max-age=3600"));
    assert!(response.body_text().contains("http%3A%2F%2Fx.test%2Flogo.png"));
}

#[tokio::test]
async fn test_stylesheet_rewritten_first_class() {
    let proxy = proxy_over(Arc::new(site()), &RewriterConfig::default());
    let response = proxy
        .handle(&proxy_request("http://x.test/css/site.css", &[("refresh", "600")]))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body_text().contains("http%3A%2F%2Fx.test%2Fcss%2Fbg.png"));
    assert_eq!(response.header(CACHE_CONTROL), Some("public,max-age=600"));
}

#[tokio::test]
async fn test_malformed_stylesheet_is_a_client_error() {
    let proxy = proxy_over(Arc::new(site()), &RewriterConfig::default());
    let response = proxy
        .handle(&proxy_request("http://x.test/broken.css", &[]))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_other_content_passes_through() {
    let proxy = proxy_over(Arc::new(site()), &RewriterConfig::default());
    let response = proxy
        .handle(&proxy_request("http://x.test/notes.txt", &[("nocache", "1")]))
        .await;

    assert_eq!(response.body_text(), "<img src=a.png>");
    assert_eq!(response.header(CONTENT_TYPE), Some("text/plain"));
    assert_eq!(response.header(CACHE_CONTROL), Some("no-cache"));
}

#[tokio::test]
async fn test_disabled_container_serves_original() {
    let config = RewriterConfig::default().with_container("raw", RewriteFeatureConfig::disabled());
    let proxy = proxy_over(Arc::new(site()), &config);
    let response = proxy
        .handle(&proxy_request("http://x.test/page.html", &[("container", "raw")]))
        .await;
    assert!(response.body_text().contains("<img src=\"logo.png\">"));
}

#[tokio::test]
async fn test_missing_or_invalid_url_is_rejected() {
    let fetcher = Arc::new(site());
    let proxy = proxy_over(fetcher.clone(), &RewriterConfig::default());

    let missing = proxy
        .handle(&HttpRequest::get(uri("/gadgets/proxy?container=default")))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    for bad in ["relative/path.css", "ftp://x.test/file", "http://x.test/has space"] {
        let response = proxy.handle(&proxy_request(bad, &[])).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{bad}");
    }
    assert!(fetcher.requested().is_empty());
}

#[tokio::test]
async fn test_upstream_errors_pass_through() {
    let proxy = proxy_over(Arc::new(site()), &RewriterConfig::default());
    let response = proxy
        .handle(&proxy_request("http://x.test/missing.css", &[]))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let failing = proxy_over(
        Arc::new(MockFetcher::new().with_failure("http://x.test/down.js")),
        &RewriterConfig::default(),
    );
    let response = failing
        .handle(&proxy_request("http://x.test/down.js", &[]))
        .await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_upstream_request_carries_identity() {
    let fetcher = Arc::new(site());
    let proxy = proxy_over(fetcher.clone(), &RewriterConfig::default());
    proxy
        .handle(&proxy_request(
            "http://x.test/a.js",
            &[
                ("container", "shell"),
                ("gadget", "http://x.test/g.xml"),
                ("nocache", "1"),
            ],
        ))
        .await;

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].container, "shell");
    assert_eq!(
        requests[0].gadget.as_ref().map(|g| g.as_str()),
        Some("http://x.test/g.xml")
    );
    assert!(requests[0].ignore_cache);
}

#[tokio::test]
async fn test_routing_by_path() {
    let proxy = proxy_over(Arc::new(site()), &RewriterConfig::default());
    let batch = proxy
        .handle(&HttpRequest::get(uri(
            "/gadgets/concat?type=js&1=http%3A%2F%2Fx.test%2Fa.js",
        )))
        .await;
    assert!(batch.body_text().starts_with("/* ---- Start http://x.test/a.js ---- */"));

    let single = proxy
        .handle(&proxy_request("http://x.test/a.js", &[]))
        .await;
    assert_eq!(single.body_text(), "a();");
}
