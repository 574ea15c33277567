//! Loading and validating rewriter configuration

use kodegen_tools_rewriter::{
    ConfigError, FeatureConfigSource, RewriteFeatureConfig, RewriterConfig,
    StaticFeatureConfigSource,
};
use std::io::Write;
use std::time::Duration;

const CONFIG_JSON: &str = r#"{
    "proxy_path": "/p",
    "default_ttl_secs": 120,
    "fetch_timeout_secs": 3,
    "css_cache_capacity": 0,
    "default_feature": {
        "include-tags": ["link", "SCRIPT"],
        "exclude-urls": ["*.gif"]
    },
    "containers": {
        "locked": { "enabled": false }
    }
}"#;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(CONFIG_JSON.as_bytes()).expect("write config");

    let config = RewriterConfig::load(file.path()).expect("valid config");
    assert_eq!(config.proxy_path(), "/p");
    assert_eq!(config.concat_path(), "/gadgets/concat");
    assert_eq!(config.default_ttl_secs(), 120);
    assert_eq!(config.fetch_timeout(), Duration::from_secs(3));
    assert_eq!(config.css_cache_capacity(), 0);

    let feature = config.default_feature();
    assert!(feature.should_rewrite_tag("script"));
    assert!(!feature.should_rewrite_tag("img"));
    assert!(feature.should_rewrite_url("http://a.test/x.css"));
    assert!(!feature.should_rewrite_url("http://a.test/x.gif"));
    assert!(!config.feature_for("locked").enabled());
    assert!(config.feature_for("anything-else").enabled());
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = RewriterConfig::load(dir.path().join("absent.json")).expect_err("no such file");
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_unknown_tag_is_rejected() {
    let err = RewriteFeatureConfig::builder()
        .include_tags(["iframe"])
        .build()
        .expect_err("iframe is not rewritable");
    assert!(matches!(err, ConfigError::UnknownTag(ref tag) if tag == "iframe"));

    let err = RewriterConfig::from_json(r#"{"default_feature": {"include-tags": ["video"]}}"#)
        .expect_err("invalid nested feature");
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_glob_patterns_match_literally() {
    let feature = RewriteFeatureConfig::builder()
        .include_urls(["http://cdn.test/a+b/*"])
        .build()
        .expect("valid feature");
    assert!(feature.should_rewrite_url("http://cdn.test/a+b/x.js"));
    assert!(!feature.should_rewrite_url("http://cdn.test/aab/x.js"));
    assert!(!feature.should_rewrite_url("https://cdn.test/a+b/x.js"));
}

#[test]
fn test_fingerprint_tracks_settings() {
    let a = RewriteFeatureConfig::default();
    let b = RewriteFeatureConfig::default();
    let c = RewriteFeatureConfig::builder()
        .exclude_urls(["*.png"])
        .build()
        .expect("valid feature");
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_ne!(a.fingerprint(), c.fingerprint());
}

#[test]
fn test_source_built_from_config() {
    let config = RewriterConfig::from_json(CONFIG_JSON).expect("valid config");
    let source = StaticFeatureConfigSource::from(&config);
    assert!(!source.feature_config("locked", None).enabled());
    assert!(!source.feature_config("default", None).should_rewrite_tag("img"));
}
