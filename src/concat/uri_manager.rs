//! Building and parsing `/gadgets/concat` URLs.
//!
//! A batch URL lists its resources under the integer keys `1, 2, 3, ...` and
//! carries the same identity parameters as a proxy URL plus `type`, and
//! optionally `json` (split-output token) and `v` (version fingerprint).

use regex::Regex;
use std::sync::LazyLock;

use super::ConcatType;
use crate::link_rewriter::{fingerprint, RewriteTarget};
use crate::uri::{Uri, UriBuilder};
use crate::utils::DEFAULT_MAX_CONCAT_URL_LENGTH;

static JSON_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]*$").expect("JSON_TOKEN_RE: hardcoded regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConcatUriError {
    #[error("Missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("Unknown concat type '{0}' (expected css or js)")]
    UnknownType(String),

    #[error("Invalid json token '{0}': only letters, digits and '_' are allowed")]
    InvalidJsonToken(String),

    #[error("Parameter {index} is not an absolute http(s) URL: {url}")]
    BadTarget { index: usize, url: String },
}

impl ConcatUriError {
    /// Every malformed batch request is a client error.
    #[must_use]
    pub fn status(&self) -> reqwest::StatusCode {
        reqwest::StatusCode::BAD_REQUEST
    }
}

/// Freshness class of a parsed batch URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriStatus {
    /// `v` matches the fingerprint of the target list.
    ValidVersioned,
    /// `v` is present but stale.
    InvalidVersion,
    /// No `v` parameter.
    ValidUnversioned,
}

/// A parsed batch request.
#[derive(Debug, Clone)]
pub struct ConcatUri {
    kind: ConcatType,
    targets: Vec<Uri>,
    json: Option<String>,
    target: RewriteTarget,
    refresh: Option<u64>,
    status: UriStatus,
}

impl ConcatUri {
    #[must_use]
    pub fn kind(&self) -> ConcatType {
        self.kind
    }

    /// Resources in request order, duplicates removed.
    #[must_use]
    pub fn targets(&self) -> &[Uri] {
        &self.targets
    }

    /// Split-output token; `Some` selects JSON mode.
    #[must_use]
    pub fn json(&self) -> Option<&str> {
        self.json.as_deref()
    }

    #[must_use]
    pub fn target(&self) -> &RewriteTarget {
        &self.target
    }

    #[must_use]
    pub fn status(&self) -> UriStatus {
        self.status
    }

    #[must_use]
    pub fn refresh(&self) -> Option<u64> {
        self.refresh
    }

    /// Cache lifetime (seconds) for the batch response.
    ///
    /// `nocache` gives 0, a valid version gives `long_ttl`, anything else the
    /// explicit `refresh` parameter or else `default_ttl`.
    #[must_use]
    pub fn translate_status_refresh(&self, long_ttl: u64, default_ttl: u64) -> u64 {
        if self.target.nocache {
            return 0;
        }
        match self.status {
            UriStatus::ValidVersioned => long_ttl,
            UriStatus::InvalidVersion | UriStatus::ValidUnversioned => {
                self.refresh.unwrap_or(default_ttl)
            }
        }
    }
}

/// Builds batch URLs for the HTML rewriter and parses them for the handler.
#[derive(Debug, Clone)]
pub struct ConcatUriManager {
    concat_base: Uri,
    max_url_length: usize,
    versioned: bool,
}

impl ConcatUriManager {
    #[must_use]
    pub fn new(concat_base: Uri) -> Self {
        Self {
            concat_base,
            max_url_length: DEFAULT_MAX_CONCAT_URL_LENGTH,
            versioned: false,
        }
    }

    #[must_use]
    pub fn with_max_url_length(mut self, max_url_length: usize) -> Self {
        self.max_url_length = max_url_length;
        self
    }

    /// Stamp generated URLs with `v=<fingerprint>` so they cache long-term.
    #[must_use]
    pub fn with_versioning(mut self, versioned: bool) -> Self {
        self.versioned = versioned;
        self
    }

    #[must_use]
    pub fn concat_base(&self) -> &Uri {
        &self.concat_base
    }

    /// Pack `targets`, in order, into as few batch URLs as fit the length
    /// limit. A single target longer than the limit still gets its own URL.
    #[must_use]
    pub fn make_concat_uris(
        &self,
        target: &RewriteTarget,
        refresh: Option<u64>,
        targets: &[Uri],
        kind: ConcatType,
    ) -> Vec<Uri> {
        let mut out = Vec::new();
        let mut batch: Vec<&Uri> = Vec::new();
        let mut current: Option<Uri> = None;

        for uri in targets {
            batch.push(uri);
            let candidate = self.build(target, refresh, &batch, kind);
            if candidate.as_str().len() > self.max_url_length && batch.len() > 1 {
                // Close the batch without this target and start a new one
                batch.pop();
                if let Some(full) = current.take() {
                    out.push(full);
                }
                batch.clear();
                batch.push(uri);
                current = Some(self.build(target, refresh, &batch, kind));
            } else {
                current = Some(candidate);
            }
        }
        out.extend(current);

        log::debug!(
            "Packed {} {} targets into {} concat URL(s)",
            targets.len(),
            kind.as_param(),
            out.len()
        );
        out
    }

    fn build(
        &self,
        target: &RewriteTarget,
        refresh: Option<u64>,
        batch: &[&Uri],
        kind: ConcatType,
    ) -> Uri {
        let mut builder = UriBuilder::from_uri(&self.concat_base);
        builder.add_query_parameter("container", &target.container);
        if let Some(gadget) = &target.gadget {
            builder.add_query_parameter("gadget", gadget.as_str());
        }
        builder
            .add_query_parameter("debug", if target.debug { "1" } else { "0" })
            .add_query_parameter("nocache", if target.nocache { "1" } else { "0" });
        if !target.nocache
            && let Some(refresh) = refresh
        {
            builder.add_query_parameter("refresh", &refresh.to_string());
        }
        builder.add_query_parameter("type", kind.as_param());
        if self.versioned && !target.nocache {
            let version = fingerprint(batch.iter().map(|u| u.as_str()));
            builder.add_query_parameter("v", &version.to_string());
        }
        for (i, uri) in batch.iter().enumerate() {
            builder.add_query_parameter(&(i + 1).to_string(), uri.as_str());
        }
        builder.to_uri()
    }

    /// Parse a batch request URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConcatUriError`] when `type` is missing or unknown, the
    /// `json` token is malformed, there are no targets, or a target is not an
    /// absolute http(s) URL.
    pub fn process(&self, uri: &Uri) -> Result<ConcatUri, ConcatUriError> {
        let kind_param = uri
            .query_parameter("type")
            .ok_or_else(|| ConcatUriError::MissingParameter("type".to_string()))?;
        let kind = ConcatType::from_param(kind_param)
            .ok_or_else(|| ConcatUriError::UnknownType(kind_param.to_string()))?;

        let json = uri.query_parameter("json").map(str::to_string);
        if let Some(token) = &json
            && !JSON_TOKEN_RE.is_match(token)
        {
            return Err(ConcatUriError::InvalidJsonToken(token.clone()));
        }

        let mut targets: Vec<Uri> = Vec::new();
        for index in 1.. {
            let Some(raw) = uri.query_parameter(&index.to_string()) else {
                break;
            };
            let bad = || ConcatUriError::BadTarget {
                index,
                url: raw.to_string(),
            };
            let target = Uri::parse(raw).map_err(|_| bad())?;
            if !target.is_http() || target.authority().is_none() {
                return Err(bad());
            }
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        if targets.is_empty() {
            return Err(ConcatUriError::MissingParameter("1".to_string()));
        }

        let status = match uri.query_parameter("v") {
            None => UriStatus::ValidUnversioned,
            Some(v) if v == fingerprint(targets.iter().map(Uri::as_str)).to_string() => {
                UriStatus::ValidVersioned
            }
            Some(_) => UriStatus::InvalidVersion,
        };

        let target = RewriteTarget {
            container: uri
                .query_parameter("container")
                .unwrap_or("default")
                .to_string(),
            gadget: uri.query_parameter("gadget").and_then(|g| Uri::parse(g).ok()),
            debug: is_truthy(uri.query_parameter("debug")),
            nocache: is_truthy(uri.query_parameter("nocache")),
        };

        Ok(ConcatUri {
            kind,
            targets,
            json,
            target,
            refresh: uri.query_parameter("refresh").and_then(|r| r.parse().ok()),
            status,
        })
    }
}

pub(crate) fn is_truthy(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConcatUriManager {
        ConcatUriManager::new(Uri::parse("http://proxy.test/gadgets/concat").expect("valid uri"))
    }

    fn uris(list: &[&str]) -> Vec<Uri> {
        list.iter()
            .map(|s| Uri::parse(s).expect("valid uri"))
            .collect()
    }

    fn identity() -> RewriteTarget {
        RewriteTarget {
            container: "shell".to_string(),
            ..RewriteTarget::default()
        }
    }

    #[test]
    fn test_make_then_process_preserves_targets() {
        let targets = uris(&["http://a.test/1.js", "http://a.test/2.js"]);
        let made = manager().make_concat_uris(&identity(), None, &targets, ConcatType::Js);
        assert_eq!(made.len(), 1);
        assert_eq!(
            made[0].as_str(),
            "http://proxy.test/gadgets/concat?container=shell&debug=0&nocache=0&type=js\
             &1=http%3A%2F%2Fa.test%2F1.js&2=http%3A%2F%2Fa.test%2F2.js"
        );

        let parsed = manager().process(&made[0]).expect("valid batch");
        assert_eq!(parsed.targets(), &targets[..]);
        assert_eq!(parsed.kind(), ConcatType::Js);
        assert_eq!(parsed.status(), UriStatus::ValidUnversioned);
    }

    #[test]
    fn test_long_batches_are_split_in_order() {
        let targets: Vec<Uri> = (0..10)
            .map(|i| Uri::parse(&format!("http://a.test/{}/{i}.css", "x".repeat(40))).expect("valid uri"))
            .collect();
        let manager = manager().with_max_url_length(300);
        let made = manager.make_concat_uris(&identity(), None, &targets, ConcatType::Css);
        assert!(made.len() > 1);

        let mut seen = Vec::new();
        for uri in &made {
            assert!(uri.as_str().len() <= 300);
            seen.extend(manager.process(uri).expect("valid batch").targets().to_vec());
        }
        assert_eq!(seen, targets);
    }

    #[test]
    fn test_versioned_urls_round_trip() {
        let manager = manager().with_versioning(true);
        let targets = uris(&["http://a.test/1.css"]);
        let made = manager.make_concat_uris(&identity(), Some(60), &targets, ConcatType::Css);
        let parsed = manager.process(&made[0]).expect("valid batch");
        assert_eq!(parsed.status(), UriStatus::ValidVersioned);
        assert_eq!(parsed.translate_status_refresh(1000, 10), 1000);

        let mut stale = UriBuilder::from_uri(&made[0]);
        stale.put_query_parameter("v", "1");
        let parsed = manager.process(&stale.to_uri()).expect("valid batch");
        assert_eq!(parsed.status(), UriStatus::InvalidVersion);
        assert_eq!(parsed.translate_status_refresh(1000, 10), 60);
    }

    #[test]
    fn test_process_dedupes_in_order() {
        let uri = Uri::parse(
            "/gadgets/concat?type=css&1=http%3A%2F%2Fa%2Fx.css&2=http%3A%2F%2Fa%2Fy.css&3=http%3A%2F%2Fa%2Fx.css&nocache=1",
        )
        .expect("valid uri");
        let parsed = manager().process(&uri).expect("valid batch");
        let targets: Vec<&str> = parsed.targets().iter().map(Uri::as_str).collect();
        assert_eq!(targets, vec!["http://a/x.css", "http://a/y.css"]);
        assert_eq!(parsed.translate_status_refresh(1000, 10), 0);
    }

    #[test]
    fn test_process_rejects_malformed_requests() {
        let cases = [
            ("/gadgets/concat?1=http%3A%2F%2Fa%2Fx.css", ConcatUriError::MissingParameter("type".into())),
            ("/gadgets/concat?type=png&1=http%3A%2F%2Fa%2Fx", ConcatUriError::UnknownType("png".into())),
            ("/gadgets/concat?type=js&json=a-b&1=http%3A%2F%2Fa%2Fx", ConcatUriError::InvalidJsonToken("a-b".into())),
            ("/gadgets/concat?type=js", ConcatUriError::MissingParameter("1".into())),
            (
                "/gadgets/concat?type=js&1=javascript%3Aalert(1)",
                ConcatUriError::BadTarget { index: 1, url: "javascript:alert(1)".into() },
            ),
        ];
        for (raw, expected) in cases {
            let uri = Uri::parse(raw).expect("valid uri");
            assert_eq!(manager().process(&uri).expect_err(raw), expected);
        }
    }
}
