use std::sync::Arc;

use super::LinkRewriter;
use crate::config::RewriteFeatureConfig;
use crate::http::HttpRequest;
use crate::uri::{Uri, UriBuilder};
use crate::utils::is_proxyable_link;

/// Request identity carried into every proxied link.
#[derive(Debug, Clone, Default)]
pub struct RewriteTarget {
    pub container: String,
    pub gadget: Option<Uri>,
    pub debug: bool,
    pub nocache: bool,
}

impl From<&HttpRequest> for RewriteTarget {
    fn from(request: &HttpRequest) -> Self {
        Self {
            container: request.container.clone(),
            gadget: request.gadget.clone(),
            debug: request.debug,
            nocache: request.ignore_cache,
        }
    }
}

/// Rewrites fetchable links to
/// `<proxy>?container=..&gadget=..&debug=..&nocache=..[&refresh=..][&fp=..]&url=..`.
#[derive(Debug, Clone)]
pub struct ProxyingLinkRewriter {
    proxy_base: Uri,
    concat_base: Option<Uri>,
    feature: Arc<RewriteFeatureConfig>,
    target: RewriteTarget,
}

impl ProxyingLinkRewriter {
    #[must_use]
    pub fn new(proxy_base: Uri, feature: Arc<RewriteFeatureConfig>, target: RewriteTarget) -> Self {
        Self {
            proxy_base,
            concat_base: None,
            feature,
            target,
        }
    }

    /// Also treat links into the concat endpoint as already proxied.
    #[must_use]
    pub fn with_concat_base(mut self, concat_base: Uri) -> Self {
        self.concat_base = Some(concat_base);
        self
    }

    #[must_use]
    pub fn feature(&self) -> &RewriteFeatureConfig {
        &self.feature
    }

    #[must_use]
    pub fn target(&self) -> &RewriteTarget {
        &self.target
    }

    /// Whether `uri` already addresses one of our own endpoints: a proxy link
    /// carries `url`, a batch link carries `type`.
    #[must_use]
    pub fn is_proxied(&self, uri: &Uri) -> bool {
        std::iter::once((&self.proxy_base, "url"))
            .chain(self.concat_base.as_ref().map(|base| (base, "type")))
            .any(|(endpoint, marker)| {
                same_endpoint(endpoint, uri) && uri.query_parameter(marker).is_some()
            })
    }

    /// Build the proxy URL for an already-resolved absolute target.
    #[must_use]
    pub fn proxy_uri(&self, resolved: &Uri) -> Uri {
        let mut builder = UriBuilder::from_uri(&self.proxy_base);
        builder.add_query_parameter("container", &self.target.container);
        if let Some(gadget) = &self.target.gadget {
            builder.add_query_parameter("gadget", gadget.as_str());
        }
        builder
            .add_query_parameter("debug", flag(self.target.debug))
            .add_query_parameter("nocache", flag(self.target.nocache));
        if !self.target.nocache
            && let Some(expires) = self.feature.expires_secs()
        {
            builder.add_query_parameter("refresh", &expires.to_string());
        }
        if self.feature.fingerprint() != 0 {
            builder.add_query_parameter("fp", &self.feature.fingerprint().to_string());
        }
        builder.add_query_parameter("url", resolved.as_str());
        builder.to_uri()
    }
}

impl LinkRewriter for ProxyingLinkRewriter {
    fn rewrite(&self, link: &str, content_base: &Uri) -> String {
        if !is_proxyable_link(link) {
            return link.to_string();
        }

        let resolved = match content_base.resolve_str(link) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::warn!("Leaving unresolvable link {link:?} unchanged: {e}");
                return link.to_string();
            }
        };

        if !resolved.is_http()
            || !self.feature.should_rewrite_url(resolved.as_str())
            || self.is_proxied(&resolved)
        {
            return link.to_string();
        }

        self.proxy_uri(&resolved).to_string()
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Same path, and same authority when the endpoint names one.
fn same_endpoint(endpoint: &Uri, uri: &Uri) -> bool {
    if endpoint.path() != uri.path() {
        return false;
    }
    match endpoint.authority() {
        Some(authority) => uri
            .authority()
            .is_some_and(|a| a.eq_ignore_ascii_case(authority)),
        None => true,
    }
}
