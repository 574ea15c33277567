//! Request and response values passed between the fetcher, the rewriters
//! and the endpoint handlers.
//!
//! Status codes, methods and header maps are `reqwest`'s own types, so a
//! fetched response flows into the rewrite chain without conversion.

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE,
};
use reqwest::{Method, StatusCode};

use crate::uri::Uri;
use crate::utils::ATTACHMENT_FILENAME;

/// One inbound or outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub uri: Uri,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Embedding application that selects the feature profile.
    pub container: String,
    /// Top-level document the request was made on behalf of.
    pub gadget: Option<Uri>,
    pub ignore_cache: bool,
    pub debug: bool,
}

impl HttpRequest {
    /// A `GET` for `uri` in the default container.
    #[must_use]
    pub fn get(uri: Uri) -> Self {
        Self {
            uri,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: Vec::new(),
            container: "default".to_string(),
            gadget: None,
            ignore_cache: false,
            debug: false,
        }
    }

    #[must_use]
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    #[must_use]
    pub fn with_gadget(mut self, gadget: Option<Uri>) -> Self {
        self.gadget = gadget;
        self
    }

    #[must_use]
    pub fn with_ignore_cache(mut self, ignore_cache: bool) -> Self {
        self.ignore_cache = ignore_cache;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Add a header, silently skipping names or values that are not valid HTTP.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Derive a sub-request for `uri` that keeps this request's identity
    /// (container, gadget, cache and debug flags) but none of its headers.
    #[must_use]
    pub fn sub_request(&self, uri: Uri) -> Self {
        Self {
            uri,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: Vec::new(),
            container: self.container.clone(),
            gadget: self.gadget.clone(),
            ignore_cache: self.ignore_cache,
            debug: self.debug,
        }
    }

    #[must_use]
    pub fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Base against which relative references in the fetched body resolve.
    #[must_use]
    pub fn content_base(&self) -> &Uri {
        &self.uri
    }
}

/// A response body with its status and headers.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Plain-text error response.
    #[must_use]
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, "text/plain; charset=UTF-8")
            .with_body(message.as_bytes().to_vec())
    }

    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Replace a header. Invalid values are dropped.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(e) => log::warn!("Dropping invalid {name} header value {value:?}: {e}"),
        }
    }

    #[must_use]
    pub fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `Cache-Control` for a lifetime in seconds; zero disables caching.
    pub fn set_cache_ttl(&mut self, ttl_secs: u64) {
        let value = if ttl_secs == 0 {
            "no-cache".to_string()
        } else {
            format!("public,max-age={ttl_secs}")
        };
        self.set_header(CACHE_CONTROL, &value);
    }

    /// Force download so proxied bodies are never rendered in our origin.
    pub fn set_attachment(&mut self) {
        self.set_header(
            CONTENT_DISPOSITION,
            &format!("attachment; filename={ATTACHMENT_FILENAME}"),
        );
    }

    /// Raw `Content-Type` header, empty when absent.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.header(CONTENT_TYPE).unwrap_or_default()
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_request_keeps_identity() {
        let gadget = Uri::parse("http://example.com/g.html").expect("valid uri");
        let request = HttpRequest::get(gadget.clone())
            .with_container("shell")
            .with_gadget(Some(gadget))
            .with_ignore_cache(true)
            .with_header("If-Modified-Since", "yesterday");

        let sub = request.sub_request(Uri::parse("http://example.com/a.css").expect("valid uri"));
        assert_eq!(sub.container, "shell");
        assert!(sub.ignore_cache);
        assert!(sub.gadget.is_some());
        assert!(sub.headers.is_empty());
    }

    #[test]
    fn test_cache_ttl_header() {
        let mut response = HttpResponse::ok("x");
        response.set_cache_ttl(0);
        assert_eq!(response.header(CACHE_CONTROL), Some("no-cache"));
        response.set_cache_ttl(60);
        assert_eq!(response.header(CACHE_CONTROL), Some("public,max-age=60"));
    }

    #[test]
    fn test_content_type_defaults_to_empty() {
        let response = HttpResponse::ok("x");
        assert_eq!(response.content_type(), "");
        let response = response.with_header(CONTENT_TYPE, "text/css");
        assert_eq!(response.content_type(), "text/css");
    }
}
