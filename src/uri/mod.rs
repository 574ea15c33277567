//! Immutable URI value type and its mutable builder.
//!
//! `Uri` models an RFC 3986 URI reference in which every component is optional,
//! so relative references found in markup (`../a.css`, `//cdn/x.js`, `?v=2`)
//! survive parsing. Unlike `url::Url`, nothing is normalised on parse: the
//! canonical string is a pure function of the components, and equality and
//! hashing are defined over that string.
//!
//! Query parameters are a multimap. Keys and values are percent-decoded on
//! parse and form-encoded (`+` for space) on serialization.

mod builder;
mod query;
mod resolve;

pub use builder::UriBuilder;
pub use query::QueryParams;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

/// RFC 3986 Appendix B: splits any string into the five reference components.
static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(?:([^:/?#]+):)?(?://([^/?#]*))?([^?#]*)(?:\?([^#]*))?(?:#(.*))?$")
        .expect("REFERENCE_RE: hardcoded regex is valid")
});

static SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").expect("SCHEME_RE: hardcoded regex is valid")
});

/// Error raised when a string is not a syntactically valid URI reference.
///
/// Only scheme, authority and path problems are fatal; malformed query
/// segments are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UriError {
    #[error("Invalid URI scheme in '{input}'")]
    InvalidScheme { input: String },

    #[error("Illegal character {character:?} in {component} of '{input}'")]
    IllegalCharacter {
        input: String,
        component: &'static str,
        character: char,
    },

    #[error("Malformed percent-escape in {component} of '{input}'")]
    MalformedEscape {
        input: String,
        component: &'static str,
    },
}

impl UriError {
    /// Malformed URIs are always the client's fault.
    #[must_use]
    pub fn status(&self) -> reqwest::StatusCode {
        reqwest::StatusCode::BAD_REQUEST
    }
}

#[derive(Debug, Default)]
struct UriParts {
    scheme: Option<String>,
    authority: Option<String>,
    path: String,
    query: QueryParams,
    fragment: Option<String>,
}

/// An immutable, cheaply-cloneable URI reference.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uri {
    text: Arc<str>,
    parts: Arc<UriParts>,
}

impl Uri {
    /// Parse a URI reference.
    ///
    /// # Errors
    ///
    /// Returns [`UriError`] when the scheme is not RFC 3986 compliant or the
    /// authority/path contain characters that may never appear unescaped.
    pub fn parse(input: &str) -> Result<Self, UriError> {
        let input = input.trim();
        let caps = REFERENCE_RE
            .captures(input)
            .ok_or_else(|| UriError::InvalidScheme {
                input: input.to_string(),
            })?;

        let scheme = caps.get(1).map(|m| m.as_str());
        if let Some(scheme) = scheme
            && !SCHEME_RE.is_match(scheme)
        {
            return Err(UriError::InvalidScheme {
                input: input.to_string(),
            });
        }

        let authority = caps.get(2).map(|m| m.as_str());
        if let Some(authority) = authority {
            check_component(input, "authority", authority)?;
        }

        let path = caps.get(3).map_or("", |m| m.as_str());
        check_component(input, "path", path)?;

        let query = caps
            .get(4)
            .map(|m| QueryParams::parse(m.as_str()))
            .unwrap_or_default();

        Ok(Self::from_parts(UriParts {
            scheme: scheme.map(str::to_string),
            authority: authority.map(str::to_string),
            path: path.to_string(),
            query,
            fragment: caps.get(5).map(|m| m.as_str().to_string()),
        }))
    }

    fn from_parts(parts: UriParts) -> Self {
        let text = render(
            parts.scheme.as_deref(),
            parts.authority.as_deref(),
            &parts.path,
            &parts.query,
            parts.fragment.as_deref(),
        );
        Self {
            text: Arc::from(text),
            parts: Arc::new(parts),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.parts.scheme.as_deref()
    }

    #[must_use]
    pub fn authority(&self) -> Option<&str> {
        self.parts.authority.as_deref()
    }

    /// Host portion of the authority, without user info or port.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        let authority = self.authority()?;
        let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
        if host_port.starts_with('[') {
            return host_port.find(']').map(|end| &host_port[..=end]);
        }
        Some(host_port.split_once(':').map_or(host_port, |(h, _)| h))
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.parts.path
    }

    #[must_use]
    pub fn query(&self) -> &QueryParams {
        &self.parts.query
    }

    /// Encoded query string, or `None` when there are no parameters.
    #[must_use]
    pub fn query_string(&self) -> Option<String> {
        (!self.parts.query.is_empty()).then(|| self.parts.query.encode())
    }

    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.parts.fragment.as_deref()
    }

    /// First value of a (possibly repeated) query parameter.
    #[must_use]
    pub fn query_parameter(&self, name: &str) -> Option<&str> {
        self.parts.query.get(name)
    }

    /// All values of a query parameter, in insertion order.
    #[must_use]
    pub fn query_parameters(&self, name: &str) -> &[String] {
        self.parts.query.get_all(name)
    }

    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.parts.scheme.is_some()
    }

    /// Whether the scheme is one the proxy can fetch.
    #[must_use]
    pub fn is_http(&self) -> bool {
        self.scheme()
            .is_some_and(|s| s.eq_ignore_ascii_case("http") || s.eq_ignore_ascii_case("https"))
    }

    /// Resolve `relative` against this URI (RFC 3986 section 5.2).
    #[must_use]
    pub fn resolve(&self, relative: &Uri) -> Uri {
        resolve::resolve(self, relative)
    }

    /// Parse `relative` and resolve it against this URI.
    ///
    /// # Errors
    ///
    /// Returns [`UriError`] if `relative` does not parse.
    pub fn resolve_str(&self, relative: &str) -> Result<Uri, UriError> {
        Ok(self.resolve(&Uri::parse(relative)?))
    }

    /// Copy of this URI with the fragment removed.
    #[must_use]
    pub fn without_fragment(&self) -> Uri {
        if self.fragment().is_none() {
            return self.clone();
        }
        let mut builder = UriBuilder::from_uri(self);
        builder.set_fragment(None);
        builder.to_uri()
    }

    /// Convert to a `url::Url` for use with HTTP clients.
    ///
    /// # Errors
    ///
    /// Fails for relative references and anything `url` rejects.
    pub fn to_url(&self) -> Result<url::Url, url::ParseError> {
        url::Url::parse(self.as_str())
    }
}

/// Canonical serialization shared by `Uri` and `UriBuilder`.
pub(crate) fn render(
    scheme: Option<&str>,
    authority: Option<&str>,
    path: &str,
    query: &QueryParams,
    fragment: Option<&str>,
) -> String {
    let mut out = String::with_capacity(path.len() + 32);
    if let Some(scheme) = scheme {
        out.push_str(scheme);
        out.push(':');
    }
    if let Some(authority) = authority {
        out.push_str("//");
        out.push_str(authority);
        if !path.is_empty() && !path.starts_with('/') {
            out.push('/');
        }
    }
    out.push_str(path);
    if !query.is_empty() {
        out.push('?');
        out.push_str(&query.encode());
    }
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

fn check_component(input: &str, component: &'static str, value: &str) -> Result<(), UriError> {
    let bytes = value.as_bytes();
    for (i, c) in value.char_indices() {
        if c.is_control() || c.is_whitespace() || "<>\"{}|\\^`".contains(c) {
            return Err(UriError::IllegalCharacter {
                input: input.to_string(),
                component,
                character: c,
            });
        }
        if c == '%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(UriError::MalformedEscape {
                    input: input.to_string(),
                    component,
                });
            }
        }
    }
    Ok(())
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Uri").field(&&*self.text).finish()
    }
}

impl PartialEq for Uri {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Uri {}

impl Hash for Uri {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl FromStr for Uri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, UriError> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = UriError;

    fn try_from(s: String) -> Result<Self, UriError> {
        Self::parse(&s)
    }
}

impl TryFrom<&str> for Uri {
    type Error = UriError;

    fn try_from(s: &str) -> Result<Self, UriError> {
        Self::parse(s)
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> Self {
        uri.text.to_string()
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.text
    }
}
