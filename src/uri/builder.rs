//! Mutable constructor for [`Uri`].

use std::fmt;

use super::{QueryParams, Uri, UriParts, render};

/// Mutable working copy of a URI.
///
/// Setters return `&mut Self` for chaining. [`UriBuilder::to_uri`] takes a
/// snapshot and can be called any number of times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriBuilder {
    scheme: Option<String>,
    authority: Option<String>,
    path: String,
    query: QueryParams,
    fragment: Option<String>,
}

impl UriBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_uri(uri: &Uri) -> Self {
        let parts = &uri.parts;
        Self {
            scheme: parts.scheme.clone(),
            authority: parts.authority.clone(),
            path: parts.path.clone(),
            query: parts.query.clone(),
            fragment: parts.fragment.clone(),
        }
    }

    pub fn set_scheme(&mut self, scheme: Option<&str>) -> &mut Self {
        self.scheme = scheme.map(str::to_string);
        self
    }

    pub fn set_authority(&mut self, authority: Option<&str>) -> &mut Self {
        self.authority = authority.map(str::to_string);
        self
    }

    pub fn set_path(&mut self, path: &str) -> &mut Self {
        self.path = path.to_string();
        self
    }

    /// Replace the whole query with a raw (encoded) query string.
    pub fn set_query(&mut self, raw: Option<&str>) -> &mut Self {
        self.query = raw.map(QueryParams::parse).unwrap_or_default();
        self
    }

    pub fn set_fragment(&mut self, fragment: Option<&str>) -> &mut Self {
        self.fragment = fragment.map(str::to_string);
        self
    }

    pub fn add_query_parameter(&mut self, name: &str, value: &str) -> &mut Self {
        self.query.append(name, value);
        self
    }

    pub fn add_query_parameters<'a, I>(&mut self, params: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in params {
            self.query.append(name, value);
        }
        self
    }

    /// Set a parameter to a single value, replacing any existing values.
    pub fn put_query_parameter(&mut self, name: &str, value: &str) -> &mut Self {
        self.query.set(name, value);
        self
    }

    pub fn remove_query_parameter(&mut self, name: &str) -> &mut Self {
        self.query.remove(name);
        self
    }

    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    #[must_use]
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    #[must_use]
    pub fn query_parameter(&self, name: &str) -> Option<&str> {
        self.query.get(name)
    }

    #[must_use]
    pub fn query_parameters(&self, name: &str) -> &[String] {
        self.query.get_all(name)
    }

    #[must_use]
    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Immutable snapshot of the current state.
    #[must_use]
    pub fn to_uri(&self) -> Uri {
        Uri::from_parts(UriParts {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
            fragment: self.fragment.clone(),
        })
    }
}

impl From<&Uri> for UriBuilder {
    fn from(uri: &Uri) -> Self {
        Self::from_uri(uri)
    }
}

impl fmt::Display for UriBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(
            self.scheme.as_deref(),
            self.authority.as_deref(),
            &self.path,
            &self.query,
            self.fragment.as_deref(),
        ))
    }
}
