//! Resource concatenation: batch URL format, output protocol and the
//! `/gadgets/concat` endpoint.

mod handler;
mod output;
mod uri_manager;

pub use handler::ConcatHandler;
pub use output::{js_escape, ConcatWriter, ItemError, OutputMode};
pub use uri_manager::{ConcatUri, ConcatUriError, ConcatUriManager, UriStatus};

pub(crate) use uri_manager::is_truthy;

/// Kind of resources in a batch; decides the response MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConcatType {
    Css,
    Js,
}

impl ConcatType {
    /// Value of the `type` query parameter.
    #[must_use]
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Js => "js",
        }
    }

    #[must_use]
    pub fn from_param(param: &str) -> Option<Self> {
        match param.trim().to_ascii_lowercase().as_str() {
            "css" => Some(Self::Css),
            "js" => Some(Self::Js),
            _ => None,
        }
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Css => "text/css",
            Self::Js => "text/javascript",
        }
    }
}
