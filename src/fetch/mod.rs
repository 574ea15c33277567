//! Upstream resource fetching.
//!
//! The rewriters never talk to the network directly; everything goes through
//! a [`ResourceFetcher`]. Retries are the fetcher's business, not the core's.

mod reqwest_fetcher;

pub use reqwest_fetcher::ReqwestFetcher;

use futures::future::BoxFuture;
use reqwest::StatusCode;

use crate::http::{HttpRequest, HttpResponse};

/// Failure to obtain any response from upstream.
///
/// A response with a non-2xx status is *not* a `FetchError`; it is returned
/// as an ordinary [`HttpResponse`].
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Timed out fetching {url} after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("Transport failure fetching {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Body of {url} exceeds {limit} bytes")]
    BodyTooLarge { url: String, limit: usize },

    #[error("Cannot fetch '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

impl FetchError {
    /// Status reported for this failure when rendered to a client.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Transport { .. } | Self::BodyTooLarge { .. } => StatusCode::BAD_GATEWAY,
            Self::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url, .. }
            | Self::Transport { url, .. }
            | Self::BodyTooLarge { url, .. }
            | Self::InvalidUrl { url, .. } => url,
        }
    }
}

/// The narrow HTTP client interface the rewriting core depends on.
pub trait ResourceFetcher: Send + Sync {
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, FetchError>>;
}

impl<T: ResourceFetcher + ?Sized> ResourceFetcher for std::sync::Arc<T> {
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, FetchError>> {
        (**self).fetch(request)
    }
}
