//! Shared configuration constants for the rewriting proxy
//!
//! This module contains default values and wire-level constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Path of the single-resource proxy endpoint.
pub const DEFAULT_PROXY_PATH: &str = "/gadgets/proxy";

/// Path of the batch (concatenation) endpoint.
pub const DEFAULT_CONCAT_PATH: &str = "/gadgets/concat";

/// Cache lifetime for versioned, immutable responses: one year
pub const DEFAULT_LONG_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Cache lifetime for everything that is not provably immutable: one hour
pub const DEFAULT_TTL_SECS: u64 = 60 * 60;

/// Default `refresh` hint written into proxied links: one day
pub const DEFAULT_EXPIRES_SECS: u64 = 24 * 60 * 60;

/// Longest concat URL emitted before a batch is split in two.
///
/// 2048 stays under the limits of every mainstream browser and proxy.
pub const DEFAULT_MAX_CONCAT_URL_LENGTH: usize = 2048;

/// Per-resource fetch timeout
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Maximum body size accepted from upstream (bytes)
///
/// Based on the 99th percentile of real-world CSS and JS bundles plus margin.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Sub-resource fetches in flight per batch request
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Parsed stylesheets kept in the process-wide CSS cache
///
/// 1,000 entries × ~20 KB per parsed sheet ≈ 20 MB
pub const DEFAULT_CSS_CACHE_CAPACITY: usize = 1000;

/// Lifetime of a cached parsed stylesheet
pub const DEFAULT_CSS_CACHE_TTL_SECS: u64 = 5 * 60;

/// Filename advertised in `Content-Disposition` for proxied and batched bodies.
pub const ATTACHMENT_FILENAME: &str = "p.txt";

/// User agent sent with upstream fetches
pub const PROXY_USER_AGENT: &str = concat!("kodegen-rewriter/", env!("CARGO_PKG_VERSION"));

/// Tags the HTML rewriter knows how to handle.
pub const REWRITABLE_TAGS: [&str; 5] = ["style", "link", "script", "img", "embed"];
