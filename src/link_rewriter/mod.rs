//! Mapping of resource references onto the proxy endpoint.
//!
//! A [`LinkRewriter`] turns a reference found in markup or CSS into the string
//! that should replace it. [`ProxyingLinkRewriter`] routes fetchable links
//! through `/gadgets/proxy`; everything it cannot or must not proxy comes back
//! unchanged.

mod proxying;

pub use proxying::{ProxyingLinkRewriter, RewriteTarget};

use xxhash_rust::xxh3::Xxh3;

use crate::uri::Uri;

/// Maps an original reference, relative to `content_base`, to its replacement.
pub trait LinkRewriter: Send + Sync {
    fn rewrite(&self, link: &str, content_base: &Uri) -> String;
}

/// Stable hash over an ordered list of inputs.
///
/// Identical sequences always produce identical values; reordering changes
/// the result.
#[must_use]
pub fn fingerprint<I, S>(inputs: I) -> u64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Xxh3::new();
    for input in inputs {
        hasher.update(input.as_ref().as_bytes());
        hasher.update(b"\0");
    }
    hasher.digest()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_order_sensitive() {
        let ab = fingerprint(["http://a/1.js", "http://a/2.js"]);
        let ba = fingerprint(["http://a/2.js", "http://a/1.js"]);
        assert_eq!(ab, fingerprint(vec!["http://a/1.js".to_string(), "http://a/2.js".to_string()]));
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_fingerprint_separates_inputs() {
        assert_ne!(fingerprint(["ab", "c"]), fingerprint(["a", "bc"]));
    }
}
