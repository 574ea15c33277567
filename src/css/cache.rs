//! Content-addressed cache of parsed stylesheets.
//!
//! Keys are the xxh3 hash of the stylesheet text. Entries are handed out as
//! clones, so a caller rewriting its copy never touches the cached tree.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use xxhash_rust::xxh3::xxh3_64;

use super::stylesheet::CssStyleSheet;

/// Cache key for a stylesheet body.
#[must_use]
pub fn content_hash(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

pub trait CssCache: Send + Sync {
    /// An independent copy of the cached sheet, if present and fresh.
    fn get(&self, key: u64) -> Option<CssStyleSheet>;

    fn put(&self, key: u64, sheet: &CssStyleSheet);
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCssCache;

impl CssCache for NoCssCache {
    fn get(&self, _key: u64) -> Option<CssStyleSheet> {
        None
    }

    fn put(&self, _key: u64, _sheet: &CssStyleSheet) {}
}

struct CachedSheet {
    sheet: CssStyleSheet,
    inserted: Instant,
}

/// Bounded LRU with an optional time-to-live, safe to share across tasks.
pub struct LruCssCache {
    entries: Mutex<LruCache<u64, CachedSheet>>,
    ttl: Option<Duration>,
}

impl LruCssCache {
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for LruCssCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCssCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl CssCache for LruCssCache {
    fn get(&self, key: u64) -> Option<CssStyleSheet> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(&key) {
            None => return None,
            Some(entry) => self.ttl.is_some_and(|ttl| entry.inserted.elapsed() > ttl),
        };
        if expired {
            entries.pop(&key);
            log::trace!("CSS cache entry {key:016x} expired");
            return None;
        }
        entries.get(&key).map(|entry| entry.sheet.clone())
    }

    fn put(&self, key: u64, sheet: &CssStyleSheet) {
        let evicted = self.entries.lock().push(
            key,
            CachedSheet {
                sheet: sheet.clone(),
                inserted: Instant::now(),
            },
        );
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            log::trace!("CSS cache at capacity, evicted {evicted_key:016x}");
        }
    }
}
