//! Memoization of uploaded document references.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use super::error::DocumentError;

/// Longest entry lifetime accepted by `with_ttl`; longer values are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Maps local document paths to provider reference URLs.
///
/// Lookups are single-flight per path: when several threads ask for the same
/// uncached path, one of them runs the upload and the others block until it
/// finishes and then share its result. A failed upload stores nothing, so the
/// next call tries again.
///
/// Without a TTL, entries live as long as the cache. With a TTL, an entry
/// older than the TTL is dropped and the next lookup uploads again.
#[derive(Clone)]
pub struct DocumentCache {
    inner: Cache<PathBuf, String>,
    ttl: Option<Duration>,
}

impl DocumentCache {
    /// Creates an empty cache whose entries never expire.
    pub fn new() -> Self {
        Self {
            inner: Cache::builder().build(),
            ttl: None,
        }
    }

    /// Creates an empty cache whose entries expire `ttl` after insertion.
    ///
    /// `ttl` is capped at `MAX_TTL`.
    pub fn with_ttl(ttl: Duration) -> Self {
        let ttl = ttl.min(MAX_TTL);
        Self {
            inner: Cache::builder().time_to_live(ttl).build(),
            ttl: Some(ttl),
        }
    }

    /// Returns the configured entry lifetime, if any.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the cached reference for `path`, if present.
    pub fn get(&self, path: &Path) -> Option<String> {
        self.inner.get(path)
    }

    /// Returns true if `path` has a cached reference.
    pub fn contains(&self, path: &Path) -> bool {
        self.inner.contains_key(path)
    }

    /// Returns the reference for `path`, running `upload` on a miss.
    ///
    /// Concurrent callers for the same path wait for the single in-flight
    /// `upload` instead of starting their own. The error is shared between
    /// all waiters of a failed attempt.
    pub fn get_or_upload<F>(&self, path: &Path, upload: F) -> Result<String, Arc<DocumentError>>
    where
        F: FnOnce() -> Result<String, DocumentError>,
    {
        self.inner.try_get_with(path.to_path_buf(), upload)
    }

    /// Number of cached references.
    pub fn len(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DocumentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCache")
            .field("entries", &self.inner.entry_count())
            .field("ttl", &self.ttl)
            .finish()
    }
}
