//! CORS configuration cache invalidation.
//!
//! The authoritative CORS rules for a bucket live on [`crate::state::bucket::S3Bucket`];
//! evaluating a preflight request against them is handled by the HTTP-facing
//! collaborator that terminates the actual `OPTIONS` exchange, not by this
//! engine. What the engine does own is telling that collaborator when its
//! cached view of a bucket's rules has gone stale: on every
//! `PutBucketCors`/`DeleteBucketCors` and on bucket create/delete.

use dashmap::DashSet;

/// Tracks which buckets have a cached CORS configuration that is still
/// considered fresh. Any bucket-level CORS mutation calls
/// [`invalidate_cache`](Self::invalidate_cache) for that bucket so a
/// subsequent lookup by the HTTP layer re-reads the authoritative rules.
#[derive(Debug, Default)]
pub struct CorsIndex {
    fresh: DashSet<String>,
}

impl CorsIndex {
    /// Create a new, empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a bucket's cached CORS rules as fresh (e.g. after the HTTP layer
    /// re-reads and re-caches them).
    pub fn mark_fresh(&self, bucket: &str) {
        self.fresh.insert(bucket.to_owned());
    }

    /// Returns `true` if the bucket's cached CORS rules are still fresh.
    #[must_use]
    pub fn is_fresh(&self, bucket: &str) -> bool {
        self.fresh.contains(bucket)
    }

    /// Invalidate the cached CORS rules for a bucket. Called whenever the
    /// bucket's CORS configuration changes or the bucket itself is created
    /// or deleted.
    ///
    /// # Examples
    ///
    /// ```
    /// use s3vault_engine::cors::CorsIndex;
    ///
    /// let index = CorsIndex::new();
    /// index.mark_fresh("my-bucket");
    /// index.invalidate_cache("my-bucket");
    /// assert!(!index.is_fresh("my-bucket"));
    /// ```
    pub fn invalidate_cache(&self, bucket: &str) {
        self.fresh.remove(bucket);
    }
}
