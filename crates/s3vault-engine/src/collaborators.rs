//! Trait boundaries for collaborators the engine consumes but does not own:
//! notification fan-out, the IAM key-management facade, and the per-resource
//! tag table. Each ships a small in-memory or no-op default so the engine
//! compiles and is testable without a real sink behind it, mirroring how the
//! teacher isolates `RustStackAuth` behind `CredentialProvider`.

use std::sync::Arc;

use dashmap::DashMap;
use s3vault_core::{AccountId, AwsRegion};
use tracing::debug;

/// An object mutation notable enough to report to a notification sink.
#[derive(Debug, Clone)]
pub struct ObjectEvent {
    /// Event name in the Service's own vocabulary, e.g. `"s3:ObjectCreated:Put"`.
    pub name: String,
    /// Bucket the event occurred in.
    pub bucket: String,
    /// Object key the event occurred on.
    pub key: String,
    /// Version id of the affected object, if versioning is enabled.
    pub version_id: Option<String>,
    /// Object size in bytes, where applicable.
    pub size: Option<u64>,
}

/// Fan-out sink for [`ObjectEvent`]s emitted by the dispatcher after a
/// bucket-mutating operation commits.
pub trait NotificationDispatcher: Send + Sync {
    /// Deliver `event` to whatever sink this dispatcher wraps.
    fn dispatch(&self, event: ObjectEvent);
}

/// Dispatcher that discards every event. The default when no notification
/// backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotificationDispatcher;

impl NotificationDispatcher for NoopNotificationDispatcher {
    fn dispatch(&self, event: ObjectEvent) {
        debug!(event = %event.name, bucket = %event.bucket, key = %event.key, "notification discarded (no dispatcher configured)");
    }
}

/// IAM key-management facade: resolves and validates SSE-KMS key ids without
/// performing any actual encryption.
pub trait KmsFacade: Send + Sync {
    /// Return the id of the account/region's AWS-managed key, creating it on
    /// first use.
    fn ensure_key(&self, account: &AccountId, region: &AwsRegion) -> String;

    /// Return whether `id` looks like a key this facade could resolve.
    fn validate_key_id(&self, id: &str) -> bool;
}

/// In-memory KMS facade. Accepts any non-empty key id as valid and lazily
/// mints a stable per-`(account, region)` managed-key id on first request,
/// since no real encryption key material exists to check against.
#[derive(Debug, Default)]
pub struct InMemoryKmsFacade {
    managed_keys: DashMap<(AccountId, AwsRegion), String>,
}

impl InMemoryKmsFacade {
    /// Create an empty facade.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KmsFacade for InMemoryKmsFacade {
    fn ensure_key(&self, account: &AccountId, region: &AwsRegion) -> String {
        self.managed_keys
            .entry((account.clone(), region.clone()))
            .or_insert_with(|| format!("alias/aws/s3-{account}-{region}", region = region.as_str()))
            .clone()
    }

    fn validate_key_id(&self, id: &str) -> bool {
        !id.trim().is_empty()
    }
}

/// Per-resource tag table, keyed by an opaque resource id (a bucket ARN or
/// `bucket/key/version-id` triple), decoupled from the object record itself
/// so tag lifetime tracks the resource identifier rather than a field nested
/// inside `ObjectMetadata`.
pub trait TagTable: Send + Sync {
    /// Replace the full tag set for `id`.
    fn tag_resource(&self, id: &str, tags: Vec<(String, String)>);
    /// List the tags currently stored for `id`.
    fn list_tags_for_resource(&self, id: &str) -> Vec<(String, String)>;
    /// Drop all tags for `id` (deleting the resource or clearing its tags).
    fn remove_resource(&self, id: &str);
}

/// `DashMap`-backed in-memory tag table.
#[derive(Debug, Default)]
pub struct InMemoryTagTable {
    tags: DashMap<String, Vec<(String, String)>>,
}

impl InMemoryTagTable {
    /// Create an empty tag table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Build the resource id for an object version, per the `bucket/key/version-id` scheme.
#[must_use]
pub fn object_resource_id(bucket: &str, key: &str, version_id: &str) -> String {
    format!("{bucket}/{key}/{version_id}")
}

/// Build the resource id for a bucket (bucket ARN-equivalent: just the bucket name here,
/// since this emulator doesn't model full ARNs).
#[must_use]
pub fn bucket_resource_id(bucket: &str) -> String {
    format!("arn:aws:s3:::{bucket}")
}

impl TagTable for InMemoryTagTable {
    fn tag_resource(&self, id: &str, tags: Vec<(String, String)>) {
        if tags.is_empty() {
            self.tags.remove(id);
        } else {
            self.tags.insert(id.to_owned(), tags);
        }
    }

    fn list_tags_for_resource(&self, id: &str) -> Vec<(String, String)> {
        self.tags.get(id).map(|t| t.clone()).unwrap_or_default()
    }

    fn remove_resource(&self, id: &str) {
        self.tags.remove(id);
    }
}

/// Persistence boundary: flushing pending content-store bytes to disk,
/// enumerating state for a snapshot, and invalidating in-memory caches after
/// a reload. The snapshot/restore orchestrator itself is out of scope; this
/// trait only names the hooks the engine would call into it.
pub trait PersistenceHook: Send + Sync {
    /// Flush any buffered object bytes to durable storage.
    fn flush(&self) {}
    /// Visit persisted state for a snapshot walk. No-op by default.
    fn accept_state_visitor(&self) {}
    /// Drop any caches derived from state that a reload may have changed.
    fn invalidate_caches(&self) {}
}

/// Persistence hook that does nothing, for the common case of an
/// in-memory-only engine instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersistenceHook;

impl PersistenceHook for NoopPersistenceHook {}

/// Convenience alias for the `Arc<dyn Trait>` shape the engine stores its
/// collaborators as.
pub type DynNotificationDispatcher = Arc<dyn NotificationDispatcher>;
/// See [`DynNotificationDispatcher`].
pub type DynKmsFacade = Arc<dyn KmsFacade>;
/// See [`DynNotificationDispatcher`].
pub type DynTagTable = Arc<dyn TagTable>;
/// See [`DynNotificationDispatcher`].
pub type DynPersistenceHook = Arc<dyn PersistenceHook>;
