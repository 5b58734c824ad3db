//! S3 provider implementing the `s3s::S3` trait.
//!
//! [`S3VaultEngine`] is the core S3 provider that owns all service state
//! (accounts, buckets, objects, multipart uploads) and the storage backend.
//! Individual S3 operations are implemented in the [`crate::ops`] submodules
//! and wired together in the `impl S3 for S3VaultEngine` block.
//!
//! # Object safety
//!
//! The [`s3s::S3`] trait uses `#[async_trait]` because it must be object-safe
//! for dynamic dispatch (`Arc<dyn S3>`). We follow the same pattern here.

use std::sync::Arc;

use s3vault_core::{AccountId, AwsRegion};

use crate::collaborators::{
    DynKmsFacade, DynNotificationDispatcher, DynPersistenceHook, DynTagTable, InMemoryKmsFacade,
    InMemoryTagTable, NoopNotificationDispatcher, NoopPersistenceHook,
};
use crate::concurrency::ObjectLockTable;
use crate::config::S3Config;
use crate::cors::CorsIndex;
use crate::error::EngineError;
use crate::state::service::{S3ServiceState, Store};
use crate::storage::InMemoryStorage;

/// The main S3 provider that implements the `s3s::S3` trait.
///
/// All fields are `Arc`-wrapped for cheap cloning and shared ownership
/// across handler tasks.
///
/// # Examples
///
/// ```
/// use s3vault_engine::S3VaultEngine;
/// use s3vault_engine::config::S3Config;
///
/// let provider = S3VaultEngine::new(S3Config::default());
/// assert!(!provider.config().gateway_listen.is_empty());
/// ```
pub struct S3VaultEngine {
    /// Multi-account, multi-region bucket and object metadata state.
    pub(crate) state: Arc<Store>,
    /// Object body storage (in-memory with disk spillover).
    pub(crate) storage: Arc<InMemoryStorage>,
    /// Per-bucket CORS rule index for request-time matching.
    pub(crate) cors_index: Arc<CorsIndex>,
    /// Per-object write-serialization locks.
    pub(crate) locks: Arc<ObjectLockTable>,
    /// Provider configuration.
    pub(crate) config: Arc<S3Config>,
    /// Notification fan-out sink, consulted after bucket-mutating operations commit.
    pub(crate) notifications: DynNotificationDispatcher,
    /// IAM key-management facade for SSE-KMS key id resolution/validation.
    pub(crate) kms: DynKmsFacade,
    /// Per-resource tag table, keyed by bucket ARN or `bucket/key/version-id`.
    pub(crate) tags: DynTagTable,
    /// Persistence flush/snapshot/reload hook.
    pub(crate) persistence: DynPersistenceHook,
}

impl std::fmt::Debug for S3VaultEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3VaultEngine")
            .field("state", &self.state)
            .field("storage", &self.storage)
            .field("cors_index", &self.cors_index)
            .field("locks", &self.locks)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl S3VaultEngine {
    /// Create a new S3 provider with the given configuration.
    ///
    /// Initializes an empty multi-account store, a storage backend
    /// configured with the memory threshold from `config`, and an empty
    /// CORS index.
    #[must_use]
    pub fn new(config: S3Config) -> Self {
        let storage = InMemoryStorage::new(config.s3_max_memory_object_size);
        Self {
            state: Arc::new(Store::new()),
            storage: Arc::new(storage),
            cors_index: Arc::new(CorsIndex::new()),
            locks: Arc::new(ObjectLockTable::new()),
            config: Arc::new(config),
            notifications: Arc::new(NoopNotificationDispatcher),
            kms: Arc::new(InMemoryKmsFacade::new()),
            tags: Arc::new(InMemoryTagTable::new()),
            persistence: Arc::new(NoopPersistenceHook),
        }
    }

    /// Returns a reference to the multi-account store.
    #[must_use]
    pub fn state(&self) -> &Store {
        &self.state
    }

    /// Returns a reference to the storage backend.
    #[must_use]
    pub fn storage(&self) -> &InMemoryStorage {
        &self.storage
    }

    /// Returns a reference to the CORS index.
    #[must_use]
    pub fn cors_index(&self) -> &CorsIndex {
        &self.cors_index
    }

    /// Returns a reference to the per-object lock table.
    #[must_use]
    pub fn locks(&self) -> &ObjectLockTable {
        &self.locks
    }

    /// Returns a reference to the provider configuration.
    #[must_use]
    pub fn config(&self) -> &S3Config {
        &self.config
    }

    /// Returns a reference to the notification dispatcher.
    #[must_use]
    pub fn notifications(&self) -> &DynNotificationDispatcher {
        &self.notifications
    }

    /// Returns a reference to the KMS facade.
    #[must_use]
    pub fn kms(&self) -> &DynKmsFacade {
        &self.kms
    }

    /// Returns a reference to the tag table.
    #[must_use]
    pub fn tags(&self) -> &DynTagTable {
        &self.tags
    }

    /// Returns a reference to the persistence hook.
    #[must_use]
    pub fn persistence(&self) -> &DynPersistenceHook {
        &self.persistence
    }

    /// Derive the account a request acts as from its SigV4 access key.
    ///
    /// The access key is not itself a 12-digit account id, so this emulator
    /// treats any access key that happens to parse as one as that account
    /// and otherwise falls back to the default test account. Unauthenticated
    /// requests (signature validation disabled) always act as the default
    /// account.
    #[must_use]
    pub fn account_for_credentials(&self, access_key: Option<&str>) -> AccountId {
        access_key
            .and_then(|k| AccountId::new(k).ok())
            .unwrap_or_default()
    }

    /// The region this provider instance answers requests for, absent any
    /// per-bucket override. A single running process serves one region per
    /// the `s3s` routing layer, matching how the AWS S3 endpoint space is
    /// partitioned by region.
    #[must_use]
    pub fn default_region(&self) -> AwsRegion {
        AwsRegion::new(self.config.default_region.clone())
    }

    /// Resolve `bucket` for a request, handling cross-account lookups.
    ///
    /// # Errors
    ///
    /// See [`Store::resolve_registry`].
    pub fn resolve_bucket_registry(
        &self,
        account: &AccountId,
        bucket: &str,
        expected_owner: Option<&str>,
    ) -> Result<Arc<S3ServiceState>, EngineError> {
        self.state
            .resolve_registry(account, &self.default_region(), bucket, expected_owner)
    }

    /// Reset all state (buckets, objects, multipart uploads, CORS rules).
    ///
    /// Primarily useful for testing and the health-check reset endpoint.
    pub fn reset(&self) {
        self.state.reset();
        self.storage.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_provider_with_defaults() {
        let provider = S3VaultEngine::new(S3Config::default());
        assert_eq!(provider.config().gateway_listen, "0.0.0.0:4566");
    }

    #[test]
    fn test_should_debug_format_provider() {
        let provider = S3VaultEngine::new(S3Config::default());
        let debug_str = format!("{provider:?}");
        assert!(debug_str.contains("S3VaultEngine"));
    }

    #[test]
    fn test_should_share_via_arc() {
        let provider = Arc::new(S3VaultEngine::new(S3Config::default()));
        let clone = Arc::clone(&provider);
        assert_eq!(
            provider.config().default_region,
            clone.config().default_region
        );
    }

    #[test]
    fn test_should_derive_default_account_for_unauthenticated_requests() {
        let provider = S3VaultEngine::new(S3Config::default());
        assert_eq!(provider.account_for_credentials(None), AccountId::default());
        assert_eq!(
            provider.account_for_credentials(Some("not-an-account-id")),
            AccountId::default()
        );
        assert_eq!(
            provider.account_for_credentials(Some("123456789012")),
            AccountId::new("123456789012").unwrap_or_else(|e| panic!("{e}"))
        );
    }

    #[test]
    fn test_should_reset_state() {
        let provider = S3VaultEngine::new(S3Config::default());
        let account = AccountId::default();
        let region = provider.default_region();
        provider
            .state()
            .create_bucket(
                &account,
                &region,
                "test".to_owned(),
                crate::state::object::Owner::default(),
            )
            .unwrap_or_else(|e| panic!("create failed: {e}"));
        assert!(
            provider
                .resolve_bucket_registry(&account, "test", None)
                .is_ok()
        );

        provider.reset();
        assert!(
            provider
                .resolve_bucket_registry(&account, "test", None)
                .is_err()
        );
    }
}
