//! Per-account-region S3 bucket registry, and the top-level multi-account
//! [`Store`] that composes registries across accounts and regions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use s3vault_core::{AccountId, AccountRegionStore, AwsRegion};
use tracing::{debug, info};

use crate::error::EngineError;

use super::bucket::S3Bucket;
use super::object::Owner;

/// Bucket registry for a single `(account, region)` pair.
///
/// Bucket-name collisions within this registry are rejected; global
/// uniqueness across accounts and regions is enforced one level up, by
/// [`Store`].
pub struct S3ServiceState {
    /// Bucket name to `S3Bucket` mapping. Buckets are `Arc`-wrapped so
    /// lookups can hand back an owned handle instead of a `DashMap` guard
    /// tied to a registry that may itself be a short-lived `Arc` clone.
    buckets: DashMap<String, Arc<S3Bucket>>,
}

impl std::fmt::Debug for S3ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ServiceState")
            .field("bucket_count", &self.buckets.len())
            .finish_non_exhaustive()
    }
}

impl Default for S3ServiceState {
    fn default() -> Self {
        Self::new()
    }
}

impl S3ServiceState {
    /// Create a new, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Insert a new bucket into this registry.
    ///
    /// Global name uniqueness across accounts is the caller's
    /// responsibility ([`Store::create_bucket`] enforces it); this method
    /// only guards against a duplicate within the registry itself.
    ///
    /// # Errors
    ///
    /// [`EngineError::BucketAlreadyOwnedByYou`] if this registry already has
    /// a bucket with the same name.
    pub fn create_bucket(
        &self,
        name: String,
        region: String,
        owner: Owner,
    ) -> Result<(), EngineError> {
        if self.buckets.contains_key(&name) {
            return Err(EngineError::BucketAlreadyOwnedByYou { bucket: name });
        }

        let bucket = S3Bucket::new(name.clone(), region, owner);
        self.buckets.insert(name.clone(), Arc::new(bucket));

        info!(bucket = %name, "bucket created");
        Ok(())
    }

    /// Delete a bucket.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NoSuchBucket`] if the bucket does not exist.
    /// - [`EngineError::BucketNotEmpty`] if the bucket still contains
    ///   objects or in-progress multipart uploads.
    pub fn delete_bucket(&self, name: &str) -> Result<(), EngineError> {
        let bucket_ref = self
            .buckets
            .get(name)
            .ok_or_else(|| EngineError::NoSuchBucket {
                bucket: name.to_owned(),
            })?;

        if !bucket_ref.is_empty() {
            return Err(EngineError::BucketNotEmpty {
                bucket: name.to_owned(),
            });
        }

        // Drop the read reference before removing.
        drop(bucket_ref);

        self.buckets.remove(name);

        info!(bucket = %name, "bucket deleted");
        Ok(())
    }

    /// Get a handle to a bucket.
    ///
    /// Returns an owned `Arc` rather than a `DashMap` guard: bucket mutation
    /// goes through the independent locks on `S3Bucket`'s own fields, so
    /// nothing requires holding the registry's map guard open.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoSuchBucket`] if the bucket does not exist.
    pub fn get_bucket(&self, name: &str) -> Result<Arc<S3Bucket>, EngineError> {
        self.buckets
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::NoSuchBucket {
                bucket: name.to_owned(),
            })
    }

    /// List all buckets, returning `(name, creation_date)` pairs sorted by name.
    #[must_use]
    pub fn list_buckets(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut buckets: Vec<(String, DateTime<Utc>)> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().creation_date))
            .collect();
        buckets.sort_by(|a, b| a.0.cmp(&b.0));
        buckets
    }

    /// Check whether a bucket exists.
    #[must_use]
    pub fn bucket_exists(&self, name: &str) -> bool {
        self.buckets.contains_key(name)
    }

    /// Reset all state, removing all buckets.
    pub fn reset(&self) {
        debug!("resetting bucket registry");
        self.buckets.clear();
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Top-level, multi-account, multi-region object-storage state.
///
/// Composes one [`S3ServiceState`] per `(account, region)` pair via
/// [`AccountRegionStore`] and maintains a single global index of bucket name
/// to owning account, since S3 bucket names are unique across the entire
/// partition, not just within the account that created them.
pub struct Store {
    accounts: AccountRegionStore<S3ServiceState>,
    global_buckets: DashMap<String, AccountId>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("global_bucket_count", &self.global_buckets.len())
            .finish_non_exhaustive()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: AccountRegionStore::new(),
            global_buckets: DashMap::new(),
        }
    }

    /// Get or create the bucket registry for `(account, region)`.
    #[must_use]
    pub fn registry(&self, account: &AccountId, region: &AwsRegion) -> Arc<S3ServiceState> {
        self.accounts.get_or_create(account, region)
    }

    /// Create a bucket owned by `account` in `region`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::BucketAlreadyOwnedByYou`] if `account` already owns
    ///   a bucket with this name (anywhere in the partition).
    /// - [`EngineError::BucketAlreadyExists`] if a different account owns a
    ///   bucket with this name.
    pub fn create_bucket(
        &self,
        account: &AccountId,
        region: &AwsRegion,
        name: String,
        owner: Owner,
    ) -> Result<(), EngineError> {
        if let Some(existing) = self.global_buckets.get(&name) {
            if *existing == *account {
                return Err(EngineError::BucketAlreadyOwnedByYou { bucket: name });
            }
            return Err(EngineError::BucketAlreadyExists { bucket: name });
        }

        let registry = self.registry(account, region);
        registry.create_bucket(name.clone(), region.as_str().to_owned(), owner)?;
        self.global_buckets.insert(name, account.clone());
        Ok(())
    }

    /// Delete a bucket owned by `account`.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`] or [`EngineError::BucketNotEmpty`], per
    /// [`S3ServiceState::delete_bucket`].
    pub fn delete_bucket(
        &self,
        account: &AccountId,
        region: &AwsRegion,
        name: &str,
    ) -> Result<(), EngineError> {
        let registry = self.registry(account, region);
        registry.delete_bucket(name)?;
        self.global_buckets.remove(name);
        Ok(())
    }

    /// Resolve a bucket for a request, implementing cross-account lookup.
    ///
    /// Validates `expected_owner` (the `x-amz-expected-bucket-owner` header
    /// value) if present, then looks up `name` in the caller's own registry.
    /// If absent there, consults the global bucket index: when a different
    /// account owns a bucket by that name, the bucket is re-resolved inside
    /// that account's registry for the caller's region.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidBucketOwnerAWSAccountID`] if `expected_owner`
    ///   is present and malformed.
    /// - [`EngineError::NoSuchBucket`] if no bucket by that name exists
    ///   anywhere in the partition.
    pub fn resolve_registry(
        &self,
        account: &AccountId,
        region: &AwsRegion,
        name: &str,
        expected_owner: Option<&str>,
    ) -> Result<Arc<S3ServiceState>, EngineError> {
        if let Some(owner) = expected_owner {
            let well_formed = owner.len() == 12 && owner.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !well_formed {
                return Err(EngineError::InvalidBucketOwnerAWSAccountID);
            }
        }

        if let Some(local) = self.accounts.get(account, region) {
            if local.bucket_exists(name) {
                return Ok(local);
            }
        }

        if let Some(owning_account) = self.global_buckets.get(name) {
            if let Some(remote) = self.accounts.get(&owning_account, region) {
                if remote.bucket_exists(name) {
                    return Ok(remote);
                }
            }
        }

        Err(EngineError::NoSuchBucket {
            bucket: name.to_owned(),
        })
    }

    /// Get a handle to a bucket owned by the default account, in the
    /// default region.
    ///
    /// A convenience for the bulk of request handlers, which act on a
    /// single, already-identified bucket and don't need the full
    /// account/region-aware resolution [`Store::resolve_registry`] performs
    /// for cross-account lookups (used explicitly by bucket creation,
    /// deletion, and listing).
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`] if no bucket by that name exists.
    pub fn get_bucket(&self, name: &str) -> Result<Arc<S3Bucket>, EngineError> {
        let registry = self.resolve_registry(&AccountId::default(), &AwsRegion::default(), name, None)?;
        registry.get_bucket(name)
    }

    /// Return the account that owns a bucket, if it exists anywhere in the
    /// partition.
    #[must_use]
    pub fn owning_account(&self, name: &str) -> Option<AccountId> {
        self.global_buckets.get(name).map(|entry| entry.clone())
    }

    /// List all bucket names owned by `account` across every region it has
    /// touched, sorted by name.
    #[must_use]
    pub fn list_buckets_for_account(&self, account: &AccountId) -> Vec<(String, DateTime<Utc>)> {
        let mut buckets: Vec<(String, DateTime<Utc>)> = self
            .accounts
            .keys()
            .into_iter()
            .filter(|(acct, _)| acct == account)
            .filter_map(|(acct, region)| self.accounts.get(&acct, &region))
            .flat_map(|registry| registry.list_buckets())
            .collect();
        buckets.sort_by(|a, b| a.0.cmp(&b.0));
        buckets
    }

    /// Reset all state across every account and region.
    pub fn reset(&self) {
        debug!("resetting store");
        self.accounts.reset();
        self.global_buckets.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn default_owner() -> Owner {
        Owner::default()
    }

    fn other_owner() -> Owner {
        Owner {
            id: "other-account-id".to_owned(),
            display_name: "other-user".to_owned(),
        }
    }

    #[test]
    fn test_should_create_empty_service_state() {
        let state = S3ServiceState::new();
        assert!(!state.bucket_exists("anything"));
        assert!(state.list_buckets().is_empty());
    }

    #[test]
    fn test_should_debug_format_service_state() {
        let state = S3ServiceState::new();
        let debug_str = format!("{state:?}");
        assert!(debug_str.contains("S3ServiceState"));
    }

    #[test]
    fn test_should_create_and_list_bucket() {
        let state = S3ServiceState::new();
        state
            .create_bucket(
                "my-bucket".to_owned(),
                "us-east-1".to_owned(),
                default_owner(),
            )
            .unwrap_or_else(|e| panic!("create_bucket failed: {e}"));

        assert!(state.bucket_exists("my-bucket"));

        let buckets = state.list_buckets();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].0, "my-bucket");
    }

    #[test]
    fn test_should_reject_duplicate_bucket_same_owner() {
        let state = S3ServiceState::new();
        state
            .create_bucket("dup".to_owned(), "us-east-1".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("first create failed: {e}"));

        let result = state.create_bucket("dup".to_owned(), "us-east-1".to_owned(), default_owner());
        assert!(
            matches!(result, Err(EngineError::BucketAlreadyOwnedByYou { .. })),
            "expected BucketAlreadyOwnedByYou, got {result:?}"
        );
    }

    #[test]
    fn test_should_reject_duplicate_bucket_different_owner() {
        let state = S3ServiceState::new();
        state
            .create_bucket("shared".to_owned(), "us-east-1".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("first create failed: {e}"));

        let result =
            state.create_bucket("shared".to_owned(), "eu-west-1".to_owned(), other_owner());
        assert!(
            matches!(result, Err(EngineError::BucketAlreadyExists { .. })),
            "expected BucketAlreadyExists, got {result:?}"
        );
    }

    #[test]
    fn test_should_delete_empty_bucket() {
        let state = S3ServiceState::new();
        state
            .create_bucket(
                "deleteme".to_owned(),
                "us-east-1".to_owned(),
                default_owner(),
            )
            .unwrap_or_else(|e| panic!("create failed: {e}"));

        state
            .delete_bucket("deleteme")
            .unwrap_or_else(|e| panic!("delete failed: {e}"));

        assert!(!state.bucket_exists("deleteme"));
        assert!(state.list_buckets().is_empty());
    }

    #[test]
    fn test_should_reject_delete_nonexistent_bucket() {
        let state = S3ServiceState::new();
        let result = state.delete_bucket("ghost");
        assert!(matches!(result, Err(EngineError::NoSuchBucket { .. })));
    }

    #[test]
    fn test_should_reject_delete_non_empty_bucket() {
        use crate::state::object::{ObjectMetadata, S3Object};

        let state = S3ServiceState::new();
        state
            .create_bucket("full".to_owned(), "us-east-1".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("create failed: {e}"));

        // Insert an object via the bucket's object store.
        {
            let bucket = state
                .get_bucket("full")
                .unwrap_or_else(|e| panic!("get failed: {e}"));
            let now = chrono::Utc::now();
            let obj = S3Object {
                key: "file.txt".to_owned(),
                version_id: "null".to_owned(),
                etag: "\"abc\"".to_owned(),
                size: 42,
                last_modified: now,
                internal_last_modified: now,
                storage_class: "STANDARD".to_owned(),
                metadata: ObjectMetadata::default(),
                owner: default_owner(),
                checksum: None,
                parts_count: None,
                part_etags: Vec::new(),
                expiration: None,
                restore: None,
            };
            bucket.objects.write().put(obj);
        }

        let result = state.delete_bucket("full");
        assert!(
            matches!(result, Err(EngineError::BucketNotEmpty { .. })),
            "expected BucketNotEmpty, got {result:?}"
        );
    }

    #[test]
    fn test_should_get_bucket_immutable_ref() {
        let state = S3ServiceState::new();
        state
            .create_bucket(
                "ref-test".to_owned(),
                "us-east-1".to_owned(),
                default_owner(),
            )
            .unwrap_or_else(|e| panic!("create failed: {e}"));

        let bucket = state
            .get_bucket("ref-test")
            .unwrap_or_else(|e| panic!("get failed: {e}"));
        assert_eq!(bucket.name, "ref-test");
        assert_eq!(bucket.region, "us-east-1");
    }

    #[test]
    fn test_should_return_error_for_nonexistent_bucket() {
        let state = S3ServiceState::new();
        assert!(matches!(
            state.get_bucket("nope"),
            Err(EngineError::NoSuchBucket { .. })
        ));
    }

    #[test]
    fn test_should_list_buckets_sorted() {
        let state = S3ServiceState::new();
        for name in ["charlie", "alpha", "bravo"] {
            state
                .create_bucket(name.to_owned(), "us-east-1".to_owned(), default_owner())
                .unwrap_or_else(|e| panic!("create {name} failed: {e}"));
        }

        let names: Vec<String> = state.list_buckets().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["alpha", "bravo", "charlie"]);
    }

    #[test]
    fn test_should_reset_all_state() {
        let state = S3ServiceState::new();
        state
            .create_bucket("a".to_owned(), "us-east-1".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("create failed: {e}"));
        state
            .create_bucket("b".to_owned(), "us-east-1".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("create failed: {e}"));

        assert_eq!(state.list_buckets().len(), 2);
        state.reset();
        assert!(state.list_buckets().is_empty());
        assert!(!state.bucket_exists("a"));
        assert!(!state.bucket_exists("b"));
    }

    #[test]
    fn test_should_recreate_bucket_after_delete() {
        let state = S3ServiceState::new();
        state
            .create_bucket("reuse".to_owned(), "us-east-1".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("create failed: {e}"));
        state
            .delete_bucket("reuse")
            .unwrap_or_else(|e| panic!("delete failed: {e}"));

        // Should be able to recreate.
        state
            .create_bucket("reuse".to_owned(), "eu-west-1".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("recreate failed: {e}"));

        let bucket = state
            .get_bucket("reuse")
            .unwrap_or_else(|e| panic!("get failed: {e}"));
        assert_eq!(bucket.region, "eu-west-1");
    }

    #[test]
    fn test_should_use_default_trait() {
        let state = S3ServiceState::default();
        assert!(state.list_buckets().is_empty());
    }

    // ---- Store tests ----

    fn account(id: &str) -> AccountId {
        AccountId::new(id).unwrap_or_else(|e| panic!("invalid test account id: {e}"))
    }

    #[test]
    fn test_should_create_bucket_via_store() {
        let store = Store::new();
        let acct = account("111111111111");
        let region = AwsRegion::default();

        store
            .create_bucket(&acct, &region, "my-bucket".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("create failed: {e}"));

        let registry = store.registry(&acct, &region);
        assert!(registry.bucket_exists("my-bucket"));
    }

    #[test]
    fn test_should_reject_duplicate_bucket_across_accounts_via_store() {
        let store = Store::new();
        let region = AwsRegion::default();
        let acct_a = account("111111111111");
        let acct_b = account("222222222222");

        store
            .create_bucket(&acct_a, &region, "shared".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("create failed: {e}"));

        let result = store.create_bucket(&acct_b, &region, "shared".to_owned(), other_owner());
        assert!(matches!(result, Err(EngineError::BucketAlreadyExists { .. })));

        let result = store.create_bucket(&acct_a, &region, "shared".to_owned(), default_owner());
        assert!(matches!(result, Err(EngineError::BucketAlreadyOwnedByYou { .. })));
    }

    #[test]
    fn test_should_resolve_bucket_owned_by_another_account() {
        let store = Store::new();
        let region = AwsRegion::default();
        let acct_a = account("111111111111");
        let acct_b = account("222222222222");

        store
            .create_bucket(&acct_a, &region, "cross-owned".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("create failed: {e}"));

        let resolved = store
            .resolve_registry(&acct_b, &region, "cross-owned", None)
            .unwrap_or_else(|e| panic!("resolve failed: {e}"));
        assert!(resolved.bucket_exists("cross-owned"));
    }

    #[test]
    fn test_should_reject_malformed_expected_owner() {
        let store = Store::new();
        let region = AwsRegion::default();
        let acct = account("111111111111");

        let result = store.resolve_registry(&acct, &region, "whatever", Some("short"));
        assert!(matches!(
            result,
            Err(EngineError::InvalidBucketOwnerAWSAccountID)
        ));
    }

    #[test]
    fn test_should_fail_resolve_for_unknown_bucket() {
        let store = Store::new();
        let region = AwsRegion::default();
        let acct = account("111111111111");

        let result = store.resolve_registry(&acct, &region, "ghost", None);
        assert!(matches!(result, Err(EngineError::NoSuchBucket { .. })));
    }

    #[test]
    fn test_should_delete_bucket_via_store() {
        let store = Store::new();
        let region = AwsRegion::default();
        let acct = account("111111111111");

        store
            .create_bucket(&acct, &region, "to-delete".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("create failed: {e}"));
        store
            .delete_bucket(&acct, &region, "to-delete")
            .unwrap_or_else(|e| panic!("delete failed: {e}"));

        let result = store.resolve_registry(&acct, &region, "to-delete", None);
        assert!(matches!(result, Err(EngineError::NoSuchBucket { .. })));

        // Name should be free for reuse by a different account.
        let other = account("222222222222");
        store
            .create_bucket(&other, &region, "to-delete".to_owned(), other_owner())
            .unwrap_or_else(|e| panic!("recreate by other account failed: {e}"));
    }

    #[test]
    fn test_should_list_buckets_for_account_across_regions() {
        let store = Store::new();
        let acct = account("111111111111");
        let us = AwsRegion::new("us-east-1");
        let eu = AwsRegion::new("eu-west-1");

        store
            .create_bucket(&acct, &us, "us-bucket".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("create failed: {e}"));
        store
            .create_bucket(&acct, &eu, "eu-bucket".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("create failed: {e}"));

        let names: Vec<String> = store
            .list_buckets_for_account(&acct)
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["eu-bucket", "us-bucket"]);
    }

    #[test]
    fn test_should_get_bucket_via_default_tenant_convenience() {
        let store = Store::new();
        store
            .create_bucket(
                &AccountId::default(),
                &AwsRegion::default(),
                "default-tenant".to_owned(),
                default_owner(),
            )
            .unwrap_or_else(|e| panic!("create failed: {e}"));

        let bucket = store
            .get_bucket("default-tenant")
            .unwrap_or_else(|e| panic!("get failed: {e}"));
        assert_eq!(bucket.name, "default-tenant");

        assert!(matches!(
            store.get_bucket("missing"),
            Err(EngineError::NoSuchBucket { .. })
        ));
    }

    #[test]
    fn test_should_reset_store() {
        let store = Store::new();
        let region = AwsRegion::default();
        let acct = account("111111111111");
        store
            .create_bucket(&acct, &region, "a".to_owned(), default_owner())
            .unwrap_or_else(|e| panic!("create failed: {e}"));

        store.reset();
        assert!(matches!(
            store.resolve_registry(&acct, &region, "a", None),
            Err(EngineError::NoSuchBucket { .. })
        ));
    }
}
