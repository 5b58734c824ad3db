//! Object CRUD operation handlers.
//!
//! Implements `put_object`, `get_object`, `head_object`, `delete_object`,
//! `delete_objects`, and `copy_object`.

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::TryStreamExt;
// The s3s DTO module contains dozens of types we reference; wildcard is clearer.
#[allow(clippy::wildcard_imports)]
use s3s::dto::*;
use s3s::{S3Request, S3Response, S3Result};
use tracing::debug;

use crate::error::EngineError;
use crate::provider::S3VaultEngine;
use crate::state::object::{
    CannedAcl, ChecksumData, ObjectMetadata, Owner as InternalOwner, S3Object,
};
use crate::utils::{is_valid_if_match, is_valid_if_none_match};
use crate::validation::{
    validate_metadata, validate_object_key, validate_sse_coherency, validate_storage_class,
};

use super::bucket::chrono_to_timestamp;

// AWS S3 DTOs use signed integers (i32/i64) for inherently non-negative values
// (sizes, part counts). Casting from u64/u32/usize is safe in practice.
// These handler methods must remain async to match the s3s::S3 trait interface.
#[allow(
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::unused_async
)]
impl S3VaultEngine {
    /// Put (upload) a new object.
    pub(crate) async fn handle_put_object(
        &self,
        mut req: S3Request<PutObjectInput>,
    ) -> S3Result<S3Response<PutObjectOutput>> {
        let bucket_name = req.input.bucket.clone();
        let key = req.input.key.clone();

        validate_object_key(&key).map_err(EngineError::into_s3_error)?;
        if let Some(class) = &req.input.storage_class {
            validate_storage_class(class.as_str()).map_err(EngineError::into_s3_error)?;
        }
        validate_sse_coherency(
            req.input.server_side_encryption.as_ref().map(ServerSideEncryption::as_str),
            req.input.sse_customer_algorithm.as_deref(),
        )
        .map_err(EngineError::into_s3_error)?;

        // Verify bucket exists.
        let bucket = self
            .state
            .get_bucket(&bucket_name)
            .map_err(EngineError::into_s3_error)?;

        // Acquire the per-key write guard before evaluating preconditions, so
        // two racing conditional PUTs to the same key serialize: the first
        // to finish commits, the second observes its result and fails.
        let _write_guard = self.locks.write(&bucket_name, &key, None).await;

        {
            let store = bucket.objects.read();
            let existing = store.get(&key);
            check_put_preconditions(&req.input, existing)?;
        }

        // Take the body out before borrowing other fields from input.
        let body = req.input.body.take();

        // Collect the body.
        let body_data = collect_body(body).await?;

        // Extract metadata from the request.
        let (metadata, tags) = build_metadata(&req.input, &req.headers);
        validate_metadata(&metadata.user_metadata).map_err(EngineError::into_s3_error)?;

        if !self.config.s3_skip_kms_key_validation {
            if let Some(kms_key_id) = &metadata.sse_kms_key_id {
                if !self.kms.validate_key_id(kms_key_id) {
                    return Err(EngineError::InvalidArgument {
                        message: format!("invalid SSE-KMS key id: {kms_key_id}"),
                    }
                    .into_s3_error());
                }
            }
        }

        // Determine version ID based on versioning status.
        let version_id = if bucket.is_versioning_enabled() {
            crate::utils::generate_version_id()
        } else {
            "null".to_owned()
        };

        // Write to storage.
        let write_result = self
            .storage
            .write_object(&bucket_name, &key, &version_id, body_data.clone())
            .await
            .map_err(|e| EngineError::Internal(anyhow::anyhow!("{e}")).into_s3_error())?;

        // Extract checksum from the request, if provided.
        let checksum = extract_checksum_from_put(&req.input);

        // Build the S3Object.
        let owner = InternalOwner::default();
        let now = Utc::now();
        let obj = S3Object {
            key: key.clone(),
            version_id: version_id.clone(),
            etag: write_result.etag.clone(),
            size: write_result.size,
            last_modified: now,
            internal_last_modified: now,
            storage_class: req
                .input
                .storage_class
                .as_ref()
                .map_or_else(|| "STANDARD".to_owned(), |s| s.as_str().to_owned()),
            metadata,
            owner,
            checksum,
            parts_count: None,
            part_etags: Vec::new(),
            expiration: None,
            restore: None,
        };

        // Store the object metadata.
        {
            let mut store = bucket.objects.write();
            store.put(obj);
        }

        if !tags.is_empty() {
            self.tags.tag_resource(
                &crate::collaborators::object_resource_id(&bucket_name, &key, &version_id),
                tags,
            );
        }

        self.notifications.dispatch(crate::collaborators::ObjectEvent {
            name: "s3:ObjectCreated:Put".to_owned(),
            bucket: bucket_name.clone(),
            key: key.clone(),
            version_id: if version_id == "null" {
                None
            } else {
                Some(version_id.clone())
            },
            size: Some(write_result.size),
        });

        debug!(bucket = %bucket_name, key = %key, version_id = %version_id, "put_object completed");

        let real_version_id = if version_id == "null" {
            None
        } else {
            Some(version_id)
        };

        let output = PutObjectOutput {
            bucket_key_enabled: None,
            checksum_crc32: None,
            checksum_crc32c: None,
            checksum_crc64nvme: None,
            checksum_sha1: None,
            checksum_sha256: None,
            checksum_type: None,
            e_tag: Some(write_result.etag),
            expiration: None,
            request_charged: None,
            sse_customer_algorithm: None,
            sse_customer_key_md5: None,
            ssekms_encryption_context: None,
            ssekms_key_id: None,
            server_side_encryption: None,
            size: None,
            version_id: real_version_id,
        };
        Ok(S3Response::new(output))
    }

    /// Get (download) an object.
    #[allow(clippy::too_many_lines)]
    pub(crate) async fn handle_get_object(
        &self,
        req: S3Request<GetObjectInput>,
    ) -> S3Result<S3Response<GetObjectOutput>> {
        let bucket_name = req.input.bucket;
        let key = req.input.key;

        // Look up the object and extract all needed data while holding the lock.
        // The lock must be dropped before any `.await` calls since parking_lot
        // guards are `!Send`.
        let (
            obj_size,
            obj_etag,
            obj_last_modified,
            obj_version_id,
            obj_storage_class,
            obj_meta,
            obj_parts_count,
            version_for_storage,
        ) = {
            let bucket = self
                .state
                .get_bucket(&bucket_name)
                .map_err(EngineError::into_s3_error)?;

            let store = bucket.objects.read();
            let obj = if let Some(version_id) = &req.input.version_id {
                store.get_version(&key, version_id).ok_or_else(|| {
                    EngineError::NoSuchVersion {
                        key: key.clone(),
                        version_id: version_id.clone(),
                    }
                    .into_s3_error()
                })?
            } else {
                store
                    .get(&key)
                    .ok_or_else(|| EngineError::NoSuchKey { key: key.clone() }.into_s3_error())?
            };

            check_read_preconditions(
                &obj.etag,
                obj.last_modified,
                req.input.if_match.as_deref(),
                req.input.if_unmodified_since.as_ref(),
                req.input.if_none_match.as_deref(),
                req.input.if_modified_since.as_ref(),
            )?;

            let version_id_opt = if obj.version_id == "null" {
                None
            } else {
                Some(obj.version_id.clone())
            };

            (
                obj.size,
                obj.etag.clone(),
                obj.last_modified,
                version_id_opt,
                obj.storage_class.clone(),
                obj.metadata.clone(),
                obj.parts_count,
                obj.version_id.clone(),
            )
        };

        // Parse range header if provided.
        let range = if let Some(ref range_value) = req.input.range {
            let std_range = range_value
                .check(obj_size)
                .map_err(|_| EngineError::InvalidRange.into_s3_error())?;
            Some((std_range.start, std_range.end - 1))
        } else {
            None
        };

        // Read data from storage.
        let data = self
            .storage
            .read_object(&bucket_name, &key, &version_for_storage, range)
            .await
            .map_err(|e| EngineError::Internal(anyhow::anyhow!("{e}")).into_s3_error())?;

        let content_length = data.len() as i64;

        // Build the streaming body from the data bytes.
        let body = StreamingBlob::wrap(futures::stream::once(async move {
            Ok::<_, std::io::Error>(data)
        }));

        let content_range = if let Some((start, end)) = range {
            Some(format!("bytes {start}-{end}/{obj_size}"))
        } else {
            None
        };

        let output = GetObjectOutput {
            accept_ranges: Some("bytes".to_owned()),
            body: Some(body),
            bucket_key_enabled: None,
            cache_control: obj_meta.cache_control,
            checksum_crc32: None,
            checksum_crc32c: None,
            checksum_crc64nvme: None,
            checksum_sha1: None,
            checksum_sha256: None,
            checksum_type: None,
            content_disposition: obj_meta.content_disposition,
            content_encoding: obj_meta.content_encoding,
            content_language: obj_meta.content_language,
            content_length: Some(content_length),
            content_range,
            content_type: Some(
                obj_meta
                    .content_type
                    .as_deref()
                    .unwrap_or("application/octet-stream")
                    .parse::<mime::Mime>()
                    .unwrap_or(mime::APPLICATION_OCTET_STREAM),
            ),
            delete_marker: None,
            e_tag: Some(obj_etag),
            expiration: None,
            expires: None,
            last_modified: Some(chrono_to_timestamp(obj_last_modified)),
            metadata: if obj_meta.user_metadata.is_empty() {
                None
            } else {
                Some(obj_meta.user_metadata)
            },
            missing_meta: None,
            object_lock_legal_hold_status: obj_meta
                .object_lock_legal_hold
                .filter(|&v| v)
                .map(|_| ObjectLockLegalHoldStatus::from_static("ON")),
            object_lock_mode: obj_meta.object_lock_mode.map(ObjectLockMode::from),
            object_lock_retain_until_date: obj_meta
                .object_lock_retain_until
                .map(chrono_to_timestamp),
            parts_count: obj_parts_count.map(|n| n as i32),
            replication_status: None,
            request_charged: None,
            restore: None,
            sse_customer_algorithm: obj_meta.sse_customer_algorithm,
            sse_customer_key_md5: obj_meta.sse_customer_key_md5,
            ssekms_key_id: obj_meta.sse_kms_key_id,
            server_side_encryption: obj_meta.sse_algorithm.map(ServerSideEncryption::from),
            storage_class: Some(StorageClass::from(obj_storage_class)),
            tag_count: None,
            version_id: obj_version_id,
            website_redirect_location: None,
        };
        Ok(S3Response::new(output))
    }

    /// Head object (get metadata without body).
    pub(crate) async fn handle_head_object(
        &self,
        req: S3Request<HeadObjectInput>,
    ) -> S3Result<S3Response<HeadObjectOutput>> {
        let bucket_name = req.input.bucket;
        let key = req.input.key;

        let bucket = self
            .state
            .get_bucket(&bucket_name)
            .map_err(EngineError::into_s3_error)?;

        let store = bucket.objects.read();
        let obj = if let Some(version_id) = &req.input.version_id {
            store.get_version(&key, version_id).ok_or_else(|| {
                EngineError::NoSuchVersion {
                    key: key.clone(),
                    version_id: version_id.clone(),
                }
                .into_s3_error()
            })?
        } else {
            store
                .get(&key)
                .ok_or_else(|| EngineError::NoSuchKey { key: key.clone() }.into_s3_error())?
        };

        check_read_preconditions(
            &obj.etag,
            obj.last_modified,
            req.input.if_match.as_deref(),
            req.input.if_unmodified_since.as_ref(),
            req.input.if_none_match.as_deref(),
            req.input.if_modified_since.as_ref(),
        )?;

        let obj_version_id = if obj.version_id == "null" {
            None
        } else {
            Some(obj.version_id.clone())
        };

        let output = HeadObjectOutput {
            accept_ranges: Some("bytes".to_owned()),
            archive_status: None,
            bucket_key_enabled: None,
            cache_control: obj.metadata.cache_control.clone(),
            checksum_crc32: None,
            checksum_crc32c: None,
            checksum_crc64nvme: None,
            checksum_sha1: None,
            checksum_sha256: None,
            checksum_type: None,
            content_disposition: obj.metadata.content_disposition.clone(),
            content_encoding: obj.metadata.content_encoding.clone(),
            content_language: obj.metadata.content_language.clone(),
            content_length: Some(obj.size as i64),
            content_range: None,
            content_type: Some(
                obj.metadata
                    .content_type
                    .as_deref()
                    .unwrap_or("application/octet-stream")
                    .parse::<mime::Mime>()
                    .unwrap_or(mime::APPLICATION_OCTET_STREAM),
            ),
            delete_marker: None,
            e_tag: Some(obj.etag.clone()),
            expiration: None,
            expires: None,
            last_modified: Some(chrono_to_timestamp(obj.last_modified)),
            metadata: if obj.metadata.user_metadata.is_empty() {
                None
            } else {
                Some(obj.metadata.user_metadata.clone())
            },
            missing_meta: None,
            object_lock_legal_hold_status: obj
                .metadata
                .object_lock_legal_hold
                .filter(|&v| v)
                .map(|_| ObjectLockLegalHoldStatus::from_static("ON")),
            object_lock_mode: obj
                .metadata
                .object_lock_mode
                .clone()
                .map(ObjectLockMode::from),
            object_lock_retain_until_date: obj
                .metadata
                .object_lock_retain_until
                .map(chrono_to_timestamp),
            parts_count: obj.parts_count.map(|n| n as i32),
            replication_status: None,
            request_charged: None,
            restore: None,
            sse_customer_algorithm: obj.metadata.sse_customer_algorithm.clone(),
            sse_customer_key_md5: obj.metadata.sse_customer_key_md5.clone(),
            ssekms_key_id: obj.metadata.sse_kms_key_id.clone(),
            server_side_encryption: obj
                .metadata
                .sse_algorithm
                .clone()
                .map(ServerSideEncryption::from),
            storage_class: Some(StorageClass::from(obj.storage_class.clone())),
            version_id: obj_version_id,
            website_redirect_location: None,
        };
        Ok(S3Response::new(output))
    }

    /// Delete a single object.
    pub(crate) async fn handle_delete_object(
        &self,
        req: S3Request<DeleteObjectInput>,
    ) -> S3Result<S3Response<DeleteObjectOutput>> {
        let bucket_name = req.input.bucket;
        let key = req.input.key;

        let bucket = self
            .state
            .get_bucket(&bucket_name)
            .map_err(EngineError::into_s3_error)?;

        let bypass_governance = req.input.bypass_governance_retention.unwrap_or(false);
        let _write_guard = self
            .locks
            .write(&bucket_name, &key, req.input.version_id.as_deref())
            .await;

        let (delete_marker_version_id, version_id_to_remove) =
            if let Some(version_id) = &req.input.version_id {
                {
                    let store = bucket.objects.read();
                    if let Some(obj) = store.get_version(&key, version_id) {
                        check_delete_lock(obj, bypass_governance)?;
                    }
                }
                // Delete a specific version.
                let mut store = bucket.objects.write();
                let removed = store.delete_version(&key, version_id);
                if let Some(ref version) = removed {
                    self.storage
                        .delete_object(&bucket_name, &key, version.version_id());
                    self.tags.remove_resource(&crate::collaborators::object_resource_id(
                        &bucket_name,
                        &key,
                        version.version_id(),
                    ));
                }
                let is_dm = removed
                    .as_ref()
                    .is_some_and(crate::state::object::ObjectVersion::is_delete_marker);
                (is_dm, removed.map(|v| v.version_id().to_owned()))
            } else {
                {
                    let store = bucket.objects.read();
                    if let Some(obj) = store.get(&key) {
                        check_delete_lock(obj, bypass_governance)?;
                    }
                }
                // Delete without version: in versioned bucket, create delete marker.
                let mut store = bucket.objects.write();
                let (dm_id, _had) = store.delete_versioned(&key, &InternalOwner::default());
                if dm_id.is_none() {
                    // Un-versioned bucket: remove the storage data and its tags.
                    self.storage.delete_object(&bucket_name, &key, "null");
                    self.tags.remove_resource(&crate::collaborators::object_resource_id(
                        &bucket_name,
                        &key,
                        "null",
                    ));
                }
                (dm_id.is_some(), dm_id)
            };

        self.notifications.dispatch(crate::collaborators::ObjectEvent {
            name: if delete_marker_version_id {
                "s3:ObjectRemoved:DeleteMarkerCreated".to_owned()
            } else {
                "s3:ObjectRemoved:Delete".to_owned()
            },
            bucket: bucket_name.clone(),
            key: key.clone(),
            version_id: version_id_to_remove.clone(),
            size: None,
        });

        debug!(bucket = %bucket_name, key = %key, "delete_object completed");

        let output = DeleteObjectOutput {
            delete_marker: if delete_marker_version_id {
                Some(true)
            } else {
                None
            },
            request_charged: None,
            version_id: version_id_to_remove,
        };
        Ok(S3Response::new(output))
    }

    /// Delete multiple objects (bulk delete).
    pub(crate) async fn handle_delete_objects(
        &self,
        req: S3Request<DeleteObjectsInput>,
    ) -> S3Result<S3Response<DeleteObjectsOutput>> {
        let bucket_name = req.input.bucket;

        let bucket = self
            .state
            .get_bucket(&bucket_name)
            .map_err(EngineError::into_s3_error)?;

        let delete_request = req.input.delete;

        let objects = delete_request.objects;
        let quiet = delete_request.quiet.unwrap_or(false);

        let mut deleted: Vec<DeletedObject> = Vec::with_capacity(objects.len());
        let errors: Vec<Error> = Vec::new();

        for obj_id in objects {
            let key = obj_id.key;
            let version_id = obj_id.version_id;

            if let Some(vid) = &version_id {
                // Delete a specific version.
                let mut store = bucket.objects.write();
                let removed = store.delete_version(&key, vid);
                if let Some(ref version) = removed {
                    self.storage
                        .delete_object(&bucket_name, &key, version.version_id());
                    self.tags
                        .remove_resource(&crate::collaborators::object_resource_id(&bucket_name, &key, vid));
                }
                let is_dm = removed
                    .as_ref()
                    .is_some_and(crate::state::object::ObjectVersion::is_delete_marker);
                self.notifications.dispatch(crate::collaborators::ObjectEvent {
                    name: if is_dm {
                        "s3:ObjectRemoved:DeleteMarkerCreated".to_owned()
                    } else {
                        "s3:ObjectRemoved:Delete".to_owned()
                    },
                    bucket: bucket_name.clone(),
                    key: key.clone(),
                    version_id: Some(vid.clone()),
                    size: None,
                });
                deleted.push(DeletedObject {
                    delete_marker: if is_dm { Some(true) } else { None },
                    delete_marker_version_id: if is_dm { Some(vid.clone()) } else { None },
                    key: Some(key),
                    version_id: Some(vid.clone()),
                });
            } else {
                // Delete without version.
                let mut store = bucket.objects.write();
                let (dm_id, _had) = store.delete_versioned(&key, &InternalOwner::default());
                if dm_id.is_none() {
                    self.storage.delete_object(&bucket_name, &key, "null");
                    self.tags
                        .remove_resource(&crate::collaborators::object_resource_id(&bucket_name, &key, "null"));
                }
                self.notifications.dispatch(crate::collaborators::ObjectEvent {
                    name: if dm_id.is_some() {
                        "s3:ObjectRemoved:DeleteMarkerCreated".to_owned()
                    } else {
                        "s3:ObjectRemoved:Delete".to_owned()
                    },
                    bucket: bucket_name.clone(),
                    key: key.clone(),
                    version_id: dm_id.clone(),
                    size: None,
                });
                deleted.push(DeletedObject {
                    delete_marker: dm_id.as_ref().map(|_| true),
                    delete_marker_version_id: dm_id.clone(),
                    key: Some(key),
                    version_id: dm_id,
                });
            }
        }

        debug!(
            bucket = %bucket_name,
            deleted_count = deleted.len(),
            error_count = errors.len(),
            "delete_objects completed"
        );

        let output = DeleteObjectsOutput {
            deleted: if quiet { None } else { Some(deleted) },
            errors: if errors.is_empty() {
                None
            } else {
                Some(errors)
            },
            request_charged: None,
        };
        Ok(S3Response::new(output))
    }

    /// Copy an object from a source to a destination.
    #[allow(clippy::too_many_lines)]
    pub(crate) async fn handle_copy_object(
        &self,
        req: S3Request<CopyObjectInput>,
    ) -> S3Result<S3Response<CopyObjectOutput>> {
        let dst_bucket = req.input.bucket.clone();
        let dst_key = req.input.key.clone();

        validate_object_key(&dst_key).map_err(EngineError::into_s3_error)?;
        if let Some(class) = &req.input.storage_class {
            validate_storage_class(class.as_str()).map_err(EngineError::into_s3_error)?;
        }

        // Held for the remainder of the copy so a racing write to the same
        // destination key serializes behind this one.
        let _dst_write_guard = self.locks.write(&dst_bucket, &dst_key, None).await;

        let (src_bucket, src_key, src_version_id) = match &req.input.copy_source {
            CopySource::Bucket {
                bucket,
                key,
                version_id,
            } => (
                bucket.to_string(),
                key.to_string(),
                version_id.as_ref().map(std::string::ToString::to_string),
            ),
            CopySource::AccessPoint { .. } => {
                return Err(s3s::s3_error!(
                    NotImplemented,
                    "AccessPoint copy source is not supported"
                ));
            }
        };

        // Look up source object to get its metadata.
        // Keep this entire block synchronous -- no awaits while the lock is held.
        let (src_metadata, src_version_for_storage) = {
            let src_bucket_ref = self
                .state
                .get_bucket(&src_bucket)
                .map_err(EngineError::into_s3_error)?;

            let src_store = src_bucket_ref.objects.read();
            let src_obj = if let Some(ref vid) = src_version_id {
                src_store.get_version(&src_key, vid).ok_or_else(|| {
                    EngineError::NoSuchVersion {
                        key: src_key.clone(),
                        version_id: vid.clone(),
                    }
                    .into_s3_error()
                })?
            } else {
                src_store.get(&src_key).ok_or_else(|| {
                    EngineError::NoSuchKey {
                        key: src_key.clone(),
                    }
                    .into_s3_error()
                })?
            };

            (src_obj.metadata.clone(), src_obj.version_id.clone())
        };

        // Determine destination versioning.
        let dst_bucket_ref = self
            .state
            .get_bucket(&dst_bucket)
            .map_err(EngineError::into_s3_error)?;

        let dst_version_id = if dst_bucket_ref.is_versioning_enabled() {
            crate::utils::generate_version_id()
        } else {
            "null".to_owned()
        };

        // Drop the bucket ref before await to avoid holding it across await points.
        drop(dst_bucket_ref);

        // Copy storage data.
        let write_result = self
            .storage
            .copy_object(
                &src_bucket,
                &src_key,
                &src_version_for_storage,
                &dst_bucket,
                &dst_key,
                &dst_version_id,
            )
            .await
            .map_err(|e| EngineError::Internal(anyhow::anyhow!("{e}")).into_s3_error())?;

        // Determine metadata: use source metadata unless MetadataDirective is REPLACE.
        let metadata = if req
            .input
            .metadata_directive
            .as_ref()
            .is_some_and(|d| d.as_str() == "REPLACE")
        {
            build_metadata_for_copy(&req.input, &req.headers).0
        } else {
            src_metadata
        };

        // The tagging directive is independent of the metadata directive: COPY
        // (the default) carries the source object's tags forward, REPLACE
        // applies the tags parsed from the `x-amz-tagging` header instead.
        let dst_tags = if req
            .input
            .tagging_directive
            .as_ref()
            .is_some_and(|d| d.as_str() == "REPLACE")
        {
            req.input
                .tagging
                .as_ref()
                .map(|t| parse_tagging_header(t.as_str()))
                .unwrap_or_default()
        } else {
            self.tags.list_tags_for_resource(&crate::collaborators::object_resource_id(
                &src_bucket,
                &src_key,
                &src_version_for_storage,
            ))
        };

        let storage_class = req
            .input
            .storage_class
            .as_ref()
            .map_or_else(|| "STANDARD".to_owned(), |s| s.as_str().to_owned());

        let now = Utc::now();
        let dst_obj = S3Object {
            key: dst_key.clone(),
            version_id: dst_version_id.clone(),
            etag: write_result.etag.clone(),
            size: write_result.size,
            last_modified: now,
            internal_last_modified: now,
            storage_class,
            metadata,
            owner: InternalOwner::default(),
            checksum: None,
            parts_count: None,
            part_etags: Vec::new(),
            expiration: None,
            restore: None,
        };

        // Re-acquire the bucket ref to store the object.
        let dst_bucket_ref = self
            .state
            .get_bucket(&dst_bucket)
            .map_err(EngineError::into_s3_error)?;
        {
            let mut store = dst_bucket_ref.objects.write();
            store.put(dst_obj);
        }

        if !dst_tags.is_empty() {
            self.tags.tag_resource(
                &crate::collaborators::object_resource_id(&dst_bucket, &dst_key, &dst_version_id),
                dst_tags,
            );
        }

        self.notifications.dispatch(crate::collaborators::ObjectEvent {
            name: "s3:ObjectCreated:Copy".to_owned(),
            bucket: dst_bucket.clone(),
            key: dst_key.clone(),
            version_id: if dst_version_id == "null" {
                None
            } else {
                Some(dst_version_id.clone())
            },
            size: Some(write_result.size),
        });

        debug!(
            src_bucket = %src_bucket,
            src_key = %src_key,
            dst_bucket = %dst_bucket,
            dst_key = %dst_key,
            "copy_object completed"
        );

        let real_version_id = if dst_version_id == "null" {
            None
        } else {
            Some(dst_version_id)
        };

        let copy_result = CopyObjectResult {
            checksum_crc32: None,
            checksum_crc32c: None,
            checksum_crc64nvme: None,
            checksum_sha1: None,
            checksum_sha256: None,
            checksum_type: None,
            e_tag: Some(write_result.etag),
            last_modified: Some(chrono_to_timestamp(now)),
        };

        let output = CopyObjectOutput {
            bucket_key_enabled: None,
            copy_object_result: Some(copy_result),
            copy_source_version_id: src_version_id,
            expiration: None,
            request_charged: None,
            sse_customer_algorithm: None,
            sse_customer_key_md5: None,
            ssekms_encryption_context: None,
            ssekms_key_id: None,
            server_side_encryption: None,
            version_id: real_version_id,
        };
        Ok(S3Response::new(output))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Collect a streaming body into a single [`Bytes`] buffer.
pub(crate) async fn collect_body(body: Option<StreamingBlob>) -> S3Result<Bytes> {
    match body {
        Some(stream) => {
            let mut buf = BytesMut::new();
            let mut stream = stream;
            while let Some(chunk) = stream.try_next().await.map_err(|e| {
                let mut err = s3s::s3_error!(InternalError, "Failed to read body");
                err.set_source(e);
                err
            })? {
                buf.extend_from_slice(&chunk);
            }
            Ok(buf.freeze())
        }
        None => Ok(Bytes::new()),
    }
}

/// Convert an `s3s` wire timestamp to a `chrono::DateTime<Utc>`.
pub(super) fn timestamp_to_chrono(ts: &Timestamp) -> Option<chrono::DateTime<Utc>> {
    let odt: time::OffsetDateTime = ts.clone().into();
    let unix_millis = odt.unix_timestamp() * 1000 + i64::from(odt.millisecond());
    chrono::DateTime::from_timestamp_millis(unix_millis)
}

/// Evaluate write preconditions for `PutObject`/`CompleteMultipartUpload`.
///
/// Only `If-Match: *` rejection and `If-None-Match: *` are meaningful for
/// writes; any other combination (both headers present, or a non-`*`
/// `If-Match`/non-`*` `If-None-Match`) isn't something real S3 accepts for a
/// write and is rejected as unimplemented rather than silently ignored.
fn check_put_preconditions(
    input: &PutObjectInput,
    existing: Option<&S3Object>,
) -> S3Result<()> {
    check_write_preconditions(
        &input.key,
        input.if_match.as_deref(),
        input.if_none_match.as_deref(),
        existing,
    )
}

/// Evaluate write preconditions for `CompleteMultipartUpload`.
///
/// `If-None-Match: *` is evaluated against whether a live object existed at
/// `CreateMultipartUpload` time (`existing_at_create`), not at completion
/// time: an unrelated `PutObject`/`DeleteObject` to the same key during the
/// upload's lifetime must not change the outcome a client locked in when it
/// started the upload. `If-Match`, by contrast, needs the live object to
/// compare an etag against; if that live object was written by a race after
/// this upload started, the mismatch is reported as
/// [`EngineError::ConditionalRequestConflict`] rather than a plain
/// precondition failure, since the client's `If-Match` etag could never have
/// matched the object it raced against.
pub(super) fn check_complete_preconditions(
    if_match: Option<&str>,
    if_none_match: Option<&str>,
    key: &str,
    existing: Option<&S3Object>,
    existing_at_create: bool,
    initiated: chrono::DateTime<Utc>,
) -> S3Result<()> {
    match (if_match, if_none_match) {
        (Some(_), Some(_)) => {
            return Err(s3s::s3_error!(
                NotImplemented,
                "If-Match and If-None-Match together are not supported"
            ));
        }
        (Some("*"), None) => {
            return Err(s3s::s3_error!(
                NotImplemented,
                "If-Match: * is not supported for writes"
            ));
        }
        (None, Some(inm)) if inm != "*" => {
            return Err(s3s::s3_error!(
                NotImplemented,
                "If-None-Match other than * is not supported for writes"
            ));
        }
        _ => {}
    }

    if if_none_match == Some("*") && existing_at_create {
        return Err(EngineError::PreconditionFailed.into_s3_error());
    }

    if let Some(etag) = if_match {
        match existing {
            None => {
                return Err(EngineError::NoSuchKey {
                    key: key.to_owned(),
                }
                .into_s3_error());
            }
            Some(obj) if obj.last_modified > initiated => {
                return Err(EngineError::ConditionalRequestConflict.into_s3_error());
            }
            Some(obj) if !is_valid_if_match(&obj.etag, etag) => {
                return Err(EngineError::PreconditionFailed.into_s3_error());
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// Shared write-precondition evaluation used by PUT and CompleteMultipartUpload.
fn check_write_preconditions(
    key: &str,
    if_match: Option<&str>,
    if_none_match: Option<&str>,
    existing: Option<&S3Object>,
) -> S3Result<()> {
    match (if_match, if_none_match) {
        (Some(_), Some(_)) => {
            return Err(s3s::s3_error!(
                NotImplemented,
                "If-Match and If-None-Match together are not supported"
            ));
        }
        (Some("*"), None) => {
            return Err(s3s::s3_error!(
                NotImplemented,
                "If-Match: * is not supported for writes"
            ));
        }
        (None, Some(inm)) if inm != "*" => {
            return Err(s3s::s3_error!(
                NotImplemented,
                "If-None-Match other than * is not supported for writes"
            ));
        }
        _ => {}
    }

    if if_none_match == Some("*") && existing.is_some() {
        return Err(EngineError::PreconditionFailed.into_s3_error());
    }

    if let Some(etag) = if_match {
        match existing {
            None => {
                return Err(EngineError::NoSuchKey {
                    key: key.to_owned(),
                }
                .into_s3_error());
            }
            Some(obj) if !is_valid_if_match(&obj.etag, etag) => {
                return Err(EngineError::PreconditionFailed.into_s3_error());
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// Evaluate read preconditions for `GetObject`/`HeadObject` in the order AWS
/// specifies: If-Match, then If-Unmodified-Since, then If-None-Match, then
/// If-Modified-Since.
fn check_read_preconditions(
    etag: &str,
    last_modified: chrono::DateTime<Utc>,
    if_match: Option<&str>,
    if_unmodified_since: Option<&Timestamp>,
    if_none_match: Option<&str>,
    if_modified_since: Option<&Timestamp>,
) -> S3Result<()> {
    if let Some(im) = if_match {
        if !is_valid_if_match(etag, im) {
            return Err(EngineError::PreconditionFailed.into_s3_error());
        }
    }

    if let Some(ius) = if_unmodified_since.and_then(timestamp_to_chrono) {
        if last_modified > ius {
            return Err(EngineError::PreconditionFailed.into_s3_error());
        }
    }

    if let Some(inm) = if_none_match {
        if is_valid_if_none_match(etag, inm) {
            return Err(s3s::s3_error!(NotModified));
        }
    }

    if let Some(ims) = if_modified_since.and_then(timestamp_to_chrono) {
        if last_modified <= ims {
            return Err(s3s::s3_error!(NotModified));
        }
    }

    Ok(())
}

/// Reject a delete against an object-lock-protected version unless the
/// caller supplied `x-amz-bypass-governance-retention` and the hold is only
/// a GOVERNANCE retention (legal hold and COMPLIANCE retention never bypass).
fn check_delete_lock(obj: &S3Object, bypass_governance: bool) -> S3Result<()> {
    if obj.metadata.object_lock_legal_hold == Some(true) {
        return Err(EngineError::AccessDenied.into_s3_error());
    }

    if let Some(retain_until) = obj.metadata.object_lock_retain_until {
        if retain_until > Utc::now() {
            let mode = obj.metadata.object_lock_mode.as_deref().unwrap_or("");
            let bypassable = mode == "GOVERNANCE" && bypass_governance;
            if !bypassable {
                return Err(EngineError::AccessDenied.into_s3_error());
            }
        }
    }

    Ok(())
}

/// Build [`ObjectMetadata`] from a `PutObjectInput` and request headers,
/// along with the tag pairs parsed from the `x-amz-tagging` header (tags
/// live in the engine's resource-id-keyed tag table, not on the metadata
/// record itself).
fn build_metadata(
    input: &PutObjectInput,
    headers: &http::HeaderMap,
) -> (ObjectMetadata, Vec<(String, String)>) {
    let user_metadata = input.metadata.clone().unwrap_or_default();

    let tagging = input
        .tagging
        .as_ref()
        .map(|t| parse_tagging_header(t.as_str()))
        .unwrap_or_default();

    let acl = input
        .acl
        .as_ref()
        .and_then(|a| a.as_str().parse::<CannedAcl>().ok())
        .unwrap_or_default();

    let metadata = ObjectMetadata {
        content_type: input
            .content_type
            .as_ref()
            .map(std::string::ToString::to_string),
        content_encoding: input.content_encoding.clone(),
        content_disposition: input.content_disposition.clone(),
        content_language: input.content_language.clone(),
        cache_control: input.cache_control.clone(),
        expires: input.expires.as_ref().map(|_| {
            headers
                .get("expires")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_owned()
        }),
        user_metadata,
        sse_algorithm: input
            .server_side_encryption
            .as_ref()
            .map(|s| s.as_str().to_owned()),
        sse_kms_key_id: input.ssekms_key_id.clone(),
        sse_bucket_key_enabled: input.bucket_key_enabled,
        sse_customer_algorithm: input.sse_customer_algorithm.clone(),
        sse_customer_key_md5: input.sse_customer_key_md5.clone(),
        acl,
        object_lock_mode: input
            .object_lock_mode
            .as_ref()
            .map(|m| m.as_str().to_owned()),
        object_lock_retain_until: input
            .object_lock_retain_until_date
            .as_ref()
            .and_then(timestamp_to_chrono),
        object_lock_legal_hold: input
            .object_lock_legal_hold_status
            .as_ref()
            .map(|s| s.as_str() == "ON"),
        website_redirect_location: input.website_redirect_location.clone(),
    };

    (metadata, tagging)
}

/// Build [`ObjectMetadata`] for a copy operation with REPLACE directive,
/// along with the tag pairs parsed from the `x-amz-tagging` header. The
/// caller decides whether those tags actually apply, based on the
/// tagging directive.
fn build_metadata_for_copy(
    input: &CopyObjectInput,
    _headers: &http::HeaderMap,
) -> (ObjectMetadata, Option<Vec<(String, String)>>) {
    let user_metadata = input.metadata.clone().unwrap_or_default();

    let tagging = input
        .tagging
        .as_ref()
        .map(|t| parse_tagging_header(t.as_str()));

    let acl = input
        .acl
        .as_ref()
        .and_then(|a| a.as_str().parse::<CannedAcl>().ok())
        .unwrap_or_default();

    let metadata = ObjectMetadata {
        content_type: input
            .content_type
            .as_ref()
            .map(std::string::ToString::to_string),
        content_encoding: input.content_encoding.clone(),
        content_disposition: input.content_disposition.clone(),
        content_language: input.content_language.clone(),
        cache_control: input.cache_control.clone(),
        expires: None,
        user_metadata,
        sse_algorithm: input
            .server_side_encryption
            .as_ref()
            .map(|s| s.as_str().to_owned()),
        sse_kms_key_id: input.ssekms_key_id.clone(),
        sse_bucket_key_enabled: input.bucket_key_enabled,
        sse_customer_algorithm: input.sse_customer_algorithm.clone(),
        sse_customer_key_md5: input.sse_customer_key_md5.clone(),
        acl,
        object_lock_mode: input
            .object_lock_mode
            .as_ref()
            .map(|m| m.as_str().to_owned()),
        object_lock_retain_until: input
            .object_lock_retain_until_date
            .as_ref()
            .and_then(timestamp_to_chrono),
        object_lock_legal_hold: input
            .object_lock_legal_hold_status
            .as_ref()
            .map(|s| s.as_str() == "ON"),
        website_redirect_location: input.website_redirect_location.clone(),
    };

    (metadata, tagging)
}

/// Parse the `x-amz-tagging` URL-encoded query string into tag pairs.
pub(super) fn parse_tagging_header(tagging: &str) -> Vec<(String, String)> {
    tagging
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let key = percent_encoding::percent_decode_str(k)
                .decode_utf8()
                .ok()?
                .to_string();
            let value = percent_encoding::percent_decode_str(v)
                .decode_utf8()
                .ok()?
                .to_string();
            Some((key, value))
        })
        .collect()
}

/// Extract checksum data from a `PutObjectInput` if any checksum fields are set.
fn extract_checksum_from_put(input: &PutObjectInput) -> Option<ChecksumData> {
    if let Some(ref v) = input.checksum_crc32 {
        return Some(ChecksumData {
            algorithm: "CRC32".to_owned(),
            value: v.clone(),
            checksum_type: None,
        });
    }
    if let Some(ref v) = input.checksum_crc32c {
        return Some(ChecksumData {
            algorithm: "CRC32C".to_owned(),
            value: v.clone(),
            checksum_type: None,
        });
    }
    if let Some(ref v) = input.checksum_crc64nvme {
        return Some(ChecksumData {
            algorithm: "CRC64NVME".to_owned(),
            value: v.clone(),
            checksum_type: None,
        });
    }
    if let Some(ref v) = input.checksum_sha1 {
        return Some(ChecksumData {
            algorithm: "SHA1".to_owned(),
            value: v.clone(),
            checksum_type: None,
        });
    }
    if let Some(ref v) = input.checksum_sha256 {
        return Some(ChecksumData {
            algorithm: "SHA256".to_owned(),
            value: v.clone(),
            checksum_type: None,
        });
    }
    None
}
