//! Request-level validation: bucket names, object keys, tags, user metadata,
//! storage classes, checksum algorithms, and SSE coherency.
//!
//! Most of these rules mirror what AWS documents for the real service; a few
//! (storage class, checksum algorithm, SSE-C/SSE-KMS coherency) exist because
//! this engine tracks server-side-encryption and checksum state that the
//! wire protocol alone doesn't enforce.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::net::Ipv4Addr;

use base64::Engine;
use md5::{Digest, Md5};

use crate::error::EngineError;

const MAX_TAGS: usize = 10;
const MAX_TAG_KEY_LEN: usize = 128;
const MAX_TAG_VALUE_LEN: usize = 256;
const MAX_METADATA_SIZE: usize = 2048;
const MAX_KEY_BYTES: usize = 1024;
const MIN_BUCKET_NAME_LEN: usize = 3;
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Storage classes this engine accepts. `OUTPOSTS` is a real AWS value but
/// requires a physical Outposts rack, which this engine has no model for.
const VALID_STORAGE_CLASSES: &[&str] = &[
    "STANDARD",
    "REDUCED_REDUNDANCY",
    "STANDARD_IA",
    "ONEZONE_IA",
    "INTELLIGENT_TIERING",
    "GLACIER",
    "DEEP_ARCHIVE",
    "GLACIER_IR",
];

/// Checksum algorithms accepted on `x-amz-checksum-algorithm`.
const VALID_CHECKSUM_ALGORITHMS: &[&str] = &["CRC32", "CRC32C", "SHA1", "SHA256", "CRC64NVME"];

fn bucket_name_error(name: &str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidBucketName {
        name: name.to_owned(),
        reason: reason.into(),
    }
}

/// Validate an S3 bucket name against the AWS bucket-naming rules: 3-63
/// lowercase alphanumeric/hyphen/dot characters, starting and ending with a
/// letter or digit, no consecutive dots, not an IPv4 literal, and none of the
/// reserved `xn--`/`sthree-`/`-s3alias` prefixes or suffixes.
///
/// # Errors
///
/// Returns [`EngineError::InvalidBucketName`] describing the first rule that
/// the name fails.
///
/// # Examples
///
/// ```
/// use s3vault_engine::validation::validate_bucket_name;
///
/// assert!(validate_bucket_name("my-valid-bucket").is_ok());
/// assert!(validate_bucket_name("AB").is_err());
/// ```
pub fn validate_bucket_name(name: &str) -> Result<(), EngineError> {
    let len = name.len();
    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return Err(bucket_name_error(
            name,
            format!("must be between {MIN_BUCKET_NAME_LEN} and {MAX_BUCKET_NAME_LEN} characters long"),
        ));
    }

    let is_label_char = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.';
    if !name.bytes().all(is_label_char) {
        return Err(bucket_name_error(
            name,
            "must only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }

    let is_alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let bytes = name.as_bytes();
    if !is_alnum(bytes[0]) || !is_alnum(bytes[len - 1]) {
        return Err(bucket_name_error(name, "must start and end with a letter or number"));
    }

    if name.contains("..") {
        return Err(bucket_name_error(name, "must not contain consecutive dots"));
    }

    if name.parse::<Ipv4Addr>().is_ok() {
        return Err(bucket_name_error(name, "must not be formatted as an IP address"));
    }

    for (prefix, reason) in [
        ("xn--", "must not start with 'xn--'"),
        ("sthree-", "must not start with 'sthree-'"),
    ] {
        if name.starts_with(prefix) {
            return Err(bucket_name_error(name, reason));
        }
    }

    if name.ends_with("-s3alias") {
        return Err(bucket_name_error(name, "must not end with '-s3alias'"));
    }

    Ok(())
}

/// Validate an S3 object key: non-empty and at most 1024 bytes (UTF-8
/// validity is already enforced by the `&str` type).
///
/// # Errors
///
/// Returns [`EngineError::InvalidArgument`] for an empty key, or
/// [`EngineError::KeyTooLong`] past the 1024-byte limit.
///
/// # Examples
///
/// ```
/// use s3vault_engine::validation::validate_object_key;
///
/// assert!(validate_object_key("photos/2024/image.jpg").is_ok());
/// assert!(validate_object_key("").is_err());
/// ```
pub fn validate_object_key(key: &str) -> Result<(), EngineError> {
    if key.is_empty() {
        return Err(EngineError::InvalidArgument {
            message: "object key must not be empty".to_owned(),
        });
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(EngineError::KeyTooLong);
    }
    Ok(())
}

/// Validate a single tag key (1-128 characters).
///
/// # Errors
///
/// Returns [`EngineError::InvalidTag`] if the key is empty or too long.
pub fn validate_tag_key(key: &str) -> Result<(), EngineError> {
    let count = key.chars().count();
    if count == 0 {
        return Err(EngineError::InvalidTag {
            message: "tag key must not be empty".to_owned(),
        });
    }
    if count > MAX_TAG_KEY_LEN {
        return Err(EngineError::InvalidTag {
            message: format!("tag key must not exceed {MAX_TAG_KEY_LEN} characters, got {count}"),
        });
    }
    Ok(())
}

/// Validate a single tag value (0-256 characters; empty values are allowed).
///
/// # Errors
///
/// Returns [`EngineError::InvalidTag`] if the value is too long.
pub fn validate_tag_value(value: &str) -> Result<(), EngineError> {
    let count = value.chars().count();
    if count > MAX_TAG_VALUE_LEN {
        return Err(EngineError::InvalidTag {
            message: format!("tag value must not exceed {MAX_TAG_VALUE_LEN} characters, got {count}"),
        });
    }
    Ok(())
}

/// Validate a full tag set: at most 10 pairs, each key/value within bounds.
///
/// # Errors
///
/// Returns [`EngineError::InvalidTag`] if the set is oversized or any pair
/// fails [`validate_tag_key`]/[`validate_tag_value`].
///
/// # Examples
///
/// ```
/// use s3vault_engine::validation::validate_tags;
///
/// let tags = vec![("env".to_owned(), "prod".to_owned())];
/// assert!(validate_tags(&tags).is_ok());
/// ```
pub fn validate_tags(tags: &[(String, String)]) -> Result<(), EngineError> {
    if tags.len() > MAX_TAGS {
        return Err(EngineError::InvalidTag {
            message: format!("a resource cannot have more than {MAX_TAGS} tags, got {}", tags.len()),
        });
    }
    tags.iter().try_for_each(|(k, v)| {
        validate_tag_key(k)?;
        validate_tag_value(v)
    })
}

/// Validate user-defined metadata: combined key+value size must not exceed
/// 2 KB, matching the limit S3 enforces on `x-amz-meta-*` headers.
///
/// # Errors
///
/// Returns [`EngineError::InvalidArgument`] if the total size is too large.
pub fn validate_metadata<S: BuildHasher>(metadata: &HashMap<String, String, S>) -> Result<(), EngineError> {
    let total_size: usize = metadata.iter().map(|(k, v)| k.len() + v.len()).sum();
    if total_size > MAX_METADATA_SIZE {
        return Err(EngineError::InvalidArgument {
            message: format!("user-defined metadata must not exceed {MAX_METADATA_SIZE} bytes, got {total_size}"),
        });
    }
    Ok(())
}

/// Validate the `Content-MD5` header against the request body, if present.
///
/// # Errors
///
/// Returns [`EngineError::InvalidDigest`] if the header isn't valid Base64,
/// or [`EngineError::BadDigest`] if the decoded digest doesn't match the body.
pub fn validate_content_md5(content_md5: Option<&str>, body: &[u8]) -> Result<(), EngineError> {
    let Some(expected_b64) = content_md5 else {
        return Ok(());
    };

    let expected_bytes = base64::engine::general_purpose::STANDARD
        .decode(expected_b64)
        .map_err(|_| EngineError::InvalidDigest)?;

    if Md5::digest(body).as_slice() != expected_bytes {
        return Err(EngineError::BadDigest);
    }
    Ok(())
}

/// Validate a requested storage class. Rejects unknown values and
/// `OUTPOSTS`, which this engine has no backing rack to honor.
///
/// # Errors
///
/// Returns [`EngineError::InvalidStorageClass`] for anything outside
/// [`VALID_STORAGE_CLASSES`].
///
/// # Examples
///
/// ```
/// use s3vault_engine::validation::validate_storage_class;
///
/// assert!(validate_storage_class("STANDARD").is_ok());
/// assert!(validate_storage_class("OUTPOSTS").is_err());
/// ```
pub fn validate_storage_class(class: &str) -> Result<(), EngineError> {
    if VALID_STORAGE_CLASSES.contains(&class) {
        Ok(())
    } else {
        Err(EngineError::InvalidStorageClass)
    }
}

/// Validate a requested checksum algorithm name.
///
/// # Errors
///
/// Returns [`EngineError::InvalidArgument`] if the algorithm isn't one of
/// `CRC32`, `CRC32C`, `SHA1`, `SHA256`, or `CRC64NVME`.
pub fn validate_checksum_algorithm(algorithm: &str) -> Result<(), EngineError> {
    if VALID_CHECKSUM_ALGORITHMS.contains(&algorithm) {
        Ok(())
    } else {
        Err(EngineError::InvalidArgument {
            message: format!("unsupported checksum algorithm: {algorithm}"),
        })
    }
}

/// Validate that server-side-encryption-with-customer-keys (SSE-C) headers
/// are not mixed with SSE-S3/SSE-KMS on the same request. AWS treats this
/// combination as mutually exclusive and rejects it outright.
///
/// # Errors
///
/// Returns [`EngineError::InvalidArgument`] if both are present.
pub fn validate_sse_coherency(
    sse_algorithm: Option<&str>,
    sse_customer_algorithm: Option<&str>,
) -> Result<(), EngineError> {
    if sse_algorithm.is_some() && sse_customer_algorithm.is_some() {
        return Err(EngineError::InvalidArgument {
            message: "server-side encryption and SSE-C headers are mutually exclusive".to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_accept_valid_bucket_names() {
        let long_name = "a".repeat(63);
        for name in ["my-bucket", "abc", "a-b-c", "bucket.with.dots", "123bucket", "bucket123", long_name.as_str()] {
            assert!(validate_bucket_name(name).is_ok(), "expected valid: {name}");
        }
    }

    #[test]
    fn test_should_reject_short_bucket_name() {
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("").is_err());
    }

    #[test]
    fn test_should_reject_long_bucket_name() {
        assert!(validate_bucket_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_should_reject_uppercase_bucket_name() {
        assert!(validate_bucket_name("MyBucket").is_err());
    }

    #[test]
    fn test_should_reject_edge_hyphen_bucket_names() {
        assert!(validate_bucket_name("-bucket").is_err());
        assert!(validate_bucket_name("bucket-").is_err());
    }

    #[test]
    fn test_should_reject_consecutive_dots_in_bucket_name() {
        assert!(validate_bucket_name("my..bucket").is_err());
    }

    #[test]
    fn test_should_reject_ip_address_bucket_name() {
        assert!(validate_bucket_name("192.168.1.1").is_err());
    }

    #[test]
    fn test_should_reject_reserved_bucket_name_affixes() {
        assert!(validate_bucket_name("xn--example").is_err());
        assert!(validate_bucket_name("mybucket-s3alias").is_err());
        assert!(validate_bucket_name("sthree-bucket").is_err());
    }

    #[test]
    fn test_should_accept_valid_object_keys() {
        assert!(validate_object_key("a").is_ok());
        assert!(validate_object_key("photos/2024/image.jpg").is_ok());
        assert!(validate_object_key(&"k".repeat(1024)).is_ok());
    }

    #[test]
    fn test_should_reject_empty_object_key() {
        assert!(validate_object_key("").is_err());
    }

    #[test]
    fn test_should_reject_too_long_object_key() {
        assert!(validate_object_key(&"k".repeat(1025)).is_err());
    }

    #[test]
    fn test_should_accept_valid_tag_key() {
        assert!(validate_tag_key("environment").is_ok());
        assert!(validate_tag_key(&"k".repeat(128)).is_ok());
    }

    #[test]
    fn test_should_reject_invalid_tag_key() {
        assert!(validate_tag_key("").is_err());
        assert!(validate_tag_key(&"k".repeat(129)).is_err());
    }

    #[test]
    fn test_should_accept_valid_tag_value() {
        assert!(validate_tag_value("").is_ok());
        assert!(validate_tag_value(&"v".repeat(256)).is_ok());
    }

    #[test]
    fn test_should_reject_too_long_tag_value() {
        assert!(validate_tag_value(&"v".repeat(257)).is_err());
    }

    #[test]
    fn test_should_accept_valid_tag_set() {
        let tags: Vec<(String, String)> = (0..10).map(|i| (format!("key{i}"), format!("val{i}"))).collect();
        assert!(validate_tags(&tags).is_ok());
    }

    #[test]
    fn test_should_reject_too_many_tags() {
        let tags: Vec<(String, String)> = (0..11).map(|i| (format!("key{i}"), format!("val{i}"))).collect();
        assert!(validate_tags(&tags).is_err());
    }

    #[test]
    fn test_should_reject_tags_with_invalid_key_or_value() {
        assert!(validate_tags(&[(String::new(), "v".to_owned())]).is_err());
        assert!(validate_tags(&[("k".to_owned(), "v".repeat(257))]).is_err());
    }

    #[test]
    fn test_should_accept_valid_metadata() {
        let mut meta = HashMap::new();
        meta.insert("color".to_owned(), "blue".to_owned());
        assert!(validate_metadata(&meta).is_ok());
        assert!(validate_metadata(&HashMap::<String, String>::new()).is_ok());
    }

    #[test]
    fn test_should_reject_oversized_metadata() {
        let mut meta = HashMap::new();
        meta.insert("key".to_owned(), "v".repeat(2048));
        assert!(validate_metadata(&meta).is_err());
    }

    #[test]
    fn test_should_accept_metadata_at_limit() {
        let mut meta = HashMap::new();
        meta.insert("key".to_owned(), "v".repeat(2045));
        assert!(validate_metadata(&meta).is_ok());
    }

    #[test]
    fn test_should_accept_absent_content_md5() {
        assert!(validate_content_md5(None, b"any body").is_ok());
    }

    #[test]
    fn test_should_accept_correct_content_md5() {
        let body = b"hello world";
        let digest = base64::engine::general_purpose::STANDARD.encode(Md5::digest(body));
        assert!(validate_content_md5(Some(&digest), body).is_ok());
    }

    #[test]
    fn test_should_reject_wrong_content_md5() {
        let body = b"hello world";
        let wrong = base64::engine::general_purpose::STANDARD.encode(Md5::digest(b"wrong"));
        assert!(matches!(validate_content_md5(Some(&wrong), body), Err(EngineError::BadDigest)));
    }

    #[test]
    fn test_should_reject_invalid_base64_content_md5() {
        assert!(matches!(
            validate_content_md5(Some("not-valid-base64!!!"), b"body"),
            Err(EngineError::InvalidDigest)
        ));
    }

    #[test]
    fn test_should_validate_storage_classes() {
        assert!(validate_storage_class("STANDARD").is_ok());
        assert!(validate_storage_class("GLACIER").is_ok());
        assert!(matches!(validate_storage_class("OUTPOSTS"), Err(EngineError::InvalidStorageClass)));
        assert!(matches!(validate_storage_class("BOGUS"), Err(EngineError::InvalidStorageClass)));
    }

    #[test]
    fn test_should_validate_checksum_algorithms() {
        assert!(validate_checksum_algorithm("SHA256").is_ok());
        assert!(validate_checksum_algorithm("MD5").is_err());
    }

    #[test]
    fn test_should_reject_mixed_sse_and_sse_c() {
        assert!(validate_sse_coherency(Some("aws:kms"), Some("AES256")).is_err());
        assert!(validate_sse_coherency(Some("aws:kms"), None).is_ok());
        assert!(validate_sse_coherency(None, Some("AES256")).is_ok());
        assert!(validate_sse_coherency(None, None).is_ok());
    }
}
