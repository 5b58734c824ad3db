//! S3-specific error types.
//!
//! Defines [`EngineError`], a domain-specific error enum covering all S3
//! error codes that s3vault may produce. Each variant maps to a concrete
//! [`s3s::S3ErrorCode`] and HTTP status code through the [`From`]
//! implementation, making it easy to convert domain errors into s3s wire
//! errors.
//!
//! # Usage
//!
//! ```
//! use s3vault_engine::error::EngineError;
//!
//! let err = EngineError::NoSuchBucket {
//!     bucket: "my-bucket".to_owned(),
//! };
//! let s3_err: s3s::S3Error = err.into();
//! assert_eq!(s3_err.code(), &s3s::S3ErrorCode::NoSuchBucket);
//! ```

use std::str::FromStr;

use s3s::{S3Error, S3ErrorCode};

/// S3 service error type.
///
/// Each variant corresponds to a well-known S3 error code. Converting to
/// [`s3s::S3Error`] via [`From`] attaches the correct error code and a
/// human-readable message; the HTTP status code is derived automatically by
/// s3s from the error code.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    // -----------------------------------------------------------------------
    // Bucket errors
    // -----------------------------------------------------------------------
    /// The specified bucket does not exist.
    #[error("The specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// The bucket name that was not found.
        bucket: String,
    },

    /// The requested bucket name is not available (owned by another account).
    #[error("The requested bucket name is not available: {bucket}")]
    BucketAlreadyExists {
        /// The bucket name that already exists.
        bucket: String,
    },

    /// The bucket already exists and is owned by you.
    #[error(
        "Your previous request to create the named bucket succeeded and you already own it: {bucket}"
    )]
    BucketAlreadyOwnedByYou {
        /// The bucket name that already exists.
        bucket: String,
    },

    /// The supplied `x-amz-expected-bucket-owner` value is not a well-formed
    /// account ID.
    #[error("The provided AWS Account ID does not match the expected format")]
    InvalidBucketOwnerAWSAccountID,

    /// The bucket is not empty and cannot be deleted.
    #[error("The bucket you tried to delete is not empty: {bucket}")]
    BucketNotEmpty {
        /// The bucket name that is not empty.
        bucket: String,
    },

    // -----------------------------------------------------------------------
    // Object / key errors
    // -----------------------------------------------------------------------
    /// The specified key does not exist.
    #[error("The specified key does not exist: {key}")]
    NoSuchKey {
        /// The key that was not found.
        key: String,
    },

    /// The specified version does not exist.
    #[error("The specified version does not exist: key={key}, version_id={version_id}")]
    NoSuchVersion {
        /// The key for the version.
        key: String,
        /// The version ID that was not found.
        version_id: String,
    },

    // -----------------------------------------------------------------------
    // Multipart upload errors
    // -----------------------------------------------------------------------
    /// The specified multipart upload does not exist.
    #[error("The specified upload does not exist: {upload_id}")]
    NoSuchUpload {
        /// The upload ID that was not found.
        upload_id: String,
    },

    /// The list of parts was not in ascending order.
    #[error("The list of parts was not in ascending order")]
    InvalidPartOrder,

    /// One or more of the specified parts could not be found.
    #[error("One or more of the specified parts could not be found")]
    InvalidPart,

    /// A proposed upload part is smaller than the minimum allowed size.
    #[error("Your proposed upload is smaller than the minimum allowed object size")]
    EntityTooSmall,

    /// The entity body is too large.
    #[error("Your proposed upload exceeds the maximum allowed object size")]
    EntityTooLarge,

    /// The specified part number is not valid.
    #[error("Part number must be an integer between 1 and 10000, inclusive")]
    InvalidPartNumber,

    // -----------------------------------------------------------------------
    // Validation errors
    // -----------------------------------------------------------------------
    /// The specified bucket name is not valid.
    #[error("Invalid bucket name: {name}: {reason}")]
    InvalidBucketName {
        /// The invalid bucket name.
        name: String,
        /// The reason for the error.
        reason: String,
    },

    /// An argument provided is invalid.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// The requested range is not satisfiable.
    #[error("The requested range is not satisfiable")]
    InvalidRange,

    /// A tag key or value is invalid.
    #[error("Invalid tag: {message}")]
    InvalidTag {
        /// Description of the tag error.
        message: String,
    },

    /// The XML body is malformed.
    #[error("The XML you provided was not well-formed")]
    MalformedXml,

    /// The bucket policy document is malformed.
    #[error("Policy has invalid resource")]
    MalformedPolicy,

    /// The specified location constraint is not valid.
    #[error("The specified location constraint is not valid")]
    InvalidLocationConstraint,

    /// The location constraint is not supported for the requested operation.
    #[error(
        "The unspecified location constraint is incompatible for the region specific endpoint this request was sent to"
    )]
    IllegalLocationConstraintException,

    /// The storage class requested is not valid.
    #[error("The storage class you specified is not valid")]
    InvalidStorageClass,

    /// The request contains unexpected content (e.g. a body on a
    /// request that forbids one).
    #[error("This request does not support content")]
    UnexpectedContent,

    /// A required security header is missing from the request.
    #[error("Your request is missing a required header")]
    MissingSecurityHeader,

    // -----------------------------------------------------------------------
    // Authorization / access errors
    // -----------------------------------------------------------------------
    /// Access denied.
    #[error("Access Denied")]
    AccessDenied,

    /// The HTTP method is not allowed against this resource.
    #[error("The specified method is not allowed against this resource")]
    MethodNotAllowed,

    // -----------------------------------------------------------------------
    // Feature / implementation errors
    // -----------------------------------------------------------------------
    /// The requested functionality is not implemented.
    #[error("A header you provided implies functionality that is not implemented")]
    NotImplemented,

    // -----------------------------------------------------------------------
    // Conditional request errors
    // -----------------------------------------------------------------------
    /// A precondition specified in the request was not met.
    #[error("At least one of the preconditions you specified did not hold")]
    PreconditionFailed,

    /// The conditional request cannot be processed.
    #[error("The conditional request cannot be processed")]
    ConditionalRequestConflict,

    // -----------------------------------------------------------------------
    // Object state errors
    // -----------------------------------------------------------------------
    /// The operation is not valid for the object's storage class.
    #[error("The operation is not valid for the object's storage class")]
    InvalidObjectState,

    /// The object is not in an active tier.
    #[error("The source object of the COPY action is not in the active tier")]
    ObjectNotInActiveTierError,

    // -----------------------------------------------------------------------
    // Digest / content errors
    // -----------------------------------------------------------------------
    /// The Content-MD5 you specified is invalid.
    #[error("The Content-MD5 you specified is not valid")]
    InvalidDigest,

    /// The Content-MD5 you specified did not match what we received.
    #[error("The Content-MD5 you specified did not match what we received")]
    BadDigest,

    /// Missing Content-Length header.
    #[error("You must provide the Content-Length HTTP header")]
    MissingContentLength,

    /// The key is too long.
    #[error("Your key is too long")]
    KeyTooLong,

    /// The message body exceeds the maximum length.
    #[error("Your request was too big")]
    MaxMessageLengthExceeded,

    // -----------------------------------------------------------------------
    // Configuration-not-found errors
    // -----------------------------------------------------------------------
    /// The CORS configuration does not exist.
    #[error("The CORS configuration does not exist")]
    NoSuchCorsConfiguration,

    /// The tag set does not exist.
    #[error("The TagSet does not exist")]
    NoSuchTagSet,

    /// The lifecycle configuration does not exist.
    #[error("The lifecycle configuration does not exist")]
    NoSuchLifecycleConfiguration,

    /// The bucket policy does not exist.
    #[error("The bucket policy does not exist")]
    NoSuchBucketPolicy,

    /// The website configuration does not exist.
    #[error("The specified bucket does not have a website configuration")]
    NoSuchWebsiteConfiguration,

    /// The public access block configuration does not exist.
    #[error("The public access block configuration was not found")]
    NoSuchPublicAccessBlockConfiguration,

    /// The server-side encryption configuration does not exist.
    #[error("The server-side encryption configuration was not found")]
    ServerSideEncryptionConfigurationNotFoundError,

    /// The object lock configuration does not exist.
    #[error("Object Lock configuration does not exist for this bucket")]
    ObjectLockConfigurationNotFoundError,

    /// The ownership controls configuration does not exist.
    #[error("The bucket ownership controls were not found")]
    OwnershipControlsNotFoundError,

    /// The replication configuration does not exist.
    #[error("The replication configuration was not found")]
    ReplicationConfigurationNotFoundError,

    // -----------------------------------------------------------------------
    // Internal / catch-all
    // -----------------------------------------------------------------------
    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// Convert this error into an [`s3s::S3Error`].
    ///
    /// This is equivalent to `s3s::S3Error::from(self)` but available as a
    /// method for convenience in chained calls.
    #[must_use]
    pub fn into_s3_error(self) -> S3Error {
        S3Error::from(self)
    }
}

impl From<EngineError> for S3Error {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        let code = error_code(&err);

        S3Error::with_message(code, message)
    }
}

/// Map an [`EngineError`] variant to the corresponding [`S3ErrorCode`].
fn error_code(err: &EngineError) -> S3ErrorCode {
    match err {
        EngineError::NoSuchBucket { .. } => S3ErrorCode::NoSuchBucket,
        EngineError::BucketAlreadyExists { .. } => S3ErrorCode::BucketAlreadyExists,
        EngineError::BucketAlreadyOwnedByYou { .. } => S3ErrorCode::BucketAlreadyOwnedByYou,
        EngineError::InvalidBucketOwnerAWSAccountID => {
            parse_error_code("InvalidBucketOwnerAWSAccountID")
        }
        EngineError::BucketNotEmpty { .. } => S3ErrorCode::BucketNotEmpty,
        EngineError::NoSuchKey { .. } => S3ErrorCode::NoSuchKey,
        EngineError::NoSuchVersion { .. } => S3ErrorCode::NoSuchVersion,
        EngineError::NoSuchUpload { .. } => S3ErrorCode::NoSuchUpload,
        EngineError::InvalidPartOrder => S3ErrorCode::InvalidPartOrder,
        EngineError::InvalidPart => S3ErrorCode::InvalidPart,
        EngineError::EntityTooSmall => S3ErrorCode::EntityTooSmall,
        EngineError::EntityTooLarge => S3ErrorCode::EntityTooLarge,
        EngineError::InvalidPartNumber => S3ErrorCode::InvalidArgument,
        EngineError::InvalidBucketName { .. } => S3ErrorCode::InvalidBucketName,
        EngineError::InvalidArgument { .. } => S3ErrorCode::InvalidArgument,
        EngineError::InvalidRange => S3ErrorCode::InvalidRange,
        EngineError::InvalidTag { .. } => S3ErrorCode::InvalidTag,
        EngineError::MalformedXml => S3ErrorCode::MalformedXML,
        EngineError::MalformedPolicy => parse_error_code("MalformedPolicy"),
        EngineError::InvalidLocationConstraint => parse_error_code("InvalidLocationConstraint"),
        EngineError::IllegalLocationConstraintException => {
            parse_error_code("IllegalLocationConstraintException")
        }
        EngineError::InvalidStorageClass => parse_error_code("InvalidStorageClass"),
        EngineError::UnexpectedContent => parse_error_code("UnexpectedContent"),
        EngineError::MissingSecurityHeader => parse_error_code("MissingSecurityHeader"),
        EngineError::AccessDenied => S3ErrorCode::AccessDenied,
        EngineError::MethodNotAllowed => S3ErrorCode::MethodNotAllowed,
        EngineError::NotImplemented => S3ErrorCode::NotImplemented,
        EngineError::PreconditionFailed => S3ErrorCode::PreconditionFailed,
        EngineError::ConditionalRequestConflict => S3ErrorCode::ConditionalRequestConflict,
        EngineError::InvalidObjectState => S3ErrorCode::InvalidObjectState,
        EngineError::ObjectNotInActiveTierError => {
            // s3s does not have a dedicated variant; use custom code via string parsing.
            parse_error_code("ObjectNotInActiveTierError")
        }
        EngineError::InvalidDigest => S3ErrorCode::InvalidDigest,
        EngineError::BadDigest => S3ErrorCode::BadDigest,
        EngineError::MissingContentLength => S3ErrorCode::MissingContentLength,
        EngineError::KeyTooLong => S3ErrorCode::KeyTooLongError,
        EngineError::MaxMessageLengthExceeded => S3ErrorCode::MaxMessageLengthExceeded,
        EngineError::NoSuchCorsConfiguration => S3ErrorCode::NoSuchCORSConfiguration,
        EngineError::NoSuchTagSet => S3ErrorCode::NoSuchTagSet,
        EngineError::NoSuchLifecycleConfiguration => S3ErrorCode::NoSuchLifecycleConfiguration,
        EngineError::NoSuchBucketPolicy => S3ErrorCode::NoSuchBucketPolicy,
        EngineError::NoSuchWebsiteConfiguration => S3ErrorCode::NoSuchWebsiteConfiguration,
        EngineError::NoSuchPublicAccessBlockConfiguration => {
            // s3s does not have a dedicated variant; use custom code via string parsing.
            // FromStr for S3ErrorCode returns Infallible, so this always succeeds.
            parse_error_code("NoSuchPublicAccessBlockConfiguration")
        }
        EngineError::ServerSideEncryptionConfigurationNotFoundError => {
            S3ErrorCode::ServerSideEncryptionConfigurationNotFoundError
        }
        EngineError::ObjectLockConfigurationNotFoundError => {
            S3ErrorCode::NoSuchObjectLockConfiguration
        }
        EngineError::OwnershipControlsNotFoundError => {
            S3ErrorCode::OwnershipControlsNotFoundError
        }
        EngineError::ReplicationConfigurationNotFoundError => {
            S3ErrorCode::ReplicationConfigurationNotFoundError
        }
        EngineError::Internal(_) => S3ErrorCode::InternalError,
    }
}

/// Parse an error code string into an [`S3ErrorCode`].
///
/// [`S3ErrorCode::from_str`] returns `Result<S3ErrorCode, Infallible>`, so
/// this conversion can never fail. Unknown strings become
/// `S3ErrorCode::Custom(...)`.
fn parse_error_code(code: &str) -> S3ErrorCode {
    // Infallible means this match arm is unreachable, but we handle it
    // for completeness.
    match S3ErrorCode::from_str(code) {
        Ok(c) => c,
        Err(infallible) => match infallible {},
    }
}

/// Convenience result type for S3 service operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_convert_no_such_bucket_to_s3_error() {
        let err = EngineError::NoSuchBucket {
            bucket: "my-bucket".to_owned(),
        };
        let s3_err: S3Error = err.into();
        assert_eq!(s3_err.code(), &S3ErrorCode::NoSuchBucket);
        assert!(s3_err.message().is_some_and(|m| m.contains("my-bucket")),);
    }

    #[test]
    fn test_should_convert_no_such_key_to_s3_error() {
        let err = EngineError::NoSuchKey {
            key: "path/to/obj".to_owned(),
        };
        let s3_err: S3Error = err.into();
        assert_eq!(s3_err.code(), &S3ErrorCode::NoSuchKey);
    }

    #[test]
    fn test_should_convert_bucket_already_exists_to_s3_error() {
        let err = EngineError::BucketAlreadyExists {
            bucket: "taken".to_owned(),
        };
        let s3_err: S3Error = err.into();
        assert_eq!(s3_err.code(), &S3ErrorCode::BucketAlreadyExists);
    }

    #[test]
    fn test_should_convert_bucket_already_owned_to_s3_error() {
        let err = EngineError::BucketAlreadyOwnedByYou {
            bucket: "mine".to_owned(),
        };
        let s3_err: S3Error = err.into();
        assert_eq!(s3_err.code(), &S3ErrorCode::BucketAlreadyOwnedByYou);
    }

    #[test]
    fn test_should_convert_bucket_not_empty_to_s3_error() {
        let err = EngineError::BucketNotEmpty {
            bucket: "full".to_owned(),
        };
        let s3_err: S3Error = err.into();
        assert_eq!(s3_err.code(), &S3ErrorCode::BucketNotEmpty);
    }

    #[test]
    fn test_should_convert_invalid_bucket_name_to_s3_error() {
        let err = EngineError::InvalidBucketName {
            name: "BAD".to_owned(),
            reason: "uppercase".to_owned(),
        };
        let s3_err: S3Error = err.into();
        assert_eq!(s3_err.code(), &S3ErrorCode::InvalidBucketName);
    }

    #[test]
    fn test_should_convert_entity_too_small_to_s3_error() {
        let err = EngineError::EntityTooSmall;
        let s3_err: S3Error = err.into();
        assert_eq!(s3_err.code(), &S3ErrorCode::EntityTooSmall);
    }

    #[test]
    fn test_should_convert_access_denied_to_s3_error() {
        let err = EngineError::AccessDenied;
        let s3_err: S3Error = err.into();
        assert_eq!(s3_err.code(), &S3ErrorCode::AccessDenied);
    }

    #[test]
    fn test_should_convert_internal_error_to_s3_error() {
        let err = EngineError::Internal(anyhow::anyhow!("disk I/O failure"));
        let s3_err: S3Error = err.into();
        assert_eq!(s3_err.code(), &S3ErrorCode::InternalError);
    }

    #[test]
    fn test_should_use_into_s3_error_method() {
        let err = EngineError::InvalidRange;
        let s3_err = err.into_s3_error();
        assert_eq!(s3_err.code(), &S3ErrorCode::InvalidRange);
    }

    #[test]
    fn test_should_convert_no_such_upload_to_s3_error() {
        let err = EngineError::NoSuchUpload {
            upload_id: "abc123".to_owned(),
        };
        let s3_err: S3Error = err.into();
        assert_eq!(s3_err.code(), &S3ErrorCode::NoSuchUpload);
    }

    #[test]
    fn test_should_convert_precondition_failed_to_s3_error() {
        let err = EngineError::PreconditionFailed;
        let s3_err: S3Error = err.into();
        assert_eq!(s3_err.code(), &S3ErrorCode::PreconditionFailed);
    }

    #[test]
    fn test_should_convert_invalid_storage_class_to_s3_error() {
        let err = EngineError::InvalidStorageClass;
        let s3_err: S3Error = err.into();
        assert_eq!(s3_err.code().as_str(), "InvalidStorageClass");
    }

    #[test]
    fn test_should_convert_invalid_part_number_to_s3_error() {
        let err = EngineError::InvalidPartNumber;
        let s3_err: S3Error = err.into();
        assert_eq!(s3_err.code(), &S3ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_should_convert_config_not_found_errors() {
        let cases: Vec<(EngineError, S3ErrorCode)> = vec![
            (
                EngineError::NoSuchCorsConfiguration,
                S3ErrorCode::NoSuchCORSConfiguration,
            ),
            (EngineError::NoSuchTagSet, S3ErrorCode::NoSuchTagSet),
            (
                EngineError::NoSuchLifecycleConfiguration,
                S3ErrorCode::NoSuchLifecycleConfiguration,
            ),
            (
                EngineError::NoSuchBucketPolicy,
                S3ErrorCode::NoSuchBucketPolicy,
            ),
            (
                EngineError::NoSuchWebsiteConfiguration,
                S3ErrorCode::NoSuchWebsiteConfiguration,
            ),
        ];

        for (err, expected_code) in cases {
            let s3_err: S3Error = err.into();
            assert_eq!(s3_err.code(), &expected_code);
        }
    }
}
