//! Centralized error types for the bridge workspace.
//!
//! Every error that can cross the C boundary is a [`BridgeError`]. Variants
//! fall into four kinds: the three validation kinds detected locally by the
//! façades, and everything surfaced by the wrapped library.

use thiserror::Error;

/// Stable error codes carried by `UplinkError.code` on the C side.
pub mod code {
    pub const EOF: i32 = -1;
    pub const INTERNAL: i32 = 0x02;
    pub const CANCELED: i32 = 0x03;
    pub const INVALID_HANDLE: i32 = 0x04;
    pub const TOO_MANY_REQUESTS: i32 = 0x05;
    pub const BANDWIDTH_LIMIT_EXCEEDED: i32 = 0x06;
    pub const NULL_ARGUMENT: i32 = 0x07;
    pub const INVALID_ARGUMENT: i32 = 0x08;
    pub const PERMISSION_DENIED: i32 = 0x09;
    pub const NETWORK: i32 = 0x0a;

    pub const BUCKET_NAME_INVALID: i32 = 0x10;
    pub const BUCKET_ALREADY_EXISTS: i32 = 0x11;
    pub const BUCKET_NOT_EMPTY: i32 = 0x12;
    pub const BUCKET_NOT_FOUND: i32 = 0x13;

    pub const OBJECT_KEY_INVALID: i32 = 0x20;
    pub const OBJECT_NOT_FOUND: i32 = 0x21;
    pub const UPLOAD_DONE: i32 = 0x22;
}

/// Coarse classification of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required pointer or handle argument was absent.
    NullArgument,
    /// A value was present but out of range.
    InvalidArgument,
    /// A handle was unknown, already freed, or of the wrong resource kind.
    InvalidHandle,
    /// Surfaced unchanged from the wrapped library.
    Delegated,
}

/// Top-level error enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("null argument: {0}")]
    NullArgument(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid handle: {0}")]
    InvalidHandle(&'static str),

    #[error("operation canceled")]
    Canceled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("too many requests")]
    TooManyRequests,

    #[error("bandwidth limit exceeded")]
    BandwidthLimitExceeded,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("bucket name invalid: {0:?}")]
    BucketNameInvalid(String),

    #[error("bucket already exists: {0:?}")]
    BucketAlreadyExists(String),

    #[error("bucket not empty: {0:?}")]
    BucketNotEmpty(String),

    #[error("bucket not found: {0:?}")]
    BucketNotFound(String),

    #[error("object key invalid: {0:?}")]
    ObjectKeyInvalid(String),

    #[error("object not found: {0:?}")]
    ObjectNotFound(String),

    #[error("upload already committed or aborted")]
    UploadDone,

    #[error("end of file")]
    Eof,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::NullArgument(_) => ErrorKind::NullArgument,
            BridgeError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BridgeError::InvalidHandle(_) => ErrorKind::InvalidHandle,
            _ => ErrorKind::Delegated,
        }
    }

    /// Wire code placed into `UplinkError.code`.
    pub fn code(&self) -> i32 {
        match self {
            BridgeError::NullArgument(_) => code::NULL_ARGUMENT,
            BridgeError::InvalidArgument(_) => code::INVALID_ARGUMENT,
            BridgeError::InvalidHandle(_) => code::INVALID_HANDLE,
            BridgeError::Canceled => code::CANCELED,
            BridgeError::Internal(_) => code::INTERNAL,
            BridgeError::TooManyRequests => code::TOO_MANY_REQUESTS,
            BridgeError::BandwidthLimitExceeded => code::BANDWIDTH_LIMIT_EXCEEDED,
            BridgeError::PermissionDenied(_) => code::PERMISSION_DENIED,
            BridgeError::Network(_) => code::NETWORK,
            BridgeError::BucketNameInvalid(_) => code::BUCKET_NAME_INVALID,
            BridgeError::BucketAlreadyExists(_) => code::BUCKET_ALREADY_EXISTS,
            BridgeError::BucketNotEmpty(_) => code::BUCKET_NOT_EMPTY,
            BridgeError::BucketNotFound(_) => code::BUCKET_NOT_FOUND,
            BridgeError::ObjectKeyInvalid(_) => code::OBJECT_KEY_INVALID,
            BridgeError::ObjectNotFound(_) => code::OBJECT_NOT_FOUND,
            BridgeError::UploadDone => code::UPLOAD_DONE,
            BridgeError::Eof => code::EOF,
        }
    }

    /// Failures a caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BridgeError::Network(_)
                | BridgeError::TooManyRequests
                | BridgeError::BandwidthLimitExceeded
        )
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
