//! `#[repr(C)]` types shared with foreign callers.
//!
//! Handle structs are passed by value and carry a single `_handle` token;
//! `0` is the null handle. Every pointer field in a result is owned by the
//! caller until released through the matching `uplink_free_*` function.

use crate::marshal::malloc_error;
use bridge_core::{BridgeError, BridgeResult, Handle};
use std::ffi::{c_char, c_int};
use std::ptr;

macro_rules! handle_types {
    ($($(#[$meta:meta])* $name:ident, $result:ident, $field:ident;)*) => {
        $(
            $(#[$meta])*
            #[repr(C)]
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
            pub struct $name {
                pub _handle: u64,
            }

            impl $name {
                pub fn handle(self) -> Handle {
                    Handle::from_raw(self._handle)
                }

                /// Resolves the token, reporting the null handle as a missing argument.
                pub(crate) fn require(self) -> BridgeResult<Handle> {
                    let handle = self.handle();
                    if handle.is_null() {
                        return Err(BridgeError::NullArgument(stringify!($field)));
                    }
                    Ok(handle)
                }
            }

            impl From<Handle> for $name {
                fn from(handle: Handle) -> Self {
                    Self { _handle: handle.into_raw() }
                }
            }

            #[repr(C)]
            #[derive(Debug)]
            pub struct $result {
                pub $field: $name,
                pub error: *mut UplinkError,
            }

            impl $result {
                pub(crate) fn from_result(result: BridgeResult<Handle>) -> Self {
                    match result {
                        Ok(handle) => Self {
                            $field: handle.into(),
                            error: ptr::null_mut(),
                        },
                        Err(err) => Self {
                            $field: $name::default(),
                            error: malloc_error(err),
                        },
                    }
                }
            }
        )*
    };
}

handle_types! {
    /// Parsed access grant.
    UplinkAccess, UplinkAccessResult, access;
    /// Open project.
    UplinkProject, UplinkProjectResult, project;
    /// In-progress upload.
    UplinkUpload, UplinkUploadResult, upload;
    /// Open download stream.
    UplinkDownload, UplinkDownloadResult, download;
    /// Lazily fetched object listing.
    UplinkObjectIterator, UplinkObjectIteratorResult, iterator;
}

/// Heap-allocated error. Free with `uplink_free_error`.
#[repr(C)]
#[derive(Debug)]
pub struct UplinkError {
    pub code: c_int,
    pub message: *mut c_char,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Unix seconds; `0` means unset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct UplinkSystemMetadata {
    pub created: i64,
    pub expires: i64,
    pub content_length: i64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UplinkCustomMetadataEntry {
    pub key: *mut c_char,
    pub key_length: usize,
    pub value: *mut c_char,
    pub value_length: usize,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UplinkCustomMetadata {
    pub entries: *mut UplinkCustomMetadataEntry,
    pub count: usize,
}

impl Default for UplinkCustomMetadata {
    fn default() -> Self {
        Self {
            entries: ptr::null_mut(),
            count: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct UplinkObject {
    pub key: *mut c_char,
    pub is_prefix: bool,
    pub system: UplinkSystemMetadata,
    pub custom: UplinkCustomMetadata,
}

#[repr(C)]
#[derive(Debug)]
pub struct UplinkBucket {
    pub name: *mut c_char,
    pub created: i64,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug)]
pub struct UplinkObjectResult {
    pub object: *mut UplinkObject,
    pub error: *mut UplinkError,
}

#[repr(C)]
#[derive(Debug)]
pub struct UplinkBucketResult {
    pub bucket: *mut UplinkBucket,
    pub error: *mut UplinkError,
}

#[repr(C)]
#[derive(Debug)]
pub struct UplinkStringResult {
    pub string: *mut c_char,
    pub error: *mut UplinkError,
}

/// `bytes_written` is valid even when `error` is set.
#[repr(C)]
#[derive(Debug)]
pub struct UplinkWriteResult {
    pub bytes_written: usize,
    pub error: *mut UplinkError,
}

/// `bytes_read` is valid even when `error` is set.
#[repr(C)]
#[derive(Debug)]
pub struct UplinkReadResult {
    pub bytes_read: usize,
    pub error: *mut UplinkError,
}

// ---------------------------------------------------------------------------
// Inputs (borrowed for the duration of one call)
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UplinkConfig {
    /// May be null.
    pub user_agent: *const c_char,
    /// `0` leaves dialing unbounded.
    pub dial_timeout_milliseconds: i32,
    /// `0` uses the library default.
    pub maximum_concurrent: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct UplinkUploadOptions {
    /// Unix seconds; `0` means the object never expires.
    pub expires: i64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UplinkDownloadOptions {
    pub offset: i64,
    /// Negative reads to the end of the object.
    pub length: i64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UplinkListObjectsOptions {
    /// May be null.
    pub prefix: *const c_char,
    /// May be null.
    pub cursor: *const c_char,
    pub recursive: bool,
    pub system: bool,
    pub custom: bool,
}
