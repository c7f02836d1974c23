//! Ownership transfer across the C boundary.
//!
//! Everything handed to the caller is allocated with the C allocator so it
//! has a single, allocator-independent owner until the paired
//! `uplink_free_*` call reclaims it. Inputs are borrowed for the duration of
//! one call and never retained.

use crate::types::{
    UplinkBucket, UplinkBucketResult, UplinkCustomMetadata, UplinkCustomMetadataEntry,
    UplinkError, UplinkObject, UplinkObjectResult, UplinkStringResult, UplinkSystemMetadata,
};
use bridge_core::{BridgeError, BridgeResult};
use bridge_provider::{Bucket, CustomMetadata, Object};
use std::alloc::{handle_alloc_error, Layout};
use std::ffi::{c_char, c_void, CStr};
use std::mem;
use std::ptr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Moves `value` into a `malloc`-owned allocation.
pub(crate) fn malloc_value<T>(value: T) -> *mut T {
    let layout = Layout::new::<T>();
    let raw = unsafe { libc::malloc(layout.size().max(1)) } as *mut T;
    if raw.is_null() {
        handle_alloc_error(layout);
    }
    unsafe { raw.write(value) };
    raw
}

/// Releases an allocation from [`malloc_value`] without running destructors.
///
/// # Safety
/// `raw` must be null or come from [`malloc_value`] and not be freed yet.
pub(crate) unsafe fn free_value<T>(raw: *mut T) {
    if !raw.is_null() {
        libc::free(raw as *mut c_void);
    }
}

/// Copies `bytes` into a NUL-terminated `malloc` buffer.
pub(crate) fn malloc_c_bytes(bytes: &[u8]) -> *mut c_char {
    let size = bytes.len() + 1;
    let raw = unsafe { libc::malloc(size) } as *mut u8;
    if raw.is_null() {
        handle_alloc_error(Layout::array::<u8>(size).unwrap_or(Layout::new::<u8>()));
    }
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr(), raw, bytes.len());
        *raw.add(bytes.len()) = 0;
    }
    raw as *mut c_char
}

pub(crate) fn malloc_string(s: &str) -> *mut c_char {
    malloc_c_bytes(s.as_bytes())
}

/// # Safety
/// `s` must be null or come from [`malloc_string`] / [`malloc_c_bytes`].
pub(crate) unsafe fn free_string(s: *mut c_char) {
    if !s.is_null() {
        libc::free(s as *mut c_void);
    }
}

pub(crate) fn malloc_error(err: BridgeError) -> *mut UplinkError {
    tracing::debug!(code = err.code(), error = %err, "returning error across boundary");
    malloc_value(UplinkError {
        code: err.code(),
        message: malloc_string(&err.to_string()),
    })
}

pub(crate) fn error_or_null(result: BridgeResult<()>) -> *mut UplinkError {
    match result {
        Ok(()) => ptr::null_mut(),
        Err(err) => malloc_error(err),
    }
}

/// Releases the error and nulls the caller's field so a repeat is a no-op.
pub(crate) fn take_error(slot: &mut *mut UplinkError) {
    let err = mem::replace(slot, ptr::null_mut());
    unsafe { uplink_free_error(err) };
}

/// Frees an error returned by any `uplink_*` function.
///
/// # Safety
/// `err` must be null or an error returned by this library that has not
/// been freed yet.
#[no_mangle]
pub unsafe extern "C" fn uplink_free_error(err: *mut UplinkError) {
    if err.is_null() {
        return;
    }
    free_string((*err).message);
    free_value(err);
}

// ---------------------------------------------------------------------------
// Borrowed inputs
// ---------------------------------------------------------------------------

/// Borrows a required NUL-terminated UTF-8 string for the duration of a call.
///
/// # Safety
/// `raw` must be null or point to a NUL-terminated string that stays valid
/// for `'a`.
pub(crate) unsafe fn read_str<'a>(raw: *const c_char, name: &'static str) -> BridgeResult<&'a str> {
    if raw.is_null() {
        return Err(BridgeError::NullArgument(name));
    }
    CStr::from_ptr(raw)
        .to_str()
        .map_err(|_| BridgeError::InvalidArgument(format!("{name} is not valid UTF-8")))
}

/// Like [`read_str`] but null reads as the empty string.
///
/// # Safety
/// Same as [`read_str`].
pub(crate) unsafe fn read_optional_str<'a>(
    raw: *const c_char,
    name: &'static str,
) -> BridgeResult<&'a str> {
    if raw.is_null() {
        return Ok("");
    }
    read_str(raw, name)
}

/// Rejects sizes a Rust slice cannot address.
pub(crate) fn checked_len(len: usize, name: &'static str) -> BridgeResult<usize> {
    if isize::try_from(len).is_err() {
        return Err(BridgeError::InvalidArgument(format!("{name} too large")));
    }
    Ok(len)
}

/// Borrows a caller buffer. A null pointer is only accepted for an empty buffer.
///
/// # Safety
/// `raw` must point to `len` readable bytes valid for `'a`.
pub(crate) unsafe fn read_bytes<'a>(
    raw: *const u8,
    len: usize,
    name: &'static str,
) -> BridgeResult<&'a [u8]> {
    if len == 0 {
        return Ok(&[]);
    }
    if raw.is_null() {
        return Err(BridgeError::NullArgument(name));
    }
    let len = checked_len(len, "length")?;
    Ok(std::slice::from_raw_parts(raw, len))
}

/// Mutable counterpart of [`read_bytes`].
///
/// # Safety
/// `raw` must point to `len` writable bytes valid for `'a`.
pub(crate) unsafe fn read_bytes_mut<'a>(
    raw: *mut u8,
    len: usize,
    name: &'static str,
) -> BridgeResult<&'a mut [u8]> {
    if len == 0 {
        return Ok(&mut []);
    }
    if raw.is_null() {
        return Err(BridgeError::NullArgument(name));
    }
    let len = checked_len(len, "length")?;
    Ok(std::slice::from_raw_parts_mut(raw, len))
}

unsafe fn read_sized_str<'a>(
    raw: *const c_char,
    len: usize,
    name: &'static str,
) -> BridgeResult<&'a str> {
    let bytes = read_bytes(raw as *const u8, len, name)?;
    std::str::from_utf8(bytes)
        .map_err(|_| BridgeError::InvalidArgument(format!("{name} is not valid UTF-8")))
}

/// Copies caller-provided custom metadata into an owned map.
///
/// # Safety
/// `meta.entries` must point to `meta.count` entries whose key/value
/// pointers cover their stated lengths.
pub(crate) unsafe fn read_custom_metadata(
    meta: &UplinkCustomMetadata,
) -> BridgeResult<CustomMetadata> {
    let count = meta.count;
    if count == 0 {
        return Ok(CustomMetadata::new());
    }
    if meta.entries.is_null() {
        return Err(BridgeError::NullArgument("custom_metadata.entries"));
    }
    // The entry array as a whole must fit in isize::MAX bytes.
    Layout::array::<UplinkCustomMetadataEntry>(count).map_err(|_| {
        BridgeError::InvalidArgument("custom metadata count too large".into())
    })?;

    let entries = std::slice::from_raw_parts(meta.entries, count);
    let mut out = CustomMetadata::new();
    for entry in entries {
        let key = read_sized_str(entry.key, entry.key_length, "custom_metadata.key")?;
        let value = read_sized_str(entry.value, entry.value_length, "custom_metadata.value")?;
        if key.is_empty() {
            return Err(BridgeError::InvalidArgument(
                "custom metadata key is empty".into(),
            ));
        }
        out.insert(key.to_string(), value.to_string());
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Owned outputs
// ---------------------------------------------------------------------------

pub(crate) fn malloc_custom_metadata(custom: &CustomMetadata) -> UplinkCustomMetadata {
    if custom.is_empty() {
        return UplinkCustomMetadata::default();
    }
    let layout = match Layout::array::<UplinkCustomMetadataEntry>(custom.len()) {
        Ok(layout) => layout,
        Err(_) => return UplinkCustomMetadata::default(),
    };
    let entries = unsafe { libc::malloc(layout.size()) } as *mut UplinkCustomMetadataEntry;
    if entries.is_null() {
        handle_alloc_error(layout);
    }
    for (i, (key, value)) in custom.iter().enumerate() {
        unsafe {
            entries.add(i).write(UplinkCustomMetadataEntry {
                key: malloc_string(key),
                key_length: key.len(),
                value: malloc_string(value),
                value_length: value.len(),
            });
        }
    }
    UplinkCustomMetadata {
        entries,
        count: custom.len(),
    }
}

/// # Safety
/// `meta` must come from [`malloc_custom_metadata`] and not be freed yet.
pub(crate) unsafe fn free_custom_metadata(meta: &mut UplinkCustomMetadata) {
    if meta.entries.is_null() {
        meta.count = 0;
        return;
    }
    for entry in std::slice::from_raw_parts(meta.entries, meta.count) {
        free_string(entry.key);
        free_string(entry.value);
    }
    libc::free(meta.entries as *mut c_void);
    *meta = UplinkCustomMetadata::default();
}

pub(crate) fn unix_seconds(time: Option<SystemTime>) -> i64 {
    time.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Non-positive values mean "unset".
pub(crate) fn from_unix_seconds(secs: i64) -> Option<SystemTime> {
    (secs > 0).then(|| UNIX_EPOCH + Duration::from_secs(secs as u64))
}

pub(crate) fn malloc_object(object: &Object) -> *mut UplinkObject {
    malloc_value(UplinkObject {
        key: malloc_string(&object.key),
        is_prefix: object.is_prefix,
        system: UplinkSystemMetadata {
            created: unix_seconds(object.system.created),
            expires: unix_seconds(object.system.expires),
            content_length: i64::try_from(object.system.content_length).unwrap_or(i64::MAX),
        },
        custom: malloc_custom_metadata(&object.custom),
    })
}

/// Frees an object returned by `uplink_upload_info`, `uplink_stat_object`,
/// `uplink_object_iterator_item` and friends.
///
/// # Safety
/// `object` must be null or an object returned by this library that has
/// not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn uplink_free_object(object: *mut UplinkObject) {
    if object.is_null() {
        return;
    }
    free_string((*object).key);
    free_custom_metadata(&mut (*object).custom);
    free_value(object);
}

pub(crate) fn malloc_bucket(bucket: &Bucket) -> *mut UplinkBucket {
    malloc_value(UplinkBucket {
        name: malloc_string(&bucket.name),
        created: unix_seconds(Some(bucket.created)),
    })
}

/// # Safety
/// `bucket` must be null or come from [`malloc_bucket`].
pub(crate) unsafe fn free_bucket(bucket: *mut UplinkBucket) {
    if bucket.is_null() {
        return;
    }
    free_string((*bucket).name);
    free_value(bucket);
}

impl UplinkObjectResult {
    pub(crate) fn from_result(result: BridgeResult<Object>) -> Self {
        match result {
            Ok(object) => Self {
                object: malloc_object(&object),
                error: ptr::null_mut(),
            },
            Err(err) => Self {
                object: ptr::null_mut(),
                error: malloc_error(err),
            },
        }
    }
}

impl UplinkBucketResult {
    pub(crate) fn from_result(result: BridgeResult<Bucket>) -> Self {
        match result {
            Ok(bucket) => Self {
                bucket: malloc_bucket(&bucket),
                error: ptr::null_mut(),
            },
            Err(err) => Self {
                bucket: ptr::null_mut(),
                error: malloc_error(err),
            },
        }
    }
}

impl UplinkStringResult {
    pub(crate) fn from_result(result: BridgeResult<String>) -> Self {
        match result {
            Ok(s) => Self {
                string: malloc_string(&s),
                error: ptr::null_mut(),
            },
            Err(err) => Self {
                string: ptr::null_mut(),
                error: malloc_error(err),
            },
        }
    }
}

/// Frees an object result and clears it.
///
/// # Safety
/// `result` must be null or point to a result returned by this library.
#[no_mangle]
pub unsafe extern "C" fn uplink_free_object_result(result: *mut UplinkObjectResult) {
    let Some(result) = result.as_mut() else {
        return;
    };
    take_error(&mut result.error);
    uplink_free_object(mem::replace(&mut result.object, ptr::null_mut()));
}

/// Frees a bucket result and clears it.
///
/// # Safety
/// `result` must be null or point to a result returned by this library.
#[no_mangle]
pub unsafe extern "C" fn uplink_free_bucket_result(result: *mut UplinkBucketResult) {
    let Some(result) = result.as_mut() else {
        return;
    };
    take_error(&mut result.error);
    free_bucket(mem::replace(&mut result.bucket, ptr::null_mut()));
}

/// Frees a string result and clears it.
///
/// # Safety
/// `result` must be null or point to a result returned by this library.
#[no_mangle]
pub unsafe extern "C" fn uplink_free_string_result(result: *mut UplinkStringResult) {
    let Some(result) = result.as_mut() else {
        return;
    };
    take_error(&mut result.error);
    free_string(mem::replace(&mut result.string, ptr::null_mut()));
}
