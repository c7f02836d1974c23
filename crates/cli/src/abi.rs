//! Safe wrappers over the `uplink_*` entry points.
//!
//! Each wrapper owns the result it received and releases it on drop, so a
//! failed step never leaks a handle.

use bridge_core::error::code;
use serde::Serialize;
use std::ffi::{c_int, CStr, CString};
use std::ptr;
use uplink_bridge::access::*;
use uplink_bridge::bucket::*;
use uplink_bridge::download::*;
use uplink_bridge::listing::*;
use uplink_bridge::marshal::*;
use uplink_bridge::object::*;
use uplink_bridge::project::*;
use uplink_bridge::upload::*;
use uplink_bridge::*;

#[derive(Debug, thiserror::Error)]
#[error("{message} (code {code:#04x})")]
pub struct CallFailed {
    pub code: i32,
    pub message: String,
}

pub type CallResult<T> = Result<T, CallFailed>;

/// Converts and frees a returned error.
fn check(err: *mut UplinkError) -> CallResult<()> {
    let Some(raw) = (unsafe { err.as_ref() }) else {
        return Ok(());
    };
    let failed = CallFailed {
        code: raw.code,
        message: unsafe { CStr::from_ptr(raw.message) }
            .to_string_lossy()
            .into_owned(),
    };
    unsafe { uplink_free_error(err) };
    Err(failed)
}

/// Checks the error half of a result and clears it so the owner's free
/// only has the payload left to release.
fn check_field(err: &mut *mut UplinkError) -> CallResult<()> {
    check(std::mem::replace(err, ptr::null_mut()))
}

fn c_string(s: &str) -> CallResult<CString> {
    CString::new(s).map_err(|_| CallFailed {
        code: code::INVALID_ARGUMENT,
        message: format!("{s:?} contains a NUL byte"),
    })
}

/// Owned copy of an `UplinkObject`.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectSummary {
    pub key: String,
    pub is_prefix: bool,
    pub content_length: i64,
    pub created: i64,
    pub expires: i64,
    pub custom: Vec<(String, String)>,
}

impl ObjectSummary {
    /// Copies and frees `raw`.
    unsafe fn take(raw: *mut UplinkObject) -> Option<Self> {
        let object = raw.as_ref()?;
        let custom = if object.custom.entries.is_null() {
            Vec::new()
        } else {
            std::slice::from_raw_parts(object.custom.entries, object.custom.count)
                .iter()
                .map(|e| {
                    (
                        CStr::from_ptr(e.key).to_string_lossy().into_owned(),
                        CStr::from_ptr(e.value).to_string_lossy().into_owned(),
                    )
                })
                .collect()
        };
        let summary = Self {
            key: CStr::from_ptr(object.key).to_string_lossy().into_owned(),
            is_prefix: object.is_prefix,
            content_length: object.system.content_length,
            created: object.system.created,
            expires: object.system.expires,
            custom,
        };
        uplink_free_object(raw);
        Some(summary)
    }

    fn from_result(mut result: UplinkObjectResult) -> CallResult<Self> {
        check_field(&mut result.error)?;
        let object = std::mem::replace(&mut result.object, ptr::null_mut());
        unsafe { Self::take(object) }.ok_or_else(|| CallFailed {
            code: code::INTERNAL,
            message: "result carried neither object nor error".into(),
        })
    }
}

pub struct Access(UplinkAccessResult);

impl Access {
    pub fn parse(grant: &str) -> CallResult<Self> {
        let grant = c_string(grant)?;
        let mut result = unsafe { uplink_parse_access(grant.as_ptr()) };
        check_field(&mut result.error)?;
        Ok(Self(result))
    }

    pub fn satellite_address(&self) -> CallResult<String> {
        let mut result = uplink_access_satellite_address(self.0.access);
        check_field(&mut result.error)?;
        let address = unsafe { CStr::from_ptr(result.string) }
            .to_string_lossy()
            .into_owned();
        unsafe { uplink_free_string_result(&mut result) };
        Ok(address)
    }
}

impl Drop for Access {
    fn drop(&mut self) {
        unsafe { uplink_free_access_result(&mut self.0) };
    }
}

pub struct Project(UplinkProjectResult);

impl Project {
    pub fn open(access: &Access, maximum_concurrent: Option<c_int>) -> CallResult<Self> {
        let limit = maximum_concurrent.as_ref().map_or(ptr::null(), |n| n as *const c_int);
        let mut result = unsafe { uplink_open_project(access.0.access, limit) };
        check_field(&mut result.error)?;
        Ok(Self(result))
    }

    fn handle(&self) -> UplinkProject {
        self.0.project
    }

    pub fn ensure_bucket(&self, name: &str) -> CallResult<()> {
        let name = c_string(name)?;
        let mut result = unsafe { uplink_ensure_bucket(self.handle(), name.as_ptr()) };
        let checked = check_field(&mut result.error);
        unsafe { uplink_free_bucket_result(&mut result) };
        checked
    }

    pub fn stat(&self, bucket: &str, key: &str) -> CallResult<ObjectSummary> {
        let (bucket, key) = (c_string(bucket)?, c_string(key)?);
        ObjectSummary::from_result(unsafe {
            uplink_stat_object(self.handle(), bucket.as_ptr(), key.as_ptr())
        })
    }

    pub fn delete(&self, bucket: &str, key: &str) -> CallResult<ObjectSummary> {
        let (bucket, key) = (c_string(bucket)?, c_string(key)?);
        ObjectSummary::from_result(unsafe {
            uplink_delete_object(self.handle(), bucket.as_ptr(), key.as_ptr())
        })
    }

    pub fn upload(&self, bucket: &str, key: &str, expires: i64) -> CallResult<Upload> {
        let (bucket, key) = (c_string(bucket)?, c_string(key)?);
        let options = UplinkUploadOptions { expires };
        let mut result = unsafe {
            uplink_upload_object(self.handle(), bucket.as_ptr(), key.as_ptr(), &options)
        };
        check_field(&mut result.error)?;
        Ok(Upload(result))
    }

    pub fn download(&self, bucket: &str, key: &str) -> CallResult<Download> {
        let (bucket, key) = (c_string(bucket)?, c_string(key)?);
        let mut result = unsafe {
            uplink_download_object(self.handle(), bucket.as_ptr(), key.as_ptr(), ptr::null())
        };
        check_field(&mut result.error)?;
        Ok(Download(result))
    }

    pub fn list(&self, bucket: &str, prefix: &str, recursive: bool) -> CallResult<Vec<ObjectSummary>> {
        let (bucket, prefix) = (c_string(bucket)?, c_string(prefix)?);
        let options = UplinkListObjectsOptions {
            prefix: prefix.as_ptr(),
            cursor: ptr::null(),
            recursive,
            system: true,
            custom: true,
        };
        let mut result = unsafe { uplink_list_objects(self.handle(), bucket.as_ptr(), &options) };
        check_field(&mut result.error)?;

        let mut items = Vec::new();
        while uplink_object_iterator_next(result.iterator) {
            let item = uplink_object_iterator_item(result.iterator);
            items.extend(unsafe { ObjectSummary::take(item) });
        }
        let ended = check(uplink_object_iterator_err(result.iterator));
        unsafe { uplink_free_object_iterator_result(&mut result) };
        ended.map(|()| items)
    }

    pub fn close(self) -> CallResult<()> {
        check(uplink_close_project(self.handle()))
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        unsafe { uplink_free_project_result(&mut self.0) };
    }
}

pub struct Upload(UplinkUploadResult);

impl Upload {
    /// Returns the bytes consumed; a short count always comes with an error.
    pub fn write(&self, data: &[u8]) -> CallResult<usize> {
        let mut result = unsafe { uplink_upload_write(self.0.upload, data.as_ptr(), data.len()) };
        let written = result.bytes_written;
        let checked = check_field(&mut result.error);
        unsafe { uplink_free_write_result(&mut result) };
        checked.map(|()| written)
    }

    pub fn commit(&self) -> CallResult<()> {
        check(uplink_upload_commit(self.0.upload))
    }

    pub fn info(&self) -> CallResult<ObjectSummary> {
        ObjectSummary::from_result(uplink_upload_info(self.0.upload))
    }
}

impl Drop for Upload {
    fn drop(&mut self) {
        unsafe { uplink_free_upload_result(&mut self.0) };
    }
}

pub struct Download(UplinkDownloadResult);

impl Download {
    /// `None` once the object is exhausted.
    pub fn read(&self, buf: &mut [u8]) -> CallResult<Option<usize>> {
        let mut result =
            unsafe { uplink_download_read(self.0.download, buf.as_mut_ptr(), buf.len()) };
        let read = result.bytes_read;
        let checked = check_field(&mut result.error);
        unsafe { uplink_free_read_result(&mut result) };
        match checked {
            Ok(()) => Ok(Some(read)),
            Err(err) if err.code == code::EOF => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn read_to_end(&self, chunk: usize) -> CallResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk.max(1)];
        while let Some(n) = self.read(&mut buf)? {
            out.extend_from_slice(&buf[..n]);
        }
        Ok(out)
    }
}

impl Drop for Download {
    fn drop(&mut self) {
        unsafe { uplink_free_download_result(&mut self.0) };
    }
}
