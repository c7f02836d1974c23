//! Uploads.
//!
//! An upload's scope is a child of its project's scope, so closing the
//! project interrupts a write blocked on the network. Commit and abort
//! finalize the stream but keep the handle live so `info` still answers
//! until the result is freed.

use crate::marshal::{
    error_or_null, from_unix_seconds, read_bytes, read_custom_metadata, read_str, take_error,
};
use crate::project::ProjectFacade;
use crate::types::{
    UplinkCustomMetadata, UplinkError, UplinkObjectResult, UplinkProject, UplinkUpload,
    UplinkUploadOptions, UplinkUploadResult, UplinkWriteResult,
};
use crate::universe::{universe, Universe};
use bridge_core::{BridgeError, BridgeResult, Handle, Scope};
use bridge_provider::{CustomMetadata, Object, Upload, UploadOptions};
use std::ffi::c_char;
use std::mem;
use std::sync::Arc;
use tokio::sync::Mutex;

pub(crate) struct UploadFacade {
    scope: Scope,
    upload: Mutex<Box<dyn Upload>>,
}

impl Universe {
    pub fn upload_object(
        &self,
        project: Handle,
        bucket: &str,
        key: &str,
        options: &UploadOptions,
    ) -> BridgeResult<Handle> {
        let project = self.lookup::<ProjectFacade>(project)?;
        let scope = project.scope.child("upload");

        let started = self.run_in(
            &scope,
            project.project.upload_object(&scope, bucket, key, options),
        );
        match started {
            Ok(upload) => {
                tracing::debug!(bucket, key, "upload started");
                Ok(self.register(Arc::new(UploadFacade {
                    scope,
                    upload: Mutex::new(upload),
                })))
            }
            Err(err) => {
                scope.cancel();
                Err(err)
            }
        }
    }

    /// Writes all of `buf` unless an error stops it early.
    ///
    /// Returns the bytes consumed together with the reason writing stopped,
    /// if it did.
    pub fn upload_write(&self, upload: Handle, buf: &[u8]) -> (usize, BridgeResult<()>) {
        let facade = match self.lookup::<UploadFacade>(upload) {
            Ok(facade) => facade,
            Err(err) => return (0, Err(err)),
        };

        let mut written = 0;
        let outcome = self.run_in(&facade.scope, async {
            let mut stream = facade.upload.lock().await;
            while written < buf.len() {
                match stream.write(&buf[written..]).await? {
                    0 => return Err(BridgeError::Internal("upload accepted no bytes".into())),
                    n => written += n,
                }
            }
            Ok(())
        });
        (written, outcome)
    }

    pub fn upload_set_custom_metadata(
        &self,
        upload: Handle,
        custom: CustomMetadata,
    ) -> BridgeResult<()> {
        let facade = self.lookup::<UploadFacade>(upload)?;
        self.run_in(&facade.scope, async {
            facade.upload.lock().await.set_custom_metadata(custom).await
        })
    }

    pub fn upload_commit(&self, upload: Handle) -> BridgeResult<()> {
        let facade = self.lookup::<UploadFacade>(upload)?;
        self.run_in(&facade.scope, async {
            facade.upload.lock().await.commit().await
        })?;
        tracing::debug!(%upload, "upload committed");
        Ok(())
    }

    pub fn upload_abort(&self, upload: Handle) -> BridgeResult<()> {
        let facade = self.lookup::<UploadFacade>(upload)?;
        self.run_in(&facade.scope, async {
            facade.upload.lock().await.abort().await
        })?;
        tracing::debug!(%upload, "upload aborted");
        Ok(())
    }

    pub fn upload_info(&self, upload: Handle) -> BridgeResult<Object> {
        let facade = self.lookup::<UploadFacade>(upload)?;
        self.run_in(&facade.scope, async { Ok(facade.upload.lock().await.info()) })
    }

    /// Cancels anything in flight and drops the upload. An uncommitted
    /// upload is discarded.
    pub fn free_upload(&self, upload: Handle) {
        if let Some(facade) = self.take::<UploadFacade>(upload) {
            facade.scope.cancel();
        }
    }
}

/// Starts an upload. `options` may be null.
///
/// # Safety
/// String arguments must be null or NUL-terminated; `options` must be null
/// or point to a readable struct.
#[no_mangle]
pub unsafe extern "C" fn uplink_upload_object(
    project: UplinkProject,
    bucket_name: *const c_char,
    object_key: *const c_char,
    options: *const UplinkUploadOptions,
) -> UplinkUploadResult {
    UplinkUploadResult::from_result(upload_object(project, bucket_name, object_key, options))
}

unsafe fn upload_object(
    project: UplinkProject,
    bucket_name: *const c_char,
    object_key: *const c_char,
    options: *const UplinkUploadOptions,
) -> BridgeResult<Handle> {
    let project = project.require()?;
    let bucket = read_str(bucket_name, "bucket_name")?;
    let key = read_str(object_key, "object_key")?;
    let options = options.as_ref().copied().unwrap_or_default();
    if options.expires < 0 {
        return Err(BridgeError::InvalidArgument(format!(
            "expires must not be negative, got {}",
            options.expires
        )));
    }
    let options = UploadOptions {
        expires: from_unix_seconds(options.expires),
    };
    universe()?.upload_object(project, bucket, key, &options)
}

/// Writes `length` bytes from `bytes`.
///
/// # Safety
/// `bytes` must point to `length` readable bytes, or be null when `length`
/// is zero.
#[no_mangle]
pub unsafe extern "C" fn uplink_upload_write(
    upload: UplinkUpload,
    bytes: *const u8,
    length: usize,
) -> UplinkWriteResult {
    let args = upload
        .require()
        .and_then(|upload| Ok((upload, read_bytes(bytes, length, "bytes")?)));
    let (bytes_written, outcome) = match args {
        Ok((upload, buf)) => match universe() {
            Ok(universe) => universe.upload_write(upload, buf),
            Err(err) => (0, Err(err)),
        },
        Err(err) => (0, Err(err)),
    };
    UplinkWriteResult {
        bytes_written,
        error: error_or_null(outcome),
    }
}

/// Replaces the custom metadata stored with the object on commit.
///
/// # Safety
/// Every entry must describe readable key/value buffers of the stated lengths.
#[no_mangle]
pub unsafe extern "C" fn uplink_upload_set_custom_metadata(
    upload: UplinkUpload,
    custom: UplinkCustomMetadata,
) -> *mut UplinkError {
    let set = upload.require().and_then(|upload| {
        let custom = read_custom_metadata(&custom)?;
        universe()?.upload_set_custom_metadata(upload, custom)
    });
    error_or_null(set)
}

#[no_mangle]
pub extern "C" fn uplink_upload_commit(upload: UplinkUpload) -> *mut UplinkError {
    error_or_null(upload.require().and_then(|upload| universe()?.upload_commit(upload)))
}

#[no_mangle]
pub extern "C" fn uplink_upload_abort(upload: UplinkUpload) -> *mut UplinkError {
    error_or_null(upload.require().and_then(|upload| universe()?.upload_abort(upload)))
}

#[no_mangle]
pub extern "C" fn uplink_upload_info(upload: UplinkUpload) -> UplinkObjectResult {
    UplinkObjectResult::from_result(
        upload
            .require()
            .and_then(|upload| universe()?.upload_info(upload)),
    )
}

/// # Safety
/// `result` must be null or point to a result returned by this library.
#[no_mangle]
pub unsafe extern "C" fn uplink_free_write_result(result: *mut UplinkWriteResult) {
    let Some(result) = result.as_mut() else {
        return;
    };
    take_error(&mut result.error);
    result.bytes_written = 0;
}

/// Releases the upload held by `result`, cancelling any write in flight.
///
/// # Safety
/// `result` must be null or point to a result returned by this library.
#[no_mangle]
pub unsafe extern "C" fn uplink_free_upload_result(result: *mut UplinkUploadResult) {
    let Some(result) = result.as_mut() else {
        return;
    };
    take_error(&mut result.error);
    let upload = mem::take(&mut result.upload);
    if let Ok(universe) = universe() {
        universe.free_upload(upload.handle());
    }
}
