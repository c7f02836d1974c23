//! Downloads.

use crate::marshal::{error_or_null, malloc_error, read_bytes_mut, read_str, take_error};
use crate::project::ProjectFacade;
use crate::resource::Facade;
use crate::types::{
    UplinkDownload, UplinkDownloadOptions, UplinkDownloadResult, UplinkError,
    UplinkObjectResult, UplinkProject, UplinkReadResult,
};
use crate::universe::{universe, Universe};
use bridge_core::{BridgeError, BridgeResult, Handle, Scope};
use bridge_provider::{Download, DownloadOptions, Object};
use std::ffi::c_char;
use std::mem;
use std::ptr;
use std::sync::Arc;
use tokio::sync::Mutex;

pub(crate) struct DownloadFacade {
    scope: Scope,
    download: Mutex<Box<dyn Download>>,
}

impl Universe {
    pub fn download_object(
        &self,
        project: Handle,
        bucket: &str,
        key: &str,
        options: &DownloadOptions,
    ) -> BridgeResult<Handle> {
        let project = self.lookup::<ProjectFacade>(project)?;
        let scope = project.scope.child("download");

        let opened = self.run_in(
            &scope,
            project
                .project
                .download_object(&scope, bucket, key, options),
        );
        match opened {
            Ok(download) => {
                tracing::debug!(bucket, key, offset = options.offset, "download opened");
                Ok(self.register(Arc::new(DownloadFacade {
                    scope,
                    download: Mutex::new(download),
                })))
            }
            Err(err) => {
                scope.cancel();
                Err(err)
            }
        }
    }

    /// One read from the stream; `Eof` once the range is exhausted.
    pub fn download_read(&self, download: Handle, buf: &mut [u8]) -> BridgeResult<usize> {
        let facade = self.lookup::<DownloadFacade>(download)?;
        self.run_in(&facade.scope, async {
            facade.download.lock().await.read(buf).await
        })
    }

    pub fn download_info(&self, download: Handle) -> BridgeResult<Object> {
        let facade = self.lookup::<DownloadFacade>(download)?;
        self.run_in(&facade.scope, async {
            Ok(facade.download.lock().await.info())
        })
    }

    pub fn close_download(&self, download: Handle) -> BridgeResult<()> {
        let facade = self
            .take::<DownloadFacade>(download)
            .ok_or(BridgeError::InvalidHandle(DownloadFacade::KIND))?;
        facade.scope.cancel();
        self.block_on(async { facade.download.lock().await.close().await })??;
        tracing::debug!(%download, "download closed");
        Ok(())
    }

    pub fn free_download(&self, download: Handle) {
        if download.is_null() {
            return;
        }
        match self.close_download(download) {
            Ok(()) | Err(BridgeError::InvalidHandle(_)) => {}
            Err(err) => tracing::warn!(%download, error = %err, "close during free failed"),
        }
    }
}

/// Opens a ranged download. `options` may be null to read the whole object.
///
/// # Safety
/// String arguments must be null or NUL-terminated; `options` must be null
/// or point to a readable struct.
#[no_mangle]
pub unsafe extern "C" fn uplink_download_object(
    project: UplinkProject,
    bucket_name: *const c_char,
    object_key: *const c_char,
    options: *const UplinkDownloadOptions,
) -> UplinkDownloadResult {
    UplinkDownloadResult::from_result(download_object(project, bucket_name, object_key, options))
}

unsafe fn download_object(
    project: UplinkProject,
    bucket_name: *const c_char,
    object_key: *const c_char,
    options: *const UplinkDownloadOptions,
) -> BridgeResult<Handle> {
    let project = project.require()?;
    let bucket = read_str(bucket_name, "bucket_name")?;
    let key = read_str(object_key, "object_key")?;
    let options = match options.as_ref() {
        None => DownloadOptions::default(),
        Some(opts) if opts.offset < 0 => {
            return Err(BridgeError::InvalidArgument(format!(
                "offset must not be negative, got {}",
                opts.offset
            )))
        }
        Some(opts) => DownloadOptions {
            offset: opts.offset as u64,
            length: opts.length,
        },
    };
    universe()?.download_object(project, bucket, key, &options)
}

/// Reads up to `length` bytes into `buffer`.
///
/// # Safety
/// `buffer` must point to `length` writable bytes, or be null when `length`
/// is zero.
#[no_mangle]
pub unsafe extern "C" fn uplink_download_read(
    download: UplinkDownload,
    buffer: *mut u8,
    length: usize,
) -> UplinkReadResult {
    let read = download.require().and_then(|download| {
        let buf = read_bytes_mut(buffer, length, "buffer")?;
        universe()?.download_read(download, buf)
    });
    match read {
        Ok(bytes_read) => UplinkReadResult {
            bytes_read,
            error: ptr::null_mut(),
        },
        Err(err) => UplinkReadResult {
            bytes_read: 0,
            error: malloc_error(err),
        },
    }
}

#[no_mangle]
pub extern "C" fn uplink_download_info(download: UplinkDownload) -> UplinkObjectResult {
    UplinkObjectResult::from_result(
        download
            .require()
            .and_then(|download| universe()?.download_info(download)),
    )
}

#[no_mangle]
pub extern "C" fn uplink_close_download(download: UplinkDownload) -> *mut UplinkError {
    if download.handle().is_null() {
        return ptr::null_mut();
    }
    error_or_null(universe().and_then(|u| u.close_download(download.handle())))
}

/// # Safety
/// `result` must be null or point to a result returned by this library.
#[no_mangle]
pub unsafe extern "C" fn uplink_free_read_result(result: *mut UplinkReadResult) {
    let Some(result) = result.as_mut() else {
        return;
    };
    take_error(&mut result.error);
    result.bytes_read = 0;
}

/// Closes the download held by `result` if still open, then clears it.
///
/// # Safety
/// `result` must be null or point to a result returned by this library.
#[no_mangle]
pub unsafe extern "C" fn uplink_free_download_result(result: *mut UplinkDownloadResult) {
    let Some(result) = result.as_mut() else {
        return;
    };
    take_error(&mut result.error);
    let download = mem::take(&mut result.download);
    if let Ok(universe) = universe() {
        universe.free_download(download.handle());
    }
}
