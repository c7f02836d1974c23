//! Object metadata and deletion.

use crate::marshal::read_str;
use crate::project::ProjectFacade;
use crate::types::{UplinkObjectResult, UplinkProject};
use crate::universe::{universe, Universe};
use bridge_core::{BridgeResult, Handle};
use bridge_provider::Object;
use std::ffi::c_char;

impl Universe {
    pub fn stat_object(&self, project: Handle, bucket: &str, key: &str) -> BridgeResult<Object> {
        let facade = self.lookup::<ProjectFacade>(project)?;
        self.run_in(
            &facade.scope,
            facade.project.stat_object(&facade.scope, bucket, key),
        )
    }

    /// Returns the metadata of the removed object.
    pub fn delete_object(&self, project: Handle, bucket: &str, key: &str) -> BridgeResult<Object> {
        let facade = self.lookup::<ProjectFacade>(project)?;
        let object = self.run_in(
            &facade.scope,
            facade.project.delete_object(&facade.scope, bucket, key),
        )?;
        tracing::debug!(bucket, key, "object deleted");
        Ok(object)
    }
}

unsafe fn object_args<'a>(
    project: UplinkProject,
    bucket_name: *const c_char,
    object_key: *const c_char,
) -> BridgeResult<(Handle, &'a str, &'a str)> {
    Ok((
        project.require()?,
        read_str(bucket_name, "bucket_name")?,
        read_str(object_key, "object_key")?,
    ))
}

/// # Safety
/// `bucket_name` and `object_key` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn uplink_stat_object(
    project: UplinkProject,
    bucket_name: *const c_char,
    object_key: *const c_char,
) -> UplinkObjectResult {
    UplinkObjectResult::from_result(
        object_args(project, bucket_name, object_key).and_then(|(project, bucket, key)| {
            universe()?.stat_object(project, bucket, key)
        }),
    )
}

/// # Safety
/// `bucket_name` and `object_key` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn uplink_delete_object(
    project: UplinkProject,
    bucket_name: *const c_char,
    object_key: *const c_char,
) -> UplinkObjectResult {
    UplinkObjectResult::from_result(
        object_args(project, bucket_name, object_key).and_then(|(project, bucket, key)| {
            universe()?.delete_object(project, bucket, key)
        }),
    )
}
