//! Bucket management under a project's scope.

use crate::marshal::read_str;
use crate::project::ProjectFacade;
use crate::types::{UplinkBucketResult, UplinkProject};
use crate::universe::{universe, Universe};
use bridge_core::{BridgeResult, Handle};
use bridge_provider::Bucket;
use std::ffi::c_char;

impl Universe {
    pub fn create_bucket(&self, project: Handle, name: &str) -> BridgeResult<Bucket> {
        let facade = self.lookup::<ProjectFacade>(project)?;
        let bucket = self.run_in(
            &facade.scope,
            facade.project.create_bucket(&facade.scope, name),
        )?;
        tracing::debug!(bucket = %bucket.name, "bucket created");
        Ok(bucket)
    }

    /// Creates the bucket unless it already exists.
    pub fn ensure_bucket(&self, project: Handle, name: &str) -> BridgeResult<Bucket> {
        let facade = self.lookup::<ProjectFacade>(project)?;
        self.run_in(
            &facade.scope,
            facade.project.ensure_bucket(&facade.scope, name),
        )
    }
}

unsafe fn bucket_args<'a>(
    project: UplinkProject,
    bucket_name: *const c_char,
) -> BridgeResult<(Handle, &'a str)> {
    Ok((project.require()?, read_str(bucket_name, "bucket_name")?))
}

/// # Safety
/// `bucket_name` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn uplink_create_bucket(
    project: UplinkProject,
    bucket_name: *const c_char,
) -> UplinkBucketResult {
    UplinkBucketResult::from_result(
        bucket_args(project, bucket_name)
            .and_then(|(project, name)| universe()?.create_bucket(project, name)),
    )
}

/// # Safety
/// `bucket_name` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn uplink_ensure_bucket(
    project: UplinkProject,
    bucket_name: *const c_char,
) -> UplinkBucketResult {
    UplinkBucketResult::from_result(
        bucket_args(project, bucket_name)
            .and_then(|(project, name)| universe()?.ensure_bucket(project, name)),
    )
}
