//! Object listing exposed as a pull iterator.
//!
//! The listing is fetched on the first `next` under the iterator's own
//! scope, a child of the project's. A failed fetch ends iteration and
//! parks the error for `uplink_object_iterator_err`.

use crate::marshal::{malloc_error, malloc_object, read_optional_str, read_str, take_error};
use crate::project::ProjectFacade;
use crate::types::{
    UplinkError, UplinkListObjectsOptions, UplinkObject, UplinkObjectIterator,
    UplinkObjectIteratorResult, UplinkProject,
};
use crate::universe::{universe, Universe};
use bridge_core::{BridgeError, BridgeResult, Handle, Scope};
use bridge_provider::{ListObjectsOptions, Object};
use std::collections::VecDeque;
use std::ffi::c_char;
use std::mem;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Cursor {
    /// `None` until the listing has been fetched.
    pending: Option<VecDeque<Object>>,
    current: Option<Object>,
    error: Option<BridgeError>,
}

pub(crate) struct ObjectIteratorFacade {
    scope: Scope,
    project: Arc<ProjectFacade>,
    bucket: String,
    options: ListObjectsOptions,
    cursor: Mutex<Cursor>,
}

impl ObjectIteratorFacade {
    fn cursor(&self) -> MutexGuard<'_, Cursor> {
        self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Universe {
    pub fn list_objects(
        &self,
        project: Handle,
        bucket: &str,
        options: ListObjectsOptions,
    ) -> BridgeResult<Handle> {
        let project = self.lookup::<ProjectFacade>(project)?;
        let scope = project.scope.child("listing");
        Ok(self.register(Arc::new(ObjectIteratorFacade {
            scope,
            project,
            bucket: bucket.to_string(),
            options,
            cursor: Mutex::new(Cursor::default()),
        })))
    }

    /// Advances to the next item. `false` at the end or after an error.
    pub fn object_iterator_next(&self, iterator: Handle) -> BridgeResult<bool> {
        let it = self.lookup::<ObjectIteratorFacade>(iterator)?;

        let needs_fetch = {
            let cursor = it.cursor();
            cursor.pending.is_none() && cursor.error.is_none()
        };
        if needs_fetch {
            // The cursor lock is not held across the fetch so freeing the
            // iterator can still cancel it.
            let fetched = self.run_in(
                &it.scope,
                it.project
                    .project
                    .list_objects(&it.scope, &it.bucket, &it.options),
            );
            let mut cursor = it.cursor();
            match fetched {
                Ok(items) => {
                    tracing::debug!(bucket = %it.bucket, items = items.len(), "listing fetched");
                    cursor.pending = Some(items.into());
                }
                Err(err) => {
                    cursor.error = Some(err);
                    cursor.current = None;
                    return Ok(false);
                }
            }
        }

        let mut cursor = it.cursor();
        let next = cursor.pending.as_mut().and_then(VecDeque::pop_front);
        cursor.current = next;
        Ok(cursor.current.is_some())
    }

    /// The item `next` last advanced to.
    pub fn object_iterator_item(&self, iterator: Handle) -> BridgeResult<Option<Object>> {
        let it = self.lookup::<ObjectIteratorFacade>(iterator)?;
        let item = it.cursor().current.clone();
        Ok(item)
    }

    /// The error that ended iteration, if any.
    pub fn object_iterator_err(&self, iterator: Handle) -> BridgeResult<Option<BridgeError>> {
        let it = self.lookup::<ObjectIteratorFacade>(iterator)?;
        let err = it.cursor().error.clone();
        Ok(err)
    }

    pub fn free_object_iterator(&self, iterator: Handle) {
        if let Some(it) = self.take::<ObjectIteratorFacade>(iterator) {
            it.scope.cancel();
        }
    }
}

/// Lists objects in `bucket_name`. `options` may be null.
///
/// # Safety
/// `bucket_name` must be null or NUL-terminated; `options` must be null or
/// point to a readable struct whose strings are null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn uplink_list_objects(
    project: UplinkProject,
    bucket_name: *const c_char,
    options: *const UplinkListObjectsOptions,
) -> UplinkObjectIteratorResult {
    UplinkObjectIteratorResult::from_result(list_objects(project, bucket_name, options))
}

unsafe fn list_objects(
    project: UplinkProject,
    bucket_name: *const c_char,
    options: *const UplinkListObjectsOptions,
) -> BridgeResult<Handle> {
    let project = project.require()?;
    let bucket = read_str(bucket_name, "bucket_name")?;
    let options = match options.as_ref() {
        None => ListObjectsOptions::default(),
        Some(opts) => ListObjectsOptions {
            prefix: read_optional_str(opts.prefix, "options.prefix")?.to_string(),
            cursor: read_optional_str(opts.cursor, "options.cursor")?.to_string(),
            recursive: opts.recursive,
            system: opts.system,
            custom: opts.custom,
        },
    };
    universe()?.list_objects(project, bucket, options)
}

/// Advances the iterator. An invalid handle reads as exhausted; the
/// reason is available from `uplink_object_iterator_err`.
#[no_mangle]
pub extern "C" fn uplink_object_iterator_next(iterator: UplinkObjectIterator) -> bool {
    iterator
        .require()
        .and_then(|iterator| universe()?.object_iterator_next(iterator))
        .unwrap_or(false)
}

/// Current item, or null before the first `next` / after the last.
/// Free with `uplink_free_object`.
#[no_mangle]
pub extern "C" fn uplink_object_iterator_item(iterator: UplinkObjectIterator) -> *mut UplinkObject {
    match iterator
        .require()
        .and_then(|iterator| universe()?.object_iterator_item(iterator))
    {
        Ok(Some(object)) => malloc_object(&object),
        Ok(None) | Err(_) => ptr::null_mut(),
    }
}

/// Null when iteration ended cleanly.
#[no_mangle]
pub extern "C" fn uplink_object_iterator_err(iterator: UplinkObjectIterator) -> *mut UplinkError {
    match iterator
        .require()
        .and_then(|iterator| universe()?.object_iterator_err(iterator))
    {
        Ok(Some(err)) | Err(err) => malloc_error(err),
        Ok(None) => ptr::null_mut(),
    }
}

/// # Safety
/// `result` must be null or point to a result returned by this library.
#[no_mangle]
pub unsafe extern "C" fn uplink_free_object_iterator_result(
    result: *mut UplinkObjectIteratorResult,
) {
    let Some(result) = result.as_mut() else {
        return;
    };
    take_error(&mut result.error);
    let iterator = mem::take(&mut result.iterator);
    if let Ok(universe) = universe() {
        universe.free_object_iterator(iterator.handle());
    }
}
