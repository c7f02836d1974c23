//! Every handle handed out by a full session is released by its free call.
//!
//! Kept in its own binary so no concurrent test holds handles.

use bridge_provider::{Access, MemoryUplink, Uplink};
use std::ffi::CString;
use std::ptr;
use uplink_bridge::access::*;
use uplink_bridge::bucket::*;
use uplink_bridge::download::*;
use uplink_bridge::listing::*;
use uplink_bridge::marshal::uplink_free_bucket_result;
use uplink_bridge::project::*;
use uplink_bridge::universe::uplink_internal_universe_is_empty;
use uplink_bridge::upload::*;

#[test]
fn session_leaves_universe_empty() {
    assert!(uplink_internal_universe_is_empty());

    let access = Access::new("memory://local", "leak-key", "leak-check");
    let grant = CString::new(MemoryUplink::new().serialize_access(&access).unwrap()).unwrap();
    let bucket = CString::new("leaks").unwrap();
    let key = CString::new("object").unwrap();

    unsafe {
        let mut access = uplink_parse_access(grant.as_ptr());
        let mut project = uplink_open_project(access.access, ptr::null());
        let mut created = uplink_ensure_bucket(project.project, bucket.as_ptr());

        let mut upload =
            uplink_upload_object(project.project, bucket.as_ptr(), key.as_ptr(), ptr::null());
        let mut write = uplink_upload_write(upload.upload, b"data".as_ptr(), 4);
        assert!(uplink_upload_commit(upload.upload).is_null());

        // Left open on purpose: freeing the result must close it.
        let mut download =
            uplink_download_object(project.project, bucket.as_ptr(), key.as_ptr(), ptr::null());
        let mut iterator = uplink_list_objects(project.project, bucket.as_ptr(), ptr::null());
        assert!(uplink_object_iterator_next(iterator.iterator));

        assert!(!uplink_internal_universe_is_empty());

        uplink_free_object_iterator_result(&mut iterator);
        uplink_free_download_result(&mut download);
        uplink_free_write_result(&mut write);
        uplink_free_upload_result(&mut upload);
        uplink_free_bucket_result(&mut created);
        uplink_free_project_result(&mut project);
        uplink_free_access_result(&mut access);
    }

    assert!(uplink_internal_universe_is_empty());
}
