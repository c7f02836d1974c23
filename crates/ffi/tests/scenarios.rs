//! End-to-end scenarios driven through the C ABI against the in-memory backend.
//!
//! Tests share the process-wide universe, so each one uses its own project id.

use bridge_core::error::code;
use bridge_provider::{Access, MemoryUplink, Uplink};
use std::ffi::{CStr, CString};
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

fn grant(project_id: &str) -> CString {
    let access = Access::new("memory://local", format!("key-{project_id}"), project_id);
    let text = MemoryUplink::new().serialize_access(&access).unwrap();
    CString::new(text).unwrap()
}

fn error_code(err: *const UplinkError) -> Option<i32> {
    unsafe { err.as_ref().map(|e| e.code) }
}

/// Asserts `err` carries `expected`, then frees it.
fn expect_code(err: *mut UplinkError, expected: i32) {
    assert_eq!(error_code(err), Some(expected), "{}", message(err));
    unsafe { uplink_free_error(err) };
}

fn expect_ok(err: *mut UplinkError) {
    assert!(err.is_null(), "unexpected error: {}", message(err));
}

fn message(err: *const UplinkError) -> String {
    unsafe {
        err.as_ref()
            .map(|e| CStr::from_ptr(e.message).to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

struct Session {
    access: UplinkAccessResult,
    project: UplinkProjectResult,
}

impl Session {
    fn open(project_id: &str) -> Self {
        let grant = grant(project_id);
        let access = unsafe { uplink_parse_access(grant.as_ptr()) };
        expect_ok(access.error);
        let project = unsafe { uplink_open_project(access.access, ptr::null()) };
        expect_ok(project.error);
        assert_ne!(project.project._handle, 0);
        Self { access, project }
    }

    fn project(&self) -> UplinkProject {
        self.project.project
    }

    fn bucket(&self, name: &str) {
        let name = CString::new(name).unwrap();
        let mut bucket = unsafe { uplink_ensure_bucket(self.project(), name.as_ptr()) };
        expect_ok(bucket.error);
        unsafe { uplink_free_bucket_result(&mut bucket) };
    }

    fn put(&self, bucket: &str, key: &str, data: &[u8]) {
        let bucket = CString::new(bucket).unwrap();
        let key = CString::new(key).unwrap();
        let mut upload = unsafe {
            uplink_upload_object(self.project(), bucket.as_ptr(), key.as_ptr(), ptr::null())
        };
        expect_ok(upload.error);
        let mut write = unsafe { uplink_upload_write(upload.upload, data.as_ptr(), data.len()) };
        expect_ok(write.error);
        assert_eq!(write.bytes_written, data.len());
        expect_ok(uplink_upload_commit(upload.upload));
        unsafe {
            uplink_free_write_result(&mut write);
            uplink_free_upload_result(&mut upload);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        unsafe {
            uplink_free_project_result(&mut self.project);
            uplink_free_access_result(&mut self.access);
        }
    }
}

#[test]
fn upload_write_commit_then_free() {
    let session = Session::open("scenario-upload");
    session.bucket("photos");

    let bucket = CString::new("photos").unwrap();
    let key = CString::new("cat.bin").unwrap();
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

    let mut upload = unsafe {
        uplink_upload_object(session.project(), bucket.as_ptr(), key.as_ptr(), ptr::null())
    };
    expect_ok(upload.error);
    assert_ne!(upload.upload._handle, 0);

    let mut write = unsafe { uplink_upload_write(upload.upload, data.as_ptr(), data.len()) };
    expect_ok(write.error);
    assert_eq!(write.bytes_written, data.len());
    unsafe { uplink_free_write_result(&mut write) };

    expect_ok(uplink_upload_commit(upload.upload));

    let mut stat = unsafe { uplink_stat_object(session.project(), bucket.as_ptr(), key.as_ptr()) };
    expect_ok(stat.error);
    unsafe {
        assert_eq!((*stat.object).system.content_length, data.len() as i64);
        assert!((*stat.object).system.created > 0);
        uplink_free_object_result(&mut stat);
    }

    let stale = upload.upload;
    unsafe { uplink_free_upload_result(&mut upload) };
    assert_eq!(upload.upload._handle, 0);

    let mut info = uplink_upload_info(stale);
    assert!(info.object.is_null());
    expect_code(info.error, code::INVALID_HANDLE);
    info.error = ptr::null_mut();
    unsafe { uplink_free_object_result(&mut info) };
}

#[test]
fn null_bucket_name_registers_nothing() {
    let session = Session::open("scenario-null-bucket");
    let key = CString::new("k").unwrap();

    let mut upload =
        unsafe { uplink_upload_object(session.project(), ptr::null(), key.as_ptr(), ptr::null()) };
    assert_eq!(upload.upload._handle, 0);
    assert_eq!(error_code(upload.error), Some(code::NULL_ARGUMENT));
    assert!(message(upload.error).contains("bucket_name"));
    unsafe { uplink_free_upload_result(&mut upload) };
    assert!(upload.error.is_null());
}

#[test]
fn null_argument_checked_before_handle() {
    let key = CString::new("k").unwrap();
    let mut upload = unsafe {
        uplink_upload_object(UplinkProject::default(), ptr::null(), key.as_ptr(), ptr::null())
    };
    expect_code(upload.error, code::NULL_ARGUMENT);
    upload.error = ptr::null_mut();
    unsafe { uplink_free_upload_result(&mut upload) };
}

#[test]
fn revoke_after_close_is_invalid_handle() {
    let session = Session::open("scenario-close-revoke");
    expect_ok(uplink_close_project(session.project()));
    expect_code(
        uplink_revoke_access(session.project(), session.access.access),
        code::INVALID_HANDLE,
    );
    expect_code(uplink_close_project(session.project()), code::INVALID_HANDLE);
}

#[test]
fn revoked_grant_cannot_reopen() {
    let session = Session::open("scenario-revoke");
    expect_ok(uplink_revoke_access(session.project(), session.access.access));

    let mut again = unsafe { uplink_open_project(session.access.access, ptr::null()) };
    assert_eq!(again.project._handle, 0);
    expect_code(again.error, code::PERMISSION_DENIED);
    again.error = ptr::null_mut();
    unsafe { uplink_free_project_result(&mut again) };
}

#[test]
fn oversized_write_is_invalid_argument() {
    let session = Session::open("scenario-oversize");
    session.bucket("big");
    let bucket = CString::new("big").unwrap();
    let key = CString::new("huge").unwrap();
    let mut upload = unsafe {
        uplink_upload_object(session.project(), bucket.as_ptr(), key.as_ptr(), ptr::null())
    };
    expect_ok(upload.error);

    let byte = 0u8;
    let mut write = unsafe { uplink_upload_write(upload.upload, &byte, usize::MAX) };
    assert_eq!(write.bytes_written, 0);
    assert_eq!(error_code(write.error), Some(code::INVALID_ARGUMENT));
    unsafe {
        uplink_free_write_result(&mut write);
        uplink_free_upload_result(&mut upload);
    }
}

#[test]
fn freeing_results_twice_is_noop() {
    let session = Session::open("scenario-double-free");
    let mut access = unsafe { uplink_parse_access(grant("scenario-double-free").as_ptr()) };
    unsafe {
        uplink_free_access_result(&mut access);
        uplink_free_access_result(&mut access);
        uplink_free_access_result(ptr::null_mut());
    }

    let mut failed = unsafe { uplink_parse_access(CString::new("zz").unwrap().as_ptr()) };
    assert_eq!(error_code(failed.error), Some(code::INTERNAL));
    unsafe {
        uplink_free_access_result(&mut failed);
        uplink_free_access_result(&mut failed);
    }

    let mut serialized = uplink_access_serialize(session.access.access);
    expect_ok(serialized.error);
    unsafe {
        uplink_free_string_result(&mut serialized);
        uplink_free_string_result(&mut serialized);
        uplink_free_error(ptr::null_mut());
        uplink_free_object(ptr::null_mut());
    }
}

#[test]
fn stale_and_foreign_handles_are_rejected() {
    let session = Session::open("scenario-handles");
    let bogus = UplinkUpload { _handle: u64::MAX };

    expect_code(uplink_upload_commit(bogus), code::INVALID_HANDLE);
    expect_code(uplink_upload_abort(bogus), code::INVALID_HANDLE);
    let mut write = unsafe { uplink_upload_write(bogus, ptr::null(), 0) };
    expect_code(write.error, code::INVALID_HANDLE);
    write.error = ptr::null_mut();
    unsafe { uplink_free_write_result(&mut write) };

    // An access handle is not a project handle even though both resolve
    // through the same table.
    let disguised = UplinkProject {
        _handle: session.access.access._handle,
    };
    expect_code(uplink_close_project(disguised), code::INVALID_HANDLE);
    let mut name = uplink_access_satellite_address(session.access.access);
    expect_ok(name.error);
    assert_eq!(
        unsafe { CStr::from_ptr(name.string) }.to_str().unwrap(),
        "memory://local"
    );
    unsafe { uplink_free_string_result(&mut name) };

    let stale = UplinkObjectIterator { _handle: u64::MAX };
    assert!(!uplink_object_iterator_next(stale));
    assert!(uplink_object_iterator_item(stale).is_null());
    expect_code(uplink_object_iterator_err(stale), code::INVALID_HANDLE);
}

#[test]
fn null_handles_are_null_arguments() {
    let session = Session::open("scenario-null-handles");

    expect_code(
        uplink_revoke_access(UplinkProject::default(), UplinkAccess::default()),
        code::NULL_ARGUMENT,
    );
    expect_code(
        uplink_revoke_access(session.project(), UplinkAccess::default()),
        code::NULL_ARGUMENT,
    );
    expect_code(uplink_upload_commit(UplinkUpload::default()), code::NULL_ARGUMENT);
    expect_code(
        uplink_object_iterator_err(UplinkObjectIterator::default()),
        code::NULL_ARGUMENT,
    );

    let mut project = unsafe { uplink_open_project(UplinkAccess::default(), ptr::null()) };
    expect_code(project.error, code::NULL_ARGUMENT);
    project.error = ptr::null_mut();
    unsafe { uplink_free_project_result(&mut project) };

    let mut buf = [0u8; 4];
    let mut read =
        unsafe { uplink_download_read(UplinkDownload::default(), buf.as_mut_ptr(), buf.len()) };
    expect_code(read.error, code::NULL_ARGUMENT);
    read.error = ptr::null_mut();
    unsafe { uplink_free_read_result(&mut read) };

    // Closing nothing is not an error.
    expect_ok(uplink_close_project(UplinkProject::default()));
    expect_ok(uplink_close_download(UplinkDownload::default()));

    // The real project is untouched by any of the above.
    session.bucket("still-open");
}

#[test]
fn oversized_metadata_count_is_invalid_argument() {
    let session = Session::open("scenario-metadata-count");
    session.bucket("meta");
    let bucket = CString::new("meta").unwrap();
    let key = CString::new("k").unwrap();
    let mut upload = unsafe {
        uplink_upload_object(session.project(), bucket.as_ptr(), key.as_ptr(), ptr::null())
    };
    expect_ok(upload.error);

    let custom = UplinkCustomMetadata {
        entries: ptr::NonNull::dangling().as_ptr(),
        count: isize::MAX as usize / 8,
    };
    let err = unsafe { uplink_upload_set_custom_metadata(upload.upload, custom) };
    assert_eq!(message(err), "invalid argument: custom metadata count too large");
    expect_code(err, code::INVALID_ARGUMENT);

    expect_ok(uplink_upload_commit(upload.upload));
    unsafe { uplink_free_upload_result(&mut upload) };
}

#[test]
fn maximum_concurrent_must_be_positive() {
    let grant = grant("scenario-concurrency");
    let mut access = unsafe { uplink_parse_access(grant.as_ptr()) };
    expect_ok(access.error);

    let zero = 0;
    let mut project = unsafe { uplink_open_project(access.access, &zero) };
    assert_eq!(project.project._handle, 0);
    assert_eq!(error_code(project.error), Some(code::INVALID_ARGUMENT));
    unsafe { uplink_free_project_result(&mut project) };

    let config = UplinkConfig {
        user_agent: ptr::null(),
        dial_timeout_milliseconds: 0,
        maximum_concurrent: -3,
    };
    let mut project = unsafe { uplink_config_open_project(config, access.access) };
    assert_eq!(error_code(project.error), Some(code::INVALID_ARGUMENT));
    unsafe { uplink_free_project_result(&mut project) };

    let agent = CString::new("scenario/1.0").unwrap();
    let config = UplinkConfig {
        user_agent: agent.as_ptr(),
        dial_timeout_milliseconds: 5_000,
        maximum_concurrent: 1,
    };
    let mut project = unsafe { uplink_config_open_project(config, access.access) };
    expect_ok(project.error);
    unsafe {
        uplink_free_project_result(&mut project);
        uplink_free_access_result(&mut access);
    }
}

#[test]
fn bucket_errors_are_delegated() {
    let session = Session::open("scenario-buckets");
    let bad = CString::new("Bad_Name").unwrap();
    let mut result = unsafe { uplink_create_bucket(session.project(), bad.as_ptr()) };
    assert!(result.bucket.is_null());
    assert_eq!(error_code(result.error), Some(code::BUCKET_NAME_INVALID));
    unsafe { uplink_free_bucket_result(&mut result) };

    let name = CString::new("docs").unwrap();
    let mut first = unsafe { uplink_create_bucket(session.project(), name.as_ptr()) };
    expect_ok(first.error);
    unsafe {
        assert_eq!(CStr::from_ptr((*first.bucket).name).to_str().unwrap(), "docs");
        uplink_free_bucket_result(&mut first);
    }
    let mut second = unsafe { uplink_create_bucket(session.project(), name.as_ptr()) };
    assert_eq!(error_code(second.error), Some(code::BUCKET_ALREADY_EXISTS));
    unsafe { uplink_free_bucket_result(&mut second) };
}

#[test]
fn committed_upload_keeps_info_and_rejects_writes() {
    let session = Session::open("scenario-finalized");
    session.bucket("notes");
    let bucket = CString::new("notes").unwrap();
    let key = CString::new("todo.txt").unwrap();
    let options = UplinkUploadOptions {
        expires: 4_102_444_800,
    };
    let mut upload =
        unsafe { uplink_upload_object(session.project(), bucket.as_ptr(), key.as_ptr(), &options) };
    expect_ok(upload.error);

    let color_key = CString::new("color").unwrap();
    let color_value = CString::new("green").unwrap();
    let mut entry = UplinkCustomMetadataEntry {
        key: color_key.as_ptr() as *mut _,
        key_length: 5,
        value: color_value.as_ptr() as *mut _,
        value_length: 5,
    };
    let custom = UplinkCustomMetadata {
        entries: &mut entry,
        count: 1,
    };
    expect_ok(unsafe { uplink_upload_set_custom_metadata(upload.upload, custom) });

    let body = b"buy milk";
    let mut write = unsafe { uplink_upload_write(upload.upload, body.as_ptr(), body.len()) };
    expect_ok(write.error);
    unsafe { uplink_free_write_result(&mut write) };
    expect_ok(uplink_upload_commit(upload.upload));

    let mut late = unsafe { uplink_upload_write(upload.upload, body.as_ptr(), body.len()) };
    assert_eq!(late.bytes_written, 0);
    assert_eq!(error_code(late.error), Some(code::UPLOAD_DONE));
    unsafe { uplink_free_write_result(&mut late) };
    expect_code(uplink_upload_abort(upload.upload), code::UPLOAD_DONE);

    let mut info = uplink_upload_info(upload.upload);
    expect_ok(info.error);
    unsafe {
        let object = &*info.object;
        assert_eq!(CStr::from_ptr(object.key).to_str().unwrap(), "todo.txt");
        assert_eq!(object.system.content_length, body.len() as i64);
        assert_eq!(object.system.expires, 4_102_444_800);
        assert_eq!(object.custom.count, 1);
        uplink_free_object_result(&mut info);
        uplink_free_upload_result(&mut upload);
    }
}

#[test]
fn download_reads_range_until_eof() {
    let session = Session::open("scenario-download");
    session.bucket("media");
    session.put("media", "clip", b"0123456789");

    let bucket = CString::new("media").unwrap();
    let key = CString::new("clip").unwrap();
    let options = UplinkDownloadOptions {
        offset: 2,
        length: 5,
    };
    let mut download = unsafe {
        uplink_download_object(session.project(), bucket.as_ptr(), key.as_ptr(), &options)
    };
    expect_ok(download.error);

    let mut out = Vec::new();
    let mut buf = [0u8; 3];
    loop {
        let mut read = unsafe { uplink_download_read(download.download, buf.as_mut_ptr(), buf.len()) };
        if !read.error.is_null() {
            assert_eq!(read.bytes_read, 0);
            assert_eq!(error_code(read.error), Some(code::EOF));
            unsafe { uplink_free_read_result(&mut read) };
            break;
        }
        out.extend_from_slice(&buf[..read.bytes_read]);
        unsafe { uplink_free_read_result(&mut read) };
    }
    assert_eq!(out, b"23456");

    let mut info = uplink_download_info(download.download);
    expect_ok(info.error);
    unsafe {
        assert_eq!((*info.object).system.content_length, 10);
        uplink_free_object_result(&mut info);
    }

    expect_ok(uplink_close_download(download.download));
    expect_code(uplink_close_download(download.download), code::INVALID_HANDLE);
    unsafe { uplink_free_download_result(&mut download) };
}

#[test]
fn missing_object_is_not_found() {
    let session = Session::open("scenario-missing");
    session.bucket("empty");
    let bucket = CString::new("empty").unwrap();
    let key = CString::new("ghost").unwrap();

    let mut download = unsafe {
        uplink_download_object(session.project(), bucket.as_ptr(), key.as_ptr(), ptr::null())
    };
    assert_eq!(download.download._handle, 0);
    assert_eq!(error_code(download.error), Some(code::OBJECT_NOT_FOUND));
    unsafe { uplink_free_download_result(&mut download) };

    let mut deleted =
        unsafe { uplink_delete_object(session.project(), bucket.as_ptr(), key.as_ptr()) };
    assert_eq!(error_code(deleted.error), Some(code::OBJECT_NOT_FOUND));
    unsafe { uplink_free_object_result(&mut deleted) };
}

#[test]
fn listing_collapses_prefixes() {
    let session = Session::open("scenario-listing");
    session.bucket("tree");
    for key in ["a.txt", "dir/one", "dir/two", "z.txt"] {
        session.put("tree", key, key.as_bytes());
    }

    let bucket = CString::new("tree").unwrap();
    let mut iterator = unsafe { uplink_list_objects(session.project(), bucket.as_ptr(), ptr::null()) };
    expect_ok(iterator.error);

    let mut seen = Vec::new();
    assert!(uplink_object_iterator_item(iterator.iterator).is_null());
    while uplink_object_iterator_next(iterator.iterator) {
        let item = uplink_object_iterator_item(iterator.iterator);
        unsafe {
            let key = CStr::from_ptr((*item).key).to_str().unwrap().to_string();
            seen.push((key, (*item).is_prefix));
            uplink_free_object(item);
        }
    }
    expect_ok(uplink_object_iterator_err(iterator.iterator));
    assert_eq!(
        seen,
        vec![
            ("a.txt".to_string(), false),
            ("dir/".to_string(), true),
            ("z.txt".to_string(), false),
        ]
    );
    unsafe { uplink_free_object_iterator_result(&mut iterator) };

    let prefix = CString::new("dir/").unwrap();
    let options = UplinkListObjectsOptions {
        prefix: prefix.as_ptr(),
        cursor: ptr::null(),
        recursive: true,
        system: true,
        custom: false,
    };
    let mut iterator = unsafe { uplink_list_objects(session.project(), bucket.as_ptr(), &options) };
    expect_ok(iterator.error);
    let mut count = 0;
    while uplink_object_iterator_next(iterator.iterator) {
        count += 1;
    }
    assert_eq!(count, 2);
    unsafe { uplink_free_object_iterator_result(&mut iterator) };
}

#[test]
fn listing_missing_bucket_reports_through_err() {
    let session = Session::open("scenario-listing-missing");
    let bucket = CString::new("nowhere").unwrap();
    let mut iterator = unsafe { uplink_list_objects(session.project(), bucket.as_ptr(), ptr::null()) };
    expect_ok(iterator.error);

    assert!(!uplink_object_iterator_next(iterator.iterator));
    expect_code(uplink_object_iterator_err(iterator.iterator), code::BUCKET_NOT_FOUND);
    unsafe { uplink_free_object_iterator_result(&mut iterator) };
}
