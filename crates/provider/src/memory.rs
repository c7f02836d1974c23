//! In-process object store implementing the library traits.
//!
//! Used by the test suites and the CLI. Network round-trips are simulated
//! with an optional per-call latency that sleeps on the caller's scope, so
//! cancellation behaves as it would against a remote satellite.

use crate::types::{
    Access, Bucket, Config, CustomMetadata, DownloadOptions, ListObjectsOptions, Object,
    SystemMetadata, UploadOptions,
};
use crate::{Download, Project, Upload, Uplink};
use async_trait::async_trait;
use bridge_core::{BridgeError, BridgeResult, Scope};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};
use tokio::sync::Semaphore;

/// Segment-upload scheduler width when the config leaves it unset.
const DEFAULT_CONCURRENCY: usize = 4;

/// Uploads are flushed to the store in segments of this size.
pub const SEGMENT_SIZE: usize = 64 * 1024;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Clone)]
struct StoredObject {
    data: Arc<Vec<u8>>,
    info: Object,
}

struct BucketStore {
    created: SystemTime,
    objects: BTreeMap<String, StoredObject>,
}

#[derive(Default)]
struct ProjectStore {
    buckets: Mutex<BTreeMap<String, BucketStore>>,
}

#[derive(Default)]
struct State {
    projects: Mutex<HashMap<String, Arc<ProjectStore>>>,
    revoked: Mutex<HashSet<String>>,
}

/// In-memory [`Uplink`] backend.
///
/// Access grants serialize as hex-encoded JSON:
///
/// ```ignore
/// let uplink = MemoryUplink::new();
/// let grant = uplink.serialize_access(&Access::new("memory://local", "key", "demo"))?;
/// ```
#[derive(Clone, Default)]
pub struct MemoryUplink {
    state: Arc<State>,
    latency: Duration,
}

impl MemoryUplink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated round-trip applied to every network-bound call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

async fn round_trip(scope: &Scope, latency: Duration) -> BridgeResult<()> {
    if latency.is_zero() {
        if scope.is_cancelled() {
            return Err(BridgeError::Canceled);
        }
        return Ok(());
    }
    scope.sleep(latency).await
}

#[async_trait]
impl Uplink for MemoryUplink {
    fn parse_access(&self, serialized: &str) -> BridgeResult<Access> {
        let raw = hex::decode(serialized.trim())
            .map_err(|e| BridgeError::Internal(format!("malformed access grant: {e}")))?;
        let access: Access = serde_json::from_slice(&raw)
            .map_err(|e| BridgeError::Internal(format!("malformed access grant: {e}")))?;
        if access.api_key.is_empty() {
            return Err(BridgeError::Internal("access grant has no api key".into()));
        }
        Ok(access)
    }

    fn serialize_access(&self, access: &Access) -> BridgeResult<String> {
        let raw = serde_json::to_vec(access)
            .map_err(|e| BridgeError::Internal(format!("serialize access grant: {e}")))?;
        Ok(hex::encode(raw))
    }

    async fn open_project(
        &self,
        scope: &Scope,
        access: &Access,
        config: &Config,
    ) -> BridgeResult<Box<dyn Project>> {
        let dial = round_trip(scope, self.latency);
        match config.dial_timeout {
            Some(limit) => tokio::time::timeout(limit, dial)
                .await
                .map_err(|_| BridgeError::Network(format!("dial timed out after {limit:?}")))??,
            None => dial.await?,
        }

        if lock(&self.state.revoked).contains(&access.api_key) {
            return Err(BridgeError::PermissionDenied("api key revoked".into()));
        }

        let store = Arc::clone(
            lock(&self.state.projects)
                .entry(access.project_id.clone())
                .or_default(),
        );
        let width = config.maximum_concurrent.unwrap_or(DEFAULT_CONCURRENCY).max(1);

        tracing::debug!(
            project = %access.project_id,
            satellite = %access.satellite_address,
            user_agent = %config.user_agent,
            maximum_concurrent = width,
            "memory project opened"
        );

        Ok(Box::new(MemoryProject {
            state: Arc::clone(&self.state),
            store,
            project_id: access.project_id.clone(),
            latency: self.latency,
            scheduler: Arc::new(Semaphore::new(width)),
            closed: AtomicBool::new(false),
        }))
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

struct MemoryProject {
    state: Arc<State>,
    store: Arc<ProjectStore>,
    project_id: String,
    latency: Duration,
    scheduler: Arc<Semaphore>,
    closed: AtomicBool,
}

fn validate_bucket_name(name: &str) -> BridgeResult<()> {
    let valid_len = (3..=63).contains(&name.len());
    let valid_chars = name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.');
    let valid_edges = name
        .bytes()
        .next()
        .zip(name.bytes().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

    if valid_len && valid_chars && valid_edges {
        Ok(())
    } else {
        Err(BridgeError::BucketNameInvalid(name.to_string()))
    }
}

fn validate_key(key: &str) -> BridgeResult<()> {
    if key.is_empty() {
        return Err(BridgeError::ObjectKeyInvalid(key.to_string()));
    }
    Ok(())
}

fn is_expired(info: &Object, now: SystemTime) -> bool {
    info.system.expires.is_some_and(|at| at <= now)
}

impl MemoryProject {
    async fn enter(&self, scope: &Scope) -> BridgeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::Internal("project closed".into()));
        }
        round_trip(scope, self.latency).await
    }

    fn live_object(&self, bucket: &str, key: &str) -> BridgeResult<StoredObject> {
        let buckets = lock(&self.store.buckets);
        let store = buckets
            .get(bucket)
            .ok_or_else(|| BridgeError::BucketNotFound(bucket.to_string()))?;
        store
            .objects
            .get(key)
            .filter(|o| !is_expired(&o.info, SystemTime::now()))
            .cloned()
            .ok_or_else(|| BridgeError::ObjectNotFound(key.to_string()))
    }
}

#[async_trait]
impl Project for MemoryProject {
    async fn close(&self) -> BridgeResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::Internal("project already closed".into()));
        }
        self.scheduler.close();
        tracing::debug!(project = %self.project_id, "memory project closed");
        Ok(())
    }

    async fn revoke_access(&self, scope: &Scope, access: &Access) -> BridgeResult<()> {
        self.enter(scope).await?;
        if access.project_id != self.project_id {
            return Err(BridgeError::PermissionDenied(
                "access grant belongs to another project".into(),
            ));
        }
        lock(&self.state.revoked).insert(access.api_key.clone());
        tracing::info!(project = %self.project_id, "api key revoked");
        Ok(())
    }

    async fn create_bucket(&self, scope: &Scope, name: &str) -> BridgeResult<Bucket> {
        validate_bucket_name(name)?;
        self.enter(scope).await?;

        let mut buckets = lock(&self.store.buckets);
        if buckets.contains_key(name) {
            return Err(BridgeError::BucketAlreadyExists(name.to_string()));
        }
        let created = SystemTime::now();
        buckets.insert(
            name.to_string(),
            BucketStore {
                created,
                objects: BTreeMap::new(),
            },
        );
        Ok(Bucket {
            name: name.to_string(),
            created,
        })
    }

    async fn ensure_bucket(&self, scope: &Scope, name: &str) -> BridgeResult<Bucket> {
        validate_bucket_name(name)?;
        self.enter(scope).await?;

        let mut buckets = lock(&self.store.buckets);
        let store = buckets.entry(name.to_string()).or_insert_with(|| BucketStore {
            created: SystemTime::now(),
            objects: BTreeMap::new(),
        });
        Ok(Bucket {
            name: name.to_string(),
            created: store.created,
        })
    }

    async fn stat_object(&self, scope: &Scope, bucket: &str, key: &str) -> BridgeResult<Object> {
        validate_bucket_name(bucket)?;
        validate_key(key)?;
        self.enter(scope).await?;
        Ok(self.live_object(bucket, key)?.info)
    }

    async fn delete_object(
        &self,
        scope: &Scope,
        bucket: &str,
        key: &str,
    ) -> BridgeResult<Object> {
        validate_bucket_name(bucket)?;
        validate_key(key)?;
        self.enter(scope).await?;

        let info = self.live_object(bucket, key)?.info;
        if let Some(store) = lock(&self.store.buckets).get_mut(bucket) {
            store.objects.remove(key);
        }
        Ok(info)
    }

    async fn list_objects(
        &self,
        scope: &Scope,
        bucket: &str,
        options: &ListObjectsOptions,
    ) -> BridgeResult<Vec<Object>> {
        validate_bucket_name(bucket)?;
        self.enter(scope).await?;

        let now = SystemTime::now();
        let buckets = lock(&self.store.buckets);
        let store = buckets
            .get(bucket)
            .ok_or_else(|| BridgeError::BucketNotFound(bucket.to_string()))?;

        let mut items: Vec<Object> = Vec::new();
        let candidates = store
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(&options.prefix))
            .filter(|(key, _)| key.as_str() > options.cursor.as_str())
            .filter(|(_, obj)| !is_expired(&obj.info, now));

        for (key, obj) in candidates {
            let rest = &key[options.prefix.len()..];
            let collapsed = match rest.find('/') {
                Some(i) if !options.recursive => Some(format!("{}{}", options.prefix, &rest[..=i])),
                _ => None,
            };

            match collapsed {
                // Sorted keys keep every member of a prefix contiguous.
                Some(prefix) if items.last().is_some_and(|last| last.key == prefix) => {}
                Some(prefix) => items.push(Object {
                    key: prefix,
                    is_prefix: true,
                    ..Object::default()
                }),
                None => items.push(Object {
                    key: key.clone(),
                    is_prefix: false,
                    system: if options.system {
                        obj.info.system.clone()
                    } else {
                        SystemMetadata::default()
                    },
                    custom: if options.custom {
                        obj.info.custom.clone()
                    } else {
                        CustomMetadata::new()
                    },
                }),
            }
        }

        tracing::debug!(bucket, prefix = %options.prefix, items = items.len(), "listed objects");
        Ok(items)
    }

    async fn upload_object(
        &self,
        scope: &Scope,
        bucket: &str,
        key: &str,
        options: &UploadOptions,
    ) -> BridgeResult<Box<dyn Upload>> {
        validate_bucket_name(bucket)?;
        validate_key(key)?;
        self.enter(scope).await?;

        if !lock(&self.store.buckets).contains_key(bucket) {
            return Err(BridgeError::BucketNotFound(bucket.to_string()));
        }

        Ok(Box::new(MemoryUpload {
            scope: scope.clone(),
            store: Arc::clone(&self.store),
            scheduler: Arc::clone(&self.scheduler),
            latency: self.latency,
            bucket: bucket.to_string(),
            key: key.to_string(),
            expires: options.expires,
            custom: CustomMetadata::new(),
            buffer: Vec::new(),
            flushed: 0,
            length: 0,
            committed_at: None,
            done: false,
        }))
    }

    async fn download_object(
        &self,
        scope: &Scope,
        bucket: &str,
        key: &str,
        options: &DownloadOptions,
    ) -> BridgeResult<Box<dyn Download>> {
        validate_bucket_name(bucket)?;
        validate_key(key)?;
        self.enter(scope).await?;

        let obj = self.live_object(bucket, key)?;
        let len = obj.data.len() as u64;
        let start = options.offset.min(len);
        let end = if options.length < 0 {
            len
        } else {
            start.saturating_add(options.length as u64).min(len)
        };

        Ok(Box::new(MemoryDownload {
            scope: scope.clone(),
            latency: self.latency,
            data: obj.data,
            info: obj.info,
            pos: start as usize,
            end: end as usize,
            closed: false,
        }))
    }
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

struct MemoryUpload {
    scope: Scope,
    store: Arc<ProjectStore>,
    scheduler: Arc<Semaphore>,
    latency: Duration,
    bucket: String,
    key: String,
    expires: Option<SystemTime>,
    custom: CustomMetadata,
    buffer: Vec<u8>,
    flushed: usize,
    /// Bytes accepted so far; survives the buffer moving into the store.
    length: u64,
    committed_at: Option<SystemTime>,
    done: bool,
}

impl MemoryUpload {
    fn unflushed(&self) -> usize {
        self.buffer.len() - self.flushed
    }

    /// Pushes every buffered byte not yet flushed as one segment.
    async fn flush_segment(&mut self) -> BridgeResult<()> {
        if self.unflushed() == 0 {
            return Ok(());
        }
        let scheduler = Arc::clone(&self.scheduler);
        let _permit = self
            .scope
            .run(async move {
                scheduler
                    .acquire_owned()
                    .await
                    .map_err(|_| BridgeError::Internal("project closed".into()))
            })
            .await?;
        round_trip(&self.scope, self.latency).await?;

        tracing::trace!(key = %self.key, bytes = self.unflushed(), "segment flushed");
        self.flushed = self.buffer.len();
        Ok(())
    }
}

#[async_trait]
impl Upload for MemoryUpload {
    async fn write(&mut self, buf: &[u8]) -> BridgeResult<usize> {
        if self.done {
            return Err(BridgeError::UploadDone);
        }
        if self.unflushed() >= SEGMENT_SIZE {
            self.flush_segment().await?;
        }
        let n = (SEGMENT_SIZE - self.unflushed()).min(buf.len());
        self.buffer.extend_from_slice(&buf[..n]);
        self.length += n as u64;
        Ok(n)
    }

    async fn set_custom_metadata(&mut self, custom: CustomMetadata) -> BridgeResult<()> {
        if self.done {
            return Err(BridgeError::UploadDone);
        }
        self.custom = custom;
        Ok(())
    }

    async fn commit(&mut self) -> BridgeResult<()> {
        if self.done {
            return Err(BridgeError::UploadDone);
        }
        self.flush_segment().await?;

        let now = SystemTime::now();
        let mut buckets = lock(&self.store.buckets);
        let store = buckets
            .get_mut(&self.bucket)
            .ok_or_else(|| BridgeError::BucketNotFound(self.bucket.clone()))?;

        self.done = true;
        self.committed_at = Some(now);
        let info = self.info();
        store.objects.insert(
            self.key.clone(),
            StoredObject {
                data: Arc::new(std::mem::take(&mut self.buffer)),
                info,
            },
        );
        tracing::debug!(bucket = %self.bucket, key = %self.key, "upload committed");
        Ok(())
    }

    async fn abort(&mut self) -> BridgeResult<()> {
        if self.done {
            return Err(BridgeError::UploadDone);
        }
        self.done = true;
        self.buffer.clear();
        self.flushed = 0;
        self.length = 0;
        Ok(())
    }

    fn info(&self) -> Object {
        Object {
            key: self.key.clone(),
            is_prefix: false,
            system: SystemMetadata {
                created: self.committed_at,
                expires: self.expires,
                content_length: self.length,
            },
            custom: self.custom.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

struct MemoryDownload {
    scope: Scope,
    latency: Duration,
    data: Arc<Vec<u8>>,
    info: Object,
    pos: usize,
    end: usize,
    closed: bool,
}

#[async_trait]
impl Download for MemoryDownload {
    async fn read(&mut self, buf: &mut [u8]) -> BridgeResult<usize> {
        if self.closed {
            return Err(BridgeError::Internal("download closed".into()));
        }
        if self.pos >= self.end {
            return Err(BridgeError::Eof);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        round_trip(&self.scope, self.latency).await?;

        let n = (self.end - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn info(&self) -> Object {
        self.info.clone()
    }

    async fn close(&mut self) -> BridgeResult<()> {
        if self.closed {
            return Err(BridgeError::Internal("download already closed".into()));
        }
        self.closed = true;
        Ok(())
    }
}
