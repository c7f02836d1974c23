//! Object-storage library abstraction consumed by the C bridge.
//!
//! Every call that may block on the network receives the caller's
//! [`Scope`] so it can observe cancellation.

pub mod memory;
pub mod types;

use async_trait::async_trait;
use bridge_core::{BridgeResult, Scope};

pub use memory::MemoryUplink;
pub use types::{
    Access, Bucket, Config, CustomMetadata, DownloadOptions, ListObjectsOptions, Object,
    SystemMetadata, UploadOptions,
};

/// Library entry point: access grants and project open.
#[async_trait]
pub trait Uplink: Send + Sync {
    fn parse_access(&self, serialized: &str) -> BridgeResult<Access>;
    fn serialize_access(&self, access: &Access) -> BridgeResult<String>;
    async fn open_project(
        &self,
        scope: &Scope,
        access: &Access,
        config: &Config,
    ) -> BridgeResult<Box<dyn Project>>;
}

/// An open project: bucket and object management.
#[async_trait]
pub trait Project: Send + Sync {
    async fn close(&self) -> BridgeResult<()>;
    async fn revoke_access(&self, scope: &Scope, access: &Access) -> BridgeResult<()>;

    async fn create_bucket(&self, scope: &Scope, name: &str) -> BridgeResult<Bucket>;
    async fn ensure_bucket(&self, scope: &Scope, name: &str) -> BridgeResult<Bucket>;

    async fn stat_object(&self, scope: &Scope, bucket: &str, key: &str) -> BridgeResult<Object>;
    async fn delete_object(&self, scope: &Scope, bucket: &str, key: &str)
        -> BridgeResult<Object>;
    async fn list_objects(
        &self,
        scope: &Scope,
        bucket: &str,
        options: &ListObjectsOptions,
    ) -> BridgeResult<Vec<Object>>;

    async fn upload_object(
        &self,
        scope: &Scope,
        bucket: &str,
        key: &str,
        options: &UploadOptions,
    ) -> BridgeResult<Box<dyn Upload>>;
    async fn download_object(
        &self,
        scope: &Scope,
        bucket: &str,
        key: &str,
        options: &DownloadOptions,
    ) -> BridgeResult<Box<dyn Download>>;
}

/// A partial upload. Writes are observed by the scope passed to
/// [`Project::upload_object`].
#[async_trait]
pub trait Upload: Send {
    /// Returns the number of bytes consumed, `0 <= n <= buf.len()`.
    async fn write(&mut self, buf: &[u8]) -> BridgeResult<usize>;
    async fn set_custom_metadata(&mut self, custom: CustomMetadata) -> BridgeResult<()>;
    async fn commit(&mut self) -> BridgeResult<()>;
    async fn abort(&mut self) -> BridgeResult<()>;
    fn info(&self) -> Object;
}

/// A ranged download stream.
#[async_trait]
pub trait Download: Send {
    /// Returns [`BridgeError::Eof`](bridge_core::BridgeError::Eof) once exhausted.
    async fn read(&mut self, buf: &mut [u8]) -> BridgeResult<usize>;
    fn info(&self) -> Object;
    async fn close(&mut self) -> BridgeResult<()>;
}
