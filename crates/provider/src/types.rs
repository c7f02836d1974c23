//! Domain types exchanged with the object-storage library.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

// ---------------------------------------------------------------------------
// Access & configuration
// ---------------------------------------------------------------------------

/// Parsed access grant. Produced by [`Uplink::parse_access`](crate::Uplink::parse_access)
/// and otherwise opaque to the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    pub satellite_address: String,
    pub api_key: String,
    pub project_id: String,
}

impl Access {
    pub fn new(
        satellite_address: impl Into<String>,
        api_key: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            satellite_address: satellite_address.into(),
            api_key: api_key.into(),
            project_id: project_id.into(),
        }
    }
}

/// Project-open configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub user_agent: String,
    /// `None` leaves dialing unbounded.
    pub dial_timeout: Option<Duration>,
    /// Segment-upload scheduler width. `None` uses the library default.
    pub maximum_concurrent: Option<usize>,
}

// ---------------------------------------------------------------------------
// Buckets & objects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub name: String,
    pub created: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SystemMetadata {
    pub created: Option<SystemTime>,
    pub expires: Option<SystemTime>,
    pub content_length: u64,
}

pub type CustomMetadata = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Object {
    pub key: String,
    pub is_prefix: bool,
    pub system: SystemMetadata,
    pub custom: CustomMetadata,
}

// ---------------------------------------------------------------------------
// Operation options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// `None` means the object never expires.
    pub expires: Option<SystemTime>,
}

#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    pub offset: u64,
    /// Negative reads to the end of the object.
    pub length: i64,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            length: -1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListObjectsOptions {
    pub prefix: String,
    /// Listing starts strictly after this key.
    pub cursor: String,
    pub recursive: bool,
    /// Populate system metadata on listed items.
    pub system: bool,
    /// Populate custom metadata on listed items.
    pub custom: bool,
}
