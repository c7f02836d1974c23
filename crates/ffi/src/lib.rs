//! C ABI over the object-storage library.
//!
//! Foreign callers hold opaque per-kind handles into one process-wide
//! [`Universe`]. Every result and error crosses the boundary as a
//! `malloc` allocation released by a matching `uplink_free_*` call.

pub mod access;
pub mod bucket;
pub mod download;
pub mod listing;
pub mod logging;
pub mod marshal;
pub mod object;
pub mod project;
mod resource;
pub mod types;
pub mod universe;
pub mod upload;

pub use types::*;
pub use universe::{install, universe, Universe};
