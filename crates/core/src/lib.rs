//! Error taxonomy, handle registry, and cancellation scopes.
//!
//! Foundation crate -- no I/O, no knowledge of the C boundary or of the
//! wrapped storage library.

pub mod error;
pub mod registry;
pub mod scope;

pub use error::{BridgeError, BridgeResult, ErrorKind};
pub use registry::{Handle, Registry};
pub use scope::Scope;
