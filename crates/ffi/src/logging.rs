//! Opt-in diagnostics for embedders.
//!
//! The library never installs a subscriber on its own initiative unless
//! `UPLINK_BRIDGE_LOG` is set, and never replaces one the host already
//! installed.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, e.g. `uplink_bridge=debug`.
pub const LOG_ENV: &str = "UPLINK_BRIDGE_LOG";

static INIT: Once = Once::new();

pub(crate) fn init() {
    INIT.call_once(|| {
        let Ok(directive) = std::env::var(LOG_ENV) else {
            return;
        };
        let filter = match EnvFilter::try_new(&directive) {
            Ok(filter) => filter,
            Err(err) => {
                eprintln!("{LOG_ENV}: ignoring invalid filter {directive:?}: {err}");
                return;
            }
        };
        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .try_init()
            .is_ok();
        tracing::debug!(installed, "bridge logging configured");
    });
}
