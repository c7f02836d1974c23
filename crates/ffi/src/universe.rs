//! The handle table, the root scope and the runtime delegated calls run on.

use crate::logging;
use crate::resource::{Facade, Resource};
use bridge_core::{BridgeError, BridgeResult, Handle, Registry, Scope};
use bridge_provider::{MemoryUplink, Uplink};
use once_cell::sync::OnceCell;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Runtime;

static UNIVERSE: OnceCell<Universe> = OnceCell::new();

/// Process-wide instance used by every `uplink_*` entry point.
///
/// Built around [`MemoryUplink`] on first use unless [`install`] ran first.
pub fn universe() -> BridgeResult<&'static Universe> {
    UNIVERSE.get_or_try_init(|| Universe::new(Arc::new(MemoryUplink::new())))
}

/// Chooses the wrapped library before the first boundary call.
///
/// Fails if the process-wide instance already exists.
pub fn install(library: Arc<dyn Uplink>) -> BridgeResult<&'static Universe> {
    let mut installed = false;
    let universe = UNIVERSE.get_or_try_init(|| {
        installed = true;
        Universe::new(library)
    })?;
    if !installed {
        return Err(BridgeError::Internal("universe already initialized".into()));
    }
    Ok(universe)
}

/// Registry of live resources plus everything needed to drive them.
pub struct Universe {
    pub(crate) registry: Registry<Resource>,
    pub(crate) root: Scope,
    pub(crate) library: Arc<dyn Uplink>,
    runtime: Runtime,
}

impl Universe {
    pub fn new(library: Arc<dyn Uplink>) -> BridgeResult<Self> {
        logging::init();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("uplink-bridge")
            .enable_all()
            .build()
            .map_err(|e| BridgeError::Internal(format!("failed to start runtime: {e}")))?;

        tracing::debug!("universe created");
        Ok(Self {
            registry: Registry::new(),
            root: Scope::root("universe"),
            library,
            runtime,
        })
    }

    /// Drives `fut` to completion on the bridge runtime.
    ///
    /// Boundary calls are synchronous, so calling in from a runtime thread
    /// is refused instead of panicking.
    pub(crate) fn block_on<F: Future>(&self, fut: F) -> BridgeResult<F::Output> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(BridgeError::Internal(
                "bridge called from inside an async runtime".into(),
            ));
        }
        Ok(self.runtime.block_on(fut))
    }

    /// Like [`block_on`](Self::block_on), but interrupted when `scope` is cancelled.
    pub(crate) fn run_in<F, T>(&self, scope: &Scope, fut: F) -> BridgeResult<T>
    where
        F: Future<Output = BridgeResult<T>>,
    {
        self.block_on(scope.run(fut))?
    }

    pub(crate) fn register<F: Facade>(&self, facade: Arc<F>) -> Handle {
        let handle = self.registry.add(facade.into_resource());
        tracing::trace!(%handle, kind = F::KIND, "registered");
        handle
    }

    pub(crate) fn lookup<F: Facade>(&self, handle: Handle) -> BridgeResult<Arc<F>> {
        self.registry
            .get(handle)
            .and_then(|resource| F::from_resource(&resource))
            .ok_or(BridgeError::InvalidHandle(F::KIND))
    }

    /// Removes the entry only when it holds an `F`.
    pub(crate) fn take<F: Facade>(&self, handle: Handle) -> Option<Arc<F>> {
        let resource = self
            .registry
            .remove_if(handle, |resource| F::from_resource(resource).is_some())?;
        tracing::trace!(%handle, kind = resource.kind(), "released");
        F::from_resource(&resource)
    }

    /// `true` when no handle is live.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn live_handles(&self) -> usize {
        self.registry.len()
    }
}

impl Drop for Universe {
    fn drop(&mut self) {
        self.root.cancel();
        tracing::debug!(leaked = self.registry.len(), "universe dropped");
    }
}

/// Test hook: reports whether every handle handed out has been released.
#[no_mangle]
pub extern "C" fn uplink_internal_universe_is_empty() -> bool {
    universe().map_or(true, Universe::is_empty)
}
