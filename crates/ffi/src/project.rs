//! Projects: the root of every dependent resource.

use crate::access::AccessFacade;
use crate::marshal::{error_or_null, read_optional_str, take_error};
use crate::resource::Facade;
use crate::types::{UplinkAccess, UplinkConfig, UplinkError, UplinkProject, UplinkProjectResult};
use crate::universe::{universe, Universe};
use bridge_core::{BridgeError, BridgeResult, Handle, Scope};
use bridge_provider::{Config, Project};
use std::ffi::c_int;
use std::mem;
use std::ptr;
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct ProjectFacade {
    pub(crate) scope: Scope,
    pub(crate) project: Box<dyn Project>,
}

impl Universe {
    pub fn open_project(&self, access: Handle, config: &Config) -> BridgeResult<Handle> {
        let access = self.lookup::<AccessFacade>(access)?;
        let scope = self.root.child("project");

        let opened = self.run_in(
            &scope,
            self.library.open_project(&scope, &access.access, config),
        );
        match opened {
            Ok(project) => {
                tracing::debug!(satellite = %access.access.satellite_address, "project opened");
                Ok(self.register(Arc::new(ProjectFacade { scope, project })))
            }
            Err(err) => {
                scope.cancel();
                Err(err)
            }
        }
    }

    /// Cancels everything running under the project, then closes it.
    pub fn close_project(&self, project: Handle) -> BridgeResult<()> {
        let facade = self
            .take::<ProjectFacade>(project)
            .ok_or(BridgeError::InvalidHandle(ProjectFacade::KIND))?;
        facade.scope.cancel();
        self.block_on(facade.project.close())??;
        tracing::debug!(%project, "project closed");
        Ok(())
    }

    pub fn revoke_access(&self, project: Handle, access: Handle) -> BridgeResult<()> {
        let facade = self.lookup::<ProjectFacade>(project)?;
        let access = self.lookup::<AccessFacade>(access)?;
        let scope = Scope::root("revoke");
        self.run_in(&scope, facade.project.revoke_access(&scope, &access.access))
    }

    pub fn free_project(&self, project: Handle) {
        if project.is_null() {
            return;
        }
        match self.close_project(project) {
            Ok(()) | Err(BridgeError::InvalidHandle(_)) => {}
            Err(err) => tracing::warn!(%project, error = %err, "close during free failed"),
        }
    }
}

/// Opens a project. A null `maximum_concurrent` keeps the library default.
///
/// # Safety
/// `maximum_concurrent` must be null or point to a readable `int`.
#[no_mangle]
pub unsafe extern "C" fn uplink_open_project(
    access: UplinkAccess,
    maximum_concurrent: *const c_int,
) -> UplinkProjectResult {
    UplinkProjectResult::from_result(open_project(access, maximum_concurrent))
}

unsafe fn open_project(access: UplinkAccess, maximum_concurrent: *const c_int) -> BridgeResult<Handle> {
    let access = access.require()?;
    let maximum_concurrent = match maximum_concurrent.as_ref() {
        None => None,
        Some(&n) if n > 0 => Some(n as usize),
        Some(&n) => {
            return Err(BridgeError::InvalidArgument(format!(
                "maximum_concurrent must be positive, got {n}"
            )))
        }
    };
    let config = Config {
        maximum_concurrent,
        ..Config::default()
    };
    universe()?.open_project(access, &config)
}

/// Opens a project with an explicit configuration.
///
/// # Safety
/// `config.user_agent` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn uplink_config_open_project(
    config: UplinkConfig,
    access: UplinkAccess,
) -> UplinkProjectResult {
    UplinkProjectResult::from_result(config_open_project(config, access))
}

unsafe fn config_open_project(config: UplinkConfig, access: UplinkAccess) -> BridgeResult<Handle> {
    let access = access.require()?;
    let user_agent = read_optional_str(config.user_agent, "config.user_agent")?;
    let config = Config {
        user_agent: user_agent.to_string(),
        dial_timeout: match config.dial_timeout_milliseconds {
            0 => None,
            ms if ms > 0 => Some(Duration::from_millis(ms as u64)),
            ms => {
                return Err(BridgeError::InvalidArgument(format!(
                    "dial_timeout_milliseconds must not be negative, got {ms}"
                )))
            }
        },
        maximum_concurrent: match config.maximum_concurrent {
            0 => None,
            n if n > 0 => Some(n as usize),
            n => {
                return Err(BridgeError::InvalidArgument(format!(
                    "maximum_concurrent must not be negative, got {n}"
                )))
            }
        },
    };
    universe()?.open_project(access, &config)
}

#[no_mangle]
pub extern "C" fn uplink_close_project(project: UplinkProject) -> *mut UplinkError {
    if project.handle().is_null() {
        return ptr::null_mut();
    }
    error_or_null(universe().and_then(|u| u.close_project(project.handle())))
}

#[no_mangle]
pub extern "C" fn uplink_revoke_access(
    project: UplinkProject,
    access: UplinkAccess,
) -> *mut UplinkError {
    let revoked = project.require().and_then(|project| {
        let access = access.require()?;
        universe()?.revoke_access(project, access)
    });
    error_or_null(revoked)
}

/// Closes the project held by `result` if it is still open, then clears it.
///
/// # Safety
/// `result` must be null or point to a result returned by this library.
#[no_mangle]
pub unsafe extern "C" fn uplink_free_project_result(result: *mut UplinkProjectResult) {
    let Some(result) = result.as_mut() else {
        return;
    };
    take_error(&mut result.error);
    let project = mem::take(&mut result.project);
    if let Ok(universe) = universe() {
        universe.free_project(project.handle());
    }
}
