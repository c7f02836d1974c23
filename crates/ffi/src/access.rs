//! Access grants.

use crate::marshal::{read_str, take_error};
use crate::types::{UplinkAccess, UplinkAccessResult, UplinkStringResult};
use crate::universe::{universe, Universe};
use bridge_core::{BridgeResult, Handle};
use bridge_provider::Access;
use std::ffi::c_char;
use std::mem;
use std::sync::Arc;

pub(crate) struct AccessFacade {
    pub(crate) access: Access,
}

impl Universe {
    pub fn parse_access(&self, serialized: &str) -> BridgeResult<Handle> {
        let access = self.library.parse_access(serialized)?;
        tracing::debug!(satellite = %access.satellite_address, "access parsed");
        Ok(self.register(Arc::new(AccessFacade { access })))
    }

    pub fn serialize_access(&self, access: Handle) -> BridgeResult<String> {
        let facade = self.lookup::<AccessFacade>(access)?;
        self.library.serialize_access(&facade.access)
    }

    pub fn access_satellite_address(&self, access: Handle) -> BridgeResult<String> {
        Ok(self.lookup::<AccessFacade>(access)?.access.satellite_address.clone())
    }

    pub fn free_access(&self, access: Handle) {
        self.take::<AccessFacade>(access);
    }
}

/// Parses a serialized access grant.
///
/// # Safety
/// `serialized` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn uplink_parse_access(serialized: *const c_char) -> UplinkAccessResult {
    UplinkAccessResult::from_result(parse_access(serialized))
}

unsafe fn parse_access(serialized: *const c_char) -> BridgeResult<Handle> {
    let serialized = read_str(serialized, "serialized")?;
    universe()?.parse_access(serialized)
}

#[no_mangle]
pub extern "C" fn uplink_access_serialize(access: UplinkAccess) -> UplinkStringResult {
    UplinkStringResult::from_result(access
        .require()
        .and_then(|access| universe()?.serialize_access(access)))
}

#[no_mangle]
pub extern "C" fn uplink_access_satellite_address(access: UplinkAccess) -> UplinkStringResult {
    UplinkStringResult::from_result(
        access
            .require()
            .and_then(|access| universe()?.access_satellite_address(access)),
    )
}

/// Releases the access handle and error held by `result`, then clears it.
///
/// # Safety
/// `result` must be null or point to a result returned by this library.
#[no_mangle]
pub unsafe extern "C" fn uplink_free_access_result(result: *mut UplinkAccessResult) {
    let Some(result) = result.as_mut() else {
        return;
    };
    take_error(&mut result.error);
    let access = mem::take(&mut result.access);
    if let Ok(universe) = universe() {
        universe.free_access(access.handle());
    }
}
