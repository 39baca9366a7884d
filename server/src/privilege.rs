// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! Raises `CAP_NET_RAW` just long enough to open the raw socket, then
//! drops it permanently. A PIM speaker needs the capability once, at
//! startup; holding it for the process lifetime widens the blast radius
//! of anything else that goes wrong.

use capctl::caps::{Cap, CapState};

#[derive(thiserror::Error, Debug)]
pub enum PrivilegeError {
    #[error("failed to raise CAP_NET_RAW: {0}")]
    Raise(#[source] std::io::Error),
    #[error("failed to drop capabilities: {0}")]
    Drop(#[source] std::io::Error),
}

/// Holds `CAP_NET_RAW` in the effective set for as long as it's alive.
/// Dropping it clears the effective set back down to empty, so a raw
/// socket opened inside the guard's scope keeps working (a socket's fd
/// doesn't need the capability to stay open, only to be created) while
/// nothing else in the process can open one afterwards.
pub struct NetRawGuard {
    _private: (),
}

impl NetRawGuard {
    pub fn raise() -> Result<NetRawGuard, PrivilegeError> {
        let mut caps = CapState::get_current().map_err(PrivilegeError::Raise)?;
        caps.effective.add(Cap::NET_RAW);
        caps.set_current().map_err(PrivilegeError::Raise)?;
        Ok(NetRawGuard { _private: () })
    }
}

impl Drop for NetRawGuard {
    fn drop(&mut self) {
        if let Ok(mut caps) = CapState::get_current() {
            caps.effective.drop(Cap::NET_RAW);
            caps.permitted.drop(Cap::NET_RAW);
            let _ = caps.set_current();
        }
    }
}
