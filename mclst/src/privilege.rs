// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! Raises `CAP_NET_RAW` just long enough to open the listening socket,
//! then drops it permanently. See `server::privilege` for the speaker's
//! copy of the same guard; `mclst` needs the identical capability for
//! the identical reason, just around a socket it only reads from.

use capctl::caps::{Cap, CapState};

#[derive(thiserror::Error, Debug)]
pub enum PrivilegeError {
    #[error("failed to raise CAP_NET_RAW: {0}")]
    Raise(#[source] std::io::Error),
}

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
