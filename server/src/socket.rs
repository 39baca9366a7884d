// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! The raw socket this speaker sends PIM datagrams through.
//!
//! `IP_HDRINCL` is set because the packets this speaker assembles
//! already carry their own IPv4 header (see `pimsm::assemble`), with TTL
//! pinned to 1 and the source address pinned to the configured PIM
//! interface address rather than whatever the kernel would pick.

use std::ffi::OsString;
use std::io;
use std::net::Ipv4Addr;
use std::os::fd::OwnedFd;

use nix::sys::socket::{self, AddressFamily, SockFlag, SockProtocol, SockType};

#[derive(thiserror::Error, Debug)]
pub enum SocketError {
    #[error("failed to open raw socket: {0}")]
    Open(#[source] nix::Error),
    #[error("failed to bind raw socket to interface {interface}: {source}")]
    BindToDevice { interface: String, source: nix::Error },
    #[error("failed to set IP_HDRINCL: {0}")]
    HdrIncl(#[source] nix::Error),
}

/// A destination for fully-assembled PIM datagrams. [`Speaker`](crate::speaker::Speaker)
/// is generic over this so tests can substitute an in-memory recording
/// sink instead of a real raw socket.
pub trait DatagramSink {
    fn send(&self, bytes: &[u8], dst: Ipv4Addr) -> io::Result<usize>;
}

/// A raw IP socket, already bound to the configured interface and
/// carrying `IP_HDRINCL`, ready to send fully-assembled datagrams.
pub struct RawSocket {
    fd: OwnedFd,
}

impl RawSocket {
    /// Must be called while [`crate::privilege::NetRawGuard`] is held.
    pub fn open(interface: &str) -> Result<RawSocket, SocketError> {
        let fd = socket::socket(AddressFamily::Inet, SockType::Raw, SockFlag::empty(), SockProtocol::Raw)
            .map_err(SocketError::Open)?;

        socket::setsockopt(&fd, socket::sockopt::BindToDevice, &OsString::from(interface)).map_err(|source| {
            SocketError::BindToDevice {
                interface: interface.to_owned(),
                source,
            }
        })?;

        socket::setsockopt(&fd, socket::sockopt::IpHdrIncl, &true).map_err(SocketError::HdrIncl)?;

        Ok(RawSocket { fd })
    }
}

impl DatagramSink for RawSocket {
    fn send(&self, bytes: &[u8], dst: Ipv4Addr) -> io::Result<usize> {
        let sockaddr = socket::SockaddrIn::from(std::net::SocketAddrV4::new(dst, 0));
        socket::sendto(&self.fd, bytes, &sockaddr, socket::MsgFlags::empty()).map_err(io::Error::from)
    }
}

#[cfg(test)]
pub mod test_support {
    use std::cell::RefCell;
    use std::net::Ipv4Addr;

    use super::DatagramSink;

    /// An in-memory [`DatagramSink`] that records every datagram it was
    /// asked to send, for tests that need to inspect the speaker's
    /// output without a real socket.
    #[derive(Default)]
    pub struct RecordingSink {
        pub sent: RefCell<Vec<(Vec<u8>, Ipv4Addr)>>,
    }

    impl DatagramSink for RecordingSink {
        fn send(&self, bytes: &[u8], dst: Ipv4Addr) -> std::io::Result<usize> {
            self.sent.borrow_mut().push((bytes.to_vec(), dst));
            Ok(bytes.len())
        }
    }
}
