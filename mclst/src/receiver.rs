// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! Joins a multicast group on the configured interface and dissects the
//! PIM-SM v2 traffic that arrives on it, using the same wire routines
//! the speaker uses to write that traffic.

use std::ffi::OsString;
use std::os::fd::OwnedFd;

use nix::sys::socket::{self, AddressFamily, SockFlag, SockProtocol, SockType};

use packet::pimsmv2::{self, HelloOptionValue};
use packet::{ipv4, Addr};

#[derive(thiserror::Error, Debug)]
pub enum ReceiverError {
    #[error("failed to open raw socket: {0}")]
    Open(#[source] nix::Error),
    #[error("failed to bind raw socket to interface {interface}: {source}")]
    BindToDevice { interface: String, source: nix::Error },
    #[error("failed to join multicast group {group}: {source}")]
    JoinGroup { group: Addr, source: nix::Error },
    #[error("failed to receive from socket: {0}")]
    Recv(#[source] nix::Error),
}

/// One decoded PIM message, flattened enough for `mclst`'s table to
/// print directly.
#[derive(Debug, Clone)]
pub enum Event {
    Hello {
        from: Addr,
        hold_time_secs: Option<u16>,
        dr_priority: Option<u32>,
        generation_id: Option<u32>,
    },
    Goodbye {
        from: Addr,
    },
    JoinPrune {
        from: Addr,
    },
    Other {
        from: Addr,
        msg_type: u8,
    },
    /// The datagram didn't parse as a well-formed PIM packet. Reported
    /// rather than silently dropped, since on a diagnostic tool a
    /// malformed-packet sighting is itself useful information.
    Malformed {
        from: Addr,
        reason: String,
    },
}

/// A raw IP socket joined to a multicast group, receiving every PIM
/// datagram that arrives on the bound interface.
pub struct Receiver {
    fd: OwnedFd,
}

impl Receiver {
    /// Must be called while [`server::privilege::NetRawGuard`]-equivalent
    /// capabilities are held; `mclst` raises `CAP_NET_RAW` around this
    /// call the same way the speaker does around opening its socket.
    pub fn open(group: Addr, interface: &str) -> Result<Receiver, ReceiverError> {
        let fd = socket::socket(AddressFamily::Inet, SockType::Raw, SockFlag::empty(), SockProtocol::Raw)
            .map_err(ReceiverError::Open)?;

        socket::setsockopt(&fd, socket::sockopt::BindToDevice, &OsString::from(interface)).map_err(|source| {
            ReceiverError::BindToDevice {
                interface: interface.to_owned(),
                source,
            }
        })?;

        let mreq = socket::IpMembershipRequest::new(std::net::Ipv4Addr::from(group), None);
        socket::setsockopt(&fd, socket::sockopt::IpAddMembership, &mreq)
            .map_err(|source| ReceiverError::JoinGroup { group, source })?;

        Ok(Receiver { fd })
    }

    /// Blocks for the next datagram and dissects it into an [`Event`].
    /// Non-PIM traffic for the joined group (if any slips through) is
    /// surfaced as [`Event::Other`] with `msg_type` reused to hold the
    /// underlying IP protocol number, shifted so it can't collide with
    /// a real PIM message type.
    pub fn recv_event(&self) -> Result<Event, ReceiverError> {
        let mut buf = [0u8; 2048];
        let n = socket::recv(&self.fd, &mut buf, socket::MsgFlags::empty()).map_err(ReceiverError::Recv)?;
        Ok(Self::dissect(&buf[..n]))
    }

    fn dissect(datagram: &[u8]) -> Event {
        if datagram.len() < ipv4::IPV4_HDR_SIZE {
            return Event::Malformed {
                from: Addr::new(0, 0, 0, 0),
                reason: "shorter than an IPv4 header".to_owned(),
            };
        }
        let ihl = usize::from(datagram[0] & 0x0f) * 4;
        let from = Addr::from_be_bytes(datagram[12..16].try_into().unwrap());
        if datagram.len() < ihl {
            return Event::Malformed {
                from,
                reason: "IP header claims more options than the datagram has bytes".to_owned(),
            };
        }
        if datagram[9] != ipv4::PROTO_PIM {
            return Event::Other {
                from,
                msg_type: 0x80 | datagram[9],
            };
        }

        let pim = &datagram[ihl..];
        let hdr = match pimsmv2::Header::parse(pim) {
            Ok(hdr) => hdr,
            Err(e) => {
                return Event::Malformed {
                    from,
                    reason: e.to_string(),
                }
            }
        };

        match hdr.msg_type {
            pimsmv2::HELLO => Self::dissect_hello(from, &pim[pimsmv2::PIM_HDR_SIZE..]),
            pimsmv2::JOIN_PRUNE => Event::JoinPrune { from },
            other => Event::Other { from, msg_type: other },
        }
    }

    fn dissect_hello(from: Addr, options: &[u8]) -> Event {
        let mut hold_time_secs = None;
        let mut dr_priority = None;
        let mut generation_id = None;

        for opt in pimsmv2::parse_hello_options(options) {
            match opt {
                Ok(opt) => match opt.value {
                    HelloOptionValue::HoldTime(v) => hold_time_secs = Some(v),
                    HelloOptionValue::DrPriority(v) => dr_priority = Some(v),
                    HelloOptionValue::GenerationId(v) => generation_id = Some(v),
                    HelloOptionValue::Other { .. } => {}
                },
                Err(e) => {
                    return Event::Malformed {
                        from,
                        reason: e.to_string(),
                    }
                }
            }
        }

        match hold_time_secs {
            Some(0) => Event::Goodbye { from },
            _ => Event::Hello {
                from,
                hold_time_secs,
                dr_priority,
                generation_id,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packet::writer::PacketWriter;

    fn build_hello_datagram(holdtime: u16) -> Vec<u8> {
        let payload_len = pimsmv2::PIM_HDR_SIZE + pimsmv2::HELLO_OPTION_HDR_SIZE + 2;
        let mut buf = vec![0u8; ipv4::IPV4_HDR_SIZE + payload_len];

        {
            let mut pw = PacketWriter::new(&mut buf);
            ipv4::write_header(&mut pw, Addr::new(10, 0, 0, 1), Addr::new(224, 0, 0, 13), payload_len as u16, 0);
        }
        {
            let mut pw = PacketWriter::new(&mut buf[ipv4::IPV4_HDR_SIZE..]);
            pimsmv2::write_header(&mut pw, pimsmv2::HELLO);
            pimsmv2::write_opt_u16(&mut pw, pimsmv2::OPT_HOLDTIME, holdtime);
        }

        buf
    }

    #[test]
    fn dissects_hello_with_holdtime() {
        let datagram = build_hello_datagram(105);
        match Receiver::dissect(&datagram) {
            Event::Hello { hold_time_secs, .. } => assert_eq!(hold_time_secs, Some(105)),
            other => panic!("expected Hello, got {other:?}"),
        }
    }

    #[test]
    fn holdtime_zero_is_a_goodbye() {
        let datagram = build_hello_datagram(0);
        match Receiver::dissect(&datagram) {
            Event::Goodbye { .. } => {}
            other => panic!("expected Goodbye, got {other:?}"),
        }
    }

    #[test]
    fn short_datagram_is_malformed_not_panicking() {
        match Receiver::dissect(&[1, 2, 3]) {
            Event::Malformed { .. } => {}
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn non_pim_protocol_is_reported_as_other() {
        let mut buf = vec![0u8; ipv4::IPV4_HDR_SIZE];
        let mut pw = PacketWriter::new(&mut buf);
        ipv4::write_header(&mut pw, Addr::new(10, 0, 0, 1), Addr::new(224, 0, 0, 13), 0, 0);
        buf[9] = 17; // UDP
        match Receiver::dissect(&buf) {
            Event::Other { msg_type, .. } => assert_eq!(msg_type, 0x80 | 17),
            other => panic!("expected Other, got {other:?}"),
        }
    }
}
