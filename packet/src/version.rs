// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! The protocol-parameter trait.
//!
//! The original implementation templates its packer over an `IPVersion`
//! traits class (`IPv4`/`IPv6` specializations carrying the family's
//! record sizes and capacity numbers). Rust has no non-type template
//! parameter shaped quite like that, so the equivalent here is a sealed
//! trait with associated consts, monomorphized the same way a generic
//! function over `V: PimVersion` would be. [`Ipv4`] is presently the only
//! implementor; IPv6 is out of scope.

use crate::addr::Addr;
use crate::pimsmv2::{ENC_G_ADDR_SIZE, ENC_SRC_ADDR_SIZE, HELLO_OPTION_HDR_SIZE, PIM_HDR_SIZE};

mod sealed {
    pub trait Sealed {}
}

/// Per-address-family wire parameters used by the Join/Prune packer.
pub trait PimVersion: sealed::Sealed + Copy + Clone + 'static {
    type Address: Copy + Clone + Eq + Ord + std::fmt::Display + std::fmt::Debug;

    /// Max bytes of Join/Prune payload (groups + entries) per packet,
    /// chosen so the resulting IP datagram stays under a conservative
    /// path MTU without fragmenting.
    const JP_CAPACITY: usize;

    /// Bytes of a Multicast-Group-Address record plus its Joined/Pruned
    /// source-count header.
    const GRP_HDR_SIZE: usize;

    /// Bytes of a single Encoded-Source-Address record.
    const SRC_A_SIZE: usize;

    /// Smallest a group entry can be: header plus one joined or pruned
    /// source.
    const MIN_ENTRY_SIZE: usize = Self::GRP_HDR_SIZE + Self::SRC_A_SIZE;

    /// Largest number of prune sources the inverse packer will place
    /// under one RP-rooted entry before it must start a new packet.
    const MAX_PRUNE_SGRPT_LEN: usize;

    const PIM_HDR_SIZE: usize;
    const PIM_JP_HDR_SIZE: usize;
    const HELLO_OPTION_HDR_SIZE: usize;

    /// 224.0.0.13, the PIM-Routers multicast group Hello and Join/Prune
    /// packets are sent to.
    const ALL_PIM_ROUTERS: Self::Address;
}

/// The only address family this speaker implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4;

impl sealed::Sealed for Ipv4 {}

impl PimVersion for Ipv4 {
    type Address = Addr;

    const JP_CAPACITY: usize = 1466;
    const GRP_HDR_SIZE: usize = ENC_G_ADDR_SIZE + 4; // + Joined/Pruned counts
    const SRC_A_SIZE: usize = ENC_SRC_ADDR_SIZE;
    const MAX_PRUNE_SGRPT_LEN: usize = 180;
    const PIM_HDR_SIZE: usize = PIM_HDR_SIZE;
    const PIM_JP_HDR_SIZE: usize = 10; // upstream neighbor addr (6) + reserved/num-groups/holdtime (4)
    const HELLO_OPTION_HDR_SIZE: usize = HELLO_OPTION_HDR_SIZE;
    const ALL_PIM_ROUTERS: Addr = Addr::new(224, 0, 0, 13);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_entry_size_is_header_plus_one_source() {
        assert_eq!(Ipv4::MIN_ENTRY_SIZE, Ipv4::GRP_HDR_SIZE + Ipv4::SRC_A_SIZE);
    }

    #[test]
    fn all_pim_routers_is_224_0_0_13() {
        assert_eq!(Ipv4::ALL_PIM_ROUTERS.to_string(), "224.0.0.13");
    }
}
