// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! A minimal IPv4 header writer, used when sending PIM packets over a raw
//! socket (IP_HDRINCL) so the source address can be pinned to the
//! configured PIM interface address rather than whatever the kernel would
//! pick by default.

use crate::addr::Addr;
use crate::writer::{ip_checksum, PacketWriter};

pub const IPV4_HDR_SIZE: usize = 20;
pub const PROTO_PIM: u8 = 103;
pub const DEFAULT_TTL: u8 = 1;

/// Writes a 20-byte IPv4 header with no options, DF set, TTL 1 (PIM
/// control traffic never leaves the local link), protocol 103 (PIM), and
/// a correct header checksum.
///
/// `payload_len` is the length of the PIM payload that follows this
/// header; `ident` is the IPv4 identification field, which the caller
/// should vary packet to packet the way a kernel-assigned one would.
pub fn write_header(pw: &mut PacketWriter, src: Addr, dst: Addr, payload_len: u16, ident: u16) {
    let mark = pw.mark();
    let total_len = IPV4_HDR_SIZE as u16 + payload_len;

    {
        let hdr = pw.next_array::<IPV4_HDR_SIZE>();
        hdr[0] = (4 << 4) | 5; // version 4, IHL 5 (no options)
        hdr[1] = 0; // DSCP/ECN
        hdr[2..4].copy_from_slice(&total_len.to_be_bytes());
        hdr[4..6].copy_from_slice(&ident.to_be_bytes());
        hdr[6..8].copy_from_slice(&(0x4000u16).to_be_bytes()); // DF, no fragment offset
        hdr[8] = DEFAULT_TTL;
        hdr[9] = PROTO_PIM;
        hdr[10..12].copy_from_slice(&0u16.to_be_bytes()); // checksum, filled below
        hdr[12..16].copy_from_slice(&src.to_be_bytes());
        hdr[16..20].copy_from_slice(&dst.to_be_bytes());
    }

    let cksum = ip_checksum(pw.since(mark));
    pw.write_checksum_at(mark, 10, cksum);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_checksums_to_zero() {
        let mut buf = [0u8; IPV4_HDR_SIZE];
        let mut pw = PacketWriter::new(&mut buf);
        write_header(&mut pw, Addr::new(10, 0, 0, 1), Addr::new(224, 0, 0, 13), 34, 0x1234);
        assert_eq!(ip_checksum(&buf), 0);
    }

    #[test]
    fn fields_land_at_documented_offsets() {
        let mut buf = [0u8; IPV4_HDR_SIZE];
        let mut pw = PacketWriter::new(&mut buf);
        write_header(&mut pw, Addr::new(10, 0, 0, 1), Addr::new(224, 0, 0, 13), 34, 0);
        assert_eq!(buf[9], PROTO_PIM);
        assert_eq!(buf[8], DEFAULT_TTL);
        assert_eq!(&buf[12..16], &[10, 0, 0, 1]);
        assert_eq!(&buf[16..20], &[224, 0, 0, 13]);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), IPV4_HDR_SIZE as u16 + 34);
    }
}
