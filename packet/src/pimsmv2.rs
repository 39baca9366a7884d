// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! PIM Sparse-Mode v2 wire primitives: encoded address records, the
//! message header, and Hello options.
//!
//! Layouts and field names follow
//! <https://datatracker.ietf.org/doc/html/rfc7761#section-4.9>.

use static_assertions::const_assert_eq;

use crate::addr::Addr;
use crate::writer::PacketWriter;

pub const IPV4_FAMILY_NUMBER: u8 = 1;
pub const IPV6_FAMILY_NUMBER: u8 = 2;
pub const NATIVE_ENCODING: u8 = 0;

/// PIM-SM v2 message types (RFC 7761 §4.9). This speaker only emits
/// [`HELLO`] and [`JOIN_PRUNE`]; the rest are named for `mclst`'s
/// dissector and for documentation.
pub const HELLO: u8 = 0;
pub const REGISTER: u8 = 1;
pub const REGISTER_STOP: u8 = 2;
pub const JOIN_PRUNE: u8 = 3;
pub const BOOTSTRAP: u8 = 4;
pub const ASSERT: u8 = 5;
pub const GRAFT: u8 = 6;
pub const GRAFT_ACK: u8 = 7;
pub const CANDIDATE_RP_ADVERTISEMENT: u8 = 8;

/// Hello option type codes (RFC 7761 §4.9.2).
pub const OPT_HOLDTIME: u16 = 1;
pub const OPT_LAN_PRUNE_DELAY: u16 = 2;
pub const OPT_DR_PRIORITY: u16 = 19;
pub const OPT_GENERATION_ID: u16 = 20;
pub const OPT_ADDRESS_LIST: u16 = 24;

pub const PIM_HDR_SIZE: usize = 4;
pub const ENC_U_ADDR_SIZE: usize = 6;
pub const ENC_G_ADDR_SIZE: usize = 8;
pub const ENC_SRC_ADDR_SIZE: usize = 8;
pub const HELLO_OPTION_HDR_SIZE: usize = 4;

const_assert_eq!(ENC_U_ADDR_SIZE, 2 + 4);
const_assert_eq!(ENC_G_ADDR_SIZE, 4 + 4);
const_assert_eq!(ENC_SRC_ADDR_SIZE, 4 + 4);

/// Writes the 4-byte PIM header (version=2, the given message type,
/// reserved=0, checksum=0). The checksum is filled in later by the
/// caller once the whole payload has been written, via
/// [`crate::writer::ip_checksum`] and
/// [`PacketWriter::write_checksum_at`].
pub fn write_header(pw: &mut PacketWriter, msg_type: u8) {
    let hdr = pw.next_array::<PIM_HDR_SIZE>();
    hdr[0] = (2u8 << 4) | (msg_type & 0x0f);
    hdr[1] = 0; // Reserved
    hdr[2] = 0; // Checksum, filled in later
    hdr[3] = 0;
}

/// Writes a 6-byte Encoded-Unicast-Address record.
pub fn write_enc_uaddr(pw: &mut PacketWriter, addr: Addr) {
    let rec = pw.next_array::<ENC_U_ADDR_SIZE>();
    rec[0] = IPV4_FAMILY_NUMBER;
    rec[1] = NATIVE_ENCODING;
    rec[2..6].copy_from_slice(&addr.to_be_bytes());
}

/// Writes an 8-byte Encoded-Group-Address record with mask length 32 and
/// no flags (this speaker never emits Bidir/Admin-Scope group records).
pub fn write_enc_gaddr(pw: &mut PacketWriter, group: Addr) {
    let rec = pw.next_array::<ENC_G_ADDR_SIZE>();
    rec[0] = IPV4_FAMILY_NUMBER;
    rec[1] = NATIVE_ENCODING;
    rec[2] = 0; // B, Reserved, Z
    rec[3] = 32; // MaskLen
    rec[4..8].copy_from_slice(&group.to_be_bytes());
}

/// Writes an 8-byte Encoded-Source-Address record. `S` is always set per
/// this system's usage; `wildcard` sets `W` (the RP record) and `rpt` sets
/// `R` (RPT-associated: the RP itself, or a Prune(S,G,rpt) source).
pub fn write_enc_src_addr(pw: &mut PacketWriter, addr: Addr, wildcard: bool, rpt: bool) {
    let rec = pw.next_array::<ENC_SRC_ADDR_SIZE>();
    rec[0] = IPV4_FAMILY_NUMBER;
    rec[1] = NATIVE_ENCODING;
    // R is bit 0, W is bit 1, S is bit 2 (RFC 7761 §4.9.1); S is always set.
    let r = u8::from(rpt);
    let w = u8::from(wildcard) << 1;
    let s = 1u8 << 2;
    rec[2] = r | w | s;
    rec[3] = 32; // MaskLen
    rec[4..8].copy_from_slice(&addr.to_be_bytes());
}

/// Writes a Hello option with a 2-byte value (Hold-Time).
pub fn write_opt_u16(pw: &mut PacketWriter, opt_type: u16, value: u16) {
    let hdr = pw.next_array::<HELLO_OPTION_HDR_SIZE>();
    hdr[0..2].copy_from_slice(&opt_type.to_be_bytes());
    hdr[2..4].copy_from_slice(&2u16.to_be_bytes());
    pw.next_array::<2>().copy_from_slice(&value.to_be_bytes());
}

/// Writes a Hello option with a 4-byte value (DR Priority, Generation ID).
pub fn write_opt_u32(pw: &mut PacketWriter, opt_type: u16, value: u32) {
    let hdr = pw.next_array::<HELLO_OPTION_HDR_SIZE>();
    hdr[0..2].copy_from_slice(&opt_type.to_be_bytes());
    hdr[2..4].copy_from_slice(&4u16.to_be_bytes());
    pw.next_array::<4>().copy_from_slice(&value.to_be_bytes());
}

/// A decoded PIM header, for `mclst`'s dissector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub msg_type: u8,
    pub checksum: u16,
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("packet too short: need at least {need} bytes, got {got}")]
    TooShort { need: usize, got: usize },
}

impl Header {
    pub fn parse(data: &[u8]) -> Result<Header, ParseError> {
        if data.len() < PIM_HDR_SIZE {
            return Err(ParseError::TooShort {
                need: PIM_HDR_SIZE,
                got: data.len(),
            });
        }
        Ok(Header {
            version: data[0] >> 4,
            msg_type: data[0] & 0x0f,
            checksum: u16::from_be_bytes([data[2], data[3]]),
        })
    }
}

/// A decoded Hello option, for `mclst`'s dissector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelloOption {
    pub opt_type: u16,
    pub value: HelloOptionValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloOptionValue {
    HoldTime(u16),
    DrPriority(u32),
    GenerationId(u32),
    Other { opt_type: u16, len: u16 },
}

/// Iterates the Hello options following the PIM header in `data`.
pub fn parse_hello_options(mut data: &[u8]) -> impl Iterator<Item = Result<HelloOption, ParseError>> + '_ {
    std::iter::from_fn(move || {
        if data.is_empty() {
            return None;
        }
        if data.len() < HELLO_OPTION_HDR_SIZE {
            let err = ParseError::TooShort {
                need: HELLO_OPTION_HDR_SIZE,
                got: data.len(),
            };
            data = &[];
            return Some(Err(err));
        }
        let opt_type = u16::from_be_bytes([data[0], data[1]]);
        let len = u16::from_be_bytes([data[2], data[3]]) as usize;
        if data.len() < HELLO_OPTION_HDR_SIZE + len {
            let err = ParseError::TooShort {
                need: HELLO_OPTION_HDR_SIZE + len,
                got: data.len(),
            };
            data = &[];
            return Some(Err(err));
        }
        let value_bytes = &data[HELLO_OPTION_HDR_SIZE..HELLO_OPTION_HDR_SIZE + len];
        let value = match (opt_type, len) {
            (OPT_HOLDTIME, 2) => HelloOptionValue::HoldTime(u16::from_be_bytes(
                value_bytes.try_into().unwrap(),
            )),
            (OPT_DR_PRIORITY, 4) => HelloOptionValue::DrPriority(u32::from_be_bytes(
                value_bytes.try_into().unwrap(),
            )),
            (OPT_GENERATION_ID, 4) => HelloOptionValue::GenerationId(u32::from_be_bytes(
                value_bytes.try_into().unwrap(),
            )),
            _ => HelloOptionValue::Other {
                opt_type,
                len: len as u16,
            },
        };
        data = &data[HELLO_OPTION_HDR_SIZE + len..];
        Some(Ok(HelloOption { opt_type, value }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enc_src_addr_flags() {
        let mut buf = [0u8; ENC_SRC_ADDR_SIZE];
        let mut pw = PacketWriter::new(&mut buf);
        write_enc_src_addr(&mut pw, Addr::new(10, 0, 0, 1), true, true);
        assert_eq!(buf[2], 0b0000_0111); // R=1 W=1 S=1
        write_enc_src_addr(&mut PacketWriter::new(&mut buf), Addr::new(10, 0, 0, 1), false, false);
        assert_eq!(buf[2], 0b0000_0100); // S=1 only
    }

    #[test]
    fn header_roundtrip() {
        let mut buf = [0u8; PIM_HDR_SIZE];
        write_header(&mut PacketWriter::new(&mut buf), JOIN_PRUNE);
        let hdr = Header::parse(&buf).unwrap();
        assert_eq!(hdr.version, 2);
        assert_eq!(hdr.msg_type, JOIN_PRUNE);
    }

    #[test]
    fn hello_options_parse_in_order() {
        let mut buf = [0u8; HELLO_OPTION_HDR_SIZE * 2 + 2 + 4];
        let mut pw = PacketWriter::new(&mut buf);
        write_opt_u16(&mut pw, OPT_HOLDTIME, 105);
        write_opt_u32(&mut pw, OPT_GENERATION_ID, 0xdead_beef);
        let opts: Vec<_> = parse_hello_options(&buf).collect::<Result<_, _>>().unwrap();
        assert_eq!(opts.len(), 2);
        assert_eq!(opts[0].value, HelloOptionValue::HoldTime(105));
        assert_eq!(opts[1].value, HelloOptionValue::GenerationId(0xdead_beef));
    }
}
