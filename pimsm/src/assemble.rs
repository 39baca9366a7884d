// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! Assembles [`Update`]s and Hellos into complete IPv4 packets: an IPv4
//! header (`IP_HDRINCL` style, since TTL is pinned to 1 and the source
//! address must match the configured PIM interface address) followed by
//! the PIM payload and its checksum.

use packet::{ipv4, pimsmv2, Addr, Ipv4, PacketWriter, PimVersion};

use crate::genid::GenerationId;
use crate::update::Update;

/// A fully assembled IPv4+PIM datagram ready to hand to a raw socket.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub bytes: Vec<u8>,
    pub description: String,
}

fn jp_payload_size(update: &Update<Ipv4>) -> usize {
    Ipv4::PIM_JP_HDR_SIZE
        + update
            .groups
            .iter()
            .map(|ge| Ipv4::GRP_HDR_SIZE + (ge.joins.len() + ge.prunes.len()) * Ipv4::SRC_A_SIZE)
            .sum::<usize>()
}

/// Assembles Join/Prune update #`n` (1-based, used only in the
/// human-readable description) addressed to `neighbor`, sent from
/// `source`, advertising `holdtime` seconds before this speaker's state
/// expires if no further update arrives.
///
/// # Panics
/// Panics if the assembled packet's actual size doesn't match the
/// pre-computed size; this would mean the size accounting above and the
/// writers below have drifted apart, a packer bug rather than a runtime
/// condition.
pub fn assemble_join_prune(n: usize, update: &Update<Ipv4>, source: Addr, neighbor: Addr, holdtime: u16) -> Datagram {
    let pim_sz = Ipv4::PIM_HDR_SIZE + jp_payload_size(update);
    let sz = ipv4::IPV4_HDR_SIZE + pim_sz;

    let mut bytes = vec![0u8; sz];
    let mut pw = PacketWriter::new(&mut bytes);

    ipv4::write_header(&mut pw, source, Ipv4::ALL_PIM_ROUTERS, pim_sz as u16, 0);

    let pim_mark = pw.mark();
    pimsmv2::write_header(&mut pw, pimsmv2::JOIN_PRUNE);
    write_jp_header(&mut pw, neighbor, update.groups.len() as u8, holdtime);
    for ge in &update.groups {
        write_group_entry(&mut pw, ge);
    }

    assert_eq!(pw.size(), sz, "Join/Prune packet size accounting drifted");

    let cksum = packet::ip_checksum(pw.since(pim_mark));
    pw.write_checksum_at(pim_mark, 2, cksum);

    let description = format!(
        "IPv4 Join/Prune update #{n} with {} group{}, neighbor {neighbor}, holdtime {holdtime}s\n{update}",
        update.groups.len(),
        if update.groups.len() == 1 { "" } else { "s" }
    );

    Datagram { bytes, description }
}

fn write_jp_header(pw: &mut PacketWriter, neighbor: Addr, num_groups: u8, holdtime: u16) {
    pimsmv2::write_enc_uaddr(pw, neighbor);
    let rest = pw.next_array::<4>();
    rest[0] = 0; // Reserved
    rest[1] = num_groups;
    rest[2..4].copy_from_slice(&holdtime.to_be_bytes());
}

fn write_group_entry(pw: &mut PacketWriter, ge: &crate::update::GroupEntry<Ipv4>) {
    pimsmv2::write_enc_gaddr(pw, ge.group);
    let counts = pw.next_array::<4>();
    counts[0..2].copy_from_slice(&(ge.joins.len() as u16).to_be_bytes());
    counts[2..4].copy_from_slice(&(ge.prunes.len() as u16).to_be_bytes());
    for s in &ge.joins {
        pimsmv2::write_enc_src_addr(pw, s.addr, s.wildcard, s.rpt);
    }
    for s in &ge.prunes {
        pimsmv2::write_enc_src_addr(pw, s.addr, s.wildcard, s.rpt);
    }
}

/// Assembles a Hello packet. `holdtime` of 0 sends a Goodbye (RFC 7761
/// §4.3.1): neighbors receiving it immediately expire this speaker
/// rather than waiting out their normal Hold Timer.
pub fn assemble_hello(source: Addr, holdtime: u16, dr_priority: u32, generation_id: GenerationId) -> Datagram {
    let pim_sz = Ipv4::PIM_HDR_SIZE
        + 3 * Ipv4::HELLO_OPTION_HDR_SIZE
        + 2 // Hold-Time value
        + 4 // DR Priority value
        + 4; // Generation ID value
    let sz = ipv4::IPV4_HDR_SIZE + pim_sz;

    let mut bytes = vec![0u8; sz];
    let mut pw = PacketWriter::new(&mut bytes);

    ipv4::write_header(&mut pw, source, Ipv4::ALL_PIM_ROUTERS, pim_sz as u16, 0);

    let pim_mark = pw.mark();
    pimsmv2::write_header(&mut pw, pimsmv2::HELLO);
    pimsmv2::write_opt_u16(&mut pw, pimsmv2::OPT_HOLDTIME, holdtime);
    pimsmv2::write_opt_u32(&mut pw, pimsmv2::OPT_DR_PRIORITY, dr_priority);
    pimsmv2::write_opt_u32(&mut pw, pimsmv2::OPT_GENERATION_ID, generation_id.get());

    assert_eq!(pw.size(), sz, "Hello packet size accounting drifted");

    let cksum = packet::ip_checksum(pw.since(pim_mark));
    pw.write_checksum_at(pim_mark, 2, cksum);

    let description = if holdtime > 0 {
        format!("IPv4 Hello [holdtime {holdtime}s, DR priority {dr_priority}, generation ID {:08x}]", generation_id.get())
    } else {
        format!("IPv4 Goodbye [DR priority {dr_priority}, generation ID {:08x}]", generation_id.get())
    };

    Datagram { bytes, description }
}

#[cfg(test)]
mod tests {
    use packet::Ipv4;

    use super::*;
    use crate::model::{GroupConfig, JpConfig, Rpt};
    use crate::pack::pack;

    fn a(d: u8) -> Addr {
        Addr::new(10, 0, 0, d)
    }

    fn g(d: u8) -> Addr {
        Addr::new(239, 0, 0, d)
    }

    #[test]
    fn join_prune_datagram_checksums_clean() {
        let cfg = JpConfig::new(vec![GroupConfig::new(
            g(1),
            Some(Rpt { rp: a(1), prunes: vec![a(2)] }),
            vec![a(3)],
        )
        .unwrap()])
        .unwrap();
        let updates = pack::<Ipv4>(&cfg);
        let dgram = assemble_join_prune(1, &updates[0], a(9), a(10), 105);

        assert_eq!(packet::ip_checksum(&dgram.bytes), 0);
        assert_eq!(dgram.bytes[9], packet::ipv4::PROTO_PIM);
        assert!(dgram.description.contains("Join/Prune"));
    }

    #[test]
    fn hello_holdtime_zero_is_described_as_goodbye() {
        let dgram = assemble_hello(a(9), 0, 1, GenerationId::generate());
        assert!(dgram.description.contains("Goodbye"));
    }

    #[test]
    fn hello_datagram_checksums_clean() {
        let dgram = assemble_hello(a(9), 105, 1, GenerationId::generate());
        assert_eq!(packet::ip_checksum(&dgram.bytes), 0);
    }
}
