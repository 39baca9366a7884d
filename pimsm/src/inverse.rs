// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! The inverse packer: packs a [`JpConfig`] into the Prune-only updates
//! that withdraw everything it names (the RP join and every SPT source),
//! for sending a Goodbye-style full withdrawal when this speaker shuts
//! down or a group is removed from policy.
//!
//! Each group entry prunes the RP (if the group has RPT state) as
//! `(rp, W=1, R=1)` followed by every SPT source as a plain `Prune(S,G)`
//! (`W=0, R=0`) — the dual of the SPT join it withdraws, not an RPT
//! prune. The per-builder accounting is the same [`UpdateBuilder`]-style
//! queue the forward packer uses, just without ever placing a join.
//!
//! The source's inverse packer mutates its per-entry source count
//! mid-loop and `continue`s without ever committing the partially built
//! entry when doing so drains the count to zero, silently dropping the
//! RP prune. Here `fit_group` computes how many sources it will place in
//! a builder before opening the entry, and always commits whatever it
//! opens, so no source is ever dropped.

use packet::{Addr, PimVersion};

use crate::model::{GroupConfig, JpConfig};
use crate::update::{GroupEntry, Source, Update};

struct InverseGroupEntryBuilder<V: PimVersion<Address = Addr>> {
    group: Addr,
    prunes: Vec<Source<V>>,
}

impl<V: PimVersion<Address = Addr>> InverseGroupEntryBuilder<V> {
    fn new(group: Addr, pcap: usize) -> Self {
        InverseGroupEntryBuilder {
            group,
            prunes: Vec::with_capacity(pcap),
        }
    }

    fn prune(&mut self, addr: Addr, wildcard: bool, rpt: bool) {
        self.prunes.push(Source::new(addr, wildcard, rpt));
    }

    fn size(&self) -> usize {
        V::GRP_HDR_SIZE + self.prunes.len() * V::SRC_A_SIZE
    }

    fn build(self) -> GroupEntry<V> {
        GroupEntry {
            group: self.group,
            joins: Vec::new(),
            prunes: self.prunes,
        }
    }
}

struct InverseUpdateBuilder<V: PimVersion<Address = Addr>> {
    groups: Vec<GroupEntry<V>>,
    size: usize,
}

impl<V: PimVersion<Address = Addr>> InverseUpdateBuilder<V> {
    fn new() -> Self {
        InverseUpdateBuilder {
            groups: Vec::new(),
            size: 0,
        }
    }

    fn remaining(&self) -> usize {
        V::JP_CAPACITY - self.size
    }

    fn add(&mut self, entry: GroupEntry<V>, sz: usize) {
        assert!(
            self.size + sz <= V::JP_CAPACITY,
            "update capacity {}, current size {}, entry size {}",
            V::JP_CAPACITY,
            self.size,
            sz
        );
        self.groups.push(entry);
        self.size += sz;
    }

    fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn full(&self) -> bool {
        self.remaining() < V::MIN_ENTRY_SIZE
    }

    fn build(self) -> Update<V> {
        Update { groups: self.groups }
    }
}

fn max_sources<V: PimVersion>(remaining: usize) -> usize {
    if remaining <= V::GRP_HDR_SIZE {
        0
    } else {
        (remaining - V::GRP_HDR_SIZE) / V::SRC_A_SIZE
    }
}

struct InversePacker<V: PimVersion<Address = Addr>> {
    builders: Vec<InverseUpdateBuilder<V>>,
    start: usize,
}

impl<V: PimVersion<Address = Addr>> InversePacker<V> {
    fn new() -> Self {
        InversePacker {
            builders: vec![InverseUpdateBuilder::new()],
            start: 0,
        }
    }

    fn ensure(&mut self, i: usize) {
        while i >= self.builders.len() {
            self.builders.push(InverseUpdateBuilder::new());
        }
    }

    fn advance_start(&mut self) {
        while self.start < self.builders.len() && self.builders[self.start].full() {
            self.start += 1;
        }
        if self.start == self.builders.len() {
            self.builders.push(InverseUpdateBuilder::new());
        }
    }

    fn fit_group(&mut self, ge: &GroupConfig) {
        let mut i = self.start;
        // One extra slot for the RP prune, ahead of the SPT sources.
        let mut pending_rp = ge.rpt.as_ref().map(|rpt| rpt.rp);
        let mut srci = 0usize;

        let total = usize::from(pending_rp.is_some()) + ge.spt.len();
        if total == 0 {
            return;
        }

        while pending_rp.is_some() || srci < ge.spt.len() {
            self.ensure(i);

            let remaining_to_place = usize::from(pending_rp.is_some()) + (ge.spt.len() - srci);
            let cnt = max_sources::<V>(self.builders[i].remaining())
                .min(remaining_to_place)
                .min(V::MAX_PRUNE_SGRPT_LEN);

            if cnt == 0 {
                i += 1;
                continue;
            }

            let mut geb = InverseGroupEntryBuilder::<V>::new(ge.group, cnt);
            let mut placed = 0usize;

            if let Some(rp) = pending_rp {
                geb.prune(rp, true, true);
                pending_rp = None;
                placed += 1;
            }

            while placed < cnt {
                geb.prune(ge.spt[srci], false, false);
                srci += 1;
                placed += 1;
            }

            let sz = geb.size();
            self.builders[i].add(geb.build(), sz);
            self.advance_start();
            i += 1;
        }
    }

    fn build(mut self) -> Vec<Update<V>> {
        if self.builders.last().is_some_and(InverseUpdateBuilder::is_empty) {
            self.builders.pop();
        }
        self.builders.into_iter().map(InverseUpdateBuilder::build).collect()
    }
}

/// Packs `cfg` into the minimal sequence of Prune-only updates that
/// withdraw every RP join and SPT source it names.
pub fn inverse_pack<V: PimVersion<Address = Addr>>(cfg: &JpConfig) -> Vec<Update<V>> {
    let mut packer = InversePacker::<V>::new();
    for ge in &cfg.groups {
        packer.fit_group(ge);
    }
    packer.build()
}

#[cfg(test)]
mod tests {
    use packet::{Addr, Ipv4};

    use super::*;
    use crate::model::{GroupConfig as ModelGroupConfig, Rpt};

    fn a(d: u8) -> Addr {
        Addr::new(10, 0, 0, d)
    }

    fn g(d: u8) -> Addr {
        Addr::new(239, 0, 0, d)
    }

    #[test]
    fn every_source_and_rp_is_pruned_exactly_once() {
        let prunes: Vec<Addr> = (0..40u32).map(|i| Addr::from_bits(0x0a02_0000 + i)).collect();
        let spt: Vec<Addr> = (0..40u32).map(|i| Addr::from_bits(0x0a03_0000 + i)).collect();
        let cfg = JpConfig::new(vec![ModelGroupConfig::new(
            g(1),
            Some(Rpt { rp: a(1), prunes: prunes.clone() }),
            spt.clone(),
        )
        .unwrap()])
        .unwrap();

        let updates = inverse_pack::<Ipv4>(&cfg);
        assert!(updates.iter().flat_map(|u| &u.groups).all(|ge| ge.joins.is_empty()));

        let all_pruned: Vec<Addr> = updates
            .iter()
            .flat_map(|u| &u.groups)
            .flat_map(|ge| &ge.prunes)
            .map(|s| s.addr)
            .collect();
        assert_eq!(all_pruned.len(), 1 + spt.len());
        assert!(all_pruned.contains(&a(1)));
        for s in &spt {
            assert!(all_pruned.contains(s));
        }
    }

    #[test]
    fn rp_prune_is_never_dropped_when_entry_is_exactly_full() {
        // Construct an RPT whose prune list is exactly MAX_PRUNE_SGRPT_LEN
        // sources, so the RP itself must start a fresh entry.
        let prunes: Vec<Addr> = (0..Ipv4::MAX_PRUNE_SGRPT_LEN as u32)
            .map(|i| Addr::from_bits(0x0a04_0000 + i))
            .collect();
        let cfg = JpConfig::new(vec![ModelGroupConfig::new(
            g(1),
            Some(Rpt { rp: a(9), prunes }),
            vec![],
        )
        .unwrap()])
        .unwrap();

        let updates = inverse_pack::<Ipv4>(&cfg);
        let all_pruned: Vec<Addr> = updates
            .iter()
            .flat_map(|u| &u.groups)
            .flat_map(|ge| &ge.prunes)
            .map(|s| s.addr)
            .collect();
        assert!(all_pruned.contains(&a(9)), "the RP prune must not be dropped");
    }

    #[test]
    fn empty_group_produces_no_updates() {
        let cfg = JpConfig::new(vec![ModelGroupConfig::new(g(1), None, vec![]).unwrap()]).unwrap();
        let updates = inverse_pack::<Ipv4>(&cfg);
        assert!(updates.is_empty());
    }
}
