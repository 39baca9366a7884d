// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! The forward Join/Prune packer: packs a [`JpConfig`] into the minimal
//! sequence of [`Update`]s that joins every configured SPT source and
//! RP, without ever splitting a group's RPT join across two packets.
//!
//! This keeps the source's builder-queue-plus-cursor approach, but as
//! plain `Vec` indices rather than a cursor object that holds a pointer
//! back into the queue plus a `&mut` to a shared "first non-full" index
//! -- Rust's aliasing rules make that shape awkward, and a `usize` index
//! does the same job.

use packet::{Addr, PimVersion};

use crate::model::{GroupConfig, JpConfig};
use crate::update::{GroupEntry, Source, Update};

struct GroupEntryBuilder<V: PimVersion<Address = Addr>> {
    group: Addr,
    joins: Vec<Source<V>>,
    prunes: Vec<Source<V>>,
}

impl<V: PimVersion<Address = Addr>> GroupEntryBuilder<V> {
    fn new(group: Addr, jcap: usize, pcap: usize) -> Self {
        GroupEntryBuilder {
            group,
            joins: Vec::with_capacity(jcap),
            prunes: Vec::with_capacity(pcap),
        }
    }

    fn join(&mut self, addr: Addr, wildcard: bool, rpt: bool) {
        self.joins.push(Source::new(addr, wildcard, rpt));
    }

    fn prune(&mut self, addr: Addr, wildcard: bool, rpt: bool) {
        self.prunes.push(Source::new(addr, wildcard, rpt));
    }

    fn size(&self) -> usize {
        V::GRP_HDR_SIZE + (self.joins.len() + self.prunes.len()) * V::SRC_A_SIZE
    }

    fn build(self) -> GroupEntry<V> {
        GroupEntry {
            group: self.group,
            joins: self.joins,
            prunes: self.prunes,
        }
    }
}

struct UpdateBuilder<V: PimVersion<Address = Addr>> {
    groups: Vec<GroupEntry<V>>,
    size: usize,
}

impl<V: PimVersion<Address = Addr>> UpdateBuilder<V> {
    fn new() -> Self {
        UpdateBuilder {
            groups: Vec::new(),
            size: 0,
        }
    }

    fn remaining(&self) -> usize {
        V::JP_CAPACITY - self.size
    }

    /// Adds `entry`, whose packed size is `sz`.
    ///
    /// # Panics
    /// Panics if `sz` would overflow this update's capacity. The caller
    /// always sizes entries against [`UpdateBuilder::remaining`] first,
    /// so this indicates a packer bug, not a runtime condition.
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

struct Packer<V: PimVersion<Address = Addr>> {
    builders: Vec<UpdateBuilder<V>>,
    start: usize,
}

impl<V: PimVersion<Address = Addr>> Packer<V> {
    fn new() -> Self {
        Packer {
            builders: vec![UpdateBuilder::new()],
            start: 0,
        }
    }

    fn ensure(&mut self, i: usize) {
        while i >= self.builders.len() {
            self.builders.push(UpdateBuilder::new());
        }
    }

    /// Advances `start` past every builder that's now full, the way the
    /// source's cursor does on every insert, so later groups skip
    /// builders that can no longer fit even the smallest entry.
    fn advance_start(&mut self) {
        while self.start < self.builders.len() && self.builders[self.start].full() {
            self.start += 1;
        }
        if self.start == self.builders.len() {
            self.builders.push(UpdateBuilder::new());
        }
    }

    fn find_rpt_builder(&mut self, rpt_size: usize) -> usize {
        let mut i = self.start;
        loop {
            self.ensure(i);
            if self.builders[i].remaining() >= rpt_size {
                return i;
            }
            i += 1;
        }
    }

    fn fit_group(&mut self, ge: &GroupConfig) {
        let mut rpt_ub = ge.rpt.as_ref().map(|rpt| {
            let rpt_size = V::GRP_HDR_SIZE + V::SRC_A_SIZE * (rpt.prunes.len() + 1);
            self.find_rpt_builder(rpt_size)
        });

        let mut i = self.start;
        let mut srci = 0usize;

        while srci < ge.spt.len() {
            self.ensure(i);

            if rpt_ub != Some(i) {
                let cnt = max_sources::<V>(self.builders[i].remaining()).min(ge.spt.len() - srci);
                if cnt > 0 {
                    let mut geb = GroupEntryBuilder::<V>::new(ge.group, cnt, 0);
                    for &src in &ge.spt[srci..srci + cnt] {
                        geb.join(src, false, false);
                    }
                    let sz = geb.size();
                    self.builders[i].add(geb.build(), sz);
                    self.advance_start();
                    srci += cnt;
                }
            } else {
                let rpt = ge.rpt.as_ref().expect("rpt_ub only set when ge.rpt is Some");
                let reserved = V::SRC_A_SIZE * (rpt.prunes.len() + 1);
                let cnt = max_sources::<V>(self.builders[i].remaining() - reserved)
                    .min(ge.spt.len() - srci);

                let mut geb = GroupEntryBuilder::<V>::new(ge.group, cnt + 1, rpt.prunes.len());
                for &src in &ge.spt[srci..srci + cnt] {
                    geb.join(src, false, false);
                }
                geb.join(rpt.rp, true, true);
                for &p in &rpt.prunes {
                    geb.prune(p, false, true);
                }
                let sz = geb.size();
                self.builders[i].add(geb.build(), sz);
                self.advance_start();
                srci += cnt;
                rpt_ub = None;
            }

            i += 1;
        }

        if let Some(i) = rpt_ub {
            let rpt = ge.rpt.as_ref().expect("rpt_ub only set when ge.rpt is Some");
            let mut geb = GroupEntryBuilder::<V>::new(ge.group, 1, rpt.prunes.len());
            geb.join(rpt.rp, true, true);
            for &p in &rpt.prunes {
                geb.prune(p, false, true);
            }
            let sz = geb.size();
            self.builders[i].add(geb.build(), sz);
            self.advance_start();
        }
    }

    fn build(mut self) -> Vec<Update<V>> {
        if self.builders.last().is_some_and(UpdateBuilder::is_empty) {
            self.builders.pop();
        }
        self.builders.into_iter().map(UpdateBuilder::build).collect()
    }
}

/// Packs `cfg` into the minimal sequence of Join/Prune updates, joining
/// every configured SPT source and RP and pruning every configured RPT
/// source. See [`crate::inverse::inverse_pack`] for the withdraw form.
pub fn pack<V: PimVersion<Address = Addr>>(cfg: &JpConfig) -> Vec<Update<V>> {
    let mut packer = Packer::<V>::new();
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
    fn single_small_group_fits_one_update() {
        let cfg = JpConfig::new(vec![ModelGroupConfig::new(
            g(1),
            Some(Rpt {
                rp: a(1),
                prunes: vec![a(2)],
            }),
            vec![a(3), a(4)],
        )
        .unwrap()])
        .unwrap();

        let updates = pack::<Ipv4>(&cfg);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].groups.len(), 1);
        let ge = &updates[0].groups[0];
        assert_eq!(ge.joins.len(), 3); // 2 SPT + RP
        assert_eq!(ge.prunes.len(), 1);
    }

    #[test]
    fn large_spt_splits_across_updates() {
        let many: Vec<Addr> = (0..300u32).map(|i| Addr::from_bits(0x0a00_0000 + i)).collect();
        let cfg = JpConfig::new(vec![ModelGroupConfig::new(g(1), None, many.clone()).unwrap()]).unwrap();

        let updates = pack::<Ipv4>(&cfg);
        assert!(updates.len() > 1, "300 sources must not fit one update");

        let total_joins: usize = updates.iter().flat_map(|u| &u.groups).map(|ge| ge.joins.len()).sum();
        assert_eq!(total_joins, many.len());
    }

    #[test]
    fn rpt_join_never_splits_across_updates() {
        let prunes: Vec<Addr> = (0..50u32).map(|i| Addr::from_bits(0x0a01_0000 + i)).collect();
        let cfg = JpConfig::new(vec![ModelGroupConfig::new(
            g(1),
            Some(Rpt { rp: a(1), prunes }),
            vec![],
        )
        .unwrap()])
        .unwrap();

        let updates = pack::<Ipv4>(&cfg);
        let rpt_entries: Vec<_> = updates
            .iter()
            .flat_map(|u| &u.groups)
            .filter(|ge| ge.joins.iter().any(|s| s.wildcard))
            .collect();
        assert_eq!(rpt_entries.len(), 1, "the RP join must land in exactly one entry");
        assert_eq!(rpt_entries[0].prunes.len(), 50);
    }
}
