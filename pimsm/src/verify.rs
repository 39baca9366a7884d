// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! A diff oracle for the packer: reconstructs a [`JpConfig`] from a
//! packed update sequence and compares it back against the input
//! configuration, field by field.
//!
//! This never runs on the hot path; it's wired behind the `--self-check`
//! flag for diagnosing packer regressions; the server logs its errors
//! (if any) and keeps running rather than treating them as fatal, since
//! an incorrect packing is a bug to fix, not a reason to refuse to speak
//! PIM at all.

use std::collections::{HashMap, HashSet};

use packet::{Addr, PimVersion};

use crate::model::{GroupConfig, JpConfig, Rpt};
use crate::update::Update;

#[derive(Default)]
struct GroupAccumulator {
    joins: HashSet<Addr>,
    rp: Option<Addr>,
    prunes: HashSet<Addr>,
    errors: Vec<String>,
}

impl GroupAccumulator {
    fn add<V: PimVersion<Address = Addr>>(&mut self, update_no: usize, group: Addr, ge: &crate::update::GroupEntry<V>) {
        for s in &ge.joins {
            if s.wildcard {
                if !s.rpt {
                    self.errors.push(format!("update #{update_no}: group {group}: RP {}: rpt bit is not set", s.addr));
                }
                match self.rp {
                    Some(existing) if existing == s.addr => {
                        self.errors.push(format!("update #{update_no}: group {group}: RP {}: duplicate insert", s.addr));
                    }
                    Some(existing) => {
                        self.errors.push(format!(
                            "update #{update_no}: group {group}: previously set RP {existing}: attempt to set another RP {}",
                            s.addr
                        ));
                    }
                    None => self.rp = Some(s.addr),
                }
            } else {
                if s.rpt {
                    self.errors.push(format!("update #{update_no}: group {group}: source {}: rpt bit set", s.addr));
                }
                if !self.joins.insert(s.addr) {
                    self.errors.push(format!("update #{update_no}: group {group}: duplicate joined source {}", s.addr));
                }
                if self.prunes.contains(&s.addr) {
                    self.errors.push(format!(
                        "update #{update_no}: group {group}: joined source {} also appears in the RPT pruned sources",
                        s.addr
                    ));
                }
            }
        }

        if self.rp.is_none() && !ge.prunes.is_empty() {
            self.errors.push(format!(
                "update #{update_no}: group {group}: no RP is defined, ignoring {} RPT pruned sources",
                ge.prunes.len()
            ));
        } else {
            for s in &ge.prunes {
                if s.wildcard {
                    self.errors.push(format!("update #{update_no}: group {group}: pruned source {}: wildcard bit set", s.addr));
                }
                if !s.rpt {
                    self.errors.push(format!("update #{update_no}: group {group}: pruned source {}: rpt bit not set", s.addr));
                }
                if !self.prunes.insert(s.addr) {
                    self.errors.push(format!("update #{update_no}: group {group}: duplicate pruned source {}", s.addr));
                }
                if self.joins.contains(&s.addr) {
                    self.errors.push(format!(
                        "update #{update_no}: group {group}: pruned source {} also appears in the SPT joined sources",
                        s.addr
                    ));
                }
            }
        }
    }

    fn into_group_config(self, group: Addr) -> Result<GroupConfig, Vec<String>> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        let rpt = self.rp.map(|rp| Rpt {
            rp,
            prunes: self.prunes.into_iter().collect(),
        });
        let mut spt: Vec<Addr> = self.joins.into_iter().collect();
        spt.sort();
        Ok(GroupConfig { group, rpt, spt })
    }
}

fn updates_to_config<V: PimVersion<Address = Addr>>(updates: &[Update<V>]) -> Result<HashMap<Addr, GroupConfig>, Vec<String>> {
    let mut accs: HashMap<Addr, GroupAccumulator> = HashMap::new();
    for (i, update) in updates.iter().enumerate() {
        for ge in &update.groups {
            accs.entry(ge.group).or_default().add(i + 1, ge.group, ge);
        }
    }

    let mut errors = Vec::new();
    let mut out = HashMap::new();
    for (group, acc) in accs {
        match acc.into_group_config(group) {
            Ok(cfg) => {
                out.insert(group, cfg);
            }
            Err(mut errs) => errors.append(&mut errs),
        }
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

fn compare_groups(orig: &GroupConfig, rslt: &GroupConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let orig_spt: HashSet<_> = orig.spt.iter().collect();
    let rslt_spt: HashSet<_> = rslt.spt.iter().collect();

    let missing: Vec<_> = orig_spt.difference(&rslt_spt).collect();
    if !missing.is_empty() {
        errors.push(format!("group {}: missing SPT joined sources: {missing:?}", orig.group));
    }
    let extra: Vec<_> = rslt_spt.difference(&orig_spt).collect();
    if !extra.is_empty() {
        errors.push(format!("group {}: extraneous SPT joined sources: {extra:?}", orig.group));
    }

    match (&orig.rpt, &rslt.rpt) {
        (Some(o), None) => errors.push(format!(
            "group {}: the original has RPT with RP {} and {} pruned sources, while the result has no RPT",
            orig.group, o.rp, o.prunes.len()
        )),
        (None, Some(r)) => errors.push(format!(
            "group {}: the original has no RPT, while the result has RPT with RP {} and {} pruned sources",
            orig.group, r.rp, r.prunes.len()
        )),
        (Some(o), Some(r)) => {
            if o.rp != r.rp {
                errors.push(format!("group {}: original RP {} != result RP {}", orig.group, o.rp, r.rp));
            }
            let orig_p: HashSet<_> = o.prunes.iter().collect();
            let rslt_p: HashSet<_> = r.prunes.iter().collect();
            let missing: Vec<_> = orig_p.difference(&rslt_p).collect();
            if !missing.is_empty() {
                errors.push(format!("group {}: missing RPT pruned sources: {missing:?}", orig.group));
            }
            let extra: Vec<_> = rslt_p.difference(&orig_p).collect();
            if !extra.is_empty() {
                errors.push(format!("group {}: extraneous RPT pruned sources: {extra:?}", orig.group));
            }
        }
        (None, None) => {}
    }

    errors
}

/// Verifies that `updates` encodes exactly the join/prune state in
/// `cfg`: every group present in one side is present in the other, with
/// the same RP, the same RPT prunes, and the same SPT joins.
///
/// Returns the list of discrepancies found, empty if `updates` is a
/// faithful encoding of `cfg`.
pub fn verify_updates<V: PimVersion<Address = Addr>>(cfg: &JpConfig, updates: &[Update<V>]) -> Vec<String> {
    let rslt = match updates_to_config(updates) {
        Ok(rslt) => rslt,
        Err(errors) => return errors,
    };

    let orig: HashMap<Addr, &GroupConfig> = cfg.groups.iter().map(|ge| (ge.group, ge)).collect();

    let orig_groups: HashSet<_> = orig.keys().collect();
    let rslt_groups: HashSet<_> = rslt.keys().collect();

    let mut errors = Vec::new();
    let missing: Vec<_> = orig_groups.difference(&rslt_groups).collect();
    if !missing.is_empty() {
        errors.push(format!("missing groups: {missing:?}"));
    }
    let extra: Vec<_> = rslt_groups.difference(&orig_groups).collect();
    if !extra.is_empty() {
        errors.push(format!("extraneous groups: {extra:?}"));
    }

    for (group, orig_ge) in &orig {
        if let Some(rslt_ge) = rslt.get(group) {
            errors.extend(compare_groups(orig_ge, rslt_ge));
        }
    }

    errors
}

#[derive(Default)]
struct InverseGroupAccumulator {
    rp: Option<Addr>,
    prunes: HashSet<Addr>,
    errors: Vec<String>,
}

impl InverseGroupAccumulator {
    fn add<V: PimVersion<Address = Addr>>(&mut self, update_no: usize, group: Addr, ge: &crate::update::GroupEntry<V>) {
        if !ge.joins.is_empty() {
            self.errors.push(format!(
                "update #{update_no}: group {group}: inverse update carries {} joins, expected prunes only",
                ge.joins.len()
            ));
        }

        for s in &ge.prunes {
            match (s.wildcard, s.rpt) {
                (true, true) => match self.rp {
                    Some(existing) if existing == s.addr => {
                        self.errors.push(format!("update #{update_no}: group {group}: RP {}: duplicate insert", s.addr));
                    }
                    Some(existing) => {
                        self.errors.push(format!(
                            "update #{update_no}: group {group}: previously set RP {existing}: attempt to set another RP {}",
                            s.addr
                        ));
                    }
                    None => self.rp = Some(s.addr),
                },
                (false, false) => {
                    if !self.prunes.insert(s.addr) {
                        self.errors.push(format!("update #{update_no}: group {group}: duplicate pruned source {}", s.addr));
                    }
                }
                (wildcard, rpt) => {
                    self.errors.push(format!(
                        "update #{update_no}: group {group}: pruned source {}: invalid flags (wildcard={wildcard}, rpt={rpt}), expected (true,true) for the RP or (false,false) for an SPT source",
                        s.addr
                    ));
                }
            }
        }
    }

    fn into_group_config(self, group: Addr) -> Result<GroupConfig, Vec<String>> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        let rpt = self.rp.map(|rp| Rpt { rp, prunes: Vec::new() });
        let mut spt: Vec<Addr> = self.prunes.into_iter().collect();
        spt.sort();
        Ok(GroupConfig { group, rpt, spt })
    }
}

fn inverse_updates_to_config<V: PimVersion<Address = Addr>>(updates: &[Update<V>]) -> Result<HashMap<Addr, GroupConfig>, Vec<String>> {
    let mut accs: HashMap<Addr, InverseGroupAccumulator> = HashMap::new();
    for (i, update) in updates.iter().enumerate() {
        for ge in &update.groups {
            accs.entry(ge.group).or_default().add(i + 1, ge.group, ge);
        }
    }

    let mut errors = Vec::new();
    let mut out = HashMap::new();
    for (group, acc) in accs {
        match acc.into_group_config(group) {
            Ok(cfg) => {
                out.insert(group, cfg);
            }
            Err(mut errs) => errors.append(&mut errs),
        }
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

/// `orig.rpt.prunes` is RPT state already withdrawn in the forward
/// direction — the inverse packer never re-states it, so only the RP
/// address itself (not its prune list) is compared here.
fn compare_inverse_groups(orig: &GroupConfig, rslt: &GroupConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let orig_spt: HashSet<_> = orig.spt.iter().collect();
    let rslt_spt: HashSet<_> = rslt.spt.iter().collect();

    let missing: Vec<_> = orig_spt.difference(&rslt_spt).collect();
    if !missing.is_empty() {
        errors.push(format!("group {}: missing withdrawn SPT sources: {missing:?}", orig.group));
    }
    let extra: Vec<_> = rslt_spt.difference(&orig_spt).collect();
    if !extra.is_empty() {
        errors.push(format!("group {}: extraneous withdrawn SPT sources: {extra:?}", orig.group));
    }

    let orig_rp = orig.rpt.as_ref().map(|r| r.rp);
    let rslt_rp = rslt.rpt.as_ref().map(|r| r.rp);
    match (orig_rp, rslt_rp) {
        (Some(o), None) => errors.push(format!("group {}: the original has RP {o}, while the inverse result prunes no RP", orig.group)),
        (None, Some(r)) => errors.push(format!("group {}: the original has no RPT, while the inverse result prunes RP {r}", orig.group)),
        (Some(o), Some(r)) if o != r => {
            errors.push(format!("group {}: original RP {o} != inverse-pruned RP {r}", orig.group))
        }
        _ => {}
    }

    errors
}

/// The dual of [`verify_updates`] for the inverse (withdrawal) packer:
/// verifies that `updates` prunes exactly the RP and SPT sources named
/// in `cfg`, with no joins anywhere.
///
/// Returns the list of discrepancies found, empty if `updates` is a
/// faithful withdrawal of `cfg`.
pub fn verify_inverse_updates<V: PimVersion<Address = Addr>>(cfg: &JpConfig, updates: &[Update<V>]) -> Vec<String> {
    let rslt = match inverse_updates_to_config(updates) {
        Ok(rslt) => rslt,
        Err(errors) => return errors,
    };

    let orig: HashMap<Addr, &GroupConfig> = cfg.groups.iter().map(|ge| (ge.group, ge)).collect();

    let orig_groups: HashSet<_> = orig.keys().collect();
    let rslt_groups: HashSet<_> = rslt.keys().collect();

    let mut errors = Vec::new();
    let missing: Vec<_> = orig_groups
        .difference(&rslt_groups)
        .filter(|&&group| orig[group].rpt.is_some() || !orig[group].spt.is_empty())
        .collect();
    if !missing.is_empty() {
        errors.push(format!("missing groups in inverse output: {missing:?}"));
    }
    let extra: Vec<_> = rslt_groups.difference(&orig_groups).collect();
    if !extra.is_empty() {
        errors.push(format!("extraneous groups in inverse output: {extra:?}"));
    }

    for (group, orig_ge) in &orig {
        if let Some(rslt_ge) = rslt.get(group) {
            errors.extend(compare_inverse_groups(orig_ge, rslt_ge));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use packet::Ipv4;

    use super::*;
    use crate::model::GroupConfig as ModelGroupConfig;
    use crate::pack::pack;

    fn a(d: u8) -> Addr {
        Addr::new(10, 0, 0, d)
    }

    fn g(d: u8) -> Addr {
        Addr::new(239, 0, 0, d)
    }

    #[test]
    fn a_correct_pack_verifies_clean() {
        let cfg = JpConfig::new(vec![ModelGroupConfig::new(
            g(1),
            Some(Rpt {
                rp: a(1),
                prunes: vec![a(2), a(3)],
            }),
            vec![a(4), a(5)],
        )
        .unwrap()])
        .unwrap();

        let updates = pack::<Ipv4>(&cfg);
        let errors = verify_updates(&cfg, &updates);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn a_dropped_group_is_reported() {
        let cfg = JpConfig::new(vec![ModelGroupConfig::new(g(1), None, vec![a(1)]).unwrap()]).unwrap();
        let updates: Vec<Update<Ipv4>> = vec![];
        let errors = verify_updates(&cfg, &updates);
        assert!(errors.iter().any(|e| e.contains("missing groups")));
    }

    #[test]
    fn an_inverse_pack_verifies_clean() {
        let cfg = JpConfig::new(vec![ModelGroupConfig::new(
            g(1),
            Some(Rpt {
                rp: a(1),
                prunes: vec![a(2), a(3)],
            }),
            vec![a(4), a(5)],
        )
        .unwrap()])
        .unwrap();

        let updates = crate::inverse::inverse_pack::<Ipv4>(&cfg);
        let errors = verify_inverse_updates(&cfg, &updates);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn an_spt_prune_miscoded_as_rpt_is_reported() {
        let cfg = JpConfig::new(vec![ModelGroupConfig::new(g(1), None, vec![a(4)]).unwrap()]).unwrap();

        let updates = vec![Update::<Ipv4> {
            groups: vec![crate::update::GroupEntry {
                group: g(1),
                joins: vec![],
                prunes: vec![crate::update::Source::new(a(4), false, true)],
            }],
        }];

        let errors = verify_inverse_updates(&cfg, &updates);
        assert!(errors.iter().any(|e| e.contains("invalid flags")), "{errors:?}");
    }

    #[test]
    fn a_join_in_an_inverse_update_is_reported() {
        let cfg = JpConfig::new(vec![ModelGroupConfig::new(g(1), None, vec![a(4)]).unwrap()]).unwrap();

        let updates = vec![Update::<Ipv4> {
            groups: vec![crate::update::GroupEntry {
                group: g(1),
                joins: vec![crate::update::Source::new(a(4), false, false)],
                prunes: vec![],
            }],
        }];

        let errors = verify_inverse_updates(&cfg, &updates);
        assert!(errors.iter().any(|e| e.contains("joins, expected prunes only")), "{errors:?}");
    }
}
