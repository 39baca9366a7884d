// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! The multicast policy model: what a configuration file or runtime API
//! call actually asks this speaker to maintain, independent of how it
//! gets packed into wire packets.
//!
//! A single [`GroupConfig`] names, for one multicast group, the set of
//! sources joined on the Shortest-Path Tree plus an optional Rendezvous
//! Point shared-tree join with its own prune list. This mirrors the
//! group/RP/prune shape of the source configuration model, but the field
//! names are chosen to say what they hold rather than abbreviate it.

use std::collections::HashSet;

use packet::Addr;

/// An RP join together with the RPT-pruned sources reached through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rpt {
    pub rp: Addr,
    pub prunes: Vec<Addr>,
}

/// The desired join state for one multicast group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConfig {
    pub group: Addr,
    pub rpt: Option<Rpt>,
    pub spt: Vec<Addr>,
}

/// The full policy: every group this speaker should be joined to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JpConfig {
    pub groups: Vec<GroupConfig>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("group {group} is not a multicast address")]
    NotMulticast { group: Addr },
    #[error("group {group} is configured more than once")]
    DuplicateGroup { group: Addr },
    #[error("group {group}: source {source} appears in both the SPT join list and the RPT prune list")]
    SourceInBothLists { group: Addr, source: Addr },
    #[error("group {group}: source {source} repeated in the SPT join list")]
    DuplicateSptSource { group: Addr, source: Addr },
    #[error("group {group}: source {source} repeated in the RPT prune list")]
    DuplicatePruneSource { group: Addr, source: Addr },
    #[error("group {group}: RPT prune list cannot include the RP {source} itself")]
    PruneEqualsRp { group: Addr, source: Addr },
    #[error("group {group}: RPT prune list has {count} sources, more than the {max} this speaker can pack under one RP")]
    TooManyPrunes { group: Addr, count: usize, max: usize },
}

impl GroupConfig {
    /// Builds a group entry, rejecting source lists that can never be
    /// packed into a valid Join/Prune: an address in both the SPT join
    /// and RPT prune lists, duplicate entries in either list, or more
    /// RPT prunes than a single group entry can ever hold regardless of
    /// how many packets are spent on it.
    pub fn new(group: Addr, rpt: Option<Rpt>, spt: Vec<Addr>) -> Result<GroupConfig, ConfigError> {
        if !group.is_multicast() {
            return Err(ConfigError::NotMulticast { group });
        }

        let mut seen_spt = HashSet::new();
        for &s in &spt {
            if !seen_spt.insert(s) {
                return Err(ConfigError::DuplicateSptSource { group, source: s });
            }
        }

        if let Some(rpt) = &rpt {
            let mut seen_prunes = HashSet::new();
            for &s in &rpt.prunes {
                if !seen_prunes.insert(s) {
                    return Err(ConfigError::DuplicatePruneSource { group, source: s });
                }
                if seen_spt.contains(&s) {
                    return Err(ConfigError::SourceInBothLists { group, source: s });
                }
                if s == rpt.rp {
                    return Err(ConfigError::PruneEqualsRp { group, source: s });
                }
            }

            if rpt.prunes.len() > crate::MAX_PRUNES_PER_GROUP {
                return Err(ConfigError::TooManyPrunes {
                    group,
                    count: rpt.prunes.len(),
                    max: crate::MAX_PRUNES_PER_GROUP,
                });
            }
        }

        Ok(GroupConfig { group, rpt, spt })
    }
}

impl JpConfig {
    pub fn new(groups: Vec<GroupConfig>) -> Result<JpConfig, ConfigError> {
        let mut seen = HashSet::new();
        for g in &groups {
            if !seen.insert(g.group) {
                return Err(ConfigError::DuplicateGroup { group: g.group });
            }
        }
        Ok(JpConfig { groups })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(d: u8) -> Addr {
        Addr::new(10, 0, 0, d)
    }

    fn g(d: u8) -> Addr {
        Addr::new(239, 0, 0, d)
    }

    #[test]
    fn rejects_non_multicast_group() {
        let err = GroupConfig::new(a(1), None, vec![]).unwrap_err();
        assert!(matches!(err, ConfigError::NotMulticast { .. }));
    }

    #[test]
    fn rejects_source_in_both_lists() {
        let err = GroupConfig::new(
            g(1),
            Some(Rpt {
                rp: a(1),
                prunes: vec![a(2)],
            }),
            vec![a(2)],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::SourceInBothLists { .. }));
    }

    #[test]
    fn rejects_prune_equal_to_rp() {
        let err = GroupConfig::new(
            g(1),
            Some(Rpt {
                rp: a(1),
                prunes: vec![a(1)],
            }),
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::PruneEqualsRp { .. }));
    }

    #[test]
    fn rejects_duplicate_group_in_config() {
        let ge = GroupConfig::new(g(1), None, vec![a(1)]).unwrap();
        let err = JpConfig::new(vec![ge.clone(), ge]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateGroup { .. }));
    }

    #[test]
    fn accepts_disjoint_spt_and_prunes() {
        let ge = GroupConfig::new(
            g(1),
            Some(Rpt {
                rp: a(1),
                prunes: vec![a(2)],
            }),
            vec![a(3)],
        )
        .unwrap();
        assert_eq!(ge.spt, vec![a(3)]);
    }
}
