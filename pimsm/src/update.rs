// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! The packed representation of a Join/Prune payload: a source record
//! with its W/R flags, a group entry holding the joined and pruned
//! source lists for one group, and an update holding the group entries
//! that fit in a single packet.

use std::fmt;

use packet::PimVersion;

/// One Encoded-Source-Address record: an address plus the flags that
/// say what kind of source it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source<V: PimVersion> {
    pub addr: V::Address,
    /// Set on the RP record in an RPT join (the `*` in `(*,G)`).
    pub wildcard: bool,
    /// Set on any source reached via the shared tree: the RP record
    /// itself, and any RPT-pruned source.
    pub rpt: bool,
}

impl<V: PimVersion> Source<V> {
    pub fn new(addr: V::Address, wildcard: bool, rpt: bool) -> Self {
        Source { addr, wildcard, rpt }
    }
}

impl<V: PimVersion> fmt::Display for Source<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)?;
        if self.wildcard {
            write!(f, ", WC")?;
        }
        if self.rpt {
            write!(f, ", rpt")?;
        }
        Ok(())
    }
}

/// The joined and pruned sources this update carries for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry<V: PimVersion> {
    pub group: V::Address,
    pub joins: Vec<Source<V>>,
    pub prunes: Vec<Source<V>>,
}

impl<V: PimVersion> fmt::Display for GroupEntry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Group {}", self.group)?;
        writeln!(f, " {} joins, {} prunes", self.joins.len(), self.prunes.len())?;
        writeln!(f, " Joins:")?;
        for j in &self.joins {
            writeln!(f, "   {j}")?;
        }
        writeln!(f, " Prunes:")?;
        for p in &self.prunes {
            writeln!(f, "   {p}")?;
        }
        Ok(())
    }
}

/// One Join/Prune packet's worth of group entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update<V: PimVersion> {
    pub groups: Vec<GroupEntry<V>>,
}

impl<V: PimVersion> fmt::Display for Update<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Update with {} group{}:",
            self.groups.len(),
            if self.groups.len() == 1 { "" } else { "s" }
        )?;
        for ge in &self.groups {
            write!(f, "{ge}")?;
        }
        Ok(())
    }
}
