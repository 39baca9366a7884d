// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! Tracks the PIM neighbors this tool has seen Hellos from, and
//! estimates how many Hellos each one has missed by comparing the
//! elapsed time since its last Hello against the Hold Time it
//! advertised.
//!
//! This is an approximation, not a real miss counter: a neighbor that
//! changes its Hold Time, or whose clock and this host's drift apart,
//! will throw the estimate off. It's meant to catch a neighbor that's
//! gone obviously quiet, not to produce an exact loss percentage.

use std::collections::HashMap;
use std::time::Instant;

use packet::Addr;

#[derive(Debug, Clone, Copy)]
pub struct NeighborState {
    pub last_hello: Instant,
    pub hold_time_secs: u16,
    pub dr_priority: Option<u32>,
    pub generation_id: Option<u32>,
    pub hello_count: u64,
}

#[derive(Debug, Default)]
pub struct NeighborTable {
    neighbors: HashMap<Addr, NeighborState>,
}

impl NeighborTable {
    pub fn new() -> NeighborTable {
        NeighborTable::default()
    }

    pub fn observe_hello(&mut self, from: Addr, hold_time_secs: u16, dr_priority: Option<u32>, generation_id: Option<u32>, now: Instant) {
        let prior_gen = self.neighbors.get(&from).and_then(|s| s.generation_id);
        if let Some(prior) = prior_gen {
            if generation_id.is_some_and(|g| g != prior) {
                log::info!("neighbor {from} restarted (generation ID changed)");
            }
        }

        let entry = self.neighbors.entry(from).or_insert(NeighborState {
            last_hello: now,
            hold_time_secs,
            dr_priority,
            generation_id,
            hello_count: 0,
        });
        entry.last_hello = now;
        entry.hold_time_secs = hold_time_secs;
        entry.dr_priority = dr_priority;
        entry.generation_id = generation_id;
        entry.hello_count += 1;
    }

    /// An approximate "how many Hold Times have passed with no Hello"
    /// ratio; 0 means current, 1.0 means exactly at the hold timer
    /// boundary, and anything higher means at least one Hello was
    /// likely missed.
    pub fn staleness(&self, addr: Addr, now: Instant) -> Option<f64> {
        let s = self.neighbors.get(&addr)?;
        if s.hold_time_secs == 0 {
            return None;
        }
        Some(now.duration_since(s.last_hello).as_secs_f64() / f64::from(s.hold_time_secs))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Addr, &NeighborState)> {
        self.neighbors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_neighbor_is_not_stale() {
        let mut table = NeighborTable::new();
        let now = Instant::now();
        table.observe_hello(Addr::new(10, 0, 0, 1), 105, Some(1), Some(42), now);
        let s = table.staleness(Addr::new(10, 0, 0, 1), now).unwrap();
        assert!(s < 0.01);
    }

    #[test]
    fn unknown_neighbor_has_no_staleness() {
        let table = NeighborTable::new();
        assert!(table.staleness(Addr::new(10, 0, 0, 9), Instant::now()).is_none());
    }
}
