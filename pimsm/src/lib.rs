// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! PIM-SM policy model and Join/Prune packer.
//!
//! [`model`] is what the rest of the speaker (and the YAML config
//! loader) hands this crate: a plain description of which groups to
//! join and how. [`pack`] and [`inverse`] turn that into the minimal
//! sequence of MTU-budgeted wire [`update::Update`]s -- joining
//! everything, or withdrawing everything, respectively. [`assemble`]
//! renders an `Update` (or a Hello) into an actual IPv4 datagram using
//! the wire primitives in the `packet` crate. [`verify`] is a diff
//! oracle that can reconstruct a policy from a packed sequence and
//! compare it back, for catching packer regressions.

pub mod assemble;
pub mod genid;
pub mod inverse;
pub mod model;
pub mod pack;
pub mod update;
pub mod verify;

/// The largest RPT prune list a single group entry will ever carry,
/// independent of how many packets packing it might take. Configuring
/// more prunes than this for one group's RP is rejected up front rather
/// than silently spread across an unbounded number of packets.
pub const MAX_PRUNES_PER_GROUP: usize = 4096;

pub use model::{ConfigError, GroupConfig, JpConfig, Rpt};
pub use update::{GroupEntry, Source, Update};
