// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(name = "pimc", version, about = "A PIM Sparse-Mode v2 control-plane speaker")]
pub struct Args {
    /// Path to the YAML policy file describing the PIM neighbor and the
    /// multicast groups to join.
    pub config: PathBuf,

    /// Parse and validate the configuration, print it back out, and
    /// exit without touching any socket.
    #[clap(long)]
    pub show_config: bool,

    /// After packing each update, reconstruct its join/prune state and
    /// diff it against the configured policy, logging any discrepancy.
    /// Off by default: it's a packer diagnostic, not a correctness
    /// dependency of normal operation.
    #[clap(long)]
    pub self_check: bool,
}
