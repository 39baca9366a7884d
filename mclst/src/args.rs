// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

use clap::Parser;
use packet::Addr;

#[derive(Parser, Debug)]
#[clap(name = "mclst", version, about = "Joins a multicast group and reports observed PIM-SM v2 traffic")]
pub struct Args {
    /// The multicast group to join, e.g. 239.1.1.1.
    pub group: Addr,

    /// Interface to join the group on and listen for PIM traffic on.
    #[clap(short, long, default_value = "eth0")]
    pub interface: String,
}
