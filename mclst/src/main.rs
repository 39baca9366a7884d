// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

// Binary part of the application.
// Everything else is in lib.rs so it can be unit tested.

use std::time::Instant;

use clap::Parser;

use mclst::args::Args;
use mclst::neighbors::NeighborTable;
use mclst::privilege::NetRawGuard;
use mclst::receiver::{Event, Receiver};
use mclst::setup_log;

fn main() -> anyhow::Result<()> {
    setup_log(false);

    let args = Args::parse();

    let guard = NetRawGuard::raise()?;
    let recv = Receiver::open(args.group, &args.interface)?;
    drop(guard);

    log::info!("listening for PIM-SM v2 traffic on {} via {}", args.group, args.interface);

    let mut neighbors = NeighborTable::new();

    loop {
        let event = match recv.recv_event() {
            Ok(event) => event,
            Err(e) => {
                log::warn!("receive error: {e}");
                continue;
            }
        };

        let now = Instant::now();
        report(&mut neighbors, &event, now);
    }
}

fn report(neighbors: &mut NeighborTable, event: &Event, now: Instant) {
    match *event {
        Event::Hello {
            from,
            hold_time_secs,
            dr_priority,
            generation_id,
        } => {
            neighbors.observe_hello(from, hold_time_secs.unwrap_or(0), dr_priority, generation_id, now);
            println!(
                "Hello      from {from:<15}  hold-time={:<5} dr-priority={:<5} gen-id={}",
                hold_time_secs.map_or_else(|| "?".to_owned(), |v| v.to_string()),
                dr_priority.map_or_else(|| "?".to_owned(), |v| v.to_string()),
                generation_id.map_or_else(|| "?".to_owned(), |v| format!("{v:#010x}")),
            );
        }
        Event::Goodbye { from } => println!("Goodbye    from {from:<15}"),
        Event::JoinPrune { from } => {
            let staleness = neighbors.staleness(from, now);
            match staleness {
                Some(s) if s > 1.0 => {
                    println!("Join/Prune from {from:<15}  (no Hello seen in {:.1}x its hold time)", s)
                }
                _ => println!("Join/Prune from {from:<15}"),
            }
        }
        Event::Other { from, msg_type } => println!("msg type {msg_type:#04x} from {from:<15}"),
        Event::Malformed { from, ref reason } => println!("malformed packet from {from:<15}: {reason}"),
    }
}
