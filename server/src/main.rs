// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

// Binary part of the application.
// Everything else is in lib.rs so it can be unit tested.

use clap::Parser;
use server::args::Args;
use server::privilege::NetRawGuard;
use server::socket::RawSocket;
use server::speaker::Speaker;
use server::{config, setup_log};

fn main() -> anyhow::Result<()> {
    setup_log(false);

    let args = Args::parse();

    let cfg = match config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(errors) => {
            eprintln!("{errors}");
            std::process::exit(2);
        }
    };

    if args.show_config {
        print!("{cfg}");
        return Ok(());
    }

    let guard = NetRawGuard::raise()?;
    let sock = RawSocket::open(&cfg.pim.interface)?;
    drop(guard);

    let speaker = Speaker::new(cfg, sock, args.self_check);

    server::executor::run_until(async move {
        if let Err(e) = speaker.run().await {
            log::error!("speaker exited with an error: {e}");
            std::process::exit(1);
        }
    });

    Ok(())
}
