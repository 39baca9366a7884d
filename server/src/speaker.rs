// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! The speaker's send loop: originates Hello packets on a fixed period,
//! and re-sends the full Join/Prune state on its own (usually longer)
//! period, until asked to stop -- at which point it sends a Goodbye and
//! a full withdrawal before returning.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_signal::{Signal, Signals};
use futures::{FutureExt, StreamExt};
use packet::Ipv4;
use pimsm::genid::GenerationId;
use pimsm::{assemble, inverse, pack};
use smol::Timer;

use crate::config::Config;
use crate::socket::DatagramSink;

#[derive(thiserror::Error, Debug)]
pub enum SpeakerError {
    #[error("failed to send {what}: {source}")]
    Send {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

pub struct Speaker<S: DatagramSink> {
    config: Config,
    sock: S,
    generation_id: GenerationId,
    self_check: bool,
}

impl<S: DatagramSink> Speaker<S> {
    pub fn new(config: Config, sock: S, self_check: bool) -> Speaker<S> {
        Speaker {
            config,
            sock,
            generation_id: GenerationId::generate(),
            self_check,
        }
    }

    fn dst(&self) -> Ipv4Addr {
        Ipv4::ALL_PIM_ROUTERS.into()
    }

    fn send_hello(&self, holdtime: u16) -> Result<(), SpeakerError> {
        let dgram = assemble::assemble_hello(self.config.pim.source, holdtime, self.config.pim.dr_priority, self.generation_id);
        log::debug!("{}", dgram.description);
        self.sock
            .send(&dgram.bytes, self.dst())
            .map(|_| ())
            .map_err(|source| SpeakerError::Send { what: "Hello", source })
    }

    fn send_join_prune(&self) -> Result<(), SpeakerError> {
        let updates = pack::pack::<Ipv4>(&self.config.jp);

        if self.self_check {
            let errors = pimsm::verify::verify_updates(&self.config.jp, &updates);
            for e in &errors {
                log::error!("join/prune self-check failed: {e}");
            }
        }

        for (i, update) in updates.iter().enumerate() {
            let dgram = assemble::assemble_join_prune(
                i + 1,
                update,
                self.config.pim.source,
                self.config.pim.neighbor,
                self.config.pim.jp_refresh_secs.saturating_mul(3).saturating_add(self.config.pim.jp_refresh_secs / 2),
            );
            log::debug!("{}", dgram.description);
            self.sock
                .send(&dgram.bytes, self.dst())
                .map_err(|source| SpeakerError::Send { what: "Join/Prune", source })?;
        }
        Ok(())
    }

    fn send_goodbye_and_withdraw(&self) -> Result<(), SpeakerError> {
        self.send_hello(0)?;
        let updates = inverse::inverse_pack::<Ipv4>(&self.config.jp);

        if self.self_check {
            let errors = pimsm::verify::verify_inverse_updates(&self.config.jp, &updates);
            for e in &errors {
                log::error!("inverse join/prune self-check failed: {e}");
            }
        }

        for update in updates {
            let dgram = assemble::assemble_join_prune(
                0,
                &update,
                self.config.pim.source,
                self.config.pim.neighbor,
                0,
            );
            log::debug!("{}", dgram.description);
            self.sock
                .send(&dgram.bytes, self.dst())
                .map_err(|source| SpeakerError::Send { what: "withdrawal Join/Prune", source })?;
        }
        Ok(())
    }

    /// Runs the Hello/Join-Prune cadence until interrupted by SIGINT or
    /// SIGTERM, then sends a Goodbye and a full withdrawal before
    /// returning.
    pub async fn run(self) -> Result<(), SpeakerError> {
        let hello_period = Duration::from_secs(self.config.pim.hello_period_secs.into());
        let hello_holdtime = self.config.pim.hello_period_secs.saturating_mul(7) / 2;
        let jp_period = Duration::from_secs(self.config.pim.jp_refresh_secs.into());

        let mut signals = Signals::new([Signal::Int, Signal::Term]).map_err(SpeakerError::Signal)?;

        self.send_hello(hello_holdtime)?;
        self.send_join_prune()?;

        let mut hello_timer = Timer::interval(hello_period);
        let mut jp_timer = Timer::interval(jp_period);

        loop {
            futures::select! {
                _ = hello_timer.next().fuse() => self.send_hello(hello_holdtime)?,
                _ = jp_timer.next().fuse() => self.send_join_prune()?,
                sig = signals.next().fuse() => {
                    if sig.is_some() {
                        log::info!("received termination signal, sending Goodbye");
                        break;
                    }
                }
            }
        }

        self.send_goodbye_and_withdraw()
    }
}

#[cfg(test)]
mod tests {
    use packet::Addr;
    use pimsm::{GroupConfig, JpConfig, Rpt};

    use super::*;
    use crate::config::PimParams;
    use crate::socket::test_support::RecordingSink;

    fn test_config() -> Config {
        let group = GroupConfig::new(
            Addr::new(239, 1, 1, 1),
            Some(Rpt {
                rp: Addr::new(10, 0, 0, 1),
                prunes: vec![Addr::new(10, 0, 0, 5)],
            }),
            vec![Addr::new(10, 0, 0, 2)],
        )
        .unwrap();

        Config {
            pim: PimParams {
                neighbor: Addr::new(203, 0, 113, 1),
                source: Addr::new(203, 0, 113, 5),
                interface: "eth0".to_owned(),
                dr_priority: 1,
                hello_period_secs: 30,
                jp_refresh_secs: 60,
            },
            jp: JpConfig::new(vec![group]).unwrap(),
        }
    }

    #[test]
    fn hello_holdtime_zero_is_goodbye_and_reaches_the_sink() {
        let sink = RecordingSink::default();
        let speaker = Speaker::new(test_config(), sink, false);
        speaker.send_hello(0).unwrap();
        let sent = speaker.sock.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, std::net::Ipv4Addr::new(224, 0, 0, 13));
    }

    #[test]
    fn join_prune_reaches_the_sink_once_per_update() {
        let sink = RecordingSink::default();
        let speaker = Speaker::new(test_config(), sink, true);
        speaker.send_join_prune().unwrap();
        assert_eq!(speaker.sock.sent.borrow().len(), 1);
    }

    #[test]
    fn goodbye_and_withdraw_sends_hello_then_every_withdrawal_update() {
        let sink = RecordingSink::default();
        let speaker = Speaker::new(test_config(), sink, false);
        speaker.send_goodbye_and_withdraw().unwrap();
        // One Hello(holdtime=0) plus at least one withdrawal Join/Prune.
        assert!(speaker.sock.sent.borrow().len() >= 2);
    }
}
