/*
 * Copyright (C) 2026 the udpsweep contributors
 *
 * This file is part of udpsweep.
 *
 * udpsweep is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * udpsweep is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with udpsweep.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;

use crate::clock::Clock;
use crate::config::{AggregationMode, SweepConfig};
use crate::measure::{aggregation_for, Aggregation, Handoff, MeasurementLog};
use crate::transport::{PacketSource, UdpSource};
use crate::utils::cpu_affinity::CpuAffinityManager;
use crate::BoxResult;

/// the receive half of the harness: consumes datagrams, matches each against
/// the staged handoff, and folds elapsed times into the measurement log
pub struct Listener {
    source: Box<dyn PacketSource>,
    clock: Arc<dyn Clock>,
    handoff: Receiver<Handoff>,
    log: Arc<MeasurementLog>,
    policy: Box<dyn Aggregation>,
    pending: Option<Handoff>,
    slot_by_packet: bool,
    buf: Vec<u8>,
}

impl Listener {
    pub fn new(
        cfg: &SweepConfig,
        source: Box<dyn PacketSource>,
        clock: Arc<dyn Clock>,
        handoff: Receiver<Handoff>,
        log: Arc<MeasurementLog>,
    ) -> Listener {
        Listener {
            source,
            clock,
            handoff,
            log,
            policy: aggregation_for(cfg.mode, cfg.num_packets),
            pending: None,
            slot_by_packet: cfg.mode == AggregationMode::PerPacket,
            // sized to the largest swept payload
            buf: vec![0_u8; cfg.max_size.max(1)],
        }
    }

    /// blocks on receive for the lifetime of the process; there is no
    /// shutdown path
    pub fn run(&mut self) {
        loop {
            match self.source.recv(&mut self.buf) {
                Ok(n) => {
                    let now_us = self.clock.now_us();
                    log::trace!("observed a {}-byte datagram", n);
                    self.observe(now_us);
                }
                Err(e) => {
                    // a failed receive produces no sample
                    log::debug!("receive error: {}", e);
                    continue;
                }
            }
        }
    }

    /// folds one observed datagram into the log; `now_us` is captured at the
    /// moment the receive returned
    pub fn observe(&mut self, now_us: u64) {
        if self.policy.handoff_per_packet() {
            if let Ok(staged) = self.handoff.try_recv() {
                self.pending = Some(staged);
            }
        } else if self.pending.is_none() {
            // one staged handoff covers the whole burst
            self.pending = self.handoff.try_recv().ok();
        }

        let staged = match self.pending {
            Some(staged) => staged,
            None => {
                log::debug!("datagram observed with no transmit staged; ignored");
                return;
            }
        };

        let elapsed_us = now_us.saturating_sub(staged.start_us);
        match self.policy.record(elapsed_us) {
            Some(sample) => {
                let slot = if self.slot_by_packet { staged.packet_idx } else { 0 };
                self.log.store(staged.size_idx, slot, sample);
                self.pending = None;
            }
            None => {
                if self.policy.handoff_per_packet() {
                    // this packet's staging is spent even though nothing flushed
                    self.pending = None;
                }
            }
        }
    }
}

/// starts the listener thread; the socket is created inside the thread, and
/// a creation failure ends the thread without touching the sweep
pub fn start(
    cfg: &SweepConfig,
    clock: Arc<dyn Clock>,
    handoff: Receiver<Handoff>,
    log: Arc<MeasurementLog>,
    cpu_affinity_manager: Arc<Mutex<CpuAffinityManager>>,
) -> BoxResult<JoinHandle<()>> {
    let cfg = cfg.clone();
    let thread_builder = thread::Builder::new().name("udp-listener".to_string());
    let handle = thread_builder.spawn(move || {
        cpu_affinity_manager.lock().unwrap().set_affinity();

        let source = match UdpSource::bind(cfg.remote.ip(), cfg.port, cfg.receive_buffer) {
            Ok(source) => source,
            Err(e) => {
                log::error!("unable to create UDP listening socket: {}", e);
                return;
            }
        };
        log::info!("listening for swept datagrams on port {}", cfg.port);

        Listener::new(&cfg, Box::new(source), clock, handoff, log).run();
    })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Args;
    use crate::clock::testing::ManualClock;
    use crate::config::prepare_sweep;
    use crate::measure::handoff_channel;
    use crate::transport::testing::loopback;
    use clap::Parser;

    fn test_config(extra: &[&str]) -> SweepConfig {
        let mut argv = vec!["udpsweep", "--loopback"];
        argv.extend_from_slice(extra);
        prepare_sweep(&Args::parse_from(argv)).unwrap()
    }

    fn test_listener(cfg: &SweepConfig, clock: Arc<ManualClock>) -> (Listener, std::sync::mpsc::SyncSender<Handoff>, Arc<MeasurementLog>) {
        let (_sink, source) = loopback();
        let (tx, rx) = handoff_channel();
        let log = Arc::new(MeasurementLog::for_config(cfg));
        let listener = Listener::new(cfg, Box::new(source), clock, rx, Arc::clone(&log));
        (listener, tx, log)
    }

    #[test]
    fn test_per_packet_sweep_records_every_sample() {
        let cfg = test_config(&["--min-size", "10", "--max-size", "50", "--num-packets", "3"]);
        let clock = Arc::new(ManualClock::new(0));
        let (mut listener, tx, log) = test_listener(&cfg, Arc::clone(&clock));

        for size_idx in 0..cfg.size_count() {
            for packet_idx in 0..cfg.num_packets {
                let start_us = clock.now_us();
                tx.try_send(Handoff {
                    size_idx,
                    packet_idx,
                    start_us,
                })
                .unwrap();
                clock.advance(25);
                listener.observe(clock.now_us());
            }
        }

        assert_eq!(log.recorded(), cfg.num_packets * cfg.size_count());
        for row in log.rows() {
            assert_eq!(row, vec![25, 25, 25]);
        }
    }

    #[test]
    fn test_burst_mode_records_one_sample_at_the_boundary() {
        let cfg = test_config(&["--min-size", "10", "--max-size", "30", "--num-packets", "4", "--mode", "burst"]);
        let clock = Arc::new(ManualClock::new(1_000));
        let (mut listener, tx, log) = test_listener(&cfg, Arc::clone(&clock));

        // one staged handoff for the whole burst
        tx.try_send(Handoff {
            size_idx: 0,
            packet_idx: 0,
            start_us: clock.now_us(),
        })
        .unwrap();

        for _ in 0..3 {
            clock.advance(10);
            listener.observe(clock.now_us());
            assert_eq!(log.recorded(), 0);
        }
        clock.advance(10);
        listener.observe(clock.now_us());

        // the single sample is the elapsed time of the whole burst
        assert_eq!(log.recorded(), 1);
        assert_eq!(log.row(0), vec![40]);
    }

    #[test]
    fn test_sum_mode_stores_the_accumulated_total() {
        let cfg = test_config(&["--min-size", "10", "--max-size", "30", "--num-packets", "3", "--mode", "sum"]);
        let clock = Arc::new(ManualClock::new(0));
        let (mut listener, tx, log) = test_listener(&cfg, Arc::clone(&clock));

        // scripted per-packet latencies: 5, 7, 9
        for (packet_idx, latency) in [5_u64, 7, 9].iter().enumerate() {
            let start_us = clock.now_us();
            tx.try_send(Handoff {
                size_idx: 1,
                packet_idx,
                start_us,
            })
            .unwrap();
            clock.advance(*latency);
            listener.observe(clock.now_us());
        }

        assert_eq!(log.recorded(), 1);
        assert_eq!(log.buckets(), vec![0, 21]);
    }

    #[test]
    fn test_unmatched_datagram_is_ignored() {
        let cfg = test_config(&[]);
        let clock = Arc::new(ManualClock::new(0));
        let (mut listener, _tx, log) = test_listener(&cfg, Arc::clone(&clock));

        listener.observe(500);
        assert_eq!(log.recorded(), 0);
    }

    #[test]
    fn test_start_is_monotonic_even_if_the_clock_is_not() {
        let cfg = test_config(&[]);
        let clock = Arc::new(ManualClock::new(100));
        let (mut listener, tx, log) = test_listener(&cfg, Arc::clone(&clock));

        tx.try_send(Handoff {
            size_idx: 0,
            packet_idx: 0,
            start_us: 100,
        })
        .unwrap();
        // an observation timestamped before its own send saturates to zero
        listener.observe(50);
        assert_eq!(log.recorded(), 1);
        assert_eq!(log.row(0), vec![0]);
    }
}
