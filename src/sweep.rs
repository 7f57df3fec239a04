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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::config::{AggregationMode, SweepConfig};
use crate::measure::{Handoff, MeasurementLog};
use crate::transport::PacketSink;

/// when false, the sweep ends early
static ALIVE: AtomicBool = AtomicBool::new(true);

/// how long a staged handoff may sit unconsumed before the next packet is
/// transmitted without its own timing
const HANDOFF_TIMEOUT: Duration = Duration::from_millis(200);
const HANDOFF_POLL: Duration = Duration::from_micros(50);

/// how long a report waits for the listener to catch up
const DRAIN_TIMEOUT: Duration = Duration::from_millis(200);
const DRAIN_POLL: Duration = Duration::from_millis(1);

pub fn kill() -> bool {
    ALIVE.swap(false, Ordering::Relaxed)
}
fn is_alive() -> bool {
    ALIVE.load(Ordering::Relaxed)
}

/// sweep payload: every byte is its own offset, truncated to one octet
pub fn pattern_payload(len: usize) -> Vec<u8> {
    let mut payload = vec![0_u8; len];
    for (i, b) in payload.iter_mut().enumerate() {
        *b = (i % 256) as u8;
    }
    payload
}

/// drives the size sweep: stages a handoff, transmits, paces itself, and
/// prints the measurement log at the mode's reporting granularity
pub struct SweepDriver {
    cfg: SweepConfig,
    clock: Arc<dyn Clock>,
    sink: Box<dyn PacketSink>,
    handoff: SyncSender<Handoff>,
    log: Arc<MeasurementLog>,
    listener_lost: bool,
    packets_sent: usize,
}

impl SweepDriver {
    pub fn new(
        cfg: SweepConfig,
        clock: Arc<dyn Clock>,
        sink: Box<dyn PacketSink>,
        handoff: SyncSender<Handoff>,
        log: Arc<MeasurementLog>,
    ) -> SweepDriver {
        SweepDriver {
            cfg,
            clock,
            sink,
            handoff,
            log,
            listener_lost: false,
            packets_sent: 0,
        }
    }

    /// runs the full sweep and prints the report; returns the number of
    /// packets transmitted
    pub fn run(&mut self) -> usize {
        let payload = pattern_payload(self.cfg.max_size);
        // in burst mode one staged handoff covers a whole size's packets
        let stage_per_packet = self.cfg.mode != AggregationMode::Burst;

        println!("START");

        let mut expected_samples = 0_usize;
        for (size_idx, size) in self.cfg.sizes().enumerate() {
            if !is_alive() {
                break;
            }
            log::debug!("sweeping size {} ({} packet(s))", size, self.cfg.num_packets);

            if !stage_per_packet {
                self.stage(size_idx, 0);
            }
            for packet_idx in 0..self.cfg.num_packets {
                if !is_alive() {
                    break;
                }
                if stage_per_packet {
                    self.stage(size_idx, packet_idx);
                }
                match self.sink.send(&payload[..size]) {
                    Ok(_) => self.packets_sent += 1,
                    Err(e) => log::debug!("unable to transmit a {}-byte packet: {}", size, e),
                }
                if self.cfg.delay_packet_us > 0 {
                    self.clock.sleep_us(self.cfg.delay_packet_us);
                }
            }

            match self.cfg.mode {
                AggregationMode::PerPacket => {
                    expected_samples += self.cfg.num_packets;
                    self.drain(expected_samples);
                    print_samples(&self.log.row(size_idx));
                }
                AggregationMode::Burst | AggregationMode::Sum => {
                    expected_samples += 1;
                }
            }

            if self.cfg.delay_size_us > 0 {
                self.clock.sleep_us(self.cfg.delay_size_us);
            }
        }

        if self.cfg.mode != AggregationMode::PerPacket {
            self.drain(expected_samples);
            print_samples(&self.log.buckets());
        }

        println!("DONE");
        self.packets_sent
    }

    /// captures "now" and stages it for the listener, immediately before the
    /// matching transmit; waits (bounded) for the previous staging to be
    /// consumed so that at most one is in flight
    fn stage(&mut self, size_idx: usize, packet_idx: usize) {
        if self.listener_lost {
            return;
        }
        let deadline = Instant::now() + HANDOFF_TIMEOUT;
        loop {
            let staged = Handoff {
                size_idx,
                packet_idx,
                start_us: self.clock.now_us(),
            };
            match self.handoff.try_send(staged) {
                Ok(()) => return,
                Err(TrySendError::Full(_)) => {
                    if Instant::now() >= deadline {
                        log::debug!(
                            "previous handoff never consumed; size {} packet {} will not be timed individually",
                            size_idx,
                            packet_idx
                        );
                        return;
                    }
                    thread::sleep(HANDOFF_POLL);
                }
                Err(TrySendError::Disconnected(_)) => {
                    log::warn!("no listener present; transmitting without measurement");
                    self.listener_lost = true;
                    return;
                }
            }
        }
    }

    /// waits for the listener to catch up before a report is printed;
    /// skipped outright when no listener exists
    fn drain(&self, expected_samples: usize) {
        if self.listener_lost {
            return;
        }
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while self.log.recorded() < expected_samples && Instant::now() < deadline {
            thread::sleep(DRAIN_POLL);
        }
        let recorded = self.log.recorded();
        if recorded < expected_samples {
            log::debug!(
                "only {} of {} samples recorded before the report deadline",
                recorded,
                expected_samples
            );
        }
    }
}

/// one report line: every value is preceded by a single space
fn print_samples(samples: &[u64]) {
    let mut line = String::new();
    for value in samples {
        line.push(' ');
        line.push_str(&value.to_string());
    }
    println!("{}", line);
}
