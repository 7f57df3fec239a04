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

use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Mutex;

use crate::config::{AggregationMode, SweepConfig};

/// one staged transmit, handed from the sweep loop to the listener right
/// before the packet leaves
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handoff {
    pub size_idx: usize,
    pub packet_idx: usize,
    pub start_us: u64,
}

/// the single-slot handoff between sender and listener; capacity 1 keeps the
/// at-most-one-in-flight assumption explicit
pub fn handoff_channel() -> (SyncSender<Handoff>, Receiver<Handoff>) {
    sync_channel(1)
}

/// folds observed elapsed times into samples; selected once at
/// configuration time
pub trait Aggregation: Send {
    /// records one elapsed time; returns a finished sample when a slot
    /// boundary is crossed
    fn record(&mut self, elapsed_us: u64) -> Option<u64>;

    /// true when the next record() call will cross a slot boundary
    fn at_boundary(&self) -> bool;

    /// true when every packet carries its own staged handoff; false when one
    /// handoff covers a whole burst
    fn handoff_per_packet(&self) -> bool;
}

pub fn aggregation_for(mode: AggregationMode, num_packets: usize) -> Box<dyn Aggregation> {
    match mode {
        AggregationMode::PerPacket => Box::new(PerPacket),
        AggregationMode::Burst => Box::new(BurstLast::new(num_packets)),
        AggregationMode::Sum => Box::new(BurstSum::new(num_packets)),
    }
}

/// every packet is its own sample
pub struct PerPacket;

impl Aggregation for PerPacket {
    fn record(&mut self, elapsed_us: u64) -> Option<u64> {
        Some(elapsed_us)
    }

    fn at_boundary(&self) -> bool {
        true
    }

    fn handoff_per_packet(&self) -> bool {
        true
    }
}

/// one sample per burst: the elapsed time observed at the burst's last
/// packet, measured from the burst's shared start
pub struct BurstLast {
    reps: usize,
    seen: usize,
}

impl BurstLast {
    pub fn new(reps: usize) -> BurstLast {
        BurstLast { reps, seen: 0 }
    }
}

impl Aggregation for BurstLast {
    fn record(&mut self, elapsed_us: u64) -> Option<u64> {
        self.seen += 1;
        if self.seen == self.reps {
            self.seen = 0;
            Some(elapsed_us)
        } else {
            None
        }
    }

    fn at_boundary(&self) -> bool {
        self.seen + 1 == self.reps
    }

    fn handoff_per_packet(&self) -> bool {
        false
    }
}

/// one sample per burst: the sum of the individual elapsed times
pub struct BurstSum {
    reps: usize,
    seen: usize,
    acc: u64,
}

impl BurstSum {
    pub fn new(reps: usize) -> BurstSum {
        BurstSum { reps, seen: 0, acc: 0 }
    }
}

impl Aggregation for BurstSum {
    fn record(&mut self, elapsed_us: u64) -> Option<u64> {
        self.seen += 1;
        self.acc += elapsed_us;
        if self.seen == self.reps {
            self.seen = 0;
            let total = self.acc;
            self.acc = 0;
            Some(total)
        } else {
            None
        }
    }

    fn at_boundary(&self) -> bool {
        self.seen + 1 == self.reps
    }

    fn handoff_per_packet(&self) -> bool {
        true
    }
}

/// the shared sample table: one row per swept size, written by the listener,
/// read by the driver when it reports
pub struct MeasurementLog {
    rows: Mutex<Vec<Vec<u64>>>,
    recorded: AtomicUsize,
}

impl MeasurementLog {
    pub fn new(size_count: usize, slots_per_size: usize) -> MeasurementLog {
        MeasurementLog {
            rows: Mutex::new(vec![vec![0_u64; slots_per_size]; size_count]),
            recorded: AtomicUsize::new(0),
        }
    }

    pub fn for_config(cfg: &SweepConfig) -> MeasurementLog {
        MeasurementLog::new(cfg.size_count(), cfg.slots_per_size())
    }

    pub fn store(&self, size_idx: usize, slot: usize, value_us: u64) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(cell) = rows.get_mut(size_idx).and_then(|row| row.get_mut(slot)) {
            *cell = value_us;
            self.recorded.fetch_add(1, Relaxed);
        } else {
            log::debug!("sample for size {} slot {} has no storage; dropped", size_idx, slot);
        }
    }

    /// total samples stored so far; cheap enough for the driver's settle poll
    pub fn recorded(&self) -> usize {
        self.recorded.load(Relaxed)
    }

    pub fn row(&self, size_idx: usize) -> Vec<u64> {
        self.rows.lock().unwrap().get(size_idx).cloned().unwrap_or_default()
    }

    pub fn rows(&self) -> Vec<Vec<u64>> {
        self.rows.lock().unwrap().clone()
    }

    /// first slot of every row, in sweep order; the per-size report shape
    pub fn buckets(&self) -> Vec<u64> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .map(|row| row.first().copied().unwrap_or(0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_packet_flushes_every_sample() {
        let mut policy = PerPacket;
        assert!(policy.at_boundary());
        assert_eq!(policy.record(42), Some(42));
        assert_eq!(policy.record(7), Some(7));
    }

    #[test]
    fn test_burst_last_flushes_only_at_the_repetition_boundary() {
        let mut policy = BurstLast::new(3);
        assert!(!policy.at_boundary());
        assert_eq!(policy.record(10), None);
        assert_eq!(policy.record(20), None);
        assert!(policy.at_boundary());
        assert_eq!(policy.record(30), Some(30));
        // counter reset: the next burst behaves identically
        assert_eq!(policy.record(40), None);
        assert_eq!(policy.record(50), None);
        assert_eq!(policy.record(60), Some(60));
    }

    #[test]
    fn test_burst_sum_accumulates_and_resets() {
        let mut policy = BurstSum::new(3);
        assert_eq!(policy.record(5), None);
        assert_eq!(policy.record(7), None);
        assert_eq!(policy.record(9), Some(21));
        assert_eq!(policy.record(1), None);
        assert_eq!(policy.record(1), None);
        assert_eq!(policy.record(1), Some(3));
    }

    #[test]
    fn test_single_packet_bursts_flush_immediately() {
        let mut last = BurstLast::new(1);
        assert!(last.at_boundary());
        assert_eq!(last.record(11), Some(11));

        let mut sum = BurstSum::new(1);
        assert_eq!(sum.record(11), Some(11));
    }

    #[test]
    fn test_log_counts_and_returns_samples() {
        let log = MeasurementLog::new(2, 3);
        log.store(0, 0, 100);
        log.store(0, 2, 300);
        log.store(1, 1, 200);
        assert_eq!(log.recorded(), 3);
        assert_eq!(log.row(0), vec![100, 0, 300]);
        assert_eq!(log.buckets(), vec![100, 0]);
    }

    #[test]
    fn test_log_drops_out_of_range_samples() {
        let log = MeasurementLog::new(1, 1);
        log.store(5, 0, 1);
        log.store(0, 5, 1);
        assert_eq!(log.recorded(), 0);
        assert_eq!(log.row(0), vec![0]);
    }

    #[test]
    fn test_handoff_channel_is_single_slot() {
        let (tx, rx) = handoff_channel();
        let first = Handoff {
            size_idx: 0,
            packet_idx: 0,
            start_us: 1,
        };
        let second = Handoff {
            size_idx: 0,
            packet_idx: 1,
            start_us: 2,
        };
        tx.try_send(first).unwrap();
        assert!(tx.try_send(second).is_err());
        assert_eq!(rx.try_recv().unwrap(), first);
        tx.try_send(second).unwrap();
        assert_eq!(rx.try_recv().unwrap(), second);
    }
}
