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

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::config::{AggregationMode, SweepConfig};
use crate::measure::MeasurementLog;
use crate::BoxResult;

pub fn get_unix_timestamp() -> f64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs_f64(),
        Err(_) => 0.0,
    }
}

/// machine-readable record of one completed sweep, emitted with --json
#[derive(Clone, Serialize, Debug)]
pub struct RunSummary {
    pub kind: &'static str,
    pub test_id: uuid::Uuid,
    pub timestamp: f64,
    pub timestamp_str: String,
    pub mode: AggregationMode,
    pub num_packets: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub step_size: usize,
    pub remote: String,
    pub port: u16,
    pub packets_sent: usize,
    pub samples_recorded: usize,
    pub duration_seconds: f32,
    /// one row per swept size, in sweep order; microseconds
    pub samples: Vec<Vec<u64>>,
}

impl RunSummary {
    pub fn new(cfg: &SweepConfig, log: &MeasurementLog, packets_sent: usize, duration_seconds: f32) -> RunSummary {
        RunSummary {
            kind: "sweep-summary",
            test_id: uuid::Uuid::new_v4(),
            timestamp: get_unix_timestamp(),
            timestamp_str: chrono::Utc::now().to_rfc3339(),
            mode: cfg.mode,
            num_packets: cfg.num_packets,
            min_size: cfg.min_size,
            max_size: cfg.max_size,
            step_size: cfg.step_size,
            remote: cfg.remote.to_string(),
            port: cfg.port,
            packets_sent,
            samples_recorded: log.recorded(),
            duration_seconds,
            samples: log.rows(),
        }
    }
}

/// writes the summary as one JSON line on stdout, after the DONE marker
pub fn emit(summary: &RunSummary) -> BoxResult<()> {
    println!("{}", serde_json::to_string(summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Args;
    use crate::config::prepare_sweep;
    use clap::Parser;

    #[test]
    fn test_summary_serializes_the_sample_table() {
        let args = Args::parse_from(["udpsweep", "--loopback", "--min-size", "10", "--max-size", "30", "--num-packets", "2"]);
        let cfg = prepare_sweep(&args).unwrap();
        let log = MeasurementLog::for_config(&cfg);
        log.store(0, 0, 11);
        log.store(0, 1, 13);
        log.store(1, 0, 17);

        let summary = RunSummary::new(&cfg, &log, 4, 0.25);
        let value = serde_json::to_value(&summary).unwrap();

        assert_eq!(value["kind"], "sweep-summary");
        assert_eq!(value["mode"], "per-packet");
        assert_eq!(value["num_packets"], 2);
        assert_eq!(value["packets_sent"], 4);
        assert_eq!(value["samples_recorded"], 3);
        assert_eq!(value["samples"], serde_json::json!([[11, 13], [17, 0]]));
    }

    #[test]
    fn test_unix_timestamp_is_sane() {
        // after 2020, before 2100
        let now = get_unix_timestamp();
        assert!(now > 1_577_836_800.0);
        assert!(now < 4_102_444_800.0);
    }
}
