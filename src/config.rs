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

use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::args::Args;
use crate::Result;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationMode {
    /// every packet's own elapsed time lands in its own slot
    PerPacket,
    /// one value per size: the elapsed time of the whole burst, taken at its last packet
    Burst,
    /// one value per size: the summed elapsed times of the burst's packets
    Sum,
}

/// the complete, immutable description of one sweep run; built once at
/// startup and shared by the driver and the listener
#[derive(Clone, Debug, Serialize)]
pub struct SweepConfig {
    pub num_packets: usize,
    pub min_size: usize,
    /// exclusive upper bound of the swept payload sizes
    pub max_size: usize,
    pub step_size: usize,
    pub delay_packet_us: u64,
    pub delay_size_us: u64,
    pub mode: AggregationMode,
    pub remote: SocketAddr,
    pub port: u16,
    pub receive_buffer: usize,
    pub send_buffer: usize,
}

impl SweepConfig {
    /// the swept payload sizes, in transmit order: [min_size, max_size)
    pub fn sizes(&self) -> impl Iterator<Item = usize> {
        (self.min_size..self.max_size).step_by(self.step_size)
    }

    pub fn size_count(&self) -> usize {
        if self.max_size <= self.min_size {
            0
        } else {
            (self.max_size - self.min_size + self.step_size - 1) / self.step_size
        }
    }

    pub fn slots_per_size(&self) -> usize {
        match self.mode {
            AggregationMode::PerPacket => self.num_packets,
            AggregationMode::Burst | AggregationMode::Sum => 1,
        }
    }
}

fn validate_num_packets(num_packets: usize) -> usize {
    if num_packets > 0 {
        num_packets
    } else {
        log::warn!("packet count not specified; defaulting to 1 per size");
        1
    }
}

fn validate_step_size(step_size: usize) -> usize {
    if step_size > 0 {
        step_size
    } else {
        log::warn!("step size must be non-zero; defaulting to 10");
        10
    }
}

fn validate_range(min_size: usize, max_size: usize) {
    if max_size <= min_size {
        log::warn!(
            "sweep range [{}, {}) is empty; nothing will be transmitted",
            min_size,
            max_size
        );
    }
}

/// resolves the destination address; only the non-loopback path can fail
fn resolve_remote(args: &Args) -> Result<IpAddr> {
    if args.loopback {
        Ok(IpAddr::V6(Ipv6Addr::LOCALHOST))
    } else {
        Ok(args.remote.parse()?)
    }
}

/// folds the raw arguments into the immutable sweep description
pub fn prepare_sweep(args: &Args) -> Result<SweepConfig> {
    let remote_ip = resolve_remote(args)?;
    let step_size = validate_step_size(args.step_size);
    validate_range(args.min_size, args.max_size);

    Ok(SweepConfig {
        num_packets: validate_num_packets(args.num_packets),
        min_size: args.min_size,
        max_size: args.max_size,
        step_size,
        delay_packet_us: args.delay_packet_us,
        delay_size_us: args.delay_size_us,
        mode: args.mode,
        remote: SocketAddr::new(remote_ip, args.port),
        port: args.port,
        receive_buffer: args.receive_buffer,
        send_buffer: args.send_buffer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["udpsweep"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_sweep_sizes_are_half_open() {
        let args = parse(&["--loopback", "--min-size", "10", "--max-size", "50", "--step-size", "10"]);
        let cfg = prepare_sweep(&args).unwrap();
        let sizes: Vec<usize> = cfg.sizes().collect();
        assert_eq!(sizes, vec![10, 20, 30, 40]);
        assert_eq!(cfg.size_count(), sizes.len());
    }

    #[test]
    fn test_default_range_has_121_sizes() {
        let args = parse(&["--loopback"]);
        let cfg = prepare_sweep(&args).unwrap();
        assert_eq!(cfg.size_count(), 121);
        assert_eq!(cfg.sizes().last(), Some(1210));
    }

    #[test]
    fn test_zero_packet_count_defaults_to_one() {
        let args = parse(&["--loopback", "--num-packets", "0"]);
        let cfg = prepare_sweep(&args).unwrap();
        assert_eq!(cfg.num_packets, 1);
    }

    #[test]
    fn test_unparseable_remote_is_an_error() {
        let args = parse(&["--remote", "not-an-address"]);
        assert!(prepare_sweep(&args).is_err());
    }

    #[test]
    fn test_loopback_ignores_the_remote_string() {
        let args = parse(&["--loopback", "--remote", "not-an-address"]);
        let cfg = prepare_sweep(&args).unwrap();
        assert_eq!(cfg.remote.ip(), IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(cfg.remote.port(), 9);
    }

    #[test]
    fn test_empty_range_counts_zero_sizes() {
        let args = parse(&["--loopback", "--min-size", "100", "--max-size", "100"]);
        let cfg = prepare_sweep(&args).unwrap();
        assert_eq!(cfg.size_count(), 0);
        assert_eq!(cfg.sizes().count(), 0);
    }

    #[test]
    fn test_slots_per_size_follows_the_mode() {
        let args = parse(&["--loopback", "--num-packets", "8"]);
        let cfg = prepare_sweep(&args).unwrap();
        assert_eq!(cfg.slots_per_size(), 8);

        let args = parse(&["--loopback", "--num-packets", "8", "--mode", "sum"]);
        let cfg = prepare_sweep(&args).unwrap();
        assert_eq!(cfg.slots_per_size(), 1);
    }
}
