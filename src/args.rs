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

use clap::Parser;

use crate::config::AggregationMode;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "measures UDP round-trip latency across a sweep of datagram sizes")]
pub struct Args {
    /// number of packets to send at each payload size
    #[arg(short = 'n', long, default_value_t = 1)]
    pub num_packets: usize,

    /// smallest payload size, in bytes (inclusive)
    #[arg(long, default_value_t = 10)]
    pub min_size: usize,

    /// payload size at which the sweep stops, in bytes (exclusive)
    #[arg(long, default_value_t = 1211)]
    pub max_size: usize,

    /// payload-size increment between sweep steps
    #[arg(long, default_value_t = 10)]
    pub step_size: usize,

    /// pause between consecutive packets, in microseconds
    #[arg(long, default_value_t = 0)]
    pub delay_packet_us: u64,

    /// pause between payload sizes, in microseconds
    #[arg(long, default_value_t = 0)]
    pub delay_size_us: u64,

    /// how observed latencies are aggregated into samples
    #[arg(short, long, value_enum, default_value_t = AggregationMode::PerPacket)]
    pub mode: AggregationMode,

    /// send to the local host instead of a remote peer
    #[arg(short, long)]
    pub loopback: bool,

    /// address of the peer the swept packets are sent to (ignored with --loopback)
    #[arg(short, long, default_value = "2001:cafe:0:2:222:64af:126b:8a14")]
    pub remote: String,

    /// UDP port used for both the listener and the destination
    #[arg(short, long, default_value_t = 9)]
    pub port: u16,

    /// size of the listener's receive buffer, in bytes (0 = OS default)
    #[arg(long, default_value_t = 0)]
    pub receive_buffer: usize,

    /// size of the sender's send buffer, in bytes (0 = OS default)
    #[arg(long, default_value_t = 0)]
    pub send_buffer: usize,

    /// comma-separated list of CPU cores to which the sweep and listener threads are pinned
    #[arg(short = 'A', long, default_value = "")]
    pub affinity: String,

    /// emit a JSON summary of the run after the sweep completes
    #[arg(long)]
    pub json: bool,

    /// log debug-level detail
    #[arg(short, long)]
    pub debug: bool,
}
