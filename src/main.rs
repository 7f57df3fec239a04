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

use std::sync::{Arc, Mutex};
use std::time::Instant;

use clap::Parser;

use udpsweep::args::Args;
use udpsweep::clock::{Clock, MonotonicClock};
use udpsweep::config;
use udpsweep::listener;
use udpsweep::measure::{handoff_channel, MeasurementLog};
use udpsweep::results::{self, RunSummary};
use udpsweep::sweep::{self, SweepDriver};
use udpsweep::transport::UdpSink;
use udpsweep::utils::cpu_affinity::CpuAffinityManager;
use udpsweep::BoxResult;

const LISTENER_STARTUP_GRACE: std::time::Duration = std::time::Duration::from_millis(10);

fn main() {
    let args = Args::parse();

    let mut env = env_logger::Env::default();
    if args.debug {
        env = env.filter_or("RUST_LOG", "debug");
    } else {
        env = env.filter_or("RUST_LOG", "info");
    }
    env_logger::init_from_env(env);

    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> BoxResult<()> {
    let cfg = config::prepare_sweep(args)?;
    log::info!(
        "{} packet(s) per size, payloads [{}, {}) step {}, {:?} aggregation, destination {}",
        cfg.num_packets,
        cfg.min_size,
        cfg.max_size,
        cfg.step_size,
        cfg.mode,
        cfg.remote
    );

    ctrlc2::set_handler(move || {
        if sweep::kill() {
            log::warn!("interrupt received; ending the sweep after the current packet");
        } else {
            log::warn!("forcing shutdown immediately");
            std::process::exit(3);
        }
        true
    })
    .expect("unable to set SIGINT handler");

    let cpu_affinity_manager = Arc::new(Mutex::new(CpuAffinityManager::new(&args.affinity)?));
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let measurement_log = Arc::new(MeasurementLog::for_config(&cfg));
    let (handoff_tx, handoff_rx) = handoff_channel();

    // fire-and-forget: a listener that fails to start is reported and the
    // sweep proceeds regardless
    if let Err(e) = listener::start(
        &cfg,
        Arc::clone(&clock),
        handoff_rx,
        Arc::clone(&measurement_log),
        Arc::clone(&cpu_affinity_manager),
    ) {
        log::error!("unable to start the listener thread: {}", e);
    }

    cpu_affinity_manager.lock().unwrap().set_affinity();

    // the listener binds its socket inside its own thread; give it a moment
    // so the sweep's first packets have somewhere to land
    std::thread::sleep(LISTENER_STARTUP_GRACE);

    let sink = UdpSink::new(cfg.remote, cfg.send_buffer)?;
    let mut driver = SweepDriver::new(
        cfg.clone(),
        Arc::clone(&clock),
        Box::new(sink),
        handoff_tx,
        Arc::clone(&measurement_log),
    );

    let started_at = Instant::now();
    let packets_sent = driver.run();
    let duration_seconds = started_at.elapsed().as_secs_f32();

    log::info!(
        "sweep complete: {} packets sent, {} samples recorded in {:.3}s",
        packets_sent,
        measurement_log.recorded(),
        duration_seconds
    );

    if args.json {
        results::emit(&RunSummary::new(&cfg, &measurement_log, packets_sent, duration_seconds))?;
    }
    Ok(())
}
