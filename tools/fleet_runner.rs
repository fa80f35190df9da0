// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Headless fleet runner.
//!
//! Loads `robofleet.toml`, starts every activated robot, drives the motion
//! tick hook at a fixed rate for a bounded duration (or until Ctrl-C), then
//! stops the fleet and prints channel and tick counters.

use std::collections::HashMap;
use std::env;
use std::future::Future;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use robofleet::config::{load_config, validate_config};
use robofleet::ingest::{
    ActuationError, ActuationSink, FleetSupervisor, JointAngles, ManualClock, TracingDiagnostics,
};
use robofleet::observability::{
    debug_flags_help, init_console_logging, parse_debug_flags, LoggingConfig,
};
use tracing::{debug, error, info, warn};

struct Options {
    config_path: Option<PathBuf>,
    overrides: HashMap<String, String>,
    duration: Duration,
    tick_hz: f64,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: fleet_runner [--config <path>] [--duration-secs <n>] [--tick-hz <n>] [--set key=value]...\n\n\
         Defaults:\n\
         - config: $ROBOFLEET_CONFIG_PATH or ./robofleet.toml (searched upward)\n\
         - duration-secs: 10\n\
         - tick-hz: 60\n\n{}",
        debug_flags_help()
    );
    process::exit(2);
}

fn parse_number(flag: &str, value: Option<String>) -> f64 {
    let value = value.unwrap_or_else(|| usage_and_exit());
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => n,
        _ => {
            eprintln!("{flag} expects a positive number, got {value}");
            usage_and_exit();
        }
    }
}

fn parse_args() -> Options {
    let mut options = Options {
        config_path: None,
        overrides: HashMap::new(),
        duration: Duration::from_secs(10),
        tick_hz: 60.0,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                options.config_path = Some(PathBuf::from(v));
            }
            "--duration-secs" => {
                options.duration = Duration::from_secs_f64(parse_number(&arg, args.next()));
            }
            "--tick-hz" => options.tick_hz = parse_number(&arg, args.next()),
            "--set" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                let Some((key, value)) = v.split_once('=') else {
                    eprintln!("--set expects key=value, got {v}");
                    usage_and_exit();
                };
                options.overrides.insert(key.to_string(), value.to_string());
            }
            "-h" | "--help" => usage_and_exit(),
            // handled by parse_debug_flags
            other if other.starts_with("--debug-") => {}
            other => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
        }
    }

    options
}

/// Stand-in articulation layer: logs targets and counts them
#[derive(Default)]
struct LoggingActuation {
    applied: AtomicU64,
}

impl ActuationSink for LoggingActuation {
    fn apply_joint_target(&self, robot_name: &str, joints: &JointAngles) -> Result<(), ActuationError> {
        self.applied.fetch_add(1, Ordering::Relaxed);
        debug!("[RUNNER] {} -> {:?}", robot_name, joints);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let options = parse_args();
    let debug_flags = parse_debug_flags();

    let config = load_config(options.config_path.as_deref(), Some(&options.overrides))
        .unwrap_or_else(|e| {
            eprintln!("Failed to load configuration: {e}");
            process::exit(2);
        });
    if let Err(e) = validate_config(&config) {
        eprintln!("Invalid configuration: {e}");
        process::exit(2);
    }

    let level = if config.system.debug {
        "debug".to_string()
    } else {
        config.system.log_level.clone()
    };
    if let Err(e) = init_console_logging(&debug_flags, &LoggingConfig::default().with_level(level)) {
        eprintln!("Warning: {e}");
    }

    let clock = Arc::new(ManualClock::new());
    let actuation = Arc::new(LoggingActuation::default());
    let mut fleet = FleetSupervisor::new(
        config.clone(),
        clock.clone(),
        actuation.clone(),
        Arc::new(TracingDiagnostics),
    );

    let report = match fleet.start(&config).await {
        Ok(report) => report,
        Err(e) => {
            error!("[RUNNER] start failed: {}", e);
            process::exit(1);
        }
    };
    if report.registered.is_empty() {
        error!("[RUNNER] no robots registered, nothing to run");
        process::exit(1);
    }
    if let Some(failed) = &report.failed {
        warn!(
            "[RUNNER] running without {} and {} unprocessed robots",
            failed,
            report.aborted.len()
        );
    }

    info!(
        "[RUNNER] ticking at {} Hz for {:?} (Ctrl-C to stop early)",
        options.tick_hz, options.duration
    );
    if drive_clock(&clock, options.tick_hz, options.duration, tokio::signal::ctrl_c()).await {
        info!("[RUNNER] interrupted");
    }

    let channel = fleet.channel_stats();
    let ticks = fleet.tick_stats();
    let live = fleet.live_workers();

    if let Err(e) = fleet.shutdown().await {
        error!("[RUNNER] shutdown failed: {}", e);
    }

    info!(
        "[RUNNER] ticks={} applied={} idle={} failures={} live_at_end={:?}",
        ticks.ticks,
        actuation.applied.load(Ordering::Relaxed),
        ticks.idle,
        ticks.failures(),
        live
    );
    if let Some(channel) = channel {
        info!(
            "[RUNNER] channel capacity={} offered={} accepted={} dropped={} replaced={} hwm={}",
            channel.capacity,
            channel.offered,
            channel.accepted,
            channel.dropped,
            channel.replaced,
            channel.high_watermark
        );
    }
}

/// Tick `clock` at `tick_hz` until `duration` elapses or `interrupt`
/// resolves. Returns true when interrupted.
async fn drive_clock<F>(clock: &ManualClock, tick_hz: f64, duration: Duration, interrupt: F) -> bool
where
    F: Future,
{
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / tick_hz));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let run_for = tokio::time::sleep(duration);
    tokio::pin!(run_for);
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut run_for => return false,
            _ = &mut interrupt => return true,
            _ = interval.tick() => {
                clock.tick();
            }
        }
    }
}
