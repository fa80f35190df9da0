// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-robot motion reader
//!
//! A [`MotionSource`] owns one TCP session to a controller's motion port. It
//! runs on a dedicated thread, decodes telemetry into [`MotionSample`]s and
//! offers them to the shared [`MotionChannel`]. Reads are bounded by the
//! configured read timeout, which is also how quickly a worker notices a
//! stop request.

use crate::channel::MotionChannel;
use crate::diagnostics::{self, DiagnosticsSink, FleetDiagnostic};
use crate::error::{IngestError, Result};
use crate::protocol::{self, FrameDecoder, Telemetry};
use crate::sample::MotionSample;
use robofleet_config::{FleetConfig, RobotConfig};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Timeouts and limits for one session
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub model_query_timeout: Duration,
    pub max_consecutive_io_errors: u32,
    pub read_buffer_bytes: usize,
}

impl SourceSettings {
    pub fn from_config(config: &FleetConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.timeouts.probe_timeout_ms),
            read_timeout: Duration::from_millis(config.timeouts.read_timeout_ms),
            model_query_timeout: Duration::from_millis(config.timeouts.model_query_timeout_ms),
            max_consecutive_io_errors: config.worker.max_consecutive_io_errors,
            read_buffer_bytes: config.worker.read_buffer_bytes,
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self::from_config(&FleetConfig::default())
    }
}

/// Cooperative cancellation flag, checked between reads
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_signalled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Why a read loop returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Cancelled,
    SessionLost(String),
}

pub struct MotionSource {
    robot_name: Arc<str>,
    endpoint: String,
    stream: TcpStream,
    decoder: FrameDecoder,
    read_buffer: Vec<u8>,
    settings: SourceSettings,
}

impl MotionSource {
    /// Open the motion session; `port` already has per-robot overrides applied
    pub fn connect(robot: &RobotConfig, port: u16, settings: SourceSettings) -> Result<Self> {
        let endpoint = format!("{}:{}", robot.address, port);
        let addr = (robot.address.as_str(), port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                IngestError::Io(io::Error::new(
                    ErrorKind::NotFound,
                    format!("no resolved addresses for {}", endpoint),
                ))
            })?;

        let stream = TcpStream::connect_timeout(&addr, settings.connect_timeout)?;
        // a zero read timeout is rejected by the OS
        stream.set_read_timeout(Some(settings.read_timeout.max(Duration::from_millis(1))))?;
        stream.set_nodelay(true)?;

        debug!("[MOTION] {} connected to {}", robot.name, endpoint);

        Ok(Self {
            robot_name: Arc::from(robot.name.as_str()),
            endpoint,
            stream,
            decoder: FrameDecoder::default(),
            read_buffer: vec![0; settings.read_buffer_bytes.max(1)],
            settings,
        })
    }

    pub fn robot_name(&self) -> &str {
        &self.robot_name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ask the controller for its model.
    ///
    /// Returns `Ok(None)` if no answer arrives within the model query timeout.
    /// Telemetry that arrives before the answer is discarded.
    pub fn query_model(&mut self) -> Result<Option<String>> {
        self.stream.write_all(&protocol::encode_model_query())?;
        let deadline = Instant::now() + self.settings.model_query_timeout;

        loop {
            while let Some(result) = self.decoder.next_frame() {
                match result.and_then(|frame| protocol::parse_telemetry(&frame)) {
                    Ok(Telemetry {
                        robot_model: Some(model),
                        ..
                    }) => return Ok(Some(model)),
                    Ok(_) => {}
                    Err(e) => debug!("[MOTION] {}: ignoring frame during model query: {}", self.robot_name, e),
                }
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }

            match self.read_chunk() {
                Ok(0) => {
                    return Err(IngestError::Io(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "controller closed the session during model query",
                    )))
                }
                Ok(_) => {}
                Err(e) if is_transient(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read until cancelled or the session is lost
    pub fn run(mut self, channel: &MotionChannel, stop: &StopSignal) -> WorkerExit {
        let mut consecutive_errors: u32 = 0;
        let mut dropped: u64 = 0;

        // frames that arrived alongside the model answer
        self.drain_frames(channel, &mut dropped);

        loop {
            if stop.is_signalled() {
                return WorkerExit::Cancelled;
            }

            match self.read_chunk() {
                Ok(0) => {
                    self.drain_frames(channel, &mut dropped);
                    return WorkerExit::SessionLost("controller closed the connection".to_string());
                }
                Ok(_) => consecutive_errors = 0,
                Err(e) if is_transient(&e) => continue,
                Err(e) if is_session_loss(&e) => return WorkerExit::SessionLost(e.to_string()),
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(
                        "[MOTION] {}: read error ({} consecutive): {}",
                        self.robot_name, consecutive_errors, e
                    );
                    if consecutive_errors >= self.settings.max_consecutive_io_errors {
                        return WorkerExit::SessionLost(format!(
                            "{} consecutive read errors, last: {}",
                            consecutive_errors, e
                        ));
                    }
                    continue;
                }
            }

            self.drain_frames(channel, &mut dropped);
        }
    }

    fn read_chunk(&mut self) -> io::Result<usize> {
        let n = self.stream.read(&mut self.read_buffer)?;
        self.decoder.push(&self.read_buffer[..n]);
        Ok(n)
    }

    fn drain_frames(&mut self, channel: &MotionChannel, dropped: &mut u64) {
        while let Some(result) = self.decoder.next_frame() {
            let telemetry = match result.and_then(|frame| protocol::parse_telemetry(&frame)) {
                Ok(telemetry) => telemetry,
                Err(e) => {
                    warn!("[MOTION] {}: discarding frame: {}", self.robot_name, e);
                    continue;
                }
            };
            let Some(joints) = telemetry.joint_angles else {
                continue;
            };

            let sample = MotionSample::new(Arc::clone(&self.robot_name), joints, telemetry.digital_outputs);
            if channel.offer(sample).is_loss() {
                *dropped += 1;
                if *dropped == 1 || *dropped % 100 == 0 {
                    debug!(
                        "[MOTION] {}: channel full, {} samples lost so far",
                        self.robot_name, dropped
                    );
                }
            }
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

fn is_session_loss(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
    )
}

/// Supervisor-side record of one robot's worker
pub struct WorkerHandle {
    config: RobotConfig,
    stop: StopSignal,
    live: Arc<AtomicBool>,
    reported_model: Option<String>,
    thread: Option<JoinHandle<WorkerExit>>,
}

impl WorkerHandle {
    /// Start the read loop on a thread named `motion-<robot>`
    pub fn spawn(
        config: RobotConfig,
        source: MotionSource,
        reported_model: Option<String>,
        channel: Arc<MotionChannel>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self> {
        let stop = StopSignal::new();
        let live = Arc::new(AtomicBool::new(true));

        let robot = config.name.clone();
        let thread_stop = stop.clone();
        let thread_live = Arc::clone(&live);

        let thread = thread::Builder::new()
            .name(format!("motion-{}", config.name.replace('\0', "")))
            .spawn(move || {
                info!("[MOTION] worker started for {} ({})", robot, source.endpoint());
                let exit = source.run(&channel, &thread_stop);
                thread_live.store(false, Ordering::Release);

                match &exit {
                    WorkerExit::SessionLost(reason) if !thread_stop.is_signalled() => {
                        diagnostics::emit(
                            sink.as_ref(),
                            FleetDiagnostic::WorkerTerminated {
                                robot: robot.clone(),
                                reason: reason.clone(),
                            },
                        );
                    }
                    _ => debug!("[MOTION] worker for {} stopped", robot),
                }
                exit
            })
            .map_err(|e| IngestError::Spawn {
                robot: config.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            config,
            stop,
            live,
            reported_model,
            thread: Some(thread),
        })
    }

    /// Registered robot whose session could not be opened
    pub fn not_started(config: RobotConfig) -> Self {
        Self {
            config,
            stop: StopSignal::new(),
            live: Arc::new(AtomicBool::new(false)),
            reported_model: None,
            thread: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub fn reported_model(&self) -> Option<&str> {
        self.reported_model.as_deref()
    }

    /// Fire cancellation without waiting
    pub fn signal_stop(&self) {
        self.stop.signal();
        self.live.store(false, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Reap the thread if it has exited; `None` while it is still running
    pub fn try_join(&mut self) -> Option<WorkerExit> {
        if !self.is_finished() {
            return None;
        }
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(exit) => Some(exit),
            Err(_) => Some(WorkerExit::SessionLost("worker thread panicked".to_string())),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop.signal();
    }
}
