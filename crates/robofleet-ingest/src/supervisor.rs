// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fleet lifecycle: Idle -> Starting -> Running -> Stopping -> Idle
//!
//! `start` and `stop` take `&mut self`, so they can never overlap for one
//! supervisor. Their only suspension points are the blocking probe and
//! session-open calls (moved to the blocking pool) and the optional bounded
//! join at stop.
//!
//! Start is fail-fast: the first robot whose motion port is unreachable ends
//! the sequence, and robots validated before it stay registered. Stop fires
//! every cancellation signal and returns without waiting unless a join
//! timeout is configured.

use crate::channel::{ChannelStats, MotionChannel};
use crate::clock::SimulationClock;
use crate::config_source::RobotConfigSource;
use crate::consumer::{ActuationSink, StepConsumer, TickStats, TickStatsSnapshot};
use crate::diagnostics::{self, DiagnosticsSink, FleetDiagnostic};
use crate::error::{IngestError, Result};
use crate::probe::{ConnectivityProbe, ProbeOutcome};
use crate::source::{MotionSource, SourceSettings, WorkerHandle};
use ahash::AHashMap;
use robofleet_config::{FleetConfig, RobotConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name of the per-tick callback registered on the simulation clock
pub const TICK_HOOK_NAME: &str = "robofleet_motion_step";

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartReport {
    /// Robots registered this session, in registration order
    pub registered: Vec<String>,
    /// Registered robots whose worker was running when start returned
    pub live: Vec<String>,
    /// Robot whose motion port failed the hard precondition
    pub failed: Option<String>,
    /// Robots after `failed` that were never processed
    pub aborted: Vec<String>,
    pub already_running: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    pub signalled: usize,
    /// Workers confirmed exited before stop returned
    pub joined: usize,
    /// Workers still finishing their last read when stop returned
    pub detached: usize,
    pub already_idle: bool,
}

pub struct FleetSupervisor {
    config: FleetConfig,
    clock: Arc<dyn SimulationClock>,
    actuation: Arc<dyn ActuationSink>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    state: SessionState,
    /// Registration order
    workers: Vec<WorkerHandle>,
    index: AHashMap<String, usize>,
    channel: Option<Arc<MotionChannel>>,
    tick_stats: Arc<TickStats>,
}

impl FleetSupervisor {
    pub fn new(
        config: FleetConfig,
        clock: Arc<dyn SimulationClock>,
        actuation: Arc<dyn ActuationSink>,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            config,
            clock,
            actuation,
            diagnostics,
            state: SessionState::Idle,
            workers: Vec::new(),
            index: AHashMap::new(),
            channel: None,
            tick_stats: Arc::new(TickStats::default()),
        }
    }

    pub async fn start(&mut self, source: &dyn RobotConfigSource) -> Result<StartReport> {
        match self.state {
            SessionState::Running => {
                self.emit(FleetDiagnostic::AlreadyRunning);
                return Ok(StartReport {
                    registered: self.registered_robots(),
                    live: self.live_workers(),
                    already_running: true,
                    ..StartReport::default()
                });
            }
            SessionState::Starting | SessionState::Stopping => {
                // a previous start/stop future was dropped mid-flight
                warn!("[FLEET] recovering from interrupted {:?} transition", self.state);
                self.teardown();
            }
            SessionState::Idle => {}
        }

        self.state = SessionState::Starting;
        match self.start_session(source).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.teardown();
                Err(e)
            }
        }
    }

    async fn start_session(&mut self, source: &dyn RobotConfigSource) -> Result<StartReport> {
        let robots: Vec<RobotConfig> = source
            .robot_configs()?
            .into_iter()
            .filter(|robot| robot.activated)
            .collect();
        info!("[FLEET] starting session with {} activated robots", robots.len());

        let mut report = StartReport::default();
        let validated = self.validate_robots(&robots, &mut report).await;

        if validated.is_empty() {
            self.state = SessionState::Idle;
            info!("[FLEET] no robots registered, session stays idle");
            return Ok(report);
        }

        let capacity = self
            .config
            .channel
            .capacity_override
            .unwrap_or(validated.len());
        let channel = Arc::new(MotionChannel::new(
            capacity,
            self.config.channel.overflow_policy,
        )?);
        self.channel = Some(Arc::clone(&channel));

        for robot in validated {
            let handle = self.spawn_worker(robot, &channel).await;
            report.registered.push(handle.name().to_string());
            if handle.is_live() {
                report.live.push(handle.name().to_string());
            }
            self.index.insert(handle.name().to_string(), self.workers.len());
            self.workers.push(handle);
        }

        self.install_tick_hook(&channel)?;
        self.state = SessionState::Running;
        info!(
            "[FLEET] running: {} registered, {} live, channel capacity {}",
            report.registered.len(),
            report.live.len(),
            capacity
        );
        Ok(report)
    }

    /// Probe each robot in order, stopping at the first unreachable motion port
    async fn validate_robots(
        &self,
        robots: &[RobotConfig],
        report: &mut StartReport,
    ) -> Vec<RobotConfig> {
        let probe = ConnectivityProbe::from_config(&self.config);
        let mut validated: Vec<RobotConfig> = Vec::with_capacity(robots.len());

        for (position, robot) in robots.iter().enumerate() {
            if validated.iter().any(|r| r.name == robot.name) {
                warn!("[FLEET] duplicate robot name {}, skipping", robot.name);
                continue;
            }

            let health_port = self.config.health_port_for(robot);
            if let ProbeOutcome::Unreachable { reason } =
                probe_endpoint(probe, &robot.address, health_port).await
            {
                self.emit(FleetDiagnostic::HealthEndpointUnreachable {
                    robot: robot.name.clone(),
                    endpoint: format!("{}:{}", robot.address, health_port),
                    reason,
                });
            }

            let motion_port = self.config.motion_port_for(robot);
            match probe_endpoint(probe, &robot.address, motion_port).await {
                ProbeOutcome::Reachable => {
                    debug!("[FLEET] {} validated", robot.name);
                    validated.push(robot.clone());
                }
                ProbeOutcome::Unreachable { reason } => {
                    let remaining: Vec<String> =
                        robots[position + 1..].iter().map(|r| r.name.clone()).collect();
                    self.emit(FleetDiagnostic::Unreachable {
                        robot: robot.name.clone(),
                        endpoint: format!("{}:{}", robot.address, motion_port),
                        reason,
                    });
                    self.emit(FleetDiagnostic::PartialStartAborted {
                        failed: robot.name.clone(),
                        remaining: remaining.clone(),
                    });
                    report.failed = Some(robot.name.clone());
                    report.aborted = remaining;
                    break;
                }
            }
        }

        validated
    }

    /// Open the session, resolve the model and start the reader thread.
    /// A robot whose session cannot be opened stays registered but not live.
    async fn spawn_worker(&self, robot: RobotConfig, channel: &Arc<MotionChannel>) -> WorkerHandle {
        let port = self.config.motion_port_for(&robot);
        let settings = SourceSettings::from_config(&self.config);
        let session_robot = robot.clone();

        let opened = tokio::task::spawn_blocking(move || {
            let mut source = MotionSource::connect(&session_robot, port, settings)?;
            let model = source.query_model()?;
            Ok::<_, IngestError>((source, model))
        })
        .await
        .map_err(IngestError::from)
        .and_then(|opened| opened);

        let spawned = opened.and_then(|(source, model)| {
            self.check_model(&robot, model.as_deref());
            WorkerHandle::spawn(
                robot.clone(),
                source,
                model,
                Arc::clone(channel),
                Arc::clone(&self.diagnostics),
            )
        });

        match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.emit(FleetDiagnostic::WorkerTerminated {
                    robot: robot.name.clone(),
                    reason: e.to_string(),
                });
                WorkerHandle::not_started(robot)
            }
        }
    }

    fn check_model(&self, robot: &RobotConfig, reported: Option<&str>) {
        match reported {
            None => warn!("[FLEET] {} did not report its model", robot.name),
            Some(actual) if actual == robot.model => {
                debug!("[FLEET] {} model confirmed: {}", robot.name, actual)
            }
            Some(actual) if !self.config.models.is_known(actual) => warn!(
                "[FLEET] {} reported unrecognised model {}, not compared",
                robot.name, actual
            ),
            Some(actual) => self.emit(FleetDiagnostic::ModelMismatch {
                robot: robot.name.clone(),
                expected: robot.model.clone(),
                actual: actual.to_string(),
            }),
        }
    }

    fn install_tick_hook(&self, channel: &Arc<MotionChannel>) -> Result<()> {
        if self.clock.remove_tick_callback(TICK_HOOK_NAME) {
            debug!("[FLEET] replaced stale tick hook");
        }
        let consumer = StepConsumer::new(
            Arc::clone(channel),
            Arc::clone(&self.actuation),
            self.workers.iter().map(|w| w.name().to_string()),
            Arc::clone(&self.tick_stats),
        );
        self.clock.add_tick_callback(
            TICK_HOOK_NAME,
            Box::new(move || {
                let _ = consumer.tick();
            }),
        )
    }

    pub async fn stop(&mut self) -> Result<StopReport> {
        if self.state == SessionState::Idle {
            self.emit(FleetDiagnostic::AlreadyIdle);
            return Ok(StopReport {
                already_idle: true,
                ..StopReport::default()
            });
        }

        for worker in &self.workers {
            worker.signal_stop();
        }
        self.state = SessionState::Stopping;
        let signalled = self.workers.len();
        self.clock.remove_tick_callback(TICK_HOOK_NAME);
        info!("[FLEET] stop signalled to {} workers", signalled);

        let join_timeout = Duration::from_millis(self.config.timeouts.stop_join_timeout_ms);
        if !join_timeout.is_zero() {
            let deadline = tokio::time::Instant::now() + join_timeout;
            while self.workers.iter().any(|w| !w.is_finished())
                && tokio::time::Instant::now() < deadline
            {
                tokio::time::sleep(JOIN_POLL_INTERVAL).await;
            }
        }

        let mut joined = 0;
        let mut detached = 0;
        for worker in self.workers.iter_mut() {
            if !worker.is_finished() {
                detached += 1;
            } else if worker.try_join().is_some() {
                joined += 1;
            }
        }
        if detached > 0 {
            debug!("[FLEET] {} workers still draining after stop", detached);
        }

        self.teardown();
        info!("[FLEET] session stopped");
        Ok(StopReport {
            signalled,
            joined,
            detached,
            already_idle: false,
        })
    }

    /// Host teardown: stop if needed and make sure the tick hook is gone
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            self.stop().await?;
        }
        self.clock.remove_tick_callback(TICK_HOOK_NAME);
        Ok(())
    }

    fn teardown(&mut self) {
        for worker in &self.workers {
            worker.signal_stop();
        }
        self.clock.remove_tick_callback(TICK_HOOK_NAME);
        self.workers.clear();
        self.index.clear();
        if let Some(channel) = self.channel.take() {
            let discarded = channel.clear();
            if discarded > 0 {
                debug!("[FLEET] discarded {} pending samples", discarded);
            }
        }
        self.state = SessionState::Idle;
    }

    fn emit(&self, diagnostic: FleetDiagnostic) {
        diagnostics::emit(self.diagnostics.as_ref(), diagnostic);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn registered_robots(&self) -> Vec<String> {
        self.workers.iter().map(|w| w.name().to_string()).collect()
    }

    pub fn live_workers(&self) -> Vec<String> {
        self.workers
            .iter()
            .filter(|w| w.is_live())
            .map(|w| w.name().to_string())
            .collect()
    }

    pub fn is_live(&self, robot: &str) -> bool {
        self.index
            .get(robot)
            .map_or(false, |&slot| self.workers[slot].is_live())
    }

    pub fn reported_model(&self, robot: &str) -> Option<&str> {
        self.index
            .get(robot)
            .and_then(|&slot| self.workers[slot].reported_model())
    }

    pub fn channel(&self) -> Option<Arc<MotionChannel>> {
        self.channel.clone()
    }

    pub fn channel_stats(&self) -> Option<ChannelStats> {
        self.channel.as_ref().map(|channel| channel.stats())
    }

    /// Cumulative across sessions
    pub fn tick_stats(&self) -> TickStatsSnapshot {
        self.tick_stats.snapshot()
    }
}

impl Drop for FleetSupervisor {
    fn drop(&mut self) {
        if self.state != SessionState::Idle || !self.workers.is_empty() {
            self.teardown();
        }
    }
}

async fn probe_endpoint(probe: ConnectivityProbe, address: &str, port: u16) -> ProbeOutcome {
    let address = address.to_string();
    tokio::task::spawn_blocking(move || probe.probe(&address, port))
        .await
        .unwrap_or_else(|e| ProbeOutcome::Unreachable {
            reason: format!("probe task failed: {}", e),
        })
}
