// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-tick motion consumer
//!
//! [`StepConsumer::tick`] runs on the simulation engine's thread. It takes at
//! most one sample, applies it, and never lets a failure escape: failures are
//! classified and counted in [`TickStats`] instead.

use crate::channel::MotionChannel;
use crate::sample::{JointAngles, MotionSample};
use ahash::AHashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{trace, warn};

/// Host collaborator that drives each robot's articulation
pub trait ActuationSink: Send + Sync {
    fn apply_joint_target(&self, robot_name: &str, joints: &JointAngles)
        -> Result<(), ActuationError>;
}

#[derive(Debug, Error)]
pub enum ActuationError {
    #[error("no articulation for robot {0}")]
    UnknownRobot(String),
    #[error("joint target rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyErrorKind {
    /// Sample for a robot that is not registered this session
    UnknownRobot,
    NonFiniteTarget,
    SinkRejected,
    Panicked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Applied(String),
    Idle,
    Failed(ApplyErrorKind),
}

#[derive(Debug, Default)]
pub struct TickStats {
    ticks: AtomicU64,
    applied: AtomicU64,
    idle: AtomicU64,
    unknown_robot: AtomicU64,
    non_finite: AtomicU64,
    rejected: AtomicU64,
    panicked: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStatsSnapshot {
    pub ticks: u64,
    pub applied: u64,
    pub idle: u64,
    pub unknown_robot: u64,
    pub non_finite: u64,
    pub rejected: u64,
    pub panicked: u64,
}

impl TickStatsSnapshot {
    pub fn failures(&self) -> u64 {
        self.unknown_robot + self.non_finite + self.rejected + self.panicked
    }
}

impl TickStats {
    fn record(&self, outcome: &TickOutcome) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            TickOutcome::Applied(_) => &self.applied,
            TickOutcome::Idle => &self.idle,
            TickOutcome::Failed(ApplyErrorKind::UnknownRobot) => &self.unknown_robot,
            TickOutcome::Failed(ApplyErrorKind::NonFiniteTarget) => &self.non_finite,
            TickOutcome::Failed(ApplyErrorKind::SinkRejected) => &self.rejected,
            TickOutcome::Failed(ApplyErrorKind::Panicked) => &self.panicked,
        };
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> TickStatsSnapshot {
        TickStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            idle: self.idle.load(Ordering::Relaxed),
            unknown_robot: self.unknown_robot.load(Ordering::Relaxed),
            non_finite: self.non_finite.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

pub struct StepConsumer {
    channel: Arc<MotionChannel>,
    sink: Arc<dyn ActuationSink>,
    robots: AHashSet<String>,
    stats: Arc<TickStats>,
}

impl StepConsumer {
    pub fn new(
        channel: Arc<MotionChannel>,
        sink: Arc<dyn ActuationSink>,
        robots: impl IntoIterator<Item = String>,
        stats: Arc<TickStats>,
    ) -> Self {
        Self {
            channel,
            sink,
            robots: robots.into_iter().collect(),
            stats,
        }
    }

    /// Apply at most one pending sample. Never blocks, never panics.
    pub fn tick(&self) -> TickOutcome {
        let outcome = match self.channel.try_take() {
            None => TickOutcome::Idle,
            Some(sample) => match self.apply(&sample) {
                Ok(()) => TickOutcome::Applied(sample.robot_name().to_string()),
                Err(kind) => TickOutcome::Failed(kind),
            },
        };

        let count = self.stats.record(&outcome);
        if let TickOutcome::Failed(kind) = &outcome {
            if count == 1 || count % 100 == 0 {
                warn!("[TICK] sample not applied: {:?} ({} so far)", kind, count);
            }
        }
        outcome
    }

    pub fn stats(&self) -> TickStatsSnapshot {
        self.stats.snapshot()
    }

    fn apply(&self, sample: &MotionSample) -> Result<(), ApplyErrorKind> {
        let robot = sample.robot_name();
        if !self.robots.contains(robot) {
            return Err(ApplyErrorKind::UnknownRobot);
        }
        if sample.joint_angles().iter().any(|angle| !angle.is_finite()) {
            return Err(ApplyErrorKind::NonFiniteTarget);
        }

        let sink = &self.sink;
        match panic::catch_unwind(AssertUnwindSafe(|| {
            sink.apply_joint_target(robot, sample.joint_angles())
        })) {
            Ok(Ok(())) => {
                trace!("[TICK] applied joint target for {}", robot);
                Ok(())
            }
            Ok(Err(ActuationError::UnknownRobot(_))) => Err(ApplyErrorKind::UnknownRobot),
            Ok(Err(ActuationError::Rejected(_))) => Err(ApplyErrorKind::SinkRejected),
            Err(_) => Err(ApplyErrorKind::Panicked),
        }
    }
}
