// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # robofleet-ingest
//!
//! Real-time motion ingestion for a fleet of robot controllers.
//!
//! ```text
//! FleetSupervisor ──probe──▶ controller health + motion ports
//!        │
//!        ├── spawns one MotionSource thread per registered robot
//!        │        └── offer(sample) ──▶ MotionChannel (bounded, never blocks)
//!        │                                     │
//!        └── installs tick hook ──▶ StepConsumer::tick ── try_take ──▶ ActuationSink
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use robofleet_ingest::{FleetSupervisor, ManualClock, TracingDiagnostics};
//! # use robofleet_ingest::{ActuationError, ActuationSink, JointAngles};
//! # use std::sync::Arc;
//! # struct Sink;
//! # impl ActuationSink for Sink {
//! #     fn apply_joint_target(&self, _: &str, _: &JointAngles) -> Result<(), ActuationError> { Ok(()) }
//! # }
//! # async fn run() -> robofleet_ingest::Result<()> {
//! let config = robofleet_config::load_config(None, None)?;
//! let clock = Arc::new(ManualClock::new());
//! let mut fleet = FleetSupervisor::new(
//!     config.clone(),
//!     clock.clone(),
//!     Arc::new(Sink),
//!     Arc::new(TracingDiagnostics),
//! );
//!
//! fleet.start(&config).await?;
//! clock.tick();
//! fleet.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod clock;
pub mod config_source;
pub mod consumer;
pub mod diagnostics;
pub mod error;
pub mod probe;
pub mod protocol;
pub mod sample;
pub mod source;
pub mod supervisor;

pub use channel::{ChannelStats, MotionChannel, OfferOutcome};
pub use clock::{ManualClock, SimulationClock, TickCallback};
pub use config_source::RobotConfigSource;
pub use consumer::{
    ActuationError, ActuationSink, ApplyErrorKind, StepConsumer, TickOutcome, TickStats,
    TickStatsSnapshot,
};
pub use diagnostics::{
    CollectingDiagnostics, DiagnosticsSink, FleetDiagnostic, Severity, TracingDiagnostics,
};
pub use error::{IngestError, Result};
pub use probe::{ConnectivityProbe, ProbeOutcome};
pub use protocol::{DecodeError, Frame, FrameDecoder, Telemetry};
pub use sample::{JointAngles, MotionSample, JOINT_COUNT};
pub use source::{MotionSource, SourceSettings, StopSignal, WorkerExit, WorkerHandle};
pub use supervisor::{FleetSupervisor, SessionState, StartReport, StopReport, TICK_HOOK_NAME};
