//! # robofleet
//!
//! Real-time motion ingestion for a fleet of robot controllers feeding a
//! fixed-rate simulation stepping loop.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! robofleet = "0.1"  # Default: ingest + observability
//! ```
//!
//! ## Feature Flags
//!
//! - **`full`** (default): every component
//! - **`ingest`**: probe, wire codec, motion workers, channel, tick consumer, supervisor
//! - **`observability`**: logging initialisation and per-crate debug flags
//! - **`file-logging`**: per-run JSON log files with retention
//!
//! Configuration is always available.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use robofleet::prelude::*;
//! use std::sync::Arc;
//!
//! struct Articulations;
//!
//! impl ActuationSink for Articulations {
//!     fn apply_joint_target(&self, robot: &str, joints: &JointAngles) -> Result<(), ActuationError> {
//!         println!("{robot}: {joints:?}");
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(None, None)?;
//! let clock = Arc::new(ManualClock::new());
//! let mut fleet = FleetSupervisor::new(
//!     config.clone(),
//!     clock.clone(),
//!     Arc::new(Articulations),
//!     Arc::new(TracingDiagnostics),
//! );
//!
//! let report = fleet.start(&config).await?;
//! println!("live: {:?}", report.live);
//! for _ in 0..60 {
//!     clock.tick();
//! }
//! fleet.stop().await?;
//! # Ok(())
//! # }
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use robofleet_config as config;

#[cfg(feature = "ingest")]
pub use robofleet_ingest as ingest;

#[cfg(feature = "observability")]
pub use robofleet_observability as observability;

/// Prelude with the types a host integration needs
pub mod prelude {
    pub use crate::config::{load_config, validate_config, FleetConfig, OverflowPolicy, RobotConfig};

    #[cfg(feature = "ingest")]
    pub use crate::ingest::{
        ActuationError, ActuationSink, CollectingDiagnostics, DiagnosticsSink, FleetDiagnostic,
        FleetSupervisor, JointAngles, ManualClock, MotionChannel, MotionSample, RobotConfigSource,
        SessionState, SimulationClock, StartReport, StopReport, TracingDiagnostics,
    };

    #[cfg(feature = "observability")]
    pub use crate::observability::{init_console_logging, CrateDebugFlags, LoggingConfig};
}
