// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # robofleet-observability
//!
//! Logging setup shared by the robofleet crates and tools, with per-crate
//! debug flag support.
//!
//! ## Features
//! - `file-logging`: timestamped run folders with a combined JSON log

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known robofleet crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "robofleet",
    "robofleet-config",
    "robofleet-ingest",
    "robofleet-observability",
];
