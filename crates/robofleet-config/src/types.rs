// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `robofleet.toml`.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FleetConfig {
    pub system: SystemConfig,
    pub ports: PortsConfig,
    pub timeouts: TimeoutsConfig,
    pub channel: ChannelConfig,
    pub worker: WorkerConfig,
    pub models: ModelsConfig,
    pub robots: Vec<RobotConfig>,
}

impl FleetConfig {
    /// Activated robots, in configuration order.
    pub fn activated_robots(&self) -> impl Iterator<Item = &RobotConfig> {
        self.robots.iter().filter(|robot| robot.activated)
    }

    /// Motion-control port for a robot, honoring its per-robot override.
    pub fn motion_port_for(&self, robot: &RobotConfig) -> u16 {
        robot.motion_port.unwrap_or(self.ports.motion_port)
    }

    /// Health/status port for a robot, honoring its per-robot override.
    pub fn health_port_for(&self, robot: &RobotConfig) -> u16 {
        robot.health_port.unwrap_or(self.ports.health_port)
    }
}

/// System-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub debug: bool,
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
        }
    }
}

/// Well-known controller ports
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PortsConfig {
    /// Ethernet-slave port streaming joint telemetry
    pub motion_port: u16,
    /// Camera/health API port. Simulated controllers may not expose it.
    pub health_port: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            motion_port: 5891,
            health_port: 5002,
        }
    }
}

/// Timeouts, all in milliseconds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub probe_timeout_ms: u64,
    /// Upper bound on a single blocking read inside a worker. Also bounds how
    /// long a worker takes to observe cancellation.
    pub read_timeout_ms: u64,
    pub model_query_timeout_ms: u64,
    /// 0 = fire the stop signal and move on without waiting
    pub stop_join_timeout_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 1000,
            read_timeout_ms: 100,
            model_query_timeout_ms: 1000,
            stop_join_timeout_ms: 0,
        }
    }
}

/// What the motion channel does with a sample offered while full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the incoming sample; pending samples are untouched.
    #[default]
    DropNewest,
    /// Evict the oldest pending sample to make room (freshness over history).
    DropOldest,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub overflow_policy: OverflowPolicy,
    /// Fixed capacity instead of the registered-robot count.
    ///
    /// Unset, the channel holds one slot per registered robot. Setting it
    /// deliberately departs from that sizing: a larger value lets one fast
    /// robot queue several samples ahead of the others.
    pub capacity_override: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Consecutive non-fatal read errors after which a session is considered lost
    pub max_consecutive_io_errors: u32,
    pub read_buffer_bytes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_io_errors: 50,
            read_buffer_bytes: 4096,
        }
    }
}

/// Controller models the fleet knows how to compare against
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub known: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            known: [
                "TM5-700", "TM5-900", "TM12", "TM14", "TM12S", "TM14S", "TM25S", "TM30S",
            ]
            .iter()
            .map(|m| m.to_string())
            .collect(),
        }
    }
}

impl ModelsConfig {
    pub fn is_known(&self, model: &str) -> bool {
        self.known.iter().any(|known| known == model)
    }
}

/// One robot controller in the fleet. Immutable for the duration of a session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RobotConfig {
    pub name: String,
    pub address: String,
    pub model: String,
    #[serde(default = "default_activated")]
    pub activated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_port: Option<u16>,
}

fn default_activated() -> bool {
    true
}

impl RobotConfig {
    pub fn new(name: impl Into<String>, address: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            model: model.into(),
            activated: true,
            motion_port: None,
            health_port: None,
        }
    }

    pub fn with_motion_port(mut self, port: u16) -> Self {
        self.motion_port = Some(port);
        self
    }

    pub fn with_health_port(mut self, port: u16) -> Self {
        self.health_port = Some(port);
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.activated = false;
        self
    }
}
