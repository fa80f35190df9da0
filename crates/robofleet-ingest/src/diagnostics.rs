// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Operator-facing diagnostics
//!
//! Nothing here is fatal. Every diagnostic is logged through `tracing` and
//! then forwarded to the host's [`DiagnosticsSink`].

use parking_lot::Mutex;
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetDiagnostic {
    /// Soft: simulated controllers may not expose the health endpoint
    HealthEndpointUnreachable {
        robot: String,
        endpoint: String,
        reason: String,
    },
    /// Hard: motion-control port not reachable, start sequence aborted here
    Unreachable {
        robot: String,
        endpoint: String,
        reason: String,
    },
    ModelMismatch {
        robot: String,
        expected: String,
        actual: String,
    },
    WorkerTerminated { robot: String, reason: String },
    PartialStartAborted {
        failed: String,
        remaining: Vec<String>,
    },
    AlreadyRunning,
    AlreadyIdle,
}

impl FleetDiagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            FleetDiagnostic::HealthEndpointUnreachable { .. }
            | FleetDiagnostic::ModelMismatch { .. }
            | FleetDiagnostic::WorkerTerminated { .. } => Severity::Warning,
            FleetDiagnostic::Unreachable { .. } | FleetDiagnostic::PartialStartAborted { .. } => {
                Severity::Error
            }
            FleetDiagnostic::AlreadyRunning | FleetDiagnostic::AlreadyIdle => Severity::Info,
        }
    }

    /// Robot the diagnostic is about, if any
    pub fn robot(&self) -> Option<&str> {
        match self {
            FleetDiagnostic::HealthEndpointUnreachable { robot, .. }
            | FleetDiagnostic::Unreachable { robot, .. }
            | FleetDiagnostic::ModelMismatch { robot, .. }
            | FleetDiagnostic::WorkerTerminated { robot, .. } => Some(robot),
            FleetDiagnostic::PartialStartAborted { failed, .. } => Some(failed),
            FleetDiagnostic::AlreadyRunning | FleetDiagnostic::AlreadyIdle => None,
        }
    }
}

impl fmt::Display for FleetDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FleetDiagnostic::HealthEndpointUnreachable {
                robot,
                endpoint,
                reason,
            } => write!(
                f,
                "Robot {}: health endpoint {} unreachable ({}); continuing, this is expected for simulated controllers",
                robot, endpoint, reason
            ),
            FleetDiagnostic::Unreachable {
                robot,
                endpoint,
                reason,
            } => write!(
                f,
                "Robot {}: motion endpoint {} unreachable ({})",
                robot, endpoint, reason
            ),
            FleetDiagnostic::ModelMismatch {
                robot,
                expected,
                actual,
            } => write!(
                f,
                "Robot {}: configured model {} but controller reports {}",
                robot, expected, actual
            ),
            FleetDiagnostic::WorkerTerminated { robot, reason } => {
                write!(f, "Robot {}: motion worker terminated ({})", robot, reason)
            }
            FleetDiagnostic::PartialStartAborted { failed, remaining } => {
                if remaining.is_empty() {
                    write!(f, "Start aborted at robot {}; no robots left unprocessed", failed)
                } else {
                    write!(
                        f,
                        "Start aborted at robot {}; not processed: {}",
                        failed,
                        remaining.join(", ")
                    )
                }
            }
            FleetDiagnostic::AlreadyRunning => write!(f, "Fleet is already running"),
            FleetDiagnostic::AlreadyIdle => write!(f, "Fleet is already stopped"),
        }
    }
}

/// Host collaborator that shows diagnostics to an operator
pub trait DiagnosticsSink: Send + Sync {
    fn report_message(&self, text: &str);

    fn report(&self, diagnostic: &FleetDiagnostic) {
        self.report_message(&diagnostic.to_string());
    }
}

/// Sink for headless hosts; `tracing` output is the only record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn report_message(&self, _text: &str) {}
}

/// Retains everything reported, for operator panels and tests
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    diagnostics: Mutex<Vec<FleetDiagnostic>>,
    messages: Mutex<Vec<String>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<FleetDiagnostic> {
        self.diagnostics.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn clear(&self) {
        self.diagnostics.lock().clear();
        self.messages.lock().clear();
    }
}

impl DiagnosticsSink for CollectingDiagnostics {
    fn report_message(&self, text: &str) {
        self.messages.lock().push(text.to_string());
    }

    fn report(&self, diagnostic: &FleetDiagnostic) {
        self.diagnostics.lock().push(diagnostic.clone());
        self.report_message(&diagnostic.to_string());
    }
}

pub(crate) fn emit(sink: &dyn DiagnosticsSink, diagnostic: FleetDiagnostic) {
    match diagnostic.severity() {
        Severity::Info => info!("[FLEET] {}", diagnostic),
        Severity::Warning => warn!("[FLEET] {}", diagnostic),
        Severity::Error => error!("[FLEET] {}", diagnostic),
    }
    sink.report(&diagnostic);
}
