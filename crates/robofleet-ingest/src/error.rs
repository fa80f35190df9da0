// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for fleet ingestion

use crate::protocol::DecodeError;
use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Simulation clock error: {0}")]
    Clock(String),

    #[error("Failed to spawn worker for {robot}: {reason}")]
    Spawn { robot: String, reason: String },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<robofleet_config::ConfigError> for IngestError {
    fn from(err: robofleet_config::ConfigError) -> Self {
        IngestError::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(err: tokio::task::JoinError) -> Self {
        IngestError::Task(err.to_string())
    }
}
