// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, FleetConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "robofleet.toml";

/// Find the robofleet configuration file
///
/// Search order:
/// 1. `ROBOFLEET_CONFIG_PATH` environment variable
/// 2. Current working directory: `./robofleet.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("ROBOFLEET_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        } else {
            return Err(ConfigError::FileNotFound(format!(
                "Config file specified by ROBOFLEET_CONFIG_PATH not found: {}",
                path.display()
            )));
        }
    }

    let mut search_paths = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "robofleet configuration file '{}' not found in any of these locations:\n{}\n\nSet ROBOFLEET_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML.
/// Validation is a separate step (`validate_config`).
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<FleetConfig> {
    let config_file = if let Some(path) = config_path {
        path.to_path_buf()
    } else {
        find_config_file()?
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: FleetConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `ROBOFLEET_LOG_LEVEL` -> `system.log_level`
/// - `ROBOFLEET_MOTION_PORT` -> `ports.motion_port`
/// - `ROBOFLEET_HEALTH_PORT` -> `ports.health_port`
/// - `ROBOFLEET_PROBE_TIMEOUT_MS` -> `timeouts.probe_timeout_ms`
/// - `ROBOFLEET_READ_TIMEOUT_MS` -> `timeouts.read_timeout_ms`
/// - `ROBOFLEET_STOP_JOIN_TIMEOUT_MS` -> `timeouts.stop_join_timeout_ms`
pub fn apply_environment_overrides(config: &mut FleetConfig) {
    let vars: HashMap<String, String> = [
        ("ROBOFLEET_LOG_LEVEL", "log_level"),
        ("ROBOFLEET_MOTION_PORT", "motion_port"),
        ("ROBOFLEET_HEALTH_PORT", "health_port"),
        ("ROBOFLEET_PROBE_TIMEOUT_MS", "probe_timeout_ms"),
        ("ROBOFLEET_READ_TIMEOUT_MS", "read_timeout_ms"),
        ("ROBOFLEET_STOP_JOIN_TIMEOUT_MS", "stop_join_timeout_ms"),
    ]
    .iter()
    .filter_map(|(var, key)| env::var(var).ok().map(|value| (key.to_string(), value)))
    .collect();

    apply_overrides(config, &vars);
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"motion_port": "6000", "log_level": "debug"}`)
pub fn apply_cli_overrides(config: &mut FleetConfig, cli_args: &HashMap<String, String>) {
    apply_overrides(config, cli_args);

    if let Some(value) = cli_args.get("debug") {
        config.system.debug = value.to_lowercase() == "true" || value == "1";
    }
}

fn apply_overrides(config: &mut FleetConfig, values: &HashMap<String, String>) {
    if let Some(value) = values.get("log_level") {
        config.system.log_level = value.clone();
    }

    // Unparseable numbers are ignored so a typo never zeroes a port
    if let Some(port) = values.get("motion_port").and_then(|v| v.parse::<u16>().ok()) {
        config.ports.motion_port = port;
    }
    if let Some(port) = values.get("health_port").and_then(|v| v.parse::<u16>().ok()) {
        config.ports.health_port = port;
    }
    if let Some(ms) = values.get("probe_timeout_ms").and_then(|v| v.parse::<u64>().ok()) {
        config.timeouts.probe_timeout_ms = ms;
    }
    if let Some(ms) = values.get("read_timeout_ms").and_then(|v| v.parse::<u64>().ok()) {
        config.timeouts.read_timeout_ms = ms;
    }
    if let Some(ms) = values
        .get("stop_join_timeout_ms")
        .and_then(|v| v.parse::<u64>().ok())
    {
        config.timeouts.stop_join_timeout_ms = ms;
    }
}
