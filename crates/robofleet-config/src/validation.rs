// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures robot entries are unique and addressable and that timeouts and
//! channel settings are usable before a session is started.

use crate::{ConfigError, ConfigResult, FleetConfig};
use std::collections::HashSet;

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    DuplicateRobot { name: String },
    PortConflict { robot: String, port: u16 },
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateRobot { name } => {
                write!(f, "Robot name '{}' is configured more than once", name)
            }
            Self::PortConflict { robot, port } => {
                write!(
                    f,
                    "Port conflict: robot '{}' uses port {} for both motion and health",
                    robot, port
                )
            }
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation found
pub fn validate_config(config: &FleetConfig) -> ConfigResult<()> {
    let errors = collect_validation_errors(config);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

/// All violations, in a stable order
pub fn collect_validation_errors(config: &FleetConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_robots(config, &mut errors);
    validate_value_ranges(config, &mut errors);
    errors
}

fn validate_robots(config: &FleetConfig, errors: &mut Vec<ConfigValidationError>) {
    let mut seen = HashSet::new();

    for (index, robot) in config.robots.iter().enumerate() {
        if robot.name.trim().is_empty() {
            errors.push(ConfigValidationError::MissingRequired {
                field: format!("robots[{}].name", index),
            });
        } else if robot.name.contains('\0') {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("robots[{}].name", index),
                reason: "must not contain NUL characters".to_string(),
            });
        } else if !seen.insert(robot.name.as_str()) {
            errors.push(ConfigValidationError::DuplicateRobot {
                name: robot.name.clone(),
            });
        }

        if robot.address.trim().is_empty() {
            errors.push(ConfigValidationError::MissingRequired {
                field: format!("robots[{}].address", index),
            });
        }

        if robot.model.trim().is_empty() {
            errors.push(ConfigValidationError::MissingRequired {
                field: format!("robots[{}].model", index),
            });
        }

        let motion_port = config.motion_port_for(robot);
        let health_port = config.health_port_for(robot);
        if motion_port == 0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("robots[{}].motion_port", index),
                reason: "must be nonzero".to_string(),
            });
        }
        if health_port == 0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("robots[{}].health_port", index),
                reason: "must be nonzero".to_string(),
            });
        }
        if motion_port != 0 && motion_port == health_port {
            errors.push(ConfigValidationError::PortConflict {
                robot: robot.name.clone(),
                port: motion_port,
            });
        }
    }
}

fn validate_value_ranges(config: &FleetConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.timeouts.probe_timeout_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "timeouts.probe_timeout_ms".to_string(),
            reason: "must be positive".to_string(),
        });
    }

    // A zero read timeout would make socket reads block forever
    if config.timeouts.read_timeout_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "timeouts.read_timeout_ms".to_string(),
            reason: "must be positive".to_string(),
        });
    }

    if config.channel.capacity_override == Some(0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "channel.capacity_override".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    if config.worker.read_buffer_bytes == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "worker.read_buffer_bytes".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RobotConfig;

    fn fleet(robots: Vec<RobotConfig>) -> FleetConfig {
        FleetConfig {
            robots,
            ..FleetConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = FleetConfig::default();
        let result = validate_config(&config);
        if let Err(e) = &result {
            eprintln!("Validation error: {}", e);
        }
        assert!(result.is_ok());
    }

    #[test]
    fn test_duplicate_robot_name() {
        let config = fleet(vec![
            RobotConfig::new("Robot01", "10.0.0.1", "TM12S"),
            RobotConfig::new("Robot01", "10.0.0.2", "TM12S"),
        ]);

        let errors = collect_validation_errors(&config);
        assert_eq!(
            errors,
            vec![ConfigValidationError::DuplicateRobot {
                name: "Robot01".to_string()
            }]
        );
    }

    #[test]
    fn test_robot_name_with_nul_rejected() {
        let config = fleet(vec![
            RobotConfig::new("R\01", "10.0.0.1", "TM12S"),
            RobotConfig::new("R2", "10.0.0.2", "TM12S"),
        ]);

        let errors = collect_validation_errors(&config);
        assert_eq!(
            errors,
            vec![ConfigValidationError::InvalidValue {
                field: "robots[0].name".to_string(),
                reason: "must not contain NUL characters".to_string(),
            }]
        );
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_motion_and_health_port_conflict() {
        let config = fleet(vec![RobotConfig::new("Robot01", "10.0.0.1", "TM12S")
            .with_motion_port(6000)
            .with_health_port(6000)]);

        let result = validate_config(&config);
        match result {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("Port conflict"));
                assert!(msg.contains("6000"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let config = fleet(vec![RobotConfig::new("", "", "")]);

        let errors = collect_validation_errors(&config);
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| matches!(e, ConfigValidationError::MissingRequired { .. })));
    }

    #[test]
    fn test_zero_read_timeout_rejected() {
        let mut config = FleetConfig::default();
        config.timeouts.read_timeout_ms = 0;
        config.channel.capacity_override = Some(0);

        let result = validate_config(&config);
        match result {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("timeouts.read_timeout_ms"));
                assert!(msg.contains("channel.capacity_override"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
