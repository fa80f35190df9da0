//! Where a session's robot list comes from

use crate::error::Result;
use robofleet_config::{FleetConfig, RobotConfig};

/// Supplies the ordered robot list; read once per start
pub trait RobotConfigSource: Send + Sync {
    fn robot_configs(&self) -> Result<Vec<RobotConfig>>;
}

impl RobotConfigSource for FleetConfig {
    /// Activated robots only, in file order
    fn robot_configs(&self) -> Result<Vec<RobotConfig>> {
        Ok(self.activated_robots().cloned().collect())
    }
}

impl RobotConfigSource for Vec<RobotConfig> {
    fn robot_configs(&self) -> Result<Vec<RobotConfig>> {
        Ok(self.clone())
    }
}
