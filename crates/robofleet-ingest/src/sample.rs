//! Motion samples handed from network readers to the tick consumer

use std::sync::Arc;
use std::time::Instant;

/// Joints per arm
pub const JOINT_COUNT: usize = 6;

/// Joint angles in radians, base to flange
pub type JointAngles = [f64; JOINT_COUNT];

/// One decoded telemetry frame from a single robot.
///
/// Immutable once built; consumed exactly once by the tick consumer or
/// discarded by the channel's overflow policy.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionSample {
    robot_name: Arc<str>,
    joint_angles: JointAngles,
    digital_outputs: Option<u16>,
    captured_at: Instant,
}

impl MotionSample {
    pub fn new(
        robot_name: Arc<str>,
        joint_angles: JointAngles,
        digital_outputs: Option<u16>,
    ) -> Self {
        Self::captured(robot_name, joint_angles, digital_outputs, Instant::now())
    }

    pub fn captured(
        robot_name: Arc<str>,
        joint_angles: JointAngles,
        digital_outputs: Option<u16>,
        captured_at: Instant,
    ) -> Self {
        Self {
            robot_name,
            joint_angles,
            digital_outputs,
            captured_at,
        }
    }

    pub fn robot_name(&self) -> &str {
        &self.robot_name
    }

    pub fn joint_angles(&self) -> &JointAngles {
        &self.joint_angles
    }

    /// Controller digital outputs, bit N = `Ctrl_DO{N}`
    pub fn digital_outputs(&self) -> Option<u16> {
        self.digital_outputs
    }

    pub fn digital_output(&self, index: u8) -> Option<bool> {
        if index >= 16 {
            return None;
        }
        self.digital_outputs.map(|mask| mask & (1 << index) != 0)
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digital_output_bits() {
        let sample = MotionSample::new(Arc::from("Robot01"), [0.0; JOINT_COUNT], Some(0b101));
        assert_eq!(sample.digital_output(0), Some(true));
        assert_eq!(sample.digital_output(1), Some(false));
        assert_eq!(sample.digital_output(2), Some(true));
        assert_eq!(sample.digital_output(16), None);

        let no_io = MotionSample::new(Arc::from("Robot01"), [0.0; JOINT_COUNT], None);
        assert_eq!(no_io.digital_output(0), None);
    }
}
