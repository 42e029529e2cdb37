use super::traits::ConfigSection;
use crate::error::WalkControlError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Wall-clock length of one judged run
    pub run_length_ms: u64,
    /// How long to wait for the servos to reach a requested pose
    pub action_completion_timeout_ms: u64,
    /// Optional cap on decision passes per run, makes runs deterministic
    pub max_passes: Option<usize>,
    /// Limb length of the emulated two-leg model
    pub limb_length: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            run_length_ms: 50,
            action_completion_timeout_ms: 100,
            max_passes: None,
            limb_length: 10.0,
        }
    }
}

impl RobotConfig {
    pub fn run_length(&self) -> Duration {
        Duration::from_millis(self.run_length_ms)
    }

    pub fn action_completion_timeout(&self) -> Duration {
        Duration::from_millis(self.action_completion_timeout_ms)
    }
}

impl ConfigSection for RobotConfig {
    fn section_name() -> &'static str {
        "robot"
    }

    fn validate(&self) -> Result<(), WalkControlError> {
        if self.run_length_ms == 0 {
            return Err(WalkControlError::Configuration(
                "Run length must be positive".to_string()
            ));
        }
        if self.max_passes == Some(0) {
            return Err(WalkControlError::Configuration(
                "max_passes must be at least 1 when set".to_string()
            ));
        }
        if self.limb_length.is_nan() || self.limb_length <= 0.0 {
            return Err(WalkControlError::Configuration(
                "Limb length must be positive".to_string()
            ));
        }
        Ok(())
    }
}
