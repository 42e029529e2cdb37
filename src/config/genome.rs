use super::traits::{check_percent, ConfigSection};
use crate::error::WalkControlError;
use serde::{Deserialize, Serialize};

/// Shape of random programs and the rates used by the genetic operators.
///
/// All `*_chance` / `mutate_*` rates are percentages in `[0, 100]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenomeConfig {
    pub num_servos: usize,
    /// Exclusive upper bound of a servo angle
    pub servo_max: u32,
    /// Number of state slots a Conditional may read
    pub state_size: usize,
    pub new_action_chance: u32,
    pub new_action_max_servos: usize,
    pub mutate_chance_add: u32,
    pub mutate_chance_lose: u32,
    pub mutate_chance_mutate: u32,
    pub mutate_min_size: usize,
    pub mutate_max_size: usize,
    pub mutate_action_angle: u32,
    pub mutate_action_add_angle: u32,
    pub mutate_action_rem_angle: u32,
    /// Largest node count of a freshly seeded genome
    pub seed_max_size: usize,
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            num_servos: 4,
            servo_max: 1024,
            state_size: 4,
            new_action_chance: 60,
            new_action_max_servos: 4,
            mutate_chance_add: 30,
            mutate_chance_lose: 20,
            mutate_chance_mutate: 50,
            mutate_min_size: 1,
            mutate_max_size: 32,
            mutate_action_angle: 25,
            mutate_action_add_angle: 20,
            mutate_action_rem_angle: 20,
            seed_max_size: 6,
        }
    }
}

impl ConfigSection for GenomeConfig {
    fn section_name() -> &'static str {
        "genome"
    }

    fn validate(&self) -> Result<(), WalkControlError> {
        if self.num_servos == 0 {
            return Err(WalkControlError::Configuration(
                "At least one servo is required".to_string()
            ));
        }
        if self.servo_max == 0 {
            return Err(WalkControlError::Configuration(
                "Servo max must be positive".to_string()
            ));
        }
        if self.state_size == 0 || self.state_size > self.num_servos {
            return Err(WalkControlError::Configuration(format!(
                "State size must be between 1 and num_servos ({}), got {}",
                self.num_servos, self.state_size
            )));
        }
        if self.new_action_max_servos > self.num_servos {
            return Err(WalkControlError::Configuration(format!(
                "new_action_max_servos ({}) exceeds num_servos ({})",
                self.new_action_max_servos, self.num_servos
            )));
        }
        if self.mutate_min_size == 0 || self.mutate_min_size > self.mutate_max_size {
            return Err(WalkControlError::Configuration(format!(
                "Genome size bounds must satisfy 1 <= min ({}) <= max ({})",
                self.mutate_min_size, self.mutate_max_size
            )));
        }
        if self.seed_max_size < self.mutate_min_size {
            return Err(WalkControlError::Configuration(
                "seed_max_size must be at least mutate_min_size".to_string()
            ));
        }

        for (name, value) in [
            ("new_action_chance", self.new_action_chance),
            ("mutate_chance_add", self.mutate_chance_add),
            ("mutate_chance_lose", self.mutate_chance_lose),
            ("mutate_chance_mutate", self.mutate_chance_mutate),
            ("mutate_action_angle", self.mutate_action_angle),
            ("mutate_action_add_angle", self.mutate_action_add_angle),
            ("mutate_action_rem_angle", self.mutate_action_rem_angle),
        ] {
            check_percent::<Self>(name, value)?;
        }
        Ok(())
    }
}
