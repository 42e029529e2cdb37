use crate::config::{GenomeConfig, RobotConfig};
use crate::engines::evaluation::robot::{Robot, RobotFactory};
use crate::error::Result;
use crate::types::{Gyro, ServoState};

/// In-process robot with instant servos and a two-leg posture model.
///
/// Joints 0/1 are the left hip/knee, 2/3 the right hip/knee. Joints that
/// are not configured read as 0.
#[derive(Debug, Clone)]
pub struct InCodeEmulator {
    state: ServoState,
    num_servos: usize,
    servo_max: f64,
    limb_length: f64,
}

impl InCodeEmulator {
    pub fn new(num_servos: usize, servo_max: u32, limb_length: f64) -> Self {
        let mut emulator = Self {
            state: ServoState::new(),
            num_servos,
            servo_max: servo_max as f64,
            limb_length,
        };
        emulator.zero();
        emulator
    }

    pub fn from_config(genome: &GenomeConfig, robot: &RobotConfig) -> Self {
        Self::new(genome.num_servos, genome.servo_max, robot.limb_length)
    }

    fn zero(&mut self) {
        self.state = (0..self.num_servos).map(|joint| (joint, 0)).collect();
    }

    fn joint_degrees(&self, joint: usize) -> f64 {
        let angle = self.state.get(&joint).copied().unwrap_or(0) as f64;
        angle / self.servo_max * 360.0
    }

    /// Height reached by the leg on `hip`/`knee`, law of cosines over the
    /// two limb segments. Unreachable geometry (NaN) counts as height 0.
    fn leg_height(&self, hip: usize, knee: usize) -> f64 {
        let limb = self.limb_length;
        let hip_degrees = self.joint_degrees(hip);
        let hip_radians = hip_degrees.to_radians();

        let first_step = hip_radians.asin() * limb;
        let theta = (90.0 - (hip_degrees + self.joint_degrees(knee))).to_radians();
        let hypotenuse = (first_step.powi(2) + limb.powi(2) + 2.0 * first_step * limb * theta.cos()).sqrt();
        let height_base = hip_radians.acos() * limb;
        let height = (hypotenuse.powi(2) - height_base.powi(2)).sqrt();

        if height.is_nan() {
            0.0
        } else {
            height
        }
    }
}

impl Robot for InCodeEmulator {
    fn reset_state(&mut self) -> Result<()> {
        self.zero();
        Ok(())
    }

    fn update_state(&mut self, state: &ServoState) -> Result<()> {
        self.state = state.clone();
        Ok(())
    }

    fn read_state(&mut self) -> Result<ServoState> {
        Ok(self.state.clone())
    }

    fn gyro_state(&mut self) -> Result<Gyro> {
        let left = self.joint_degrees(0) - self.joint_degrees(1);
        let right = self.joint_degrees(2) - self.joint_degrees(3);
        let pitch = (left + right) / 2.0;

        let height_left = self.leg_height(0, 1);
        let height_right = self.leg_height(2, 3);
        let yaw = height_left - height_right;
        let height = height_left + height_right / 2.0;

        Ok(Gyro::new(pitch as i32, yaw as i32, height as i32))
    }
}

/// Hands out fresh [`InCodeEmulator`]s
#[derive(Debug, Clone)]
pub struct EmulatorFactory {
    num_servos: usize,
    servo_max: u32,
    limb_length: f64,
}

impl EmulatorFactory {
    pub fn new(genome: &GenomeConfig, robot: &RobotConfig) -> Self {
        Self {
            num_servos: genome.num_servos,
            servo_max: genome.servo_max,
            limb_length: robot.limb_length,
        }
    }
}

impl RobotFactory for EmulatorFactory {
    type Robot = InCodeEmulator;

    fn build(&self) -> Result<InCodeEmulator> {
        Ok(InCodeEmulator::new(self.num_servos, self.servo_max, self.limb_length))
    }
}
