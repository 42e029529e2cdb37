use crate::config::RobotConfig;
use crate::engines::evaluation::robot::{Robot, RobotFactory};
use crate::engines::generation::Chromosome;
use crate::error::Result;
use crate::types::Gyro;

/// Score a final posture: upright and tall is good, big programs are not.
///
/// `(100 / max(1, |x| + |y|)) * z / node_count`
pub fn fitness_score(gyro: Gyro, node_count: usize) -> f64 {
    let stability = 100.0 / gyro.tilt().max(1) as f64;
    stability * gyro.z as f64 / node_count.max(1) as f64
}

/// Runs chromosomes on robots built by `F` and turns the end pose into a score
pub struct FitnessEvaluator<F: RobotFactory> {
    factory: F,
    config: RobotConfig,
}

impl<F: RobotFactory> FitnessEvaluator<F> {
    pub fn new(factory: F, config: RobotConfig) -> Self {
        Self { factory, config }
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    /// One full run of `chromosome` on a fresh robot
    pub fn judge(&self, chromosome: &Chromosome) -> Result<f64> {
        let mut robot = self.factory.build()?;
        let report = robot.do_run(chromosome, &self.config)?;
        let gyro = robot.gyro_state()?;
        let score = fitness_score(gyro, chromosome.node_count());

        log::debug!(
            "genome {} ({} nodes): {} passes, {} actions, {} timeouts, gyro {} -> {:.3}",
            chromosome.id(),
            chromosome.node_count(),
            report.passes,
            report.actions_applied,
            report.timeouts,
            gyro,
            score
        );
        Ok(score)
    }
}
