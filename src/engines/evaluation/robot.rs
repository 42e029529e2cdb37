use crate::config::RobotConfig;
use crate::engines::generation::Chromosome;
use crate::error::Result;
use crate::types::{Gyro, ServoState};
use std::time::Instant;

/// What happened during one [`Robot::do_run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Decision passes over the program
    pub passes: usize,
    pub actions_applied: usize,
    /// Actions whose pose was not confirmed before the completion timeout
    pub timeouts: usize,
}

/// A simulated or physical robot that a chromosome can drive.
///
/// Implementations only move joints and report readings; the run protocol
/// itself lives in the provided [`do_run`](Robot::do_run).
pub trait Robot {
    /// Return every joint to the canonical zero pose
    fn reset_state(&mut self) -> Result<()>;

    /// Push a full set of joint targets to the device
    fn update_state(&mut self, state: &ServoState) -> Result<()>;

    /// Current joint angles as reported by the device
    fn read_state(&mut self) -> Result<ServoState>;

    /// Pitch (`x`), yaw (`y`) and height (`z`) estimate for the current pose
    fn gyro_state(&mut self) -> Result<Gyro>;

    /// Run `chromosome` from the zero pose until the run length elapses
    /// (or `max_passes` decision passes are done, when configured).
    ///
    /// Each pass asks the program for its Actions against the current state;
    /// every Action is merged into the working pose, pushed, and then polled
    /// until the device confirms it or the completion timeout passes. A
    /// timeout just moves on to the next Action.
    fn do_run(&mut self, chromosome: &Chromosome, config: &RobotConfig) -> Result<RunReport> {
        self.reset_state()?;
        let mut working = self.read_state()?;
        let mut report = RunReport::default();
        let run_length = config.run_length();
        let timeout = config.action_completion_timeout();
        let started = Instant::now();

        loop {
            if config.max_passes.is_some_and(|max| report.passes >= max) {
                break;
            }
            if started.elapsed() >= run_length {
                break;
            }

            let snapshot = self.read_state()?;
            for action in chromosome.actions(&snapshot)? {
                working.extend(action.angles.iter().map(|(joint, angle)| (*joint, *angle)));
                self.update_state(&working)?;
                report.actions_applied += 1;

                let requested = Instant::now();
                while self.read_state()? != working {
                    if requested.elapsed() >= timeout {
                        report.timeouts += 1;
                        log::debug!(
                            "genome {}: pose not reached within {:?}, moving on",
                            chromosome.id(),
                            timeout
                        );
                        break;
                    }
                    std::thread::yield_now();
                }
            }
            report.passes += 1;
        }

        Ok(report)
    }
}

/// Builds an independent robot for every judged run.
///
/// Scoring may run on several threads at once; each run gets its own robot
/// so no device state is ever shared between workers.
pub trait RobotFactory: Sync {
    type Robot: Robot;

    fn build(&self) -> Result<Self::Robot>;
}

impl<F, R> RobotFactory for F
where
    F: Fn() -> Result<R> + Sync,
    R: Robot,
{
    type Robot = R;

    fn build(&self) -> Result<R> {
        self()
    }
}
