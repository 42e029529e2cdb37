pub mod emulator;
pub mod fitness;
pub mod robot;

pub use emulator::{EmulatorFactory, InCodeEmulator};
pub use fitness::{fitness_score, FitnessEvaluator};
pub use robot::{Robot, RobotFactory, RunReport};
