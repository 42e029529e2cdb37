//! Evolves tree-shaped servo control programs for a legged robot.
//!
//! A [`Chromosome`] holds one program tree of servo Actions and branching
//! Conditionals. The [`Simulator`] scores a population of them on robots
//! (anything implementing [`Robot`]) and breeds the next generation.

pub mod config;
pub mod engines;
pub mod error;
pub mod types;

pub use config::{AppConfig, ConfigManager};
pub use engines::evaluation::{EmulatorFactory, FitnessEvaluator, InCodeEmulator, Robot, RobotFactory, RunReport};
pub use engines::generation::{Chromosome, GenomeId, GenomeTree, Simulator};
pub use error::{Result, WalkControlError};
pub use types::{Comparator, Gyro, ServoState};
