pub mod traits;
pub mod evolution;
pub mod genome;
pub mod robot;
pub mod manager;

pub use manager::{ConfigManager, AppConfig};
pub use evolution::EvolutionConfig;
pub use genome::GenomeConfig;
pub use robot::RobotConfig;
