use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalkControlError {
    #[error("Invalid state: predicate reads slot {slot}, snapshot has {available} slots")]
    InvalidState { slot: usize, available: usize },

    #[error("Robot error: {0}")]
    Robot(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config source error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WalkControlError>;
