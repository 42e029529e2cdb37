use crate::error::WalkControlError;
use serde::{Deserialize, Serialize};

/// Trait for configuration sections
pub trait ConfigSection: Serialize + for<'de> Deserialize<'de> + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<(), WalkControlError>;
}

/// Reject a percentage outside `[0, 100]`, naming the offending `section.key`
pub(crate) fn check_percent<S: ConfigSection>(name: &str, value: u32) -> Result<(), WalkControlError> {
    if value > 100 {
        return Err(WalkControlError::Configuration(format!(
            "{}.{} must be a percentage between 0 and 100, got {}",
            S::section_name(),
            name,
            value
        )));
    }
    Ok(())
}
