use super::{
    evolution::EvolutionConfig,
    genome::GenomeConfig,
    robot::RobotConfig,
    traits::ConfigSection,
};
use crate::error::WalkControlError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix of environment overrides, e.g. `WALKCONTROL__EVOLUTION__POPULATION_SIZE=40`
pub const ENV_PREFIX: &str = "WALKCONTROL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub evolution: EvolutionConfig,
    pub genome: GenomeConfig,
    pub robot: RobotConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), WalkControlError> {
        self.evolution.validate()?;
        self.genome.validate()?;
        self.robot.validate()?;
        Ok(())
    }

    /// Parse a TOML document, layering environment overrides on top
    pub fn from_toml_str(contents: &str) -> Result<Self, WalkControlError> {
        let source = config::File::from_str(contents, config::FileFormat::Toml);
        Self::build(source)
    }

    fn build<S>(source: S) -> Result<Self, WalkControlError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Load a TOML or JSON file (format by extension), then environment overrides
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), WalkControlError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WalkControlError::Configuration(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let config = AppConfig::build(config::File::from(path))
            .map_err(|e| WalkControlError::Configuration(format!("Failed to load config: {}", e)))?;

        *self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = config;
        log::info!("Loaded configuration from {}", path.display());
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), WalkControlError> {
        let config = self.get();
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| WalkControlError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Apply `f` to a copy of the configuration; the change is kept only if it validates
    pub fn update<F>(&self, f: F) -> Result<(), WalkControlError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut guard = self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut candidate = guard.clone();
        f(&mut candidate);
        candidate.validate()?;
        *guard = candidate;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [evolution]
            population_size = 12
            weighted_pairing = true

            [genome]
            mutate_max_size = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.evolution.population_size, 12);
        assert!(config.evolution.weighted_pairing);
        assert_eq!(config.evolution.cull_percent, 10);
        assert_eq!(config.genome.mutate_max_size, 16);
        assert_eq!(config.genome.servo_max, 1024);
        assert_eq!(config.robot.limb_length, 10.0);
    }

    #[test]
    fn test_invalid_toml_values_are_rejected() {
        let result = AppConfig::from_toml_str(
            r#"
            [genome]
            num_servos = 2
            state_size = 3
            "#,
        );
        assert!(matches!(result, Err(WalkControlError::Configuration(_))));
    }

    #[test]
    fn test_update_rejects_invalid_change() {
        let manager = ConfigManager::new();
        let result = manager.update(|c| c.evolution.cull_percent = 100);
        assert!(result.is_err());
        // Rejected changes must not leak into the stored config
        assert_eq!(manager.get().evolution.cull_percent, 10);

        manager.update(|c| c.evolution.population_size = 40).unwrap();
        assert_eq!(manager.get().evolution.population_size, 40);
    }

    #[test]
    fn test_save_and_load_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("walkcontrol-config-{}.toml", std::process::id()));
        let manager = ConfigManager::new();
        manager.update(|c| {
            c.evolution.seed = Some(7);
            c.robot.max_passes = Some(3);
        }).unwrap();
        manager.save_to_file(&path).unwrap();

        let loaded = ConfigManager::new();
        loaded.load_from_file(&path).unwrap();
        let config = loaded.get();
        assert_eq!(config.evolution.seed, Some(7));
        assert_eq!(config.robot.max_passes, Some(3));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let manager = ConfigManager::new();
        let result = manager.load_from_file("/definitely/not/here/walkcontrol.toml");
        assert!(matches!(result, Err(WalkControlError::Configuration(_))));
    }
}
