use super::traits::{check_percent, ConfigSection};
use crate::error::WalkControlError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    /// Share of the ranked population dropped every tick
    pub cull_percent: u32,
    /// Share of the surviving pool that is mutated instead of bred
    pub mutation_percent: u32,
    /// Per-node chance handed to `Chromosome::mutate`
    pub mutation_severity: u32,
    /// Rank-weighted partner selection instead of uniform
    pub weighted_pairing: bool,
    /// Score individuals on the rayon pool, one robot per worker
    pub parallel_scoring: bool,
    pub seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            cull_percent: 10,
            mutation_percent: 10,
            mutation_severity: 20,
            weighted_pairing: false,
            parallel_scoring: true,
            seed: None,
        }
    }
}

impl ConfigSection for EvolutionConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn validate(&self) -> Result<(), WalkControlError> {
        if self.population_size < 4 {
            return Err(WalkControlError::Configuration(
                "Population size must be at least 4".to_string()
            ));
        }
        if self.cull_percent >= 100 {
            return Err(WalkControlError::Configuration(
                "Cull percent must be below 100".to_string()
            ));
        }
        check_percent::<Self>("mutation_percent", self.mutation_percent)?;
        check_percent::<Self>("mutation_severity", self.mutation_severity)?;
        Ok(())
    }
}
