use crate::engines::generation::chromosome::GenomeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of one finished tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Generation that was scored (0-based)
    pub generation: usize,
    pub scored: usize,
    pub best_id: GenomeId,
    pub best_score: f64,
    pub mean_score: f64,
    pub worst_score: f64,
    pub best_formula: String,
    /// Size of the population bred for the next generation
    pub next_population_size: usize,
    pub finished_at: DateTime<Utc>,
}

pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, generation: usize);
    fn on_chromosome_scored(&mut self, scored: usize, total: usize, score: f64);
    fn on_generation_complete(&mut self, summary: &GenerationSummary);
}

/// Discards every notification
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_generation_start(&mut self, _generation: usize) {}

    fn on_chromosome_scored(&mut self, _scored: usize, _total: usize, _score: f64) {}

    fn on_generation_complete(&mut self, _summary: &GenerationSummary) {}
}

/// Reports progress through the `log` facade
pub struct LogProgressCallback;

impl ProgressCallback for LogProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        log::info!("Generation {} starting...", generation + 1);
    }

    fn on_chromosome_scored(&mut self, scored: usize, total: usize, score: f64) {
        if scored % 10 == 0 || scored == total {
            log::debug!("  Scored {}/{} chromosomes (last: {:.3})", scored, total, score);
        }
    }

    fn on_generation_complete(&mut self, summary: &GenerationSummary) {
        log::info!(
            "Generation {} complete. Best: {:.3} ({}), mean: {:.3}, worst: {:.3}, next population: {}",
            summary.generation + 1,
            summary.best_score,
            summary.best_id,
            summary.mean_score,
            summary.worst_score,
            summary.next_population_size
        );
        log::debug!("  Best genome: {}", summary.best_formula);
    }
}
