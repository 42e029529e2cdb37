use crate::config::{AppConfig, EvolutionConfig, GenomeConfig};
use crate::engines::evaluation::{FitnessEvaluator, RobotFactory};
use crate::engines::generation::chromosome::{Chromosome, GenomeId};
use crate::engines::generation::operators::{rank_weighted_partner, uniform_partner};
use crate::engines::generation::progress::{GenerationSummary, NoProgress, ProgressCallback};
use crate::error::{Result, WalkControlError};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};

/// Genome identity -> score from the latest tick
pub type Scores = BTreeMap<GenomeId, f64>;

/// Insertion-ordered set of chromosomes keyed by genome identity
#[derive(Debug, Clone, Default)]
pub struct Population {
    members: Vec<Chromosome>,
    ids: HashSet<GenomeId>,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `chromosome` unless an identical genome is already present
    pub fn insert(&mut self, chromosome: Chromosome) -> bool {
        if !self.ids.insert(chromosome.id()) {
            return false;
        }
        self.members.push(chromosome);
        true
    }

    pub fn contains(&self, id: GenomeId) -> bool {
        self.ids.contains(&id)
    }

    pub fn get(&self, id: GenomeId) -> Option<&Chromosome> {
        if !self.contains(id) {
            return None;
        }
        self.members.iter().find(|c| c.id() == id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chromosome> {
        self.members.iter()
    }

    pub fn as_slice(&self) -> &[Chromosome] {
        &self.members
    }
}

impl FromIterator<Chromosome> for Population {
    fn from_iter<I: IntoIterator<Item = Chromosome>>(iter: I) -> Self {
        let mut population = Population::new();
        for chromosome in iter {
            population.insert(chromosome);
        }
        population
    }
}

/// Generational loop: score, rank, cull, mutate, breed, replace.
///
/// All randomness comes from one seeded stream owned by the simulator, so a
/// given seed and starting population always evolve the same way.
pub struct Simulator<F: RobotFactory> {
    evolution: EvolutionConfig,
    genome: GenomeConfig,
    evaluator: FitnessEvaluator<F>,
    population: Population,
    scores: Scores,
    generation: usize,
    rng: StdRng,
    last_summary: Option<GenerationSummary>,
}

impl<F: RobotFactory> Simulator<F> {
    /// Seed `population_size` distinct random chromosomes
    pub fn new(config: &AppConfig, factory: F) -> Result<Self> {
        config.validate()?;
        let mut rng = Self::seeded_rng(&config.evolution);

        let wanted = config.evolution.population_size;
        let max_attempts = wanted * 100;
        let mut population = Population::new();
        let mut attempts = 0;
        while population.len() < wanted {
            if attempts >= max_attempts {
                return Err(WalkControlError::Generation(format!(
                    "Could only seed {} distinct genomes out of {} after {} attempts",
                    population.len(),
                    wanted,
                    attempts
                )));
            }
            attempts += 1;
            population.insert(Chromosome::random(&config.genome, &mut rng));
        }

        Ok(Self::assemble(config, factory, population, rng))
    }

    /// Start from a given population instead of random programs
    pub fn with_population(config: &AppConfig, factory: F, members: Vec<Chromosome>) -> Result<Self> {
        config.validate()?;
        let population: Population = members.into_iter().collect();
        if population.len() < 2 {
            return Err(WalkControlError::Generation(format!(
                "Initial population needs at least 2 distinct genomes, got {}",
                population.len()
            )));
        }
        let rng = Self::seeded_rng(&config.evolution);
        Ok(Self::assemble(config, factory, population, rng))
    }

    fn seeded_rng(config: &EvolutionConfig) -> StdRng {
        match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn assemble(config: &AppConfig, factory: F, population: Population, rng: StdRng) -> Self {
        Self {
            evolution: config.evolution.clone(),
            genome: config.genome.clone(),
            evaluator: FitnessEvaluator::new(factory, config.robot.clone()),
            population,
            scores: Scores::new(),
            generation: 0,
            rng,
            last_summary: None,
        }
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Scores of the generation scored by the latest tick
    pub fn scores(&self) -> &Scores {
        &self.scores
    }

    /// Number of completed ticks
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn last_summary(&self) -> Option<&GenerationSummary> {
        self.last_summary.as_ref()
    }

    /// Top-ranked chromosome of the latest tick; elitism keeps it in the population
    pub fn champion(&self) -> Option<&Chromosome> {
        self.last_summary
            .as_ref()
            .and_then(|summary| self.population.get(summary.best_id))
    }

    /// Run `generations` ticks, returning the summary of the last one
    pub fn run<C: ProgressCallback>(
        &mut self,
        generations: usize,
        callback: &mut C,
    ) -> Result<Option<GenerationSummary>> {
        for _ in 0..generations {
            self.tick_with(callback)?;
        }
        Ok(self.last_summary.clone())
    }

    pub fn tick(&mut self) -> Result<Scores> {
        self.tick_with(&mut NoProgress)
    }

    /// One generation. The population is only replaced once the whole tick
    /// succeeded; a failed run leaves it as it was.
    pub fn tick_with<C: ProgressCallback>(&mut self, callback: &mut C) -> Result<Scores> {
        callback.on_generation_start(self.generation);

        // Score
        let results = self.score_population(callback)?;
        self.scores = self
            .population
            .iter()
            .zip(&results)
            .map(|(chromosome, score)| (chromosome.id(), *score))
            .collect();

        // Rank, stable on population order
        let current = std::mem::take(&mut self.population);
        let mut ranked: Vec<(Chromosome, f64)> = current.members.into_iter().zip(results).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let scored = ranked.len();
        let (best, best_score) = ranked[0].clone();
        let (worst, worst_score) = ranked[scored - 1].clone();
        let mean_score = ranked.iter().map(|(_, s)| s).sum::<f64>() / scored as f64;

        // Cull, then put the worst back for diversity
        let keep = survivor_count(scored, self.evolution.cull_percent);
        let mut pool: Vec<Chromosome> = ranked.into_iter().take(keep).map(|(c, _)| c).collect();
        if !pool.iter().any(|c| c.id() == worst.id()) {
            pool.push(worst);
        }

        let target = self.evolution.population_size.saturating_sub(1);
        let mut next_gen = Population::new();

        // Mutation: drawn individuals do not also breed
        let mutations = mutation_draws(pool.len(), self.evolution.mutation_percent);
        for _ in 0..mutations {
            if next_gen.len() >= target {
                break;
            }
            let original = pool.remove(self.rng.gen_range(0..pool.len()));
            let offspring = original.mutate(self.evolution.mutation_severity, &self.genome, &mut self.rng);
            next_gen.insert(offspring);
        }
        log::debug!(
            "generation {}: kept {} of {}, {} mutated, {} left to breed",
            self.generation,
            keep,
            scored,
            next_gen.len(),
            pool.len()
        );

        self.breed(&pool, &mut next_gen, target);

        // Elitism
        next_gen.insert(best.clone());

        if next_gen.len() < target {
            log::warn!(
                "generation {}: next population is short ({} of {}), top-up mutations exhausted",
                self.generation,
                next_gen.len(),
                self.evolution.population_size
            );
        }

        let summary = GenerationSummary {
            generation: self.generation,
            scored,
            best_id: best.id(),
            best_score,
            mean_score,
            worst_score,
            best_formula: best.genome().to_formula(),
            next_population_size: next_gen.len(),
            finished_at: Utc::now(),
        };

        self.population = next_gen;
        self.generation += 1;
        callback.on_generation_complete(&summary);
        self.last_summary = Some(summary);

        Ok(self.scores.clone())
    }

    fn score_population<C: ProgressCallback>(&self, callback: &mut C) -> Result<Vec<f64>> {
        let members = self.population.as_slice();
        let total = members.len();

        if self.evolution.parallel_scoring {
            let evaluator = &self.evaluator;
            let scores = members
                .par_iter()
                .map(|chromosome| evaluator.judge(chromosome))
                .collect::<Result<Vec<f64>>>()?;
            for (i, score) in scores.iter().enumerate() {
                callback.on_chromosome_scored(i + 1, total, *score);
            }
            Ok(scores)
        } else {
            let mut scores = Vec::with_capacity(total);
            for (i, chromosome) in members.iter().enumerate() {
                let score = self.evaluator.judge(chromosome)?;
                callback.on_chromosome_scored(i + 1, total, score);
                scores.push(score);
            }
            Ok(scores)
        }
    }

    /// Crossover until `next_gen` holds `target` genomes, then close any gap
    /// left by duplicate offspring with mutated copies of the pool.
    fn breed(&mut self, pool: &[Chromosome], next_gen: &mut Population, target: usize) {
        if next_gen.len() >= target {
            return;
        }
        if pool.len() >= 2 {
            self.crossover_rounds(pool, next_gen, target);
        } else {
            log::warn!("Breeding pool has {} member(s), no partners available", pool.len());
        }
        if next_gen.len() < target {
            self.top_up(pool, next_gen, target);
        }
    }

    /// Round-robin over the rank-ordered pool. Gives up when a full round
    /// adds nothing new.
    fn crossover_rounds(&mut self, pool: &[Chromosome], next_gen: &mut Population, target: usize) {
        let mut cursor = 0;
        let mut added_this_round = false;
        while next_gen.len() < target {
            let partner = if self.evolution.weighted_pairing {
                rank_weighted_partner(cursor, pool.len(), &mut self.rng)
            } else {
                uniform_partner(cursor, pool.len(), &mut self.rng)
            };

            let (first, second) = pool[cursor].crossover(&pool[partner], &mut self.rng);
            added_this_round |= next_gen.insert(first);
            if next_gen.len() < target {
                added_this_round |= next_gen.insert(second);
            }

            cursor += 1;
            if cursor == pool.len() {
                if !added_this_round {
                    log::debug!(
                        "generation {}: a full breeding round produced only duplicates ({} of {})",
                        self.generation,
                        next_gen.len(),
                        target
                    );
                    break;
                }
                cursor = 0;
                added_this_round = false;
            }
        }
    }

    /// Fully mutated copies of pool members, cycling through the pool in rank
    /// order, for at most `TOP_UP_ATTEMPTS_PER_SLOT` tries per missing genome
    fn top_up(&mut self, pool: &[Chromosome], next_gen: &mut Population, target: usize) {
        if pool.is_empty() {
            return;
        }
        let max_attempts = (target - next_gen.len()) * TOP_UP_ATTEMPTS_PER_SLOT;
        let mut attempts = 0;
        while next_gen.len() < target && attempts < max_attempts {
            let parent = &pool[attempts % pool.len()];
            next_gen.insert(parent.mutate(100, &self.genome, &mut self.rng));
            attempts += 1;
        }
        log::debug!(
            "generation {}: topped up to {} of {} after {} mutation attempts",
            self.generation,
            next_gen.len(),
            target,
            attempts
        );
    }
}

const TOP_UP_ATTEMPTS_PER_SLOT: usize = 10;

/// Individuals drawn for mutation. At least two stay behind so the pool
/// can still breed.
pub fn mutation_draws(pool_len: usize, mutation_percent: u32) -> usize {
    let wanted = pool_len * mutation_percent.min(100) as usize / 100;
    wanted.min(pool_len.saturating_sub(2))
}

/// Individuals kept by the cull: the top `(100 - cull_percent)%`, minus two
/// reserved slots, never fewer than one
pub fn survivor_count(ranked: usize, cull_percent: u32) -> usize {
    let kept = ranked * (100 - cull_percent.min(100) as usize) / 100;
    kept.saturating_sub(2).max(1)
}
