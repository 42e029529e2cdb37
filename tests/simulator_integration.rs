use walkcontrol::config::AppConfig;
use walkcontrol::engines::evaluation::{EmulatorFactory, InCodeEmulator};
use walkcontrol::engines::generation::{
    Action, Chromosome, GenerationSummary, GenomeId, GenomeTree, ProgressCallback, Simulator,
};
use walkcontrol::{Result, WalkControlError};

/// Records what the simulator reported
#[derive(Default)]
struct TestProgressCallback {
    started: Vec<usize>,
    scored: usize,
    summaries: Vec<GenerationSummary>,
}

impl ProgressCallback for TestProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        self.started.push(generation);
    }

    fn on_chromosome_scored(&mut self, _scored: usize, _total: usize, _score: f64) {
        self.scored += 1;
    }

    fn on_generation_complete(&mut self, summary: &GenerationSummary) {
        println!(
            "Generation {}: best {:.3}, next population {}",
            summary.generation + 1,
            summary.best_score,
            summary.next_population_size
        );
        self.summaries.push(summary.clone());
    }
}

/// Small seeded population with runs bounded by pass count
fn create_test_config(seed: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.evolution.population_size = 12;
    config.evolution.seed = Some(seed);
    config.evolution.parallel_scoring = false;
    config.robot.run_length_ms = 1_000;
    config.robot.max_passes = Some(2);
    config
}

fn simulator(config: &AppConfig) -> Simulator<EmulatorFactory> {
    let factory = EmulatorFactory::new(&config.genome, &config.robot);
    Simulator::new(config, factory).unwrap()
}

fn ids(simulator: &Simulator<EmulatorFactory>) -> Vec<GenomeId> {
    simulator.population().iter().map(|c| c.id()).collect()
}

#[test]
fn test_seeded_population_is_distinct_and_full() {
    let config = create_test_config(1);
    let sim = simulator(&config);
    assert_eq!(sim.population().len(), 12);
    assert_eq!(sim.generation(), 0);
    assert!(sim.champion().is_none());

    let mut unique = ids(&sim);
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 12);
}

#[test]
fn test_tick_keeps_the_best_individual() {
    let config = create_test_config(2);
    let mut sim = simulator(&config);

    for _ in 0..5 {
        let before: Vec<Chromosome> = sim.population().iter().cloned().collect();
        let scores = sim.tick().unwrap();
        assert_eq!(scores.len(), before.len());

        // First individual, in population order, holding the top score
        let top = scores.values().copied().fold(f64::MIN, f64::max);
        let best = before.iter().find(|c| scores[&c.id()] == top).unwrap();

        let summary = sim.last_summary().unwrap();
        assert_eq!(summary.best_id, best.id());
        assert_eq!(summary.best_score, top);
        assert_eq!(sim.population().get(best.id()), Some(best));
        assert_eq!(sim.champion(), Some(best));
    }
}

/// Next population is full, or one short when the best was bred again
fn assert_population_held(sim: &Simulator<EmulatorFactory>, target: usize) {
    let size = sim.population().len();
    let summary = sim.last_summary().unwrap();
    assert!(
        size == target || size == target - 1,
        "generation {}: population {} of {}",
        summary.generation,
        size,
        target
    );
    assert!(sim.population().contains(summary.best_id));
    assert_eq!(summary.next_population_size, size);
}

#[test]
fn test_next_population_holds_its_size() {
    let config = create_test_config(3);
    let mut sim = simulator(&config);

    for generation in 1..=5 {
        sim.tick().unwrap();
        assert_population_held(&sim, config.evolution.population_size);
        assert_eq!(sim.generation(), generation);
    }
}

#[test]
fn test_heavy_mutation_does_not_starve_breeding() {
    let mut small = create_test_config(10);
    small.evolution.population_size = 4;
    small.evolution.mutation_percent = 50;

    let mut culled = create_test_config(11);
    culled.evolution.population_size = 10;
    culled.evolution.cull_percent = 80;
    culled.evolution.mutation_percent = 50;

    for config in [small, culled] {
        let mut sim = simulator(&config);
        for _ in 0..30 {
            sim.tick().unwrap();
            assert_population_held(&sim, config.evolution.population_size);
        }
    }
}

#[test]
fn test_same_seed_evolves_identically() {
    let config = create_test_config(4);
    let mut first = simulator(&config);
    let mut second = simulator(&config);
    assert_eq!(ids(&first), ids(&second));

    for _ in 0..4 {
        let a = first.tick().unwrap();
        let b = second.tick().unwrap();
        assert_eq!(a, b);
        assert_eq!(ids(&first), ids(&second));
    }
}

#[test]
fn test_parallel_scoring_matches_sequential() {
    let sequential_config = create_test_config(5);
    let mut parallel_config = create_test_config(5);
    parallel_config.evolution.parallel_scoring = true;

    let mut sequential = simulator(&sequential_config);
    let mut parallel = simulator(&parallel_config);

    for _ in 0..3 {
        assert_eq!(sequential.tick().unwrap(), parallel.tick().unwrap());
        assert_eq!(ids(&sequential), ids(&parallel));
    }
}

#[test]
fn test_weighted_pairing_runs() {
    let mut config = create_test_config(6);
    config.evolution.weighted_pairing = true;
    let mut sim = simulator(&config);

    let mut callback = TestProgressCallback::default();
    let last = sim.run(4, &mut callback).unwrap().unwrap();

    assert_eq!(callback.started, vec![0, 1, 2, 3]);
    assert_eq!(callback.summaries.len(), 4);
    assert_eq!(last.generation, 3);
    assert!(callback.scored >= 4 * 2);
    assert!(sim.population().len() <= config.evolution.population_size);
}

#[test]
fn test_single_node_population_is_topped_up() {
    let mut config = create_test_config(7);
    config.evolution.population_size = 6;
    let members: Vec<Chromosome> = (0..6u32)
        .map(|i| Chromosome::new(GenomeTree::from(Action::from([(0, i * 30)]))))
        .collect();

    let factory = EmulatorFactory::new(&config.genome, &config.robot);
    let mut sim = Simulator::with_population(&config, factory, members).unwrap();

    // Crossover between single nodes only yields copies; mutation fills the rest
    for _ in 0..3 {
        sim.tick().unwrap();
        assert_population_held(&sim, 6);
    }
}

#[test]
fn test_failed_tick_keeps_population() {
    let config = create_test_config(8);
    let factory = || -> Result<InCodeEmulator> { Err(WalkControlError::Robot("no robot attached".to_string())) };
    let mut sim = Simulator::new(&config, factory).unwrap();
    let before: Vec<GenomeId> = sim.population().iter().map(|c| c.id()).collect();

    assert!(matches!(sim.tick(), Err(WalkControlError::Robot(_))));
    let after: Vec<GenomeId> = sim.population().iter().map(|c| c.id()).collect();
    assert_eq!(before, after);
    assert_eq!(sim.generation(), 0);
    assert!(sim.last_summary().is_none());
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let mut config = create_test_config(9);
    config.evolution.population_size = 2;
    let factory = EmulatorFactory::new(&config.genome, &config.robot);
    assert!(matches!(
        Simulator::new(&config, factory),
        Err(WalkControlError::Configuration(_))
    ));

    let config = create_test_config(9);
    let factory = EmulatorFactory::new(&config.genome, &config.robot);
    assert!(Simulator::with_population(&config, factory, Vec::new()).is_err());

    // A lone genome, even when repeated, has no breeding partner
    let lone = Chromosome::new(GenomeTree::from(Action::from([(1, 5)])));
    let factory = EmulatorFactory::new(&config.genome, &config.robot);
    assert!(matches!(
        Simulator::with_population(&config, factory, vec![lone.clone(), lone]),
        Err(WalkControlError::Generation(_))
    ));
}
