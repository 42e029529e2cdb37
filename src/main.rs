use anyhow::Context;
use std::env;
use walkcontrol::config::{AppConfig, ConfigManager};
use walkcontrol::engines::evaluation::EmulatorFactory;
use walkcontrol::engines::generation::{
    GenerationSummary, LogProgressCallback, ProgressCallback, Simulator,
};
use walkcontrol::types::ServoState;

const DEFAULT_GENERATIONS: usize = 100;

/// Logs like `LogProgressCallback` and also prints each summary as a JSON line
struct JsonLinesCallback {
    log: LogProgressCallback,
}

impl ProgressCallback for JsonLinesCallback {
    fn on_generation_start(&mut self, generation: usize) {
        self.log.on_generation_start(generation);
    }

    fn on_chromosome_scored(&mut self, scored: usize, total: usize, score: f64) {
        self.log.on_chromosome_scored(scored, total, score);
    }

    fn on_generation_complete(&mut self, summary: &GenerationSummary) {
        self.log.on_generation_complete(summary);
        match serde_json::to_string(summary) {
            Ok(line) => println!("{}", line),
            Err(e) => log::warn!("Could not encode generation summary: {}", e),
        }
    }
}

fn usage() -> ! {
    eprintln!("usage: walkcontrol [CONFIG] [GENERATIONS] [--json]");
    std::process::exit(2);
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage();
    }
    let json = args.iter().any(|a| a == "--json");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    let config = match positional.first() {
        Some(path) => {
            let manager = ConfigManager::new();
            manager
                .load_from_file(path.as_str())
                .with_context(|| format!("loading {}", path))?;
            manager.get()
        }
        // Defaults, still open to environment overrides
        None => AppConfig::from_toml_str("")?,
    };

    let generations = match positional.get(1) {
        Some(raw) => raw
            .parse::<usize>()
            .with_context(|| format!("invalid generation count: {}", raw))?,
        None => DEFAULT_GENERATIONS,
    };

    log::info!(
        "Evolving {} programs for {} generations ({} servos, seed {:?})",
        config.evolution.population_size,
        generations,
        config.genome.num_servos,
        config.evolution.seed
    );

    let factory = EmulatorFactory::new(&config.genome, &config.robot);
    let mut simulator = Simulator::new(&config, factory)?;

    let last = if json {
        let mut callback = JsonLinesCallback { log: LogProgressCallback };
        simulator.run(generations, &mut callback)?
    } else {
        simulator.run(generations, &mut LogProgressCallback)?
    };

    if let (Some(summary), Some(champion)) = (last, simulator.champion()) {
        let zero_pose: ServoState = (0..config.genome.num_servos).map(|joint| (joint, 0)).collect();
        log::info!(
            "Champion {} scored {:.3} with {} nodes",
            champion.id(),
            summary.best_score,
            champion.node_count()
        );
        log::info!("  Program: {}", champion.genome().to_formula());
        log::info!("  First pass from rest: {}", champion.serialize(&zero_pose)?);
    }

    Ok(())
}
