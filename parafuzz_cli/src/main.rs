use parafuzz_core::config::{CampaignSettings, OutputConfig, ParafuzzConfig};
use parafuzz_core::coverage::CoverageCollector;
use parafuzz_core::generator::ExprGenerator;
use parafuzz_core::guidance::ParametricGuidance;
use parafuzz_core::modify::HavocModifier;
use parafuzz_core::output::FileManager;
use parafuzz_core::runner::{FuzzTarget, TargetError, TestRunner};
use parafuzz_core::select::RandomSelector;
use parafuzz_core::tracker::PopulationTracker;

use clap::Parser;
use rand_core::RngCore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    #[clap(short, long)]
    iterations: Option<u64>,
    #[clap(short, long)]
    seed: Option<u64>,
    #[clap(short, long)]
    output_dir: Option<PathBuf>,
}

/// Built-in demonstration target: inspects rendered arithmetic expressions
/// by shape, with probes on structural features and a planted
/// division-by-zero defect.
struct DemoTarget {
    component: usize,
}

impl DemoTarget {
    fn new(collector: &CoverageCollector) -> Self {
        Self {
            component: collector.register_component(6),
        }
    }
}

impl FuzzTarget for DemoTarget {
    fn run(
        &mut self,
        rendered: &str,
        coverage: &CoverageCollector,
    ) -> Result<(), TargetError> {
        coverage.hit(self.component, 0);
        if rendered.contains('+') {
            coverage.hit(self.component, 1);
        }
        if rendered.contains('*') {
            coverage.hit(self.component, 2);
        }
        if rendered.contains('/') {
            coverage.hit(self.component, 3);
        }
        let depth = rendered.matches('(').count();
        if depth > 3 {
            coverage.hit(self.component, 4);
        }
        if rendered.len() > 40 {
            coverage.hit(self.component, 5);
        }
        if depth > 24 {
            return Err(TargetError::ResourceExhausted(format!(
                "expression nesting depth {depth} exceeds evaluator stack"
            )));
        }
        if rendered.contains("/ 0") {
            return Err(TargetError::Failure("division by zero".to_string()));
        }
        Ok(())
    }
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match cli.config_file {
        Some(config_path) => {
            println!("Loading configuration from specified path: {config_path:?}",);
            ParafuzzConfig::load_from_file(&config_path)?
        }
        None => {
            let default_config_path = PathBuf::from("parafuzz.toml");
            if default_config_path.exists() {
                println!(
                    "No config file specified via CLI, loading default: {default_config_path:?}",
                );
                ParafuzzConfig::load_from_file(&default_config_path)?
            } else {
                println!(
                    "No config file specified and default 'parafuzz.toml' not found, using built-in defaults."
                );
                ParafuzzConfig::default()
            }
        }
    };

    if let Some(iterations) = cli.iterations {
        config
            .campaign
            .get_or_insert_with(Default::default)
            .max_iterations = iterations;
    }
    if let Some(seed) = cli.seed {
        config.campaign.get_or_insert_with(Default::default).seed = Some(seed);
    }
    if let Some(output_dir) = cli.output_dir {
        config
            .output
            .get_or_insert_with(Default::default)
            .directory = output_dir;
    }

    println!("Effective configuration: {config:#?}");

    let campaign = config.campaign.unwrap_or_else(CampaignSettings::default);
    let output = config.output.unwrap_or_else(OutputConfig::default);

    let seed = match campaign.seed {
        Some(seed) => seed,
        None => rand::rng().next_u64(),
    };
    log::info!("campaign seed {seed}");
    println!("Campaign seed: {seed}");

    let collector = Arc::new(CoverageCollector::new());
    let target = DemoTarget::new(&collector);
    let runner = TestRunner::new(
        Box::new(ExprGenerator::default()),
        Box::new(target),
        collector,
        Some(Duration::from_millis(campaign.trial_timeout_ms)),
    );
    let manager = FileManager::new(
        &output.directory,
        campaign.max_iterations,
        campaign.time_budget_ms.map(Duration::from_millis),
        campaign.stats_interval,
    )?;
    let mut guidance = ParametricGuidance::new(
        seed,
        runner,
        PopulationTracker::new(),
        Box::new(RandomSelector::new()),
        Box::new(HavocModifier::default()),
        manager,
    );

    println!(
        "Starting campaign for up to {} iterations, artifacts in {:?}...",
        campaign.max_iterations, output.directory
    );
    let start_time = Instant::now();
    guidance.fuzz()?;
    let elapsed_total = start_time.elapsed();

    let manager = guidance.manager();
    println!("Campaign finished in {elapsed_total:.2?}.");
    println!(
        "Total Executions: {}, Corpus Size: {}, Failures Found: {}",
        manager.executions(),
        manager.output().corpus_size(),
        manager.output().failures_size()
    );

    Ok(())
}
