use std::sync::Arc;

use anyhow::{bail, Context, Result};
use factor_scoring::ScoringEngine;
use ranker_core::DataProvider;
use ranking_pipeline::{
    default_universe, from_symbols, load_universe_csv, RankingPipeline, RunReport, SnapshotProvider,
    UniverseEntry,
};
use yahoo_client::YahooClient;

mod config;

use config::{RunnerConfig, USAGE};

const DEFAULT_LOG_FILTER: &str = "ranker=info,ranking_pipeline=info,factor_scoring=info,yahoo_client=warn";

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = RunnerConfig::from_env().context("Invalid environment configuration")?;
    config.apply_args(&args)?;
    config.validate()?;

    let engine = ScoringEngine::new(config.scoring_config()?).context("Invalid scoring configuration")?;
    let universe = load_universe(&config)?;
    let provider = build_provider(&config)?;

    let pipeline = RankingPipeline::new(provider, engine, config.pipeline_options())?;
    let report = pipeline.run(&universe).await?;

    report
        .write_json(&config.output_path)
        .with_context(|| format!("Failed to write {}", config.output_path.display()))?;
    print_summary(&report, config.top_n);

    Ok(())
}

fn load_universe(config: &RunnerConfig) -> Result<Vec<UniverseEntry>> {
    let universe = if !config.symbols.is_empty() {
        from_symbols(&config.symbols)
    } else if let Some(path) = &config.universe_csv {
        load_universe_csv(path).with_context(|| format!("Failed to load universe {}", path.display()))?
    } else {
        tracing::info!("No universe given, using the built-in Nifty 50 list");
        default_universe()
    };

    if universe.is_empty() {
        bail!("Universe is empty");
    }
    Ok(universe)
}

fn build_provider(config: &RunnerConfig) -> Result<Arc<dyn DataProvider>> {
    match &config.snapshot {
        Some(path) => {
            let snapshot = SnapshotProvider::load(path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
            Ok(Arc::new(snapshot))
        }
        None => Ok(Arc::new(YahooClient::new(config.rate_limit))),
    }
}

fn print_summary(report: &RunReport, top_n: usize) {
    println!();
    println!(
        "Ranked {} of {} ({} fetched, {} excluded)",
        report.ranked.len(),
        report.universe_size,
        report.fetched,
        report.excluded.len()
    );
    println!();
    println!("{:>4}  {:<14} {:<32} {:<18} {:>6}", "Rank", "Symbol", "Name", "Category", "Score");
    for r in report.top(top_n) {
        let name: String = r.name.chars().take(32).collect();
        println!(
            "{:>4}  {:<14} {:<32} {:<18} {:>6}{}",
            r.rank,
            r.symbol,
            name,
            r.category_label,
            r.score,
            if r.penalty_applied { "  (penalized)" } else { "" }
        );
    }

    if !report.sector_leaders.is_empty() {
        println!();
        println!("Sector leaders:");
        for leader in &report.sector_leaders {
            println!("  {:<28} {:<14} {:>6}", leader.sector, leader.symbol, leader.score);
        }
    }

    for exclusion in &report.excluded {
        tracing::warn!("Excluded {}: {:?}", exclusion.symbol, exclusion.reason);
    }
}
