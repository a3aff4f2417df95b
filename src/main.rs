use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eer_costs::aggregator::{self, MultiScenarioAggregator};
use eer_costs::chart_data::{self, UnitCostStack, UnitScale};
use eer_costs::export::{self, ExportFormat};
use eer_costs::extractor::Dimension;
use eer_costs::grid::GridLoader;
use eer_costs::number_format;
use eer_costs::ExtractionConfig;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eer-costs")]
#[command(about = "Cost extraction and scenario comparison for process economic reports")]
#[command(version)]
struct Args {
    /// JSON config file (or set EER_COSTS_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare section costs across scenario reports
    Compare {
        /// Report files (json, csv, tsv, xlsx)
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Scenario labels, one per file in the same order
        #[arg(short, long = "scenario")]
        scenarios: Vec<String>,

        /// yearly, per_unit or percentage (default from config)
        #[arg(short, long)]
        dimension: Option<Dimension>,

        /// json or csv
        #[arg(long, default_value = "json")]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build chart data (breakdowns and unit costs) per scenario
    Profile {
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long = "scenario")]
        scenarios: Vec<String>,

        /// €, k€ or m€
        #[arg(long, default_value = "€")]
        scale: UnitScale,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the sections found in one report
    Sections {
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.verbose);

    let config = ExtractionConfig::resolve(args.config.as_deref())
        .context("Failed to load extraction config")?;

    match args.command {
        Commands::Compare { files, scenarios, dimension, format, output } => {
            run_compare(&config, files, scenarios, dimension, format, output)
        }
        Commands::Profile { files, scenarios, scale, output } => {
            run_profile(&config, files, scenarios, scale, output)
        }
        Commands::Sections { file } => run_sections(&config, &file),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_compare(
    config: &ExtractionConfig,
    files: Vec<PathBuf>,
    scenarios: Vec<String>,
    dimension: Option<Dimension>,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let inputs = aggregator::pair_inputs(&files, &scenarios)?;
    let dimension = dimension.unwrap_or(config.dimension);
    let aggregator = MultiScenarioAggregator::new(config.extractor()).with_dimension(dimension);

    let outcome = aggregator.aggregate_files(&inputs, &config.loader())?;
    info!(
        "Run {} at {} ({} dimension)",
        outcome.run_id,
        outcome.generated_at.to_rfc3339(),
        dimension
    );

    for failure in &outcome.failures {
        error!("Skipped {} ({}): {}", failure.name, failure.path.display(), failure.reason);
    }
    for report in &outcome.scenarios {
        for unmapped in &report.audit.unmapped {
            match &unmapped.suggestion {
                Some(alias) => warn!(
                    "{}: unmapped label '{}' in {} (row {}), closest alias '{}'",
                    report.name, unmapped.label, unmapped.section, unmapped.row, alias
                ),
                None => warn!(
                    "{}: unmapped label '{}' in {} (row {})",
                    report.name, unmapped.label, unmapped.section, unmapped.row
                ),
            }
        }
        if report.defaulted_fields > 0 {
            info!("{}: {} value(s) defaulted to 0", report.name, report.defaulted_fields);
        }
    }

    match output {
        Some(path) => export::write_comparison(&outcome.table, &path, format)?,
        None => {
            let body = match format {
                ExportFormat::Json => export::to_json(&outcome.table)?,
                ExportFormat::Csv => export::comparison_to_csv(&outcome.table)?,
            };
            println!("{}", body);
        }
    }
    Ok(())
}

fn run_profile(
    config: &ExtractionConfig,
    files: Vec<PathBuf>,
    scenarios: Vec<String>,
    scale: UnitScale,
    output: Option<PathBuf>,
) -> Result<()> {
    let inputs = aggregator::pair_inputs(&files, &scenarios)?;
    let (loaded, failures) = aggregator::load_scenarios(&inputs, &config.loader());
    for failure in &failures {
        error!("Skipped {} ({}): {}", failure.name, failure.path.display(), failure.reason);
    }
    if loaded.is_empty() {
        return Err(eer_costs::ExtractError::NoUsableScenarios(inputs.len()).into());
    }

    let extractor = config.extractor();
    let profile_extractor = config.profile_extractor(&extractor);
    let profiles: Vec<_> = loaded
        .iter()
        .map(|s| profile_extractor.extract(&s.name, &s.grid))
        .collect();

    let charts: Vec<_> = chart_data::profile_comparisons(&profiles)
        .iter()
        .map(|c| c.scaled(scale))
        .collect();
    let body = export::to_json(&json!({
        "scale": scale,
        "profiles": profiles,
        "charts": charts,
        "unit_costs": UnitCostStack::build(&profiles),
    }))?;

    match output {
        Some(path) => {
            std::fs::write(&path, body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Chart data written to {}", path.display());
        }
        None => println!("{}", body),
    }
    Ok(())
}

fn run_sections(config: &ExtractionConfig, file: &Path) -> Result<()> {
    let grid = config.loader().load(file)?;
    let format = number_format::detect(&grid);
    let sections = config.extractor().locator().locate(&grid);

    println!("{} ({} number format)", file.display(), format);
    if sections.is_empty() {
        println!("  no sections found");
    }
    for section in sections {
        println!("  rows {:>4}-{:<4} {}", section.start_row, section.end_row, section.name);
    }
    Ok(())
}
