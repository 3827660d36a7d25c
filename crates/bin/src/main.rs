//! AIBPS CLI binary.
//!
//! Computes the composite index from a directory of raw series files.

mod log;

use aibps::core::Normalization;
use aibps::data::CsvDirSource;
use aibps::output::{ExportFormat, RunSummary, write_placeholder};
use aibps::{Catalog, IndexConfig, IndexPipeline, PipelineError};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process;
use tracing::warn;

#[derive(Parser)]
#[command(name = "aibps")]
#[command(about = "AIBPS: composite AI boom pressure index", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// JSON configuration file
    #[arg(long, global = true, env = "AIBPS_CONFIG")]
    config: Option<PathBuf>,

    /// JSON catalog replacing the built-in pillar recipes
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the index and write its tables
    Compute {
        /// Directory holding one `<identifier>.csv` per raw input
        #[arg(long, default_value = "data/raw")]
        data_dir: PathBuf,

        /// Directory receiving the output tables
        #[arg(long, default_value = "data/processed")]
        out_dir: PathBuf,

        /// Output format (csv, json or pretty-json)
        #[arg(long, default_value = "csv")]
        format: String,

        /// Sample composite copied, marked as a placeholder, when no composite can be built
        #[arg(long)]
        fallback: Option<PathBuf>,

        /// Percentile window in months
        #[arg(long)]
        percentile_window: Option<usize>,

        /// Smoothing window of AIBPS_RA in rows
        #[arg(long)]
        smoothing_window: Option<usize>,

        /// Rebase date (YYYY-MM-DD)
        #[arg(long)]
        baseline: Option<NaiveDate>,

        /// Write the run summary as Markdown to this file
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// List pillar recipes and their inputs
    Catalog,

    /// Print the effective configuration
    Config,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    log::init_logging(cli.verbose);

    let catalog = load_catalog(cli.catalog.as_deref())?;

    match cli.command {
        Commands::Compute {
            data_dir,
            out_dir,
            format,
            fallback,
            percentile_window,
            smoothing_window,
            baseline,
            summary,
        } => {
            let mut config = IndexConfig::load(cli.config.as_deref())?;
            if let Some(window) = percentile_window {
                config.percentile.window = window;
            }
            if let Some(window) = smoothing_window {
                config.smoothing_window = window;
            }
            if let Some(baseline) = baseline {
                config.baseline = baseline;
            }
            config.validate()?;

            let format: ExportFormat = format.parse()?;
            let request = ComputeRequest {
                data_dir: &data_dir,
                out_dir: &out_dir,
                format,
                fallback: fallback.as_deref(),
                summary: summary.as_deref(),
            };
            compute(config, catalog, &request)?;
        }
        Commands::Catalog => list_catalog(&catalog),
        Commands::Config => {
            let config = IndexConfig::load(cli.config.as_deref())?;
            println!("{}", config.to_json_pretty()?);
        }
    }

    Ok(())
}

struct ComputeRequest<'a> {
    data_dir: &'a Path,
    out_dir: &'a Path,
    format: ExportFormat,
    fallback: Option<&'a Path>,
    summary: Option<&'a Path>,
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(Catalog::from_json(&std::fs::read_to_string(path)?)?),
        None => Ok(Catalog::default()),
    }
}

fn compute(
    config: IndexConfig,
    catalog: Catalog,
    request: &ComputeRequest<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = CsvDirSource::new(request.data_dir);
    let pipeline = IndexPipeline::new(config, catalog);

    let pb = ProgressBar::new(pipeline.catalog().len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );

    let result = pipeline.run_with_progress(&source, |recipe| {
        pb.set_message(recipe.kind.to_string());
        pb.inc(1);
    });

    match result {
        Ok(run) => {
            pb.finish_with_message(format!("Built {} pillars", run.pillars.len()));
            for path in run.export(request.out_dir, request.format)? {
                println!("Wrote {}", path.display());
            }
            report(&run.summary(request.data_dir.display().to_string()), request)
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            if let Some(audit) = e.audit() {
                let summary =
                    RunSummary::without_index(request.data_dir.display().to_string(), audit);
                report(&summary, request)?;
            }
            match (request.fallback, e.is_no_composite()) {
                (Some(fallback), true) => write_fallback(fallback, request, &e),
                _ => Err(e.into()),
            }
        }
    }
}

fn report(
    summary: &RunSummary,
    request: &ComputeRequest<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", summary.to_ascii_table());
    if let Some(path) = request.summary {
        std::fs::write(path, summary.to_markdown())?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn write_fallback(
    fallback: &Path,
    request: &ComputeRequest<'_>,
    error: &PipelineError,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(request.out_dir)?;
    let dest = request
        .out_dir
        .join(format!("aibps_monthly.{}", request.format.extension()));
    write_placeholder(fallback, &dest, &error.to_string())?;
    warn!(
        fallback = %fallback.display(),
        dest = %dest.display(),
        "no composite available, wrote placeholder composite"
    );
    eprintln!(
        "Warning: {error}; {} is a placeholder copied from {}",
        dest.display(),
        fallback.display()
    );
    Ok(())
}

fn list_catalog(catalog: &Catalog) {
    println!(
        "\n{:<14} {:<30} {:<16} Inputs",
        "Pillar", "Component", "Normalization"
    );
    println!("{}", "=".repeat(80));
    for pillar in catalog.pillars() {
        for component in &pillar.components {
            let normalization = match component.normalization {
                Normalization::Percentile { invert: true, .. } => "percentile inv",
                Normalization::Percentile { .. } => "percentile",
                Normalization::Rebase => "rebase",
            };
            println!(
                "{:<14} {:<30} {:<16} {}",
                pillar.kind.to_string(),
                component.name,
                normalization,
                component.inputs.join(", ")
            );
        }
    }
    println!("{}", "=".repeat(80));
    println!(
        "{} pillars, {} inputs",
        catalog.len(),
        catalog.inputs().len()
    );
}
