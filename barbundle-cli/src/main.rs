//! BarBundle CLI: ingest per-symbol series into a local bundle and inspect the result.
//!
//! Commands:
//! - `ingest`: run the ingestion described by a TOML bundle config
//! - `inspect`: print a bundle's manifest and metadata table

use anyhow::{bail, Context, Result};
use barbundle_core::store::read_parquet;
use barbundle_core::{BundleManifest, Environment, IngestConfig, Ingester, ParquetBundle};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "barbundle",
    about = "BarBundle CLI: per-symbol OHLCV ingestion into bar bundles"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the bundle described by a TOML config.
    Ingest {
        /// Path to the bundle config.
        #[arg(long)]
        config: PathBuf,

        /// Bundle output directory. Defaults to ./bundles/<exchange>.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Suppress per-symbol progress output.
        #[arg(long, default_value_t = false)]
        quiet: bool,
    },
    /// Print a bundle's manifest and metadata table.
    Inspect {
        /// Bundle directory.
        #[arg(long)]
        bundle: PathBuf,

        /// Print the manifest as JSON only.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            config,
            output,
            quiet,
        } => run_ingest(&config, output, !quiet),
        Commands::Inspect { bundle, json } => run_inspect(&bundle, json),
    }
}

fn run_ingest(config_path: &Path, output: Option<PathBuf>, show_progress: bool) -> Result<()> {
    let mut config = IngestConfig::from_file(config_path)?;
    if let Some(home) = dirs::home_dir() {
        config.expand_home(&home);
    }

    let ingester = match Ingester::from_config(&config, None) {
        Ok(ingester) => ingester,
        Err(e) => bail!("{e} (the CLI only ingests directory sources)"),
    };
    let env = Environment::capture(config.env_var_names());

    let output = output.unwrap_or_else(|| PathBuf::from("bundles").join(&config.exchange));
    let mut bundle = ParquetBundle::create(&output)
        .with_context(|| format!("creating bundle at {}", output.display()))?;
    info!(bundle = %bundle.root().display(), exchange = %config.exchange, "ingesting");

    let report = ingester.ingest(&env, bundle.writers(), show_progress)?;
    let manifest = bundle.write_manifest(&config, &report)?;

    println!("Ingestion complete");
    println!("  Bundle:    {}", bundle.root().display());
    println!("  Frequency: {}", manifest.frequency);
    println!("  Resolved:  {}", report.resolved);
    println!("  Written:   {}", report.written);
    if report.skipped > 0 {
        println!("  Skipped:   {}", report.skipped);
    }
    println!("  Hash:      {}", manifest.metadata_hash);

    Ok(())
}

fn run_inspect(bundle: &Path, json: bool) -> Result<()> {
    if !bundle.is_dir() {
        bail!("bundle directory does not exist: {}", bundle.display());
    }
    let manifest = BundleManifest::load(bundle)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    println!("Bundle: {}", bundle.display());
    println!("  Exchange:    {}", manifest.exchange);
    println!("  Frequency:   {}", manifest.frequency);
    println!("  Ingested at: {}", manifest.ingested_at);
    println!("  Symbols:     {}", manifest.symbols.len());

    let equities = read_parquet(&bundle.join("equities.parquet"))?;
    println!("{equities}");

    Ok(())
}
