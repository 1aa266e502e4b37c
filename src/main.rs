//! geoid_mesh - main entry point
//!
//! Reads a geoid undulation grid and an elevation grid, decimates both to the
//! requested output step and writes one geoid and one topography OBJ vertex
//! file per exaggeration factor.
//!
//! Settings come from built-in defaults, then an optional JSON file
//! (`--config`), then the command line.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geoid_mesh::config::{DEFAULT_EXAGGERATION, DEFAULT_TARGET_STEP};
use geoid_mesh::{
    run_export, CancelFlag, ConfigFile, DefaultApplied, ExportConfig, ExportError, ExportSummary,
};

#[cfg(feature = "jemalloc")]
use tikv_jemallocator::Jemalloc;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Paired geoid and topography meshes from global grids
#[derive(Parser, Debug)]
#[command(name = "geoid_mesh")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Convert undulation and elevation grids into WGS84 OBJ vertex files", long_about = None)]
struct Cli {
    /// Geoid undulation grid (`lat lon undulation` rows)
    undulation_grid: Option<PathBuf>,

    /// Elevation grid (one row per latitude, longitudes -180..180)
    elevation_grid: Option<PathBuf>,

    /// Vertical exaggeration factors, e.g. 1,2,5
    #[arg(short, long = "exaggeration", value_delimiter = ',')]
    exaggerations: Option<Vec<u32>>,

    /// Output step in arc-minutes
    #[arg(short, long)]
    step: Option<u32>,

    /// Directory that receives the output directories
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Multiplier from elevation grid units to meters
    #[arg(long)]
    elevation_scale: Option<f64>,

    #[arg(long)]
    geoid_prefix: Option<String>,

    #[arg(long)]
    topo_prefix: Option<String>,

    /// JSON settings file; command-line values take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a JSON run summary to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn to_config_file(&self) -> ConfigFile {
        ConfigFile {
            undulation_grid: self.undulation_grid.clone(),
            elevation_grid: self.elevation_grid.clone(),
            exaggerations: self.exaggerations.clone(),
            target_step: self.step,
            output_root: self.output.clone(),
            elevation_scale: self.elevation_scale,
            geoid_prefix: self.geoid_prefix.clone(),
            topo_prefix: self.topo_prefix.clone(),
        }
    }
}

fn init_logging(log_level: &str) -> anyhow::Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("{} {:#}", "✗ Failed to initialize logging:".red(), e);
        std::process::exit(1);
    }

    match run(cli).await {
        Ok(summary) => {
            println!(
                "{}",
                format!("Finished in {:.2}s", summary.elapsed_secs).green()
            );
        }
        Err(e) => {
            if matches!(e.downcast_ref::<ExportError>(), Some(ExportError::Interrupted)) {
                eprintln!("{}", "Interrupted, partial outputs removed".yellow());
                return;
            }
            eprintln!("{} {:#}", "✗ Export failed:".red(), e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExportSummary> {
    let file = match &cli.config {
        Some(path) => ConfigFile::load(path)
            .with_context(|| format!("loading config file '{}'", path.display()))?,
        None => ConfigFile::default(),
    };
    let config = ExportConfig::from_sources(file.overlay(cli.to_config_file()))
        .context("invalid configuration")?;

    for applied in &config.defaults_applied {
        let message = match applied {
            DefaultApplied::Exaggeration => {
                format!("Using default exaggeration factor: {}", DEFAULT_EXAGGERATION)
            }
            DefaultApplied::TargetStep => {
                format!("Using default output step: {} minutes", DEFAULT_TARGET_STEP)
            }
        };
        println!("{}", message.yellow());
    }

    let cancel = CancelFlag::new();
    let export = run_export(&config, &cancel);
    tokio::pin!(export);

    let summary = tokio::select! {
        result = &mut export => result?,
        Ok(()) = tokio::signal::ctrl_c() => {
            eprintln!("{}", "Interrupt received, cleaning up...".yellow());
            cancel.cancel();
            export.await?
        }
    };

    println!(
        "{}",
        format!(
            "Output directories created: {} and {}",
            config.output_root.join(config.geoid_dir_name()).display(),
            config.output_root.join(config.topo_dir_name()).display()
        )
        .green()
    );

    if let Some(path) = &cli.summary {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing summary to '{}'", path.display()))?;
    }

    Ok(summary)
}
