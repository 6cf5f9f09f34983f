use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use h3_country_cells::config::AppConfig;
use h3_country_cells::coverage::CancelToken;
use h3_country_cells::{center_of, pipeline, tiler};
use h3o::LatLng;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tile country boundaries and write one CSV per country and resolution
    Generate {
        /// Defaults to config.toml when present, built-in defaults otherwise
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Replaces the configured resolutions (repeatable)
        #[arg(short, long = "resolution", value_name = "RES")]
        resolutions: Vec<u8>,
        /// Replaces the configured output directory
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
    /// Print the cell containing a point and its centre
    Cell {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(short, long, default_value_t = 4)]
        resolution: u8,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            config,
            resolutions,
            out,
        } => {
            let mut app_config = load_config(config)?;
            if !resolutions.is_empty() {
                app_config.processing.resolutions = resolutions;
            }
            if let Some(out) = out {
                app_config.output.dir = out;
            }

            let report = pipeline::generate(&app_config, &CancelToken::new())?;
            let written = report.entries.len() - report.failures().count();
            info!(written, incomplete = report.incomplete().count(), "Generation complete");

            if report.has_failures() {
                for entry in report.failures() {
                    eprintln!("{}", entry);
                }
                bail!("{} cell set(s) could not be produced", report.failures().count());
            }
        }
        Commands::Cell {
            lat,
            lng,
            resolution,
        } => {
            let resolution = tiler::parse_resolution(resolution)?;
            let cell = LatLng::new(lat, lng)?.to_cell(resolution);
            let (center_lat, center_lng) = center_of(cell);
            println!("{} ({}) {:.6} {:.6}", cell, u64::from(cell), center_lat, center_lng);
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from_file(&path),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG);
            if default.exists() {
                AppConfig::load_from_file(&default)
            } else {
                Ok(AppConfig::default())
            }
        }
    }
}
