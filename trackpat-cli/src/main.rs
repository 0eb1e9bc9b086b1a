//! trackpat CLI
//!
//! Runs track finding over event files and writes the tracks found.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand};

use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use trackpat_algorithms::{HelixFitter, TrackFinder};
use trackpat_core::{DetectorGeometry, EventStatistics};
use trackpat_io::{load_run_config, read_events, RunConfig, TrackFileWriter};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    TrackpatIo(#[from] trackpat_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] trackpat_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Track pattern recognition for gaseous tracking detectors.
#[derive(Parser)]
#[command(name = "trackpat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find tracks in event files
    Process {
        /// Input event file(s), JSON array or JSON lines
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output file path (.csv for a summary, anything else for JSON lines)
        #[arg(short, long)]
        output: PathBuf,

        /// Run configuration (JSON with "tracking" and "geometry")
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the hit distance cut (mm)
        #[arg(long)]
        distance_cut: Option<f64>,

        /// Override the number of seeding passes
        #[arg(long)]
        seed_passes: Option<u32>,

        /// Override the minimum seed size
        #[arg(long)]
        min_cluster_size: Option<usize>,

        /// Extend tracks into the auxiliary layers
        #[arg(long)]
        pickup: bool,
    },

    /// Show information about an event file
    Info {
        /// Input event file
        input: PathBuf,
    },

    /// Print the default run configuration as JSON
    Config,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Process {
            input,
            output,
            config,
            distance_cut,
            seed_passes,
            min_cluster_size,
            pickup,
        } => {
            let mut run = match config {
                Some(path) => load_run_config(path)?,
                None => RunConfig::default(),
            };
            if let Some(cut) = distance_cut {
                run.tracking.distance_cut = cut;
            }
            if let Some(passes) = seed_passes {
                run.tracking.seed_passes = passes;
            }
            if let Some(size) = min_cluster_size {
                run.tracking.min_cluster_size = size;
            }
            if pickup {
                run.tracking.pick_up_auxiliary_hits = true;
            }

            let fitter = HelixFitter::new(&run.geometry);
            let finder = TrackFinder::new(run.tracking, fitter, run.geometry)?;
            log::info!(
                "{} pad rows, distance cut {} mm, {} passes",
                finder.geometry().n_layers(),
                finder.config().distance_cut,
                finder.config().seed_passes
            );

            let csv = output
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            let mut writer = TrackFileWriter::create(&output)?;
            if csv {
                writer.write_csv_header()?;
            }
            log::info!("writing tracks to {}", output.display());

            let start = Instant::now();
            let mut totals = EventStatistics::default();
            for path in &input {
                let events = read_events(path)?;
                let batch = finder.process_events(&events);
                for result in &batch.events {
                    if csv {
                        writer.write_event_csv(result)?;
                    } else {
                        writer.write_event_jsonl(result)?;
                    }
                }
                log::info!(
                    "{}: {} events, {} tracks",
                    path.display(),
                    batch.statistics.events,
                    batch.statistics.tracks
                );
                totals += batch.statistics;
            }
            writer.flush()?;

            let elapsed = start.elapsed();
            println!(
                "Processed {} events in {:.2}s",
                totals.events,
                elapsed.as_secs_f64()
            );
            println!("Hits: {} ({} dropped)", totals.hits, totals.hits_dropped);
            println!(
                "Seeds: {} ({} failed fits, {} split, {} rejected for duplicate rows)",
                totals.seeds, totals.failed_fits, totals.split_clusters, totals.rejected_duplicate_rows
            );
            println!(
                "Tracks: {} ({} complete, {} segments merged)",
                totals.tracks, totals.complete_tracks, totals.merged_segments
            );
            if totals.auxiliary_hits > 0 {
                println!("Auxiliary hits picked up: {}", totals.auxiliary_hits);
            }
        }

        Commands::Info { input } => {
            let events = read_events(&input)?;
            let hits: usize = events.iter().map(|e| e.hits.len()).sum();
            let auxiliary: usize = events.iter().map(|e| e.auxiliary_hits.len()).sum();

            println!("File: {}", input.display());
            println!("Events: {}", events.len());
            println!("Hits: {} (+{} auxiliary)", hits, auxiliary);
            if !events.is_empty() {
                println!("Mean hits per event: {:.1}", hits as f64 / events.len() as f64);
            }

            let positions = events.iter().flat_map(|e| e.hits.iter().map(|h| h.position));
            let (mut rho_min, mut rho_max) = (f64::INFINITY, f64::NEG_INFINITY);
            let (mut z_min, mut z_max) = (f64::INFINITY, f64::NEG_INFINITY);
            for p in positions {
                rho_min = rho_min.min(p.rho());
                rho_max = rho_max.max(p.rho());
                z_min = z_min.min(p.z);
                z_max = z_max.max(p.z);
            }
            if hits > 0 {
                println!("Radius range: {:.1} - {:.1} mm", rho_min, rho_max);
                println!("Z range: {:.1} - {:.1} mm", z_min, z_max);
            }
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&RunConfig::default())?);
        }
    }

    Ok(())
}
