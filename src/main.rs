//! Scene Sampler CLI
//!
//! Converts recorded batches into role-assigned samples, balances and
//! summarises the resulting corpus.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scene_sampler::{
    config::Config,
    convert::{Converter, AUDIT_FILE_NAME},
    core::Dispatcher,
    stats::{classify_sample, CorpusStats, Equalizer, DEFAULT_SPEED_BINS},
    VERSION,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scene-sampler")]
#[command(version = VERSION)]
#[command(about = "Agent-centric trajectory samples from recorded traffic scenes", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every batch of a data folder into sample files
    Convert {
        /// Folder holding one subdirectory per recorded batch
        #[arg(long)]
        data_folder: PathBuf,

        /// Seed for AV selection (random if omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Maximum number of parallel candidate tasks
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Copy a label-balanced subset of a sample folder
    Equalize {
        /// Folder of sample files
        #[arg(long)]
        input: PathBuf,

        /// Destination folder
        #[arg(long)]
        output: PathBuf,

        /// Shuffle seed (random if omitted)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Label counts and speed distribution of a sample folder
    Stats {
        /// Folder of sample files
        #[arg(long)]
        input: PathBuf,

        /// Number of speed histogram bins
        #[arg(long, default_value_t = DEFAULT_SPEED_BINS)]
        bins: usize,

        /// Write the full statistics as JSON
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Classify the AGENT trajectory of one sample file
    Classify {
        /// Sample file
        file: PathBuf,
    },

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Convert {
            data_folder,
            seed,
            workers,
        } => cmd_convert(config, &data_folder, seed, workers),
        Commands::Equalize {
            input,
            output,
            seed,
        } => cmd_equalize(&config, &input, &output, seed),
        Commands::Stats {
            input,
            bins,
            output,
        } => cmd_stats(&config, &input, bins, output.as_deref()),
        Commands::Classify { file } => cmd_classify(&file),
        Commands::Config { save } => cmd_config(&config, cli.config.as_deref(), save),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::load().context("failed to load config"),
    }
}

fn cmd_convert(
    mut config: Config,
    data_folder: &Path,
    seed: Option<u64>,
    workers: Option<usize>,
) -> Result<()> {
    if seed.is_some() {
        config.seed = seed;
    }
    if let Some(workers) = workers {
        config.max_parallel_workers = workers;
    }

    println!("Scene Sampler v{VERSION}");
    println!();

    let stop = Arc::new(AtomicBool::new(false));
    ctrlc_handler(stop.clone())?;

    let converter = Converter::new(config)
        .context("invalid configuration")?
        .with_stop_flag(stop);

    println!("Converting batches in {}", data_folder.display());
    println!(
        "  Window: {} ticks, reference tick {}",
        converter.config().ticks_per_scene(),
        converter.config().reference_tick()
    );
    println!("  Radius: {}", converter.config().radius_around_agent);
    println!("  Workers: {}", converter.config().max_parallel_workers);
    println!("  Seed: {}", converter.seed());
    println!();
    println!("Press Ctrl+C to stop after the current window.");
    println!();

    let report = converter
        .convert(data_folder)
        .with_context(|| format!("conversion of {} failed", data_folder.display()))?;

    for batch in &report.batches {
        println!(
            "  {}: {} windows, {} samples, {} skipped",
            batch.batch,
            batch.windows,
            batch.summary.written,
            batch.summary.skipped()
        );
    }
    for failure in &report.failures {
        println!("  {}: FAILED ({})", failure.batch, failure.reason);
    }

    println!();
    println!("{}", converter.audit().summary());
    println!(
        "Run log written to {}",
        data_folder.join(AUDIT_FILE_NAME).display()
    );
    if report.interrupted {
        println!("Conversion was interrupted.");
    }

    Ok(())
}

fn cmd_equalize(config: &Config, input: &Path, output: &Path, seed: Option<u64>) -> Result<()> {
    let seed = seed.or(config.seed).unwrap_or_else(rand::random);
    let dispatcher = Dispatcher::new(config.max_parallel_workers);

    let equalizer = Equalizer::scan(input, &dispatcher)?;
    let report = equalizer.run(output, seed)?;

    println!("Bucket sizes:");
    for (label, size) in &report.bucket_sizes {
        println!("  {label:<9} {size}");
    }
    println!();
    println!(
        "Copied {} files ({} per label, seed {seed}) to {}",
        report.copied.len(),
        report.per_label,
        output.display()
    );
    if !report.failures.is_empty() {
        println!("Skipped {} unclassifiable files.", report.failures.len());
    }

    Ok(())
}

fn cmd_stats(config: &Config, input: &Path, bins: usize, output: Option<&Path>) -> Result<()> {
    let dispatcher = Dispatcher::new(config.max_parallel_workers);
    let stats = CorpusStats::collect(input, &dispatcher, bins)
        .with_context(|| format!("cannot read sample folder {}", input.display()))?;

    print!("{}", stats.summary());

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&stats)?;
        std::fs::write(path, json)
            .with_context(|| format!("cannot write {}", path.display()))?;
        println!("Statistics written to {}", path.display());
    }

    Ok(())
}

fn cmd_classify(file: &Path) -> Result<()> {
    let summary = classify_sample(file)?;
    println!(
        "{}: {} (average speed {:.3})",
        file.display(),
        summary.label,
        summary.average_speed
    );
    Ok(())
}

fn cmd_config(config: &Config, explicit: Option<&Path>, save: bool) -> Result<()> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", path.display());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        match explicit {
            Some(path) => config.save_to(path),
            None => config.save(),
        }
        .with_context(|| format!("cannot write {}", path.display()))?;
        println!();
        println!("Saved.");
    }

    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(stop: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl+C handler")
}
