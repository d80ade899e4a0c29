//! cnnkit - train, compress and inspect small convolutional classifiers.
//!
//! Usage:
//!   cnnkit train --epochs 50 -o model.bin                 # Train on synthetic bars
//!   cnnkit train --config net.json --prune 0.2 --quantize  # Train with compression
//!   cnnkit train --teacher-kernels 8 -o student.bin        # Distil from a larger network
//!   cnnkit inspect model.bin                               # Show model header
//!   cnnkit config-template > net.json                      # Default configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;

use commands::{config_template, inspect, train};

/// cnnkit - convolutional classifier trainer
///
/// Trains the five-stage conv/pool/dense network on a synthetic dataset,
/// optionally pruning, quantizing or distilling it, and writes ORIG/QNT
/// model files.
#[derive(Parser)]
#[command(name = "cnnkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (debug-level logs)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a network and optionally save it
    Train(train::TrainArgs),

    /// Show the header of a model file
    Inspect {
        /// Path to a model file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Network configuration to fully decode the weights against
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default network configuration as JSON
    ConfigTemplate {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Train(args) => train::run(&args),
        Commands::Inspect { file, config, json } => inspect::run(&file, config.as_deref(), json),
        Commands::ConfigTemplate { output } => config_template::run(output.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}
