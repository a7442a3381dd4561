#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays a Thero Idle level headlessly.

mod catalog_file;
mod checkpoint_transfer;
mod runner;
mod scenario;

use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use thero_idle_session::SessionCheckpoint;
use tracing_subscriber::EnvFilter;

use crate::scenario::Scenario;

/// Plays a level scenario to completion and reports the outcome.
#[derive(Debug, Parser)]
#[command(name = "thero-idle", version, about)]
struct Args {
    /// Scenario file describing the level and scripted placements (.toml or .json).
    scenario: PathBuf,

    /// Checkpoint to resume from: a JSON file or a file holding a transfer string.
    #[arg(long, value_name = "PATH")]
    checkpoint_in: Option<PathBuf>,

    /// Writes the final checkpoint as pretty-printed JSON.
    #[arg(long, value_name = "PATH")]
    checkpoint_out: Option<PathBuf>,

    /// Prints the final checkpoint as a single-line transfer string.
    #[arg(long)]
    export: bool,

    /// Overrides the scenario's tick limit.
    #[arg(long, value_name = "TICKS")]
    max_ticks: Option<u32>,

    /// Log filter; takes precedence over RUST_LOG.
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

/// Entry point for the Thero Idle command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref())?;

    let scenario = Scenario::load(&args.scenario)?;
    let checkpoint = args
        .checkpoint_in
        .as_deref()
        .map(read_checkpoint)
        .transpose()?;

    let report = runner::run(&scenario, checkpoint.as_ref(), args.max_ticks)?;
    println!("{report}");

    if let Some(path) = &args.checkpoint_out {
        let json = serde_json::to_string_pretty(&report.checkpoint)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write checkpoint {}", path.display()))?;
    }
    if args.export {
        println!("{}", checkpoint_transfer::encode(&report.checkpoint)?);
    }
    Ok(())
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log filter `{level}`"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
    Ok(())
}

/// Reads a checkpoint stored either as JSON or as a transfer string.
fn read_checkpoint(path: &Path) -> Result<SessionCheckpoint> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read checkpoint {}", path.display()))?;
    let checkpoint = if contents.trim_start().starts_with(checkpoint_transfer::TRANSFER_HEADER) {
        checkpoint_transfer::decode(&contents)?
    } else {
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse checkpoint {}", path.display()))?
    };
    Ok(checkpoint)
}
