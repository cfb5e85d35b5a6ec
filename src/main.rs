//! longitudinal-snapshot - Per-directory statistics snapshots of an index
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use longitudinal_snapshot::config::{CliArgs, SnapshotConfig};
use longitudinal_snapshot::engine::ProcessEngine;
use longitudinal_snapshot::report::print_summary;
use longitudinal_snapshot::snapshot::{Snapshot, SnapshotOutcome};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(code) => exit_code(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Exit codes outside 0..=255 cannot be reported as-is
fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

fn run() -> Result<i32> {
    // Capture the timestamp before anything else
    let now = Utc::now();

    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = SnapshotConfig::from_args(args, now).context("Invalid configuration")?;
    let engine = ProcessEngine::new(&config.engine_path);
    let snapshot = Snapshot::new(config);

    let outcome = snapshot.run(&engine).context("Snapshot failed")?;

    match outcome {
        SnapshotOutcome::Completed { columns, duration } => {
            let config = snapshot.config();
            if config.verbose {
                print_summary(&config.output_path, columns, duration.as_secs_f64());
            }
        }
        SnapshotOutcome::EngineFailed { code } => {
            info!(code, "Snapshot not finalized");
        }
    }

    Ok(outcome.exit_code())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("longitudinal_snapshot=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("longitudinal_snapshot=warn"))
    };

    // stdout belongs to the verbose command listing
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
