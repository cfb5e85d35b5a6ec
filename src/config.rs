//! Configuration types for longitudinal-snapshot
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - The derived constants baked into the statistics schema

use crate::error::ConfigError;
use crate::schema::{log2_bucket_count, StatParams};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;

/// Default largest expected file size (bytes)
pub const DEFAULT_MAX_SIZE: u64 = 1 << 50;

/// Default largest expected name/linkname length
pub const DEFAULT_MAX_NAME_LEN: u64 = 1 << 8;

/// Default query engine executable, looked up on PATH
pub const DEFAULT_ENGINE: &str = "gufi_query";

/// Generate a longitudinal snapshot of an index
#[derive(Parser, Debug, Clone)]
#[command(
    name = "longitudinal-snapshot",
    disable_version_flag = true,
    about = "Generate a longitudinal snapshot of a filesystem index",
    long_about = "Walks an index with the query engine and stores one row of statistics per \
                  directory, alongside the index's tree rollups and a one-row metadata table.\n\n\
                  Snapshots of the same tree taken at different times share a schema, so they \
                  can be compared directly.",
    after_help = "EXAMPLES:\n    \
        longitudinal-snapshot /search/index snap.db\n    \
        longitudinal-snapshot /search/index snap.db -n 16 --notes 'weekly'\n    \
        longitudinal-snapshot /search/index snap.db --replace --reftime 1700000000 -V"
)]
pub struct CliArgs {
    /// Index to snapshot
    #[arg(value_name = "INDEX")]
    pub index: PathBuf,

    /// Output database file
    #[arg(value_name = "OUTNAME")]
    pub outname: PathBuf,

    /// Reference point for age histograms (seconds since the epoch, default now)
    #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
    pub reftime: Option<i64>,

    /// Maximum expected file size
    #[arg(
        long = "max_size",
        value_name = "POS_INT",
        default_value_t = DEFAULT_MAX_SIZE,
        value_parser = parse_positive
    )]
    pub max_size: u64,

    /// Maximum expected length of a name/linkname
    #[arg(
        long = "max_name_len",
        value_name = "POS_INT",
        default_value_t = DEFAULT_MAX_NAME_LEN,
        value_parser = parse_positive
    )]
    pub max_name_len: u64,

    /// Freeform text stored with the snapshot
    #[arg(long, value_name = "TEXT")]
    pub notes: Option<String>,

    /// Replace existing tables
    #[arg(long)]
    pub replace: bool,

    // -V belongs to verbose, which is why the version flag is disabled
    /// Show the engine command being executed
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Engine thread count
    #[arg(
        short = 'n',
        long,
        value_name = "COUNT",
        default_value_t = 1,
        value_parser = parse_positive_count
    )]
    pub threads: usize,

    /// Path to the query engine executable
    #[arg(
        long = "engine_path",
        alias = "gufi_query",
        value_name = "PATH",
        env = "SNAPSHOT_ENGINE",
        default_value = DEFAULT_ENGINE
    )]
    pub engine_path: PathBuf,
}

/// Parse a strictly positive integer
fn parse_positive(s: &str) -> Result<u64, String> {
    let value: i128 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not an integer", s))?;
    if value <= 0 {
        return Err(format!("{} must be a positive integer", value));
    }
    u64::try_from(value).map_err(|_| format!("{} is too large", value))
}

fn parse_positive_count(s: &str) -> Result<usize, String> {
    let value = parse_positive(s)?;
    usize::try_from(value).map_err(|_| format!("{} is too large", value))
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Index to snapshot
    pub index: PathBuf,

    /// Output store path
    pub output_path: PathBuf,

    /// Invocation time (seconds since the epoch), recorded in the metadata row
    pub timestamp: i64,

    /// Reference time for age histograms
    pub reftime: i64,

    /// Largest expected file size
    pub max_size: u64,

    /// Largest expected name length
    pub max_name_len: u64,

    /// Free-text note stored in the metadata row
    pub notes: Option<String>,

    /// Drop and recreate existing tables
    pub replace: bool,

    /// Print the engine command before running it
    pub verbose: bool,

    /// Engine worker count
    pub threads: usize,

    /// Engine executable
    pub engine_path: PathBuf,
}

impl SnapshotConfig {
    /// Create and validate configuration from CLI arguments.
    ///
    /// `now` is captured once by the caller; it is both the metadata
    /// timestamp and the default reference time.
    pub fn from_args(args: CliArgs, now: DateTime<Utc>) -> Result<Self, ConfigError> {
        let timestamp = now.timestamp();

        // Numeric bounds are checked by the value parsers when coming from the
        // command line, but CliArgs can also be built directly.
        if args.max_size == 0 {
            return Err(ConfigError::InvalidBound {
                name: "max_size",
                value: args.max_size,
            });
        }
        if args.max_name_len == 0 {
            return Err(ConfigError::InvalidBound {
                name: "max_name_len",
                value: args.max_name_len,
            });
        }
        if args.threads == 0 {
            return Err(ConfigError::InvalidThreadCount {
                count: args.threads,
            });
        }

        // Validate output path
        if args.outname.as_os_str().is_empty() {
            return Err(ConfigError::InvalidOutputPath {
                path: args.outname,
                reason: "Output path is empty".to_string(),
            });
        }
        if let Some(parent) = args.outname.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::InvalidOutputPath {
                    path: args.outname.clone(),
                    reason: format!("Parent directory '{}' does not exist", parent.display()),
                });
            }
        }

        Ok(Self {
            index: args.index,
            output_path: args.outname,
            timestamp,
            reftime: args.reftime.unwrap_or(timestamp),
            max_size: args.max_size,
            max_name_len: args.max_name_len,
            notes: args.notes,
            replace: args.replace,
            verbose: args.verbose,
            threads: args.threads,
            engine_path: args.engine_path,
        })
    }

    /// Constants for the statistics templates
    pub fn stat_params(&self) -> Result<StatParams, ConfigError> {
        Ok(StatParams {
            reftime: self.reftime,
            size_buckets: log2_bucket_count("max_size", self.max_size)?,
            name_len_buckets: log2_bucket_count("max_name_len", self.max_name_len)?,
        })
    }
}
