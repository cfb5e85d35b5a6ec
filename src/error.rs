//! Error types for longitudinal-snapshot
//!
//! This module defines the error hierarchy that covers:
//! - Argument and configuration validation
//! - Schema compilation
//! - External query engine invocation
//! - SQLite output store finalization
//! - Ancillary timing extraction
//!
//! A non-zero exit from the query engine is not an error here. It is an
//! outcome (see [`crate::snapshot::SnapshotOutcome`]) whose code is handed
//! back to the caller unchanged.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the snapshot generator
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Schema compilation errors
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Query engine errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Configuration and CLI errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A magnitude bound that must be a positive integer was not
    #[error("Invalid {name} {value}: must be a positive integer")]
    InvalidBound { name: &'static str, value: u64 },

    /// Invalid thread count
    #[error("Invalid thread count {count}: must be at least 1")]
    InvalidThreadCount { count: usize },

    /// Output path error
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },
}

/// Schema compilation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two columns compiled to the same name
    #[error("Duplicate column '{name}' in compiled schema")]
    DuplicateColumn { name: String },
}

/// Query engine invocation errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine process could not be started
    #[error("Failed to start query engine '{program}': {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// The engine process ended without an exit status
    #[error("Query engine '{program}' terminated without an exit status")]
    NoExitStatus { program: PathBuf },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Output store could not be opened
    #[error("Failed to open snapshot store at '{path}': {reason}")]
    OpenFailed { path: PathBuf, reason: String },
}

/// Errors raised while extracting ancillary records from engine output
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// A required field was never seen in the input
    #[error("Cumulative times data missing \"{field}\" on run {run}")]
    MissingField { field: String, run: String },

    /// A field was present but its value did not parse
    #[error("Invalid value '{value}' for \"{field}\" on run {run}")]
    InvalidValue {
        field: String,
        run: String,
        value: String,
    },

    /// The input could not be read
    #[error("Failed to read timing data for run {run}: {reason}")]
    Read { run: String, reason: String },
}

/// Result type alias for SnapshotError
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Result type alias for DbError
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Result type alias for EngineError
pub type EngineResult<T> = std::result::Result<T, EngineError>;
