//! longitudinal-snapshot - Per-directory statistics snapshots of an index
//!
//! Builds the SQL that a parallel tree-walking query engine runs at every
//! directory of a filesystem index, producing a SQLite store with one row of
//! statistics per directory. Snapshots taken at different times share one
//! schema and can be compared side by side.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │   CLI: bounds, reftime, replace, threads, engine path    │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  schema: descriptor tables ──► SchemaPlan                │
//! │          (column, storage type, expression)*             │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  plan: -I  -T  -E  -K  -J  -G                            │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  engine (external, parallel per directory)               │
//! │    summary, treesummary, snapshot view                   │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │ exit 0
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  db::finalize: metadata (timestamp, src, notes)          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Snapshot an index
//! longitudinal-snapshot /search/index snap.db -n 16 --notes "weekly"
//!
//! # Largest directories by total file size
//! sqlite3 snap.db "SELECT name, size_sum FROM snapshot ORDER BY size_sum DESC LIMIT 10"
//! ```

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod plan;
pub mod report;
pub mod schema;
pub mod snapshot;
pub mod timings;

pub use config::{CliArgs, SnapshotConfig};
pub use engine::{EngineInvocation, ProcessEngine, QueryEngine};
pub use error::{Result, SnapshotError};
pub use plan::{Fragment, QueryPlan};
pub use schema::SchemaPlan;
pub use snapshot::{Snapshot, SnapshotOutcome};
