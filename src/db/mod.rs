//! Output store access
//!
//! The query engine creates and fills the snapshot store itself. This module
//! only touches it after the engine has exited:
//!
//! ```text
//! ┌────────────────────────────────┐
//! │  engine: summary, treesummary, │
//! │          snapshot (view)       │
//! └───────────────┬────────────────┘
//!                 │ exit 0
//!                 ▼
//! ┌────────────────────────────────┐
//! │  finalize: metadata (1 row)    │
//! └────────────────────────────────┘
//! ```

pub mod metadata;

pub use metadata::{finalize, read_metadata, table_exists, write_metadata, SnapshotMetadata};
