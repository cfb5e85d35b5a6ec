//! Statistics schema for longitudinal snapshots
//!
//! The per-node summary table is described as data: each attribute family
//! declares its statistics as `(name, expression template, storage type)`
//! triples, and the compiler flattens them into one ordered [`SchemaPlan`].
//! The same plan declares the intermediate table, the final table and the
//! per-node half of the snapshot view, so they cannot drift apart.
//!
//! # Pipeline
//!
//! ```text
//!   max_size, max_name_len ──► buckets ──┐
//!                                        ▼
//!   reftime ──────────────────────► StatParams
//!                                        │
//!   SUMMARY_FIELDS + Family::ALL ────────┤
//!                                        ▼
//!                                   SchemaPlan
//!                          (column, type, expression)*
//!                                        │
//!                                        ▼
//!                                plan::QueryPlan
//! ```

pub mod buckets;
pub mod compiler;
pub mod stats;
pub mod treesummary;

pub use buckets::log2_bucket_count;
pub use compiler::{PlannedColumn, SchemaPlan};
pub use stats::{Family, StatParams, Statistic, SummaryField, SUMMARY_FIELDS};

use std::borrow::Cow;
use std::fmt;

/// Per-directory summary rows as exposed by the index at each node
pub const VRXSUMMARY: &str = "vrxsummary";

/// Per-entry rows (files and links) as exposed by the index at each node
pub const VRXPENTRIES: &str = "vrxpentries";

/// Identity column of a node
pub const INODE: &str = "inode";

/// Column on an entry that references its owning node
pub const PINODE: &str = "pinode";

/// Placeholder for the source table alias inside an expression template
pub const SRC: &str = "{src}";

/// Storage class of a compiled column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    Null,
    Int64,
    Double,
    Text,
    Blob,
}

impl StorageType {
    /// Type name used in `CREATE TABLE` column lists
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Int64 => "INT64",
            Self::Double => "DOUBLE",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Which index table a column's expression is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The node's own summary row
    Summary,
    /// The node's child entry rows
    Entries,
}

impl Source {
    /// Concrete table alias substituted for [`SRC`]
    pub fn alias(&self) -> &'static str {
        match self {
            Self::Summary => VRXSUMMARY,
            Self::Entries => VRXPENTRIES,
        }
    }
}

/// A SQL value expression written against the [`SRC`] placeholder.
///
/// Templates are pure: everything except the alias (bucket counts, the
/// reference time) is baked in when the template is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template(Cow<'static, str>);

impl Template {
    /// Template from a static string
    pub const fn from_static(sql: &'static str) -> Self {
        Self(Cow::Borrowed(sql))
    }

    /// Template from an owned string
    pub fn new(sql: impl Into<String>) -> Self {
        Self(Cow::Owned(sql.into()))
    }

    /// Substitute the concrete source alias
    pub fn render(&self, alias: &str) -> String {
        self.0.replace(SRC, alias)
    }

    /// Whether the expression reads from the source table at all
    pub fn references_source(&self) -> bool {
        self.0.contains(SRC)
    }
}
