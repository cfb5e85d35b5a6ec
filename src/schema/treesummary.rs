//! Tree-rollup schema
//!
//! Fixed row layout of the engine-maintained `treesummary` table: one row
//! per node carrying min/max/total statistics for the whole subtree below
//! it. This layout is owned by the index, not by the statistics compiler,
//! and is copied through verbatim.

use super::StorageType;

/// Prefix applied to tree-rollup columns in the snapshot view
pub const VIEW_PREFIX: &str = "ts_";

/// Alias of the renamed tree-rollup subquery in the snapshot view
pub const VIEW_ALIAS: &str = "ts";

/// Tree-rollup columns, in table order
pub const TREESUMMARY_COLUMNS: &[(&str, StorageType)] = &[
    ("inode", StorageType::Text),
    ("totsubdirs", StorageType::Int64),
    ("maxsubdirfiles", StorageType::Int64),
    ("maxsubdirlinks", StorageType::Int64),
    ("maxsubdirsize", StorageType::Int64),
    ("totfiles", StorageType::Int64),
    ("totlinks", StorageType::Int64),
    ("minuid", StorageType::Int64),
    ("maxuid", StorageType::Int64),
    ("mingid", StorageType::Int64),
    ("maxgid", StorageType::Int64),
    ("minsize", StorageType::Int64),
    ("maxsize", StorageType::Int64),
    ("totzero", StorageType::Int64),
    ("totltk", StorageType::Int64),
    ("totmtk", StorageType::Int64),
    ("totltm", StorageType::Int64),
    ("totmtm", StorageType::Int64),
    ("totmtg", StorageType::Int64),
    ("totmtt", StorageType::Int64),
    ("totsize", StorageType::Int64),
    ("minctime", StorageType::Int64),
    ("maxctime", StorageType::Int64),
    ("minmtime", StorageType::Int64),
    ("maxmtime", StorageType::Int64),
    ("minatime", StorageType::Int64),
    ("maxatime", StorageType::Int64),
    ("minblocks", StorageType::Int64),
    ("maxblocks", StorageType::Int64),
    ("totxattr", StorageType::Int64),
    ("depth", StorageType::Int64),
    ("mincrtime", StorageType::Int64),
    ("maxcrtime", StorageType::Int64),
    ("minossint1", StorageType::Int64),
    ("maxossint1", StorageType::Int64),
    ("totossint1", StorageType::Int64),
    ("minossint2", StorageType::Int64),
    ("maxossint2", StorageType::Int64),
    ("totossint2", StorageType::Int64),
    ("minossint3", StorageType::Int64),
    ("maxossint3", StorageType::Int64),
    ("totossint3", StorageType::Int64),
    ("minossint4", StorageType::Int64),
    ("maxossint4", StorageType::Int64),
    ("totossint4", StorageType::Int64),
    ("rectype", StorageType::Int64),
    ("uid", StorageType::Int64),
    ("gid", StorageType::Int64),
];

/// `CREATE TABLE {table} (...)` with the tree-rollup layout
pub fn create_table_sql(table: &str) -> String {
    let cols: Vec<String> = TREESUMMARY_COLUMNS
        .iter()
        .map(|(name, storage)| format!("{} {}", name, storage))
        .collect();
    format!("CREATE TABLE {} ({})", table, cols.join(", "))
}

/// Select every tree-rollup column of `table` renamed with [`VIEW_PREFIX`]
pub fn renamed_select_sql(table: &str) -> String {
    let cols: Vec<String> = TREESUMMARY_COLUMNS
        .iter()
        .map(|(name, _)| format!("{name} AS {VIEW_PREFIX}{name}"))
        .collect();
    format!("SELECT {} FROM {}", cols.join(", "), table)
}
