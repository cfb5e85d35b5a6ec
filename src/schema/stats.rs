//! Statistic descriptor tables
//!
//! Every attribute family declares a closed, ordered set of statistics.
//! Statistic names are part of the snapshot's on-disk schema, so they must
//! stay stable for snapshots taken at different times to be comparable.
//!
//! Aggregates other than the SQL core ones (`median`, `stdevp`,
//! `mode_count`, `log2_hist`, `time_hist`, `mode_hist`, `category_hist`,
//! `basename`, `level`, `subdirs`) are built-ins of the query engine.

use super::{StorageType, Template, SRC};

/// Constants baked into the family templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatParams {
    /// Reference point (seconds since the epoch) for age histograms
    pub reftime: i64,

    /// Log2 bucket count for the size histogram
    pub size_buckets: u32,

    /// Log2 bucket count for name/linkname/xattr length histograms
    pub name_len_buckets: u32,
}

/// One statistic of an attribute family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistic {
    pub name: &'static str,
    pub template: Template,
    pub storage: StorageType,
}

impl Statistic {
    fn new(name: &'static str, sql: String, storage: StorageType) -> Self {
        Self {
            name,
            template: Template::new(sql),
            storage,
        }
    }
}

/// A column copied (or lightly derived) from the node's own summary row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryField {
    pub name: &'static str,
    pub template: Template,
    pub storage: StorageType,
}

const fn field(name: &'static str, sql: &'static str, storage: StorageType) -> SummaryField {
    SummaryField {
        name,
        template: Template::from_static(sql),
        storage,
    }
}

/// Summary columns, in table order. Names are disjoint from every
/// `{family}_{statistic}` name.
pub const SUMMARY_FIELDS: &[SummaryField] = &[
    field("name", "basename({src}.name)", StorageType::Text),
    field("inode", "{src}.inode", StorageType::Text),
    field("mode", "{src}.mode", StorageType::Int64),
    field("nlink", "{src}.nlink", StorageType::Int64),
    field("uid", "{src}.uid", StorageType::Int64),
    field("gid", "{src}.gid", StorageType::Int64),
    field("blksize", "{src}.blksize", StorageType::Int64),
    field("blocks", "{src}.blocks", StorageType::Int64),
    field("atime", "{src}.atime", StorageType::Int64),
    field("mtime", "{src}.mtime", StorageType::Int64),
    field("ctime", "{src}.ctime", StorageType::Int64),
    // level() is relative to the scan root; names below it may span several
    // path components
    field(
        "depth",
        "level() + LENGTH({src}.name) - LENGTH(REPLACE({src}.name, '/', ''))",
        StorageType::Int64,
    ),
    field("filesystem_type", "NULL", StorageType::Blob),
    field("pinode", "{src}.pinode", StorageType::Text),
    field("totfiles", "{src}.totfiles", StorageType::Int64),
    field("totlinks", "{src}.totlinks", StorageType::Int64),
    field(
        "totsubdirs",
        "subdirs({src}.srollsubdirs, {src}.sroll)",
        StorageType::Int64,
    ),
];

/// Attribute families tracked per node, in table order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Uid,
    Gid,
    Size,
    Permissions,
    Ctime,
    Atime,
    Mtime,
    Crtime,
    /// Functional lifetime: atime - mtime
    Ftime,
    Name,
    Linkname,
    XattrName,
    XattrValue,
    Extensions,
}

impl Family {
    /// Every family, in the order their columns appear
    pub const ALL: [Family; 14] = [
        Family::Uid,
        Family::Gid,
        Family::Size,
        Family::Permissions,
        Family::Ctime,
        Family::Atime,
        Family::Mtime,
        Family::Crtime,
        Family::Ftime,
        Family::Name,
        Family::Linkname,
        Family::XattrName,
        Family::XattrValue,
        Family::Extensions,
    ];

    /// Column name prefix
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uid => "uid",
            Self::Gid => "gid",
            Self::Size => "size",
            Self::Permissions => "permissions",
            Self::Ctime => "ctime",
            Self::Atime => "atime",
            Self::Mtime => "mtime",
            Self::Crtime => "crtime",
            Self::Ftime => "ftime",
            Self::Name => "name",
            Self::Linkname => "linkname",
            Self::XattrName => "xattr_name",
            Self::XattrValue => "xattr_value",
            Self::Extensions => "extensions",
        }
    }

    /// The family's statistics, in column order
    pub fn statistics(&self, params: &StatParams) -> Vec<Statistic> {
        match self {
            Self::Uid | Self::Gid => id_stats(self.name()),
            Self::Size => size_stats(params.size_buckets),
            Self::Permissions => vec![Statistic::new(
                "hist",
                format!("mode_hist({SRC}.mode)"),
                StorageType::Text,
            )],
            Self::Ctime | Self::Atime | Self::Mtime | Self::Crtime => {
                time_stats(self.name(), params.reftime)
            }
            Self::Ftime => lifetime_stats(),
            Self::Name | Self::Linkname | Self::XattrName | Self::XattrValue => {
                length_stats(self.name(), params.name_len_buckets)
            }
            Self::Extensions => vec![Statistic::new(
                "hist",
                category_hist(&extension_expr(), &format!("{SRC}.name")),
                StorageType::Text,
            )],
        }
    }
}

/// Categorical histogram of `expr`.
///
/// The outer join hands a node without entries a single all-NULL row; the
/// guard keeps that row from being counted as a NULL category. `num_unique`
/// carries the same guard.
fn category_hist(expr: &str, present: &str) -> String {
    format!("CASE WHEN COUNT({present}) == 0 THEN NULL ELSE category_hist(CAST({expr} AS TEXT), 1) END")
}

/// Suffix after the last '.', dot included. Names without a '.' map to NULL
/// so extensionless files are still counted, in their own category.
pub(crate) fn extension_expr() -> String {
    format!(
        "CASE WHEN {SRC}.name NOT LIKE '%.%' THEN NULL \
         ELSE '.' || REPLACE({SRC}.name, RTRIM({SRC}.name, REPLACE({SRC}.name, '.', '')), '') END"
    )
}

fn id_stats(col: &str) -> Vec<Statistic> {
    vec![
        Statistic::new("min", format!("{SRC}.dmin{col}"), StorageType::Int64),
        Statistic::new("max", format!("{SRC}.dmax{col}"), StorageType::Int64),
        Statistic::new(
            "hist",
            category_hist(&format!("{SRC}.{col}"), &format!("{SRC}.{col}")),
            StorageType::Text,
        ),
        Statistic::new(
            "num_unique",
            format!(
                "CASE WHEN COUNT({SRC}.{col}) == 0 THEN NULL ELSE COUNT(DISTINCT {SRC}.{col}) END"
            ),
            StorageType::Int64,
        ),
    ]
}

fn size_stats(buckets: u32) -> Vec<Statistic> {
    vec![
        Statistic::new("min", format!("{SRC}.dminsize"), StorageType::Int64),
        Statistic::new("max", format!("{SRC}.dmaxsize"), StorageType::Int64),
        Statistic::new("mean", format!("AVG({SRC}.size)"), StorageType::Double),
        Statistic::new("median", format!("median({SRC}.size)"), StorageType::Double),
        Statistic::new(
            "mode",
            format!("mode_count(CAST({SRC}.size AS TEXT))"),
            StorageType::Text,
        ),
        Statistic::new("stdev", format!("stdevp({SRC}.size)"), StorageType::Double),
        Statistic::new("sum", format!("{SRC}.dtotsize"), StorageType::Int64),
        Statistic::new(
            "hist",
            format!("log2_hist({SRC}.size, {buckets})"),
            StorageType::Text,
        ),
    ]
}

fn time_stats(col: &str, reftime: i64) -> Vec<Statistic> {
    let value = format!("{SRC}.{col}");
    vec![
        Statistic::new("min", format!("{SRC}.dmin{col}"), StorageType::Int64),
        Statistic::new("max", format!("{SRC}.dmax{col}"), StorageType::Int64),
        Statistic::new("mean", format!("AVG({value})"), StorageType::Double),
        Statistic::new("median", format!("median({value})"), StorageType::Double),
        Statistic::new("mode", format!("mode_count({value})"), StorageType::Text),
        Statistic::new("stdev", format!("stdevp({value})"), StorageType::Double),
        Statistic::new(
            "age_hist",
            format!("time_hist({value}, {reftime})"),
            StorageType::Text,
        ),
        Statistic::new(
            "hour_hist",
            category_hist(&format!("strftime('%H', {value}, 'unixepoch')"), &value),
            StorageType::Text,
        ),
    ]
}

// Satyanarayanan, "A study of file sizes and functional lifetimes" (1981)
fn lifetime_stats() -> Vec<Statistic> {
    let lifetime = format!("{SRC}.atime - {SRC}.mtime");
    vec![
        Statistic::new("min", format!("MIN({lifetime})"), StorageType::Int64),
        Statistic::new("max", format!("MAX({lifetime})"), StorageType::Int64),
        Statistic::new("mean", format!("AVG({lifetime})"), StorageType::Double),
        Statistic::new("median", format!("median({lifetime})"), StorageType::Double),
        Statistic::new("mode", format!("mode_count({lifetime})"), StorageType::Text),
        Statistic::new("stdev", format!("stdevp({lifetime})"), StorageType::Double),
    ]
}

fn length_stats(col: &str, buckets: u32) -> Vec<Statistic> {
    let len = format!("LENGTH({SRC}.{col})");
    vec![
        Statistic::new("min", format!("MIN({len})"), StorageType::Int64),
        Statistic::new("max", format!("MAX({len})"), StorageType::Int64),
        Statistic::new("mean", format!("AVG({len})"), StorageType::Double),
        Statistic::new("median", format!("median({len})"), StorageType::Double),
        Statistic::new("mode", format!("mode_count({len})"), StorageType::Text),
        Statistic::new("stdev", format!("stdevp({len})"), StorageType::Double),
        Statistic::new(
            "hist",
            format!("log2_hist({len}, {buckets})"),
            StorageType::Text,
        ),
    ]
}
