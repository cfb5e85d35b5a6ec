//! Shared support for integration tests
//!
//! `FixtureEngine` stands in for the external tree-walking engine. It walks a
//! small in-memory index and runs the plan's fragments the way the engine
//! does: `-I` once on a scratch intermediate database, `-T` and `-E` once per
//! directory against that directory's `vrxsummary`, `vrxpentries` and
//! `treesummary` tables, then `-K`, `-J` and `-G` on the output store with
//! the intermediate database attached.
//!
//! The engine's SQL built-ins are registered through rusqlite's `functions`
//! feature. Their text formats only need to be stable, not identical to the
//! real engine's.

#![allow(dead_code)]

use longitudinal_snapshot::engine::{EngineInvocation, QueryEngine};
use longitudinal_snapshot::error::EngineResult;
use longitudinal_snapshot::plan::Fragment;
use longitudinal_snapshot::schema::treesummary;
use rusqlite::functions::{Aggregate, Context, FunctionFlags};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Timestamp every fixture entry starts from (2023-11-14 22:13:20 UTC)
pub const BASE_TIME: i64 = 1_700_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Link,
}

impl EntryKind {
    fn as_type(&self) -> &'static str {
        match self {
            Self::File => "f",
            Self::Link => "l",
        }
    }
}

/// A non-directory entry
#[derive(Debug, Clone)]
pub struct FixtureEntry {
    pub name: String,
    pub kind: EntryKind,
    pub inode: i64,
    pub mode: i64,
    pub uid: i64,
    pub gid: i64,
    pub size: i64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub crtime: i64,
    pub linkname: Option<String>,
    pub xattr_name: Option<String>,
    pub xattr_value: Option<String>,
}

impl FixtureEntry {
    pub fn file(name: &str, inode: i64, size: i64) -> Self {
        Self {
            name: name.to_string(),
            kind: EntryKind::File,
            inode,
            mode: 0o100644,
            uid: 1000,
            gid: 1000,
            size,
            atime: BASE_TIME,
            mtime: BASE_TIME,
            ctime: BASE_TIME,
            crtime: BASE_TIME,
            linkname: None,
            xattr_name: None,
            xattr_value: None,
        }
    }

    pub fn symlink(name: &str, inode: i64, target: &str) -> Self {
        Self {
            kind: EntryKind::Link,
            mode: 0o120777,
            size: target.len() as i64,
            linkname: Some(target.to_string()),
            ..Self::file(name, inode, 0)
        }
    }

    pub fn owned_by(mut self, uid: i64, gid: i64) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    pub fn with_mode(mut self, mode: i64) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_times(mut self, atime: i64, mtime: i64, ctime: i64) -> Self {
        self.atime = atime;
        self.mtime = mtime;
        self.ctime = ctime;
        self
    }

    pub fn with_xattr(mut self, name: &str, value: &str) -> Self {
        self.xattr_name = Some(name.to_string());
        self.xattr_value = Some(value.to_string());
        self
    }
}

/// Tree-rollup values stored for a directory
#[derive(Debug, Clone, Copy)]
pub struct Rollup {
    pub totfiles: i64,
    pub totsubdirs: i64,
    pub maxsize: i64,
}

/// One directory of the fixture index
#[derive(Debug, Clone)]
pub struct FixtureDir {
    pub name: String,
    pub inode: i64,
    pub pinode: i64,
    /// Distance from the scan root
    pub level: i64,
    pub subdirs: i64,
    pub mode: i64,
    pub uid: i64,
    pub gid: i64,
    pub entries: Vec<FixtureEntry>,
    /// A synthetic common parent of several indexes has no summary row
    pub has_summary: bool,
    pub rollup: Option<Rollup>,
}

impl FixtureDir {
    pub fn new(name: &str, inode: i64, pinode: i64, level: i64) -> Self {
        Self {
            name: name.to_string(),
            inode,
            pinode,
            level,
            subdirs: 0,
            mode: 0o040755,
            uid: 1000,
            gid: 1000,
            entries: Vec::new(),
            has_summary: true,
            rollup: None,
        }
    }

    /// Directory that only exists as the parent of independent trees
    pub fn synthetic(name: &str, inode: i64) -> Self {
        Self {
            has_summary: false,
            ..Self::new(name, inode, 0, 0)
        }
    }

    pub fn with_entry(mut self, entry: FixtureEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn with_subdirs(mut self, subdirs: i64) -> Self {
        self.subdirs = subdirs;
        self
    }

    pub fn with_rollup(mut self, totfiles: i64, totsubdirs: i64, maxsize: i64) -> Self {
        self.rollup = Some(Rollup {
            totfiles,
            totsubdirs,
            maxsize,
        });
        self
    }
}

/// Per-directory state read by `level()` and `subdirs()`
#[derive(Debug, Default)]
struct NodeState {
    level: AtomicI64,
    subdirs: AtomicI64,
}

/// Executes a plan over a [`FixtureDir`] list
pub struct FixtureEngine {
    index: Vec<FixtureDir>,
    exit_code: i32,
    last_error: RefCell<Option<String>>,
}

impl FixtureEngine {
    pub fn new(index: Vec<FixtureDir>) -> Self {
        Self::exiting_with(index, 0)
    }

    /// Runs the whole plan, then reports `code`
    pub fn exiting_with(index: Vec<FixtureDir>, code: i32) -> Self {
        Self {
            index,
            exit_code: code,
            last_error: RefCell::new(None),
        }
    }

    /// SQL error that made the last run exit 1
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    fn walk(&self, invocation: &EngineInvocation<'_>) -> Result<(), Box<dyn Error>> {
        let plan = invocation.plan;
        let scratch = tempfile::tempdir()?;
        let work_path = scratch.path().join("intermediate.db");

        let node = Arc::new(NodeState::default());
        {
            let work = Connection::open(&work_path)?;
            register_builtins(&work, &node)?;
            run_fragment(&work, plan.get(Fragment::Init))?;

            for dir in &self.index {
                node.level.store(dir.level, Ordering::SeqCst);
                node.subdirs.store(dir.subdirs, Ordering::SeqCst);

                load_node(&work, dir)?;
                run_fragment(&work, plan.get(Fragment::TreeCopy))?;
                run_fragment(&work, plan.get(Fragment::NodeSelect))?;
                work.execute_batch(
                    "DROP TABLE temp.vrxsummary; DROP TABLE temp.vrxpentries; DROP TABLE temp.treesummary;",
                )?;
            }
        }

        let out = Connection::open(invocation.output)?;
        run_fragment(&out, plan.get(Fragment::FinalCreate))?;
        out.execute(
            "ATTACH DATABASE ?1 AS work",
            [work_path.to_string_lossy().into_owned()],
        )?;
        run_fragment(&out, plan.get(Fragment::Merge))?;
        out.execute_batch("DETACH DATABASE work")?;
        run_fragment(&out, plan.get(Fragment::View))?;

        Ok(())
    }
}

impl QueryEngine for FixtureEngine {
    fn execute(&self, invocation: &EngineInvocation<'_>) -> EngineResult<i32> {
        match self.walk(invocation) {
            Ok(()) => Ok(self.exit_code),
            Err(e) => {
                *self.last_error.borrow_mut() = Some(e.to_string());
                Ok(1)
            }
        }
    }

    fn program(&self) -> &Path {
        Path::new("fixture-engine")
    }
}

/// Run every statement of a fragment, draining any rows it returns.
/// Fragments never contain ';' inside literals.
pub fn run_fragment(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
    for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let mut stmt = conn.prepare(statement)?;
        let mut rows = stmt.query([])?;
        while rows.next()?.is_some() {}
    }
    Ok(())
}

const VRXSUMMARY_COLUMNS: &[&str] = &[
    "name", "inode", "pinode", "mode", "nlink", "uid", "gid", "blksize", "blocks", "atime",
    "mtime", "ctime", "totfiles", "totlinks", "srollsubdirs", "sroll",
];

const VRXPENTRIES_COLUMNS: &[&str] = &[
    "name", "type", "inode", "pinode", "mode", "nlink", "uid", "gid", "size", "blksize",
    "blocks", "atime", "mtime", "ctime", "crtime", "linkname", "xattr_name", "xattr_value",
    "dminuid", "dmaxuid", "dmingid", "dmaxgid", "dminsize", "dmaxsize", "dtotsize", "dminctime",
    "dmaxctime", "dminatime", "dmaxatime", "dminmtime", "dmaxmtime", "dmincrtime", "dmaxcrtime",
];

fn insert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn text_columns(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| match *c {
            "name" | "type" | "linkname" | "xattr_name" | "xattr_value" => format!("{} TEXT", c),
            _ => format!("{} INT64", c),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn opt_text(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    }
}

/// Directory-level min/max/total columns carried on every entry row
fn dir_stats(entries: &[FixtureEntry]) -> Vec<Value> {
    fn min_max(entries: &[FixtureEntry], f: impl Fn(&FixtureEntry) -> i64) -> [Value; 2] {
        let min = entries.iter().map(&f).min().unwrap_or(0);
        let max = entries.iter().map(&f).max().unwrap_or(0);
        [Value::Integer(min), Value::Integer(max)]
    }

    let mut stats = Vec::with_capacity(15);
    stats.extend(min_max(entries, |e| e.uid));
    stats.extend(min_max(entries, |e| e.gid));
    stats.extend(min_max(entries, |e| e.size));
    stats.push(Value::Integer(entries.iter().map(|e| e.size).sum()));
    stats.extend(min_max(entries, |e| e.ctime));
    stats.extend(min_max(entries, |e| e.atime));
    stats.extend(min_max(entries, |e| e.mtime));
    stats.extend(min_max(entries, |e| e.crtime));
    stats
}

fn load_node(conn: &Connection, dir: &FixtureDir) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TEMP TABLE vrxsummary ({}); CREATE TEMP TABLE vrxpentries ({}); {};",
        text_columns(VRXSUMMARY_COLUMNS),
        text_columns(VRXPENTRIES_COLUMNS),
        treesummary::create_table_sql("temp.treesummary"),
    ))?;

    if dir.has_summary {
        let files = dir.entries.iter().filter(|e| e.kind == EntryKind::File).count() as i64;
        let links = dir.entries.iter().filter(|e| e.kind == EntryKind::Link).count() as i64;
        let row = vec![
            Value::Text(dir.name.clone()),
            Value::Integer(dir.inode),
            Value::Integer(dir.pinode),
            Value::Integer(dir.mode),
            Value::Integer(2 + dir.subdirs),
            Value::Integer(dir.uid),
            Value::Integer(dir.gid),
            Value::Integer(4096),
            Value::Integer(8),
            Value::Integer(BASE_TIME),
            Value::Integer(BASE_TIME),
            Value::Integer(BASE_TIME),
            Value::Integer(files),
            Value::Integer(links),
            Value::Integer(0),
            Value::Integer(0),
        ];
        conn.execute(
            &insert_sql("temp.vrxsummary", VRXSUMMARY_COLUMNS),
            params_from_iter(row),
        )?;
    }

    let stats = dir_stats(&dir.entries);
    let insert = insert_sql("temp.vrxpentries", VRXPENTRIES_COLUMNS);
    for e in &dir.entries {
        let mut row = vec![
            Value::Text(e.name.clone()),
            Value::Text(e.kind.as_type().to_string()),
            Value::Integer(e.inode),
            Value::Integer(dir.inode),
            Value::Integer(e.mode),
            Value::Integer(1),
            Value::Integer(e.uid),
            Value::Integer(e.gid),
            Value::Integer(e.size),
            Value::Integer(4096),
            Value::Integer((e.size + 511) / 512),
            Value::Integer(e.atime),
            Value::Integer(e.mtime),
            Value::Integer(e.ctime),
            Value::Integer(e.crtime),
            opt_text(&e.linkname),
            opt_text(&e.xattr_name),
            opt_text(&e.xattr_value),
        ];
        row.extend(stats.iter().cloned());
        conn.execute(&insert, params_from_iter(row))?;
    }

    if let Some(rollup) = dir.rollup {
        conn.execute(
            "INSERT INTO temp.treesummary (inode, totfiles, totsubdirs, maxsize, depth) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![dir.inode, rollup.totfiles, rollup.totsubdirs, rollup.maxsize, dir.level],
        )?;
    }

    Ok(())
}

fn register_builtins(conn: &Connection, node: &Arc<NodeState>) -> rusqlite::Result<()> {
    let pure = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("basename", 1, pure, |ctx| {
        let path: Option<String> = ctx.get(0)?;
        Ok(path.map(|p| p.rsplit('/').next().unwrap_or("").to_string()))
    })?;

    let state = Arc::clone(node);
    conn.create_scalar_function("level", 0, FunctionFlags::SQLITE_UTF8, move |_| {
        Ok(state.level.load(Ordering::SeqCst))
    })?;

    // Rolled-up directories carry their subdirectory count; others are
    // counted at the node
    let state = Arc::clone(node);
    conn.create_scalar_function("subdirs", 2, FunctionFlags::SQLITE_UTF8, move |ctx| {
        let rolled: i64 = ctx.get(0)?;
        let sroll: i64 = ctx.get(1)?;
        Ok(if sroll != 0 {
            rolled
        } else {
            state.subdirs.load(Ordering::SeqCst)
        })
    })?;

    conn.create_aggregate_function("median", 1, pure, Median)?;
    conn.create_aggregate_function("stdevp", 1, pure, StdevP)?;
    conn.create_aggregate_function("mode_count", 1, pure, ModeCount)?;
    conn.create_aggregate_function("log2_hist", 2, pure, Log2Hist)?;
    conn.create_aggregate_function("time_hist", 2, pure, TimeHist)?;
    conn.create_aggregate_function("mode_hist", 1, pure, ModeHist)?;
    conn.create_aggregate_function("category_hist", 2, pure, CategoryHist)?;

    Ok(())
}

fn as_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

fn push_f64(ctx: &Context<'_>, acc: &mut Vec<f64>) -> rusqlite::Result<()> {
    if let Some(v) = ctx.get::<Option<f64>>(0)? {
        acc.push(v);
    }
    Ok(())
}

fn join_counts<K>(counts: BTreeMap<K, u64>, label: impl Fn(&K) -> String) -> Option<String> {
    if counts.is_empty() {
        return None;
    }
    Some(
        counts
            .iter()
            .map(|(k, n)| format!("{}:{}", label(k), n))
            .collect::<Vec<_>>()
            .join(";"),
    )
}

struct Median;

impl Aggregate<Vec<f64>, Option<f64>> for Median {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<Vec<f64>> {
        Ok(Vec::new())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut Vec<f64>) -> rusqlite::Result<()> {
        push_f64(ctx, acc)
    }

    fn finalize(&self, _: &mut Context<'_>, acc: Option<Vec<f64>>) -> rusqlite::Result<Option<f64>> {
        let mut values = acc.unwrap_or_default();
        if values.is_empty() {
            return Ok(None);
        }
        values.sort_by(f64::total_cmp);
        let mid = values.len() / 2;
        Ok(Some(if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        }))
    }
}

struct StdevP;

impl Aggregate<Vec<f64>, Option<f64>> for StdevP {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<Vec<f64>> {
        Ok(Vec::new())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut Vec<f64>) -> rusqlite::Result<()> {
        push_f64(ctx, acc)
    }

    fn finalize(&self, _: &mut Context<'_>, acc: Option<Vec<f64>>) -> rusqlite::Result<Option<f64>> {
        let values = acc.unwrap_or_default();
        if values.is_empty() {
            return Ok(None);
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Ok(Some(var.sqrt()))
    }
}

/// Most common value; ties go to the smallest
struct ModeCount;

impl Aggregate<BTreeMap<String, u64>, Option<String>> for ModeCount {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<BTreeMap<String, u64>> {
        Ok(BTreeMap::new())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut BTreeMap<String, u64>) -> rusqlite::Result<()> {
        if let Some(v) = as_text(ctx.get_raw(0)) {
            *acc.entry(v).or_default() += 1;
        }
        Ok(())
    }

    fn finalize(
        &self,
        _: &mut Context<'_>,
        acc: Option<BTreeMap<String, u64>>,
    ) -> rusqlite::Result<Option<String>> {
        let counts = acc.unwrap_or_default();
        Ok(counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(value, _)| value))
    }
}

/// Counts per power-of-two bucket, capped at the bucket count argument
struct Log2Hist;

impl Aggregate<BTreeMap<i64, u64>, Option<String>> for Log2Hist {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<BTreeMap<i64, u64>> {
        Ok(BTreeMap::new())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut BTreeMap<i64, u64>) -> rusqlite::Result<()> {
        let buckets: i64 = ctx.get(1)?;
        if let Some(v) = ctx.get::<Option<i64>>(0)? {
            let bucket = if v <= 0 {
                0
            } else {
                i64::from(64 - (v as u64).leading_zeros()).min(buckets)
            };
            *acc.entry(bucket).or_default() += 1;
        }
        Ok(())
    }

    fn finalize(
        &self,
        _: &mut Context<'_>,
        acc: Option<BTreeMap<i64, u64>>,
    ) -> rusqlite::Result<Option<String>> {
        Ok(join_counts(acc.unwrap_or_default(), |b| b.to_string()))
    }
}

/// Age buckets relative to the reference time argument
struct TimeHist;

const AGE_BUCKETS: &[(i64, &str)] = &[
    (60, "minute"),
    (3_600, "hour"),
    (86_400, "day"),
    (604_800, "week"),
    (2_592_000, "month"),
    (31_536_000, "year"),
    (i64::MAX, "years"),
];

impl Aggregate<BTreeMap<usize, u64>, Option<String>> for TimeHist {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<BTreeMap<usize, u64>> {
        Ok(BTreeMap::new())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut BTreeMap<usize, u64>) -> rusqlite::Result<()> {
        let reftime: i64 = ctx.get(1)?;
        if let Some(t) = ctx.get::<Option<i64>>(0)? {
            let age = reftime.saturating_sub(t);
            let bucket = AGE_BUCKETS
                .iter()
                .position(|(limit, _)| age < *limit)
                .unwrap_or(AGE_BUCKETS.len() - 1);
            *acc.entry(bucket).or_default() += 1;
        }
        Ok(())
    }

    fn finalize(
        &self,
        _: &mut Context<'_>,
        acc: Option<BTreeMap<usize, u64>>,
    ) -> rusqlite::Result<Option<String>> {
        Ok(join_counts(acc.unwrap_or_default(), |b| AGE_BUCKETS[*b].1.to_string()))
    }
}

/// Counts per permission-bit pattern
struct ModeHist;

impl Aggregate<BTreeMap<i64, u64>, Option<String>> for ModeHist {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<BTreeMap<i64, u64>> {
        Ok(BTreeMap::new())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut BTreeMap<i64, u64>) -> rusqlite::Result<()> {
        if let Some(mode) = ctx.get::<Option<i64>>(0)? {
            *acc.entry(mode & 0o777).or_default() += 1;
        }
        Ok(())
    }

    fn finalize(
        &self,
        _: &mut Context<'_>,
        acc: Option<BTreeMap<i64, u64>>,
    ) -> rusqlite::Result<Option<String>> {
        Ok(join_counts(acc.unwrap_or_default(), |m| format!("{:03o}", m)))
    }
}

/// Counts per distinct value, NULL included as its own category
struct CategoryHist;

impl Aggregate<BTreeMap<Option<String>, u64>, Option<String>> for CategoryHist {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<BTreeMap<Option<String>, u64>> {
        Ok(BTreeMap::new())
    }

    fn step(
        &self,
        ctx: &mut Context<'_>,
        acc: &mut BTreeMap<Option<String>, u64>,
    ) -> rusqlite::Result<()> {
        *acc.entry(as_text(ctx.get_raw(0))).or_default() += 1;
        Ok(())
    }

    fn finalize(
        &self,
        _: &mut Context<'_>,
        acc: Option<BTreeMap<Option<String>, u64>>,
    ) -> rusqlite::Result<Option<String>> {
        Ok(join_counts(acc.unwrap_or_default(), |k| match k {
            Some(v) => v.clone(),
            None => "(null)".to_string(),
        }))
    }
}
