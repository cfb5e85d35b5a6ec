//! Engine cumulative-timing extraction
//!
//! With debug timing enabled the query engine prints one `name: value` line
//! per measured stage when it exits. This module turns that text into a typed
//! record and stores it in SQLite, so timings of snapshot runs can be tracked
//! next to the snapshots themselves.

use crate::error::{DbResult, ExtractError};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::io::BufRead;

/// Type of a timing field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Real,
    Text,
}

impl FieldType {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }
}

/// A named line in the engine's timing output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingField {
    pub name: &'static str,
    pub kind: FieldType,
}

const fn real(name: &'static str) -> TimingField {
    TimingField {
        name,
        kind: FieldType::Real,
    }
}

const fn integer(name: &'static str) -> TimingField {
    TimingField {
        name,
        kind: FieldType::Integer,
    }
}

/// Stages reported by the engine's cumulative timing output
pub const CUMULATIVE_TIMES: &[TimingField] = &[
    real("set up globals"),
    real("set up intermediate databases"),
    real("thread pool"),
    real("open directories"),
    real("attach index"),
    real("xattrprep"),
    real("addqueryfuncs"),
    real("get_rollupscore"),
    real("descend"),
    real("check args"),
    real("check level"),
    real("check level <= max_level branch"),
    real("while true"),
    real("readdir"),
    real("readdir != null branch"),
    real("strncmp"),
    real("strncmp != . or .."),
    real("snprintf"),
    real("lstat"),
    real("isdir"),
    real("isdir branch"),
    real("access"),
    real("set"),
    real("clone"),
    real("pushdir"),
    real("sqltsumcheck"),
    real("sqltsum"),
    real("sqlsum"),
    real("sqlent"),
    real("xattrdone"),
    real("detach index"),
    real("close directories"),
    real("restore timestamps"),
    real("free work"),
    real("output timestamps"),
    real("aggregate into final databases"),
    real("print aggregated results"),
    real("clean up globals"),
    integer("Threads run"),
    integer("Queries performed"),
    integer("Rows printed to stdout or outfiles"),
    real("Total Thread Time (not including main)"),
    real("Real time (main)"),
];

/// One run's extracted timings, in field order
#[derive(Debug, Clone, PartialEq)]
pub struct TimingRecord {
    /// Identifier of the run the timings belong to
    pub run: String,
    pub values: Vec<(&'static str, Value)>,
}

impl TimingRecord {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }
}

/// Parse cumulative timing output for `run`.
///
/// Field names are matched longest first so that a name which is a prefix of
/// another (`sqltsum`, `sqltsumcheck`) does not claim the longer one's line.
/// Every field in `fields` must be present, otherwise no record is returned.
pub fn extract_cumulative_times<R: BufRead>(
    reader: R,
    run: &str,
    fields: &[TimingField],
) -> Result<TimingRecord, ExtractError> {
    let mut by_length: Vec<&TimingField> = fields.iter().collect();
    by_length.sort_by(|a, b| b.name.len().cmp(&a.name.len()));

    let mut raw: Vec<Option<String>> = vec![None; fields.len()];

    for line in reader.lines() {
        let line = line.map_err(|e| ExtractError::Read {
            run: run.to_string(),
            reason: e.to_string(),
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(field) = by_length.iter().find(|f| line.starts_with(f.name)) else {
            continue;
        };

        let rest = &line[field.name.len()..];
        let rest = rest.strip_prefix(':').unwrap_or(rest);
        let value = rest.trim();
        // Durations carry a trailing unit
        let value = match field.kind {
            FieldType::Real => value.strip_suffix('s').unwrap_or(value).trim_end(),
            FieldType::Integer | FieldType::Text => value,
        };
        if value.is_empty() {
            continue;
        }

        if let Some(slot) = fields.iter().position(|f| f.name == field.name) {
            raw[slot] = Some(value.to_string());
        }
    }

    let mut values = Vec::with_capacity(fields.len());
    for (field, value) in fields.iter().zip(raw) {
        let value = value.ok_or_else(|| ExtractError::MissingField {
            field: field.name.to_string(),
            run: run.to_string(),
        })?;
        values.push((field.name, parse_value(field, run, value)?));
    }

    Ok(TimingRecord {
        run: run.to_string(),
        values,
    })
}

fn parse_value(field: &TimingField, run: &str, value: String) -> Result<Value, ExtractError> {
    let invalid = |value: &str| ExtractError::InvalidValue {
        field: field.name.to_string(),
        run: run.to_string(),
        value: value.to_string(),
    };

    match field.kind {
        FieldType::Integer => value
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| invalid(&value)),
        FieldType::Real => value
            .parse::<f64>()
            .map(Value::Real)
            .map_err(|_| invalid(&value)),
        FieldType::Text => Ok(Value::Text(value)),
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Create a table with a `run` column plus one column per field. Every
/// column name is quoted since most contain spaces.
pub fn create_table(conn: &Connection, table: &str, fields: &[TimingField]) -> DbResult<()> {
    let mut cols = vec![format!("{} TEXT", quote("run"))];
    cols.extend(
        fields
            .iter()
            .map(|f| format!("{} {}", quote(f.name), f.kind.as_sql())),
    );
    conn.execute(
        &format!("CREATE TABLE {} ({})", quote(table), cols.join(", ")),
        [],
    )?;
    Ok(())
}

/// Insert one record into a table made by [`create_table`]
pub fn insert(conn: &Connection, table: &str, record: &TimingRecord) -> DbResult<()> {
    let mut cols = vec![quote("run")];
    cols.extend(record.values.iter().map(|(name, _)| quote(name)));
    let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{}", i)).collect();

    let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(cols.len());
    params.push(&record.run);
    params.extend(record.values.iter().map(|(_, v)| v as &dyn rusqlite::ToSql));

    conn.execute(
        &format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table),
            cols.join(", "),
            placeholders.join(", ")
        ),
        params.as_slice(),
    )?;
    Ok(())
}
