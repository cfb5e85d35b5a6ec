//! Snapshot finalization
//!
//! Once the engine has exited successfully the output store holds
//! `summary`, `treesummary` and the `snapshot` view. Finalization adds the
//! one-row `metadata` table describing the run.

use crate::error::{DbError, DbResult};
use crate::plan::METADATA;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use tracing::debug;

/// Contents of the metadata row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMetadata {
    /// Invocation time, seconds since the epoch
    pub timestamp: i64,
    /// Index the snapshot was taken from, as given on the command line
    pub src: String,
    pub notes: Option<String>,
}

fn create_metadata_sql() -> String {
    format!(
        "CREATE TABLE {} (timestamp INT, src TEXT, notes TEXT)",
        METADATA
    )
}

/// Write the metadata row into the store at `path`.
///
/// Without `replace`, an existing `metadata` table is an error. The drop,
/// create and insert run in one transaction, so a failure leaves no partial
/// table behind.
pub fn finalize(path: &Path, metadata: &SnapshotMetadata, replace: bool) -> DbResult<()> {
    let mut conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| DbError::OpenFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    write_metadata(&mut conn, metadata, replace)
}

/// Write the metadata row through an open connection
pub fn write_metadata(
    conn: &mut Connection,
    metadata: &SnapshotMetadata,
    replace: bool,
) -> DbResult<()> {
    let tx = conn.transaction()?;

    if replace {
        tx.execute(&format!("DROP TABLE IF EXISTS {}", METADATA), [])?;
    }
    tx.execute(&create_metadata_sql(), [])?;
    tx.execute(
        &format!(
            "INSERT INTO {} (timestamp, src, notes) VALUES (?1, ?2, ?3)",
            METADATA
        ),
        params![metadata.timestamp, metadata.src, metadata.notes],
    )?;

    tx.commit()?;

    debug!(
        timestamp = metadata.timestamp,
        src = %metadata.src,
        replace,
        "Wrote snapshot metadata"
    );
    Ok(())
}

/// Check whether a table or view exists
pub fn table_exists(conn: &Connection, name: &str) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Read back the metadata row, or `None` if the store has no metadata table
pub fn read_metadata(conn: &Connection) -> DbResult<Option<SnapshotMetadata>> {
    if !table_exists(conn, METADATA)? {
        return Ok(None);
    }

    let row = conn
        .query_row(
            &format!("SELECT timestamp, src, notes FROM {} LIMIT 1", METADATA),
            [],
            |row| {
                Ok(SnapshotMetadata {
                    timestamp: row.get(0)?,
                    src: row.get(1)?,
                    notes: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(row)
}
