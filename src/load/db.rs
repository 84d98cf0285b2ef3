// src/load/db.rs
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Connection settings tuned for bulk inserts. Durability is traded away:
/// no journal and no fsync, so a crash mid-load can corrupt the output file.
pub const BULK_PRAGMAS: &[(&str, &str)] = &[
    ("automatic_index", "ON"),
    ("cache_size", "32768"),
    ("cache_spill", "OFF"),
    ("foreign_keys", "ON"),
    ("journal_size_limit", "67110000"),
    ("locking_mode", "NORMAL"),
    ("page_size", "4096"),
    ("recursive_triggers", "ON"),
    ("secure_delete", "OFF"),
    ("synchronous", "OFF"),
    ("temp_store", "MEMORY"),
    ("journal_mode", "OFF"),
    ("wal_autocheckpoint", "16384"),
];

/// Quote an identifier for SQLite, doubling any embedded quote.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE IF NOT EXISTS` with every column as non-null text.
pub fn create_table_sql(table: &str, columns: &[String]) -> String {
    let cols = columns
        .iter()
        .map(|c| format!("{} TEXT NOT NULL", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({});", quote_ident(table), cols)
}

/// Parameterised insert with one placeholder per column.
pub fn insert_sql(table: &str, columns: &[String]) -> String {
    let names = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        quote_ident(table),
        names,
        placeholders
    )
}

/// Run a single pragma. Several of these echo the new value back as a row,
/// so the result set is drained rather than executed.
fn apply_pragma(conn: &Connection, name: &str, value: &str) -> Result<()> {
    let sql = format!("PRAGMA {name} = {value};");
    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("preparing {sql}"))?;
    let mut rows = stmt.query([]).with_context(|| format!("running {sql}"))?;
    while rows.next()?.is_some() {}
    Ok(())
}

/// Open (or create) the database at `path` with the bulk pragmas applied.
pub fn open_bulk(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("could not open sqlite db @ {}", path.display()))?;
    for (name, value) in BULK_PRAGMAS {
        apply_pragma(&conn, name, value)?;
    }
    debug!(path = %path.display(), "bulk pragmas applied");
    Ok(conn)
}

/// Open the output database, make sure the table exists and start the first
/// write transaction.
#[instrument(level = "info", skip(path, columns), fields(db = %path.display()))]
pub fn init_db(path: &Path, table: &str, columns: &[String]) -> Result<Connection> {
    let conn = open_bulk(path)?;

    let ddl = create_table_sql(table, columns);
    conn.execute_batch(&ddl)
        .with_context(|| format!("failed to exec ddl {ddl}"))?;
    info!(table, columns = columns.len(), "table ready");

    conn.execute_batch("BEGIN;").context("failed to begin db")?;
    Ok(conn)
}
