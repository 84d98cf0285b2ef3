// src/load/batch.rs
use anyhow::{bail, ensure, Context, Result};
use rusqlite::{params_from_iter, Connection};
use std::path::{Path, PathBuf};
use tracing::{info, trace};

use crate::load::db::{init_db, insert_sql, open_bulk};

/// Counters for a finished load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub rows: u64,
    /// Mid-run commit-and-reopen cycles.
    pub reopen_cycles: u64,
    /// Every commit, the final one included.
    pub commits: u64,
}

/// Owns the output connection and its open transaction.
///
/// Every `batch_size` rows the transaction is committed, the connection is
/// closed and a fresh one is opened, which caps how much page cache and
/// statement state a very long load can pile up. At most one connection to
/// the file is open at any time. Dropping the writer without calling
/// [`BatchWriter::finish`] discards the open batch.
pub struct BatchWriter {
    path: PathBuf,
    insert: String,
    width: usize,
    batch_size: u64,
    /// `None` only between closing the old handle and opening the next.
    conn: Option<Connection>,
    rows: u64,
    reopen_cycles: u64,
}

impl BatchWriter {
    /// Create the table if needed and begin the first batch.
    pub fn open(
        path: impl AsRef<Path>,
        table: &str,
        columns: &[String],
        batch_size: u64,
    ) -> Result<Self> {
        if batch_size == 0 {
            bail!("commit batch size must be at least 1");
        }
        let path = path.as_ref().to_path_buf();
        let conn = init_db(&path, table, columns)?;
        Ok(Self {
            insert: insert_sql(table, columns),
            width: columns.len(),
            path,
            batch_size,
            conn: Some(conn),
            rows: 0,
            reopen_cycles: 0,
        })
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().context("database connection is closed")
    }

    /// Insert one row. `values` must already be padded to the column count.
    pub fn insert(&mut self, values: &[&str]) -> Result<()> {
        ensure!(
            values.len() == self.width,
            "row has {} values, expected {}",
            values.len(),
            self.width
        );
        {
            let mut stmt = self
                .conn()?
                .prepare_cached(&self.insert)
                .context("failed to prepare insert statement")?;
            stmt.execute(params_from_iter(values.iter()))
                .context("failed to execute insert statement")?;
        }
        self.rows += 1;
        trace!(rows = self.rows);

        if self.rows % self.batch_size == 0 {
            self.commit_and_reopen()?;
        }
        Ok(())
    }

    fn commit_and_reopen(&mut self) -> Result<()> {
        self.conn()?
            .execute_batch("COMMIT;")
            .context("failed to commit sql (not final commit)")?;

        if let Some(old) = self.conn.take() {
            old.close()
                .map_err(|(_, e)| e)
                .context("failed to close database (mid-commit)")?;
        }

        let fresh =
            open_bulk(&self.path).context("failed to reopen db after mid-process commit")?;
        fresh
            .execute_batch("PRAGMA shrink_memory;")
            .context("failed to shrink memory")?;
        fresh
            .execute_batch("BEGIN;")
            .context("could not begin database")?;
        self.conn = Some(fresh);

        self.reopen_cycles += 1;
        info!(rows = self.rows, cycle = self.reopen_cycles, "batch committed");
        Ok(())
    }

    /// Commit whatever is left and close the database.
    pub fn finish(mut self) -> Result<BatchStats> {
        let conn = self.conn.take().context("database connection is closed")?;
        conn.execute_batch("COMMIT;")
            .context("failed to commit sql")?;
        conn.close()
            .map_err(|(_, e)| e)
            .context("failed to close database")?;
        Ok(BatchStats {
            rows: self.rows,
            reopen_cycles: self.reopen_cycles,
            commits: self.reopen_cycles + 1,
        })
    }
}
