// src/load/mod.rs
//! Delimited text file → SQLite table, committed in fixed-size batches.

pub mod batch;
pub mod columns;
pub mod db;

use anyhow::{Context, Result};
use csv::StringRecord;
use std::{fs::File, path::PathBuf, time::Instant};
use tracing::{info, instrument};

use self::batch::BatchWriter;
use self::columns::{line_reader, resolve_columns, row_values};

/// Everything a single load run needs.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub input: PathBuf,
    /// Explicit column list, split on `delimiter`. `None` reads the first line.
    pub columns: Option<String>,
    /// Rows per commit batch.
    pub batch_size: u64,
    pub out: PathBuf,
    pub table: String,
    pub delimiter: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            columns: None,
            batch_size: 10_000,
            out: PathBuf::from("./sqlite.db"),
            table: "data".to_string(),
            delimiter: b',',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub columns: Vec<String>,
    pub rows: u64,
    pub reopen_cycles: u64,
    pub commits: u64,
}

/// Load `opts.input` into `opts.table`. Any failure aborts the run; rows from
/// batches committed before the failure stay in the database.
#[instrument(level = "info", skip(opts), fields(input = %opts.input.display(), out = %opts.out.display()))]
pub fn run_load(opts: &LoadOptions) -> Result<LoadSummary> {
    let start = Instant::now();
    let file = File::open(&opts.input)
        .with_context(|| format!("failed to open file @ {}", opts.input.display()))?;
    let mut rdr = line_reader(file, opts.delimiter);

    let columns = resolve_columns(opts.columns.as_deref(), opts.delimiter, &mut rdr)?;
    let mut writer = BatchWriter::open(&opts.out, &opts.table, &columns, opts.batch_size)?;

    let mut record = StringRecord::new();
    while rdr.read_record(&mut record).context("reading input")? {
        let line = record.position().map_or(0, |p| p.line());
        let values =
            row_values(&record, columns.len()).with_context(|| format!("input line {line}"))?;
        writer
            .insert(&values)
            .with_context(|| format!("input line {line}"))?;
    }

    let stats = writer.finish()?;
    info!(
        rows = stats.rows,
        commits = stats.commits,
        elapsed = ?start.elapsed(),
        "load complete"
    );
    Ok(LoadSummary {
        columns,
        rows: stats.rows,
        reopen_cycles: stats.reopen_cycles,
        commits: stats.commits,
    })
}
