// src/load/columns.rs
use anyhow::{bail, Context, Result};
use csv::{Reader, ReaderBuilder, StringRecord};
use std::io::Read;
use tracing::info;

/// Turn a user supplied delimiter into the single byte the splitter works on.
pub fn delimiter_byte(delimiter: char) -> Result<u8> {
    if !delimiter.is_ascii() || delimiter == '\n' || delimiter == '\r' {
        bail!("delimiter must be a single ASCII character other than a line break, got {delimiter:?}");
    }
    Ok(delimiter as u8)
}

/// A line splitter over `input`: one record per non-blank line, fields cut at
/// every `delimiter`, quotes taken literally.
pub fn line_reader<R: Read>(input: R, delimiter: u8) -> Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .delimiter(delimiter)
        .from_reader(input)
}

/// Work out the column set for a load.
///
/// An explicit list wins; otherwise the first line of `rdr` is consumed as the
/// header. Duplicate names are kept in position. Fewer than two columns is an
/// error, which is how a file without the delimiter gets rejected.
pub fn resolve_columns<R: Read>(
    explicit: Option<&str>,
    delimiter: u8,
    rdr: &mut Reader<R>,
) -> Result<Vec<String>> {
    let cols: Vec<String> = match explicit.filter(|s| !s.is_empty()) {
        Some(list) => list
            .split(char::from(delimiter))
            .map(str::to_string)
            .collect(),
        None => {
            let mut header = StringRecord::new();
            if rdr
                .read_record(&mut header)
                .context("reading header line")?
            {
                header.iter().map(str::to_string).collect()
            } else {
                Vec::new()
            }
        }
    };

    if cols.len() <= 1 {
        bail!(
            "no columns found: need at least two, got {} ({:?})",
            cols.len(),
            cols
        );
    }

    info!(count = cols.len(), columns = ?cols, "cols found");
    Ok(cols)
}

/// Bind values for one record against `width` columns. Short records are
/// padded with empty strings, long ones are refused.
pub fn row_values(record: &StringRecord, width: usize) -> Result<Vec<&str>> {
    if record.len() > width {
        bail!(
            "record has {} fields but the table has {} columns",
            record.len(),
            width
        );
    }
    let mut values: Vec<&str> = record.iter().collect();
    values.resize(width, "");
    Ok(values)
}
