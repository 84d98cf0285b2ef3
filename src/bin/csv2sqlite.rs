use anyhow::Result;
use clap::{error::ErrorKind, Parser};
use feedload::load::{columns::delimiter_byte, run_load, LoadOptions};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Load a delimited text file into a SQLite table, one text column per field.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Custom column definition, i.e. "col1,col2,col3". Defaults to the first line of the input.
    #[arg(long, default_value = "")]
    cols: String,

    /// How many rows between SQL commits. Higher values may be faster but use more RAM.
    #[arg(long = "crate", default_value_t = 10_000, value_parser = clap::value_parser!(u64).range(1..))]
    commit_rate: u64,

    /// SQLite output path.
    #[arg(long, default_value = "./sqlite.db")]
    out: PathBuf,

    /// Table name for the data.
    #[arg(long, default_value = "data")]
    table: String,

    /// Field and column separator.
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// CSV input file.
    input: PathBuf,
}

fn main() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .init();

    let Some(args) = parse_args(std::env::args_os()) else {
        return;
    };
    if let Err(err) = run(args) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

/// A missing argument prints usage and ends the run with status 0. Any other
/// parse failure (or `--help` / `--version`) goes through clap as usual.
fn parse_args<I, T>(argv: I) -> Option<Args>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Args::try_parse_from(argv) {
        Ok(args) => Some(args),
        Err(e) if e.kind() == ErrorKind::MissingRequiredArgument => {
            let _ = e.print();
            None
        }
        Err(e) => e.exit(),
    }
}

fn run(args: Args) -> Result<()> {
    let opts = LoadOptions {
        input: args.input,
        columns: Some(args.cols).filter(|c| !c.is_empty()),
        batch_size: args.commit_rate,
        out: args.out,
        table: args.table,
        delimiter: delimiter_byte(args.delimiter)?,
    };
    let summary = run_load(&opts)?;
    info!(
        rows = summary.rows,
        table = %opts.table,
        out = %opts.out.display(),
        "finished"
    );
    Ok(())
}
