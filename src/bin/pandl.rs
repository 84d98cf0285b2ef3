use anyhow::{Context, Result};
use clap::{error::ErrorKind, Parser};
use feedload::feed::{output_dir, run_download, DownloadOptions};
use reqwest::Client;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Download the media of every item in an RSS/Atom feed into a folder.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Folder to place downloads in. Unsafe characters are replaced with `_`.
    folder: String,

    /// RSS/Atom feed URL.
    feed_url: String,

    /// Directory the folder is created under.
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Extension given to every downloaded file.
    #[arg(long, default_value = "mp4")]
    extension: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let Some(args) = parse_args(std::env::args_os()) else {
        return;
    };
    if let Err(err) = run(args).await {
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

async fn run(args: Args) -> Result<()> {
    let client = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")?;

    let opts = DownloadOptions {
        out_dir: output_dir(&args.base_dir, &args.folder),
        feed_url: args.feed_url,
        extension: args.extension,
    };
    let summary = run_download(&client, &opts).await?;
    info!(?summary, "finished");
    Ok(())
}
