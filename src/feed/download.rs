// src/feed/download.rs
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::{Client, Response};
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, instrument};

use crate::feed::fetch::FeedItem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Downloaded { path: PathBuf, bytes: u64 },
    /// A file with the target name was already there; nothing was requested.
    Skipped(PathBuf),
}

/// `<dir>/<sanitized title - published>.<extension>`
pub fn target_path(dir: &Path, item: &FeedItem, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", item.file_stem(), extension))
}

/// Fetch one item's media into `dir` unless its target file already exists.
/// `dir` must exist.
#[instrument(level = "info", skip(client, dir, item, extension), fields(file = %item.file_stem()))]
pub async fn download_item(
    client: &Client,
    dir: &Path,
    item: &FeedItem,
    extension: &str,
) -> Result<ItemOutcome> {
    let target = target_path(dir, item, extension);
    if fs::try_exists(&target)
        .await
        .with_context(|| format!("checking {}", target.display()))?
    {
        info!("not downloading, already exists");
        return Ok(ItemOutcome::Skipped(target));
    }

    let url = item
        .download_url()
        .with_context(|| format!("no http(s) media url for {:?} (guid {:?})", item.title, item.guid))?;
    info!(%url, "downloading");

    let resp = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()?;
    let bytes = stream_to_file(resp, &target).await?;

    info!(bytes, "downloaded");
    Ok(ItemOutcome::Downloaded {
        path: target,
        bytes,
    })
}

/// Stream the body into a temp file next to `target`, then rename it into
/// place. A transfer that fails part way leaves nothing at `target`.
async fn stream_to_file(resp: Response, target: &Path) -> Result<u64> {
    let dir = target
        .parent()
        .with_context(|| format!("no parent directory for {}", target.display()))?;
    let tmp = tempfile::Builder::new()
        .prefix(".partial-")
        .tempfile_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    let mut out = fs::File::from_std(tmp.reopen().context("opening temp file")?);

    let mut written = 0u64;
    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context("reading response body")?;
        out.write_all(&chunk)
            .await
            .with_context(|| format!("writing {}", tmp.path().display()))?;
        written += chunk.len() as u64;
    }
    out.flush().await?;
    drop(out);
    set_readable(tmp.as_file())?;

    tmp.persist(target)
        .with_context(|| format!("moving download into {}", target.display()))?;
    debug!(path = %target.display(), written, "persisted");
    Ok(written)
}

/// Temp files start out owner-only; downloads get the usual 0644.
#[cfg(unix)]
fn set_readable(file: &std::fs::File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))
        .context("setting download permissions")
}

#[cfg(not(unix))]
fn set_readable(_file: &std::fs::File) -> Result<()> {
    Ok(())
}
