// src/feed/snapshot.rs
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::feed::fetch::FeedSnapshot;

pub const SNAPSHOT_FILE: &str = "feed.json";

/// Write the feed as pretty JSON to `<dir>/feed.json`, replacing any earlier
/// snapshot.
pub async fn write_snapshot(dir: &Path, snapshot: &FeedSnapshot) -> Result<PathBuf> {
    let path = dir.join(SNAPSHOT_FILE);
    let json = serde_json::to_vec_pretty(snapshot).context("serialising feed snapshot")?;
    fs::write(&path, json)
        .await
        .with_context(|| format!("writing feed snapshot {}", path.display()))?;
    Ok(path)
}
