// src/feed/mod.rs
//! RSS/Atom feed → one media file per item in a folder.

pub mod download;
pub mod fetch;
pub mod sanitize;
pub mod snapshot;

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::{fs, time::Instant};
use tracing::{error, info, instrument};

use self::download::{download_item, ItemOutcome};
use self::fetch::{fetch_feed, FeedSnapshot};
use self::sanitize::sanitize;
use self::snapshot::write_snapshot;

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Already sanitized, see [`output_dir`].
    pub out_dir: PathBuf,
    pub feed_url: String,
    pub extension: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Set when the feed could not be fetched or parsed and the run went on
    /// with no items.
    pub fetch_error: Option<String>,
}

/// `base/<folder>` with the folder name sanitized into a single component.
pub fn output_dir(base: &Path, folder: &str) -> PathBuf {
    base.join(sanitize(folder))
}

/// Fetch the feed, download every item that is not on disk yet, then write
/// the snapshot. Per-item failures are logged and counted; only directory
/// and snapshot errors end the run.
#[instrument(level = "info", skip(client, opts), fields(url = %opts.feed_url, dir = %opts.out_dir.display()))]
pub async fn run_download(client: &Client, opts: &DownloadOptions) -> Result<DownloadSummary> {
    let start = Instant::now();
    let mut summary = DownloadSummary::default();

    let snapshot = match fetch_feed(client, &opts.feed_url).await {
        Ok(s) => s,
        Err(e) => {
            error!("feed {} unusable, continuing with no items: {:#}", opts.feed_url, e);
            summary.fetch_error = Some(format!("{e:#}"));
            FeedSnapshot::empty(&opts.feed_url)
        }
    };
    info!(items = snapshot.items.len(), "feed loaded");

    fs::create_dir_all(&opts.out_dir)
        .await
        .with_context(|| format!("creating output directory {}", opts.out_dir.display()))?;

    for item in &snapshot.items {
        match download_item(client, &opts.out_dir, item, &opts.extension).await {
            Ok(ItemOutcome::Downloaded { .. }) => summary.downloaded += 1,
            Ok(ItemOutcome::Skipped(_)) => summary.skipped += 1,
            Err(e) => {
                summary.failed += 1;
                error!("{:?} failed: {:#}", item.title, e);
            }
        }
    }

    let path = write_snapshot(&opts.out_dir, &snapshot).await?;
    info!(
        snapshot = %path.display(),
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        failed = summary.failed,
        elapsed = ?start.elapsed(),
        "all done"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::fetch::tests::rss;
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,feedload::feed=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn rerun_downloads_nothing_new() {
        init_test_logging();
        let server = MockServer::start().await;
        let guids: Vec<String> = (1..=3).map(|i| format!("{}/v/{i}", server.uri())).collect();
        let xml = rss(&[
            ("One", "Wed, 18 Jan 2006 15:04:05 +0000", guids[0].as_str()),
            ("Two", "Thu, 19 Jan 2006 15:04:05 +0000", guids[1].as_str()),
            ("Broken", "Fri, 20 Jan 2006 15:04:05 +0000", guids[2].as_str()),
        ]);
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/rss+xml")
                    .set_body_string(xml),
            )
            .expect(2)
            .mount(&server)
            .await;
        for (p, body) in [("/v/1", "first"), ("/v/2", "second")] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .expect(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/v/3"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let base = tempdir().unwrap();
        let opts = DownloadOptions {
            out_dir: output_dir(base.path(), "Course: Intro/2006"),
            feed_url: format!("{}/feed.xml", server.uri()),
            extension: "mp4".to_string(),
        };
        assert!(opts.out_dir.ends_with("Course_ Intro_2006"));

        let first = run_download(&Client::new(), &opts).await.unwrap();
        assert_eq!(
            first,
            DownloadSummary {
                downloaded: 2,
                skipped: 0,
                failed: 1,
                fetch_error: None
            }
        );
        assert_eq!(
            files_in(&opts.out_dir),
            vec![
                "One - Wed_ 18 Jan 2006 15_04_05 +0000.mp4",
                "Two - Thu_ 19 Jan 2006 15_04_05 +0000.mp4",
                "feed.json",
            ]
        );
        assert_eq!(
            std::fs::read_to_string(
                opts.out_dir.join("One - Wed_ 18 Jan 2006 15_04_05 +0000.mp4")
            )
            .unwrap(),
            "first"
        );

        // media mocks expect exactly one hit each; the broken item is retried
        let second = run_download(&Client::new(), &opts).await.unwrap();
        assert_eq!(second.downloaded, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(second.failed, 1);
    }

    #[tokio::test]
    async fn unreachable_feed_writes_empty_snapshot() {
        init_test_logging();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a feed"))
            .mount(&server)
            .await;

        let base = tempdir().unwrap();
        let opts = DownloadOptions {
            out_dir: output_dir(base.path(), "empty"),
            feed_url: format!("{}/feed.xml", server.uri()),
            extension: "mp4".to_string(),
        };

        let summary = run_download(&Client::new(), &opts).await.unwrap();
        assert!(summary.fetch_error.is_some());
        assert_eq!(summary.downloaded + summary.skipped + summary.failed, 0);
        assert_eq!(files_in(&opts.out_dir), vec!["feed.json"]);

        let snap: serde_json::Value =
            serde_json::from_slice(&std::fs::read(opts.out_dir.join("feed.json")).unwrap())
                .unwrap();
        assert_eq!(snap["items"].as_array().map(Vec::len), Some(0));
        assert!(snap["raw"].is_null());
    }

    #[tokio::test]
    async fn snapshot_keeps_the_whole_feed() {
        let server = MockServer::start().await;
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Lectures</title><item><title>One</title><author>prof@example.com</author><description>Lecture summary text</description><category>CS101</category><guid>{}/v/1</guid></item></channel></rss>"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xml.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("video"))
            .mount(&server)
            .await;

        let base = tempdir().unwrap();
        let opts = DownloadOptions {
            out_dir: output_dir(base.path(), "full"),
            feed_url: format!("{}/feed.xml", server.uri()),
            extension: "mp4".to_string(),
        };
        run_download(&Client::new(), &opts).await.unwrap();

        let snap: serde_json::Value =
            serde_json::from_slice(&std::fs::read(opts.out_dir.join("feed.json")).unwrap())
                .unwrap();
        let raw = snap["raw"].as_str().unwrap();
        assert_eq!(raw, xml);
        assert!(raw.contains("<description>Lecture summary text</description>"));
        assert!(raw.contains("<author>prof@example.com</author>"));
        assert!(raw.contains("<category>CS101</category>"));
    }

    #[tokio::test]
    async fn connection_refused_is_not_fatal() {
        let base = tempdir().unwrap();
        let opts = DownloadOptions {
            out_dir: output_dir(base.path(), "offline"),
            feed_url: "http://127.0.0.1:9/feed.xml".to_string(),
            extension: "mp4".to_string(),
        };
        let summary = run_download(&Client::new(), &opts).await.unwrap();
        assert!(summary.fetch_error.is_some());
        assert!(opts.out_dir.join("feed.json").exists());
    }
}
