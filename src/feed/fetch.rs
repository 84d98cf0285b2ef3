// src/feed/fetch.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed};
use reqwest::Client;
use serde::Serialize;
use std::io::Read;
use tracing::{debug, instrument};
use url::Url;

use crate::feed::sanitize::sanitize;

/// The parts of a fetched feed the downloader uses, plus the document exactly
/// as served. All of it goes into the snapshot file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedSnapshot {
    pub source: String,
    pub feed_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    pub items: Vec<FeedItem>,
    /// Response body, unmodified. `None` when nothing usable was fetched.
    pub raw: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedItem {
    pub title: String,
    pub published: Option<DateTime<Utc>>,
    pub guid: String,
    /// First enclosure / media content URL, if any.
    pub media_url: Option<String>,
    pub links: Vec<String>,
}

impl FeedSnapshot {
    /// What the run carries on with when the feed could not be fetched.
    pub fn empty(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Self::default()
        }
    }

    pub fn from_feed(source: &str, feed: Feed) -> Self {
        Self {
            source: source.to_string(),
            feed_type: Some(format!("{:?}", feed.feed_type)),
            title: feed.title.map(|t| t.content),
            description: feed.description.map(|t| t.content),
            updated: feed.updated,
            items: feed.entries.into_iter().map(FeedItem::from_entry).collect(),
            raw: None,
        }
    }
}

impl FeedItem {
    fn from_entry(entry: Entry) -> Self {
        let media_url = entry
            .media
            .iter()
            .flat_map(|m| m.content.iter())
            .find_map(|c| c.url.as_ref().map(|u| u.to_string()));
        Self {
            title: entry.title.map(|t| t.content).unwrap_or_default(),
            published: entry.published,
            guid: entry.id,
            media_url,
            links: entry.links.into_iter().map(|l| l.href).collect(),
        }
    }

    /// Publish date as RFC 2822 in UTC, empty when the feed gave none. The
    /// parser normalises dates, so the feed's own offset is not kept.
    pub fn published_label(&self) -> String {
        self.published
            .map(|d| d.to_rfc2822())
            .unwrap_or_default()
    }

    /// `<title> - <published>`, sanitized for use as a file name.
    pub fn file_stem(&self) -> String {
        sanitize(&format!("{} - {}", self.title, self.published_label()))
    }

    /// Where the media lives: the GUID when it is an http(s) URL, otherwise
    /// the first enclosure, otherwise the first link.
    pub fn download_url(&self) -> Option<Url> {
        std::iter::once(self.guid.as_str())
            .chain(self.media_url.as_deref())
            .chain(self.links.iter().map(String::as_str))
            .filter_map(|s| Url::parse(s).ok())
            .find(|u| matches!(u.scheme(), "http" | "https"))
    }
}

/// Parse an RSS, Atom or JSON feed document.
pub fn parse_feed<R: Read>(source: &str, body: R) -> Result<FeedSnapshot> {
    let feed = feed_rs::parser::parse(body).with_context(|| format!("parsing feed {source}"))?;
    Ok(FeedSnapshot::from_feed(source, feed))
}

/// Parse `body` and keep the document itself alongside the parsed items.
pub fn parse_document(source: &str, body: &[u8]) -> Result<FeedSnapshot> {
    let mut snapshot = parse_feed(source, body)?;
    snapshot.raw = Some(String::from_utf8_lossy(body).into_owned());
    Ok(snapshot)
}

/// GET `url` and parse the body as a feed.
#[instrument(level = "info", skip(client))]
pub async fn fetch_feed(client: &Client, url: &str) -> Result<FeedSnapshot> {
    let body = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()?
        .bytes()
        .await
        .with_context(|| format!("reading body from {url}"))?;
    debug!(bytes = body.len(), "feed body received");
    parse_document(url, &body)
}
