//! Institutional reports from RSS feeds.

use super::{categorize, check_status, http_client, mentions, normalize_text, SignalSource};
use super::FALLBACK_CATEGORY;
use crate::config::SourcesConfig;
use crate::error::AdapterError;
use crate::models::{Signal, SourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// Fetches report items from a list of RSS feeds.
pub struct RssReportSource {
    feeds: Vec<String>,
    keyword: String,
    lookback: Duration,
    client: reqwest::Client,
}

impl RssReportSource {
    pub fn new(config: &SourcesConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            feeds: config.reports.feeds.clone(),
            keyword: config.keyword.clone(),
            lookback: Duration::days(config.reports.lookback_days),
            client: http_client(config.timeout_ms)?,
        })
    }

    async fn fetch_feed(&self, feed: &str) -> Result<Vec<Signal>, AdapterError> {
        let response = self.client.get(feed).send().await?;
        let body = check_status(response, feed)?.text().await?;
        parse_feed(&body, feed, Utc::now(), &self.keyword, self.lookback)
    }
}

#[async_trait]
impl SignalSource for RssReportSource {
    fn name(&self) -> &str {
        "rss-reports"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Report
    }

    async fn detect(&self) -> Result<Vec<Signal>, AdapterError> {
        let results = join_all(self.feeds.iter().map(|feed| self.fetch_feed(feed))).await;

        let mut signals = Vec::new();
        let mut failed = 0;
        for (feed, result) in self.feeds.iter().zip(results) {
            match result {
                Ok(mut items) => {
                    debug!("Feed {} yielded {} report(s)", feed, items.len());
                    signals.append(&mut items);
                }
                Err(e) => {
                    warn!(feed = %feed, error = %e, "report feed failed");
                    failed += 1;
                }
            }
        }

        if failed > 0 && failed == self.feeds.len() {
            return Err(AdapterError::AllRequestsFailed(failed));
        }

        Ok(signals)
    }
}

/// Parse one RSS document into report signals.
///
/// Keeps items mentioning `keyword` in the title or description and published
/// within `lookback` of `now`. Undated items are kept.
pub fn parse_feed(
    xml: &str,
    feed: &str,
    now: DateTime<Utc>,
    keyword: &str,
    lookback: Duration,
) -> Result<Vec<Signal>, AdapterError> {
    let cleaned = scrub_html_entities_for_xml(xml);
    let rss: Rss = quick_xml::de::from_str(&cleaned)
        .map_err(|e| AdapterError::Parse(format!("invalid RSS from {}: {}", feed, e)))?;

    let cutoff = now - lookback;
    let mut out = Vec::new();

    for item in rss.channel.items {
        let title = normalize_text(item.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            continue;
        }
        let description = normalize_text(item.description.as_deref().unwrap_or_default());

        if !mentions(&title, keyword) && !mentions(&description, keyword) {
            continue;
        }

        let published_at = item.pub_date.as_deref().and_then(parse_pub_date);
        if published_at.is_some_and(|at| at < cutoff) {
            continue;
        }

        let text = if description.is_empty() {
            title.clone()
        } else {
            format!("{}. {}", title, description)
        };

        let mut signal = Signal::new(SourceKind::Report, title.clone(), text)
            .with_category(categorize(&title, FALLBACK_CATEGORY))
            .with_url(item.link.as_deref().map(str::trim).unwrap_or(feed));
        if let Some(at) = published_at {
            signal = signal.with_published_at(at);
        }
        out.push(signal);
    }

    Ok(out)
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .or_else(|_| DateTime::parse_from_rfc3339(raw.trim()))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Replace HTML-only entities that are not valid XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
