//! Signal sources.
//!
//! Each source fetches from one external system and normalizes what it
//! finds into [`Signal`]s. Sources fail independently; the aggregator
//! decides what a failure means for the run.

pub mod community;
pub mod github;
pub mod reports;

pub use community::FarcasterSource;
pub use github::GithubSource;
pub use reports::RssReportSource;

use crate::config::SourcesConfig;
use crate::error::AdapterError;
use crate::models::{Signal, SourceKind};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Category assigned to reports and repositories that match no keyword.
pub const FALLBACK_CATEGORY: &str = "Infrastructure";

/// Category assigned to community posts that match no keyword.
pub const COMMUNITY_FALLBACK_CATEGORY: &str = "General";

const MAX_TEXT_CHARS: usize = 1500;

/// A source of signals of one kind.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Human-readable source name used in logs and failure records.
    fn name(&self) -> &str;

    /// Kind of signal this source produces.
    fn kind(&self) -> SourceKind;

    /// Fetch and normalize the current signals.
    async fn detect(&self) -> Result<Vec<Signal>, AdapterError>;
}

/// Build the default set of sources from configuration.
pub fn default_sources(config: &SourcesConfig) -> Result<Vec<Box<dyn SignalSource>>, AdapterError> {
    let sources: Vec<Box<dyn SignalSource>> = vec![
        Box::new(RssReportSource::new(config)?),
        Box::new(GithubSource::new(config)?),
        Box::new(FarcasterSource::new(config)?),
    ];
    Ok(sources)
}

/// HTTP client shared by the sources' request settings.
pub(crate) fn http_client(timeout_ms: u64) -> Result<reqwest::Client, AdapterError> {
    reqwest::Client::builder()
        .user_agent(concat!("narrative-oracle/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_millis(timeout_ms.min(10_000)))
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| AdapterError::Http(format!("failed to build HTTP client: {}", e)))
}

fn category_rules() -> &'static [(&'static str, Regex)] {
    static RULES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            ("Mobile", r"(?i)\b(mobile|saga)\b"),
            ("DePIN", r"(?i)\bdepin\b"),
            ("DeFi", r"(?i)\b(defi|swaps?|dex(es)?)\b"),
            ("NFT", r"(?i)\bnfts?\b"),
            ("AI Agents", r"(?i)\b(ai|agents?|agentic)\b"),
            ("Gaming", r"(?i)\b(games?|gaming)\b"),
        ]
        .into_iter()
        .filter_map(|(category, pattern)| Regex::new(pattern).ok().map(|re| (category, re)))
        .collect()
    })
}

/// Assign a heuristic category by keyword, first rule wins.
pub fn categorize(haystack: &str, fallback: &str) -> String {
    category_rules()
        .iter()
        .find(|(_, re)| re.is_match(haystack))
        .map(|(category, _)| category.to_string())
        .unwrap_or_else(|| fallback.to_string())
}

/// Decode entities, strip tags and collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceLock<Option<Regex>> = OnceLock::new();
    if let Some(re) = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").ok()) {
        out = re.replace_all(&out, " ").to_string();
    }

    out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    let mut out = out.split_whitespace().collect::<Vec<_>>().join(" ");

    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}

/// Whether `text` mentions `keyword` (case-insensitive).
pub fn mentions(text: &str, keyword: &str) -> bool {
    text.to_lowercase().contains(&keyword.to_lowercase())
}

/// Check a response status, mapping failures to [`AdapterError::Status`].
pub(crate) fn check_status(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(AdapterError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}
