//! Community posts from Farcaster cast search.

use super::{categorize, check_status, http_client, normalize_text, SignalSource};
use super::COMMUNITY_FALLBACK_CATEGORY;
use crate::config::{CommunitySourceConfig, SourcesConfig};
use crate::error::AdapterError;
use crate::models::{Signal, SourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

const SNIPPET_CHARS: usize = 60;
const CAST_URL_BASE: &str = "https://warpcast.com";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    casts: Vec<Cast>,
}

#[derive(Debug, Deserialize)]
struct Cast {
    hash: String,
    #[serde(default)]
    text: String,
    author: Author,
    #[serde(default)]
    reactions: Reactions,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Author {
    username: String,
}

#[derive(Debug, Default, Deserialize)]
struct Reactions {
    #[serde(default)]
    likes_count: u64,
    #[serde(default)]
    recasts_count: u64,
}

/// Searches Farcaster casts through the Neynar API.
pub struct FarcasterSource {
    config: CommunitySourceConfig,
    keyword: String,
    client: reqwest::Client,
}

impl FarcasterSource {
    pub fn new(config: &SourcesConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            config: config.community.clone(),
            keyword: config.keyword.clone(),
            client: http_client(config.timeout_ms)?,
        })
    }
}

#[async_trait]
impl SignalSource for FarcasterSource {
    fn name(&self) -> &str {
        "farcaster"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Community
    }

    async fn detect(&self) -> Result<Vec<Signal>, AdapterError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AdapterError::NotConfigured("Neynar API key missing".to_string()))?;

        let url = format!("{}/cast/search", self.config.api_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .header("x-api-key", api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[
                ("q", self.keyword.clone()),
                ("limit", self.config.limit.to_string()),
            ])
            .send()
            .await?;

        let body = check_status(response, &url)?.text().await?;
        let signals = parse_casts(&body)?;
        debug!("Cast search returned {} post(s)", signals.len());
        Ok(signals)
    }
}

/// Parse a cast search response into community signals.
pub fn parse_casts(body: &str) -> Result<Vec<Signal>, AdapterError> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| AdapterError::Parse(format!("invalid cast search response: {}", e)))?;

    Ok(response
        .result
        .casts
        .into_iter()
        .filter_map(|cast| {
            let text = normalize_text(&cast.text);
            if text.is_empty() {
                return None;
            }

            let snippet: String = text.chars().take(SNIPPET_CHARS).collect();
            let identity = format!("@{}: {}", cast.author.username, snippet);
            let short_hash: String = cast.hash.chars().take(10).collect();
            let url = format!("{}/{}/{}", CAST_URL_BASE, cast.author.username, short_hash);

            let mut signal = Signal::new(SourceKind::Community, identity, text.clone())
                .with_category(categorize(&text, COMMUNITY_FALLBACK_CATEGORY))
                .with_url(url)
                .with_engagement(cast.reactions.likes_count + cast.reactions.recasts_count);
            if let Some(at) = cast.timestamp {
                signal = signal.with_published_at(at);
            }
            Some(signal)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = include_str!("../../fixtures/neynar_casts.json");

    #[test]
    fn test_parse_fixture() {
        let signals = parse_casts(FIXTURE).unwrap();
        assert_eq!(signals.len(), 3);

        let first = &signals[0];
        assert_eq!(first.kind, SourceKind::Community);
        assert_eq!(first.identity, "@toly: shipping a new mobile wallet flow this week");
        assert_eq!(first.url, "https://warpcast.com/toly/0x1a2b3c4d");
        assert_eq!(first.engagement, Some(57));
        assert_eq!(first.category.as_deref(), Some("Mobile"));
        assert!(first.published_at.is_some());
    }

    #[test]
    fn test_identity_snippet_is_truncated() {
        let signals = parse_casts(FIXTURE).unwrap();
        let long = &signals[1];
        let snippet = long.identity.trim_start_matches("@degen: ");
        assert_eq!(snippet.chars().count(), SNIPPET_CHARS);
        assert_eq!(long.category.as_deref(), Some("General"));
        assert_eq!(long.engagement, Some(0));
    }

    #[test]
    fn test_entities_decoded() {
        let signals = parse_casts(FIXTURE).unwrap();
        assert_eq!(signals[2].text, "gm & wagmi, solana nfts are back");
        assert_eq!(signals[2].category.as_deref(), Some("NFT"));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_not_configured() {
        let config = SourcesConfig::default();
        let source = FarcasterSource::new(&config).unwrap();
        let result = source.detect().await;
        assert!(matches!(result, Err(AdapterError::NotConfigured(_))));
    }
}
