//! Developer activity from repository search.

use super::{categorize, check_status, http_client, normalize_text, SignalSource};
use super::FALLBACK_CATEGORY;
use crate::config::{GithubSourceConfig, SourcesConfig};
use crate::error::AdapterError;
use crate::models::{Signal, SourceKind};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
    #[serde(default)]
    description: Option<String>,
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    topics: Vec<String>,
}

/// Searches for trending and recently created repositories.
pub struct GithubSource {
    config: GithubSourceConfig,
    keyword: String,
    client: reqwest::Client,
}

impl GithubSource {
    pub fn new(config: &SourcesConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            config: config.github.clone(),
            keyword: config.keyword.clone(),
            client: http_client(config.timeout_ms)?,
        })
    }

    /// Repositories with activity since `since`.
    fn trending_query(&self, since: NaiveDate) -> String {
        format!(
            "{} stars:>{} pushed:>{}",
            self.keyword,
            self.config.trending_min_stars,
            since.format("%Y-%m-%d")
        )
    }

    /// Repositories created since `since`.
    fn recent_query(&self, since: NaiveDate) -> String {
        format!(
            "{} created:>{} stars:>{}",
            self.keyword,
            since.format("%Y-%m-%d"),
            self.config.recent_min_stars
        )
    }

    async fn search(&self, query: &str, per_page: u32) -> Result<Vec<Signal>, AdapterError> {
        let url = format!(
            "{}/search/repositories",
            self.config.api_url.trim_end_matches('/')
        );
        debug!("Repository search: {}", query);

        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .query(&[
                ("q", query.to_string()),
                ("sort", "stars".to_string()),
                ("order", "desc".to_string()),
                ("per_page", per_page.to_string()),
            ]);
        if let Some(ref token) = self.config.token {
            request = request.bearer_auth(token);
        }

        let response = check_status(request.send().await?, &url)?;
        let body = response.text().await?;
        parse_search(&body)
    }
}

#[async_trait]
impl SignalSource for GithubSource {
    fn name(&self) -> &str {
        "github-search"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::DeveloperActivity
    }

    async fn detect(&self) -> Result<Vec<Signal>, AdapterError> {
        let since = (Utc::now() - Duration::days(self.config.window_days)).date_naive();
        let trending_query = self.trending_query(since);
        let recent_query = self.recent_query(since);

        let (trending, recent) = tokio::join!(
            self.search(&trending_query, self.config.trending_limit),
            self.search(&recent_query, self.config.recent_limit),
        );

        let mut signals = Vec::new();
        let mut failed = 0;
        for (label, result) in [("trending", trending), ("recent", recent)] {
            match result {
                Ok(mut repos) => signals.append(&mut repos),
                Err(e) => {
                    warn!(search = label, error = %e, "repository search failed");
                    failed += 1;
                }
            }
        }
        if failed == 2 {
            return Err(AdapterError::AllRequestsFailed(failed));
        }

        signals.sort_by_key(|s| std::cmp::Reverse(s.engagement.unwrap_or(0)));
        Ok(signals)
    }
}

/// Parse a repository search response into developer signals.
pub fn parse_search(body: &str) -> Result<Vec<Signal>, AdapterError> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| AdapterError::Parse(format!("invalid search response: {}", e)))?;

    Ok(response
        .items
        .into_iter()
        .map(|repo| {
            let description = normalize_text(repo.description.as_deref().unwrap_or_default());
            let haystack = format!("{} {} {}", description, repo.topics.join(" "), repo.name);
            let text = if description.is_empty() {
                repo.name.clone()
            } else {
                format!("{}: {}", repo.name, description)
            };

            Signal::new(SourceKind::DeveloperActivity, repo.name, text)
                .with_category(categorize(&haystack, FALLBACK_CATEGORY))
                .with_url(repo.html_url)
                .with_engagement(repo.stargazers_count)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = include_str!("../../fixtures/github_search.json");

    #[test]
    fn test_parse_fixture() {
        let signals = parse_search(FIXTURE).unwrap();
        assert_eq!(signals.len(), 4);

        let anchor = &signals[0];
        assert_eq!(anchor.identity, "anchor");
        assert_eq!(anchor.engagement, Some(3800));
        assert_eq!(anchor.url, "https://github.com/coral-xyz/anchor");
        assert_eq!(anchor.category.as_deref(), Some("Infrastructure"));
        assert_eq!(
            anchor.citation().content,
            "anchor (3800 stars)"
        );
    }

    #[test]
    fn test_category_from_topics_and_name() {
        let signals = parse_search(FIXTURE).unwrap();
        // Topic-only match
        assert_eq!(signals[1].category.as_deref(), Some("AI Agents"));
        // Description match
        assert_eq!(signals[2].category.as_deref(), Some("DeFi"));
        // Missing description, category from the name
        assert_eq!(signals[3].identity, "solana-game-kit");
        assert_eq!(signals[3].category.as_deref(), Some("Gaming"));
        assert_eq!(signals[3].text, "solana-game-kit");
    }

    #[test]
    fn test_queries() {
        let config = SourcesConfig::default();
        let source = GithubSource::new(&config).unwrap();
        let since = NaiveDate::from_ymd_opt(2026, 2, 18).unwrap();
        assert_eq!(
            source.trending_query(since),
            "solana stars:>50 pushed:>2026-02-18"
        );
        assert_eq!(
            source.recent_query(since),
            "solana created:>2026-02-18 stars:>10"
        );
    }

    #[test]
    fn test_invalid_body() {
        assert!(matches!(
            parse_search("<html>rate limited</html>"),
            Err(AdapterError::Parse(_))
        ));
        assert!(parse_search(r#"{"total_count": 0}"#).unwrap().is_empty());
    }
}
