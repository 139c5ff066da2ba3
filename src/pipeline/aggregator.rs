//! Signal aggregation.
//!
//! Runs every source concurrently, tolerates individual failures and
//! returns a bounded signal set per source kind.

use crate::config::SourcesConfig;
use crate::error::AdapterError;
use crate::models::{PerSource, Signal, SignalSet, SourceFailure, SourceKind};
use crate::sources::SignalSource;
use futures::future::join_all;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fans out to the configured sources and merges their signals.
pub struct Aggregator {
    sources: Vec<Box<dyn SignalSource>>,
    caps: PerSource<usize>,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(sources: Vec<Box<dyn SignalSource>>, caps: PerSource<usize>, timeout: Duration) -> Self {
        Self {
            sources,
            caps,
            timeout,
        }
    }

    /// Caps and per-source budget taken from the `[sources]` section.
    pub fn from_config(sources: Vec<Box<dyn SignalSource>>, config: &SourcesConfig) -> Self {
        Self::new(
            sources,
            config.caps.per_source(),
            Duration::from_millis(config.adapter_timeout_ms),
        )
    }

    /// Collect signals from every source. Never fails.
    ///
    /// Failed or timed-out sources contribute nothing and are recorded in
    /// [`SignalSet::failures`].
    pub async fn aggregate(&self) -> SignalSet {
        let outcomes = join_all(self.sources.iter().map(|source| async move {
            match tokio::time::timeout(self.timeout, source.detect()).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(AdapterError::Timeout(self.timeout.as_millis() as u64).to_string()),
            }
        }))
        .await;

        let mut set = SignalSet::default();
        for (source, outcome) in self.sources.iter().zip(outcomes) {
            match outcome {
                Ok(mut signals) => {
                    debug!("{} returned {} signal(s)", source.name(), signals.len());
                    set.signals.get_mut(source.kind()).append(&mut signals);
                }
                Err(error) => {
                    warn!(source = source.name(), error = %error, "source failed, continuing without it");
                    set.failures.push(SourceFailure {
                        source: source.name().to_string(),
                        kind: source.kind(),
                        error,
                    });
                }
            }
        }

        for kind in SourceKind::ALL {
            let signals = set.signals.get_mut(kind);
            let before = signals.len();
            dedup_by_identity(signals);
            signals.truncate(*self.caps.get(kind));
            if signals.len() < before {
                debug!("{}: kept {} of {} signal(s)", kind, signals.len(), before);
            }
        }

        let counts = set.counts();
        info!(
            "Aggregated {} report(s), {} developer signal(s), {} community post(s)",
            counts.reports, counts.developer_activity, counts.community
        );

        set
    }
}

/// Drop signals whose identity was already seen, keeping the first.
fn dedup_by_identity(signals: &mut Vec<Signal>) {
    let mut seen = HashSet::new();
    signals.retain(|s| seen.insert(s.identity.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::RssReportSource;
    use crate::testing::{signal, FailingSource, StaticSource};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn caps() -> PerSource<usize> {
        PerSource {
            reports: 5,
            developer_activity: 10,
            community: 5,
        }
    }

    fn numbered(kind: SourceKind, prefix: &str, n: usize) -> Vec<Signal> {
        (0..n)
            .map(|i| signal(kind, &format!("{} {}", prefix, i), None))
            .collect()
    }

    #[tokio::test]
    async fn test_failing_developer_source_is_isolated() {
        let aggregator = Aggregator::new(
            vec![
                Box::new(StaticSource::new(
                    "reports",
                    SourceKind::Report,
                    numbered(SourceKind::Report, "report", 2),
                )),
                Box::new(FailingSource::new("github", SourceKind::DeveloperActivity)),
                Box::new(StaticSource::new(
                    "casts",
                    SourceKind::Community,
                    numbered(SourceKind::Community, "cast", 3),
                )),
            ],
            caps(),
            Duration::from_secs(5),
        );

        let set = aggregator.aggregate().await;
        assert_eq!(set.of(SourceKind::Report).len(), 2);
        assert!(set.of(SourceKind::DeveloperActivity).is_empty());
        assert_eq!(set.of(SourceKind::Community).len(), 3);
        assert_eq!(set.failures.len(), 1);
        assert_eq!(set.failures[0].source, "github");
        assert_eq!(set.failures[0].kind, SourceKind::DeveloperActivity);
    }

    #[tokio::test]
    async fn test_caps_per_kind() {
        let aggregator = Aggregator::new(
            vec![
                Box::new(StaticSource::new(
                    "reports",
                    SourceKind::Report,
                    numbered(SourceKind::Report, "report", 8),
                )),
                Box::new(StaticSource::new(
                    "github",
                    SourceKind::DeveloperActivity,
                    numbered(SourceKind::DeveloperActivity, "repo", 15),
                )),
                Box::new(StaticSource::new(
                    "casts",
                    SourceKind::Community,
                    numbered(SourceKind::Community, "cast", 7),
                )),
            ],
            caps(),
            Duration::from_secs(5),
        );

        let set = aggregator.aggregate().await;
        assert_eq!(set.of(SourceKind::Report).len(), 5);
        assert_eq!(set.of(SourceKind::DeveloperActivity).len(), 10);
        assert_eq!(set.of(SourceKind::Community).len(), 5);
        assert_eq!(set.of(SourceKind::Report)[0].identity, "report 0");
        assert!(set.failures.is_empty());
    }

    #[tokio::test]
    async fn test_same_kind_sources_concatenate_and_dedup() {
        let aggregator = Aggregator::new(
            vec![
                Box::new(StaticSource::new(
                    "feed-a",
                    SourceKind::Report,
                    vec![
                        signal(SourceKind::Report, "Alpha", Some("DeFi")),
                        signal(SourceKind::Report, "Beta", None),
                    ],
                )),
                Box::new(StaticSource::new(
                    "feed-b",
                    SourceKind::Report,
                    vec![
                        signal(SourceKind::Report, "Alpha", Some("NFT")),
                        signal(SourceKind::Report, "Gamma", None),
                    ],
                )),
            ],
            caps(),
            Duration::from_secs(5),
        );

        let set = aggregator.aggregate().await;
        let ids: Vec<&str> = set
            .of(SourceKind::Report)
            .iter()
            .map(|s| s.identity.as_str())
            .collect();
        assert_eq!(ids, vec!["Alpha", "Beta", "Gamma"]);
        assert_eq!(set.of(SourceKind::Report)[0].category.as_deref(), Some("DeFi"));
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let aggregator = Aggregator::new(
            vec![
                Box::new(
                    StaticSource::new(
                        "slow",
                        SourceKind::DeveloperActivity,
                        numbered(SourceKind::DeveloperActivity, "repo", 2),
                    )
                    .with_delay(Duration::from_secs(5)),
                ),
                Box::new(StaticSource::new(
                    "reports",
                    SourceKind::Report,
                    numbered(SourceKind::Report, "report", 1),
                )),
            ],
            caps(),
            Duration::from_millis(50),
        );

        let set = aggregator.aggregate().await;
        assert!(set.of(SourceKind::DeveloperActivity).is_empty());
        assert_eq!(set.of(SourceKind::Report).len(), 1);
        assert_eq!(set.failures.len(), 1);
        assert_eq!(set.failures[0].error, "Timed out after 50ms");
    }

    #[tokio::test]
    async fn test_no_sources() {
        let aggregator = Aggregator::new(Vec::new(), caps(), Duration::from_secs(1));
        let set = aggregator.aggregate().await;
        assert_eq!(set.total(), 0);
        assert!(set.failures.is_empty());
    }

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Research</title>
<item><title>Solana validator client diversity</title><link>https://example.com/clients</link></item>
</channel></rss>"#;

    /// Accepts connections and never answers.
    async fn silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                open.push(stream);
            }
        });
        format!("http://{}/rss", addr)
    }

    /// Answers every request with `FEED`.
    async fn feed_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/rss+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    FEED.len(),
                    FEED
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{}/rss", addr)
    }

    #[tokio::test]
    async fn test_hanging_feed_keeps_healthy_feed_reports() {
        let mut config = SourcesConfig {
            timeout_ms: 300,
            adapter_timeout_ms: 1_000,
            ..SourcesConfig::default()
        };
        config.reports.feeds = vec![silent_server().await, feed_server().await];

        let source = RssReportSource::new(&config).unwrap();
        let aggregator = Aggregator::from_config(vec![Box::new(source)], &config);

        let set = aggregator.aggregate().await;
        let reports = set.of(SourceKind::Report);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].identity, "Solana validator client diversity");
        assert!(set.failures.is_empty());
    }
}
