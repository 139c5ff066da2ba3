//! Narrative detection pipeline.
//!
//! Five stages run in order: aggregate signals, cluster them into
//! candidates, score each candidate, enrich the scored narratives with
//! build ideas, and rank the result. Idea validation in [`validator`]
//! reuses the generator outside these stages.

pub mod aggregator;
pub mod clusterer;
pub mod enrichment;
pub mod ranker;
pub mod scorer;
pub mod validator;

pub use aggregator::Aggregator;
pub use clusterer::NarrativeClusterer;
pub use enrichment::NarrativeEnricher;
pub use validator::IdeaValidator;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::models::{EnrichedNarrative, PerSource, SignalSet};
use indicatif::ProgressBar;
use std::time::Instant;
use tracing::{info, warn};

/// Counters describing one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub signal_counts: PerSource<usize>,
    pub failed_sources: Vec<String>,
    pub candidates_clustered: usize,
    pub enrichment_failures: usize,
    pub duration_seconds: f64,
}

/// Output of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub narratives: Vec<EnrichedNarrative>,
    pub stats: PipelineStats,
}

/// Wires the stages together.
pub struct NarrativePipeline {
    aggregator: Aggregator,
    clusterer: NarrativeClusterer,
    enricher: NarrativeEnricher,
    config: PipelineConfig,
    progress: Option<ProgressBar>,
}

impl NarrativePipeline {
    pub fn new(
        aggregator: Aggregator,
        clusterer: NarrativeClusterer,
        enricher: NarrativeEnricher,
        config: PipelineConfig,
    ) -> Self {
        Self {
            aggregator,
            clusterer,
            enricher,
            config,
            progress: None,
        }
    }

    /// Report the running stage on a spinner.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    fn stage(&self, message: &'static str) {
        if let Some(ref pb) = self.progress {
            pb.set_message(message);
        }
    }

    /// Run only the aggregation stage.
    pub async fn collect_signals(&self) -> SignalSet {
        self.stage("Collecting signals...");
        self.aggregator.aggregate().await
    }

    /// Run all five stages.
    ///
    /// Only a clustering failure ends the run; source and enrichment
    /// failures are absorbed and counted in [`PipelineStats`].
    pub async fn run(&self) -> Result<PipelineRun, PipelineError> {
        let start = Instant::now();

        let signals = self.collect_signals().await;
        if signals.total() == 0 {
            warn!("No signals collected, clustering on an empty set");
        }
        let mut stats = PipelineStats {
            signal_counts: signals.counts(),
            failed_sources: signals.failures.iter().map(|f| f.to_string()).collect(),
            ..PipelineStats::default()
        };

        self.stage("Clustering narratives...");
        let candidates = self
            .clusterer
            .cluster(&signals)
            .await
            .map_err(PipelineError::Clustering)?;
        stats.candidates_clustered = candidates.len();

        self.stage("Scoring narratives...");
        let scored = scorer::score_all(candidates, &signals);
        info!(
            "Scored {} narrative(s), top confidence {}",
            scored.len(),
            scored.iter().map(|n| n.confidence).max().unwrap_or(0)
        );

        self.stage("Generating build ideas...");
        let batch = self.enricher.enrich_all(scored).await;
        stats.enrichment_failures = batch.failures();
        let enriched = batch.resolve(self.config.on_enrichment_failure);
        if stats.enrichment_failures > 0 {
            info!(
                "{} enrichment call(s) failed ({:?} policy)",
                stats.enrichment_failures, self.config.on_enrichment_failure
            );
        }

        self.stage("Ranking...");
        let narratives = ranker::rank(
            enriched,
            self.config.max_narratives,
            self.config.min_confidence,
        );
        stats.duration_seconds = start.elapsed().as_secs_f64();
        info!(
            "Pipeline finished with {} narrative(s) in {:.1}s",
            narratives.len(),
            stats.duration_seconds
        );

        Ok(PipelineRun { narratives, stats })
    }
}
