//! Report assembly and rendering.

pub mod generator;
pub mod validation;

pub use generator::{generate_json_report, generate_markdown_report};
pub use validation::{
    build_validation_report, generate_validation_json, generate_validation_markdown,
};

use crate::models::{NarrativeReport, NarrativeSummary, ReportMetadata};
use crate::pipeline::PipelineRun;
use chrono::Utc;

/// Build the read model for a finished run.
pub fn build_report(run: PipelineRun, model_used: &str) -> NarrativeReport {
    let stats = run.stats;
    NarrativeReport {
        metadata: ReportMetadata {
            generated_at: Utc::now(),
            model_used: model_used.to_string(),
            signal_counts: stats.signal_counts,
            failed_sources: stats.failed_sources,
            candidates_clustered: stats.candidates_clustered,
            enrichment_failures: stats.enrichment_failures,
            duration_seconds: stats.duration_seconds,
        },
        summary: NarrativeSummary::from_narratives(&run.narratives),
        narratives: run.narratives,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineStats;
    use crate::testing::enriched;

    #[test]
    fn test_build_report() {
        let run = PipelineRun {
            narratives: vec![enriched("A", "DeFi", 80), enriched("B", "NFT", 30)],
            stats: PipelineStats {
                candidates_clustered: 4,
                ..PipelineStats::default()
            },
        };

        let report = build_report(run, "llama3.2:latest");
        assert_eq!(report.metadata.model_used, "llama3.2:latest");
        assert_eq!(report.metadata.candidates_clustered, 4);
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.high, 1);
        assert_eq!(report.narratives[0].title(), "A");
    }
}
