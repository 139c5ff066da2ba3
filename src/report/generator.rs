//! Markdown and JSON report generation.
//!
//! This module renders a [`NarrativeReport`] for people (Markdown) and for
//! downstream consumers (JSON).

use crate::models::{
    ConfidenceBand, EnrichedNarrative, NarrativeReport, NarrativeSummary, ReportMetadata,
    SourceKind,
};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &NarrativeReport) -> String {
    let mut output = String::new();

    output.push_str("# Narrative Oracle Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_narratives_section(&report.narratives));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!(
        "- **Signals:** {} reports, {} repositories, {} community posts\n",
        metadata.signal_counts.reports,
        metadata.signal_counts.developer_activity,
        metadata.signal_counts.community
    ));
    section.push_str(&format!(
        "- **Candidates Clustered:** {}\n",
        metadata.candidates_clustered
    ));
    if !metadata.failed_sources.is_empty() {
        section.push_str(&format!(
            "- **Failed Sources:** {}\n",
            metadata.failed_sources.join("; ")
        ));
    }
    if metadata.enrichment_failures > 0 {
        section.push_str(&format!(
            "- **Enrichment Failures:** {}\n",
            metadata.enrichment_failures
        ));
    }
    section.push_str(&format!(
        "- **Run Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &NarrativeReport) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Summary](#summary)\n");
    toc.push_str("- [Narratives](#narratives)\n");

    for (i, narrative) in report.narratives.iter().enumerate() {
        toc.push_str(&format!(
            "  - [{}. {}](#{})\n",
            i + 1,
            narrative.title(),
            anchor(narrative)
        ));
    }

    toc.push('\n');

    toc
}

/// Generate the summary section.
fn generate_summary_section(summary: &NarrativeSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");

    section.push_str("### Confidence Breakdown\n\n");
    section.push_str(&format!(
        "| {} High | {} Medium | {} Low | **Total** |\n",
        ConfidenceBand::High.emoji(),
        ConfidenceBand::Medium.emoji(),
        ConfidenceBand::Low.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.high, summary.medium, summary.low, summary.total
    ));

    if !summary.by_category.is_empty() {
        section.push_str("### Narratives by Category\n\n");
        section.push_str("| Category | Count |\n");
        section.push_str("|:---|:---:|\n");

        let mut categories: Vec<_> = summary.by_category.iter().collect();
        categories.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (category, count) in categories {
            section.push_str(&format!("| {} | {} |\n", category, count));
        }
        section.push('\n');
    }

    section
}

/// Generate the narratives section.
fn generate_narratives_section(narratives: &[EnrichedNarrative]) -> String {
    let mut section = String::new();

    section.push_str("## Narratives\n\n");

    if narratives.is_empty() {
        section.push_str("No narratives were detected in this run.\n\n");
        return section;
    }

    for (i, narrative) in narratives.iter().enumerate() {
        section.push_str(&generate_narrative_block(i + 1, narrative));
    }

    section
}

/// Generate a single narrative block.
fn generate_narrative_block(rank: usize, narrative: &EnrichedNarrative) -> String {
    let mut block = String::new();
    let scored = &narrative.scored;
    let band = ConfidenceBand::from_confidence(scored.confidence);

    block.push_str(&format!(
        "### {}. {} {{#{}}}\n\n",
        rank,
        narrative.title(),
        anchor(narrative)
    ));
    block.push_str(&format!(
        "{} **{} confidence ({}/100)** | Category: {} | ID: `{}`\n\n",
        band.emoji(),
        band,
        scored.confidence,
        narrative.category(),
        scored.narrative_id
    ));

    if !scored.candidate.description.is_empty() {
        block.push_str(&format!("{}\n\n", scored.candidate.description));
    }

    block.push_str("**Evidence:**\n\n");
    for kind in SourceKind::ALL {
        let matched = scored.evidence.get(kind);
        block.push_str(&format!("- {}: {}\n", kind, matched.len()));
    }
    block.push('\n');

    if !scored.sources.is_empty() {
        block.push_str("**Sources:**\n\n");
        for citation in &scored.sources {
            if citation.url.is_empty() {
                block.push_str(&format!("- {}: {}\n", citation.kind, citation.content));
            } else {
                block.push_str(&format!(
                    "- {}: [{}]({})\n",
                    citation.kind, citation.content, citation.url
                ));
            }
        }
        block.push('\n');
    }

    if !narrative.build_ideas.is_empty() {
        block.push_str("**Build Ideas:**\n\n");
        for (i, idea) in narrative.build_ideas.iter().enumerate() {
            block.push_str(&format!(
                "{}. **{}** - {}\n",
                i + 1,
                idea.title,
                idea.description
            ));
            if !idea.rationale.is_empty() {
                block.push_str(&format!("   > {}\n", idea.rationale));
            }
        }
        block.push('\n');
    }

    if let Some(ref error) = narrative.enrichment_error {
        block.push_str(&format!("> ⚠️ **Build ideas unavailable:** {}\n\n", error));
    }

    block.push_str("---\n\n");

    block
}

fn anchor(narrative: &EnrichedNarrative) -> String {
    let slug: String = narrative
        .title()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    format!("{}-{}", slug.trim_matches('-'), narrative.scored.narrative_id)
}

/// Generate the report footer.
pub(super) fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by Narrative Oracle v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &NarrativeReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
