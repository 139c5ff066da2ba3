//! Idea validation reports.

use super::generator::generate_footer;
use crate::models::{IdeaRefinement, IdeaValidation, PmfDimension, ValidationReport};
use anyhow::Result;
use chrono::Utc;

/// Build the read model for a finished validation.
pub fn build_validation_report(refinement: IdeaRefinement, model_used: &str) -> ValidationReport {
    ValidationReport {
        generated_at: Utc::now(),
        model_used: model_used.to_string(),
        refinement,
    }
}

/// Generate a Markdown validation report.
pub fn generate_validation_markdown(report: &ValidationReport) -> String {
    let refinement = &report.refinement;
    let mut output = String::new();

    output.push_str("# Idea Validation Report\n\n");
    output.push_str("## Metadata\n\n");
    output.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!("- **Model Used:** `{}`\n", report.model_used));
    output.push_str(&format!("- **Rounds:** {}\n", refinement.rounds.len()));
    output.push_str(&format!(
        "- **Target Score:** {:.1} ({})\n\n",
        refinement.target_score,
        if refinement.target_reached {
            "reached"
        } else {
            "not reached"
        }
    ));

    output.push_str("## Final Idea\n\n");
    output.push_str(&format!("> {}\n\n", refinement.final_idea));

    for (i, round) in refinement.rounds.iter().enumerate() {
        output.push_str(&generate_round(i + 1, round));
    }

    output.push_str(&generate_footer());
    output
}

fn generate_round(number: usize, round: &IdeaValidation) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "## Round {}: {:.1}/10\n\n",
        number, round.average
    ));
    section.push_str(&format!("**Idea:** {}\n\n", round.idea));

    section.push_str("| Dimension | Score | Reasoning |\n");
    section.push_str("|-----------|-------|-----------|\n");
    for dimension in PmfDimension::ALL {
        if let Some(score) = round.scores.get(&dimension) {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                dimension,
                score.score,
                score.reasoning.replace('|', "\\|")
            ));
        }
    }
    section.push('\n');

    for (title, items) in [
        ("Strengths", &round.strengths),
        ("Weaknesses", &round.weaknesses),
        ("Improvements", &round.improvements),
    ] {
        if items.is_empty() {
            continue;
        }
        section.push_str(&format!("**{}:**\n\n", title));
        for item in items {
            section.push_str(&format!("- {}\n", item));
        }
        section.push('\n');
    }

    section
}

/// Generate a JSON validation report.
pub fn generate_validation_json(report: &ValidationReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
