//! Build-idea enrichment.
//!
//! Each scored narrative gets its own generator call. Calls run
//! concurrently and fail independently.

use crate::config::EnrichmentFailurePolicy;
use crate::error::GenerationError;
use crate::llm::extract::{extract_json, into_array};
use crate::llm::{GenerationRequest, Generator};
use crate::models::{BuildIdea, EnrichedNarrative, ScoredNarrative};
use futures::future::join_all;
use serde_json::Value;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-narrative enrichment outcomes, in input order.
pub struct EnrichmentBatch {
    pub outcomes: Vec<(ScoredNarrative, Result<Vec<BuildIdea>, GenerationError>)>,
}

impl EnrichmentBatch {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, r)| r.is_err()).count()
    }

    /// Resolve the batch into narratives under one failure policy.
    pub fn resolve(self, policy: EnrichmentFailurePolicy) -> Vec<EnrichedNarrative> {
        self.outcomes
            .into_iter()
            .filter_map(|(scored, result)| match result {
                Ok(build_ideas) => Some(EnrichedNarrative {
                    scored,
                    build_ideas,
                    enrichment_error: None,
                }),
                Err(e) => match policy {
                    EnrichmentFailurePolicy::Retain => Some(EnrichedNarrative {
                        scored,
                        build_ideas: Vec::new(),
                        enrichment_error: Some(e.to_string()),
                    }),
                    EnrichmentFailurePolicy::Drop => None,
                },
            })
            .collect()
    }
}

/// Generates build ideas for scored narratives.
pub struct NarrativeEnricher {
    generator: Arc<dyn Generator>,
    ecosystem: String,
    ideas_per_narrative: usize,
}

impl NarrativeEnricher {
    pub fn new(generator: Arc<dyn Generator>, ecosystem: impl Into<String>, ideas_per_narrative: usize) -> Self {
        Self {
            generator,
            ecosystem: ecosystem.into(),
            ideas_per_narrative,
        }
    }

    /// Generate build ideas for one narrative.
    pub async fn enrich(&self, narrative: &ScoredNarrative) -> Result<Vec<BuildIdea>, GenerationError> {
        let prompt = self.build_prompt(narrative);
        let response = self.generator.generate(GenerationRequest::json(prompt)).await?;
        let ideas = parse_ideas(&response, self.ideas_per_narrative)?;
        debug!(
            "Generated {} build idea(s) for '{}'",
            ideas.len(),
            narrative.candidate.title
        );
        Ok(ideas)
    }

    /// Enrich every narrative concurrently.
    pub async fn enrich_all(&self, narratives: Vec<ScoredNarrative>) -> EnrichmentBatch {
        let results = join_all(narratives.iter().map(|n| self.enrich(n))).await;

        for (narrative, result) in narratives.iter().zip(&results) {
            if let Err(e) = result {
                warn!(
                    narrative = %narrative.candidate.title,
                    error = %e,
                    "build idea generation failed"
                );
            }
        }

        EnrichmentBatch {
            outcomes: narratives.into_iter().zip(results).collect(),
        }
    }

    fn build_prompt(&self, narrative: &ScoredNarrative) -> String {
        let candidate = &narrative.candidate;
        let mut prompt = format!(
            "Generate {n} concrete product ideas for this {eco} narrative.\n\n\
             NARRATIVE: {title}\n\
             DESCRIPTION: {description}\n\
             CATEGORY: {category}\n\
             CONFIDENCE: {confidence}%\n\n\
             SUPPORTING EVIDENCE:\n",
            n = self.ideas_per_narrative,
            eco = self.ecosystem,
            title = candidate.title,
            description = candidate.description,
            category = candidate.category,
            confidence = narrative.confidence,
        );

        if narrative.sources.is_empty() {
            prompt.push_str("- none\n");
        }
        for citation in &narrative.sources {
            let _ = writeln!(prompt, "- {}: {}", citation.kind, citation.content);
        }

        let _ = write!(
            prompt,
            "\nFor each idea:\n\
             1. title (max 60 chars, specific)\n\
             2. description (2-3 sentences, buildable product)\n\
             3. rationale (why this fits the narrative)\n\n\
             Requirements:\n\
             - Unbuilt products (not existing ones)\n\
             - Leverage {eco}-specific advantages\n\
             - Realistic (buildable in 2-4 weeks by a solo developer)\n\
             - Directly tied to the narrative momentum\n\n\
             Return a JSON array of exactly {n} objects with \"title\", \"description\" and \"rationale\".\n",
            eco = self.ecosystem,
            n = self.ideas_per_narrative,
        );

        prompt
    }
}

/// Parse exactly `expected` ideas; extra ideas are dropped.
pub fn parse_ideas(response: &str, expected: usize) -> Result<Vec<BuildIdea>, GenerationError> {
    let value = extract_json(response).map_err(|e| GenerationError::malformed(e.to_string()))?;
    let items = into_array(value, &["ideas", "build_ideas"])
        .ok_or_else(|| GenerationError::malformed("expected a JSON array of ideas"))?;

    let mut ideas = Vec::with_capacity(expected);
    for (i, item) in items.into_iter().enumerate() {
        let idea = parse_idea(item)
            .map_err(|reason| GenerationError::malformed(format!("idea {}: {}", i + 1, reason)))?;
        ideas.push(idea);
    }

    if ideas.len() < expected {
        return Err(GenerationError::malformed(format!(
            "expected {} ideas, got {}",
            expected,
            ideas.len()
        )));
    }
    ideas.truncate(expected);
    Ok(ideas)
}

fn parse_idea(item: Value) -> Result<BuildIdea, String> {
    let field = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let idea = BuildIdea {
        title: field("title"),
        description: field("description"),
        rationale: field("rationale"),
    };
    if idea.title.is_empty() {
        return Err("missing \"title\"".to_string());
    }
    if idea.description.is_empty() {
        return Err("missing \"description\"".to_string());
    }
    Ok(idea)
}
