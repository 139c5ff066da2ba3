//! Product idea validation.
//!
//! An idea is scored on ten product-market-fit dimensions. Refinement
//! rewrites an idea that falls short of the target score and validates
//! the rewrite, for a bounded number of rounds.

use crate::error::GenerationError;
use crate::llm::extract::extract_json;
use crate::llm::{GenerationRequest, Generator};
use crate::models::{DimensionScore, IdeaRefinement, IdeaValidation, PmfDimension};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Scores ideas and rewrites them toward a target.
pub struct IdeaValidator {
    generator: Arc<dyn Generator>,
    ecosystem: String,
}

impl IdeaValidator {
    pub fn new(generator: Arc<dyn Generator>, ecosystem: impl Into<String>) -> Self {
        Self {
            generator,
            ecosystem: ecosystem.into(),
        }
    }

    /// Score one idea.
    pub async fn validate(&self, idea: &str) -> Result<IdeaValidation, GenerationError> {
        let prompt = self.validation_prompt(idea);
        let response = self.generator.generate(GenerationRequest::json(prompt)).await?;
        let validation = parse_validation(&response, idea)?;
        debug!("Idea scored {:.1}/10", validation.average);
        Ok(validation)
    }

    /// Validate `idea`, rewriting it after every round below `target_score`,
    /// for at most `max_rounds` rounds.
    ///
    /// A failure in the first round is returned. Later failures end the
    /// refinement at the last round that was scored.
    pub async fn refine(
        &self,
        idea: &str,
        max_rounds: u32,
        target_score: f64,
    ) -> Result<IdeaRefinement, GenerationError> {
        let max_rounds = max_rounds.max(1);
        let mut current = idea.trim().to_string();
        let mut rounds: Vec<IdeaValidation> = Vec::new();

        for round in 1..=max_rounds {
            let validation = match self.validate(&current).await {
                Ok(validation) => validation,
                Err(e) if !rounds.is_empty() => {
                    warn!(round, error = %e, "validation failed, keeping the previous round");
                    break;
                }
                Err(e) => return Err(e),
            };

            if validation.average >= target_score || round == max_rounds {
                info!("Round {}/{}: {:.1}/10", round, max_rounds, validation.average);
                rounds.push(validation);
                break;
            }

            info!(
                "Round {}/{}: {:.1} below target {:.1}, rewriting",
                round, max_rounds, validation.average, target_score
            );
            let rewritten = self.rewrite(&current, &validation).await;
            rounds.push(validation);
            match rewritten {
                Ok(text) => current = text,
                Err(e) => {
                    warn!(round, error = %e, "rewrite failed, keeping the scored idea");
                    break;
                }
            }
        }

        let final_idea = rounds.last().map(|r| r.idea.clone()).unwrap_or(current);
        let target_reached = rounds.last().is_some_and(|r| r.average >= target_score);

        Ok(IdeaRefinement {
            rounds,
            final_idea,
            target_score,
            target_reached,
        })
    }

    async fn rewrite(&self, idea: &str, validation: &IdeaValidation) -> Result<String, GenerationError> {
        let prompt = rewrite_prompt(idea, validation);
        let response = self.generator.generate(GenerationRequest::text(prompt)).await?;
        clean_rewrite(&response)
    }

    fn validation_prompt(&self, idea: &str) -> String {
        let mut prompt = format!(
            "You are a rigorous validator of {eco} product ideas. Score this idea on \
             10 product-market-fit dimensions, 1 to 10 each.\n\n\
             IDEA: {idea}\n\n\
             SCORING RUBRIC:\n",
            eco = self.ecosystem,
            idea = idea.trim(),
        );
        for (i, dimension) in PmfDimension::ALL.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}: {}", i + 1, dimension, dimension.rubric());
        }

        prompt.push_str("\nReturn only a JSON object:\n{\n  \"scores\": {\n");
        for (i, dimension) in PmfDimension::ALL.iter().enumerate() {
            let comma = if i + 1 < PmfDimension::ALL.len() { "," } else { "" };
            let _ = writeln!(
                prompt,
                "    \"{}\": {{ \"score\": 1, \"reasoning\": \"...\" }}{}",
                dimension.key(),
                comma
            );
        }
        prompt.push_str(
            "  },\n  \"strengths\": [\"...\"],\n  \"weaknesses\": [\"...\"],\n  \
             \"improvements\": [\"Address the lowest scores specifically\"]\n}\n",
        );
        prompt
    }
}

fn rewrite_prompt(idea: &str, validation: &IdeaValidation) -> String {
    format!(
        "Rewrite this startup idea to fix its weaknesses and apply the improvements.\n\n\
         CURRENT IDEA: {idea}\n\n\
         WEAKNESSES: {weaknesses}\n\
         IMPROVEMENTS: {improvements}\n\n\
         Make it professional, punchy and investable.\n\
         Return only the new idea text, no commentary.\n",
        idea = idea,
        weaknesses = validation.weaknesses.join(", "),
        improvements = validation.improvements.join(", "),
    )
}

/// Parse a scored validation. Every dimension must carry a score from 1 to 10.
pub fn parse_validation(response: &str, idea: &str) -> Result<IdeaValidation, GenerationError> {
    let value = extract_json(response).map_err(|e| GenerationError::malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(GenerationError::malformed("expected a JSON object"));
    }
    let scores_value = value.get("scores").unwrap_or(&value);

    let mut scores = BTreeMap::new();
    for dimension in PmfDimension::ALL {
        let entry = scores_value.get(dimension.key()).ok_or_else(|| {
            GenerationError::malformed(format!("missing score for \"{}\"", dimension.key()))
        })?;
        let score = parse_score(entry)
            .map_err(|reason| GenerationError::malformed(format!("{}: {}", dimension.key(), reason)))?;
        scores.insert(dimension, score);
    }

    let total: u32 = scores.values().map(|s| u32::from(s.score)).sum();
    let average = total as f64 / scores.len() as f64;

    Ok(IdeaValidation {
        idea: idea.trim().to_string(),
        scores,
        average: (average * 10.0).round() / 10.0,
        strengths: string_list(&value, "strengths"),
        weaknesses: string_list(&value, "weaknesses"),
        improvements: string_list(&value, "improvements"),
    })
}

/// `{"score": 7, "reasoning": "..."}` or a bare number.
fn parse_score(entry: &Value) -> Result<DimensionScore, String> {
    let (raw, reasoning) = match entry {
        Value::Object(map) => (
            map.get("score").and_then(Value::as_f64),
            map.get("reasoning")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
        ),
        other => (other.as_f64(), String::new()),
    };

    let raw = raw.ok_or("score is not a number")?;
    let score = raw.round();
    if !(1.0..=10.0).contains(&score) {
        return Err(format!("score {} is outside 1-10", raw));
    }
    Ok(DimensionScore {
        score: score as u8,
        reasoning,
    })
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Strip code fences and wrapping quotes from a rewritten idea.
fn clean_rewrite(response: &str) -> Result<String, GenerationError> {
    let mut text = response.trim();
    if let Some(inner) = text.strip_prefix("```") {
        let inner = inner.split_once('\n').map_or("", |(_, rest)| rest);
        text = inner.trim_end().strip_suffix("```").unwrap_or(inner).trim();
    }
    let text = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
        .trim();

    if text.is_empty() {
        return Err(GenerationError::malformed("rewrite returned no text"));
    }
    Ok(text.to_string())
}
