//! Narrative clustering.
//!
//! Asks the generator to group the aggregated signals into candidate
//! narratives and parses the candidates out of its answer.

use crate::error::GenerationError;
use crate::llm::extract::{extract_json, into_array};
use crate::llm::{GenerationRequest, Generator};
use crate::models::{ClaimedEvidence, NarrativeCandidate, SignalSet, SourceKind, NARRATIVE_CATEGORIES};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fewest candidates a healthy answer contains.
pub const MIN_CANDIDATES: usize = 5;
/// Most candidates kept from one answer.
pub const MAX_CANDIDATES: usize = 10;

const EXCERPT_CHARS: usize = 200;

/// Groups signals into narrative candidates with one generator call.
pub struct NarrativeClusterer {
    generator: Arc<dyn Generator>,
    ecosystem: String,
}

impl NarrativeClusterer {
    pub fn new(generator: Arc<dyn Generator>, ecosystem: impl Into<String>) -> Self {
        Self {
            generator,
            ecosystem: ecosystem.into(),
        }
    }

    /// Cluster the signal set into at most [`MAX_CANDIDATES`] candidates.
    pub async fn cluster(&self, signals: &SignalSet) -> Result<Vec<NarrativeCandidate>, GenerationError> {
        let prompt = self.build_prompt(signals);
        debug!("Clustering prompt is {} chars", prompt.len());

        let response = self.generator.generate(GenerationRequest::json(prompt)).await?;
        let mut candidates = parse_candidates(&response)?;

        if candidates.len() > MAX_CANDIDATES {
            warn!(
                "Generator returned {} narratives, keeping the first {}",
                candidates.len(),
                MAX_CANDIDATES
            );
            candidates.truncate(MAX_CANDIDATES);
        } else if candidates.len() < MIN_CANDIDATES {
            warn!(
                "Generator returned only {} narrative(s), expected at least {}",
                candidates.len(),
                MIN_CANDIDATES
            );
        }

        info!("Clustered {} narrative candidate(s)", candidates.len());
        Ok(candidates)
    }

    fn build_prompt(&self, signals: &SignalSet) -> String {
        let mut prompt = format!(
            "You are analyzing the {} ecosystem to identify emerging narratives.\n\n",
            self.ecosystem
        );

        prompt.push_str("INSTITUTIONAL REPORTS (50% weight):\n");
        for report in signals.of(SourceKind::Report) {
            let _ = writeln!(prompt, "- {}: {}", report.identity, excerpt(&report.text));
        }

        prompt.push_str("\nDEVELOPER ACTIVITY (30% weight):\n");
        for repo in signals.of(SourceKind::DeveloperActivity) {
            let _ = writeln!(
                prompt,
                "- {} ({} stars): {}",
                repo.identity,
                repo.engagement.unwrap_or(0),
                excerpt(&repo.text)
            );
        }

        let community = signals.of(SourceKind::Community);
        if !community.is_empty() {
            prompt.push_str("\nCOMMUNITY POSTS (context only, 0% weight):\n");
            for post in community {
                let _ = writeln!(prompt, "- {}", post.identity);
            }
        }

        let _ = write!(
            prompt,
            "\nIdentify {min}-{max} emerging narratives. For each, provide:\n\
             1. title (short, memorable)\n\
             2. description (2-3 sentences explaining the trend)\n\
             3. category (one of: {categories})\n\
             4. evidence (object with \"reports\" and \"github\" arrays naming the exact signals above that support it)\n\n\
             Focus on narratives that appear across MULTIPLE sources (reports + github).\n\n\
             Return a JSON array.\n",
            min = MIN_CANDIDATES,
            max = MAX_CANDIDATES,
            categories = NARRATIVE_CATEGORIES.join(", "),
        );

        prompt
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

/// Parse candidates from a clustering response.
pub fn parse_candidates(response: &str) -> Result<Vec<NarrativeCandidate>, GenerationError> {
    let value = extract_json(response).map_err(|e| GenerationError::malformed(e.to_string()))?;
    let items = into_array(value, &["narratives"]).ok_or_else(|| {
        GenerationError::malformed("expected a JSON array of narratives")
    })?;

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| parse_candidate(item).map_err(|reason| {
            GenerationError::malformed(format!("narrative {}: {}", i + 1, reason))
        }))
        .collect()
}

fn parse_candidate(item: Value) -> Result<NarrativeCandidate, String> {
    let Value::Object(mut map) = item else {
        return Err("not an object".to_string());
    };

    let title = required_string(&map, "title")?;
    let category = required_string(&map, "category")?;
    let description = map
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let claimed_evidence = map
        .remove("evidence")
        .map(parse_evidence)
        .unwrap_or_default();

    Ok(NarrativeCandidate {
        title,
        description,
        category,
        claimed_evidence,
    })
}

fn required_string(map: &serde_json::Map<String, Value>, key: &str) -> Result<String, String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| format!("missing \"{}\"", key))
}

/// Claimed evidence keyed by kind, or a flat list applied to every kind.
fn parse_evidence(value: Value) -> ClaimedEvidence {
    let mut evidence = ClaimedEvidence::default();
    match value {
        Value::Object(map) => {
            for (key, names) in map {
                let kind = match key.to_ascii_lowercase().as_str() {
                    "reports" | "report" => SourceKind::Report,
                    "github" | "developer_activity" | "developer" => SourceKind::DeveloperActivity,
                    "community" => SourceKind::Community,
                    _ => continue,
                };
                evidence.get_mut(kind).extend(names_of(names));
            }
        }
        other => {
            let names: BTreeSet<String> = names_of(other);
            for kind in SourceKind::ALL {
                evidence.get_mut(kind).extend(names.iter().cloned());
            }
        }
    }
    evidence
}

fn names_of(value: Value) -> BTreeSet<String> {
    match value {
        Value::String(s) => BTreeSet::from([s.trim().to_string()]),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect(),
        _ => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{signal, ScriptedGenerator};

    fn signals() -> SignalSet {
        let mut set = SignalSet::default();
        set.signals.reports = vec![signal(SourceKind::Report, "State of Solana DeFi", Some("DeFi"))];
        set.signals.developer_activity = vec![signal(SourceKind::DeveloperActivity, "anchor", None)
            .with_engagement(3800)];
        set
    }

    fn narratives_json(n: usize) -> String {
        let items: Vec<Value> = (0..n)
            .map(|i| {
                serde_json::json!({
                    "title": format!("Narrative {}", i),
                    "description": "Something is happening",
                    "category": "DeFi",
                    "evidence": {"reports": ["State of Solana DeFi"], "github": ["anchor"]}
                })
            })
            .collect();
        Value::Array(items).to_string()
    }

    #[test]
    fn test_parse_bare_array_with_keyed_evidence() {
        let candidates = parse_candidates(&narratives_json(2)).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Narrative 0");
        assert!(candidates[0].claimed_evidence.reports.contains("State of Solana DeFi"));
        assert!(candidates[0].claimed_evidence.developer_activity.contains("anchor"));
        assert!(candidates[0].claimed_evidence.community.is_empty());
    }

    #[test]
    fn test_parse_wrapped_object_and_flat_evidence() {
        let response = r#"Here you go:
{"narratives": [{"title": "Mobile", "description": "Phones", "category": "Mobile",
  "evidence": ["Seeker pre-orders", "solana-mobile-stack"]}]}"#;
        let candidates = parse_candidates(response).unwrap();
        assert_eq!(candidates.len(), 1);
        let evidence = &candidates[0].claimed_evidence;
        assert!(evidence.reports.contains("Seeker pre-orders"));
        assert!(evidence.developer_activity.contains("solana-mobile-stack"));
        assert!(evidence.community.contains("Seeker pre-orders"));
    }

    #[test]
    fn test_parse_missing_evidence_and_description() {
        let candidates = parse_candidates(r#"[{"title": "DePIN", "category": "DePIN"}]"#).unwrap();
        assert_eq!(candidates[0].description, "");
        assert_eq!(candidates[0].claimed_evidence, ClaimedEvidence::default());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_candidates("I can't help with that.").unwrap_err().is_malformed());
        assert!(parse_candidates(r#"{"title": "x"}"#).unwrap_err().is_malformed());
        assert!(parse_candidates(r#"[{"description": "no title", "category": "NFT"}]"#)
            .unwrap_err()
            .is_malformed());
        assert!(parse_candidates(r#"["just a string"]"#).unwrap_err().is_malformed());
    }

    #[tokio::test]
    async fn test_cluster_truncates_to_ten() {
        let generator = Arc::new(ScriptedGenerator::always(&narratives_json(12)));
        let clusterer = NarrativeClusterer::new(generator, "Solana");
        let candidates = clusterer.cluster(&signals()).await.unwrap();
        assert_eq!(candidates.len(), MAX_CANDIDATES);
        assert_eq!(candidates[9].title, "Narrative 9");
    }

    #[tokio::test]
    async fn test_cluster_accepts_few_and_empty() {
        let generator = Arc::new(ScriptedGenerator::always(&narratives_json(2)));
        let clusterer = NarrativeClusterer::new(generator, "Solana");
        assert_eq!(clusterer.cluster(&signals()).await.unwrap().len(), 2);

        let generator = Arc::new(ScriptedGenerator::always("[]"));
        let clusterer = NarrativeClusterer::new(generator, "Solana");
        assert!(clusterer.cluster(&signals()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_lists_signals_with_weights() {
        let generator = Arc::new(ScriptedGenerator::always("[]"));
        let clusterer = NarrativeClusterer::new(generator.clone(), "Solana");

        let mut set = signals();
        clusterer.cluster(&set).await.unwrap();
        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("Solana ecosystem"));
        assert!(prompt.contains("INSTITUTIONAL REPORTS (50% weight)"));
        assert!(prompt.contains("- State of Solana DeFi: State of Solana DeFi"));
        assert!(prompt.contains("- anchor (3800 stars): anchor"));
        assert!(!prompt.contains("COMMUNITY POSTS"));

        set.signals.community = vec![signal(SourceKind::Community, "@toly: gm", None)];
        clusterer.cluster(&set).await.unwrap();
        assert!(generator.prompts()[1].contains("COMMUNITY POSTS (context only, 0% weight)"));
    }

    #[tokio::test]
    async fn test_generator_error_propagates() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Err(GenerationError::Api {
                status: 500,
                body: "boom".to_string(),
            })
        }));
        let clusterer = NarrativeClusterer::new(generator, "Solana");
        let err = clusterer.cluster(&signals()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Api { status: 500, .. }));
    }
}
