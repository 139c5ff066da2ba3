//! Data models for the narrative oracle.
//!
//! This module contains the records that flow between pipeline stages:
//! signals, narrative candidates, scored and enriched narratives, and the
//! report read model handed to downstream consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Narrative categories the clusterer is asked to choose from.
pub const NARRATIVE_CATEGORIES: &[&str] = &[
    "Mobile",
    "DeFi",
    "NFT",
    "DePIN",
    "AI Agents",
    "Gaming",
    "Infrastructure",
];

/// Kind of source a signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Institutional reports and research blogs
    Report,
    /// Developer activity (repository search)
    DeveloperActivity,
    /// Community posts
    Community,
}

impl SourceKind {
    /// All source kinds in pipeline order.
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Report,
        SourceKind::DeveloperActivity,
        SourceKind::Community,
    ];

    /// Label used in citation records.
    pub fn citation_type(&self) -> &'static str {
        match self {
            SourceKind::Report => "Report",
            SourceKind::DeveloperActivity => "GitHub",
            SourceKind::Community => "Community",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Report => write!(f, "Reports"),
            SourceKind::DeveloperActivity => write!(f, "Developer Activity"),
            SourceKind::Community => write!(f, "Community"),
        }
    }
}

/// One value per source kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerSource<T> {
    #[serde(default)]
    pub reports: T,
    #[serde(default, rename = "github", alias = "developer_activity")]
    pub developer_activity: T,
    #[serde(default)]
    pub community: T,
}

impl<T> PerSource<T> {
    pub fn get(&self, kind: SourceKind) -> &T {
        match kind {
            SourceKind::Report => &self.reports,
            SourceKind::DeveloperActivity => &self.developer_activity,
            SourceKind::Community => &self.community,
        }
    }

    pub fn get_mut(&mut self, kind: SourceKind) -> &mut T {
        match kind {
            SourceKind::Report => &mut self.reports,
            SourceKind::DeveloperActivity => &mut self.developer_activity,
            SourceKind::Community => &mut self.community,
        }
    }

    /// Apply `f` to each per-source value.
    pub fn map<U>(&self, mut f: impl FnMut(SourceKind, &T) -> U) -> PerSource<U> {
        PerSource {
            reports: f(SourceKind::Report, &self.reports),
            developer_activity: f(SourceKind::DeveloperActivity, &self.developer_activity),
            community: f(SourceKind::Community, &self.community),
        }
    }
}

/// A normalized unit of evidence from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Source kind the signal came from.
    pub kind: SourceKind,
    /// Citation key (report title, repository name, cast author + snippet).
    pub identity: String,
    /// Free-form content used for clustering.
    pub text: String,
    /// Heuristic category assigned by the adapter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Provenance link.
    pub url: String,
    /// Stars for repositories, reactions for posts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement: Option<u64>,
    /// Publication time, when the source provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Signal {
    pub fn new(kind: SourceKind, identity: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind,
            identity: identity.into(),
            text: text.into(),
            category: None,
            url: String::new(),
            engagement: None,
            published_at: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_engagement(mut self, engagement: u64) -> Self {
        self.engagement = Some(engagement);
        self
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Whether the adapter-assigned category matches `category`.
    pub fn in_category(&self, category: &str) -> bool {
        self.category
            .as_deref()
            .is_some_and(|c| c.trim().eq_ignore_ascii_case(category.trim()))
    }

    /// Citation record for this signal.
    pub fn citation(&self) -> Citation {
        let content = match (self.kind, self.engagement) {
            (SourceKind::DeveloperActivity, Some(stars)) => {
                format!("{} ({} stars)", self.identity, stars)
            }
            _ => self.identity.clone(),
        };

        Citation {
            kind: self.kind.citation_type().to_string(),
            content,
            url: self.url.clone(),
        }
    }
}

/// Aggregated signals for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalSet {
    #[serde(flatten)]
    pub signals: PerSource<Vec<Signal>>,
    /// Sources that failed or timed out during aggregation.
    #[serde(default)]
    pub failures: Vec<SourceFailure>,
}

impl SignalSet {
    pub fn of(&self, kind: SourceKind) -> &[Signal] {
        self.signals.get(kind)
    }

    pub fn counts(&self) -> PerSource<usize> {
        self.signals.map(|_, v| v.len())
    }

    pub fn total(&self) -> usize {
        SourceKind::ALL.iter().map(|k| self.of(*k).len()).sum()
    }
}

/// A source that contributed nothing because it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    pub kind: SourceKind,
    pub error: String,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.source, self.kind, self.error)
    }
}

/// Signal identities the clusterer claims as support. Advisory only.
pub type ClaimedEvidence = PerSource<BTreeSet<String>>;

/// Clusterer output before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeCandidate {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub claimed_evidence: ClaimedEvidence,
}

/// A source citation attached to a scored narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub url: String,
}

/// A narrative with recomputed confidence and evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredNarrative {
    pub narrative_id: String,
    #[serde(flatten)]
    pub candidate: NarrativeCandidate,
    /// Confidence in [0, 100].
    pub confidence: u8,
    /// Identities of matched signals per source.
    pub evidence: PerSource<Vec<String>>,
    pub sources: Vec<Citation>,
    pub first_detected: DateTime<Utc>,
}

/// A generated follow-up product idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildIdea {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub rationale: String,
}

/// A scored narrative with its build ideas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedNarrative {
    #[serde(flatten)]
    pub scored: ScoredNarrative,
    pub build_ideas: Vec<BuildIdea>,
    /// Set when enrichment failed and the narrative was retained anyway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment_error: Option<String>,
}

impl EnrichedNarrative {
    pub fn confidence(&self) -> u8 {
        self.scored.confidence
    }

    pub fn title(&self) -> &str {
        &self.scored.candidate.title
    }

    pub fn category(&self) -> &str {
        &self.scored.candidate.category
    }
}

/// Confidence band used for report summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    /// Below 40
    Low,
    /// 40 to 69
    Medium,
    /// 70 and above
    High,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: u8) -> Self {
        match confidence {
            70..=u8::MAX => ConfidenceBand::High,
            40..=69 => ConfidenceBand::Medium,
            _ => ConfidenceBand::Low,
        }
    }

    /// Returns an emoji representation of the band.
    pub fn emoji(&self) -> &'static str {
        match self {
            ConfidenceBand::Low => "🟢",
            ConfidenceBand::Medium => "🟡",
            ConfidenceBand::High => "🔥",
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceBand::Low => write!(f, "Low"),
            ConfidenceBand::Medium => write!(f, "Medium"),
            ConfidenceBand::High => write!(f, "High"),
        }
    }
}

/// Summary of the narratives in a report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NarrativeSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// Narratives grouped by category.
    pub by_category: HashMap<String, usize>,
}

impl NarrativeSummary {
    /// Creates a summary from a list of narratives.
    pub fn from_narratives(narratives: &[EnrichedNarrative]) -> Self {
        let mut summary = Self {
            total: narratives.len(),
            ..Self::default()
        };

        for narrative in narratives {
            match ConfidenceBand::from_confidence(narrative.confidence()) {
                ConfidenceBand::High => summary.high += 1,
                ConfidenceBand::Medium => summary.medium += 1,
                ConfidenceBand::Low => summary.low += 1,
            }

            *summary
                .by_category
                .entry(narrative.category().to_string())
                .or_insert(0) += 1;
        }

        summary
    }
}

/// Metadata about a detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Name of the LLM model used.
    pub model_used: String,
    /// Signals handed to the clusterer, per source.
    pub signal_counts: PerSource<usize>,
    /// Sources that failed during aggregation.
    pub failed_sources: Vec<String>,
    /// Candidates returned by the clusterer.
    pub candidates_clustered: usize,
    /// Narratives whose enrichment call failed.
    pub enrichment_failures: usize,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The read model produced by one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeReport {
    pub metadata: ReportMetadata,
    pub summary: NarrativeSummary,
    pub narratives: Vec<EnrichedNarrative>,
}

/// Product-market-fit dimensions an idea is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PmfDimension {
    ProblemClarity,
    MarketSize,
    Uniqueness,
    Feasibility,
    Monetization,
    Timing,
    Virality,
    Defensibility,
    TeamFit,
    OracleFactor,
}

impl PmfDimension {
    pub const ALL: [PmfDimension; 10] = [
        PmfDimension::ProblemClarity,
        PmfDimension::MarketSize,
        PmfDimension::Uniqueness,
        PmfDimension::Feasibility,
        PmfDimension::Monetization,
        PmfDimension::Timing,
        PmfDimension::Virality,
        PmfDimension::Defensibility,
        PmfDimension::TeamFit,
        PmfDimension::OracleFactor,
    ];

    /// Key used in the generator's JSON answer.
    pub fn key(&self) -> &'static str {
        match self {
            PmfDimension::ProblemClarity => "problemClarity",
            PmfDimension::MarketSize => "marketSize",
            PmfDimension::Uniqueness => "uniqueness",
            PmfDimension::Feasibility => "feasibility",
            PmfDimension::Monetization => "monetization",
            PmfDimension::Timing => "timing",
            PmfDimension::Virality => "virality",
            PmfDimension::Defensibility => "defensibility",
            PmfDimension::TeamFit => "teamFit",
            PmfDimension::OracleFactor => "oracleFactor",
        }
    }

    /// Rubric line shown to the generator, from 1 to 10.
    pub fn rubric(&self) -> &'static str {
        match self {
            PmfDimension::ProblemClarity => "Is the pain point quantified? (1=vague, 10=quantified cost)",
            PmfDimension::MarketSize => "Is the addressable market above $1B? (1=niche, 10=unicorn potential)",
            PmfDimension::Uniqueness => "Is there a moat? (1=commodity, 10=novel mechanism)",
            PmfDimension::Feasibility => "Can an indie team build it? (1=impossible, 10=MVP in 2 weeks)",
            PmfDimension::Monetization => "Is there clear willingness to pay? (1=ads only, 10=pre-sales)",
            PmfDimension::Timing => "Why now? (1=too early or late, 10=perfect catalyst)",
            PmfDimension::Virality => "Are there growth loops? (1=sales-led, 10=product-led)",
            PmfDimension::Defensibility => "Switching costs? (1=none, 10=lock-in)",
            PmfDimension::TeamFit => "Low ops? (1=heavy ops, 10=automated code)",
            PmfDimension::OracleFactor => "Is it exciting? (1=boring, 10=mind-blowing)",
        }
    }
}

impl fmt::Display for PmfDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PmfDimension::ProblemClarity => "Problem Clarity",
            PmfDimension::MarketSize => "Market Size",
            PmfDimension::Uniqueness => "Uniqueness",
            PmfDimension::Feasibility => "Feasibility",
            PmfDimension::Monetization => "Monetization",
            PmfDimension::Timing => "Timing",
            PmfDimension::Virality => "Virality",
            PmfDimension::Defensibility => "Defensibility",
            PmfDimension::TeamFit => "Team Fit",
            PmfDimension::OracleFactor => "Oracle Factor",
        };
        write!(f, "{}", label)
    }
}

/// Score for one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionScore {
    /// 1 to 10.
    pub score: u8,
    pub reasoning: String,
}

/// One validation round for one version of an idea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaValidation {
    /// The idea text that was scored.
    pub idea: String,
    pub scores: BTreeMap<PmfDimension, DimensionScore>,
    /// Mean of the dimension scores, one decimal.
    pub average: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvements: Vec<String>,
}

/// Result of validating and refining an idea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaRefinement {
    /// Every round, oldest first.
    pub rounds: Vec<IdeaValidation>,
    /// Idea text of the last round.
    pub final_idea: String,
    pub target_score: f64,
    pub target_reached: bool,
}

impl IdeaRefinement {
    /// Highest-scoring round.
    pub fn best(&self) -> Option<&IdeaValidation> {
        self.rounds
            .iter()
            .max_by(|a, b| a.average.total_cmp(&b.average))
    }
}

/// Read model for an idea validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub generated_at: DateTime<Utc>,
    pub model_used: String,
    #[serde(flatten)]
    pub refinement: IdeaRefinement,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{enriched, signal};

    #[test]
    fn test_confidence_band_boundaries() {
        assert_eq!(ConfidenceBand::from_confidence(0), ConfidenceBand::Low);
        assert_eq!(ConfidenceBand::from_confidence(39), ConfidenceBand::Low);
        assert_eq!(ConfidenceBand::from_confidence(40), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_confidence(69), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_confidence(70), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::from_confidence(100), ConfidenceBand::High);
    }

    #[test]
    fn test_developer_citation_includes_stars() {
        let repo = signal(SourceKind::DeveloperActivity, "anchor", Some("DeFi"))
            .with_engagement(1200)
            .with_url("https://github.com/coral-xyz/anchor");
        let citation = repo.citation();
        assert_eq!(citation.kind, "GitHub");
        assert_eq!(citation.content, "anchor (1200 stars)");
        assert_eq!(citation.url, "https://github.com/coral-xyz/anchor");
    }

    #[test]
    fn test_report_citation_content_is_identity() {
        let report = signal(SourceKind::Report, "State of Solana Q3", Some("DeFi"))
            .with_engagement(7);
        assert_eq!(report.citation().content, "State of Solana Q3");
        assert_eq!(report.citation().kind, "Report");
    }

    #[test]
    fn test_in_category_ignores_case_and_padding() {
        let s = signal(SourceKind::Community, "@a: hi", Some("AI Agents"));
        assert!(s.in_category(" ai agents "));
        assert!(!s.in_category("Gaming"));
        assert!(!signal(SourceKind::Community, "@b: yo", None).in_category("Gaming"));
    }

    #[test]
    fn test_per_source_serializes_developer_activity_as_github() {
        let counts = PerSource {
            reports: 1usize,
            developer_activity: 2,
            community: 3,
        };
        let json = serde_json::to_value(&counts).unwrap();
        assert_eq!(json["github"], 2);

        let parsed: PerSource<usize> =
            serde_json::from_str(r#"{"reports": 4, "developer_activity": 5}"#).unwrap();
        assert_eq!(parsed.developer_activity, 5);
        assert_eq!(parsed.community, 0);
    }

    #[test]
    fn test_narrative_summary() {
        let narratives = vec![
            enriched("A", "DeFi", 80),
            enriched("B", "DeFi", 55),
            enriched("C", "Gaming", 10),
        ];

        let summary = NarrativeSummary::from_narratives(&narratives);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.high, 1);
        assert_eq!(summary.medium, 1);
        assert_eq!(summary.low, 1);
        assert_eq!(summary.by_category.get("DeFi"), Some(&2));
        assert_eq!(summary.by_category.get("Gaming"), Some(&1));
    }

    #[test]
    fn test_pmf_dimension_keys_match_serde() {
        for dimension in PmfDimension::ALL {
            let json = serde_json::to_value(dimension).unwrap();
            assert_eq!(json, dimension.key());
        }
        assert_eq!(PmfDimension::TeamFit.to_string(), "Team Fit");
    }
}
