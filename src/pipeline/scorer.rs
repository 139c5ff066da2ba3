//! Confidence scoring.
//!
//! Confidence is recomputed from the aggregated signals; whatever the
//! generator claimed only widens the match set.

use crate::models::{
    Citation, NarrativeCandidate, PerSource, ScoredNarrative, Signal, SignalSet, SourceKind,
};
use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::collections::BTreeSet;

/// Points per matched report.
pub const REPORT_POINTS: usize = 15;
/// Report contribution ceiling.
pub const REPORT_CAP: usize = 50;
/// Points per matched developer signal.
pub const DEVELOPER_POINTS: usize = 5;
/// Developer contribution ceiling.
pub const DEVELOPER_CAP: usize = 30;
/// Community posts carry no weight.
pub const COMMUNITY_POINTS: usize = 0;
/// Developer signals cited per narrative.
pub const MAX_DEVELOPER_CITATIONS: usize = 5;

/// Score a candidate against the signal set.
pub fn score(candidate: NarrativeCandidate, signals: &SignalSet) -> ScoredNarrative {
    let matched = SourceKind::ALL.map(|kind| {
        matching(
            signals.of(kind),
            candidate.claimed_evidence.get(kind),
            &candidate.category,
        )
    });
    let [reports, developer, community] = matched;

    let confidence = confidence(reports.len(), developer.len(), community.len());

    let sources: Vec<Citation> = reports
        .iter()
        .map(|s| s.citation())
        .chain(
            developer
                .iter()
                .take(MAX_DEVELOPER_CITATIONS)
                .map(|s| s.citation()),
        )
        .collect();

    let evidence = PerSource {
        reports: identities(&reports),
        developer_activity: identities(&developer),
        community: identities(&community),
    };

    ScoredNarrative {
        narrative_id: narrative_id(),
        candidate,
        confidence,
        evidence,
        sources,
        first_detected: Utc::now(),
    }
}

fn identities(matched: &[&Signal]) -> Vec<String> {
    matched.iter().map(|s| s.identity.clone()).collect()
}

/// Score every candidate, preserving order.
pub fn score_all(candidates: Vec<NarrativeCandidate>, signals: &SignalSet) -> Vec<ScoredNarrative> {
    candidates.into_iter().map(|c| score(c, signals)).collect()
}

/// Weighted confidence from per-kind match counts, in [0, 100].
pub fn confidence(reports: usize, developer: usize, community: usize) -> u8 {
    let report_score = (reports * REPORT_POINTS).min(REPORT_CAP);
    let developer_score = (developer * DEVELOPER_POINTS).min(DEVELOPER_CAP);
    let community_score = community * COMMUNITY_POINTS;
    (report_score + developer_score + community_score).min(100) as u8
}

/// Signals named in `claimed` or sharing the candidate's category, in signal order.
fn matching<'a>(signals: &'a [Signal], claimed: &BTreeSet<String>, category: &str) -> Vec<&'a Signal> {
    signals
        .iter()
        .filter(|s| claimed.contains(&s.identity) || s.in_category(category))
        .collect()
}

/// Run-local identifier, safe in URLs and JSON.
fn narrative_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("narrative_{}_{}", Utc::now().timestamp_millis(), suffix)
}
