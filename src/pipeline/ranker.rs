//! Final ordering of enriched narratives.

use crate::models::EnrichedNarrative;
use std::cmp::Reverse;

/// Order by confidence (highest first), drop narratives under
/// `min_confidence`, then keep at most `max_narratives`.
///
/// The sort is stable, so ties keep the clusterer's order.
pub fn rank(
    mut narratives: Vec<EnrichedNarrative>,
    max_narratives: usize,
    min_confidence: u8,
) -> Vec<EnrichedNarrative> {
    narratives.retain(|n| n.confidence() >= min_confidence);
    narratives.sort_by_key(|n| Reverse(n.confidence()));
    narratives.truncate(max_narratives);
    narratives
}
