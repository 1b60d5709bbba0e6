//! Ranking and top-3 selection.

use std::cmp::Ordering;

use crate::score::ScoredCandidate;

use pulse_core::event::MAX_REASONS;

/// Order by total descending; ties broken by higher source reliability, then
/// earlier publication, then lexicographic canonical URL. Returns at most
/// [`MAX_REASONS`] candidates in final rank order.
pub fn rank_top(mut scored: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
  scored.sort_by(compare);
  scored.truncate(MAX_REASONS);
  scored
}

fn compare(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
  b.total
    .partial_cmp(&a.total)
    .unwrap_or(Ordering::Equal)
    .then_with(|| {
      b.breakdown
        .signals
        .source_reliability
        .partial_cmp(&a.breakdown.signals.source_reliability)
        .unwrap_or(Ordering::Equal)
    })
    .then_with(|| a.candidate.published_at.cmp(&b.candidate.published_at))
    .then_with(|| a.candidate.source_url.cmp(&b.candidate.source_url))
}
