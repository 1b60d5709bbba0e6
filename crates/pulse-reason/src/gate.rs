//! The evidence quality gate.
//!
//! A candidate survives only with a verifiable http/https source URL, a
//! publication timestamp, and a non-blank summary. Exclusions are kept with
//! a cause so the audit log can explain what was dropped.

use serde::Serialize;

use crate::adapter::Candidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionCause {
  MissingSourceUrl,
  InvalidScheme,
  MissingPublishedAt,
  EmptySummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct Exclusion {
  pub source_url: String,
  pub source:     String,
  pub cause:      ExclusionCause,
}

#[derive(Debug, Default)]
pub struct GateOutcome {
  pub accepted: Vec<Candidate>,
  pub excluded: Vec<Exclusion>,
}

/// Apply the gate. Summaries are whitespace-trimmed in place on accepted
/// candidates.
pub fn apply_quality_gate(candidates: Vec<Candidate>) -> GateOutcome {
  let mut outcome = GateOutcome::default();

  for mut candidate in candidates {
    let url = candidate.source_url.trim();
    let cause = if url.is_empty() {
      Some(ExclusionCause::MissingSourceUrl)
    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
      Some(ExclusionCause::InvalidScheme)
    } else if candidate.published_at.is_none() {
      Some(ExclusionCause::MissingPublishedAt)
    } else if candidate.summary.trim().is_empty() {
      Some(ExclusionCause::EmptySummary)
    } else {
      None
    };

    match cause {
      Some(cause) => outcome.excluded.push(Exclusion {
        source_url: url.to_owned(),
        source: candidate.source.clone(),
        cause,
      }),
      None => {
        candidate.source_url = url.to_owned();
        candidate.summary = candidate.summary.trim().to_owned();
        outcome.accepted.push(candidate);
      }
    }
  }

  outcome
}
