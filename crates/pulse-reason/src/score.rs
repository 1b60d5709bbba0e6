//! Confidence scoring.
//!
//! Three signals in `[0, 1]` — source reliability, event match, time
//! proximity — combined with configurable weights. Published values are
//! rounded to two decimals and the breakdown total must reconstruct from
//! its components within ±0.01.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use pulse_core::event::{
  ConfidenceBreakdown, ScoreBreakdown, SignalSet, round2,
};
use serde::Deserialize;

use crate::adapter::Candidate;

// ─── Reputation table ────────────────────────────────────────────────────────

/// Static host → reliability lookup. Data, not code: loadable from JSON with
/// an embedded default. Subdomains inherit their parent's score.
#[derive(Debug, Clone)]
pub struct ReputationTable {
  scores:  HashMap<String, f64>,
  default: f64,
}

#[derive(Debug, Deserialize)]
struct ReputationFile {
  #[serde(default = "default_unknown_score")]
  default_score: f64,
  hosts:         HashMap<String, f64>,
}

fn default_unknown_score() -> f64 { 0.4 }

impl ReputationTable {
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    let file: ReputationFile = serde_json::from_str(json)?;
    Ok(Self {
      scores:  file
        .hosts
        .into_iter()
        .map(|(host, score)| {
          (host.to_ascii_lowercase(), score.clamp(0.0, 1.0))
        })
        .collect(),
      default: file.default_score.clamp(0.0, 1.0),
    })
  }

  /// Exact host match, then parent-domain match, then the default.
  pub fn score(&self, host: &str) -> f64 {
    let host = host.to_ascii_lowercase();
    if let Some(&score) = self.scores.get(&host) {
      return score;
    }
    for (known, &score) in &self.scores {
      if host.ends_with(&format!(".{known}")) {
        return score;
      }
    }
    self.default
  }
}

impl Default for ReputationTable {
  fn default() -> Self {
    let hosts = [
      ("sec.gov", 0.95),
      ("dart.fss.or.kr", 0.95),
      ("reuters.com", 0.9),
      ("bloomberg.com", 0.9),
      ("kind.krx.co.kr", 0.85),
      ("news.naver.com", 0.75),
      ("finance.yahoo.com", 0.7),
    ];
    Self {
      scores:  hosts
        .into_iter()
        .map(|(host, score)| (host.to_owned(), score))
        .collect(),
      default: default_unknown_score(),
    }
  }
}

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ScoreConfig {
  pub weights:           SignalSet,
  /// Candidates published further than this from the detection instant
  /// score zero on time proximity.
  pub proximity_horizon: Duration,
}

impl Default for ScoreConfig {
  fn default() -> Self {
    Self {
      weights:           SignalSet {
        source_reliability: 0.4,
        event_match:        0.3,
        time_proximity:     0.3,
      },
      proximity_horizon: Duration::minutes(1440),
    }
  }
}

// ─── Signals ─────────────────────────────────────────────────────────────────

/// Lexical overlap between candidate text and the event's descriptors,
/// normalised by the descriptor count.
pub fn event_match_score(candidate: &Candidate, descriptors: &[String]) -> f64 {
  if descriptors.is_empty() {
    return 0.0;
  }

  let text = format!(
    "{} {}",
    candidate.title.as_deref().unwrap_or_default(),
    candidate.summary
  )
  .to_lowercase();
  let tokens: Vec<&str> = text
    .split(|c: char| !c.is_alphanumeric())
    .filter(|t| !t.is_empty())
    .collect();

  let hits = descriptors
    .iter()
    .filter(|d| {
      let needle = d.to_lowercase();
      tokens.contains(&needle.as_str()) || text.contains(&needle)
    })
    .count();
  hits as f64 / descriptors.len() as f64
}

/// `max(0, 1 − |published − detected| / horizon)`.
pub fn time_proximity(
  published_at: DateTime<Utc>,
  detected_at: DateTime<Utc>,
  horizon: Duration,
) -> f64 {
  let horizon_s = horizon.num_seconds().max(1) as f64;
  let delta_s = (detected_at - published_at).num_seconds().abs() as f64;
  (1.0 - delta_s / horizon_s).max(0.0)
}

// ─── Scoring ─────────────────────────────────────────────────────────────────

/// A candidate with its computed breakdown, ready for ranking.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
  pub candidate: Candidate,
  pub breakdown: ConfidenceBreakdown,
  /// The published (rounded) confidence total.
  pub total:     f64,
}

/// Score one gated, canonicalized candidate.
///
/// The caller guarantees `published_at` is present (the gate enforced it).
pub fn score_candidate(
  candidate: Candidate,
  host: &str,
  descriptors: &[String],
  detected_at: DateTime<Utc>,
  reputation: &ReputationTable,
  config: &ScoreConfig,
) -> ScoredCandidate {
  let published_at = candidate.published_at.unwrap_or(detected_at);

  let signals = SignalSet {
    source_reliability: round2(reputation.score(host)),
    event_match:        round2(event_match_score(&candidate, descriptors)),
    time_proximity:     round2(time_proximity(
      published_at,
      detected_at,
      config.proximity_horizon,
    )),
  };

  let weights = config.weights;
  let score_breakdown = ScoreBreakdown {
    source_reliability: round2(
      weights.source_reliability * signals.source_reliability,
    ),
    event_match:        round2(weights.event_match * signals.event_match),
    time_proximity:     round2(
      weights.time_proximity * signals.time_proximity,
    ),
    total:              round2(SignalSet::weighted_total(&weights, &signals)),
  };
  let total = score_breakdown.total;

  ScoredCandidate {
    candidate,
    breakdown: ConfidenceBreakdown { weights, signals, score_breakdown },
    total,
  }
}

/// One-line human rendering of a breakdown for event detail responses.
pub fn explanation_text(
  breakdown: &ConfidenceBreakdown,
  host: &str,
) -> String {
  let reliability = breakdown.signals.source_reliability;
  let source_quality = if reliability >= 0.85 {
    "high-reliability"
  } else if reliability >= 0.6 {
    "established"
  } else {
    "unverified"
  };

  let match_quality = if breakdown.signals.event_match >= 0.6 {
    "strong topical match"
  } else if breakdown.signals.event_match >= 0.3 {
    "partial topical match"
  } else {
    "weak topical match"
  };

  let timing = if breakdown.signals.time_proximity >= 0.9 {
    "published right around the move"
  } else if breakdown.signals.time_proximity >= 0.5 {
    "published near the move"
  } else {
    "published well before or after the move"
  };

  format!(
    "{source_quality} source {host}, {match_quality}, {timing} \
     (confidence {:.2})",
    breakdown.score_breakdown.total
  )
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use pulse_core::event::ReasonType;

  use super::*;

  fn candidate(summary: &str, published_minute: u32) -> Candidate {
    Candidate {
      reason_type:  ReasonType::News,
      title:        None,
      summary:      summary.into(),
      source_url:   "https://reuters.com/a".into(),
      published_at: Some(
        Utc
          .with_ymd_and_hms(2024, 3, 4, 14, published_minute, 0)
          .unwrap(),
      ),
      source:       "news".into(),
    }
  }

  #[test]
  fn reputation_matches_subdomains() {
    let table = ReputationTable::default();
    assert_eq!(table.score("reuters.com"), 0.9);
    assert_eq!(table.score("www.reuters.com"), 0.9);
    assert_eq!(table.score("blog.unknown.example"), 0.4);
  }

  #[test]
  fn reputation_loads_from_json() {
    let table = ReputationTable::from_json(
      r#"{"default_score":0.3,"hosts":{"Example.COM":0.8}}"#,
    )
    .unwrap();
    assert_eq!(table.score("example.com"), 0.8);
    assert_eq!(table.score("other.example.net"), 0.3);
  }

  #[test]
  fn proximity_decays_linearly_to_zero() {
    let detected = Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap();
    let horizon = Duration::minutes(60);
    assert_eq!(time_proximity(detected, detected, horizon), 1.0);
    let half = detected - Duration::minutes(30);
    assert!((time_proximity(half, detected, horizon) - 0.5).abs() < 1e-9);
    let far = detected - Duration::minutes(120);
    assert_eq!(time_proximity(far, detected, horizon), 0.0);
  }

  #[test]
  fn event_match_counts_descriptor_hits() {
    let c = candidate("AAPL beats guidance on record iPhone demand", 0);
    let descriptors =
      vec!["aapl".to_owned(), "apple".to_owned(), "surge".to_owned()];
    let score = event_match_score(&c, &descriptors);
    assert!((score - 1.0 / 3.0).abs() < 1e-9);
  }

  #[test]
  fn breakdown_total_reconstructs_within_tolerance() {
    let detected = Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap();
    let scored = score_candidate(
      candidate("Apple AAPL surges on earnings", 0),
      "reuters.com",
      &["aapl".to_owned(), "apple".to_owned()],
      detected,
      &ReputationTable::default(),
      &ScoreConfig::default(),
    );

    assert!(scored.breakdown.is_consistent());
    assert_eq!(scored.total, scored.breakdown.score_breakdown.total);
    assert!((0.0..=1.0).contains(&scored.total));
  }
}
