//! Price events and their attached reasons.
//!
//! A `PriceEvent` is immutable after creation. Its reasons are written in the
//! same commit; the only later mutation is a confidence revision applied when
//! a user report is resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::market::{Market, SessionLabel};

/// An event keeps at most this many ranked reasons.
pub const MAX_REASONS: usize = 3;

// ─── PriceEvent ──────────────────────────────────────────────────────────────

/// A detected significant price move over a configured window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceEvent {
  pub event_id:          Uuid,
  pub market:            Market,
  pub symbol:            String,
  /// Signed percent change over the window, rounded to 4 decimals.
  pub change_pct:        f64,
  pub window_minutes:    u32,
  pub detected_at_utc:   DateTime<Utc>,
  /// IANA zone name of the exchange, denormalised for display.
  pub exchange_timezone: String,
  pub session_label:     SessionLabel,
  /// Monotonic per-(user, symbol, window) sequence assigned by the detector.
  pub sequence:          u64,
  /// The watcher this event was detected for.
  pub user_id:           Uuid,
}

// ─── Reasons ─────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReasonType {
  Filing,
  News,
  Other,
}

/// The three scoring signals, each in `[0, 1]`. Also reused for the weight
/// vector, which shares the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
  pub source_reliability: f64,
  pub event_match:        f64,
  pub time_proximity:     f64,
}

impl SignalSet {
  pub fn weighted_total(weights: &SignalSet, signals: &SignalSet) -> f64 {
    weights.source_reliability * signals.source_reliability
      + weights.event_match * signals.event_match
      + weights.time_proximity * signals.time_proximity
  }
}

/// Per-signal weight·signal products plus their sum, all rounded to two
/// decimals for publication.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
  pub source_reliability: f64,
  pub event_match:        f64,
  pub time_proximity:     f64,
  pub total:              f64,
}

/// The full, reconstructible explanation of a confidence score.
///
/// Invariant: `score_breakdown.total` equals `Σ weights·signals` within
/// ±0.01 after rounding. [`ConfidenceBreakdown::is_consistent`] checks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
  pub weights:         SignalSet,
  pub signals:         SignalSet,
  pub score_breakdown: ScoreBreakdown,
}

impl ConfidenceBreakdown {
  pub fn is_consistent(&self) -> bool {
    let expected = SignalSet::weighted_total(&self.weights, &self.signals);
    (self.score_breakdown.total - expected).abs() <= 0.01
  }
}

/// A candidate explanation attached to an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventReason {
  pub reason_id:        Uuid,
  pub event_id:         Uuid,
  /// 1..=3, unique within the event.
  pub rank:             u8,
  pub reason_type:      ReasonType,
  /// Current confidence in `[0, 1]`; mutated only by revisions.
  pub confidence_score: f64,
  pub summary:          String,
  /// Canonical http/https URL, unique within the event.
  pub source_url:       String,
  pub published_at:     DateTime<Utc>,
  #[serde(rename = "confidence_breakdown")]
  pub breakdown:        Option<ConfidenceBreakdown>,
  /// One-line human rendering of the breakdown.
  pub explanation_text: String,
}

// ─── Derived status ──────────────────────────────────────────────────────────

/// Whether an event has at least one gated reason.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReasonStatus {
  CollectingEvidence,
  Verified,
}

/// Derive the reason status from an event's reason list.
pub fn reason_status(reasons: &[EventReason]) -> ReasonStatus {
  if reasons.iter().any(|r| !r.source_url.is_empty()) {
    ReasonStatus::Verified
  } else {
    ReasonStatus::CollectingEvidence
  }
}

/// Round to two decimals for published breakdown values.
pub fn round2(value: f64) -> f64 { (value * 100.0).round() / 100.0 }

/// Round to four decimals for internal percentages and scores.
pub fn round4(value: f64) -> f64 { (value * 10_000.0).round() / 10_000.0 }

#[cfg(test)]
mod tests {
  use super::*;

  fn breakdown(total: f64) -> ConfidenceBreakdown {
    let weights = SignalSet {
      source_reliability: 0.4,
      event_match:        0.3,
      time_proximity:     0.3,
    };
    let signals = SignalSet {
      source_reliability: 0.9,
      event_match:        0.5,
      time_proximity:     1.0,
    };
    ConfidenceBreakdown {
      weights,
      signals,
      score_breakdown: ScoreBreakdown {
        source_reliability: 0.36,
        event_match:        0.15,
        time_proximity:     0.30,
        total,
      },
    }
  }

  #[test]
  fn breakdown_consistency_tolerance() {
    // Exact: 0.4·0.9 + 0.3·0.5 + 0.3·1.0 = 0.81.
    assert!(breakdown(0.81).is_consistent());
    assert!(breakdown(0.80).is_consistent());
    assert!(!breakdown(0.75).is_consistent());
  }

  #[test]
  fn status_without_reasons_is_collecting() {
    assert_eq!(reason_status(&[]), ReasonStatus::CollectingEvidence);
  }

  #[test]
  fn rounding_helpers() {
    assert_eq!(round2(0.815), 0.82);
    assert_eq!(round4(4.20001), 4.2);
  }
}
