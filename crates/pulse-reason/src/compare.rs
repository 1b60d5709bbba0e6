//! Evidence-compare axis classification.
//!
//! Partitions an event's reasons into positive / negative / uncertain axes
//! by a polarity-term heuristic combined with the event's direction, and
//! assembles the bias-aware comparison payload. The card is comparative,
//! never directive — `bias_warning` is always present.

use chrono::{DateTime, Utc};
use pulse_core::event::{EventReason, PriceEvent, ReasonType};
use serde::Serialize;
use uuid::Uuid;

// ─── Term lists ──────────────────────────────────────────────────────────────

/// Bullish polarity terms, English and Korean.
const POSITIVE_TERMS: &[&str] = &[
  "beat",
  "upgrade",
  "guidance raised",
  "record",
  "surge",
  "strong demand",
  "호재",
  "실적 개선",
  "상향",
  "수주",
  "증가",
  "강세",
];

/// Bearish polarity terms, English and Korean.
const NEGATIVE_TERMS: &[&str] = &[
  "miss",
  "downgrade",
  "guidance cut",
  "investigation",
  "lawsuit",
  "recall",
  "plunge",
  "악재",
  "실적 부진",
  "하향",
  "감소",
  "약세",
  "리스크",
];

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareStatus {
  Ready,
  CompareUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareFallback {
  InsufficientEvidence,
  AxisImbalance,
  AmbiguousClassification,
  MissingSourceMetadata,
  /// Produced by the HTTP layer when the caller does not own the event;
  /// never emitted by the classifier itself.
  PermissionDenied,
}

/// Why an item landed on its axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Classification {
  KeywordAligned,
  KeywordOpposed,
  AmbiguousKeywords,
  NoPolaritySignal,
  MissingSourceMetadata,
}

/// One axis entry. Malformed reasons keep their empty fields so clients can
/// render fallback labels.
#[derive(Debug, Clone, Serialize)]
pub struct CompareItem {
  pub reason_id:      Uuid,
  pub reason_type:    ReasonType,
  pub summary:        String,
  pub source_url:     Option<String>,
  pub published_at:   Option<DateTime<Utc>>,
  classification:     Classification,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub matched_terms:  Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparePayload {
  pub event_id:        Uuid,
  pub status:          CompareStatus,
  pub fallback_reason: Option<CompareFallback>,
  pub bias_warning:    String,
  pub positive:        Vec<CompareItem>,
  pub negative:        Vec<CompareItem>,
  pub uncertain:       Vec<CompareItem>,
  pub generated_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CompareConfig {
  /// `ready` requires at least this many axis items in total.
  pub min_compare_items: usize,
  /// With four or more classified items, a larger/smaller axis ratio at or
  /// above this is reported as imbalance.
  pub imbalance_ratio:   f64,
}

impl Default for CompareConfig {
  fn default() -> Self {
    Self { min_compare_items: 2, imbalance_ratio: 4.0 }
  }
}

// ─── Classifier ──────────────────────────────────────────────────────────────

/// Build the comparison payload for one event.
pub fn build_compare(
  event: &PriceEvent,
  reasons: &[EventReason],
  config: &CompareConfig,
  now: DateTime<Utc>,
) -> ComparePayload {
  let event_is_up = event.change_pct >= 0.0;

  let mut positive = Vec::new();
  let mut negative = Vec::new();
  let mut uncertain = Vec::new();

  for reason in reasons {
    let item = classify(reason, event_is_up);
    match item.classification {
      Classification::KeywordAligned => positive.push(item),
      Classification::KeywordOpposed => negative.push(item),
      _ => uncertain.push(item),
    }
  }
  for axis in [&mut positive, &mut negative, &mut uncertain] {
    sort_axis(axis);
  }

  let fallback =
    resolve_fallback(&positive, &negative, &uncertain, config);
  let status = if fallback.is_none() {
    CompareStatus::Ready
  } else {
    CompareStatus::CompareUnavailable
  };

  if fallback.is_some() {
    // Without both sides represented, present everything as uncertain
    // rather than implying a one-sided conclusion.
    uncertain.extend(positive.drain(..));
    uncertain.extend(negative.drain(..));
    sort_axis(&mut uncertain);
  }

  ComparePayload {
    event_id: event.event_id,
    status,
    fallback_reason: fallback,
    bias_warning: bias_warning(status),
    positive,
    negative,
    uncertain,
    generated_at_utc: now,
  }
}

fn classify(reason: &EventReason, event_is_up: bool) -> CompareItem {
  let source_url =
    (!reason.source_url.trim().is_empty()).then(|| reason.source_url.clone());

  let mut item = CompareItem {
    reason_id:     reason.reason_id,
    reason_type:   reason.reason_type,
    summary:       reason.summary.clone(),
    source_url,
    published_at:  Some(reason.published_at),
    classification: Classification::NoPolaritySignal,
    matched_terms: Vec::new(),
  };

  if item.source_url.is_none() {
    item.classification = Classification::MissingSourceMetadata;
    return item;
  }

  let text = reason.summary.to_lowercase();
  let positive_hits: Vec<&str> = POSITIVE_TERMS
    .iter()
    .copied()
    .filter(|t| text.contains(t))
    .collect();
  let negative_hits: Vec<&str> = NEGATIVE_TERMS
    .iter()
    .copied()
    .filter(|t| text.contains(t))
    .collect();

  item.classification = match (positive_hits.is_empty(), negative_hits.is_empty())
  {
    (false, true) => aligned_or_opposed(true, event_is_up),
    (true, false) => aligned_or_opposed(false, event_is_up),
    (false, false) => Classification::AmbiguousKeywords,
    (true, true) => Classification::NoPolaritySignal,
  };
  item.matched_terms = positive_hits
    .into_iter()
    .chain(negative_hits)
    .take(3)
    .map(str::to_owned)
    .collect();
  item
}

/// The positive axis holds evidence whose implied direction matches the
/// event's sign; opposed evidence lands on the negative axis.
fn aligned_or_opposed(bullish: bool, event_is_up: bool) -> Classification {
  if bullish == event_is_up {
    Classification::KeywordAligned
  } else {
    Classification::KeywordOpposed
  }
}

fn resolve_fallback(
  positive: &[CompareItem],
  negative: &[CompareItem],
  uncertain: &[CompareItem],
  config: &CompareConfig,
) -> Option<CompareFallback> {
  let total = positive.len() + negative.len() + uncertain.len();
  if total < config.min_compare_items {
    return Some(CompareFallback::InsufficientEvidence);
  }
  if positive.is_empty() && negative.is_empty() {
    if uncertain
      .iter()
      .all(|i| i.classification == Classification::MissingSourceMetadata)
    {
      return Some(CompareFallback::MissingSourceMetadata);
    }
    if !uncertain.is_empty()
      && uncertain
        .iter()
        .all(|i| i.classification == Classification::AmbiguousKeywords)
    {
      return Some(CompareFallback::AmbiguousClassification);
    }
    return Some(CompareFallback::AxisImbalance);
  }
  if positive.is_empty() || negative.is_empty() {
    return Some(CompareFallback::AxisImbalance);
  }

  let larger = positive.len().max(negative.len()) as f64;
  let smaller = positive.len().min(negative.len()) as f64;
  if total >= 4 && larger / smaller >= config.imbalance_ratio {
    return Some(CompareFallback::AxisImbalance);
  }
  None
}

fn sort_axis(items: &mut [CompareItem]) {
  items.sort_by(|a, b| {
    b.published_at
      .cmp(&a.published_at)
      .then_with(|| a.source_url.cmp(&b.source_url))
  });
}

/// Payload served to a caller who does not own the event: no evidence is
/// leaked, the card renders its fallback state.
pub fn permission_denied_payload(
  event_id: Uuid,
  now: DateTime<Utc>,
) -> ComparePayload {
  ComparePayload {
    event_id,
    status: CompareStatus::CompareUnavailable,
    fallback_reason: Some(CompareFallback::PermissionDenied),
    bias_warning: bias_warning(CompareStatus::CompareUnavailable),
    positive: Vec::new(),
    negative: Vec::new(),
    uncertain: Vec::new(),
    generated_at_utc: now,
  }
}

fn bias_warning(status: CompareStatus) -> String {
  match status {
    CompareStatus::Ready => {
      "Supporting and opposing evidence both exist. Compare sources and \
       publication times rather than drawing a single conclusion."
        .to_owned()
    }
    CompareStatus::CompareUnavailable => {
      "Conflicting evidence is insufficient, so items are shown as \
       uncertain. No directive conclusion is offered."
        .to_owned()
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use pulse_core::market::{Market, SessionLabel};

  use super::*;

  fn event(change_pct: f64) -> PriceEvent {
    PriceEvent {
      event_id: Uuid::new_v4(),
      market: Market::Us,
      symbol: "AAPL".into(),
      change_pct,
      window_minutes: 5,
      detected_at_utc: Utc.with_ymd_and_hms(2024, 3, 4, 14, 45, 0).unwrap(),
      exchange_timezone: "America/New_York".into(),
      session_label: SessionLabel::Regular,
      sequence: 1,
      user_id: Uuid::new_v4(),
    }
  }

  fn reason(event_id: Uuid, summary: &str, url: &str) -> EventReason {
    EventReason {
      reason_id: Uuid::new_v4(),
      event_id,
      rank: 1,
      reason_type: ReasonType::News,
      confidence_score: 0.7,
      summary: summary.into(),
      source_url: url.into(),
      published_at: Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap(),
      breakdown: None,
      explanation_text: String::new(),
    }
  }

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap()
  }

  #[test]
  fn ready_when_both_axes_are_populated() {
    let ev = event(4.2);
    let reasons = vec![
      reason(ev.event_id, "earnings beat with record revenue", "https://a.example/1"),
      reason(ev.event_id, "analyst downgrade on valuation", "https://b.example/2"),
    ];

    let payload =
      build_compare(&ev, &reasons, &CompareConfig::default(), now());
    assert_eq!(payload.status, CompareStatus::Ready);
    assert!(payload.fallback_reason.is_none());
    assert_eq!(payload.positive.len(), 1);
    assert_eq!(payload.negative.len(), 1);
    assert!(!payload.bias_warning.is_empty());
  }

  #[test]
  fn down_move_flips_axis_assignment() {
    let ev = event(-5.0);
    let reasons = vec![
      reason(ev.event_id, "guidance cut after weak quarter", "https://a.example/1"),
      reason(ev.event_id, "record demand and upgrade", "https://b.example/2"),
    ];

    let payload =
      build_compare(&ev, &reasons, &CompareConfig::default(), now());
    // Bearish evidence aligns with the down move; bullish evidence opposes.
    assert_eq!(payload.positive.len(), 1);
    assert!(payload.positive[0].summary.contains("guidance cut"));
    assert_eq!(payload.negative.len(), 1);
  }

  #[test]
  fn only_uncertain_items_is_axis_imbalance() {
    let ev = event(4.2);
    let reasons = vec![
      reason(ev.event_id, "company schedules annual meeting", "https://a.example/1"),
      reason(ev.event_id, "board publishes routine minutes", "https://b.example/2"),
    ];

    let payload =
      build_compare(&ev, &reasons, &CompareConfig::default(), now());
    assert_eq!(payload.status, CompareStatus::CompareUnavailable);
    assert_eq!(
      payload.fallback_reason,
      Some(CompareFallback::AxisImbalance)
    );
    assert!(payload.positive.is_empty());
    assert!(payload.negative.is_empty());
    assert_eq!(payload.uncertain.len(), 2);
    assert!(!payload.bias_warning.is_empty());
  }

  #[test]
  fn too_few_items_is_insufficient_evidence() {
    let ev = event(4.2);
    let reasons =
      vec![reason(ev.event_id, "earnings beat", "https://a.example/1")];
    let payload =
      build_compare(&ev, &reasons, &CompareConfig::default(), now());
    assert_eq!(
      payload.fallback_reason,
      Some(CompareFallback::InsufficientEvidence)
    );
    // The lone item is still shown, as uncertain.
    assert_eq!(payload.uncertain.len(), 1);
  }

  #[test]
  fn mixed_keywords_everywhere_is_ambiguous() {
    let ev = event(4.2);
    let reasons = vec![
      reason(
        ev.event_id,
        "record quarter but lawsuit looms",
        "https://a.example/1",
      ),
      reason(
        ev.event_id,
        "upgrade despite recall investigation",
        "https://b.example/2",
      ),
    ];
    let payload =
      build_compare(&ev, &reasons, &CompareConfig::default(), now());
    assert_eq!(
      payload.fallback_reason,
      Some(CompareFallback::AmbiguousClassification)
    );
  }

  #[test]
  fn one_sided_classified_items_are_imbalance_and_merged_to_uncertain() {
    let ev = event(4.2);
    let reasons = vec![
      reason(ev.event_id, "earnings beat expectations", "https://a.example/1"),
      reason(ev.event_id, "record revenue surge", "https://b.example/2"),
    ];
    let payload =
      build_compare(&ev, &reasons, &CompareConfig::default(), now());
    assert_eq!(
      payload.fallback_reason,
      Some(CompareFallback::AxisImbalance)
    );
    assert!(payload.positive.is_empty());
    assert_eq!(payload.uncertain.len(), 2);
  }
}
