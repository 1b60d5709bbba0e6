//! Pipeline orchestration: fetch → gate → canonicalize → score → rank →
//! commit, plus the rerun path used when a report is resolved.

use std::sync::Arc;

use chrono::Duration;
use pulse_core::{
  Error, Result,
  catalog::Catalog,
  clock::IdMinter,
  event::{ConfidenceBreakdown, EventReason, PriceEvent},
  store::Store,
};
use url::Url;
use uuid::Uuid;

use crate::{
  adapter::{
    AdapterReport, Candidate, FetchConfig, SourceAdapter, TimeRange,
    collect_candidates,
  },
  canonical::canonicalize_and_merge,
  gate::apply_quality_gate,
  rank::rank_top,
  ratelimit::RateLimiter,
  score::{
    ReputationTable, ScoreConfig, ScoredCandidate, explanation_text,
    score_candidate,
  },
};

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// How far before the detection instant to query for candidates.
  pub lookback: Duration,
  /// Trailing slack after detection; doubles as the `published_at`
  /// tolerance the API invariant allows.
  pub trailing: Duration,
  pub fetch:    FetchConfig,
  pub score:    ScoreConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      lookback: Duration::hours(24),
      trailing: Duration::minutes(30),
      fetch:    FetchConfig::default(),
      score:    ScoreConfig::default(),
    }
  }
}

/// Result of attaching reasons to one event.
pub struct AttachOutcome {
  pub event:    PriceEvent,
  pub reasons:  Vec<EventReason>,
  pub reports:  Vec<AdapterReport>,
  /// At least one adapter failed; downstream briefs surface this as
  /// `partial_aggregation`.
  pub degraded: bool,
}

/// Result of a rerun triggered by a resolved report; feeds the
/// [`pulse_core::store::RevisionInput`].
pub struct RerunOutcome {
  pub confidence_before: f64,
  pub confidence_after:  f64,
  pub breakdown:         Option<ConfidenceBreakdown>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The reason engine. Cheap to clone; all fields are shared.
pub struct ReasonEngine<S> {
  store:      Arc<S>,
  catalog:    Arc<Catalog>,
  adapters:   Vec<Arc<dyn SourceAdapter>>,
  limiter:    Arc<RateLimiter>,
  reputation: Arc<ReputationTable>,
  ids:        Arc<dyn IdMinter>,
  config:     EngineConfig,
}

impl<S> Clone for ReasonEngine<S> {
  fn clone(&self) -> Self {
    Self {
      store:      self.store.clone(),
      catalog:    self.catalog.clone(),
      adapters:   self.adapters.clone(),
      limiter:    self.limiter.clone(),
      reputation: self.reputation.clone(),
      ids:        self.ids.clone(),
      config:     self.config.clone(),
    }
  }
}

impl<S: Store> ReasonEngine<S> {
  pub fn new(
    store: Arc<S>,
    catalog: Arc<Catalog>,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    limiter: Arc<RateLimiter>,
    reputation: Arc<ReputationTable>,
    ids: Arc<dyn IdMinter>,
    config: EngineConfig,
  ) -> Self {
    Self { store, catalog, adapters, limiter, reputation, ids, config }
  }

  /// Fetch, score, and commit reasons together with `event` in one atomic
  /// write. An event whose candidates all fail the gate persists with zero
  /// reasons (`collecting_evidence`); adapter failures only degrade the
  /// result, they never fail the event.
  pub async fn attach_and_commit(
    &self,
    event: PriceEvent,
  ) -> Result<AttachOutcome> {
    let range = TimeRange {
      start: event.detected_at_utc - self.config.lookback,
      end:   event.detected_at_utc + self.config.trailing,
    };

    let fetched = collect_candidates(
      &self.adapters,
      self.limiter.clone(),
      self.config.fetch.clone(),
      &event.symbol,
      event.market,
      range,
    )
    .await;
    let degraded = fetched.degraded();

    let scored = self.score_pipeline(&event, fetched.candidates);
    let reasons = self.build_reasons(&event, scored);

    tracing::info!(
      event_id = %event.event_id,
      symbol = %event.symbol,
      reasons = reasons.len(),
      degraded,
      audit = %serde_json::to_string(&fetched.reports).unwrap_or_default(),
      "committing event with reasons"
    );

    let event = self
      .store
      .insert_event_with_reasons(event, reasons.clone())
      .await?;
    Ok(AttachOutcome {
      event,
      reasons,
      reports: fetched.reports,
      degraded,
    })
  }

  /// Steps 3–5 of the pipeline over an already-fetched candidate set.
  fn score_pipeline(
    &self,
    event: &PriceEvent,
    candidates: Vec<Candidate>,
  ) -> Vec<ScoredCandidate> {
    let gated = apply_quality_gate(candidates);
    for exclusion in &gated.excluded {
      tracing::debug!(
        event_id = %event.event_id,
        source_url = %exclusion.source_url,
        cause = ?exclusion.cause,
        "candidate failed quality gate"
      );
    }

    let tolerance_limit = event.detected_at_utc + self.config.trailing;
    let merged: Vec<Candidate> = canonicalize_and_merge(gated.accepted)
      .into_iter()
      .filter(|c| c.published_at.is_some_and(|at| at <= tolerance_limit))
      .collect();

    let descriptors = self.descriptors(event);
    let scored = merged
      .into_iter()
      .map(|candidate| {
        let host = host_of(&candidate.source_url);
        score_candidate(
          candidate,
          &host,
          &descriptors,
          event.detected_at_utc,
          &self.reputation,
          &self.config.score,
        )
      })
      .collect();
    rank_top(scored)
  }

  /// Terms a relevant candidate is expected to mention.
  fn descriptors(&self, event: &PriceEvent) -> Vec<String> {
    let mut descriptors = vec![event.symbol.to_lowercase()];
    if let Some(record) = self.catalog.resolve(event.market, &event.symbol) {
      descriptors.extend(
        record
          .name
          .split_whitespace()
          .filter(|w| w.len() > 2)
          .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
          })
          .filter(|w| !w.is_empty()),
      );
    }
    descriptors.dedup();
    descriptors
  }

  fn build_reasons(
    &self,
    event: &PriceEvent,
    scored: Vec<ScoredCandidate>,
  ) -> Vec<EventReason> {
    scored
      .into_iter()
      .enumerate()
      .map(|(index, s)| {
        let host = host_of(&s.candidate.source_url);
        EventReason {
          reason_id:        self.ids.mint(),
          event_id:         event.event_id,
          rank:             (index + 1) as u8,
          reason_type:      s.candidate.reason_type,
          confidence_score: s.total,
          summary:          s.candidate.summary,
          source_url:       s.candidate.source_url,
          published_at:     s
            .candidate
            .published_at
            .unwrap_or(event.detected_at_utc),
          explanation_text: explanation_text(&s.breakdown, &host),
          breakdown:        Some(s.breakdown),
        }
      })
      .collect()
  }

  /// Rerun scoring for one reason after its report was resolved. Fetches a
  /// refreshed candidate set, re-scores, and updates the stored row. Falls
  /// back to re-scoring the stored fields when the source no longer appears
  /// upstream.
  pub async fn rerun_for_reason(
    &self,
    event_id: Uuid,
    reason_id: Uuid,
  ) -> Result<RerunOutcome> {
    let event = self
      .store
      .get_event(event_id)
      .await?
      .ok_or(Error::EventNotFound(event_id))?;
    let reasons = self.store.list_reasons(event_id).await?;
    let target = reasons
      .iter()
      .find(|r| r.reason_id == reason_id)
      .ok_or(Error::ReasonNotFound(reason_id))?;

    let range = TimeRange {
      start: event.detected_at_utc - self.config.lookback,
      end:   event.detected_at_utc + self.config.trailing,
    };
    let fetched = collect_candidates(
      &self.adapters,
      self.limiter.clone(),
      self.config.fetch.clone(),
      &event.symbol,
      event.market,
      range,
    )
    .await;

    let rescored = self.score_pipeline(&event, fetched.candidates);
    let refreshed = rescored
      .into_iter()
      .find(|s| s.candidate.source_url == target.source_url)
      .unwrap_or_else(|| {
        // Source vanished upstream; re-score what we already hold.
        let stored = Candidate {
          reason_type:  target.reason_type,
          title:        None,
          summary:      target.summary.clone(),
          source_url:   target.source_url.clone(),
          published_at: Some(target.published_at),
          source:       "stored".into(),
        };
        let host = host_of(&stored.source_url);
        score_candidate(
          stored,
          &host,
          &self.descriptors(&event),
          event.detected_at_utc,
          &self.reputation,
          &self.config.score,
        )
      });

    let host = host_of(&refreshed.candidate.source_url);
    let confidence_before = target.confidence_score;
    let updated = EventReason {
      reason_id:        target.reason_id,
      event_id:         target.event_id,
      rank:             target.rank,
      reason_type:      refreshed.candidate.reason_type,
      confidence_score: refreshed.total,
      summary:          refreshed.candidate.summary,
      source_url:       refreshed.candidate.source_url,
      published_at:     refreshed
        .candidate
        .published_at
        .unwrap_or(target.published_at),
      explanation_text: explanation_text(&refreshed.breakdown, &host),
      breakdown:        Some(refreshed.breakdown.clone()),
    };
    self.store.update_reason(updated).await?;

    Ok(RerunOutcome {
      confidence_before,
      confidence_after: refreshed.total,
      breakdown: Some(refreshed.breakdown),
    })
  }
}

fn host_of(source_url: &str) -> String {
  Url::parse(source_url)
    .ok()
    .and_then(|u| u.host_str().map(str::to_owned))
    .unwrap_or_default()
}
