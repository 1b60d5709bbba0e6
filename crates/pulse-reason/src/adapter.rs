//! The `SourceAdapter` seam and the fetch fan-out.
//!
//! The engine needs exactly one capability from the outside world: fetch
//! candidate explanations for a symbol within a time range. Each adapter
//! implements that single method; tests inject deterministic fixtures.
//!
//! Failures are isolated per adapter — one source timing out never poisons
//! the others' contributions. Every fetch is bounded by a per-adapter
//! timeout and a small retry budget with capped exponential backoff.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use futures::{StreamExt as _, future::BoxFuture};
use pulse_core::{event::ReasonType, market::Market};
use thiserror::Error;

use crate::ratelimit::RateLimiter;

// ─── Candidates ──────────────────────────────────────────────────────────────

/// A raw candidate explanation as returned by an adapter, before gating.
#[derive(Debug, Clone)]
pub struct Candidate {
  pub reason_type:  ReasonType,
  pub title:        Option<String>,
  pub summary:      String,
  /// As provided by the source; canonicalized later in the pipeline.
  pub source_url:   String,
  pub published_at: Option<DateTime<Utc>>,
  /// Name of the adapter that produced this candidate.
  pub source:       String,
}

/// UTC publication window queried from each adapter.
#[derive(Debug, Clone, Copy)]
pub struct TimeRange {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AdapterError {
  #[error("timed out after {0:?}")]
  Timeout(Duration),

  #[error("rate limited: {0}")]
  RateLimited(String),

  /// Upstream 5xx or transport failure.
  #[error("upstream unavailable: {0}")]
  Upstream(String),

  /// Unparseable payload; retrying will not help.
  #[error("invalid response: {0}")]
  InvalidResponse(String),
}

impl AdapterError {
  pub fn retryable(&self) -> bool {
    matches!(
      self,
      AdapterError::Timeout(_)
        | AdapterError::RateLimited(_)
        | AdapterError::Upstream(_)
    )
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A source of candidate explanations. The future is boxed so adapters can
/// be held as trait objects in the engine's adapter list.
pub trait SourceAdapter: Send + Sync {
  /// Stable adapter id, used for rate limiting and audit records.
  fn name(&self) -> &str;

  fn fetch<'a>(
    &'a self,
    symbol: &'a str,
    market: Market,
    range: TimeRange,
  ) -> BoxFuture<'a, Result<Vec<Candidate>, AdapterError>>;
}

// ─── Fixture adapter ─────────────────────────────────────────────────────────

/// Deterministic adapter for tests: canned candidates per symbol, or a
/// scripted failure.
pub struct FixtureAdapter {
  name:       String,
  by_symbol:  std::collections::HashMap<String, Vec<Candidate>>,
  fail_with:  Option<fn() -> AdapterError>,
}

impl FixtureAdapter {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name:      name.into(),
      by_symbol: Default::default(),
      fail_with: None,
    }
  }

  pub fn with_candidates(
    mut self,
    symbol: &str,
    candidates: Vec<Candidate>,
  ) -> Self {
    self
      .by_symbol
      .insert(symbol.to_ascii_uppercase(), candidates);
    self
  }

  pub fn failing_with(mut self, make: fn() -> AdapterError) -> Self {
    self.fail_with = Some(make);
    self
  }
}

impl SourceAdapter for FixtureAdapter {
  fn name(&self) -> &str { &self.name }

  fn fetch<'a>(
    &'a self,
    symbol: &'a str,
    _market: Market,
    _range: TimeRange,
  ) -> BoxFuture<'a, Result<Vec<Candidate>, AdapterError>> {
    Box::pin(async move {
      if let Some(make) = self.fail_with {
        return Err(make());
      }
      Ok(
        self
          .by_symbol
          .get(&symbol.to_ascii_uppercase())
          .cloned()
          .unwrap_or_default(),
      )
    })
  }
}

// ─── Fan-out ─────────────────────────────────────────────────────────────────

/// Fetch policy for the fan-out.
#[derive(Debug, Clone)]
pub struct FetchConfig {
  /// Adapters queried concurrently at most this many at a time.
  pub concurrency:  usize,
  /// Per-attempt deadline for one adapter call.
  pub timeout:      Duration,
  /// Total attempts per adapter (first try + retries).
  pub max_attempts: u32,
  pub backoff_base: Duration,
  pub backoff_cap:  Duration,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      concurrency:  4,
      timeout:      Duration::from_secs(3),
      max_attempts: 3,
      backoff_base: Duration::from_millis(200),
      backoff_cap:  Duration::from_secs(2),
    }
  }
}

/// Per-adapter audit entry recorded with every event commit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AdapterReport {
  pub adapter:     String,
  pub duration_ms: u128,
  pub attempts:    u32,
  pub candidates:  usize,
  pub error:       Option<String>,
  pub retryable:   Option<bool>,
}

/// Everything the fan-out produced.
#[derive(Debug, Default)]
pub struct FetchOutcome {
  pub candidates: Vec<Candidate>,
  pub reports:    Vec<AdapterReport>,
}

impl FetchOutcome {
  /// True when at least one adapter failed; briefs report this as
  /// `partial_aggregation`.
  pub fn degraded(&self) -> bool {
    self.reports.iter().any(|r| r.error.is_some())
  }
}

/// Query every adapter with bounded concurrency, isolating failures.
pub async fn collect_candidates(
  adapters: &[Arc<dyn SourceAdapter>],
  limiter: Arc<RateLimiter>,
  config: FetchConfig,
  symbol: &str,
  market: Market,
  range: TimeRange,
) -> FetchOutcome {
  let results: Vec<(Vec<Candidate>, AdapterReport)> =
    futures::stream::iter(adapters.iter().cloned())
      .map(|adapter| {
        fetch_one(
          adapter,
          limiter.clone(),
          config.clone(),
          symbol.to_owned(),
          market,
          range,
        )
      })
      .buffer_unordered(config.concurrency.max(1))
      .collect()
      .await;

  let mut outcome = FetchOutcome::default();
  for (candidates, report) in results {
    outcome.candidates.extend(candidates);
    outcome.reports.push(report);
  }
  // Stable audit ordering regardless of completion order.
  outcome.reports.sort_by(|a, b| a.adapter.cmp(&b.adapter));
  outcome
}

async fn fetch_one(
  adapter: Arc<dyn SourceAdapter>,
  limiter: Arc<RateLimiter>,
  config: FetchConfig,
  symbol: String,
  market: Market,
  range: TimeRange,
) -> (Vec<Candidate>, AdapterReport) {
  let started = std::time::Instant::now();
  let name = adapter.name().to_owned();

  let mut attempts = 0;
  let mut last_error: Option<AdapterError> = None;
  while attempts < config.max_attempts.max(1) {
    attempts += 1;
    limiter.acquire(&name).await;

    let call = adapter.fetch(&symbol, market, range);
    let result = match tokio::time::timeout(config.timeout, call).await {
      Ok(inner) => inner,
      Err(_) => Err(AdapterError::Timeout(config.timeout)),
    };

    match result {
      Ok(candidates) => {
        let report = AdapterReport {
          adapter:     name,
          duration_ms: started.elapsed().as_millis(),
          attempts,
          candidates:  candidates.len(),
          error:       None,
          retryable:   None,
        };
        return (candidates, report);
      }
      Err(err) => {
        let give_up =
          !err.retryable() || attempts >= config.max_attempts.max(1);
        if give_up {
          last_error = Some(err);
          break;
        }
        let backoff = config
          .backoff_base
          .saturating_mul(2u32.saturating_pow(attempts - 1))
          .min(config.backoff_cap);
        tracing::debug!(
          adapter = %name,
          attempt = attempts,
          backoff_ms = backoff.as_millis() as u64,
          error = %err,
          "retrying adapter fetch"
        );
        tokio::time::sleep(backoff).await;
        last_error = Some(err);
      }
    }
  }

  let error = last_error.map(|e| (e.to_string(), e.retryable()));
  tracing::warn!(
    adapter = %name,
    error = error.as_ref().map(|(m, _)| m.as_str()).unwrap_or("unknown"),
    "adapter fetch failed"
  );
  (
    Vec::new(),
    AdapterReport {
      adapter:     name,
      duration_ms: started.elapsed().as_millis(),
      attempts,
      candidates:  0,
      error:       error.as_ref().map(|(m, _)| m.clone()),
      retryable:   error.map(|(_, r)| r),
    },
  )
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::ratelimit::RateLimiter;

  fn range() -> TimeRange {
    let end = Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap();
    TimeRange { start: end - chrono::Duration::hours(24), end }
  }

  fn candidate(url: &str) -> Candidate {
    Candidate {
      reason_type:  ReasonType::News,
      title:        None,
      summary:      "something moved".into(),
      source_url:   url.into(),
      published_at: Some(Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap()),
      source:       "fixture".into(),
    }
  }

  #[tokio::test]
  async fn one_failing_adapter_does_not_poison_the_rest() {
    let good: Arc<dyn SourceAdapter> = Arc::new(
      FixtureAdapter::new("news")
        .with_candidates("AAPL", vec![candidate("https://news.example/a")]),
    );
    let bad: Arc<dyn SourceAdapter> = Arc::new(
      FixtureAdapter::new("filings").failing_with(|| {
        AdapterError::InvalidResponse("not json".into())
      }),
    );

    let limiter = Arc::new(RateLimiter::unlimited());
    let outcome = collect_candidates(
      &[good, bad],
      limiter,
      FetchConfig::default(),
      "AAPL",
      Market::Us,
      range(),
    )
    .await;

    assert_eq!(outcome.candidates.len(), 1);
    assert!(outcome.degraded());
    assert_eq!(outcome.reports.len(), 2);
    let failed = outcome
      .reports
      .iter()
      .find(|r| r.adapter == "filings")
      .unwrap();
    assert!(failed.error.is_some());
    assert_eq!(failed.retryable, Some(false));
  }

  #[tokio::test]
  async fn non_retryable_errors_do_not_burn_the_retry_budget() {
    let bad: Arc<dyn SourceAdapter> = Arc::new(
      FixtureAdapter::new("filings").failing_with(|| {
        AdapterError::InvalidResponse("not json".into())
      }),
    );
    let limiter = Arc::new(RateLimiter::unlimited());
    let outcome = collect_candidates(
      &[bad],
      limiter,
      FetchConfig::default(),
      "AAPL",
      Market::Us,
      range(),
    )
    .await;
    assert_eq!(outcome.reports[0].attempts, 1);
  }

  #[tokio::test]
  async fn retryable_errors_are_retried_up_to_the_budget() {
    let flaky: Arc<dyn SourceAdapter> = Arc::new(
      FixtureAdapter::new("news")
        .failing_with(|| AdapterError::Upstream("503".into())),
    );
    let limiter = Arc::new(RateLimiter::unlimited());
    let config = FetchConfig {
      max_attempts: 2,
      backoff_base: Duration::from_millis(1),
      ..FetchConfig::default()
    };
    let outcome = collect_candidates(
      &[flaky],
      limiter,
      config,
      "AAPL",
      Market::Us,
      range(),
    )
    .await;
    assert_eq!(outcome.reports[0].attempts, 2);
    assert_eq!(outcome.reports[0].retryable, Some(true));
  }
}
