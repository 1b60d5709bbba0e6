//! Percent-change detection over rolling tick windows.
//!
//! For each `(symbol, window)` the detector keeps the ticks inside the
//! window; the reference price is the earliest in-window tick. A move is
//! emitted per watching user when `|change_pct|` crosses that user's
//! effective threshold, subject to per-`(user, symbol, window)` debounce
//! with a delta re-alert bypass.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pulse_core::{
  clock::IdMinter,
  event::{PriceEvent, round4},
  market::{Market, classify_session},
  notification::DeltaNote,
};
use uuid::Uuid;

// ─── Config ──────────────────────────────────────────────────────────────────

/// One detection window and its defaults.
#[derive(Debug, Clone)]
pub struct WindowRule {
  pub minutes:               u32,
  /// Used when the user has no threshold row for this window.
  pub default_threshold_pct: f64,
  /// Suppression period after an emit for the same key.
  pub debounce:              Duration,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
  pub windows:              Vec<WindowRule>,
  /// A change this far (in percentage points) from the last-emitted one
  /// bypasses the debounce.
  pub delta_pct_for_realert: f64,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      windows:              vec![
        WindowRule {
          minutes:               5,
          default_threshold_pct: 3.0,
          debounce:              Duration::minutes(5),
        },
        WindowRule {
          minutes:               1440,
          default_threshold_pct: 5.0,
          debounce:              Duration::minutes(1440),
        },
      ],
      delta_pct_for_realert: 1.0,
    }
  }
}

// ─── Input / output ──────────────────────────────────────────────────────────

/// One observed trade or quote.
#[derive(Debug, Clone)]
pub struct TickSample {
  pub market: Market,
  pub symbol: String,
  pub at_utc: DateTime<Utc>,
  pub price:  f64,
}

/// A user whose watchlist covers the tick's symbol.
#[derive(Debug, Clone, Copy)]
pub struct Subscriber {
  pub user_id:       Uuid,
  /// Per-user threshold for the window under evaluation; `None` falls back
  /// to the window's system default.
  pub threshold_pct: Option<f64>,
}

/// An emitted event, flagged when it bypassed an active debounce.
#[derive(Debug, Clone)]
pub struct Detection {
  pub event:   PriceEvent,
  pub realert: Option<DeltaNote>,
}

// ─── Detector ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct DebounceEntry {
  last_emitted_at: DateTime<Utc>,
  last_change_pct: f64,
}

type SymbolKey = (Market, String, u32);
type UserKey = (Uuid, Market, String, u32);

/// Single-owner detection state. One instance is driven by the tick intake
/// task; it is not shared.
pub struct Detector {
  config:    DetectorConfig,
  ids:       Arc<dyn IdMinter>,
  ticks:     HashMap<SymbolKey, VecDeque<(DateTime<Utc>, f64)>>,
  debounce:  HashMap<UserKey, DebounceEntry>,
  sequences: HashMap<UserKey, u64>,
}

impl Detector {
  pub fn new(config: DetectorConfig, ids: Arc<dyn IdMinter>) -> Self {
    Self {
      config,
      ids,
      ticks: HashMap::new(),
      debounce: HashMap::new(),
      sequences: HashMap::new(),
    }
  }

  /// Feed one tick. `subscribers` lists the users watching this symbol
  /// (with their per-window thresholds resolved by the caller per window
  /// via [`Subscriber::threshold_pct`] = the row for that window, if any).
  ///
  /// Returns at most one detection per user: simultaneous candidates from
  /// different windows collapse to the larger `|change_pct|`.
  pub fn observe(
    &mut self,
    tick: &TickSample,
    subscribers: &dyn Fn(u32) -> Vec<Subscriber>,
  ) -> Vec<Detection> {
    if !tick.price.is_finite() || tick.price <= 0.0 {
      tracing::warn!(
        symbol = %tick.symbol,
        price = tick.price,
        "dropping tick with unusable price"
      );
      return Vec::new();
    }
    let symbol = tick.symbol.trim().to_ascii_uppercase();
    let session_label = classify_session(tick.market, tick.at_utc);

    let mut candidates: Vec<Detection> = Vec::new();
    let windows = self.config.windows.clone();
    for rule in &windows {
      let Some(change_pct) = self.window_change(tick, &symbol, rule) else {
        continue;
      };

      for subscriber in subscribers(rule.minutes) {
        let effective = subscriber
          .threshold_pct
          .unwrap_or(rule.default_threshold_pct);
        if change_pct.abs() < effective {
          continue;
        }

        let key =
          (subscriber.user_id, tick.market, symbol.clone(), rule.minutes);
        let realert = match self.debounce.get(&key) {
          Some(entry)
            if tick.at_utc - entry.last_emitted_at < rule.debounce =>
          {
            let delta = (change_pct - entry.last_change_pct).abs();
            if delta < self.config.delta_pct_for_realert {
              continue;
            }
            Some(DeltaNote {
              previous_change_pct: entry.last_change_pct,
              current_change_pct:  change_pct,
            })
          }
          _ => None,
        };

        self.debounce.insert(key.clone(), DebounceEntry {
          last_emitted_at: tick.at_utc,
          last_change_pct: change_pct,
        });
        let sequence = self.sequences.entry(key).or_insert(0);
        *sequence += 1;

        candidates.push(Detection {
          event: PriceEvent {
            event_id: self.ids.mint(),
            market: tick.market,
            symbol: symbol.clone(),
            change_pct,
            window_minutes: rule.minutes,
            detected_at_utc: tick.at_utc,
            exchange_timezone: tick.market.timezone().name().to_owned(),
            session_label,
            sequence: *sequence,
            user_id: subscriber.user_id,
          },
          realert,
        });
      }
    }

    collapse_simultaneous(candidates)
  }

  /// Maintain the rolling window and compute the change, if computable.
  fn window_change(
    &mut self,
    tick: &TickSample,
    symbol: &str,
    rule: &WindowRule,
  ) -> Option<f64> {
    let key = (tick.market, symbol.to_owned(), rule.minutes);
    let window = self.ticks.entry(key).or_default();
    window.push_back((tick.at_utc, tick.price));

    let horizon = tick.at_utc - Duration::minutes(rule.minutes as i64);
    while window.front().is_some_and(|(at, _)| *at < horizon) {
      window.pop_front();
    }

    if window.len() < 2 {
      return None;
    }
    let (_, reference) = *window.front()?;
    if reference <= 0.0 {
      tracing::warn!(
        symbol,
        reference,
        "dropping symbol for this cycle: non-positive reference price"
      );
      return None;
    }

    let change_pct = (tick.price - reference) / reference * 100.0;
    if !change_pct.is_finite() {
      return None;
    }
    Some(round4(change_pct))
  }

  /// The configured window sizes, for callers resolving per-window
  /// subscriber thresholds.
  pub fn window_minutes(&self) -> Vec<u32> {
    self.config.windows.iter().map(|w| w.minutes).collect()
  }

  /// Drop debounce/sequence entries idle longer than the largest debounce.
  /// Called periodically by the owning task.
  pub fn evict_stale(&mut self, now: DateTime<Utc>) {
    let retention = self
      .config
      .windows
      .iter()
      .map(|w| w.debounce)
      .max()
      .unwrap_or_else(|| Duration::minutes(1440))
      * 2;
    self
      .debounce
      .retain(|_, entry| now - entry.last_emitted_at < retention);
  }
}

/// Same `(user, symbol)` at the same instant: prefer the larger
/// `|change_pct|`; `detected_at_utc` is already equal so the remaining
/// tie-break never fires on a single tick.
fn collapse_simultaneous(candidates: Vec<Detection>) -> Vec<Detection> {
  let mut best: HashMap<(Uuid, String), Detection> = HashMap::new();
  for candidate in candidates {
    let key = (
      candidate.event.user_id,
      candidate.event.symbol.clone(),
    );
    match best.get(&key) {
      Some(current)
        if current.event.change_pct.abs()
          >= candidate.event.change_pct.abs() => {}
      _ => {
        best.insert(key, candidate);
      }
    }
  }
  let mut detections: Vec<Detection> = best.into_values().collect();
  detections.sort_by(|a, b| {
    a.event
      .user_id
      .cmp(&b.event.user_id)
      .then_with(|| a.event.symbol.cmp(&b.event.symbol))
  });
  detections
}
