//! Watchlist items and per-window alert thresholds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, market::Market};

/// Thresholds above this are rejected as input errors.
pub const MAX_THRESHOLD_PCT: f64 = 50.0;

/// One tracked symbol. `(user, market, ticker)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
  pub item_id:        Uuid,
  pub user_id:        Uuid,
  pub market:         Market,
  pub ticker:         String,
  pub created_at_utc: DateTime<Utc>,
}

/// Input to [`crate::store::Store::add_watchlist_item`].
#[derive(Debug, Clone)]
pub struct NewWatchlistItem {
  pub user_id: Uuid,
  pub market:  Market,
  pub ticker:  String,
}

/// A per-user alert threshold for one detection window. One row per
/// `(user, window_minutes)`; writes are upserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threshold {
  pub user_id:        Uuid,
  pub window_minutes: u32,
  /// Interpreted as `|±pct|`.
  pub threshold_pct:  f64,
}

/// Validate a threshold percentage: non-negative, finite, bounded.
pub fn normalize_threshold_pct(threshold_pct: f64) -> Result<f64> {
  if !threshold_pct.is_finite() || threshold_pct < 0.0 {
    return Err(Error::invalid_input(
      "threshold_pct must be a non-negative number",
    ));
  }
  if threshold_pct > MAX_THRESHOLD_PCT {
    return Err(Error::invalid_input(format!(
      "threshold_pct must be at most {MAX_THRESHOLD_PCT}"
    )));
  }
  Ok((threshold_pct * 10_000.0).round() / 10_000.0)
}
