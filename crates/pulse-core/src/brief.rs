//! Pre-market and post-close briefs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::market::Market;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BriefType {
  PreMarket,
  PostClose,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BriefStatus {
  Unread,
  Read,
}

/// Why a brief carries fewer items than expected, or none at all.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BriefFallback {
  InsufficientData,
  NoEvents,
  MarketHoliday,
  PartialAggregation,
}

/// One line of a brief, referencing the event it summarises.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefContentItem {
  pub event_id:         Uuid,
  pub market:           Market,
  pub symbol:           String,
  pub summary:          String,
  /// Top reason's canonical URL; absent while evidence is still collecting.
  pub source_url:       Option<String>,
  pub event_detail_url: String,
}

/// A scheduled digest of recent events for one user. Expired briefs remain
/// listable but their detail link returns 410.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brief {
  pub brief_id:         Uuid,
  pub user_id:          Uuid,
  pub brief_type:       BriefType,
  pub title:            String,
  pub summary:          String,
  pub generated_at_utc: DateTime<Utc>,
  pub markets:          Vec<Market>,
  pub items:            Vec<BriefContentItem>,
  pub fallback_reason:  Option<BriefFallback>,
  pub status:           BriefStatus,
  pub expires_at_utc:   Option<DateTime<Utc>>,
}

impl Brief {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at_utc.is_some_and(|at| at <= now)
  }
}
