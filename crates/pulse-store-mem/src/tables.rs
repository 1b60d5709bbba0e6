//! Aggregate tables — plain maps plus the unique indexes each aggregate
//! needs. Each table sits behind its own lock in [`crate::MemStore`].

use std::collections::HashMap;

use pulse_core::{
  event::{EventReason, PriceEvent},
  feedback::{ReasonReport, ReasonRevision, StatusTransition},
  market::Market,
  notification::Notification,
  user::User,
  watchlist::WatchlistItem,
};
use uuid::Uuid;

#[derive(Default)]
pub struct UserTable {
  pub by_id:    HashMap<Uuid, User>,
  /// Lowercased email → user id; enforces case-insensitive uniqueness.
  pub by_email: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct WatchlistTable {
  pub by_id:  HashMap<Uuid, WatchlistItem>,
  /// `(user, market, ticker)` → item id.
  pub unique: HashMap<(Uuid, Market, String), Uuid>,
}

#[derive(Default)]
pub struct EventTable {
  pub by_id:   HashMap<Uuid, PriceEvent>,
  /// Insertion order, for stable scans.
  pub order:   Vec<Uuid>,
  /// Reasons keyed by event, kept sorted by rank. Committed together with
  /// the event so readers never see one without the other.
  pub reasons: HashMap<Uuid, Vec<EventReason>>,
}

#[derive(Default)]
pub struct ReportTable {
  pub by_id:         HashMap<Uuid, ReasonReport>,
  /// `(user, event, reason)` → open (non-resolved) report id.
  pub open_by_scope: HashMap<(Uuid, Uuid, Uuid), Uuid>,
  /// Append-only transition log per event.
  pub transitions:   HashMap<Uuid, Vec<StatusTransition>>,
  pub revisions:     HashMap<Uuid, Vec<ReasonRevision>>,
}

#[derive(Default)]
pub struct NotificationTable {
  pub by_id:         HashMap<Uuid, Notification>,
  pub order:         Vec<Uuid>,
  /// `(user, event)` → notification id; the dispatch idempotence key.
  pub by_user_event: HashMap<(Uuid, Uuid), Uuid>,
}
