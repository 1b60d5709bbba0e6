//! The `Store` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `pulse-store-mem`).
//! Higher layers (`pulse-server`, `pulse-worker`) depend on this abstraction,
//! not on any concrete backend. All writes run inside a per-aggregate
//! transaction that validates invariants, stamps `*_utc` from the injected
//! clock, and returns an owned snapshot; reads are lock-free over snapshots.
//!
//! All methods return `Send` futures so the trait can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Result,
  brief::Brief,
  event::{ConfidenceBreakdown, EventReason, PriceEvent},
  feedback::{
    Feedback, ReasonReport, ReasonRevision, ReportType, StatusTransition, Vote,
  },
  market::Market,
  notification::{Channel, DeltaNote, Notification},
  user::{NewUser, User},
  watchlist::{NewWatchlistItem, Threshold, WatchlistItem},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`Store::query_events`].
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
  /// Restrict to these `(market, ticker)` pairs (a user's watchlist scope).
  pub keys:         Option<Vec<(Market, String)>>,
  pub market:       Option<Market>,
  pub symbol:       Option<String>,
  pub from_utc:     Option<DateTime<Utc>>,
  pub to_utc:       Option<DateTime<Utc>>,
  /// Exclusive paging cursor: rows strictly older than this position.
  pub before:       Option<(DateTime<Utc>, Uuid)>,
  pub limit:        Option<usize>,
  /// Rows older than this many days from `now` are never returned.
  pub max_age_days: i64,
}

impl EventQuery {
  pub fn recent() -> Self { Self { max_age_days: 30, ..Self::default() } }
}

/// Input to [`Store::record_notification`]. Id and `sent_at_utc` are minted
/// by the store.
#[derive(Debug, Clone)]
pub struct NewNotification {
  pub user_id:  Uuid,
  pub event_id: Uuid,
  pub channel:  Channel,
  pub message:  String,
  pub delta:    Option<DeltaNote>,
}

/// Reviewer-supplied confidence adjustment applied at resolve time.
#[derive(Debug, Clone)]
pub struct RevisionInput {
  pub confidence_after: f64,
  pub revision_reason:  String,
  /// Refreshed breakdown from a reason-engine rerun, if one ran.
  pub breakdown:        Option<ConfidenceBreakdown>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Pulse storage backend.
///
/// Mutation is serialised per aggregate. The only cross-aggregate write is
/// [`Store::insert_event_with_reasons`], which commits an event and its
/// initial reasons atomically so a reader never observes an event without
/// its (possibly empty) reason list.
pub trait Store: Send + Sync {
  // ── Users ─────────────────────────────────────────────────────────────

  /// Create a user. Fails with `EmailAlreadyExists` on a case-insensitive
  /// email collision.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User>> + Send + '_;

  fn get_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<User>>> + Send + '_;

  fn find_user_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<User>>> + Send + 'a;

  fn update_locale(
    &self,
    user_id: Uuid,
    locale: String,
  ) -> impl Future<Output = Result<User>> + Send + '_;

  /// Every user id, for scheduled per-user work (brief generation).
  fn list_user_ids(
    &self,
  ) -> impl Future<Output = Result<Vec<Uuid>>> + Send + '_;

  // ── Watchlist ─────────────────────────────────────────────────────────

  /// Idempotent insert: re-adding an existing `(user, market, ticker)`
  /// returns the existing row with the flag set.
  fn add_watchlist_item(
    &self,
    input: NewWatchlistItem,
  ) -> impl Future<Output = Result<(WatchlistItem, bool)>> + Send + '_;

  /// Remove an item owned by `user_id`. `Forbidden` if it belongs to
  /// another user.
  fn remove_watchlist_item(
    &self,
    user_id: Uuid,
    item_id: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// One page of the user's watchlist plus the total row count.
  fn list_watchlist(
    &self,
    user_id: Uuid,
    page: usize,
    size: usize,
  ) -> impl Future<Output = Result<(Vec<WatchlistItem>, usize)>> + Send + '_;

  /// All users currently watching `(market, ticker)`.
  fn list_watchers<'a>(
    &'a self,
    market: Market,
    ticker: &'a str,
  ) -> impl Future<Output = Result<Vec<Uuid>>> + Send + 'a;

  // ── Thresholds ────────────────────────────────────────────────────────

  /// One row per `(user, window_minutes)`; writes replace.
  fn upsert_threshold(
    &self,
    threshold: Threshold,
  ) -> impl Future<Output = Result<Threshold>> + Send + '_;

  fn list_thresholds(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Threshold>>> + Send + '_;

  fn get_threshold(
    &self,
    user_id: Uuid,
    window_minutes: u32,
  ) -> impl Future<Output = Result<Option<f64>>> + Send + '_;

  // ── Events & reasons ──────────────────────────────────────────────────

  /// The detector→reason commit: event plus its initial reasons, atomically.
  fn insert_event_with_reasons(
    &self,
    event: PriceEvent,
    reasons: Vec<EventReason>,
  ) -> impl Future<Output = Result<PriceEvent>> + Send + '_;

  fn get_event(
    &self,
    event_id: Uuid,
  ) -> impl Future<Output = Result<Option<PriceEvent>>> + Send + '_;

  /// Reasons ordered by rank.
  fn list_reasons(
    &self,
    event_id: Uuid,
  ) -> impl Future<Output = Result<Vec<EventReason>>> + Send + '_;

  /// Replace a reason row in place (reason-engine rerun path).
  fn update_reason(
    &self,
    reason: EventReason,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Filtered, cursor-paged scan ordered by `detected_at_utc` descending.
  fn query_events<'a>(
    &'a self,
    query: &'a EventQuery,
  ) -> impl Future<Output = Result<Vec<PriceEvent>>> + Send + 'a;

  // ── Feedback ──────────────────────────────────────────────────────────

  /// Last-write-wins vote. The flag reports whether an earlier vote was
  /// overwritten.
  fn upsert_feedback(
    &self,
    user_id: Uuid,
    event_id: Uuid,
    reason_id: Uuid,
    vote: Vote,
  ) -> impl Future<Output = Result<(Feedback, bool)>> + Send + '_;

  // ── Reports & revisions ───────────────────────────────────────────────

  /// Create a report in `received` and log the initial transition. Fails
  /// with `DuplicateReasonReport` if an open report exists for the same
  /// `(user, event, reason)`.
  fn submit_report(
    &self,
    user_id: Uuid,
    event_id: Uuid,
    reason_id: Uuid,
    report_type: ReportType,
    note: Option<String>,
  ) -> impl Future<Output = Result<ReasonReport>> + Send + '_;

  /// `received → reviewed`.
  fn review_report(
    &self,
    report_id: Uuid,
    note: Option<String>,
  ) -> impl Future<Output = Result<ReasonReport>> + Send + '_;

  /// `received|reviewed → resolved`. When `revision` is present, a
  /// [`ReasonRevision`] is written in the same commit and the target
  /// reason's confidence (and breakdown) are updated; the revision's
  /// `revised_at_utc` equals the transition's `changed_at_utc`.
  fn resolve_report(
    &self,
    report_id: Uuid,
    note: Option<String>,
    revision: Option<RevisionInput>,
  ) -> impl Future<Output = Result<(ReasonReport, Option<ReasonRevision>)>>
  + Send
  + '_;

  fn list_reports(
    &self,
    event_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ReasonReport>>> + Send + '_;

  /// Revisions (ascending by `revised_at_utc`) and the full transition log
  /// for every report on the event. Fails with `RevisionHistoryNotFound`
  /// when no report has ever been filed.
  fn event_history(
    &self,
    event_id: Uuid,
  ) -> impl Future<
    Output = Result<(Vec<ReasonRevision>, Vec<StatusTransition>)>,
  > + Send
  + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Idempotent on `(user, event)`: a duplicate dispatch returns the
  /// existing row with the flag set.
  fn record_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<(Notification, bool)>> + Send + '_;

  /// Newest-first list plus the count of rows in `sent`.
  fn list_notifications(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<(Vec<Notification>, usize)>> + Send + '_;

  /// `sent → read`. Idempotent if already read; a promoted (`cooldown`) row
  /// cannot be marked read.
  fn mark_notification_read(
    &self,
    user_id: Uuid,
    notification_id: Uuid,
  ) -> impl Future<Output = Result<Notification>> + Send + '_;

  /// Promote unread in-app rows sent before `older_than` to `cooldown`.
  /// Returns the number of rows promoted.
  fn promote_stale_unread(
    &self,
    older_than: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize>> + Send + '_;

  // ── Briefs ────────────────────────────────────────────────────────────

  fn upsert_brief(
    &self,
    brief: Brief,
  ) -> impl Future<Output = Result<Brief>> + Send + '_;

  /// Newest-first inbox. Expired rows are still listed.
  fn list_briefs(
    &self,
    user_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Brief>>> + Send + '_;

  /// Detail fetch; fails with `BriefExpired` once the expiry has passed.
  fn get_brief(
    &self,
    user_id: Uuid,
    brief_id: Uuid,
  ) -> impl Future<Output = Result<Brief>> + Send + '_;

  fn mark_brief_read(
    &self,
    user_id: Uuid,
    brief_id: Uuid,
  ) -> impl Future<Output = Result<Brief>> + Send + '_;
}
