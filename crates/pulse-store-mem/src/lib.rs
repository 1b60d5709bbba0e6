//! [`MemStore`] — the in-memory implementation of [`pulse_core::store::Store`].
//!
//! Each aggregate lives behind its own `parking_lot::RwLock` so writes are
//! serialised per aggregate without cross-aggregate contention. Reads clone
//! owned snapshots out of the lock; no lock is ever held across an `.await`
//! (every method body is synchronous inside an `async fn`).
//!
//! Lock-order discipline: when a write must touch two aggregates (resolving
//! a report that revises a reason), the `reports` lock is taken before the
//! `events` lock, and no other path takes both.

mod tables;


use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use pulse_core::{
  Error, Result,
  brief::{Brief, BriefStatus},
  clock::{Clock, IdMinter, SystemClock, UuidMinter},
  event::{self, EventReason, MAX_REASONS, PriceEvent},
  feedback::{
    self, Feedback, ReasonReport, ReasonRevision, ReportStatus, ReportType,
    StatusTransition, Vote,
  },
  market::Market,
  notification::{Channel, Notification, NotificationStatus},
  store::{EventQuery, NewNotification, RevisionInput, Store},
  user::{NewUser, User, normalize_email},
  watchlist::{
    NewWatchlistItem, Threshold, WatchlistItem, normalize_threshold_pct,
  },
};
use uuid::Uuid;

use crate::tables::{
  EventTable, NotificationTable, ReportTable, UserTable, WatchlistTable,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An in-memory Pulse store. Cloning is cheap — all tables are shared.
#[derive(Clone)]
pub struct MemStore {
  clock: Arc<dyn Clock>,
  ids:   Arc<dyn IdMinter>,

  users:         Arc<RwLock<UserTable>>,
  watchlists:    Arc<RwLock<WatchlistTable>>,
  thresholds:    Arc<RwLock<std::collections::HashMap<(Uuid, u32), f64>>>,
  events:        Arc<RwLock<EventTable>>,
  feedback:      Arc<RwLock<std::collections::HashMap<(Uuid, Uuid, Uuid), Feedback>>>,
  reports:       Arc<RwLock<ReportTable>>,
  notifications: Arc<RwLock<NotificationTable>>,
  briefs:        Arc<RwLock<std::collections::HashMap<(Uuid, Uuid), Brief>>>,
}

impl MemStore {
  /// Production store on the system clock and random ids.
  pub fn new() -> Self {
    Self::with_services(Arc::new(SystemClock), Arc::new(UuidMinter))
  }

  /// Store with injected clock/id services — the test entry point.
  pub fn with_services(
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdMinter>,
  ) -> Self {
    Self {
      clock,
      ids,
      users: Arc::default(),
      watchlists: Arc::default(),
      thresholds: Arc::default(),
      events: Arc::default(),
      feedback: Arc::default(),
      reports: Arc::default(),
      notifications: Arc::default(),
      briefs: Arc::default(),
    }
  }

  fn now(&self) -> DateTime<Utc> { self.clock.now() }

  /// Validate the event+reasons commit before it becomes visible.
  fn validate_reasons(
    event: &PriceEvent,
    reasons: &[EventReason],
  ) -> Result<()> {
    if reasons.len() > MAX_REASONS {
      return Err(Error::invalid_input(format!(
        "an event keeps at most {MAX_REASONS} reasons"
      )));
    }

    let mut ranks = Vec::with_capacity(reasons.len());
    let mut urls = Vec::with_capacity(reasons.len());
    for reason in reasons {
      if reason.event_id != event.event_id {
        return Err(Error::invalid_input(
          "reason does not belong to the event being committed",
        ));
      }
      if !(1..=MAX_REASONS as u8).contains(&reason.rank) {
        return Err(Error::invalid_input("reason rank must be 1..=3"));
      }
      if ranks.contains(&reason.rank) {
        return Err(Error::invalid_input("reason ranks must be unique"));
      }
      ranks.push(reason.rank);

      if reason.summary.trim().is_empty() {
        return Err(Error::invalid_input("reason summary must not be empty"));
      }
      if !(reason.source_url.starts_with("http://")
        || reason.source_url.starts_with("https://"))
      {
        return Err(Error::invalid_input(
          "reason source_url must be http or https",
        ));
      }
      if urls.contains(&&reason.source_url) {
        return Err(Error::invalid_input(
          "reason source_url must be unique within the event",
        ));
      }
      urls.push(&reason.source_url);

      if !(0.0..=1.0).contains(&reason.confidence_score) {
        return Err(Error::invalid_input(
          "confidence_score must be within [0, 1]",
        ));
      }
      if let Some(breakdown) = &reason.breakdown
        && !breakdown.is_consistent()
      {
        return Err(Error::invalid_input(
          "confidence breakdown total does not match its components",
        ));
      }
    }
    Ok(())
  }

  /// FK check used by feedback and report writes.
  fn require_reason(&self, event_id: Uuid, reason_id: Uuid) -> Result<()> {
    let events = self.events.read();
    if !events.by_id.contains_key(&event_id) {
      return Err(Error::EventNotFound(event_id));
    }
    let belongs = events
      .reasons
      .get(&event_id)
      .is_some_and(|rs| rs.iter().any(|r| r.reason_id == reason_id));
    if belongs {
      Ok(())
    } else {
      Err(Error::ReasonNotFound(reason_id))
    }
  }
}

impl Default for MemStore {
  fn default() -> Self { Self::new() }
}

// ─── Store impl ──────────────────────────────────────────────────────────────

impl Store for MemStore {
  // ── Users ─────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let email = normalize_email(&input.email)?;

    let mut users = self.users.write();
    if users.by_email.contains_key(&email) {
      return Err(Error::EmailAlreadyExists);
    }

    let user = User {
      user_id: self.ids.mint(),
      email: email.clone(),
      password_hash: input.password_hash,
      locale: input.locale,
      created_at_utc: self.now(),
    };
    users.by_email.insert(email, user.user_id);
    users.by_id.insert(user.user_id, user.clone());
    Ok(user)
  }

  async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
    Ok(self.users.read().by_id.get(&user_id).cloned())
  }

  async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
    let email = normalize_email(email)?;
    let users = self.users.read();
    Ok(
      users
        .by_email
        .get(&email)
        .and_then(|id| users.by_id.get(id))
        .cloned(),
    )
  }

  async fn update_locale(&self, user_id: Uuid, locale: String) -> Result<User> {
    let mut users = self.users.write();
    let user = users
      .by_id
      .get_mut(&user_id)
      .ok_or(Error::UserNotFound(user_id))?;
    user.locale = locale;
    Ok(user.clone())
  }

  async fn list_user_ids(&self) -> Result<Vec<Uuid>> {
    let users = self.users.read();
    let mut ids: Vec<Uuid> = users.by_id.keys().copied().collect();
    ids.sort();
    Ok(ids)
  }

  // ── Watchlist ─────────────────────────────────────────────────────────

  async fn add_watchlist_item(
    &self,
    input: NewWatchlistItem,
  ) -> Result<(WatchlistItem, bool)> {
    let ticker = input.ticker.trim().to_ascii_uppercase();
    if ticker.is_empty() {
      return Err(Error::invalid_input("symbol must not be empty"));
    }

    let mut table = self.watchlists.write();
    let unique_key = (input.user_id, input.market, ticker.clone());
    if let Some(existing_id) = table.unique.get(&unique_key)
      && let Some(existing) = table.by_id.get(existing_id)
    {
      return Ok((existing.clone(), true));
    }

    let item = WatchlistItem {
      item_id: self.ids.mint(),
      user_id: input.user_id,
      market: input.market,
      ticker,
      created_at_utc: self.now(),
    };
    table.unique.insert(unique_key, item.item_id);
    table.by_id.insert(item.item_id, item.clone());
    Ok((item, false))
  }

  async fn remove_watchlist_item(
    &self,
    user_id: Uuid,
    item_id: Uuid,
  ) -> Result<()> {
    let mut table = self.watchlists.write();
    let item = table
      .by_id
      .get(&item_id)
      .ok_or(Error::WatchlistItemNotFound(item_id))?;
    if item.user_id != user_id {
      return Err(Error::Forbidden);
    }

    let unique_key = (item.user_id, item.market, item.ticker.clone());
    table.unique.remove(&unique_key);
    table.by_id.remove(&item_id);
    Ok(())
  }

  async fn list_watchlist(
    &self,
    user_id: Uuid,
    page: usize,
    size: usize,
  ) -> Result<(Vec<WatchlistItem>, usize)> {
    let table = self.watchlists.read();
    let mut items: Vec<WatchlistItem> = table
      .by_id
      .values()
      .filter(|item| item.user_id == user_id)
      .cloned()
      .collect();
    items.sort_by(|a, b| {
      b.created_at_utc
        .cmp(&a.created_at_utc)
        .then_with(|| a.ticker.cmp(&b.ticker))
    });

    let total = items.len();
    let start = page.saturating_mul(size).min(total);
    let end = start.saturating_add(size).min(total);
    Ok((items[start..end].to_vec(), total))
  }

  async fn list_watchers(
    &self,
    market: Market,
    ticker: &str,
  ) -> Result<Vec<Uuid>> {
    let ticker = ticker.trim().to_ascii_uppercase();
    let table = self.watchlists.read();
    let mut users: Vec<Uuid> = table
      .by_id
      .values()
      .filter(|item| item.market == market && item.ticker == ticker)
      .map(|item| item.user_id)
      .collect();
    users.sort();
    users.dedup();
    Ok(users)
  }

  // ── Thresholds ────────────────────────────────────────────────────────

  async fn upsert_threshold(&self, threshold: Threshold) -> Result<Threshold> {
    let threshold_pct = normalize_threshold_pct(threshold.threshold_pct)?;
    let normalized = Threshold { threshold_pct, ..threshold };

    self.thresholds.write().insert(
      (normalized.user_id, normalized.window_minutes),
      normalized.threshold_pct,
    );
    Ok(normalized)
  }

  async fn list_thresholds(&self, user_id: Uuid) -> Result<Vec<Threshold>> {
    let table = self.thresholds.read();
    let mut rows: Vec<Threshold> = table
      .iter()
      .filter(|((owner, _), _)| *owner == user_id)
      .map(|(&(user_id, window_minutes), &threshold_pct)| Threshold {
        user_id,
        window_minutes,
        threshold_pct,
      })
      .collect();
    rows.sort_by_key(|t| t.window_minutes);
    Ok(rows)
  }

  async fn get_threshold(
    &self,
    user_id: Uuid,
    window_minutes: u32,
  ) -> Result<Option<f64>> {
    Ok(self.thresholds.read().get(&(user_id, window_minutes)).copied())
  }

  // ── Events & reasons ──────────────────────────────────────────────────

  async fn insert_event_with_reasons(
    &self,
    event: PriceEvent,
    reasons: Vec<EventReason>,
  ) -> Result<PriceEvent> {
    Self::validate_reasons(&event, &reasons)?;

    let mut table = self.events.write();
    if table.by_id.contains_key(&event.event_id) {
      return Err(Error::invalid_input("event id already committed"));
    }

    let mut ordered = reasons;
    ordered.sort_by_key(|r| r.rank);
    table.order.push(event.event_id);
    table.reasons.insert(event.event_id, ordered);
    table.by_id.insert(event.event_id, event.clone());
    Ok(event)
  }

  async fn get_event(&self, event_id: Uuid) -> Result<Option<PriceEvent>> {
    Ok(self.events.read().by_id.get(&event_id).cloned())
  }

  async fn list_reasons(&self, event_id: Uuid) -> Result<Vec<EventReason>> {
    let table = self.events.read();
    if !table.by_id.contains_key(&event_id) {
      return Err(Error::EventNotFound(event_id));
    }
    Ok(table.reasons.get(&event_id).cloned().unwrap_or_default())
  }

  async fn update_reason(&self, reason: EventReason) -> Result<()> {
    let mut table = self.events.write();
    let rows = table
      .reasons
      .get_mut(&reason.event_id)
      .ok_or(Error::EventNotFound(reason.event_id))?;
    let slot = rows
      .iter_mut()
      .find(|r| r.reason_id == reason.reason_id)
      .ok_or(Error::ReasonNotFound(reason.reason_id))?;
    *slot = reason;
    Ok(())
  }

  async fn query_events(&self, query: &EventQuery) -> Result<Vec<PriceEvent>> {
    let now = self.now();
    let cutoff = now - Duration::days(query.max_age_days.max(0));
    let table = self.events.read();

    let mut rows: Vec<PriceEvent> = table
      .order
      .iter()
      .filter_map(|id| table.by_id.get(id))
      .filter(|e| e.detected_at_utc >= cutoff)
      .filter(|e| {
        query.keys.as_ref().is_none_or(|keys| {
          keys.iter().any(|(m, t)| *m == e.market && *t == e.symbol)
        })
      })
      .filter(|e| query.market.is_none_or(|m| m == e.market))
      .filter(|e| query.symbol.as_deref().is_none_or(|s| s == e.symbol))
      .filter(|e| query.from_utc.is_none_or(|t| e.detected_at_utc >= t))
      .filter(|e| query.to_utc.is_none_or(|t| e.detected_at_utc <= t))
      .cloned()
      .collect();

    rows.sort_by(|a, b| {
      b.detected_at_utc
        .cmp(&a.detected_at_utc)
        .then_with(|| b.event_id.cmp(&a.event_id))
    });

    if let Some((cursor_at, cursor_id)) = query.before {
      rows.retain(|e| {
        (e.detected_at_utc, e.event_id) < (cursor_at, cursor_id)
      });
    }
    if let Some(limit) = query.limit {
      rows.truncate(limit);
    }
    Ok(rows)
  }

  // ── Feedback ──────────────────────────────────────────────────────────

  async fn upsert_feedback(
    &self,
    user_id: Uuid,
    event_id: Uuid,
    reason_id: Uuid,
    vote: Vote,
  ) -> Result<(Feedback, bool)> {
    self.require_reason(event_id, reason_id)?;

    let mut table = self.feedback.write();
    let key = (user_id, event_id, reason_id);
    let overwritten = table.contains_key(&key);
    let row = Feedback {
      user_id,
      event_id,
      reason_id,
      vote,
      updated_at_utc: self.now(),
    };
    table.insert(key, row.clone());
    Ok((row, overwritten))
  }

  // ── Reports & revisions ───────────────────────────────────────────────

  async fn submit_report(
    &self,
    user_id: Uuid,
    event_id: Uuid,
    reason_id: Uuid,
    report_type: ReportType,
    note: Option<String>,
  ) -> Result<ReasonReport> {
    self.require_reason(event_id, reason_id)?;

    let mut table = self.reports.write();
    let scope = (user_id, event_id, reason_id);
    if table.open_by_scope.contains_key(&scope) {
      return Err(Error::DuplicateReasonReport);
    }

    let now = self.now();
    let report = ReasonReport {
      report_id: self.ids.mint(),
      user_id,
      event_id,
      reason_id,
      report_type,
      note: note.filter(|n| !n.trim().is_empty()),
      status: ReportStatus::Received,
      created_at_utc: now,
      updated_at_utc: now,
    };

    table.open_by_scope.insert(scope, report.report_id);
    table.transitions.entry(event_id).or_default().push(StatusTransition {
      report_id: report.report_id,
      event_id,
      reason_id,
      from_status: None,
      to_status: ReportStatus::Received,
      changed_at_utc: now,
      note: None,
    });
    table.by_id.insert(report.report_id, report.clone());
    Ok(report)
  }

  async fn review_report(
    &self,
    report_id: Uuid,
    note: Option<String>,
  ) -> Result<ReasonReport> {
    let mut table = self.reports.write();
    let report = table
      .by_id
      .get_mut(&report_id)
      .ok_or(Error::ReportNotFound(report_id))?;
    feedback::ensure_forward(report.status, ReportStatus::Reviewed)?;

    let now = self.now();
    let from_status = report.status;
    report.status = ReportStatus::Reviewed;
    report.updated_at_utc = now;
    let snapshot = report.clone();

    table
      .transitions
      .entry(snapshot.event_id)
      .or_default()
      .push(StatusTransition {
        report_id,
        event_id: snapshot.event_id,
        reason_id: snapshot.reason_id,
        from_status: Some(from_status),
        to_status: ReportStatus::Reviewed,
        changed_at_utc: now,
        note: note.filter(|n| !n.trim().is_empty()),
      });
    Ok(snapshot)
  }

  async fn resolve_report(
    &self,
    report_id: Uuid,
    note: Option<String>,
    revision: Option<RevisionInput>,
  ) -> Result<(ReasonReport, Option<ReasonRevision>)> {
    let mut table = self.reports.write();
    let report = table
      .by_id
      .get_mut(&report_id)
      .ok_or(Error::ReportNotFound(report_id))?;
    feedback::ensure_forward(report.status, ReportStatus::Resolved)?;

    if let Some(input) = &revision {
      if !(0.0..=1.0).contains(&input.confidence_after) {
        return Err(Error::invalid_input(
          "confidence_after must be within [0, 1]",
        ));
      }
      if input.revision_reason.trim().is_empty() {
        return Err(Error::invalid_input("revision_reason must not be empty"));
      }
    }

    let now = self.now();
    let from_status = report.status;
    report.status = ReportStatus::Resolved;
    report.updated_at_utc = now;
    let snapshot = report.clone();

    let scope = (snapshot.user_id, snapshot.event_id, snapshot.reason_id);
    table.open_by_scope.remove(&scope);
    table
      .transitions
      .entry(snapshot.event_id)
      .or_default()
      .push(StatusTransition {
        report_id,
        event_id: snapshot.event_id,
        reason_id: snapshot.reason_id,
        from_status: Some(from_status),
        to_status: ReportStatus::Resolved,
        changed_at_utc: now,
        note: note.filter(|n| !n.trim().is_empty()),
      });

    let revision_row = match revision {
      None => None,
      Some(input) => {
        // Apply to the live reason; `reports` is already held, `events` is
        // taken second (the documented lock order).
        let mut events = self.events.write();
        let rows = events
          .reasons
          .get_mut(&snapshot.event_id)
          .ok_or(Error::EventNotFound(snapshot.event_id))?;
        let reason = rows
          .iter_mut()
          .find(|r| r.reason_id == snapshot.reason_id)
          .ok_or(Error::ReasonNotFound(snapshot.reason_id))?;

        let confidence_before = reason.confidence_score;
        reason.confidence_score = event::round4(input.confidence_after);
        if let Some(breakdown) = input.breakdown {
          reason.breakdown = Some(breakdown);
        }

        let row = ReasonRevision {
          revision_id: self.ids.mint(),
          report_id,
          event_id: snapshot.event_id,
          reason_id: snapshot.reason_id,
          confidence_before,
          confidence_after: reason.confidence_score,
          revision_reason: input.revision_reason,
          revised_at_utc: now,
        };
        table.revisions.entry(snapshot.event_id).or_default().push(row.clone());
        Some(row)
      }
    };

    Ok((snapshot, revision_row))
  }

  async fn list_reports(&self, event_id: Uuid) -> Result<Vec<ReasonReport>> {
    let table = self.reports.read();
    let mut rows: Vec<ReasonReport> = table
      .by_id
      .values()
      .filter(|r| r.event_id == event_id)
      .cloned()
      .collect();
    rows.sort_by_key(|r| r.created_at_utc);
    Ok(rows)
  }

  async fn event_history(
    &self,
    event_id: Uuid,
  ) -> Result<(Vec<ReasonRevision>, Vec<StatusTransition>)> {
    let table = self.reports.read();
    let transitions = match table.transitions.get(&event_id) {
      Some(rows) => rows.clone(),
      None => return Err(Error::RevisionHistoryNotFound(event_id)),
    };

    let mut revisions =
      table.revisions.get(&event_id).cloned().unwrap_or_default();
    revisions.sort_by_key(|r| r.revised_at_utc);
    Ok((revisions, transitions))
  }

  // ── Notifications ─────────────────────────────────────────────────────

  async fn record_notification(
    &self,
    input: NewNotification,
  ) -> Result<(Notification, bool)> {
    let mut table = self.notifications.write();
    let key = (input.user_id, input.event_id);
    if let Some(existing_id) = table.by_user_event.get(&key)
      && let Some(existing) = table.by_id.get(existing_id)
    {
      return Ok((existing.clone(), true));
    }

    let row = Notification {
      notification_id: self.ids.mint(),
      user_id: input.user_id,
      event_id: input.event_id,
      channel: input.channel,
      status: NotificationStatus::Sent,
      message: input.message,
      sent_at_utc: self.now(),
      delta: input.delta,
    };
    table.by_user_event.insert(key, row.notification_id);
    table.order.push(row.notification_id);
    table.by_id.insert(row.notification_id, row.clone());
    Ok((row, false))
  }

  async fn list_notifications(
    &self,
    user_id: Uuid,
  ) -> Result<(Vec<Notification>, usize)> {
    let table = self.notifications.read();
    let mut rows: Vec<Notification> = table
      .order
      .iter()
      .filter_map(|id| table.by_id.get(id))
      .filter(|n| n.user_id == user_id)
      .cloned()
      .collect();
    rows.sort_by(|a, b| b.sent_at_utc.cmp(&a.sent_at_utc));
    let unread = rows
      .iter()
      .filter(|n| n.status == NotificationStatus::Sent)
      .count();
    Ok((rows, unread))
  }

  async fn mark_notification_read(
    &self,
    user_id: Uuid,
    notification_id: Uuid,
  ) -> Result<Notification> {
    let mut table = self.notifications.write();
    let row = table
      .by_id
      .get_mut(&notification_id)
      .ok_or(Error::NotificationNotFound(notification_id))?;
    if row.user_id != user_id {
      return Err(Error::Forbidden);
    }
    match row.status {
      NotificationStatus::Sent => row.status = NotificationStatus::Read,
      NotificationStatus::Read => {}
      NotificationStatus::Cooldown => {
        return Err(Error::invalid_input(
          "notification is no longer unread",
        ));
      }
    }
    Ok(row.clone())
  }

  async fn promote_stale_unread(
    &self,
    older_than: DateTime<Utc>,
  ) -> Result<usize> {
    let mut table = self.notifications.write();
    let mut promoted = 0;
    for row in table.by_id.values_mut() {
      if row.status == NotificationStatus::Sent
        && row.channel == Channel::InApp
        && row.sent_at_utc < older_than
      {
        row.status = NotificationStatus::Cooldown;
        promoted += 1;
      }
    }
    Ok(promoted)
  }

  // ── Briefs ────────────────────────────────────────────────────────────

  async fn upsert_brief(&self, brief: Brief) -> Result<Brief> {
    self
      .briefs
      .write()
      .insert((brief.user_id, brief.brief_id), brief.clone());
    Ok(brief)
  }

  async fn list_briefs(&self, user_id: Uuid, limit: usize) -> Result<Vec<Brief>> {
    let table = self.briefs.read();
    let mut rows: Vec<Brief> = table
      .values()
      .filter(|b| b.user_id == user_id)
      .cloned()
      .collect();
    rows.sort_by(|a, b| {
      b.generated_at_utc
        .cmp(&a.generated_at_utc)
        .then_with(|| b.brief_id.cmp(&a.brief_id))
    });
    rows.truncate(limit.max(1));
    Ok(rows)
  }

  async fn get_brief(&self, user_id: Uuid, brief_id: Uuid) -> Result<Brief> {
    let table = self.briefs.read();
    let brief = table
      .get(&(user_id, brief_id))
      .ok_or(Error::BriefNotFound(brief_id))?;
    if brief.is_expired(self.now()) {
      return Err(Error::BriefExpired);
    }
    Ok(brief.clone())
  }

  async fn mark_brief_read(
    &self,
    user_id: Uuid,
    brief_id: Uuid,
  ) -> Result<Brief> {
    let mut table = self.briefs.write();
    let brief = table
      .get_mut(&(user_id, brief_id))
      .ok_or(Error::BriefNotFound(brief_id))?;
    brief.status = BriefStatus::Read;
    Ok(brief.clone())
  }
}
