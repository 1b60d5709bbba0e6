//! Notification dispatch with per-(user, symbol) cooldowns.
//!
//! A new event normally produces one notification per configured channel.
//! While a `(user, symbol, channel)` cooldown is running, repeat events are
//! suppressed unless the move has shifted by at least
//! `delta_pct_for_realert` since the last alert, in which case the cooldown
//! is bypassed and the notification carries a delta annotation.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use pulse_core::{
  Result,
  event::PriceEvent,
  market::Market,
  notification::{Channel, DeltaNote, Notification},
  store::{NewNotification, Store},
};
use uuid::Uuid;

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NotifierConfig {
  /// Channels every alert fans out to.
  pub channels:              Vec<Channel>,
  /// Cooldown TTL per channel.
  pub in_app_cooldown:       Duration,
  pub email_cooldown:        Duration,
  pub delta_pct_for_realert: f64,
  /// Unread in-app rows older than this are promoted to `cooldown` by the
  /// periodic ticker.
  pub promote_unread_after:  Duration,
}

impl Default for NotifierConfig {
  fn default() -> Self {
    Self {
      channels:              vec![Channel::InApp],
      in_app_cooldown:       Duration::minutes(30),
      email_cooldown:        Duration::minutes(240),
      delta_pct_for_realert: 1.0,
      promote_unread_after:  Duration::minutes(30),
    }
  }
}

impl NotifierConfig {
  fn cooldown(&self, channel: Channel) -> Duration {
    match channel {
      Channel::InApp => self.in_app_cooldown,
      Channel::Email => self.email_cooldown,
    }
  }
}

// ─── Notifier ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct LastAlert {
  at:         DateTime<Utc>,
  change_pct: f64,
}

type CooldownKey = (Uuid, Market, String, Channel);

/// Single-owner dispatch state, driven by the reason worker pool.
pub struct Notifier {
  config:      NotifierConfig,
  last_alerts: HashMap<CooldownKey, LastAlert>,
}

impl Notifier {
  pub fn new(config: NotifierConfig) -> Self {
    Self { config, last_alerts: HashMap::new() }
  }

  /// Dispatch notifications for a freshly committed event. Events detected
  /// while the market is closed are recorded upstream but never alerted.
  ///
  /// `realert_hint` is the detector's own debounce-bypass annotation; it is
  /// honoured even when the notifier-side cooldown would not have fired.
  pub async fn dispatch<S: Store>(
    &mut self,
    store: &S,
    event: &PriceEvent,
    realert_hint: Option<DeltaNote>,
  ) -> Result<Vec<Notification>> {
    if !event.session_label.alertable() {
      tracing::debug!(
        event_id = %event.event_id,
        "market closed; recording without alert"
      );
      return Ok(Vec::new());
    }

    let mut sent = Vec::new();
    for &channel in &self.config.channels.clone() {
      let key = (
        event.user_id,
        event.market,
        event.symbol.clone(),
        channel,
      );

      let delta = match self.last_alerts.get(&key) {
        Some(last)
          if event.detected_at_utc - last.at
            < self.config.cooldown(channel) =>
        {
          let moved = (event.change_pct - last.change_pct).abs();
          if moved < self.config.delta_pct_for_realert
            && realert_hint.is_none()
          {
            tracing::debug!(
              event_id = %event.event_id,
              channel = ?channel,
              "cooldown active; suppressing notification"
            );
            continue;
          }
          realert_hint.or(Some(DeltaNote {
            previous_change_pct: last.change_pct,
            current_change_pct:  event.change_pct,
          }))
        }
        _ => realert_hint,
      };

      let (notification, duplicate) = store
        .record_notification(NewNotification {
          user_id: event.user_id,
          event_id: event.event_id,
          channel,
          message: render_message(event, delta.as_ref()),
          delta,
        })
        .await?;

      self.last_alerts.insert(key, LastAlert {
        at:         event.detected_at_utc,
        change_pct: event.change_pct,
      });
      if !duplicate {
        sent.push(notification);
      }
    }
    Ok(sent)
  }

  /// Drop cooldown entries older than twice the longest TTL.
  pub fn evict_stale(&mut self, now: DateTime<Utc>) {
    let retention =
      self.config.in_app_cooldown.max(self.config.email_cooldown) * 2;
    self.last_alerts.retain(|_, last| now - last.at < retention);
  }

  pub fn promote_unread_after(&self) -> Duration {
    self.config.promote_unread_after
  }
}

fn render_message(event: &PriceEvent, delta: Option<&DeltaNote>) -> String {
  let base = format!(
    "{} ({}) moved {:+.2}% in {}m",
    event.symbol,
    event.market,
    event.change_pct,
    event.window_minutes
  );
  match delta {
    None => base,
    Some(note) => format!(
      "{base} — {:+.2}% further since the last alert",
      note.current_change_pct - note.previous_change_pct
    ),
  }
}
