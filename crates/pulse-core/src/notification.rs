//! Notification rows and their status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
  InApp,
  Email,
}

/// `sent → read` on user action; `sent → cooldown` when the system promotes a
/// stale unread in-app row. Never backwards.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
  Sent,
  Read,
  Cooldown,
}

/// Annotation attached when a cooldown was bypassed by a delta re-alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaNote {
  pub previous_change_pct: f64,
  pub current_change_pct:  f64,
}

/// One delivered alert. `(user, event)` is unique per alert round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub user_id:         Uuid,
  pub event_id:        Uuid,
  pub channel:         Channel,
  pub status:          NotificationStatus,
  pub message:         String,
  pub sent_at_utc:     DateTime<Utc>,
  pub delta:           Option<DeltaNote>,
}
