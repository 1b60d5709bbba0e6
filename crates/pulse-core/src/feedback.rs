//! User feedback, reason reports, and the report state machine.
//!
//! Reports move `received → reviewed → resolved` (skipping `reviewed` is
//! allowed); no backward moves. Every transition is appended to an immutable
//! log. Resolving a report may write a [`ReasonRevision`], which is the only
//! thing allowed to mutate a reason's confidence after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Feedback ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
  Helpful,
  NotHelpful,
}

/// One user's vote on one reason. `(user, event, reason)` is unique and the
/// last write wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
  pub user_id:        Uuid,
  pub event_id:       Uuid,
  pub reason_id:      Uuid,
  pub vote:           Vote,
  pub updated_at_utc: DateTime<Utc>,
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
  InaccurateReason,
  WrongSource,
  OutdatedInformation,
  Other,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
  Received,
  Reviewed,
  Resolved,
}

impl ReportStatus {
  /// Forward-only transition check. `received → resolved` skips review.
  pub fn can_advance_to(self, target: ReportStatus) -> bool {
    matches!(
      (self, target),
      (ReportStatus::Received, ReportStatus::Reviewed)
        | (ReportStatus::Received, ReportStatus::Resolved)
        | (ReportStatus::Reviewed, ReportStatus::Resolved)
    )
  }

  pub fn is_open(self) -> bool { self != ReportStatus::Resolved }
}

impl std::fmt::Display for ReportStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let label = match self {
      ReportStatus::Received => "received",
      ReportStatus::Reviewed => "reviewed",
      ReportStatus::Resolved => "resolved",
    };
    f.write_str(label)
  }
}

/// Validate a transition, producing the typed error handlers rely on.
pub fn ensure_forward(
  from: ReportStatus,
  to: ReportStatus,
) -> Result<()> {
  if from.can_advance_to(to) {
    Ok(())
  } else {
    Err(Error::InvalidTransition { from, to })
  }
}

/// A user's claim that a reason is incorrect. At most one non-resolved report
/// exists per `(user, event, reason)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonReport {
  pub report_id:      Uuid,
  pub user_id:        Uuid,
  pub event_id:       Uuid,
  pub reason_id:      Uuid,
  pub report_type:    ReportType,
  pub note:           Option<String>,
  pub status:         ReportStatus,
  pub created_at_utc: DateTime<Utc>,
  pub updated_at_utc: DateTime<Utc>,
}

/// Append-only log row for each report state change. `from_status` is `None`
/// for the initial `received` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
  pub report_id:      Uuid,
  pub event_id:       Uuid,
  pub reason_id:      Uuid,
  pub from_status:    Option<ReportStatus>,
  pub to_status:      ReportStatus,
  pub changed_at_utc: DateTime<Utc>,
  pub note:           Option<String>,
}

/// A confidence adjustment applied when a report is resolved.
/// `revised_at_utc` equals the resolve transition's `changed_at_utc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonRevision {
  pub revision_id:       Uuid,
  pub report_id:         Uuid,
  pub event_id:          Uuid,
  pub reason_id:         Uuid,
  pub confidence_before: f64,
  pub confidence_after:  f64,
  pub revision_reason:   String,
  pub revised_at_utc:    DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn forward_transitions_only() {
    use ReportStatus::*;
    assert!(Received.can_advance_to(Reviewed));
    assert!(Received.can_advance_to(Resolved));
    assert!(Reviewed.can_advance_to(Resolved));

    assert!(!Reviewed.can_advance_to(Received));
    assert!(!Resolved.can_advance_to(Reviewed));
    assert!(!Resolved.can_advance_to(Resolved));
    assert!(!Received.can_advance_to(Received));
  }

  #[test]
  fn ensure_forward_yields_typed_error() {
    let err = ensure_forward(ReportStatus::Resolved, ReportStatus::Reviewed)
      .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
  }
}
