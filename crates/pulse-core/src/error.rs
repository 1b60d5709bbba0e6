//! Error types for `pulse-core`.
//!
//! This enum is the typed failure surface of the store and the domain rules.
//! Higher layers map variants to HTTP codes; [`Error::retryable`] drives the
//! `retryable` flag clients use to decide whether to retry.

use thiserror::Error;
use uuid::Uuid;

use crate::{feedback::ReportStatus, market::Market};

#[derive(Debug, Error)]
pub enum Error {
  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("event not found: {0}")]
  EventNotFound(Uuid),

  #[error("reason not found: {0}")]
  ReasonNotFound(Uuid),

  #[error("watchlist item not found: {0}")]
  WatchlistItemNotFound(Uuid),

  #[error("notification not found: {0}")]
  NotificationNotFound(Uuid),

  #[error("brief not found: {0}")]
  BriefNotFound(Uuid),

  #[error("report not found: {0}")]
  ReportNotFound(Uuid),

  /// Distinct from a generic not-found: no report has ever been filed for
  /// the event, so there is no revision history to return.
  #[error("no reports have been filed for event {0}")]
  RevisionHistoryNotFound(Uuid),

  #[error("email already registered")]
  EmailAlreadyExists,

  #[error("an open report already exists for this reason")]
  DuplicateReasonReport,

  #[error("brief detail link has expired")]
  BriefExpired,

  #[error("unknown symbol {ticker} on {market}")]
  UnknownSymbol { market: Market, ticker: String },

  #[error("cannot move report from {from} to {to}")]
  InvalidTransition {
    from: ReportStatus,
    to:   ReportStatus,
  },

  #[error("resource belongs to another user")]
  Forbidden,

  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// The bounded work queue is full; the caller must retry.
  #[error("work queue is full")]
  Backpressure,

  #[error("store temporarily unavailable: {0}")]
  Transient(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Whether a client retry can reasonably succeed without changed input.
  pub fn retryable(&self) -> bool {
    matches!(self, Error::Backpressure | Error::Transient(_))
  }

  pub fn invalid_input(message: impl Into<String>) -> Self {
    Error::InvalidInput(message.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
