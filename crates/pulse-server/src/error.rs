//! API error type and the wire error envelope.
//!
//! Every non-2xx response carries
//! `{code, message, details, request_id, retryable}`. Clients key off
//! `code` for localized copy and `retryable` to decide whether to offer a
//! retry; `request_id` is for support correlation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use pulse_core::Error as CoreError;
use serde_json::{Value, json};
use thiserror::Error;

use crate::request_id::current_request_id;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{message}")]
  InvalidInput { message: String, details: Value },

  #[error("invalid credentials")]
  InvalidCredentials,

  #[error("email already exists")]
  EmailAlreadyExists,

  #[error("missing or invalid access token")]
  InvalidToken,

  #[error("forbidden")]
  Forbidden,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("an open report already exists for this reason")]
  DuplicateReasonReport,

  #[error("no revision history exists for this event")]
  ReasonRevisionHistoryNotFound,

  #[error("brief link expired")]
  BriefLinkExpired,

  #[error("request timed out")]
  GatewayTimeout,

  #[error("evidence compare timed out")]
  CompareUpstreamTimeout,

  #[error("temporarily unavailable: {0}")]
  TemporarilyUnavailable(String),

  #[error("upstream unavailable: {0}")]
  UpstreamUnavailable(String),

  #[error("internal error")]
  Unknown(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn invalid_input(message: impl Into<String>) -> Self {
    ApiError::InvalidInput {
      message: message.into(),
      details: json!({}),
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      ApiError::InvalidInput { .. } | ApiError::DuplicateReasonReport => {
        StatusCode::BAD_REQUEST
      }
      ApiError::InvalidCredentials | ApiError::InvalidToken => {
        StatusCode::UNAUTHORIZED
      }
      ApiError::Forbidden => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) | ApiError::ReasonRevisionHistoryNotFound => {
        StatusCode::NOT_FOUND
      }
      ApiError::EmailAlreadyExists | ApiError::Conflict(_) => {
        StatusCode::CONFLICT
      }
      ApiError::BriefLinkExpired => StatusCode::GONE,
      ApiError::GatewayTimeout | ApiError::CompareUpstreamTimeout => {
        StatusCode::GATEWAY_TIMEOUT
      }
      ApiError::TemporarilyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      ApiError::InvalidInput { .. } => "invalid_input",
      ApiError::InvalidCredentials => "invalid_credentials",
      ApiError::EmailAlreadyExists => "email_already_exists",
      ApiError::InvalidToken => "invalid_token",
      ApiError::Forbidden => "forbidden",
      ApiError::NotFound(_) => "not_found",
      ApiError::Conflict(_) => "conflict",
      ApiError::DuplicateReasonReport => "duplicate_reason_report",
      ApiError::ReasonRevisionHistoryNotFound => {
        "reason_revision_history_not_found"
      }
      ApiError::BriefLinkExpired => "brief_link_expired",
      ApiError::GatewayTimeout => "temporarily_unavailable",
      ApiError::CompareUpstreamTimeout => "compare_upstream_timeout",
      ApiError::TemporarilyUnavailable(_) => "temporarily_unavailable",
      ApiError::UpstreamUnavailable(_) => "upstream_unavailable",
      ApiError::Unknown(_) => "unknown_error",
    }
  }

  pub fn retryable(&self) -> bool {
    matches!(
      self,
      ApiError::GatewayTimeout
        | ApiError::CompareUpstreamTimeout
        | ApiError::TemporarilyUnavailable(_)
        | ApiError::UpstreamUnavailable(_)
    )
  }

  fn details(&self) -> Value {
    match self {
      ApiError::InvalidInput { details, .. } => details.clone(),
      _ => json!({}),
    }
  }

  /// Serialize the envelope with an explicit request id — used by the
  /// request-context middleware for responses built outside a handler.
  pub fn envelope(&self, request_id: &str) -> Value {
    json!({
      "code": self.code(),
      "message": self.to_string(),
      "details": self.details(),
      "request_id": request_id,
      "retryable": self.retryable(),
    })
  }
}

impl From<CoreError> for ApiError {
  fn from(err: CoreError) -> Self {
    match err {
      CoreError::EmailAlreadyExists => ApiError::EmailAlreadyExists,
      CoreError::DuplicateReasonReport => ApiError::DuplicateReasonReport,
      CoreError::RevisionHistoryNotFound(_) => {
        ApiError::ReasonRevisionHistoryNotFound
      }
      CoreError::BriefExpired => ApiError::BriefLinkExpired,
      CoreError::Forbidden => ApiError::Forbidden,
      CoreError::UserNotFound(_)
      | CoreError::EventNotFound(_)
      | CoreError::ReasonNotFound(_)
      | CoreError::WatchlistItemNotFound(_)
      | CoreError::NotificationNotFound(_)
      | CoreError::BriefNotFound(_)
      | CoreError::ReportNotFound(_) => ApiError::NotFound(err.to_string()),
      CoreError::UnknownSymbol { .. } => ApiError::InvalidInput {
        message: err.to_string(),
        details: json!({}),
      },
      CoreError::InvalidInput(message) => ApiError::InvalidInput {
        message,
        details: json!({}),
      },
      CoreError::InvalidTransition { .. } => {
        ApiError::Conflict(err.to_string())
      }
      CoreError::Backpressure | CoreError::Transient(_) => {
        ApiError::TemporarilyUnavailable(err.to_string())
      }
      CoreError::Serialization(_) => ApiError::Unknown(Box::new(err)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    if matches!(self, ApiError::Unknown(_)) {
      tracing::error!(
        request_id = %current_request_id(),
        error = %self,
        "uncaught handler error"
      );
    }
    let body = self.envelope(&current_request_id());
    (self.status(), Json(body)).into_response()
  }
}

pub type ApiResult<T> = Result<T, ApiError>;
