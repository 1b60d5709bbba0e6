//! Reason reports and the revision/transition history.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use pulse_core::{
  feedback::{
    ReasonReport, ReasonRevision, ReportStatus, ReportType, StatusTransition,
  },
  store::Store,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::CurrentUser, error::ApiResult};

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
  pub reason_id:   Uuid,
  pub report_type: ReportType,
  #[serde(default)]
  pub note:        Option<String>,
}

/// `POST /v1/events/{id}/reason-reports`
///
/// 201 with the report in `received`; a second open report for the same
/// `(user, event, reason)` fails with 400 `duplicate_reason_report`.
pub async fn submit<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(event_id): Path<Uuid>,
  Json(body): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<ReasonReport>)>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let report = state
    .store
    .submit_report(
      user.user_id,
      event_id,
      body.reason_id,
      body.report_type,
      body.note,
    )
    .await?;
  Ok((StatusCode::CREATED, Json(report)))
}

#[derive(Debug, Serialize)]
pub struct HistoryMeta {
  pub has_revision_history: bool,
  pub latest_status:        ReportStatus,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
  pub revisions:          Vec<ReasonRevision>,
  pub status_transitions: Vec<StatusTransition>,
  pub meta:               HistoryMeta,
}

/// `GET /v1/events/{id}/reason-revisions`
///
/// 404 `reason_revision_history_not_found` when no report has ever been
/// filed for the event — distinct from the generic not-found.
pub async fn revisions<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
  Path(event_id): Path<Uuid>,
) -> ApiResult<Json<HistoryResponse>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let (revisions, status_transitions) =
    state.store.event_history(event_id).await?;

  let latest_status = status_transitions
    .iter()
    .max_by_key(|t| t.changed_at_utc)
    .map(|t| t.to_status)
    .unwrap_or(ReportStatus::Received);

  Ok(Json(HistoryResponse {
    meta: HistoryMeta {
      has_revision_history: !revisions.is_empty(),
      latest_status,
    },
    revisions,
    status_transitions,
  }))
}
