//! Reason feedback votes.

use axum::{
  Json,
  extract::{Path, State},
};
use pulse_core::{
  feedback::{Feedback, Vote},
  store::Store,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::CurrentUser, error::ApiResult};

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
  pub reason_id: Uuid,
  pub vote:      Vote,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
  #[serde(flatten)]
  pub feedback:    Feedback,
  /// True when this call replaced an earlier vote (idempotent upsert).
  pub overwritten: bool,
}

/// `POST /v1/events/{id}/feedback`
pub async fn submit<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(event_id): Path<Uuid>,
  Json(body): Json<SubmitRequest>,
) -> ApiResult<Json<SubmitResponse>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let (feedback, overwritten) = state
    .store
    .upsert_feedback(user.user_id, event_id, body.reason_id, body.vote)
    .await?;
  Ok(Json(SubmitResponse { feedback, overwritten }))
}
