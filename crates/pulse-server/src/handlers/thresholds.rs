//! Per-window alert thresholds.

use axum::{Json, extract::State};
use pulse_core::{store::Store, watchlist::Threshold};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::CurrentUser,
  error::{ApiError, ApiResult},
};

#[derive(Debug, Serialize)]
pub struct ListResponse {
  pub items: Vec<Threshold>,
}

/// `GET /v1/thresholds`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
) -> ApiResult<Json<ListResponse>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let items = state.store.list_thresholds(user.user_id).await?;
  Ok(Json(ListResponse { items }))
}

#[derive(Debug, Deserialize)]
pub struct UpsertRequest {
  pub window_minutes: u32,
  pub threshold_pct:  f64,
}

/// `POST /v1/thresholds` — one row per window, upsert semantics.
pub async fn upsert<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<UpsertRequest>,
) -> ApiResult<Json<Threshold>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  if !state.config.threshold_windows.contains(&body.window_minutes) {
    return Err(ApiError::invalid_input(format!(
      "window_minutes must be one of {:?}",
      state.config.threshold_windows
    )));
  }

  let row = state
    .store
    .upsert_threshold(Threshold {
      user_id:        user.user_id,
      window_minutes: body.window_minutes,
      threshold_pct:  body.threshold_pct,
    })
    .await?;
  Ok(Json(row))
}
