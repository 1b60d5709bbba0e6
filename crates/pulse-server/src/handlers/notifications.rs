//! Notification list and read-marking.

use axum::{
  Json,
  extract::{Path, State},
};
use pulse_core::{notification::Notification, store::Store};
use serde::Serialize;
use uuid::Uuid;

use crate::{AppState, auth::CurrentUser, error::ApiResult};

#[derive(Debug, Serialize)]
pub struct ListResponse {
  pub items:        Vec<Notification>,
  pub unread_count: usize,
}

/// `GET /v1/notifications`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
) -> ApiResult<Json<ListResponse>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let (items, unread_count) =
    state.store.list_notifications(user.user_id).await?;
  Ok(Json(ListResponse { items, unread_count }))
}

/// `PATCH /v1/notifications/{id}/read`
pub async fn mark_read<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(notification_id): Path<Uuid>,
) -> ApiResult<Json<Notification>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let row = state
    .store
    .mark_notification_read(user.user_id, notification_id)
    .await?;
  Ok(Json(row))
}
