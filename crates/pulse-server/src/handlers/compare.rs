//! The evidence-compare endpoint.

use axum::{
  Json,
  extract::{Path, State},
};
use pulse_core::store::Store;
use pulse_reason::compare::{
  CompareConfig, ComparePayload, build_compare, permission_denied_payload,
};
use uuid::Uuid;

use crate::{
  AppState,
  auth::CurrentUser,
  error::{ApiError, ApiResult},
};

/// `GET /v1/events/{id}/evidence-compare`
///
/// Always 200 with a payload; thin or one-sided evidence comes back as
/// `compare_unavailable` with a fallback reason, and a caller who does not
/// own the event gets `permission_denied` rather than a 403 so the card can
/// still render. Classification that exceeds its deadline maps to 504
/// `compare_upstream_timeout`.
pub async fn evidence_compare<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(event_id): Path<Uuid>,
) -> ApiResult<Json<ComparePayload>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let now = state.clock.now();
  let config = CompareConfig {
    min_compare_items: state.config.min_compare_items,
    ..CompareConfig::default()
  };

  let build = async {
    let event = state
      .store
      .get_event(event_id)
      .await?
      .ok_or_else(|| ApiError::NotFound(format!("event {event_id}")))?;
    if event.user_id != user.user_id {
      return Ok(permission_denied_payload(event_id, now));
    }
    let reasons = state.store.list_reasons(event_id).await?;
    Ok::<_, ApiError>(build_compare(&event, &reasons, &config, now))
  };

  let payload = tokio::time::timeout(state.config.compare_timeout(), build)
    .await
    .map_err(|_| ApiError::CompareUpstreamTimeout)??;
  Ok(Json(payload))
}
