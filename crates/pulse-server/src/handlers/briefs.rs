//! Brief inbox, detail, and read-marking.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use pulse_core::{
  brief::{Brief, BriefStatus},
  store::Store,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::CurrentUser, error::ApiResult};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub size: Option<usize>,
}

/// Inbox row: the brief without its items, plus derived flags.
#[derive(Debug, Serialize)]
pub struct BriefSummary {
  pub brief_id:         Uuid,
  pub brief_type:       pulse_core::brief::BriefType,
  pub title:            String,
  pub summary:          String,
  pub generated_at_utc: chrono::DateTime<chrono::Utc>,
  pub markets:          Vec<pulse_core::market::Market>,
  pub item_count:       usize,
  pub fallback_reason:  Option<pulse_core::brief::BriefFallback>,
  pub status:           BriefStatus,
  pub is_expired:       bool,
}

#[derive(Debug, Serialize)]
pub struct ListMeta {
  pub total:        usize,
  pub unread_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
  pub items: Vec<BriefSummary>,
  pub meta:  ListMeta,
}

fn summarize(brief: &Brief, now: chrono::DateTime<chrono::Utc>) -> BriefSummary {
  BriefSummary {
    brief_id:         brief.brief_id,
    brief_type:       brief.brief_type,
    title:            brief.title.clone(),
    summary:          brief.summary.clone(),
    generated_at_utc: brief.generated_at_utc,
    markets:          brief.markets.clone(),
    item_count:       brief.items.len(),
    fallback_reason:  brief.fallback_reason,
    status:           brief.status,
    is_expired:       brief.is_expired(now),
  }
}

/// `GET /v1/briefs?size=…` — expired rows still list, flagged.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let size = params
    .size
    .unwrap_or(state.config.default_page_size)
    .clamp(1, 50);
  let now = state.clock.now();
  let briefs = state.store.list_briefs(user.user_id, size).await?;

  let unread_count = briefs
    .iter()
    .filter(|b| b.status == BriefStatus::Unread)
    .count();
  let items: Vec<BriefSummary> =
    briefs.iter().map(|b| summarize(b, now)).collect();
  Ok(Json(ListResponse {
    meta: ListMeta { total: items.len(), unread_count },
    items,
  }))
}

/// `GET /v1/briefs/{id}` — 410 `brief_link_expired` once expired; a
/// successful fetch marks the brief read.
pub async fn detail<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(brief_id): Path<Uuid>,
) -> ApiResult<Json<Brief>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  // Expiry is checked by the store before any mutation.
  state.store.get_brief(user.user_id, brief_id).await?;
  let brief = state.store.mark_brief_read(user.user_id, brief_id).await?;
  Ok(Json(brief))
}

/// `PATCH /v1/briefs/{id}/read`
pub async fn mark_read<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(brief_id): Path<Uuid>,
) -> ApiResult<Json<Brief>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let brief = state.store.mark_brief_read(user.user_id, brief_id).await?;
  Ok(Json(brief))
}
