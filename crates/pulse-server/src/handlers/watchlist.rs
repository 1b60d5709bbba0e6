//! Watchlist CRUD.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use pulse_core::{
  market::Market,
  store::Store,
  watchlist::{NewWatchlistItem, WatchlistItem},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::CurrentUser,
  error::{ApiError, ApiResult},
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub page: usize,
  pub size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
  pub items: Vec<WatchlistItem>,
  pub page:  usize,
  pub size:  usize,
  pub total: usize,
}

/// `GET /v1/watchlists/items?page=…&size=…`
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
    .clamp(1, 100);
  let (items, total) = state
    .store
    .list_watchlist(user.user_id, params.page, size)
    .await?;
  Ok(Json(ListResponse { items, page: params.page, size, total }))
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
  pub symbol: String,
  pub market: String,
}

#[derive(Debug, Serialize)]
pub struct CreateResponse {
  pub item:         WatchlistItem,
  pub is_duplicate: bool,
}

/// `POST /v1/watchlists/items`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<CreateRequest>,
) -> ApiResult<(StatusCode, Json<CreateResponse>)>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let market = Market::parse(&body.market)
    .ok_or_else(|| ApiError::invalid_input("market must be KR or US"))?;
  let record = state.catalog.require_watchable(market, &body.symbol)?;

  let (item, is_duplicate) = state
    .store
    .add_watchlist_item(NewWatchlistItem {
      user_id: user.user_id,
      market,
      ticker: record.ticker.clone(),
    })
    .await?;

  let status = if is_duplicate {
    StatusCode::OK
  } else {
    StatusCode::CREATED
  };
  Ok((status, Json(CreateResponse { item, is_duplicate })))
}

/// `DELETE /v1/watchlists/items/{id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(item_id): Path<Uuid>,
) -> ApiResult<StatusCode>
where
  S: Store + Clone + Send + Sync + 'static,
{
  state
    .store
    .remove_watchlist_item(user.user_id, item_id)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}
