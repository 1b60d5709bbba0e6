//! Catalog symbol search.

use axum::{
  Json,
  extract::{Query, State},
};
use pulse_core::{catalog::SymbolRecord, market::Market, store::Store};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::CurrentUser,
  error::{ApiError, ApiResult},
};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  pub q:      String,
  pub market: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
  pub items:           Vec<SymbolRecord>,
  pub catalog_version: String,
}

/// `GET /v1/symbols/search?q=…&market=…`
pub async fn search<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
  Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let market = Market::parse(&params.market)
    .ok_or_else(|| ApiError::invalid_input("market must be KR or US"))?;

  let items = state
    .catalog
    .search(&params.q, market)?
    .into_iter()
    .cloned()
    .collect();
  Ok(Json(SearchResponse {
    items,
    catalog_version: state.catalog.version().to_owned(),
  }))
}
