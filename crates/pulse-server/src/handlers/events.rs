//! Event listing and detail.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use pulse_core::{
  event::{EventReason, PriceEvent, ReasonStatus, reason_status},
  market::Market,
  store::{EventQuery, Store},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::CurrentUser,
  error::{ApiError, ApiResult},
};

// ─── Wire shapes ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct EventPayload {
  #[serde(flatten)]
  pub event:         PriceEvent,
  pub reason_status: ReasonStatus,
  pub reasons:       Vec<EventReason>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
  pub items:       Vec<EventPayload>,
  pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
  #[serde(flatten)]
  pub event:         PriceEvent,
  pub reason_status: ReasonStatus,
  pub reasons:       Vec<EventReason>,
  /// Top reason's one-line explanation, when present.
  pub explanation_text: Option<String>,
  /// Non-empty when reports or revisions exist for the event.
  pub revision_hint:    Option<String>,
}

// ─── Cursor ──────────────────────────────────────────────────────────────────

fn encode_cursor(at: DateTime<Utc>, id: Uuid) -> String {
  URL_SAFE_NO_PAD.encode(format!("{}|{}", at.to_rfc3339(), id))
}

fn decode_cursor(cursor: &str) -> ApiResult<(DateTime<Utc>, Uuid)> {
  let invalid = || ApiError::invalid_input("cursor is not valid");
  let bytes = URL_SAFE_NO_PAD.decode(cursor).map_err(|_| invalid())?;
  let text = String::from_utf8(bytes).map_err(|_| invalid())?;
  let (at, id) = text.split_once('|').ok_or_else(invalid)?;
  Ok((
    DateTime::parse_from_rfc3339(at)
      .map_err(|_| invalid())?
      .with_timezone(&Utc),
    Uuid::parse_str(id).map_err(|_| invalid())?,
  ))
}

// ─── Handlers ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub size:   Option<usize>,
  pub cursor: Option<String>,
  pub symbol: Option<String>,
  pub market: Option<String>,
  pub from:   Option<DateTime<Utc>>,
  pub to:     Option<DateTime<Utc>>,
}

/// `GET /v1/events` — the caller's watchlist events from the last 30 days,
/// descending by detection time, cursor-paged.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let market = params
    .market
    .as_deref()
    .map(|m| {
      Market::parse(m)
        .ok_or_else(|| ApiError::invalid_input("market must be KR or US"))
    })
    .transpose()?;

  let (watchlist, _) =
    state.store.list_watchlist(user.user_id, 0, 10_000).await?;
  if watchlist.is_empty() {
    return Ok(Json(ListResponse { items: Vec::new(), next_cursor: None }));
  }
  let keys: Vec<(Market, String)> = watchlist
    .iter()
    .map(|item| (item.market, item.ticker.clone()))
    .collect();

  let size = params
    .size
    .unwrap_or(state.config.default_page_size)
    .clamp(1, 100);
  let before = params
    .cursor
    .as_deref()
    .map(decode_cursor)
    .transpose()?;

  let query = EventQuery {
    keys: Some(keys),
    market,
    symbol: params
      .symbol
      .map(|s| s.trim().to_ascii_uppercase())
      .filter(|s| !s.is_empty()),
    from_utc: params.from,
    to_utc: params.to,
    before,
    limit: Some(size),
    ..EventQuery::recent()
  };
  let events = state.store.query_events(&query).await?;

  let next_cursor = (events.len() == size)
    .then(|| events.last())
    .flatten()
    .map(|last| encode_cursor(last.detected_at_utc, last.event_id));

  let mut items = Vec::with_capacity(events.len());
  for event in events {
    let reasons = state.store.list_reasons(event.event_id).await?;
    items.push(EventPayload {
      reason_status: reason_status(&reasons),
      reasons,
      event,
    });
  }
  Ok(Json(ListResponse { items, next_cursor }))
}

/// `GET /v1/events/{id}`
pub async fn detail<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(event_id): Path<Uuid>,
) -> ApiResult<Json<DetailResponse>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let event = state
    .store
    .get_event(event_id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("event {event_id}")))?;
  if event.user_id != user.user_id {
    return Err(ApiError::Forbidden);
  }

  let reasons = state.store.list_reasons(event_id).await?;
  let revision_hint = revision_hint(&state, event_id).await?;

  Ok(Json(DetailResponse {
    reason_status: reason_status(&reasons),
    explanation_text: reasons
      .first()
      .map(|r| r.explanation_text.clone())
      .filter(|t| !t.is_empty()),
    revision_hint,
    reasons,
    event,
  }))
}

async fn revision_hint<S>(
  state: &AppState<S>,
  event_id: Uuid,
) -> ApiResult<Option<String>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let reports = state.store.list_reports(event_id).await?;
  if reports.is_empty() {
    return Ok(None);
  }

  let open = reports.iter().filter(|r| r.status.is_open()).count();
  let hint = if open > 0 {
    format!(
      "{open} report{} under review; confidence may be revised",
      if open == 1 { "" } else { "s" }
    )
  } else {
    "reports on this event have been resolved; confidence reflects the \
     latest review"
      .to_owned()
  };
  Ok(Some(hint))
}
