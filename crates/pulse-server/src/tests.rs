//! Integration tests: the real router over `MemStore`, driven with
//! `tower::ServiceExt::oneshot`.

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use chrono::{Duration, TimeZone as _, Utc};
use pulse_core::{
  brief::{Brief, BriefStatus, BriefType},
  clock::Clock as _,
  event::{EventReason, PriceEvent, ReasonType},
  market::{Market, SessionLabel},
  notification::Channel,
  store::{NewNotification, Store as _},
};
use pulse_store_mem::MemStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{AppState, test_helpers::{make_state, manual_clock}};

async fn request(
  state: AppState<MemStore>,
  method: &str,
  uri: &str,
  token: Option<&str>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(token) = token {
    builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }
  let request = match body {
    Some(value) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(value.to_string())),
    None => builder.body(Body::empty()),
  }
  .unwrap();

  let response = crate::router(state).oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

/// Sign up a fresh user and return `(user_id, token)`.
async fn signup(state: &AppState<MemStore>, email: &str) -> (Uuid, String) {
  let (status, body) = request(
    state.clone(),
    "POST",
    "/v1/auth/signup",
    None,
    Some(json!({ "email": email, "password": "hunter2hunter2" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "signup failed: {body}");
  (
    body["user_id"].as_str().unwrap().parse().unwrap(),
    body["access_token"].as_str().unwrap().to_owned(),
  )
}

fn seed_event(user_id: Uuid, symbol: &str, change_pct: f64) -> PriceEvent {
  PriceEvent {
    event_id: Uuid::new_v4(),
    market: Market::Us,
    symbol: symbol.into(),
    change_pct,
    window_minutes: 5,
    detected_at_utc: Utc.with_ymd_and_hms(2024, 3, 4, 14, 45, 0).unwrap(),
    exchange_timezone: "America/New_York".into(),
    session_label: SessionLabel::Regular,
    sequence: 1,
    user_id,
  }
}

fn seed_reason(event_id: Uuid, rank: u8, summary: &str) -> EventReason {
  EventReason {
    reason_id: Uuid::new_v4(),
    event_id,
    rank,
    reason_type: ReasonType::News,
    confidence_score: 0.8,
    summary: summary.into(),
    source_url: format!("https://news.example/{event_id}/{rank}"),
    published_at: Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap(),
    breakdown: None,
    explanation_text: "established source, strong topical match".into(),
  }
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn signup_login_me_round_trip() {
  let state = make_state(manual_clock());
  let (user_id, _) = signup(&state, "ada@example.com").await;

  let (status, body) = request(
    state.clone(),
    "POST",
    "/v1/auth/login",
    None,
    Some(json!({ "email": "ADA@example.com", "password": "hunter2hunter2" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let token = body["access_token"].as_str().unwrap().to_owned();

  let (status, body) =
    request(state, "GET", "/v1/auth/me", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["user_id"].as_str().unwrap(), user_id.to_string());
  assert_eq!(body["email"], "ada@example.com");
  assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_email_maps_to_conflict_envelope() {
  let state = make_state(manual_clock());
  signup(&state, "ada@example.com").await;

  let (status, body) = request(
    state,
    "POST",
    "/v1/auth/signup",
    None,
    Some(json!({ "email": "Ada@Example.com", "password": "hunter2hunter2" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["code"], "email_already_exists");
  assert_eq!(body["retryable"], false);
  assert!(body["request_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
  let state = make_state(manual_clock());
  signup(&state, "ada@example.com").await;

  let (status, body) = request(
    state,
    "POST",
    "/v1/auth/login",
    None,
    Some(json!({ "email": "ada@example.com", "password": "wrongwrongwrong" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["code"], "invalid_credentials");
}

#[tokio::test]
async fn missing_token_is_rejected() {
  let state = make_state(manual_clock());
  let (status, body) =
    request(state, "GET", "/v1/auth/me", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["code"], "invalid_token");
}

#[tokio::test]
async fn expired_token_is_rejected() {
  let clock = manual_clock();
  let state = make_state(clock.clone());
  let (_, token) = signup(&state, "ada@example.com").await;

  clock.advance(Duration::hours(2));
  let (status, body) =
    request(state, "GET", "/v1/auth/me", Some(&token), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["code"], "invalid_token");
}

// ─── Symbols ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn symbol_search_returns_catalog_matches() {
  let state = make_state(manual_clock());
  let (_, token) = signup(&state, "ada@example.com").await;

  let (status, body) = request(
    state.clone(),
    "GET",
    "/v1/symbols/search?q=NVD&market=US",
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["items"][0]["ticker"], "NVDA");
  assert_eq!(body["catalog_version"], "dev-seed-1");

  let (status, body) = request(
    state,
    "GET",
    "/v1/symbols/search?q=a&market=US",
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "invalid_input");
}

// ─── Watchlist ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn watchlist_create_duplicate_delete_recreate() {
  let state = make_state(manual_clock());
  let (_, token) = signup(&state, "ada@example.com").await;
  let payload = json!({ "symbol": "aapl", "market": "US" });

  let (status, body) = request(
    state.clone(),
    "POST",
    "/v1/watchlists/items",
    Some(&token),
    Some(payload.clone()),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["is_duplicate"], false);
  assert_eq!(body["item"]["ticker"], "AAPL");
  let item_id = body["item"]["item_id"].as_str().unwrap().to_owned();

  let (status, body) = request(
    state.clone(),
    "POST",
    "/v1/watchlists/items",
    Some(&token),
    Some(payload.clone()),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["is_duplicate"], true);

  let (status, _) = request(
    state.clone(),
    "DELETE",
    &format!("/v1/watchlists/items/{item_id}"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, body) = request(
    state.clone(),
    "GET",
    "/v1/watchlists/items",
    Some(&token),
    None,
  )
  .await;
  assert_eq!(body["total"], 0);

  // Re-adding after delete is not a duplicate.
  let (status, body) = request(
    state,
    "POST",
    "/v1/watchlists/items",
    Some(&token),
    Some(payload),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["is_duplicate"], false);
}

#[tokio::test]
async fn unknown_symbols_are_rejected_against_the_catalog() {
  let state = make_state(manual_clock());
  let (_, token) = signup(&state, "ada@example.com").await;

  let (status, body) = request(
    state,
    "POST",
    "/v1/watchlists/items",
    Some(&token),
    Some(json!({ "symbol": "ZZZZ", "market": "US" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "invalid_input");
}

// ─── Thresholds ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn threshold_upsert_then_list_shows_one_row() {
  let state = make_state(manual_clock());
  let (_, token) = signup(&state, "ada@example.com").await;

  for pct in [3.0, 4.5] {
    let (status, _) = request(
      state.clone(),
      "POST",
      "/v1/thresholds",
      Some(&token),
      Some(json!({ "window_minutes": 5, "threshold_pct": pct })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
  }

  let (_, body) =
    request(state.clone(), "GET", "/v1/thresholds", Some(&token), None).await;
  let items = body["items"].as_array().unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0]["threshold_pct"], 4.5);

  let (status, body) = request(
    state,
    "POST",
    "/v1/thresholds",
    Some(&token),
    Some(json!({ "window_minutes": 7, "threshold_pct": 3.0 })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "invalid_input");
}

// ─── Events ──────────────────────────────────────────────────────────────────

async fn seed_watched_event(
  state: &AppState<MemStore>,
  user_id: Uuid,
  token: &str,
  reasons: usize,
) -> (Uuid, Vec<Uuid>) {
  request(
    state.clone(),
    "POST",
    "/v1/watchlists/items",
    Some(token),
    Some(json!({ "symbol": "AAPL", "market": "US" })),
  )
  .await;

  let event = seed_event(user_id, "AAPL", 4.2);
  let event_id = event.event_id;
  let rows: Vec<EventReason> = (1..=reasons as u8)
    .map(|rank| seed_reason(event_id, rank, "Record quarter drives surge"))
    .collect();
  let reason_ids = rows.iter().map(|r| r.reason_id).collect();
  state
    .store
    .insert_event_with_reasons(event, rows)
    .await
    .unwrap();
  (event_id, reason_ids)
}

#[tokio::test]
async fn events_list_and_detail_carry_reasons_and_status() {
  let state = make_state(manual_clock());
  let (user_id, token) = signup(&state, "ada@example.com").await;
  let (event_id, _) = seed_watched_event(&state, user_id, &token, 2).await;

  let (status, body) =
    request(state.clone(), "GET", "/v1/events", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  let items = body["items"].as_array().unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0]["reason_status"], "verified");

  let (status, body) = request(
    state,
    "GET",
    &format!("/v1/events/{event_id}"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["change_pct"], 4.2);
  assert_eq!(body["session_label"], "regular");
  assert_eq!(body["reasons"].as_array().unwrap().len(), 2);
  assert_eq!(body["reasons"][0]["rank"], 1);
  assert!(body["explanation_text"].as_str().is_some());
  assert!(body["revision_hint"].is_null());
}

#[tokio::test]
async fn another_users_event_detail_is_forbidden() {
  let state = make_state(manual_clock());
  let (owner_id, owner_token) = signup(&state, "owner@example.com").await;
  let (event_id, _) =
    seed_watched_event(&state, owner_id, &owner_token, 1).await;

  let (_, other_token) = signup(&state, "other@example.com").await;
  let (status, body) = request(
    state,
    "GET",
    &format!("/v1/events/{event_id}"),
    Some(&other_token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn events_outside_the_watchlist_are_not_listed() {
  let state = make_state(manual_clock());
  let (user_id, token) = signup(&state, "ada@example.com").await;

  // An event for a symbol the user does not watch.
  state
    .store
    .insert_event_with_reasons(seed_event(user_id, "MSFT", 3.5), vec![])
    .await
    .unwrap();

  let (_, body) =
    request(state, "GET", "/v1/events", Some(&token), None).await;
  assert!(body["items"].as_array().unwrap().is_empty());
}

// ─── Feedback ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn feedback_upsert_reports_overwritten_on_repeat() {
  let state = make_state(manual_clock());
  let (user_id, token) = signup(&state, "ada@example.com").await;
  let (event_id, reason_ids) =
    seed_watched_event(&state, user_id, &token, 1).await;

  let payload =
    json!({ "reason_id": reason_ids[0], "vote": "helpful" });
  let (status, body) = request(
    state.clone(),
    "POST",
    &format!("/v1/events/{event_id}/feedback"),
    Some(&token),
    Some(payload),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["overwritten"], false);

  let (status, body) = request(
    state,
    "POST",
    &format!("/v1/events/{event_id}/feedback"),
    Some(&token),
    Some(json!({ "reason_id": reason_ids[0], "vote": "not_helpful" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["overwritten"], true);
  assert_eq!(body["vote"], "not_helpful");
}

// ─── Reports & revisions ─────────────────────────────────────────────────────

#[tokio::test]
async fn second_open_report_returns_duplicate_reason_report() {
  let state = make_state(manual_clock());
  let (user_id, token) = signup(&state, "ada@example.com").await;
  let (event_id, reason_ids) =
    seed_watched_event(&state, user_id, &token, 1).await;

  let payload = json!({
    "reason_id": reason_ids[0],
    "report_type": "inaccurate_reason",
    "note": "names the wrong company",
  });
  let (status, body) = request(
    state.clone(),
    "POST",
    &format!("/v1/events/{event_id}/reason-reports"),
    Some(&token),
    Some(payload.clone()),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["status"], "received");

  let (status, body) = request(
    state,
    "POST",
    &format!("/v1/events/{event_id}/reason-reports"),
    Some(&token),
    Some(payload),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "duplicate_reason_report");
}

#[tokio::test]
async fn revision_history_is_a_distinct_404_without_reports() {
  let state = make_state(manual_clock());
  let (user_id, token) = signup(&state, "ada@example.com").await;
  let (event_id, _) = seed_watched_event(&state, user_id, &token, 1).await;

  let (status, body) = request(
    state,
    "GET",
    &format!("/v1/events/{event_id}/reason-revisions"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["code"], "reason_revision_history_not_found");
}

#[tokio::test]
async fn report_then_history_contains_received_transition() {
  let state = make_state(manual_clock());
  let (user_id, token) = signup(&state, "ada@example.com").await;
  let (event_id, reason_ids) =
    seed_watched_event(&state, user_id, &token, 1).await;

  request(
    state.clone(),
    "POST",
    &format!("/v1/events/{event_id}/reason-reports"),
    Some(&token),
    Some(json!({
      "reason_id": reason_ids[0],
      "report_type": "wrong_source",
    })),
  )
  .await;

  let (status, body) = request(
    state,
    "GET",
    &format!("/v1/events/{event_id}/reason-revisions"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["meta"]["has_revision_history"], false);
  assert_eq!(body["meta"]["latest_status"], "received");
  let transitions = body["status_transitions"].as_array().unwrap();
  assert!(
    transitions
      .iter()
      .any(|t| t["to_status"] == "received" && t["from_status"].is_null())
  );
}

// ─── Evidence compare ────────────────────────────────────────────────────────

#[tokio::test]
async fn compare_with_only_uncertain_items_is_axis_imbalance() {
  let state = make_state(manual_clock());
  let (user_id, token) = signup(&state, "ada@example.com").await;

  // Two reasons with no polarity terms at all.
  let event = seed_event(user_id, "MSFT", 4.0);
  let event_id = event.event_id;
  let neutral: Vec<EventReason> = (1..=2)
    .map(|rank| seed_reason(event_id, rank, "company schedules meeting"))
    .collect();
  state
    .store
    .insert_event_with_reasons(event, neutral)
    .await
    .unwrap();

  let (status, body) = request(
    state,
    "GET",
    &format!("/v1/events/{event_id}/evidence-compare"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "compare_unavailable");
  assert_eq!(body["fallback_reason"], "axis_imbalance");
  assert!(!body["bias_warning"].as_str().unwrap().is_empty());
  assert!(body["positive"].as_array().unwrap().is_empty());
  assert!(body["negative"].as_array().unwrap().is_empty());
  assert_eq!(body["uncertain"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn compare_on_anothers_event_is_permission_denied_payload() {
  let state = make_state(manual_clock());
  let (owner_id, owner_token) = signup(&state, "owner@example.com").await;
  let (event_id, _) =
    seed_watched_event(&state, owner_id, &owner_token, 2).await;

  let (_, other_token) = signup(&state, "other@example.com").await;
  let (status, body) = request(
    state,
    "GET",
    &format!("/v1/events/{event_id}/evidence-compare"),
    Some(&other_token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "compare_unavailable");
  assert_eq!(body["fallback_reason"], "permission_denied");
  assert!(body["uncertain"].as_array().unwrap().is_empty());
}

// ─── Briefs ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn expired_brief_detail_is_410_but_still_lists() {
  let clock = manual_clock();
  let state = make_state(clock.clone());
  let (user_id, token) = signup(&state, "ada@example.com").await;

  let brief = Brief {
    brief_id: Uuid::new_v4(),
    user_id,
    brief_type: BriefType::PostClose,
    title: "Post-close brief".into(),
    summary: "1 notable move across US".into(),
    generated_at_utc: clock.now(),
    markets: vec![Market::Us],
    items: vec![],
    fallback_reason: None,
    status: BriefStatus::Unread,
    expires_at_utc: Some(clock.now() + Duration::hours(24)),
  };
  let brief_id = brief.brief_id;
  state.store.upsert_brief(brief).await.unwrap();

  let (status, body) = request(
    state.clone(),
    "GET",
    &format!("/v1/briefs/{brief_id}"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["status"], "read");

  clock.advance(Duration::hours(25));
  let (status, body) = request(
    state.clone(),
    "GET",
    &format!("/v1/briefs/{brief_id}"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::GONE);
  assert_eq!(body["code"], "brief_link_expired");

  let (_, body) =
    request(state, "GET", "/v1/briefs", Some(&token), None).await;
  let items = body["items"].as_array().unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0]["is_expired"], true);
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[tokio::test]
async fn notifications_list_and_mark_read() {
  let state = make_state(manual_clock());
  let (user_id, token) = signup(&state, "ada@example.com").await;

  for _ in 0..2 {
    state
      .store
      .record_notification(NewNotification {
        user_id,
        event_id: Uuid::new_v4(),
        channel: Channel::InApp,
        message: "AAPL (US) moved +4.20% in 5m".into(),
        delta: None,
      })
      .await
      .unwrap();
  }

  let (status, body) =
    request(state.clone(), "GET", "/v1/notifications", Some(&token), None)
      .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["unread_count"], 2);
  let first_id = body["items"][0]["notification_id"].as_str().unwrap();

  let (status, body) = request(
    state.clone(),
    "PATCH",
    &format!("/v1/notifications/{first_id}/read"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "read");

  let (_, body) =
    request(state, "GET", "/v1/notifications", Some(&token), None).await;
  assert_eq!(body["unread_count"], 1);
}

// ─── Envelope & plumbing ─────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_routes_carry_the_error_envelope() {
  let state = make_state(manual_clock());
  let (status, body) =
    request(state, "GET", "/v1/definitely-not-a-route", None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["code"], "not_found");
  assert_eq!(body["retryable"], false);
  assert!(body["details"].is_object());
  assert!(body["request_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn responses_carry_a_request_id_header() {
  let state = make_state(manual_clock());
  let response = crate::router(state)
    .oneshot(
      Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap(),
    )
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  assert!(response.headers().contains_key("x-request-id"));
}
