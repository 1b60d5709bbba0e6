//! Request-id tagging and the hard handler timeout.
//!
//! Every request is assigned an opaque id, available to the whole handler
//! call tree through a task-local (the error envelope reads it from there)
//! and echoed back in the `x-request-id` response header. The same
//! middleware enforces the hard upper timeout: handlers that exceed it
//! return 504 with `retryable: true`, and cancellation propagates to any
//! in-flight adapter calls by dropping the handler future.

use axum::{
  Json,
  extract::{Request, State},
  http::HeaderValue,
  middleware::Next,
  response::{IntoResponse, Response},
};
use pulse_core::store::Store;

use crate::{AppState, error::ApiError};

tokio::task_local! {
  static REQUEST_ID: String;
}

/// The current request's id, or `"unknown"` outside a request scope.
pub fn current_request_id() -> String {
  REQUEST_ID
    .try_with(|id| id.clone())
    .unwrap_or_else(|_| "unknown".to_owned())
}

/// Middleware: mint the id, scope it, run the handler under the deadline,
/// and stamp the response header.
pub async fn request_context<S>(
  State(state): State<AppState<S>>,
  request: Request,
  next: Next,
) -> Response
where
  S: Store + Clone + Send + Sync + 'static,
{
  let request_id = state.ids.mint().simple().to_string();
  let deadline = state.config.handler_timeout();

  let scoped = REQUEST_ID.scope(request_id.clone(), next.run(request));
  let mut response = match tokio::time::timeout(deadline, scoped).await {
    Ok(response) => response,
    Err(_) => {
      tracing::warn!(%request_id, "handler exceeded the hard timeout");
      let error = ApiError::GatewayTimeout;
      let body = error.envelope(&request_id);
      (axum::http::StatusCode::GATEWAY_TIMEOUT, Json(body)).into_response()
    }
  };

  if let Ok(value) = HeaderValue::from_str(&request_id) {
    response.headers_mut().insert("x-request-id", value);
  }
  response
}
