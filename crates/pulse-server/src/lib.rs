//! HTTP surface for Pulse.
//!
//! Exposes an axum [`Router`] over any [`pulse_core::store::Store`]: auth,
//! watchlists, thresholds, events with reasons, feedback, reason reports
//! and revision history, evidence compare, briefs, and notifications.
//! Every non-2xx response carries the error envelope from [`error`].

pub mod auth;
pub mod error;
pub mod handlers;
pub mod request_id;

use std::{path::PathBuf, sync::Arc, time::Duration};

use auth::TokenStore;
use axum::{
  Router,
  http::HeaderValue,
  middleware,
  routing::{delete, get, patch, post},
};
pub use error::{ApiError, ApiResult};
use pulse_core::{
  catalog::Catalog,
  clock::{Clock, IdMinter},
  store::Store,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` plus
/// `PULSE_`-prefixed environment variables. Every field has a documented
/// default so an empty file boots a dev instance.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "defaults::host")]
  pub host: String,
  #[serde(default = "defaults::port")]
  pub port: u16,

  /// Hard upper bound on handler time; exceeded requests return 504.
  #[serde(default = "defaults::handler_timeout_secs")]
  pub handler_timeout_secs: u64,

  /// Ports for which `http://localhost:PORT` and `http://127.0.0.1:PORT`
  /// are both accepted as origins. Empty allows any origin (dev mode).
  #[serde(default)]
  pub cors_ports: Vec<u16>,

  #[serde(default = "defaults::token_ttl_secs")]
  pub token_ttl_secs: u64,

  /// JSON seed file for the symbol catalog; the embedded dev seed is used
  /// when absent.
  #[serde(default)]
  pub catalog_path: Option<PathBuf>,

  /// JSON host→reliability table; embedded defaults when absent.
  #[serde(default)]
  pub reputation_path: Option<PathBuf>,

  #[serde(default = "defaults::queue_capacity")]
  pub queue_capacity: usize,
  #[serde(default = "defaults::reason_workers")]
  pub reason_workers: usize,

  #[serde(default = "defaults::default_page_size")]
  pub default_page_size: usize,

  /// Windows accepted for threshold upserts and detection.
  #[serde(default = "defaults::threshold_windows")]
  pub threshold_windows: Vec<u32>,

  #[serde(default = "defaults::min_compare_items")]
  pub min_compare_items: usize,
  #[serde(default = "defaults::compare_timeout_secs")]
  pub compare_timeout_secs: u64,

  #[serde(default = "defaults::brief_interval_secs")]
  pub brief_interval_secs: u64,
  #[serde(default = "defaults::promotion_interval_secs")]
  pub promotion_interval_secs: u64,
}

mod defaults {
  pub fn host() -> String { "127.0.0.1".to_owned() }
  pub fn port() -> u16 { 8080 }
  pub fn handler_timeout_secs() -> u64 { 10 }
  pub fn token_ttl_secs() -> u64 { 3600 }
  pub fn queue_capacity() -> usize { 256 }
  pub fn reason_workers() -> usize { 4 }
  pub fn default_page_size() -> usize { 20 }
  pub fn threshold_windows() -> Vec<u32> { vec![5, 1440] }
  pub fn min_compare_items() -> usize { 2 }
  pub fn compare_timeout_secs() -> u64 { 5 }
  pub fn brief_interval_secs() -> u64 { 300 }
  pub fn promotion_interval_secs() -> u64 { 60 }
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host: defaults::host(),
      port: defaults::port(),
      handler_timeout_secs: defaults::handler_timeout_secs(),
      cors_ports: Vec::new(),
      token_ttl_secs: defaults::token_ttl_secs(),
      catalog_path: None,
      reputation_path: None,
      queue_capacity: defaults::queue_capacity(),
      reason_workers: defaults::reason_workers(),
      default_page_size: defaults::default_page_size(),
      threshold_windows: defaults::threshold_windows(),
      min_compare_items: defaults::min_compare_items(),
      compare_timeout_secs: defaults::compare_timeout_secs(),
      brief_interval_secs: defaults::brief_interval_secs(),
      promotion_interval_secs: defaults::promotion_interval_secs(),
    }
  }
}

impl ServerConfig {
  pub fn bind_addr(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }

  pub fn handler_timeout(&self) -> Duration {
    Duration::from_secs(self.handler_timeout_secs.max(1))
  }

  pub fn compare_timeout(&self) -> Duration {
    Duration::from_secs(self.compare_timeout_secs.max(1))
  }

  pub fn token_ttl(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.token_ttl_secs.max(60) as i64)
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:   Arc<S>,
  pub catalog: Arc<Catalog>,
  pub tokens:  Arc<TokenStore>,
  pub clock:   Arc<dyn Clock>,
  pub ids:     Arc<dyn IdMinter>,
  pub config:  Arc<ServerConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:   self.store.clone(),
      catalog: self.catalog.clone(),
      tokens:  self.tokens.clone(),
      clock:   self.clock.clone(),
      ids:     self.ids.clone(),
      config:  self.config.clone(),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full `/v1` router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: Store + Clone + Send + Sync + 'static,
{
  let cors = cors_layer(&state.config);

  Router::new()
    .route("/health", get(handlers::health::health))
    // Auth
    .route("/v1/auth/signup", post(handlers::auth::signup::<S>))
    .route("/v1/auth/login", post(handlers::auth::login::<S>))
    .route(
      "/v1/auth/me",
      get(handlers::auth::me::<S>)
        .patch(handlers::auth::update_profile::<S>),
    )
    // Catalog
    .route("/v1/symbols/search", get(handlers::symbols::search::<S>))
    // Watchlist
    .route(
      "/v1/watchlists/items",
      get(handlers::watchlist::list::<S>)
        .post(handlers::watchlist::create::<S>),
    )
    .route(
      "/v1/watchlists/items/{id}",
      delete(handlers::watchlist::remove::<S>),
    )
    // Thresholds
    .route(
      "/v1/thresholds",
      get(handlers::thresholds::list::<S>)
        .post(handlers::thresholds::upsert::<S>),
    )
    // Events & reasons
    .route("/v1/events", get(handlers::events::list::<S>))
    .route("/v1/events/{id}", get(handlers::events::detail::<S>))
    .route(
      "/v1/events/{id}/feedback",
      post(handlers::feedback::submit::<S>),
    )
    .route(
      "/v1/events/{id}/reason-reports",
      post(handlers::reports::submit::<S>),
    )
    .route(
      "/v1/events/{id}/reason-revisions",
      get(handlers::reports::revisions::<S>),
    )
    .route(
      "/v1/events/{id}/evidence-compare",
      get(handlers::compare::evidence_compare::<S>),
    )
    // Briefs
    .route("/v1/briefs", get(handlers::briefs::list::<S>))
    .route("/v1/briefs/{id}", get(handlers::briefs::detail::<S>))
    .route(
      "/v1/briefs/{id}/read",
      patch(handlers::briefs::mark_read::<S>),
    )
    // Notifications
    .route(
      "/v1/notifications",
      get(handlers::notifications::list::<S>),
    )
    .route(
      "/v1/notifications/{id}/read",
      patch(handlers::notifications::mark_read::<S>),
    )
    .fallback(handlers::not_found)
    .layer(middleware::from_fn_with_state(
      state.clone(),
      request_id::request_context::<S>,
    ))
    .layer(cors)
    .with_state(state)
}

/// CORS policy: with configured ports, `http://localhost:PORT` and
/// `http://127.0.0.1:PORT` are accepted as a pair for each; with none,
/// any origin is allowed (development).
fn cors_layer(config: &ServerConfig) -> CorsLayer {
  if config.cors_ports.is_empty() {
    return CorsLayer::new()
      .allow_origin(Any)
      .allow_methods(Any)
      .allow_headers(Any);
  }

  let origins: Vec<HeaderValue> = config
    .cors_ports
    .iter()
    .flat_map(|port| {
      [
        format!("http://localhost:{port}"),
        format!("http://127.0.0.1:{port}"),
      ]
    })
    .filter_map(|origin| origin.parse().ok())
    .collect();
  CorsLayer::new()
    .allow_origin(origins)
    .allow_methods(Any)
    .allow_headers(Any)
}

// ─── Shared test helpers ──────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod test_helpers {
  use std::sync::Arc;

  use chrono::TimeZone as _;
  use pulse_core::clock::{ManualClock, UuidMinter};
  use pulse_store_mem::MemStore;

  use super::*;

  pub(crate) fn manual_clock() -> ManualClock {
    // Monday, mid-session in New York.
    ManualClock::at(
      chrono::Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap(),
    )
  }

  pub(crate) fn make_state(
    clock: ManualClock,
  ) -> AppState<MemStore> {
    let clock: Arc<dyn Clock> = Arc::new(clock);
    let store = Arc::new(MemStore::with_services(
      clock.clone(),
      Arc::new(UuidMinter),
    ));
    let config = Arc::new(ServerConfig::default());
    AppState {
      store,
      catalog: Arc::new(Catalog::dev_seed()),
      tokens: Arc::new(TokenStore::new(config.token_ttl())),
      clock,
      ids: Arc::new(UuidMinter),
      config,
    }
  }
}

#[cfg(test)]
mod tests;
