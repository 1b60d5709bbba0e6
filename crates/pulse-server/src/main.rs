//! pulse-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), builds the
//! in-memory store, catalog, reason engine, and workers, and serves the
//! JSON API over HTTP.
//!
//! # Password hash generation
//!
//! To generate an argon2 PHC string for seeding fixtures:
//!
//! ```
//! cargo run -p pulse-server -- --hash-password
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use pulse_core::{
  catalog::Catalog,
  clock::{Clock, IdMinter, SystemClock, UuidMinter},
};
use pulse_reason::{
  ReasonEngine,
  adapter::SourceAdapter,
  engine::EngineConfig,
  http::{FeedConfig, JsonFeedAdapter},
  ratelimit::RateLimiter,
  score::ReputationTable,
};
use pulse_server::{AppState, ServerConfig, auth::TokenStore};
use pulse_store_mem::MemStore;
use pulse_worker::{
  brief::BriefConfig,
  detector::{Detector, DetectorConfig},
  feed::{TickFeedConfig, spawn_tick_poller},
  notifier::{Notifier, NotifierConfig},
  queue::WorkQueue,
  runtime,
};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Pulse event/reason API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password_from_stdin()?;
    let hash = pulse_server::auth::hash_password(&password)
      .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{hash}");
    return Ok(());
  }

  // Load configuration: file (optional) layered under env overrides.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("PULSE"))
    .build()
    .context("failed to read configuration")?;
  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  let server_cfg = Arc::new(server_cfg);

  // Catalog and reputation table: JSON files when configured, embedded
  // defaults otherwise.
  let catalog = match &server_cfg.catalog_path {
    None => Catalog::dev_seed(),
    Some(path) => {
      let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog at {path:?}"))?;
      Catalog::from_json(&json, format!("file:{}", path.display()))
        .context("failed to parse catalog seed")?
    }
  };
  let reputation = match &server_cfg.reputation_path {
    None => ReputationTable::default(),
    Some(path) => {
      let json = std::fs::read_to_string(path).with_context(|| {
        format!("failed to read reputation table at {path:?}")
      })?;
      ReputationTable::from_json(&json)
        .context("failed to parse reputation table")?
    }
  };

  let clock: Arc<dyn Clock> = Arc::new(SystemClock);
  let ids: Arc<dyn IdMinter> = Arc::new(UuidMinter);
  let store = Arc::new(MemStore::with_services(clock.clone(), ids.clone()));
  let catalog = Arc::new(catalog);

  // Source adapters. Feed URLs come from the environment so dev instances
  // run fine with none configured.
  let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
  for (name, env_key, default_type) in [
    ("filings", "PULSE_FILINGS_FEED_URL", pulse_core::event::ReasonType::Filing),
    ("news", "PULSE_NEWS_FEED_URL", pulse_core::event::ReasonType::News),
  ] {
    if let Ok(base_url) = std::env::var(env_key) {
      let adapter = JsonFeedAdapter::new(FeedConfig {
        name: name.to_owned(),
        base_url,
        default_type,
        timeout: std::time::Duration::from_secs(3),
      })
      .map_err(|e| anyhow::anyhow!("building {name} adapter: {e}"))?;
      adapters.push(Arc::new(adapter));
    }
  }
  if adapters.is_empty() {
    tracing::warn!(
      "no feed adapters configured; events will persist without reasons"
    );
  }

  let engine = ReasonEngine::new(
    store.clone(),
    catalog.clone(),
    adapters,
    Arc::new(RateLimiter::new(4, 2.0)),
    Arc::new(reputation),
    ids.clone(),
    EngineConfig::default(),
  );

  // Workers: the reason pool draining the detection queue, plus tickers.
  let (queue, receiver) = WorkQueue::bounded(server_cfg.queue_capacity);
  let notifier = Arc::new(tokio::sync::Mutex::new(Notifier::new(
    NotifierConfig::default(),
  )));
  runtime::spawn_reason_workers(
    receiver,
    engine,
    store.clone(),
    notifier.clone(),
    server_cfg.reason_workers,
  );
  runtime::spawn_promotion_ticker(
    store.clone(),
    clock.clone(),
    notifier,
    std::time::Duration::from_secs(server_cfg.promotion_interval_secs),
  );
  runtime::spawn_brief_ticker(
    store.clone(),
    clock.clone(),
    ids.clone(),
    BriefConfig::default(),
    std::time::Duration::from_secs(server_cfg.brief_interval_secs),
  );
  // Tick intake: any JSON feed drives detection; without one, the API
  // still serves but no events are produced.
  match std::env::var("PULSE_TICK_FEED_URL") {
    Ok(url) => {
      spawn_tick_poller(
        store.clone(),
        clock.clone(),
        Detector::new(DetectorConfig::default(), ids.clone()),
        queue,
        TickFeedConfig {
          url,
          poll_interval: std::time::Duration::from_secs(5),
          http_timeout:  std::time::Duration::from_secs(3),
        },
      );
    }
    Err(_) => {
      tracing::warn!(
        "PULSE_TICK_FEED_URL not set; detection is idle this run"
      );
    }
  }

  let state = AppState {
    store,
    catalog,
    tokens: Arc::new(TokenStore::new(server_cfg.token_ttl())),
    clock,
    ids,
    config: server_cfg.clone(),
  };
  let app = pulse_server::router(state);

  let address = server_cfg.bind_addr();
  tracing::info!("listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin (echoed; for local fixture seeding only).
fn read_password_from_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead as _, Write as _};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_owned())
}
