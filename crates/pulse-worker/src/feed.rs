//! Market-data tick intake.
//!
//! The real vendor integrations live outside this system; any feed that can
//! answer `GET {url}?since=…` with a JSON array of ticks drives detection.
//! The poller owns the [`Detector`] (detection state is single-owner) and
//! retries queue publishes that hit backpressure.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use pulse_core::{clock::Clock, market::Market, store::Store};
use serde::Deserialize;

use crate::{
  detector::{Detector, TickSample},
  queue::WorkQueue,
  runtime::ingest_tick,
};

#[derive(Debug, Clone)]
pub struct TickFeedConfig {
  pub url:           String,
  pub poll_interval: Duration,
  pub http_timeout:  Duration,
}

#[derive(Debug, Deserialize)]
struct WireTick {
  market: Market,
  symbol: String,
  at_utc: DateTime<Utc>,
  price:  f64,
}

/// Poll the feed forever, feeding ticks through the detector into the work
/// queue. Returns only if the HTTP client cannot be built.
pub fn spawn_tick_poller<S: Store + 'static>(
  store: Arc<S>,
  clock: Arc<dyn Clock>,
  mut detector: Detector,
  queue: WorkQueue,
  config: TickFeedConfig,
) -> tokio::task::JoinHandle<()> {
  tokio::spawn(async move {
    let client = match reqwest::Client::builder()
      .timeout(config.http_timeout)
      .build()
    {
      Ok(client) => client,
      Err(error) => {
        tracing::error!(%error, "tick feed client failed to build");
        return;
      }
    };

    let mut since = clock.now();
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
      ticker.tick().await;

      let ticks = match fetch_ticks(&client, &config.url, since).await {
        Ok(ticks) => ticks,
        Err(error) => {
          tracing::warn!(%error, "tick feed poll failed");
          continue;
        }
      };

      for tick in ticks {
        if tick.at_utc > since {
          since = tick.at_utc;
        }
        let sample = TickSample {
          market: tick.market,
          symbol: tick.symbol,
          at_utc: tick.at_utc,
          price:  tick.price,
        };
        if let Err(error) =
          ingest_tick(&*store, &mut detector, &queue, &sample).await
        {
          tracing::warn!(
            %error,
            symbol = %sample.symbol,
            "tick dropped"
          );
        }
      }

      detector.evict_stale(clock.now());
    }
  })
}

async fn fetch_ticks(
  client: &reqwest::Client,
  url: &str,
  since: DateTime<Utc>,
) -> Result<Vec<WireTick>, reqwest::Error> {
  client
    .get(url)
    .query(&[("since", since.to_rfc3339())])
    .send()
    .await?
    .error_for_status()?
    .json()
    .await
}

