//! Task wiring: the reason worker pool and the periodic tickers.
//!
//! The core runs as one process with three kinds of cooperating workers:
//! HTTP handlers (owned by the server crate), a fixed-size pool draining
//! the detection queue into the reason engine, and periodic tickers for
//! brief generation and stale-unread promotion. The store mutex is never
//! held across an adapter call — all engine I/O happens on owned snapshots.

use std::{future::Future, pin::Pin, sync::Arc};

use pulse_core::{
  brief::BriefType,
  clock::{Clock, IdMinter},
  market::{Market, SessionLabel, classify_session},
  store::Store,
};
use pulse_reason::{ReasonEngine, engine::AttachOutcome};
use tokio::{
  sync::{Mutex, mpsc},
  task::JoinHandle,
};

use crate::{
  brief::{BriefBuilder, BriefConfig},
  detector::{Detector, Subscriber, TickSample},
  notifier::Notifier,
  queue::{DetectedWork, WorkQueue},
};

/// Spawn `worker_count` tasks draining the queue: each event gets its
/// reasons attached and committed, then flows to the notifier.
pub fn spawn_reason_workers<S: Store + 'static>(
  receiver: mpsc::Receiver<DetectedWork>,
  engine: ReasonEngine<S>,
  store: Arc<S>,
  notifier: Arc<Mutex<Notifier>>,
  worker_count: usize,
) -> Vec<JoinHandle<()>> {
  let receiver = Arc::new(Mutex::new(receiver));
  (0..worker_count.max(1))
    .map(|worker| {
      let receiver = receiver.clone();
      let engine = engine.clone();
      let store = store.clone();
      let notifier = notifier.clone();
      tokio::spawn(async move {
        run_reason_worker(worker, receiver, engine, store, notifier).await;
      })
    })
    .collect()
}

async fn run_reason_worker<S: Store + 'static>(
  worker: usize,
  receiver: Arc<Mutex<mpsc::Receiver<DetectedWork>>>,
  engine: ReasonEngine<S>,
  store: Arc<S>,
  notifier: Arc<Mutex<Notifier>>,
) {
  loop {
    let work = { receiver.lock().await.recv().await };
    let Some(work) = work else { break };

    let event_id = work.event.event_id;
    let attach_fut: Pin<
      Box<dyn Future<Output = pulse_core::Result<AttachOutcome>> + Send + '_>,
    > = Box::pin(engine.attach_and_commit(work.event));
    match attach_fut.await {
      Err(error) => {
        tracing::error!(worker, %event_id, %error, "reason pipeline failed");
      }
      Ok(outcome) => {
        let result = notifier
          .lock()
          .await
          .dispatch(store.as_ref(), &outcome.event, work.realert)
          .await;
        if let Err(error) = result {
          tracing::error!(worker, %event_id, %error, "notification dispatch failed");
        }
      }
    }
  }
  tracing::debug!(worker, "reason worker stopped");
}

/// Feed one tick through the detector and publish detections.
///
/// Subscribers and their per-window thresholds are resolved from the store
/// *before* detection so the detector itself stays synchronous. A full
/// queue surfaces as `Backpressure` to the caller, which owns the retry.
pub async fn ingest_tick<S: Store>(
  store: &S,
  detector: &mut Detector,
  queue: &WorkQueue,
  tick: &TickSample,
) -> pulse_core::Result<usize> {
  let watchers = store.list_watchers(tick.market, &tick.symbol).await?;
  if watchers.is_empty() {
    return Ok(0);
  }

  let mut per_window: std::collections::HashMap<u32, Vec<Subscriber>> =
    std::collections::HashMap::new();
  let windows = detector.window_minutes();
  for user_id in watchers {
    let rows: std::collections::HashMap<u32, f64> = store
      .list_thresholds(user_id)
      .await?
      .into_iter()
      .map(|t| (t.window_minutes, t.threshold_pct))
      .collect();
    for &window in &windows {
      per_window.entry(window).or_default().push(Subscriber {
        user_id,
        threshold_pct: rows.get(&window).copied(),
      });
    }
  }

  let detections = detector.observe(tick, &|window| {
    per_window.get(&window).cloned().unwrap_or_default()
  });

  // Detection state has already advanced, so a full queue is retried here
  // rather than by re-observing the tick.
  let mut published = 0;
  for detection in detections {
    let work = DetectedWork {
      event:   detection.event,
      realert: detection.realert,
    };
    let mut attempt = 0;
    loop {
      match queue.publish(work.clone()) {
        Ok(()) => break,
        Err(pulse_core::Error::Backpressure) if attempt < 3 => {
          tracing::debug!(attempt, "work queue full; retrying publish");
          tokio::time::sleep(std::time::Duration::from_millis(
            50 << attempt,
          ))
          .await;
          attempt += 1;
        }
        Err(err) => return Err(err),
      }
    }
    published += 1;
  }
  Ok(published)
}

/// Periodically promote unread in-app notifications past their TTL.
pub fn spawn_promotion_ticker<S: Store + 'static>(
  store: Arc<S>,
  clock: Arc<dyn Clock>,
  notifier: Arc<Mutex<Notifier>>,
  interval: std::time::Duration,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
      ticker.tick().await;
      let now = clock.now();
      let ttl = notifier.lock().await.promote_unread_after();
      match store.promote_stale_unread(now - ttl).await {
        Ok(promoted) if promoted > 0 => {
          tracing::info!(promoted, "promoted stale unread notifications");
        }
        Ok(_) => {}
        Err(error) => {
          tracing::error!(%error, "stale-unread promotion failed");
        }
      }
      notifier.lock().await.evict_stale(now);
    }
  })
}

/// Periodically generate briefs: pre-market while a market is in its `pre`
/// window, post-close while in `post`.
pub fn spawn_brief_ticker<S: Store + 'static>(
  store: Arc<S>,
  clock: Arc<dyn Clock>,
  ids: Arc<dyn IdMinter>,
  config: BriefConfig,
  interval: std::time::Duration,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    let builder = BriefBuilder::new(config);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // One brief per type per local day; re-ticks inside the same window
    // must not mint duplicates.
    let mut generated: Option<(BriefType, chrono::NaiveDate)> = None;
    loop {
      ticker.tick().await;
      let now = clock.now();

      let phase = [Market::Kr, Market::Us]
        .into_iter()
        .map(|market| classify_session(market, now))
        .fold(None, |acc, label| match (acc, label) {
          (Some(BriefType::PreMarket), _) => Some(BriefType::PreMarket),
          (_, SessionLabel::Pre) => Some(BriefType::PreMarket),
          (acc, SessionLabel::Post) => {
            acc.or(Some(BriefType::PostClose))
          }
          (acc, _) => acc,
        });
      let Some(brief_type) = phase else { continue };
      if generated == Some((brief_type, now.date_naive())) {
        continue;
      }

      let users = match store.list_user_ids().await {
        Ok(users) => users,
        Err(error) => {
          tracing::error!(%error, "listing users for briefs failed");
          continue;
        }
      };
      for user_id in users {
        if let Err(error) = builder
          .build_for_user(
            store.as_ref(),
            ids.as_ref(),
            user_id,
            brief_type,
            now,
            false,
          )
          .await
        {
          tracing::error!(%user_id, %error, "brief generation failed");
        }
      }
      generated = Some((brief_type, now.date_naive()));
    }
  })
}
