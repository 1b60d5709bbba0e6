//! Bounded hand-off between detection and the reason engine workers.
//!
//! The queue is deliberately small: detection must observe backpressure
//! rather than buffer unboundedly, and the caller is expected to retry a
//! rejected publish.

use pulse_core::{Error, Result, event::PriceEvent, notification::DeltaNote};
use tokio::sync::mpsc;

/// One unit of reason-engine work.
#[derive(Debug, Clone)]
pub struct DetectedWork {
  pub event:   PriceEvent,
  pub realert: Option<DeltaNote>,
}

/// Producer half. Cheap to clone.
#[derive(Clone)]
pub struct WorkQueue {
  tx: mpsc::Sender<DetectedWork>,
}

impl WorkQueue {
  /// Create the queue; the receiver feeds the worker pool.
  pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<DetectedWork>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Self { tx }, rx)
  }

  /// Non-blocking publish. A full queue surfaces as `Backpressure`; a
  /// closed queue (workers gone) as a transient failure.
  pub fn publish(&self, work: DetectedWork) -> Result<()> {
    self.tx.try_send(work).map_err(|err| match err {
      mpsc::error::TrySendError::Full(_) => Error::Backpressure,
      mpsc::error::TrySendError::Closed(_) => {
        Error::Transient("work queue closed".into())
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use pulse_core::market::{Market, SessionLabel};
  use uuid::Uuid;

  use super::*;

  fn work() -> DetectedWork {
    DetectedWork {
      event:   PriceEvent {
        event_id: Uuid::new_v4(),
        market: Market::Us,
        symbol: "AAPL".into(),
        change_pct: 4.2,
        window_minutes: 5,
        detected_at_utc: Utc.with_ymd_and_hms(2024, 3, 4, 14, 45, 0).unwrap(),
        exchange_timezone: "America/New_York".into(),
        session_label: SessionLabel::Regular,
        sequence: 1,
        user_id: Uuid::new_v4(),
      },
      realert: None,
    }
  }

  #[tokio::test]
  async fn full_queue_reports_backpressure() {
    let (queue, _rx) = WorkQueue::bounded(1);
    queue.publish(work()).unwrap();

    let err = queue.publish(work()).unwrap_err();
    assert!(matches!(err, Error::Backpressure));
    assert!(err.retryable());
  }

  #[tokio::test]
  async fn published_work_is_received_in_order() {
    let (queue, mut rx) = WorkQueue::bounded(4);
    let first = work();
    let first_id = first.event.event_id;
    queue.publish(first).unwrap();
    queue.publish(work()).unwrap();

    assert_eq!(rx.recv().await.unwrap().event.event_id, first_id);
    assert!(rx.recv().await.is_some());
  }

  #[tokio::test]
  async fn closed_queue_is_transient() {
    let (queue, rx) = WorkQueue::bounded(1);
    drop(rx);
    let err = queue.publish(work()).unwrap_err();
    assert!(matches!(err, Error::Transient(_)));
  }
}
