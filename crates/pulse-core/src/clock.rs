//! Clock and identifier seams.
//!
//! Every `*_utc` stamp and every minted id flows through these traits so the
//! debounce, cooldown, and expiry rules can be tested deterministically.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

// ─── Clock ───────────────────────────────────────────────────────────────────

/// A monotonic UTC time source.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A hand-driven clock for tests. Cloning shares the underlying instant.
#[derive(Clone)]
pub struct ManualClock {
  now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
  pub fn at(start: DateTime<Utc>) -> Self {
    Self { now: Arc::new(Mutex::new(start)) }
  }

  pub fn advance(&self, by: Duration) {
    let mut guard = self.now.lock().unwrap();
    *guard += by;
  }

  pub fn set(&self, to: DateTime<Utc>) {
    let mut guard = self.now.lock().unwrap();
    *guard = to;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> { *self.now.lock().unwrap() }
}

// ─── Id minting ──────────────────────────────────────────────────────────────

/// Mints opaque identifiers for newly created rows.
pub trait IdMinter: Send + Sync {
  fn mint(&self) -> Uuid;
}

/// Production minter — random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidMinter;

impl IdMinter for UuidMinter {
  fn mint(&self) -> Uuid { Uuid::new_v4() }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn manual_clock_advances() {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let clock = ManualClock::at(start);
    assert_eq!(clock.now(), start);

    clock.advance(Duration::minutes(5));
    assert_eq!(clock.now(), start + Duration::minutes(5));
  }

  #[test]
  fn uuid_minter_mints_unique_ids() {
    let minter = UuidMinter;
    assert_ne!(minter.mint(), minter.mint());
  }
}
