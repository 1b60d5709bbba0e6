//! Background workers for Pulse.
//!
//! - [`detector`]: rolling-window percent-change detection with debounce
//!   and delta re-alert
//! - [`queue`]: the bounded hand-off between detection and the reason
//!   engine workers
//! - [`notifier`]: per-(user, symbol) cooldowns and notification dispatch
//! - [`brief`]: pre-market / post-close digest generation
//! - [`feed`]: JSON tick-feed poller driving the detector
//! - [`runtime`]: task spawning — the reason worker pool and the periodic
//!   tickers

pub mod brief;
pub mod detector;
pub mod feed;
pub mod notifier;
pub mod queue;
pub mod runtime;
