//! Reason engine for Pulse.
//!
//! Given a freshly detected [`pulse_core::event::PriceEvent`], this crate
//! fetches candidate filings/news from pluggable source adapters, gates them
//! for evidence quality, deduplicates by canonical URL, scores each survivor
//! across three signals, and persists the ranked top three together with the
//! event in one commit. It also owns the evidence-compare axis classifier.
//!
//! # Modules
//!
//! - [`adapter`]: the `SourceAdapter` seam, fixtures, and the bounded
//!   fan-out with per-adapter timeout/retry
//! - [`http`]: a generic JSON feed adapter over `reqwest`
//! - [`ratelimit`]: leaky-bucket limiter keyed by adapter id
//! - [`gate`]: the evidence quality gate
//! - [`canonical`]: URL canonicalization and duplicate merging
//! - [`score`]: reputation table, signals, confidence breakdown
//! - [`rank`]: ordering, tie-breaks, top-3 selection
//! - [`engine`]: pipeline orchestration and the rerun path
//! - [`compare`]: positive/negative/uncertain axis classification

pub mod adapter;
pub mod canonical;
pub mod compare;
pub mod engine;
pub mod gate;
pub mod http;
pub mod rank;
pub mod ratelimit;
pub mod score;

pub use adapter::{AdapterError, Candidate, SourceAdapter, TimeRange};
pub use engine::ReasonEngine;
