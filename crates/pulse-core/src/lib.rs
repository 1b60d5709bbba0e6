//! Core types and trait definitions for the Pulse event/reason pipeline.
//!
//! This crate is deliberately free of HTTP and I/O dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod brief;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod event;
pub mod feedback;
pub mod market;
pub mod notification;
pub mod store;
pub mod user;
pub mod watchlist;

pub use error::{Error, Result};
