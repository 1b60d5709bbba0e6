//! Endpoint handlers, one module per resource.

pub mod auth;
pub mod briefs;
pub mod compare;
pub mod events;
pub mod feedback;
pub mod health;
pub mod notifications;
pub mod reports;
pub mod symbols;
pub mod thresholds;
pub mod watchlist;

use crate::error::ApiError;

/// Fallback for unknown routes, so even 404s carry the error envelope.
pub async fn not_found() -> ApiError {
  ApiError::NotFound("no such route".to_owned())
}
