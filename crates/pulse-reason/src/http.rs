//! Generic JSON feed adapter over HTTP.
//!
//! Vendor specifics are out of scope; any feed that can answer
//! `GET {base_url}?symbol=…&market=…&from=…&to=…` with a JSON array of
//! items can serve as a source. Timeouts are enforced twice: here at the
//! client level and again by the fan-out in [`crate::adapter`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use pulse_core::{event::ReasonType, market::Market};
use reqwest::Client;
use serde::Deserialize;

use crate::adapter::{AdapterError, Candidate, SourceAdapter, TimeRange};

/// Connection settings for one JSON feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
  /// Stable adapter id (also the rate-limit key), e.g. `"sec"`, `"news"`.
  pub name:        String,
  pub base_url:    String,
  /// Reason type stamped on items that do not carry their own.
  pub default_type: ReasonType,
  pub timeout:     Duration,
}

/// One item as served by the feed.
#[derive(Debug, Deserialize)]
struct FeedItem {
  #[serde(default)]
  reason_type:  Option<ReasonType>,
  #[serde(default)]
  title:        Option<String>,
  #[serde(default)]
  summary:      String,
  #[serde(default)]
  source_url:   String,
  #[serde(default)]
  published_at: Option<DateTime<Utc>>,
}

/// Async HTTP client for one feed. Cheap to clone — the inner
/// [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct JsonFeedAdapter {
  client: Client,
  config: FeedConfig,
}

impl JsonFeedAdapter {
  pub fn new(config: FeedConfig) -> Result<Self, AdapterError> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| AdapterError::InvalidResponse(e.to_string()))?;
    Ok(Self { client, config })
  }
}

impl SourceAdapter for JsonFeedAdapter {
  fn name(&self) -> &str { &self.config.name }

  fn fetch<'a>(
    &'a self,
    symbol: &'a str,
    market: Market,
    range: TimeRange,
  ) -> BoxFuture<'a, Result<Vec<Candidate>, AdapterError>> {
    Box::pin(async move {
      let response = self
        .client
        .get(&self.config.base_url)
        .query(&[
          ("symbol", symbol),
          ("market", market.code()),
          ("from", &range.start.to_rfc3339()),
          ("to", &range.end.to_rfc3339()),
        ])
        .send()
        .await
        .map_err(classify_transport_error)?;

      let status = response.status();
      if status.as_u16() == 429 {
        return Err(AdapterError::RateLimited(format!(
          "{} returned 429",
          self.config.name
        )));
      }
      if status.is_server_error() {
        return Err(AdapterError::Upstream(format!(
          "{} returned {status}",
          self.config.name
        )));
      }
      if !status.is_success() {
        return Err(AdapterError::InvalidResponse(format!(
          "{} returned {status}",
          self.config.name
        )));
      }

      let items: Vec<FeedItem> = response
        .json()
        .await
        .map_err(|e| AdapterError::InvalidResponse(e.to_string()))?;

      Ok(
        items
          .into_iter()
          .map(|item| Candidate {
            reason_type:  item
              .reason_type
              .unwrap_or(self.config.default_type),
            title:        item.title,
            summary:      item.summary,
            source_url:   item.source_url,
            published_at: item.published_at,
            source:       self.config.name.clone(),
          })
          .collect(),
      )
    })
  }
}

fn classify_transport_error(error: reqwest::Error) -> AdapterError {
  if error.is_timeout() {
    AdapterError::Timeout(Duration::from_secs(0))
  } else if error.is_connect() {
    AdapterError::Upstream(error.to_string())
  } else {
    AdapterError::InvalidResponse(error.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn feed_items_tolerate_missing_fields() {
    let json = r#"[
      {"summary":"a story","source_url":"https://news.example/a",
       "published_at":"2024-03-04T14:00:00Z"},
      {"title":"bare"}
    ]"#;
    let items: Vec<FeedItem> = serde_json::from_str(json).unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[1].source_url.is_empty());
    assert!(items[1].published_at.is_none());
  }
}
