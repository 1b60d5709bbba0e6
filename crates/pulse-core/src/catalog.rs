//! The read-only symbol catalog.
//!
//! Maps `(market, ticker)` to a display name and an active flag. Loaded once
//! at startup (JSON seed file or the embedded dev seed) and never mutated, so
//! reads need no synchronisation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, market::Market};

/// Search queries shorter than this return `invalid_input`.
pub const MIN_QUERY_LEN: usize = 2;
/// Search queries longer than this return `invalid_input`.
pub const MAX_QUERY_LEN: usize = 20;

// ─── Records ─────────────────────────────────────────────────────────────────

/// One listed symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
  pub market: Market,
  pub ticker: String,
  pub name:   String,
  /// Inactive symbols resolve for display but cannot be newly watched.
  #[serde(default = "default_active")]
  pub active: bool,
}

fn default_active() -> bool { true }

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Immutable symbol directory with exact resolution and substring search.
pub struct Catalog {
  records: Vec<SymbolRecord>,
  by_key:  HashMap<(Market, String), usize>,
  version: String,
}

impl Catalog {
  pub fn new(records: Vec<SymbolRecord>, version: impl Into<String>) -> Self {
    let mut normalized: Vec<SymbolRecord> = records;
    for record in &mut normalized {
      record.ticker = record.ticker.trim().to_ascii_uppercase();
    }

    let by_key = normalized
      .iter()
      .enumerate()
      .map(|(idx, r)| ((r.market, r.ticker.clone()), idx))
      .collect();

    Self { records: normalized, by_key, version: version.into() }
  }

  /// Parse a JSON array of [`SymbolRecord`]s.
  pub fn from_json(json: &str, version: impl Into<String>) -> Result<Self> {
    let records: Vec<SymbolRecord> = serde_json::from_str(json)?;
    Ok(Self::new(records, version))
  }

  /// A small fixed seed for development and tests.
  pub fn dev_seed() -> Self {
    let records = vec![
      symbol(Market::Us, "AAPL", "Apple Inc."),
      symbol(Market::Us, "MSFT", "Microsoft Corporation"),
      symbol(Market::Us, "NVDA", "NVIDIA Corporation"),
      symbol(Market::Us, "TSLA", "Tesla Inc."),
      symbol(Market::Kr, "005930", "Samsung Electronics"),
      symbol(Market::Kr, "000660", "SK Hynix"),
      symbol(Market::Kr, "035420", "NAVER"),
    ];
    Self::new(records, "dev-seed-1")
  }

  /// Monotonic version string stamped at load time.
  pub fn version(&self) -> &str { &self.version }

  /// Exact lookup by market and ticker (ticker matched case-insensitively).
  pub fn resolve(&self, market: Market, ticker: &str) -> Option<&SymbolRecord> {
    let key = (market, ticker.trim().to_ascii_uppercase());
    self.by_key.get(&key).map(|&idx| &self.records[idx])
  }

  /// Validate that a symbol exists and is active for watchlist inserts.
  pub fn require_watchable(
    &self,
    market: Market,
    ticker: &str,
  ) -> Result<&SymbolRecord> {
    match self.resolve(market, ticker) {
      Some(record) if record.active => Ok(record),
      Some(_) => Err(Error::invalid_input(format!(
        "symbol {ticker} on {market} is inactive"
      ))),
      None => Err(Error::UnknownSymbol {
        market,
        ticker: ticker.trim().to_ascii_uppercase(),
      }),
    }
  }

  /// Case-insensitive substring search over ticker and name, scoped to one
  /// market. Results are ordered by ticker.
  pub fn search(
    &self,
    query: &str,
    market: Market,
  ) -> Result<Vec<&SymbolRecord>> {
    let trimmed = query.trim();
    if trimmed.len() < MIN_QUERY_LEN || trimmed.len() > MAX_QUERY_LEN {
      return Err(Error::invalid_input(format!(
        "q must be between {MIN_QUERY_LEN} and {MAX_QUERY_LEN} characters"
      )));
    }
    let needle = trimmed.to_ascii_uppercase();

    let mut matches: Vec<&SymbolRecord> = self
      .records
      .iter()
      .filter(|r| {
        r.market == market
          && (r.ticker.contains(&needle)
            || r.name.to_ascii_uppercase().contains(&needle))
      })
      .collect();
    matches.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    Ok(matches)
  }
}

fn symbol(market: Market, ticker: &str, name: &str) -> SymbolRecord {
  SymbolRecord {
    market,
    ticker: ticker.to_owned(),
    name: name.to_owned(),
    active: true,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolve_is_case_insensitive() {
    let catalog = Catalog::dev_seed();
    let record = catalog.resolve(Market::Us, "aapl").unwrap();
    assert_eq!(record.name, "Apple Inc.");
  }

  #[test]
  fn search_matches_ticker_and_name() {
    let catalog = Catalog::dev_seed();
    let by_ticker = catalog.search("NVD", Market::Us).unwrap();
    assert_eq!(by_ticker.len(), 1);
    assert_eq!(by_ticker[0].ticker, "NVDA");

    let by_name = catalog.search("samsung", Market::Kr).unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].ticker, "005930");
  }

  #[test]
  fn search_rejects_out_of_range_queries() {
    let catalog = Catalog::dev_seed();
    assert!(catalog.search("a", Market::Us).is_err());
    assert!(catalog.search(&"x".repeat(21), Market::Us).is_err());
  }

  #[test]
  fn inactive_symbols_are_not_watchable() {
    let records = vec![SymbolRecord {
      market: Market::Us,
      ticker: "GONE".into(),
      name:   "Delisted Corp".into(),
      active: false,
    }];
    let catalog = Catalog::new(records, "v1");
    assert!(catalog.resolve(Market::Us, "GONE").is_some());
    assert!(catalog.require_watchable(Market::Us, "GONE").is_err());
  }

  #[test]
  fn from_json_defaults_active() {
    let json = r#"[{"market":"US","ticker":"amd","name":"AMD"}]"#;
    let catalog = Catalog::from_json(json, "v2").unwrap();
    let record = catalog.resolve(Market::Us, "AMD").unwrap();
    assert!(record.active);
    assert_eq!(catalog.version(), "v2");
  }
}
