//! Pre-market and post-close brief generation.
//!
//! Collects a user's watchlist events over the look-back window, keeps the
//! top N by `|change_pct|`, and renders one content item per event with the
//! top-ranked reason's summary and source. When data is thin the brief is
//! still produced, carrying a fallback reason.

use chrono::{DateTime, Duration, Utc};
use pulse_core::{
  Result,
  brief::{Brief, BriefContentItem, BriefFallback, BriefStatus, BriefType},
  clock::IdMinter,
  market::{Market, is_market_holiday, next_session_open},
  store::{EventQuery, Store},
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BriefConfig {
  /// Events detected within this window are eligible.
  pub lookback:    Duration,
  /// Keep at most this many items, by `|change_pct|` descending.
  pub top_n:       usize,
  /// Fewer items than this marks the brief `insufficient_data`.
  pub floor:       usize,
  /// Post-close briefs expire this long after generation.
  pub post_close_ttl: Duration,
}

impl Default for BriefConfig {
  fn default() -> Self {
    Self {
      lookback:       Duration::hours(24),
      top_n:          5,
      floor:          1,
      post_close_ttl: Duration::hours(24),
    }
  }
}

pub struct BriefBuilder {
  config: BriefConfig,
}

impl BriefBuilder {
  pub fn new(config: BriefConfig) -> Self { Self { config } }

  /// Build and persist one brief for one user.
  ///
  /// `sources_degraded` is the reason-engine health flag for the current
  /// aggregation round; when set, the brief is marked
  /// `partial_aggregation`.
  pub async fn build_for_user<S: Store>(
    &self,
    store: &S,
    ids: &dyn IdMinter,
    user_id: Uuid,
    brief_type: BriefType,
    now: DateTime<Utc>,
    sources_degraded: bool,
  ) -> Result<Brief> {
    let (watchlist, _) = store.list_watchlist(user_id, 0, 10_000).await?;
    let mut markets: Vec<Market> =
      watchlist.iter().map(|item| item.market).collect();
    markets.sort();
    markets.dedup();

    if watchlist.is_empty() {
      return self
        .persist_empty(
          store,
          ids,
          user_id,
          brief_type,
          now,
          Vec::new(),
          BriefFallback::InsufficientData,
        )
        .await;
    }

    let all_closed =
      markets.iter().all(|&market| is_market_holiday(market, now));
    if all_closed {
      return self
        .persist_empty(
          store,
          ids,
          user_id,
          brief_type,
          now,
          markets,
          BriefFallback::MarketHoliday,
        )
        .await;
    }

    let keys: Vec<(Market, String)> = watchlist
      .iter()
      .map(|item| (item.market, item.ticker.clone()))
      .collect();
    let query = EventQuery {
      keys: Some(keys),
      from_utc: Some(now - self.config.lookback),
      to_utc: Some(now),
      ..EventQuery::recent()
    };
    let mut events = store.query_events(&query).await?;
    events.sort_by(|a, b| {
      b.change_pct
        .abs()
        .partial_cmp(&a.change_pct.abs())
        .unwrap_or(std::cmp::Ordering::Equal)
    });
    events.truncate(self.config.top_n);

    if events.is_empty() {
      return self
        .persist_empty(
          store,
          ids,
          user_id,
          brief_type,
          now,
          markets,
          BriefFallback::NoEvents,
        )
        .await;
    }

    let mut items = Vec::with_capacity(events.len());
    for event in &events {
      let reasons = store.list_reasons(event.event_id).await?;
      let top = reasons.first();
      items.push(BriefContentItem {
        event_id:         event.event_id,
        market:           event.market,
        symbol:           event.symbol.clone(),
        summary:          top.map(|r| r.summary.clone()).unwrap_or_else(
          || {
            format!(
              "{} moved {:+.2}% in {}m",
              event.symbol, event.change_pct, event.window_minutes
            )
          },
        ),
        source_url:       top.map(|r| r.source_url.clone()),
        event_detail_url: format!("/v1/events/{}", event.event_id),
      });
    }

    let fallback = if sources_degraded {
      Some(BriefFallback::PartialAggregation)
    } else if items.len() < self.config.floor {
      Some(BriefFallback::InsufficientData)
    } else {
      None
    };

    let brief = Brief {
      brief_id: ids.mint(),
      user_id,
      brief_type,
      title: title_for(brief_type),
      summary: format!(
        "{} notable move{} across {}",
        items.len(),
        if items.len() == 1 { "" } else { "s" },
        markets
          .iter()
          .map(|m| m.code())
          .collect::<Vec<_>>()
          .join(", ")
      ),
      generated_at_utc: now,
      markets,
      items,
      fallback_reason: fallback,
      status: BriefStatus::Unread,
      expires_at_utc: Some(self.expiry(brief_type, now)),
    };
    store.upsert_brief(brief).await
  }

  #[allow(clippy::too_many_arguments)]
  async fn persist_empty<S: Store>(
    &self,
    store: &S,
    ids: &dyn IdMinter,
    user_id: Uuid,
    brief_type: BriefType,
    now: DateTime<Utc>,
    markets: Vec<Market>,
    fallback: BriefFallback,
  ) -> Result<Brief> {
    let brief = Brief {
      brief_id: ids.mint(),
      user_id,
      brief_type,
      title: title_for(brief_type),
      summary: String::new(),
      generated_at_utc: now,
      markets,
      items: Vec::new(),
      fallback_reason: Some(fallback),
      status: BriefStatus::Unread,
      expires_at_utc: Some(self.expiry(brief_type, now)),
    };
    store.upsert_brief(brief).await
  }

  /// Pre-market briefs expire at the next session open; post-close briefs
  /// on a fixed TTL.
  fn expiry(&self, brief_type: BriefType, now: DateTime<Utc>) -> DateTime<Utc> {
    match brief_type {
      BriefType::PreMarket => {
        // Expire at the earliest watched-market open; US as the anchor
        // when nothing narrows it down.
        next_session_open(Market::Us, now)
          .min(next_session_open(Market::Kr, now))
      }
      BriefType::PostClose => now + self.config.post_close_ttl,
    }
  }
}

fn title_for(brief_type: BriefType) -> String {
  match brief_type {
    BriefType::PreMarket => "Pre-market brief".to_owned(),
    BriefType::PostClose => "Post-close brief".to_owned(),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use chrono::TimeZone;
  use pulse_core::{
    clock::{ManualClock, UuidMinter},
    event::{EventReason, PriceEvent, ReasonType},
    market::SessionLabel,
    store::Store as _,
    user::NewUser,
    watchlist::NewWatchlistItem,
  };
  use pulse_store_mem::MemStore;

  use super::*;

  fn now() -> DateTime<Utc> {
    // Monday, mid-session in New York.
    Utc.with_ymd_and_hms(2024, 3, 4, 21, 30, 0).unwrap()
  }

  fn store() -> MemStore {
    MemStore::with_services(
      Arc::new(ManualClock::at(now())),
      Arc::new(UuidMinter),
    )
  }

  async fn seeded_user(s: &MemStore, tickers: &[&str]) -> Uuid {
    let user = s
      .create_user(NewUser {
        email:         "brief@example.com".into(),
        password_hash: "hash".into(),
        locale:        "en".into(),
      })
      .await
      .unwrap();
    for ticker in tickers {
      s.add_watchlist_item(NewWatchlistItem {
        user_id: user.user_id,
        market:  Market::Us,
        ticker:  (*ticker).into(),
      })
      .await
      .unwrap();
    }
    user.user_id
  }

  fn event(user_id: Uuid, symbol: &str, change_pct: f64) -> PriceEvent {
    PriceEvent {
      event_id: Uuid::new_v4(),
      market: Market::Us,
      symbol: symbol.into(),
      change_pct,
      window_minutes: 5,
      detected_at_utc: now() - Duration::hours(2),
      exchange_timezone: "America/New_York".into(),
      session_label: SessionLabel::Regular,
      sequence: 1,
      user_id,
    }
  }

  fn reason(event_id: Uuid) -> EventReason {
    EventReason {
      reason_id: Uuid::new_v4(),
      event_id,
      rank: 1,
      reason_type: ReasonType::News,
      confidence_score: 0.8,
      summary: "Record quarter drives the move".into(),
      source_url: "https://news.example/a".into(),
      published_at: now() - Duration::hours(3),
      breakdown: None,
      explanation_text: String::new(),
    }
  }

  #[tokio::test]
  async fn top_events_become_items_with_reason_summaries() {
    let s = store();
    let user_id = seeded_user(&s, &["AAPL", "MSFT"]).await;

    let big = event(user_id, "AAPL", -7.5);
    let small = event(user_id, "MSFT", 3.2);
    s.insert_event_with_reasons(big.clone(), vec![reason(big.event_id)])
      .await
      .unwrap();
    s.insert_event_with_reasons(small.clone(), vec![])
      .await
      .unwrap();

    let brief = BriefBuilder::new(BriefConfig::default())
      .build_for_user(
        &s,
        &UuidMinter,
        user_id,
        BriefType::PostClose,
        now(),
        false,
      )
      .await
      .unwrap();

    assert!(brief.fallback_reason.is_none());
    assert_eq!(brief.items.len(), 2);
    // Largest |change_pct| first.
    assert_eq!(brief.items[0].symbol, "AAPL");
    assert_eq!(
      brief.items[0].summary,
      "Record quarter drives the move"
    );
    assert!(brief.items[0].source_url.is_some());
    // The reason-less event renders a generated line with no source.
    assert!(brief.items[1].source_url.is_none());
    assert!(brief.items[1].summary.contains("MSFT"));
    assert_eq!(brief.status, BriefStatus::Unread);
    assert!(brief.expires_at_utc.is_some());
  }

  #[tokio::test]
  async fn no_events_falls_back() {
    let s = store();
    let user_id = seeded_user(&s, &["AAPL"]).await;

    let brief = BriefBuilder::new(BriefConfig::default())
      .build_for_user(
        &s,
        &UuidMinter,
        user_id,
        BriefType::PostClose,
        now(),
        false,
      )
      .await
      .unwrap();

    assert_eq!(brief.fallback_reason, Some(BriefFallback::NoEvents));
    assert!(brief.items.is_empty());
  }

  #[tokio::test]
  async fn empty_watchlist_is_insufficient_data() {
    let s = store();
    let user_id = seeded_user(&s, &[]).await;

    let brief = BriefBuilder::new(BriefConfig::default())
      .build_for_user(
        &s,
        &UuidMinter,
        user_id,
        BriefType::PreMarket,
        now(),
        false,
      )
      .await
      .unwrap();
    assert_eq!(
      brief.fallback_reason,
      Some(BriefFallback::InsufficientData)
    );
  }

  #[tokio::test]
  async fn degraded_sources_mark_partial_aggregation() {
    let s = store();
    let user_id = seeded_user(&s, &["AAPL"]).await;
    let ev = event(user_id, "AAPL", 4.0);
    s.insert_event_with_reasons(ev, vec![]).await.unwrap();

    let brief = BriefBuilder::new(BriefConfig::default())
      .build_for_user(
        &s,
        &UuidMinter,
        user_id,
        BriefType::PostClose,
        now(),
        true,
      )
      .await
      .unwrap();
    assert_eq!(
      brief.fallback_reason,
      Some(BriefFallback::PartialAggregation)
    );
    assert_eq!(brief.items.len(), 1);
  }

  #[tokio::test]
  async fn holiday_briefs_are_marked() {
    let s = store();
    let user_id = seeded_user(&s, &["AAPL"]).await;

    // July 4th: US market holiday.
    let holiday = Utc.with_ymd_and_hms(2024, 7, 4, 12, 0, 0).unwrap();
    let brief = BriefBuilder::new(BriefConfig::default())
      .build_for_user(
        &s,
        &UuidMinter,
        user_id,
        BriefType::PreMarket,
        holiday,
        false,
      )
      .await
      .unwrap();
    assert_eq!(brief.fallback_reason, Some(BriefFallback::MarketHoliday));
  }
}
