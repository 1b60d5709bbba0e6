//! Markets, exchange timezones, and the session calendar.
//!
//! All timezone math lives here. Session labels are computed from the
//! exchange-local clock, never from wall-clock strings.

use chrono::{
  DateTime, Datelike, Duration, NaiveDate, TimeZone as _, Timelike, Utc,
  Weekday,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

// ─── Market ──────────────────────────────────────────────────────────────────

/// A supported exchange market.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize,
)]
pub enum Market {
  #[serde(rename = "KR")]
  Kr,
  #[serde(rename = "US")]
  Us,
}

impl Market {
  /// Parse the two-letter market code, case-insensitively.
  pub fn parse(value: &str) -> Option<Self> {
    match value.trim().to_ascii_uppercase().as_str() {
      "KR" => Some(Market::Kr),
      "US" => Some(Market::Us),
      _ => None,
    }
  }

  pub fn code(self) -> &'static str {
    match self {
      Market::Kr => "KR",
      Market::Us => "US",
    }
  }

  /// The IANA timezone of the market's primary exchange.
  pub fn timezone(self) -> Tz {
    match self {
      Market::Kr => chrono_tz::Asia::Seoul,
      Market::Us => chrono_tz::America::New_York,
    }
  }

  fn rule(self) -> &'static SessionRule {
    match self {
      Market::Kr => &KR_SESSIONS,
      Market::Us => &US_SESSIONS,
    }
  }
}

impl std::fmt::Display for Market {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.code())
  }
}

// ─── Session labels ──────────────────────────────────────────────────────────

/// Where in the trading day an instant falls.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SessionLabel {
  Pre,
  Regular,
  Post,
  Closed,
}

impl SessionLabel {
  /// Events detected while the market is closed are recorded but never
  /// alerted.
  pub fn alertable(self) -> bool { self != SessionLabel::Closed }
}

// ─── Session rules ───────────────────────────────────────────────────────────

/// Per-market session boundaries in exchange-local minutes-of-day, plus the
/// fixed-date holiday table. The boundary semantics match the exchanges:
/// `regular` is inclusive of its close minute; `pre`/`post` are half-open.
struct SessionRule {
  pre_start:     u32,
  regular_start: u32,
  regular_end:   u32,
  post_end:      u32,
  /// (month, day) pairs on which the exchange is closed.
  holidays:      &'static [(u32, u32)],
}

const KR_SESSIONS: SessionRule = SessionRule {
  pre_start:     8 * 60,
  regular_start: 9 * 60,
  regular_end:   15 * 60 + 30,
  post_end:      18 * 60,
  holidays:      &[(1, 1), (3, 1), (8, 15), (10, 3), (12, 25)],
};

const US_SESSIONS: SessionRule = SessionRule {
  pre_start:     4 * 60,
  regular_start: 9 * 60 + 30,
  regular_end:   16 * 60,
  post_end:      20 * 60,
  holidays:      &[(1, 1), (7, 4), (12, 25)],
};

fn is_closed_day(rule: &SessionRule, date: NaiveDate) -> bool {
  if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
    return true;
  }
  rule.holidays.contains(&(date.month(), date.day()))
}

/// Classify a UTC instant into the market's session label.
pub fn classify_session(market: Market, at_utc: DateTime<Utc>) -> SessionLabel {
  let rule = market.rule();
  let local = at_utc.with_timezone(&market.timezone());

  if is_closed_day(rule, local.date_naive()) {
    return SessionLabel::Closed;
  }

  let minute = local.hour() * 60 + local.minute();
  if (rule.pre_start..rule.regular_start).contains(&minute) {
    SessionLabel::Pre
  } else if minute >= rule.regular_start && minute <= rule.regular_end {
    SessionLabel::Regular
  } else if minute > rule.regular_end && minute <= rule.post_end {
    SessionLabel::Post
  } else {
    SessionLabel::Closed
  }
}

/// Whether the market is fully closed (weekend or holiday) on the local date
/// containing `at_utc`.
pub fn is_market_holiday(market: Market, at_utc: DateTime<Utc>) -> bool {
  let local = at_utc.with_timezone(&market.timezone());
  is_closed_day(market.rule(), local.date_naive())
}

/// The next regular-session open strictly after `after_utc`.
///
/// Used to expire pre-market briefs: a brief generated before today's open
/// expires at that open; one generated mid-session expires at tomorrow's.
pub fn next_session_open(
  market: Market,
  after_utc: DateTime<Utc>,
) -> DateTime<Utc> {
  let rule = market.rule();
  let tz = market.timezone();
  let local = after_utc.with_timezone(&tz);

  let mut date = local.date_naive();
  // Bounded scan: long holiday runs never exceed a handful of days.
  for _ in 0..14 {
    if !is_closed_day(rule, date)
      && let Some(open) = date.and_hms_opt(
        rule.regular_start / 60,
        rule.regular_start % 60,
        0,
      )
      && let Some(open_local) = tz.from_local_datetime(&open).earliest()
      && open_local.with_timezone(&Utc) > after_utc
    {
      return open_local.with_timezone(&Utc);
    }
    date += Duration::days(1);
  }
  // Unreachable with any sane calendar; fall back to a day later.
  after_utc + Duration::days(1)
}
