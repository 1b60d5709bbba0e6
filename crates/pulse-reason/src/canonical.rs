//! URL canonicalization and duplicate merging.
//!
//! Two candidates naming the same story through different URL spellings must
//! collapse to one reason. Canonical form: lowercase scheme and host, default
//! ports stripped, fragment dropped, tracking query parameters removed, and
//! the remaining query keys sorted.

use url::Url;

use crate::adapter::Candidate;

/// Documented allowlist of tracking parameters stripped during
/// canonicalization. Comparisons are case-insensitive.
pub const TRACKING_PARAMS: &[&str] = &[
  "fbclid",
  "gclid",
  "mc_cid",
  "mc_eid",
  "ref",
  "utm_campaign",
  "utm_content",
  "utm_medium",
  "utm_source",
  "utm_term",
];

/// Canonicalize a URL, returning `(canonical, host)`.
///
/// Returns `None` for anything that is not a well-formed http/https URL —
/// such candidates were already rejected by the gate, so this only guards
/// against adapter bugs.
pub fn canonicalize(source_url: &str) -> Option<(String, String)> {
  let mut url = Url::parse(source_url.trim()).ok()?;
  if !matches!(url.scheme(), "http" | "https") {
    return None;
  }
  // The url crate already lowercases scheme/host and strips default ports.
  let host = url.host_str()?.to_ascii_lowercase();

  url.set_fragment(None);

  let mut pairs: Vec<(String, String)> = url
    .query_pairs()
    .filter(|(key, _)| {
      !TRACKING_PARAMS.contains(&key.to_ascii_lowercase().as_str())
    })
    .map(|(k, v)| (k.into_owned(), v.into_owned()))
    .collect();
  pairs.sort();

  if pairs.is_empty() {
    url.set_query(None);
  } else {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &pairs {
      serializer.append_pair(key, value);
    }
    url.set_query(Some(&serializer.finish()));
  }

  Some((url.to_string(), host))
}

/// Canonicalize every candidate and merge duplicates.
///
/// Merge rule: the earlier `published_at` wins, as does the longer non-empty
/// summary. Candidates whose URL fails to canonicalize are dropped.
pub fn canonicalize_and_merge(candidates: Vec<Candidate>) -> Vec<Candidate> {
  let mut merged: Vec<Candidate> = Vec::with_capacity(candidates.len());

  for mut candidate in candidates {
    let Some((canonical, _host)) = canonicalize(&candidate.source_url) else {
      tracing::warn!(
        source_url = %candidate.source_url,
        "dropping candidate with uncanonicalizable url"
      );
      continue;
    };
    candidate.source_url = canonical;

    match merged
      .iter_mut()
      .find(|existing| existing.source_url == candidate.source_url)
    {
      None => merged.push(candidate),
      Some(existing) => {
        if let (Some(theirs), Some(ours)) =
          (candidate.published_at, existing.published_at)
          && theirs < ours
        {
          existing.published_at = candidate.published_at;
        }
        if candidate.summary.len() > existing.summary.len()
          && !candidate.summary.trim().is_empty()
        {
          existing.summary = candidate.summary;
        }
        if existing.title.is_none() {
          existing.title = candidate.title;
        }
      }
    }
  }

  merged
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use pulse_core::event::ReasonType;

  use super::*;

  fn candidate(url: &str, summary: &str, minute: u32) -> Candidate {
    Candidate {
      reason_type:  ReasonType::News,
      title:        None,
      summary:      summary.into(),
      source_url:   url.into(),
      published_at: Some(
        Utc.with_ymd_and_hms(2024, 3, 4, 14, minute, 0).unwrap(),
      ),
      source:       "fixture".into(),
    }
  }

  #[test]
  fn canonical_form_normalizes_case_port_fragment_and_tracking() {
    let (canonical, host) =
      canonicalize("HTTPS://X.com:443/a?utm_source=z&id=1#frag").unwrap();
    assert_eq!(canonical, "https://x.com/a?id=1");
    assert_eq!(host, "x.com");
  }

  #[test]
  fn remaining_query_keys_are_sorted() {
    let (canonical, _) =
      canonicalize("https://x.com/a?b=2&a=1&ref=feed").unwrap();
    assert_eq!(canonical, "https://x.com/a?a=1&b=2");
  }

  #[test]
  fn non_default_ports_survive() {
    let (canonical, _) = canonicalize("https://x.com:8443/a").unwrap();
    assert_eq!(canonical, "https://x.com:8443/a");
  }

  #[test]
  fn duplicates_merge_keeping_earlier_publication_and_longer_summary() {
    let merged = canonicalize_and_merge(vec![
      candidate("https://x.com/a?utm_source=z&id=1", "short", 30),
      candidate("HTTPS://X.com:443/a?id=1#frag", "a much longer summary", 10),
    ]);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].source_url, "https://x.com/a?id=1");
    assert_eq!(
      merged[0].published_at.unwrap(),
      Utc.with_ymd_and_hms(2024, 3, 4, 14, 10, 0).unwrap()
    );
    assert_eq!(merged[0].summary, "a much longer summary");
  }

  #[test]
  fn distinct_queries_do_not_merge() {
    let merged = canonicalize_and_merge(vec![
      candidate("https://x.com/a?id=1", "one", 10),
      candidate("https://x.com/a?id=2", "two", 10),
    ]);
    assert_eq!(merged.len(), 2);
  }
}
