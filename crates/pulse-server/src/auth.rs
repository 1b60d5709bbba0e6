//! Password hashing and the bearer-token extractor.
//!
//! Passwords are argon2id PHC strings. Access tokens are opaque random
//! strings held in an in-memory table with a TTL; verifying an expired or
//! unknown token fails with `invalid_token`.

use std::collections::HashMap;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use pulse_core::{clock::Clock, store::Store, user::User};
use rand_core::{OsRng, RngCore as _};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub const MIN_PASSWORD_LEN: usize = 8;

// ─── Passwords ───────────────────────────────────────────────────────────────

/// Validate and hash a password into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let password = password.trim();
  if password.len() < MIN_PASSWORD_LEN {
    return Err(ApiError::invalid_input(format!(
      "password must be at least {MIN_PASSWORD_LEN} characters"
    )));
  }
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Unknown(Box::new(e)))
}

/// Constant-time verification against a stored PHC string.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(password_hash) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.trim().as_bytes(), &parsed)
    .is_ok()
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

struct TokenEntry {
  user_id:    Uuid,
  expires_at: DateTime<Utc>,
}

/// In-memory bearer-token table.
pub struct TokenStore {
  tokens: RwLock<HashMap<String, TokenEntry>>,
  ttl:    Duration,
}

impl TokenStore {
  pub fn new(ttl: Duration) -> Self {
    Self { tokens: RwLock::new(HashMap::new()), ttl }
  }

  /// Mint an opaque token for `user_id`.
  pub fn issue(&self, user_id: Uuid, now: DateTime<Utc>) -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);

    self.tokens.write().insert(token.clone(), TokenEntry {
      user_id,
      expires_at: now + self.ttl,
    });
    token
  }

  /// Resolve a token to its user; expired tokens are evicted on the way.
  pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Option<Uuid> {
    let mut tokens = self.tokens.write();
    match tokens.get(token) {
      Some(entry) if entry.expires_at > now => Some(entry.user_id),
      Some(_) => {
        tokens.remove(token);
        None
      }
      None => None,
    }
  }
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// Present in a handler's arguments means the request carried a valid
/// bearer token; holds the authenticated user row.
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<AppState<S>> for CurrentUser
where
  S: Store + Clone + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let header = parts
      .headers
      .get(axum::http::header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or(ApiError::InvalidToken)?;
    let token = header
      .strip_prefix("Bearer ")
      .ok_or(ApiError::InvalidToken)?;

    let user_id = state
      .tokens
      .verify(token, state.clock.now())
      .ok_or(ApiError::InvalidToken)?;
    let user = state
      .store
      .get_user(user_id)
      .await?
      .ok_or(ApiError::InvalidToken)?;
    Ok(CurrentUser(user))
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn hash_and_verify_round_trip() {
    let hash = hash_password("correct horse").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("correct horse", &hash));
    assert!(!verify_password("wrong horse", &hash));
  }

  #[test]
  fn short_passwords_are_rejected() {
    assert!(hash_password("short").is_err());
  }

  #[test]
  fn tokens_expire() {
    let now = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
    let store = TokenStore::new(Duration::hours(1));
    let user_id = Uuid::new_v4();

    let token = store.issue(user_id, now);
    assert_eq!(store.verify(&token, now), Some(user_id));
    assert_eq!(
      store.verify(&token, now + Duration::minutes(59)),
      Some(user_id)
    );
    assert_eq!(store.verify(&token, now + Duration::minutes(61)), None);
    // Expired tokens are gone for good.
    assert_eq!(store.verify(&token, now), None);
  }

  #[test]
  fn unknown_tokens_fail() {
    let store = TokenStore::new(Duration::hours(1));
    assert_eq!(store.verify("nope", Utc::now()), None);
  }
}
