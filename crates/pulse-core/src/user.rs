//! Users and account-level validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// An account holder. Never destroyed while owning other rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:        Uuid,
  /// Stored lowercased; uniqueness is case-insensitive.
  pub email:          String,
  /// Argon2 PHC string. Never serialised to clients.
  #[serde(skip_serializing)]
  pub password_hash:  String,
  pub locale:         String,
  pub created_at_utc: DateTime<Utc>,
}

/// Input to [`crate::store::Store::create_user`]. The id and timestamp are
/// minted by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub email:         String,
  pub password_hash: String,
  pub locale:        String,
}

/// Lowercase and validate an email address.
///
/// Deliberately shallow: a local part, an `@`, and a dotted domain. Anything
/// stricter belongs to a verification mail, not a regex.
pub fn normalize_email(email: &str) -> Result<String> {
  let normalized = email.trim().to_lowercase();
  let Some((local, domain)) = normalized.split_once('@') else {
    return Err(Error::invalid_input("email must be a valid address"));
  };
  if local.is_empty() || !domain.contains('.') || domain.starts_with('.') {
    return Err(Error::invalid_input("email must be a valid address"));
  }
  Ok(normalized)
}
