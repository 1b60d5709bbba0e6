//! Signup, login, and the current-user endpoint.

use axum::{Json, extract::State};
use pulse_core::{store::Store, user::NewUser};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{CurrentUser, hash_password, verify_password},
  error::{ApiError, ApiResult},
};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
  pub email:    String,
  pub password: String,
  #[serde(default = "default_locale")]
  pub locale:   String,
}

fn default_locale() -> String { "en".to_owned() }

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
  pub email:    String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
  pub user_id:      Uuid,
  pub access_token: String,
}

/// `POST /v1/auth/signup`
pub async fn signup<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<SignupRequest>,
) -> ApiResult<Json<AuthResponse>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let password_hash = hash_password(&body.password)?;
  let user = state
    .store
    .create_user(NewUser {
      email: body.email,
      password_hash,
      locale: body.locale,
    })
    .await?;

  let access_token = state.tokens.issue(user.user_id, state.clock.now());
  Ok(Json(AuthResponse { user_id: user.user_id, access_token }))
}

/// `POST /v1/auth/login`
///
/// Any failure — unknown email, malformed email, wrong password — maps to
/// the same `invalid_credentials` so the endpoint does not leak which
/// accounts exist.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let user = state
    .store
    .find_user_by_email(&body.email)
    .await
    .map_err(|_| ApiError::InvalidCredentials)?
    .ok_or(ApiError::InvalidCredentials)?;

  if !verify_password(&body.password, &user.password_hash) {
    return Err(ApiError::InvalidCredentials);
  }

  let access_token = state.tokens.issue(user.user_id, state.clock.now());
  Ok(Json(AuthResponse { user_id: user.user_id, access_token }))
}

/// `GET /v1/auth/me`
pub async fn me<S>(
  CurrentUser(user): CurrentUser,
) -> ApiResult<Json<pulse_core::user::User>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
  pub locale: String,
}

/// `PATCH /v1/auth/me` — profile edit; locale is the only mutable field.
pub async fn update_profile<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<ProfileRequest>,
) -> ApiResult<Json<pulse_core::user::User>>
where
  S: Store + Clone + Send + Sync + 'static,
{
  let locale = body.locale.trim().to_owned();
  if locale.is_empty() || locale.len() > 16 {
    return Err(ApiError::invalid_input(
      "locale must be a short language tag",
    ));
  }
  let user = state.store.update_locale(user.user_id, locale).await?;
  Ok(Json(user))
}
