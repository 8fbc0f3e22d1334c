//! HTTP Basic-auth extractor and standalone verifier.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;

use shield_core::{DefenseClient, store::ConversationStore};

use crate::{AppState, error::ApiError};

/// Credentials accepted as valid for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Present in a handler's arguments means the request was authenticated.
/// Carries the authenticated principal — the owner id for created sessions.
pub struct Authenticated(pub String);

/// Verify credentials directly from headers and return the user id.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<String, ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  if username != config.username {
    return Err(ApiError::Unauthorized);
  }

  let parsed_hash = PasswordHash::new(&config.password_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(username.to_string())
}

impl<S, D> FromRequestParts<AppState<S, D>> for Authenticated
where
  S: ConversationStore + 'static,
  D: DefenseClient + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, D>,
  ) -> Result<Self, Self::Rejection> {
    let user_id = verify_auth(&parts.headers, &state.auth)?;
    Ok(Authenticated(user_id))
  }
}
