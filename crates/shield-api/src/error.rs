//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every terminal failure returns a structured payload —
//! `{"error": <summary>, "detail": <remediation hint>}` — never a bare
//! exception string. Status mapping: auth errors pass through as 401/403, a
//! missing session is 404, defense-service failures are 502 except for
//! unclassified client failures which are 500.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use shield_core::{DefenseError, TurnError};

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("forbidden")]
  Forbidden,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The defense service (or its model backend) failed terminally.
  #[error("upstream failure: {hint}")]
  Upstream { hint: String },

  /// An unclassified analysis failure.
  #[error("analysis failure: {hint}")]
  Analysis { hint: String },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<TurnError> for ApiError {
  fn from(e: TurnError) -> Self {
    match e {
      TurnError::SessionNotFound(id) => {
        ApiError::NotFound(format!("session {id} not found"))
      }
      // Unknown failures are our fault (500); everything else in the
      // taxonomy means the upstream service or backend let us down (502).
      TurnError::Analysis { source: DefenseError::Unknown(_), hint } => {
        ApiError::Analysis { hint }
      }
      TurnError::Analysis { hint, .. } => ApiError::Upstream { hint },
      TurnError::Store(e) => ApiError::Store(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, error, detail) = match &self {
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), None),
      ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string(), None),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone(), None),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone(), None),
      ApiError::Upstream { hint } => (
        StatusCode::BAD_GATEWAY,
        "Turn processing failed".to_string(),
        Some(hint.clone()),
      ),
      ApiError::Analysis { hint } => (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Turn processing failed".to_string(),
        Some(hint.clone()),
      ),
      ApiError::Store(e) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        "store error".to_string(),
        Some(e.to_string()),
      ),
    };

    let body = match detail {
      Some(detail) => json!({ "error": error, "detail": detail }),
      None => json!({ "error": error }),
    };
    (status, Json(body)).into_response()
  }
}
