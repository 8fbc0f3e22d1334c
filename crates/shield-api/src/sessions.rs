//! Handlers for `/api/sessions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/sessions` | Caller's sessions, newest first, one page of 20 |
//! | `POST` | `/api/sessions` | Body: [`CreateBody`]; returns 201 + session |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use shield_core::{
  DefenseClient,
  session::{DefenseMode, Session, ToolType},
  lifecycle::CreateSession,
  store::ConversationStore,
};

use crate::{AppState, auth::Authenticated, error::ApiError};

/// `POST /api/sessions` body. The model backend arrives as a free-form label
/// because invalid values are coerced to the default backend, not rejected.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub tool_type:    ToolType,
  pub model_type:   Option<String>,
  pub defense_mode: Option<DefenseMode>,
}

/// `POST /api/sessions`
pub async fn create<S, D>(
  State(state): State<AppState<S, D>>,
  Authenticated(user_id): Authenticated,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ConversationStore + 'static,
  D: DefenseClient + 'static,
{
  let session = state
    .sessions
    .create(&user_id, CreateSession {
      tool_type:    body.tool_type,
      model_type:   body.model_type,
      defense_mode: body.defense_mode,
    })
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(session)))
}

/// `GET /api/sessions`
pub async fn list<S, D>(
  State(state): State<AppState<S, D>>,
  Authenticated(user_id): Authenticated,
) -> Result<Json<Vec<Session>>, ApiError>
where
  S: ConversationStore + 'static,
  D: DefenseClient + 'static,
{
  let sessions = state
    .sessions
    .list(&user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(sessions))
}
