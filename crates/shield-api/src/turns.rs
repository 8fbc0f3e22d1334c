//! Handlers for `/api/sessions/{id}/turns` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/sessions/:id/turns` | Body: `{"userText":"..."}`; returns `{turn, defense}` |
//! | `GET`  | `/api/sessions/:id/turns` | All turns, creation time ascending |

use axum::{
  Json,
  extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shield_core::{
  DefenseClient,
  defense::AnalyzeResponse,
  store::ConversationStore,
  turn::Turn,
};

use crate::{AppState, auth::Authenticated, error::ApiError};

/// Hard cap on user input, matching the analysis service's own limit.
const MAX_USER_TEXT: usize = 20_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub user_text: String,
}

/// The processed turn plus the raw analysis response it was built from.
#[derive(Debug, Serialize)]
pub struct TurnResponse {
  pub turn:    Turn,
  pub defense: AnalyzeResponse,
}

/// `POST /api/sessions/:id/turns`
pub async fn create<S, D>(
  State(state): State<AppState<S, D>>,
  Authenticated(user_id): Authenticated,
  Path(session_id): Path<Uuid>,
  Json(body): Json<CreateBody>,
) -> Result<Json<TurnResponse>, ApiError>
where
  S: ConversationStore + 'static,
  D: DefenseClient + 'static,
{
  if body.user_text.trim().is_empty() {
    return Err(ApiError::BadRequest("userText must not be empty".into()));
  }
  if body.user_text.len() > MAX_USER_TEXT {
    return Err(ApiError::BadRequest(format!(
      "userText exceeds {MAX_USER_TEXT} characters"
    )));
  }

  check_ownership(&state, session_id, &user_id).await?;

  let outcome = state
    .processor
    .process_turn(session_id, body.user_text)
    .await?;
  Ok(Json(TurnResponse { turn: outcome.turn, defense: outcome.defense }))
}

/// `GET /api/sessions/:id/turns`
pub async fn list<S, D>(
  State(state): State<AppState<S, D>>,
  Authenticated(user_id): Authenticated,
  Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<Turn>>, ApiError>
where
  S: ConversationStore + 'static,
  D: DefenseClient + 'static,
{
  check_ownership(&state, session_id, &user_id).await?;
  let turns = state.processor.list_turns(session_id).await?;
  Ok(Json(turns))
}

/// A session can only be driven or read by its owner.
async fn check_ownership<S, D>(
  state: &AppState<S, D>,
  session_id: Uuid,
  user_id: &str,
) -> Result<(), ApiError>
where
  S: ConversationStore + 'static,
  D: DefenseClient + 'static,
{
  let session = state
    .store
    .get_session(session_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("session {session_id} not found")))?;

  if session.user_id != user_id {
    return Err(ApiError::Forbidden);
  }
  Ok(())
}
