//! Session lifecycle — creation defaults and the dashboard read path.

use std::sync::Arc;

use crate::{
  policy::Policy,
  session::{DefenseMode, INITIAL_TRUST_SCORE, IntentGraph, ModelType, NewSession, Session, ToolType},
  store::ConversationStore,
};

/// Maximum sessions returned by the list read path.
pub const SESSION_PAGE_SIZE: usize = 20;

/// Parameters for [`SessionManager::create`]. The model backend label is
/// untrusted input and is coerced, not validated.
#[derive(Debug, Clone)]
pub struct CreateSession {
  pub tool_type:    ToolType,
  pub model_type:   Option<String>,
  pub defense_mode: Option<DefenseMode>,
}

/// Creates sessions with their default guard state and serves the
/// newest-first session listing.
#[derive(Debug)]
pub struct SessionManager<S> {
  store: Arc<S>,
}

impl<S> Clone for SessionManager<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone() }
  }
}

impl<S: ConversationStore> SessionManager<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  /// Create a session for `user_id`.
  ///
  /// Defense mode falls back to the policy default, then to `active`. The
  /// intent graph is seeded from the tool type with the fixed default
  /// allowed/forbidden action sets and an empty history.
  pub async fn create(
    &self,
    user_id: &str,
    input: CreateSession,
  ) -> Result<Session, S::Error> {
    let policy = Policy::resolve(self.store.get_policy().await?);

    let defense_mode = input
      .defense_mode
      .unwrap_or(policy.defense_mode_default);
    let model_type = ModelType::coerce(input.model_type.as_deref());

    let session = self
      .store
      .create_session(NewSession {
        user_id:      user_id.to_string(),
        tool_type:    input.tool_type,
        model_type,
        defense_mode,
        trust_score:  INITIAL_TRUST_SCORE,
        intent_graph: IntentGraph::default_for(input.tool_type),
      })
      .await?;

    tracing::info!(
      session_id = %session.session_id,
      tool_type = session.tool_type.as_str(),
      model_type = session.model_type.as_str(),
      "session created"
    );
    Ok(session)
  }

  /// Sessions owned by `user_id`, most recent first, one page.
  pub async fn list(&self, user_id: &str) -> Result<Vec<Session>, S::Error> {
    self.store.list_sessions(user_id, SESSION_PAGE_SIZE).await
  }
}
