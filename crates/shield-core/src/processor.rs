//! The turn processor — the state machine executed once per user message.
//!
//! Pipeline: load session → resolve policy → call the defense service (with
//! at most one fallback retry against the simulated backend) → replace the
//! intent graph and decay trust → persist the turn → raise an alert for
//! high-risk verdicts → return the turn plus the raw analysis response.
//!
//! There is no per-session mutual exclusion; concurrent turns against one
//! session are last-writer-wins on the trust score and intent graph.

use std::{sync::Arc, time::Instant};

use thiserror::Error;
use uuid::Uuid;

use crate::{
  alert::NewAlert,
  defense::{AnalyzeRequest, AnalyzeResponse, DefenseClient, DefenseError},
  policy::Policy,
  session::IntentGraph,
  store::ConversationStore,
  turn::{DivergenceLog, NewTurn, Turn},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// A terminal failure from the turn processor.
///
/// Authentication failures never reach this type — they are rejected by the
/// transport layer before a processor is invoked.
#[derive(Debug, Error)]
pub enum TurnError {
  /// No session with this id; nothing was analysed or persisted.
  #[error("session not found: {0}")]
  SessionNotFound(Uuid),

  /// The defense service call failed terminally (after the fallback retry,
  /// where one applies). `hint` tells the operator how to get unstuck.
  #[error("turn analysis failed: {source}")]
  Analysis {
    #[source]
    source: DefenseError,
    hint:   String,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TurnError {
  fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

// ─── Processor ───────────────────────────────────────────────────────────────

/// The result of one processed turn: the persisted record plus the raw
/// analysis response it was built from.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
  pub turn:    Turn,
  pub defense: AnalyzeResponse,
}

/// Orchestrates one conversational exchange per invocation. Cheap to clone.
#[derive(Debug)]
pub struct TurnProcessor<S, D> {
  store:   Arc<S>,
  defense: Arc<D>,
}

impl<S, D> Clone for TurnProcessor<S, D> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), defense: self.defense.clone() }
  }
}

impl<S, D> TurnProcessor<S, D>
where
  S: ConversationStore,
  D: DefenseClient,
{
  pub fn new(store: Arc<S>, defense: Arc<D>) -> Self {
    Self { store, defense }
  }

  /// Process one user message against a session.
  pub async fn process_turn(
    &self,
    session_id: Uuid,
    user_text: String,
  ) -> Result<TurnOutcome, TurnError> {
    // 1. Load session. A missing session is terminal, before any side effect.
    let mut session = self
      .store
      .get_session(session_id)
      .await
      .map_err(TurnError::store)?
      .ok_or(TurnError::SessionNotFound(session_id))?;

    // 2. Resolve the policy singleton; absent record means defaults.
    let policy =
      Policy::resolve(self.store.get_policy().await.map_err(TurnError::store)?);

    // 3. Analyse. A stored session can carry an empty graph (seeded out of
    //    band); the analysis call still needs a goal to reason about.
    let intent_graph = if session.intent_graph.is_empty() {
      IntentGraph::bare(session.tool_type)
    } else {
      session.intent_graph.clone()
    };

    let request = AnalyzeRequest {
      user_text: user_text.clone(),
      intent_graph,
      defense_mode: session.defense_mode,
      policy,
      model_type: session.model_type,
    };

    let started = Instant::now();
    let defense = self.analyze_with_fallback(&request).await?;
    let latency_ms = started.elapsed().as_millis() as u64;

    // 4. Mutate session state: graph replaced verbatim, trust decayed.
    session.intent_graph = defense.updated_graph.clone();
    session.decay_trust(defense.scores.total);
    self
      .store
      .update_session(&session)
      .await
      .map_err(TurnError::store)?;

    // 5. Persist the turn.
    let divergence_log = defense
      .divergence_log
      .clone()
      .unwrap_or_else(|| DivergenceLog::synthesized(&defense.scores, defense.action));

    let turn = self
      .store
      .record_turn(NewTurn {
        session_id: session.session_id,
        user_text,
        primary_output: defense.primary_output.clone(),
        shadow_output: defense.shadow_output.clone(),
        scores: defense.scores,
        risk_level: defense.risk_level,
        action: defense.action,
        divergence_log,
        sanitized_text: defense.sanitized_text.clone(),
        latency_ms,
      })
      .await
      .map_err(TurnError::store)?;

    // 6. Raise an alert for high-risk verdicts.
    if turn.risk_level.is_alerting() {
      self
        .store
        .raise_alert(NewAlert {
          session_id: session.session_id,
          turn_id:    Some(turn.turn_id),
          risk_level: turn.risk_level,
          title:      format!("Risk detected: {}", turn.action),
        })
        .await
        .map_err(TurnError::store)?;
      tracing::warn!(
        session_id = %session.session_id,
        turn_id = %turn.turn_id,
        risk_level = turn.risk_level.as_str(),
        "alert raised"
      );
    }

    Ok(TurnOutcome { turn, defense })
  }

  /// All turns for a session, creation time ascending.
  pub async fn list_turns(&self, session_id: Uuid) -> Result<Vec<Turn>, TurnError> {
    self
      .store
      .list_turns(session_id)
      .await
      .map_err(TurnError::store)
  }

  /// Call the defense service, retrying exactly once against the simulated
  /// backend when a paid backend rejects its credential or quota. Every
  /// other failure class surfaces immediately. When both calls fail, the
  /// hint is derived from the first error so the operator sees the root
  /// cause (bad key vs. exhausted quota), not the fallback's symptom.
  async fn analyze_with_fallback(
    &self,
    request: &AnalyzeRequest,
  ) -> Result<AnalyzeResponse, TurnError> {
    let first = match self.defense.analyze(request).await {
      Ok(response) => return Ok(response),
      Err(e) => e,
    };

    if !first.warrants_simulated_fallback() {
      let hint = first.remediation_hint();
      return Err(TurnError::Analysis { source: first, hint });
    }

    tracing::warn!(
      error = %first,
      "paid backend rejected the call, retrying with the simulated backend"
    );
    match self.defense.analyze(&request.with_simulated_backend()).await {
      Ok(response) => Ok(response),
      Err(fallback) => {
        tracing::error!(error = %fallback, "simulated fallback failed too");
        let hint = first.remediation_hint();
        Err(TurnError::Analysis { source: first, hint })
      }
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
