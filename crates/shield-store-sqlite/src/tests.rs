//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::Utc;
use shield_core::{
  alert::NewAlert,
  policy::{DivergenceThresholds, Policy},
  session::{
    DefenseMode, INITIAL_TRUST_SCORE, IntentGraph, ModelType, NewSession, ToolType,
  },
  store::ConversationStore,
  turn::{DefenseAction, DivergenceLog, NewTurn, RiskLevel, ScoreVector},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_session(user_id: &str) -> NewSession {
  NewSession {
    user_id:      user_id.to_string(),
    tool_type:    ToolType::CodeReview,
    model_type:   ModelType::Openai,
    defense_mode: DefenseMode::Active,
    trust_score:  INITIAL_TRUST_SCORE,
    intent_graph: IntentGraph::default_for(ToolType::CodeReview),
  }
}

fn new_turn(session_id: Uuid, user_text: &str, risk: RiskLevel) -> NewTurn {
  let scores = ScoreVector {
    semantic_drift:     12.0,
    policy_stress:      3.0,
    reasoning_mismatch: 5.0,
    total:              20.0,
  };
  NewTurn {
    session_id,
    user_text: user_text.to_string(),
    primary_output: "primary answer".into(),
    shadow_output: "shadow answer".into(),
    scores,
    risk_level: risk,
    action: DefenseAction::Allow,
    divergence_log: DivergenceLog::synthesized(&scores, DefenseAction::Allow),
    sanitized_text: None,
    latency_ms: 412,
  }
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_session() {
  let s = store().await;

  let session = s.create_session(new_session("alice")).await.unwrap();
  assert_eq!(session.trust_score, 100.0);

  let fetched = s.get_session(session.session_id).await.unwrap();
  assert!(fetched.is_some());
  let fetched = fetched.unwrap();
  assert_eq!(fetched.session_id, session.session_id);
  assert_eq!(fetched.tool_type, ToolType::CodeReview);
  assert_eq!(fetched.intent_graph.goal, "code_review");
  assert_eq!(fetched.intent_graph.allowed.len(), 3);
}

#[tokio::test]
async fn get_session_missing_returns_none() {
  let s = store().await;
  let result = s.get_session(Uuid::new_v4()).await.unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn list_sessions_is_scoped_to_the_owner_and_bounded() {
  let s = store().await;
  for _ in 0..25 {
    s.create_session(new_session("alice")).await.unwrap();
  }
  s.create_session(new_session("bob")).await.unwrap();

  let page = s.list_sessions("alice", 20).await.unwrap();
  assert_eq!(page.len(), 20);
  assert!(page.iter().all(|sess| sess.user_id == "alice"));

  // Newest first.
  for pair in page.windows(2) {
    assert!(pair[0].created_at >= pair[1].created_at);
  }
}

#[tokio::test]
async fn update_session_persists_trust_and_graph() {
  let s = store().await;
  let mut session = s.create_session(new_session("alice")).await.unwrap();

  session.trust_score = 82.4;
  session.intent_graph = IntentGraph {
    goal:      "code_review".into(),
    allowed:   vec!["read_code".into()],
    forbidden: vec!["reveal_system".into()],
    history:   vec![serde_json::json!({"turn": 1})],
  };
  s.update_session(&session).await.unwrap();

  let fetched = s.get_session(session.session_id).await.unwrap().unwrap();
  assert!((fetched.trust_score - 82.4).abs() < 1e-9);
  assert_eq!(fetched.intent_graph.history.len(), 1);
  assert_eq!(fetched.intent_graph.allowed, vec!["read_code".to_string()]);
}

// ─── Turns ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_turn_and_list_in_creation_order() {
  let s = store().await;
  let session = s.create_session(new_session("alice")).await.unwrap();

  s.record_turn(new_turn(session.session_id, "one", RiskLevel::Low))
    .await
    .unwrap();
  s.record_turn(new_turn(session.session_id, "two", RiskLevel::Medium))
    .await
    .unwrap();
  s.record_turn(new_turn(session.session_id, "three", RiskLevel::Low))
    .await
    .unwrap();

  let turns = s.list_turns(session.session_id).await.unwrap();
  assert_eq!(turns.len(), 3);
  let texts: Vec<&str> = turns.iter().map(|t| t.user_text.as_str()).collect();
  assert_eq!(texts, vec!["one", "two", "three"]);

  let again = s.list_turns(session.session_id).await.unwrap();
  let ids: Vec<_> = turns.iter().map(|t| t.turn_id).collect();
  let ids_again: Vec<_> = again.iter().map(|t| t.turn_id).collect();
  assert_eq!(ids, ids_again);
}

#[tokio::test]
async fn turn_round_trips_all_fields() {
  let s = store().await;
  let session = s.create_session(new_session("alice")).await.unwrap();

  let mut input = new_turn(session.session_id, "risky", RiskLevel::High);
  input.action = DefenseAction::SanitizeRerun;
  input.sanitized_text = Some("cleaned text".into());
  input.divergence_log = DivergenceLog {
    divergence_score:     64.0,
    action:               "sanitize_rerun".into(),
    defense_action_taken: true,
    rerun_with_cleaned:   true,
  };
  let recorded = s.record_turn(input).await.unwrap();

  let turns = s.list_turns(session.session_id).await.unwrap();
  let fetched = &turns[0];
  assert_eq!(fetched.turn_id, recorded.turn_id);
  assert_eq!(fetched.action, DefenseAction::SanitizeRerun);
  assert_eq!(fetched.risk_level, RiskLevel::High);
  assert_eq!(fetched.sanitized_text.as_deref(), Some("cleaned text"));
  assert!(fetched.divergence_log.defense_action_taken);
  assert_eq!(fetched.scores.semantic_drift, 12.0);
  assert_eq!(fetched.latency_ms, 412);
}

#[tokio::test]
async fn turns_are_scoped_to_their_session() {
  let s = store().await;
  let a = s.create_session(new_session("alice")).await.unwrap();
  let b = s.create_session(new_session("alice")).await.unwrap();

  s.record_turn(new_turn(a.session_id, "for a", RiskLevel::Low))
    .await
    .unwrap();

  assert_eq!(s.list_turns(a.session_id).await.unwrap().len(), 1);
  assert!(s.list_turns(b.session_id).await.unwrap().is_empty());
}

// ─── Alerts ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn alerts_since_respects_the_cursor() {
  let s = store().await;
  let session = s.create_session(new_session("alice")).await.unwrap();

  let before_any = Utc::now();
  let first = s
    .raise_alert(NewAlert {
      session_id: session.session_id,
      turn_id:    None,
      risk_level: RiskLevel::High,
      title:      "Risk detected: clarify".into(),
    })
    .await
    .unwrap();

  let fresh = s.alerts_since(before_any).await.unwrap();
  assert_eq!(fresh.len(), 1);
  assert_eq!(fresh[0].alert_id, first.alert_id);
  assert_eq!(fresh[0].turn_id, None);

  // Nothing newer than the first alert's own timestamp.
  let none = s.alerts_since(first.created_at).await.unwrap();
  assert!(none.is_empty());

  let second = s
    .raise_alert(NewAlert {
      session_id: session.session_id,
      turn_id:    Some(Uuid::new_v4()),
      risk_level: RiskLevel::Critical,
      title:      "Risk detected: contain".into(),
    })
    .await
    .unwrap();

  let newer = s.alerts_since(first.created_at).await.unwrap();
  assert_eq!(newer.len(), 1);
  assert_eq!(newer[0].alert_id, second.alert_id);
  assert_eq!(newer[0].risk_level, RiskLevel::Critical);
}

// ─── Policy ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn policy_singleton_upserts() {
  let s = store().await;
  assert!(s.get_policy().await.unwrap().is_none());

  let policy = Policy {
    divergence_thresholds: DivergenceThresholds {
      low:      5.0,
      medium:   25.0,
      high:     55.0,
      critical: 80.0,
    },
    trust_decay:           4.0,
    shadow_enabled:        false,
    defense_mode_default:  DefenseMode::Strict,
  };
  s.put_policy(&policy).await.unwrap();

  let stored = s.get_policy().await.unwrap().unwrap();
  assert_eq!(stored.divergence_thresholds.critical, 80.0);
  assert_eq!(stored.defense_mode_default, DefenseMode::Strict);

  // Second write replaces, never duplicates.
  s.put_policy(&Policy::default()).await.unwrap();
  let stored = s.get_policy().await.unwrap().unwrap();
  assert_eq!(stored.divergence_thresholds.critical, 85.0);
  assert_eq!(stored.defense_mode_default, DefenseMode::Active);
}
