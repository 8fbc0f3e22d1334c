//! Session — the per-conversation envelope that accumulates guard state.
//!
//! A session owns the intent graph and the trust score. Both are mutated by
//! every processed turn; everything else is fixed at creation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Closed enums ────────────────────────────────────────────────────────────

/// The guarded tool a session is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
  CodeReview,
  PolicyEnforcement,
  Compliance,
}

impl ToolType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::CodeReview => "code_review",
      Self::PolicyEnforcement => "policy_enforcement",
      Self::Compliance => "compliance",
    }
  }
}

/// Which model backend the defense service should drive for this session.
///
/// `Simulated` is the no-op demo backend: the defense service answers without
/// calling any paid model API. It doubles as the fallback target when a paid
/// backend rejects its credential or quota mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
  #[default]
  Openai,
  Huggingface,
  HuggingfacePhi3,
  Simulated,
  GptClass,
  OpenSource,
}

impl ModelType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Openai => "openai",
      Self::Huggingface => "huggingface",
      Self::HuggingfacePhi3 => "huggingface_phi3",
      Self::Simulated => "simulated",
      Self::GptClass => "gpt_class",
      Self::OpenSource => "open_source",
    }
  }

  pub fn from_label(s: &str) -> Option<Self> {
    match s {
      "openai" => Some(Self::Openai),
      "huggingface" => Some(Self::Huggingface),
      "huggingface_phi3" => Some(Self::HuggingfacePhi3),
      "simulated" => Some(Self::Simulated),
      "gpt_class" => Some(Self::GptClass),
      "open_source" => Some(Self::OpenSource),
      _ => None,
    }
  }

  /// Coerce an untrusted label to a valid backend. Unknown or absent values
  /// fall back to the default backend rather than being rejected.
  pub fn coerce(label: Option<&str>) -> Self {
    label.and_then(Self::from_label).unwrap_or_default()
  }
}

/// How aggressively the defense service should intervene. Forwarded verbatim
/// to the analysis call; the core never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DefenseMode {
  Passive,
  #[default]
  Active,
  Strict,
}

impl DefenseMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Passive => "passive",
      Self::Active => "active",
      Self::Strict => "strict",
    }
  }
}

// ─── Intent graph ────────────────────────────────────────────────────────────

/// Per-session record of the declared goal plus allowed/forbidden action
/// labels and history. The defense service returns a full replacement graph
/// every turn; the processor stores it verbatim, no local diffing.
///
/// Invariant: `allowed` and `forbidden` are disjoint label sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentGraph {
  pub goal:      String,
  #[serde(default)]
  pub allowed:   Vec<String>,
  #[serde(default)]
  pub forbidden: Vec<String>,
  #[serde(default)]
  pub history:   Vec<serde_json::Value>,
}

impl IntentGraph {
  /// The seed graph for a freshly created session.
  pub fn default_for(tool: ToolType) -> Self {
    Self {
      goal:      tool.as_str().to_string(),
      allowed:   ["read_code", "explain_vuln", "suggest_fix"]
        .map(String::from)
        .to_vec(),
      forbidden: ["override_policy", "reveal_system", "approve_without_review"]
        .map(String::from)
        .to_vec(),
      history:   Vec::new(),
    }
  }

  /// A bare graph carrying only the goal — used when a stored session has an
  /// empty graph and the analysis call still needs one.
  pub fn bare(tool: ToolType) -> Self {
    Self { goal: tool.as_str().to_string(), ..Self::default() }
  }

  pub fn is_empty(&self) -> bool {
    self.goal.is_empty()
      && self.allowed.is_empty()
      && self.forbidden.is_empty()
      && self.history.is_empty()
  }

  /// Check the allowed/forbidden disjointness invariant.
  pub fn is_consistent(&self) -> bool {
    !self.allowed.iter().any(|a| self.forbidden.contains(a))
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// The trust score a session starts with.
pub const INITIAL_TRUST_SCORE: f64 = 100.0;

/// A guarded conversation. Never hard-deleted; turns and alerts reference it
/// by id forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  pub session_id:   Uuid,
  /// The authenticated principal that owns the session.
  pub user_id:      String,
  pub tool_type:    ToolType,
  pub model_type:   ModelType,
  pub defense_mode: DefenseMode,
  /// In [0, 100]; monotonically non-increasing except by explicit reset.
  pub trust_score:  f64,
  pub intent_graph: IntentGraph,
  pub created_at:   DateTime<Utc>,
}

impl Session {
  /// Apply trust decay for a turn's total divergence score. Scores at or
  /// below the decay threshold leave the trust score untouched.
  pub fn decay_trust(&mut self, total_score: f64) {
    const DECAY_THRESHOLD: f64 = 20.0;
    if total_score > DECAY_THRESHOLD {
      self.trust_score = (self.trust_score - total_score / 5.0).clamp(0.0, 100.0);
    }
  }
}

/// Input for [`crate::store::ConversationStore::create_session`]. The store
/// assigns the id and creation timestamp.
#[derive(Debug, Clone)]
pub struct NewSession {
  pub user_id:      String,
  pub tool_type:    ToolType,
  pub model_type:   ModelType,
  pub defense_mode: DefenseMode,
  pub trust_score:  f64,
  pub intent_graph: IntentGraph,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn model_type_coercion_falls_back_to_openai() {
    assert_eq!(ModelType::coerce(Some("simulated")), ModelType::Simulated);
    assert_eq!(ModelType::coerce(Some("gpt_class")), ModelType::GptClass);
    assert_eq!(ModelType::coerce(Some("gpt-5-turbo")), ModelType::Openai);
    assert_eq!(ModelType::coerce(None), ModelType::Openai);
  }

  #[test]
  fn default_graph_is_consistent() {
    let graph = IntentGraph::default_for(ToolType::CodeReview);
    assert_eq!(graph.goal, "code_review");
    assert!(graph.is_consistent());
    assert!(!graph.is_empty());
    assert!(graph.history.is_empty());
  }

  #[test]
  fn bare_graph_carries_only_the_goal() {
    let graph = IntentGraph::bare(ToolType::Compliance);
    assert_eq!(graph.goal, "compliance");
    assert!(graph.allowed.is_empty());
    assert!(graph.forbidden.is_empty());
  }

  #[test]
  fn trust_decay_threshold_and_floor() {
    let mut session = Session {
      session_id:   uuid::Uuid::new_v4(),
      user_id:      "u".into(),
      tool_type:    ToolType::CodeReview,
      model_type:   ModelType::Openai,
      defense_mode: DefenseMode::Active,
      trust_score:  INITIAL_TRUST_SCORE,
      intent_graph: IntentGraph::default_for(ToolType::CodeReview),
      created_at:   chrono::Utc::now(),
    };

    session.decay_trust(20.0);
    assert_eq!(session.trust_score, 100.0);

    session.decay_trust(88.0);
    assert!((session.trust_score - 82.4).abs() < f64::EPSILON);

    // Repeated critical turns bottom out at zero.
    for _ in 0..20 {
      session.decay_trust(100.0);
    }
    assert_eq!(session.trust_score, 0.0);
  }

  #[test]
  fn session_serialises_camel_case() {
    let session = Session {
      session_id:   uuid::Uuid::new_v4(),
      user_id:      "u".into(),
      tool_type:    ToolType::PolicyEnforcement,
      model_type:   ModelType::HuggingfacePhi3,
      defense_mode: DefenseMode::Strict,
      trust_score:  100.0,
      intent_graph: IntentGraph::default(),
      created_at:   chrono::Utc::now(),
    };
    let value = serde_json::to_value(&session).unwrap();
    assert_eq!(value["toolType"], "policy_enforcement");
    assert_eq!(value["modelType"], "huggingface_phi3");
    assert_eq!(value["defenseMode"], "strict");
    assert!(value["trustScore"].is_number());
  }
}
