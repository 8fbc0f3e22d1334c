//! Turn — one processed user message and its analysis verdict.
//!
//! Turns are immutable once recorded. The score vector is produced by the
//! external analysis service; `total` is its own roll-up of the three
//! sub-scores and is never recomputed locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Verdict enums ───────────────────────────────────────────────────────────

/// Risk classification assigned by the analysis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
  #[default]
  Low,
  Medium,
  High,
  Critical,
}

impl RiskLevel {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Low => "low",
      Self::Medium => "medium",
      Self::High => "high",
      Self::Critical => "critical",
    }
  }

  /// Whether a turn at this level raises an alert.
  pub fn is_alerting(&self) -> bool {
    matches!(self, Self::High | Self::Critical)
  }
}

/// The defensive action the analysis service took (or recommends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DefenseAction {
  #[default]
  Allow,
  Clarify,
  SanitizeRerun,
  Contain,
}

impl DefenseAction {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Allow => "allow",
      Self::Clarify => "clarify",
      Self::SanitizeRerun => "sanitize_rerun",
      Self::Contain => "contain",
    }
  }
}

impl std::fmt::Display for DefenseAction {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Scores ──────────────────────────────────────────────────────────────────

/// The fixed-shape divergence score vector returned per turn.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreVector {
  #[serde(default)]
  pub semantic_drift:     f64,
  #[serde(default)]
  pub policy_stress:      f64,
  #[serde(default)]
  pub reasoning_mismatch: f64,
  /// Roll-up of the three sub-scores; the combination function is owned by
  /// the analysis service.
  #[serde(default)]
  pub total:              f64,
}

/// Summary of the defensive decision for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivergenceLog {
  pub divergence_score:     f64,
  pub action:               String,
  pub defense_action_taken: bool,
  pub rerun_with_cleaned:   bool,
}

impl DivergenceLog {
  /// Build a log for responses that omit one: score mirrors the roll-up and
  /// no defensive action or clean rerun is recorded.
  pub fn synthesized(scores: &ScoreVector, action: DefenseAction) -> Self {
    Self {
      divergence_score:     scores.total,
      action:               action.as_str().to_string(),
      defense_action_taken: false,
      rerun_with_cleaned:   false,
    }
  }
}

// ─── Turn ────────────────────────────────────────────────────────────────────

/// One completed exchange, belonging to exactly one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
  pub turn_id:        Uuid,
  pub session_id:     Uuid,
  pub user_text:      String,
  pub primary_output: String,
  pub shadow_output:  String,
  pub scores:         ScoreVector,
  pub risk_level:     RiskLevel,
  pub action:         DefenseAction,
  pub divergence_log: DivergenceLog,
  pub sanitized_text: Option<String>,
  pub latency_ms:     u64,
  pub created_at:     DateTime<Utc>,
}

/// Input for [`crate::store::ConversationStore::record_turn`]. The store
/// assigns the id and creation timestamp.
#[derive(Debug, Clone)]
pub struct NewTurn {
  pub session_id:     Uuid,
  pub user_text:      String,
  pub primary_output: String,
  pub shadow_output:  String,
  pub scores:         ScoreVector,
  pub risk_level:     RiskLevel,
  pub action:         DefenseAction,
  pub divergence_log: DivergenceLog,
  pub sanitized_text: Option<String>,
  pub latency_ms:     u64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_high_and_critical_alert() {
    assert!(!RiskLevel::Low.is_alerting());
    assert!(!RiskLevel::Medium.is_alerting());
    assert!(RiskLevel::High.is_alerting());
    assert!(RiskLevel::Critical.is_alerting());
  }

  #[test]
  fn synthesized_log_mirrors_total_score() {
    let scores = ScoreVector { total: 42.5, ..ScoreVector::default() };
    let log = DivergenceLog::synthesized(&scores, DefenseAction::Clarify);
    assert_eq!(log.divergence_score, 42.5);
    assert_eq!(log.action, "clarify");
    assert!(!log.defense_action_taken);
    assert!(!log.rerun_with_cleaned);
  }

  #[test]
  fn score_vector_tolerates_missing_fields() {
    let scores: ScoreVector = serde_json::from_str(r#"{"total": 12.0}"#).unwrap();
    assert_eq!(scores.total, 12.0);
    assert_eq!(scores.semantic_drift, 0.0);
  }

  #[test]
  fn action_wire_labels() {
    assert_eq!(
      serde_json::to_value(DefenseAction::SanitizeRerun).unwrap(),
      "sanitize_rerun"
    );
    assert_eq!(DefenseAction::SanitizeRerun.to_string(), "sanitize_rerun");
  }
}
