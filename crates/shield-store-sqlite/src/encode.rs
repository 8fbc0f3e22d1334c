//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Structured fields (intent
//! graph, score vector, divergence log, policy) are stored as compact JSON.
//! UUIDs are stored as hyphenated lowercase strings; closed enums as their
//! wire labels.

use chrono::{DateTime, Utc};
use shield_core::{
  session::{DefenseMode, IntentGraph, ModelType, ToolType},
  turn::{DefenseAction, DivergenceLog, RiskLevel, ScoreVector},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Closed enums ─────────────────────────────────────────────────────────────

pub fn decode_tool_type(s: &str) -> Result<ToolType> {
  match s {
    "code_review" => Ok(ToolType::CodeReview),
    "policy_enforcement" => Ok(ToolType::PolicyEnforcement),
    "compliance" => Ok(ToolType::Compliance),
    other => Err(unknown("tool_type", other)),
  }
}

pub fn decode_model_type(s: &str) -> Result<ModelType> {
  ModelType::from_label(s).ok_or_else(|| unknown("model_type", s))
}

pub fn decode_defense_mode(s: &str) -> Result<DefenseMode> {
  match s {
    "passive" => Ok(DefenseMode::Passive),
    "active" => Ok(DefenseMode::Active),
    "strict" => Ok(DefenseMode::Strict),
    other => Err(unknown("defense_mode", other)),
  }
}

pub fn decode_risk_level(s: &str) -> Result<RiskLevel> {
  match s {
    "low" => Ok(RiskLevel::Low),
    "medium" => Ok(RiskLevel::Medium),
    "high" => Ok(RiskLevel::High),
    "critical" => Ok(RiskLevel::Critical),
    other => Err(unknown("risk_level", other)),
  }
}

pub fn decode_action(s: &str) -> Result<DefenseAction> {
  match s {
    "allow" => Ok(DefenseAction::Allow),
    "clarify" => Ok(DefenseAction::Clarify),
    "sanitize_rerun" => Ok(DefenseAction::SanitizeRerun),
    "contain" => Ok(DefenseAction::Contain),
    other => Err(unknown("action", other)),
  }
}

fn unknown(column: &'static str, value: &str) -> Error {
  Error::UnknownEnum { column, value: value.to_string() }
}

// ─── JSON columns ─────────────────────────────────────────────────────────────

pub fn encode_json<T: serde::Serialize>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

pub fn decode_graph(s: &str) -> Result<IntentGraph> {
  Ok(serde_json::from_str(s)?)
}

pub fn decode_scores(s: &str) -> Result<ScoreVector> {
  Ok(serde_json::from_str(s)?)
}

pub fn decode_divergence_log(s: &str) -> Result<DivergenceLog> {
  Ok(serde_json::from_str(s)?)
}
