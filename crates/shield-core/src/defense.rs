//! The `DefenseClient` trait, its wire types, and the error taxonomy.
//!
//! The actual divergence analysis (dual-model comparison, intent-graph
//! updates, sanitisation) lives in an external service. The core only sees
//! one opaque remote procedure: `analyze(request) -> response`. Concrete
//! transports (`shield-defense`) implement this trait; tests stub it.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  policy::Policy,
  session::{DefenseMode, IntentGraph, ModelType},
  turn::{DefenseAction, DivergenceLog, RiskLevel, ScoreVector},
};

// ─── Wire types ──────────────────────────────────────────────────────────────

/// Payload for `POST {endpoint}/analyze`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
  pub user_text:    String,
  pub intent_graph: IntentGraph,
  pub defense_mode: DefenseMode,
  pub policy:       Policy,
  pub model_type:   ModelType,
}

impl AnalyzeRequest {
  /// The same request retargeted at the no-op simulated backend.
  pub fn with_simulated_backend(&self) -> Self {
    Self { model_type: ModelType::Simulated, ..self.clone() }
  }
}

/// The analysis verdict for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
  /// Full replacement for the session's intent graph.
  pub updated_graph:  IntentGraph,
  pub scores:         ScoreVector,
  pub risk_level:     RiskLevel,
  pub action:         DefenseAction,
  #[serde(default)]
  pub primary_output: String,
  #[serde(default)]
  pub shadow_output:  String,
  #[serde(default)]
  pub sanitized_text: Option<String>,
  #[serde(default)]
  pub divergence_log: Option<DivergenceLog>,
}

// ─── Error taxonomy ──────────────────────────────────────────────────────────

/// Sub-classification of an upstream HTTP error, derived from its detail
/// message. Drives the turn processor's fallback policy: only credential and
/// quota errors earn a retry against the simulated backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
  /// Invalid or expired API credential for a paid model backend.
  Credential,
  /// Plan or rate quota exceeded on a paid model backend.
  Quota,
  Other,
}

/// Failures surfaced by a [`DefenseClient`] implementation.
#[derive(Debug, Error)]
pub enum DefenseError {
  /// Connection refused, DNS failure, or a timeout establishing the
  /// connection. The service is not answering at all.
  #[error("defense service unreachable: {0}")]
  ServiceUnreachable(String),

  /// Connected, but no response arrived within the body timeout.
  #[error("defense service timed out after {0:?}")]
  UpstreamTimeout(Duration),

  /// The service answered with a non-success status.
  #[error("defense service error (status {status}): {detail}")]
  Upstream { status: u16, detail: String },

  #[error("unexpected defense client failure: {0}")]
  Unknown(String),
}

impl DefenseError {
  /// Classify an [`DefenseError::Upstream`] detail message. Non-upstream
  /// errors return `None`.
  pub fn upstream_kind(&self) -> Option<UpstreamKind> {
    let DefenseError::Upstream { detail, .. } = self else {
      return None;
    };
    let detail = detail.to_lowercase();
    if detail.contains("invalid_api_key")
      || detail.contains("incorrect api key")
      || detail.contains("401")
    {
      Some(UpstreamKind::Credential)
    } else if detail.contains("insufficient_quota")
      || detail.contains("quota")
      || detail.contains("429")
    {
      Some(UpstreamKind::Quota)
    } else {
      Some(UpstreamKind::Other)
    }
  }

  /// Whether the turn processor should retry once against the simulated
  /// backend before surfacing this error.
  pub fn warrants_simulated_fallback(&self) -> bool {
    matches!(
      self.upstream_kind(),
      Some(UpstreamKind::Credential | UpstreamKind::Quota)
    )
  }

  /// A user-facing hint telling the operator how to get unstuck.
  pub fn remediation_hint(&self) -> String {
    match (self, self.upstream_kind()) {
      (DefenseError::ServiceUnreachable(_), _) => {
        "Defense service unreachable. Start it (see defense_url in the \
         config), or create a session with the simulated model backend."
          .to_string()
      }
      (DefenseError::UpstreamTimeout(_), _) => {
        "Defense service or its model backend is slow or down. Check the \
         backend, or create a session with the simulated model backend."
          .to_string()
      }
      (_, Some(UpstreamKind::Credential)) => {
        "Set a valid API key for the primary model backend, or create a \
         session with the simulated model backend."
          .to_string()
      }
      (_, Some(UpstreamKind::Quota)) => {
        "Check your model provider plan and billing, or create a session \
         with the simulated model backend."
          .to_string()
      }
      (DefenseError::Upstream { detail, .. }, _) => detail.clone(),
      (DefenseError::Unknown(detail), _) => {
        format!("Unexpected error during turn analysis: {detail}")
      }
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the external analysis service.
///
/// Implementations perform exactly one outbound call per invocation; retry
/// policy is owned by the caller. The returned futures are `Send` so the
/// trait can be used from multi-threaded async runtimes.
pub trait DefenseClient: Send + Sync {
  fn analyze(
    &self,
    request: &AnalyzeRequest,
  ) -> impl Future<Output = Result<AnalyzeResponse, DefenseError>> + Send;
}

#[cfg(test)]
mod tests {
  use super::*;

  fn upstream(detail: &str) -> DefenseError {
    DefenseError::Upstream { status: 500, detail: detail.to_string() }
  }

  #[test]
  fn credential_patterns_classify() {
    for detail in [
      "Defense service error: invalid_api_key",
      "Incorrect API key provided",
      "openai returned 401 unauthorized",
    ] {
      assert_eq!(
        upstream(detail).upstream_kind(),
        Some(UpstreamKind::Credential),
        "{detail}"
      );
    }
  }

  #[test]
  fn quota_patterns_classify() {
    for detail in ["insufficient_quota", "You exceeded your quota", "got 429"] {
      assert_eq!(
        upstream(detail).upstream_kind(),
        Some(UpstreamKind::Quota),
        "{detail}"
      );
    }
  }

  #[test]
  fn other_upstream_errors_do_not_warrant_fallback() {
    let err = upstream("internal divergence analyzer crash");
    assert_eq!(err.upstream_kind(), Some(UpstreamKind::Other));
    assert!(!err.warrants_simulated_fallback());
  }

  #[test]
  fn transport_errors_do_not_warrant_fallback() {
    let unreachable = DefenseError::ServiceUnreachable("refused".into());
    assert_eq!(unreachable.upstream_kind(), None);
    assert!(!unreachable.warrants_simulated_fallback());

    let timeout = DefenseError::UpstreamTimeout(Duration::from_secs(180));
    assert!(!timeout.warrants_simulated_fallback());
  }

  #[test]
  fn credential_and_quota_hints_differ() {
    let credential = upstream("invalid_api_key").remediation_hint();
    let quota = upstream("insufficient_quota").remediation_hint();
    assert_ne!(credential, quota);
    assert!(credential.contains("API key"));
    assert!(quota.contains("billing"));
  }
}
