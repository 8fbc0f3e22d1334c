//! Policy — the singleton threshold configuration.
//!
//! At most one record is persisted. Resolution happens once per request: a
//! missing record yields the hard-coded defaults, so a bare deployment
//! behaves sensibly without any seeding step.

use serde::{Deserialize, Serialize};

use crate::session::DefenseMode;

/// Four ascending breakpoints mapping a divergence score to a risk level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DivergenceThresholds {
  pub low:      f64,
  pub medium:   f64,
  pub high:     f64,
  pub critical: f64,
}

impl Default for DivergenceThresholds {
  fn default() -> Self {
    Self { low: 10.0, medium: 30.0, high: 60.0, critical: 85.0 }
  }
}

/// The effective guard policy, forwarded to every analysis call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
  #[serde(default)]
  pub divergence_thresholds: DivergenceThresholds,
  #[serde(default = "default_trust_decay")]
  pub trust_decay:           f64,
  #[serde(default = "default_shadow_enabled")]
  pub shadow_enabled:        bool,
  #[serde(default)]
  pub defense_mode_default:  DefenseMode,
}

fn default_trust_decay() -> f64 { 5.0 }
fn default_shadow_enabled() -> bool { true }

impl Default for Policy {
  fn default() -> Self {
    Self {
      divergence_thresholds: DivergenceThresholds::default(),
      trust_decay:           default_trust_decay(),
      shadow_enabled:        default_shadow_enabled(),
      defense_mode_default:  DefenseMode::Active,
    }
  }
}

impl Policy {
  /// Resolve the stored singleton into an effective policy.
  pub fn resolve(stored: Option<Policy>) -> Policy {
    stored.unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn absent_record_yields_hardcoded_defaults() {
    let policy = Policy::resolve(None);
    assert_eq!(policy.divergence_thresholds.low, 10.0);
    assert_eq!(policy.divergence_thresholds.medium, 30.0);
    assert_eq!(policy.divergence_thresholds.high, 60.0);
    assert_eq!(policy.divergence_thresholds.critical, 85.0);
    assert_eq!(policy.trust_decay, 5.0);
    assert!(policy.shadow_enabled);
    assert_eq!(policy.defense_mode_default, DefenseMode::Active);
  }

  #[test]
  fn stored_record_wins() {
    let stored = Policy {
      divergence_thresholds: DivergenceThresholds {
        low:      5.0,
        medium:   20.0,
        high:     50.0,
        critical: 80.0,
      },
      trust_decay:           2.0,
      shadow_enabled:        false,
      defense_mode_default:  DefenseMode::Strict,
    };
    let policy = Policy::resolve(Some(stored));
    assert_eq!(policy.divergence_thresholds.high, 50.0);
    assert_eq!(policy.defense_mode_default, DefenseMode::Strict);
  }

  #[test]
  fn partial_json_fills_defaults() {
    let policy: Policy = serde_json::from_str("{}").unwrap();
    assert_eq!(policy.trust_decay, 5.0);
    assert!(policy.shadow_enabled);
  }
}
