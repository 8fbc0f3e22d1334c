//! Alert — a read-only record raised for high-risk turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::turn::RiskLevel;

/// Raised synchronously after turn persistence when the turn's risk level is
/// `high` or `critical`. Consumed by the stream notifier via a
/// creation-timestamp cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
  pub alert_id:   Uuid,
  pub session_id: Uuid,
  /// The triggering turn, when known.
  pub turn_id:    Option<Uuid>,
  pub risk_level: RiskLevel,
  pub title:      String,
  pub created_at: DateTime<Utc>,
}

/// Input for [`crate::store::ConversationStore::raise_alert`]. The store
/// assigns the id and creation timestamp.
#[derive(Debug, Clone)]
pub struct NewAlert {
  pub session_id: Uuid,
  pub turn_id:    Option<Uuid>,
  pub risk_level: RiskLevel,
  pub title:      String,
}
