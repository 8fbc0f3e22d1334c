//! The `ConversationStore` trait.
//!
//! Implemented by storage backends (e.g. `shield-store-sqlite`). Higher
//! layers (the turn processor, the HTTP API) depend on this abstraction, not
//! on any concrete backend.
//!
//! Four logical collections: sessions, turns, alerts, and the policy
//! singleton. Turns and alerts are append-only; sessions are updated in
//! place; nothing is ever deleted.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  alert::{Alert, NewAlert},
  policy::Policy,
  session::{NewSession, Session},
  turn::{NewTurn, Turn},
};

/// Abstraction over the conversation store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ConversationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Sessions ──────────────────────────────────────────────────────────

  /// Create and persist a new session. The `session_id` and `created_at`
  /// are assigned by the store.
  fn create_session(
    &self,
    input: NewSession,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + '_;

  /// Retrieve a session by id. Returns `None` if not found.
  fn get_session(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// List sessions owned by `user_id`, most recent first, at most `limit`.
  fn list_sessions<'a>(
    &'a self,
    user_id: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Session>, Self::Error>> + Send + 'a;

  /// Persist a session's mutable state (intent graph and trust score).
  ///
  /// There is no per-session locking: concurrent turns against the same
  /// session race read-modify-write and the last writer wins.
  fn update_session(
    &self,
    session: &Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Turns — append-only ───────────────────────────────────────────────

  /// Record a completed turn. The `turn_id` and `created_at` are assigned
  /// by the store.
  fn record_turn(
    &self,
    input: NewTurn,
  ) -> impl Future<Output = Result<Turn, Self::Error>> + Send + '_;

  /// All turns for a session, ordered by creation time ascending.
  fn list_turns(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Turn>, Self::Error>> + Send + '_;

  // ── Alerts — append-only ──────────────────────────────────────────────

  /// Raise an alert. The `alert_id` and `created_at` are assigned by the
  /// store.
  fn raise_alert(
    &self,
    input: NewAlert,
  ) -> impl Future<Output = Result<Alert, Self::Error>> + Send + '_;

  /// Alerts created strictly after `cursor`, ordered by creation time
  /// ascending. Used by the stream notifier's polling loop.
  fn alerts_since(
    &self,
    cursor: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Alert>, Self::Error>> + Send + '_;

  // ── Policy singleton ──────────────────────────────────────────────────

  /// The stored policy, if one has been seeded. `None` means callers apply
  /// [`Policy::default`].
  fn get_policy(
    &self,
  ) -> impl Future<Output = Result<Option<Policy>, Self::Error>> + Send + '_;

  /// Upsert the policy singleton.
  fn put_policy(
    &self,
    policy: &Policy,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
