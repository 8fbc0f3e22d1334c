//! JSON API and alert stream for ShieldLLM.
//!
//! Exposes an axum [`Router`] backed by any
//! [`shield_core::store::ConversationStore`] and any
//! [`shield_core::DefenseClient`]. TLS and reverse-proxy concerns are the
//! caller's responsibility.

pub mod auth;
pub mod error;
pub mod sessions;
pub mod stream;
pub mod turns;


use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  routing::get,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use shield_core::{
  DefenseClient, TurnProcessor, lifecycle::SessionManager,
  store::ConversationStore,
};

use auth::AuthConfig;
pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  /// Base URL of the external defense service.
  #[serde(default = "default_defense_url")]
  pub defense_url:        String,
  pub auth_username:      String,
  pub auth_password_hash: String,
}

fn default_defense_url() -> String {
  "http://localhost:8000".to_string()
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, D> {
  pub store:     Arc<S>,
  pub processor: TurnProcessor<S, D>,
  pub sessions:  SessionManager<S>,
  pub auth:      Arc<AuthConfig>,
}

impl<S, D> Clone for AppState<S, D> {
  fn clone(&self) -> Self {
    Self {
      store:     self.store.clone(),
      processor: self.processor.clone(),
      sessions:  self.sessions.clone(),
      auth:      self.auth.clone(),
    }
  }
}

impl<S, D> AppState<S, D>
where
  S: ConversationStore,
  D: DefenseClient,
{
  pub fn new(store: Arc<S>, defense: Arc<D>, auth: Arc<AuthConfig>) -> Self {
    Self {
      processor: TurnProcessor::new(store.clone(), defense),
      sessions:  SessionManager::new(store.clone()),
      store,
      auth,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router.
///
/// Every route requires HTTP Basic auth except `/api/health` and
/// `/api/stream`. Browser `EventSource` cannot attach credentials, so the
/// alert stream stays open; run it behind a reverse proxy if that matters.
pub fn router<S, D>(state: AppState<S, D>) -> Router
where
  S: ConversationStore + 'static,
  D: DefenseClient + 'static,
{
  Router::new()
    .route("/api/health", get(health))
    .route(
      "/api/sessions",
      get(sessions::list::<S, D>).post(sessions::create::<S, D>),
    )
    .route(
      "/api/sessions/{id}/turns",
      get(turns::list::<S, D>).post(turns::create::<S, D>),
    )
    .route("/api/stream", get(stream::alerts::<S, D>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// `GET /api/health`
async fn health() -> Json<serde_json::Value> {
  Json(serde_json::json!({ "status": "running" }))
}
