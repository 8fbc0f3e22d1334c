//! HTTP implementation of [`shield_core::DefenseClient`].
//!
//! Performs exactly one `POST {base_url}/analyze` per invocation and
//! normalises transport failures into the [`DefenseError`] taxonomy. Retry
//! policy is owned by the turn processor, never by this crate.

use std::time::Duration;

use shield_core::defense::{
  AnalyzeRequest, AnalyzeResponse, DefenseClient, DefenseError,
};

/// Connection settings for the defense service.
///
/// The two timeouts are deliberately far apart: connection establishment
/// should fail fast (the service is either up or it isn't), while a
/// successful connection may legitimately take minutes to answer because the
/// service drives slow generative inference behind it.
#[derive(Debug, Clone)]
pub struct DefenseConfig {
  pub base_url:        String,
  pub connect_timeout: Duration,
  pub request_timeout: Duration,
}

impl Default for DefenseConfig {
  fn default() -> Self {
    Self {
      base_url:        "http://localhost:8000".to_string(),
      connect_timeout: Duration::from_secs(5),
      request_timeout: Duration::from_secs(180),
    }
  }
}

/// HTTP client for the external analysis service.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpDefenseClient {
  client: reqwest::Client,
  config: DefenseConfig,
}

impl HttpDefenseClient {
  pub fn new(config: DefenseConfig) -> Result<Self, DefenseError> {
    let client = reqwest::Client::builder()
      .connect_timeout(config.connect_timeout)
      .timeout(config.request_timeout)
      .build()
      .map_err(|e| DefenseError::Unknown(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client, config })
  }

  fn url(&self) -> String {
    format!("{}/analyze", self.config.base_url.trim_end_matches('/'))
  }

  /// Map a transport-level failure onto the error taxonomy. A timeout while
  /// establishing the connection counts as unreachable, not as an upstream
  /// timeout — the service never answered at all.
  fn classify(&self, e: reqwest::Error) -> DefenseError {
    if e.is_connect() {
      DefenseError::ServiceUnreachable(format!(
        "{} ({e})",
        self.config.base_url
      ))
    } else if e.is_timeout() {
      DefenseError::UpstreamTimeout(self.config.request_timeout)
    } else {
      DefenseError::Unknown(e.to_string())
    }
  }
}

impl DefenseClient for HttpDefenseClient {
  async fn analyze(
    &self,
    request: &AnalyzeRequest,
  ) -> Result<AnalyzeResponse, DefenseError> {
    let url = self.url();
    tracing::debug!(
      %url,
      model_type = request.model_type.as_str(),
      defense_mode = request.defense_mode.as_str(),
      "calling defense service"
    );

    let response = self
      .client
      .post(&url)
      .json(request)
      .send()
      .await
      .map_err(|e| self.classify(e))?;

    let status = response.status();
    if !status.is_success() {
      let detail = match response.text().await {
        Ok(body) => extract_detail(&body).unwrap_or(body),
        Err(_) => status.to_string(),
      };
      tracing::warn!(status = status.as_u16(), %detail, "defense service error");
      return Err(DefenseError::Upstream { status: status.as_u16(), detail });
    }

    response
      .json::<AnalyzeResponse>()
      .await
      .map_err(|e| self.classify(e))
  }
}

/// Pull the `detail` field out of a FastAPI-style error body, if present.
fn extract_detail(body: &str) -> Option<String> {
  let value: serde_json::Value = serde_json::from_str(body).ok()?;
  value.get("detail")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use axum::{Json, Router, http::StatusCode, routing::post};
  use shield_core::{
    defense::UpstreamKind,
    policy::Policy,
    session::{DefenseMode, IntentGraph, ModelType, ToolType},
  };

  use super::*;

  fn request() -> AnalyzeRequest {
    AnalyzeRequest {
      user_text:    "hello".into(),
      intent_graph: IntentGraph::default_for(ToolType::CodeReview),
      defense_mode: DefenseMode::Active,
      policy:       Policy::default(),
      model_type:   ModelType::Simulated,
    }
  }

  fn client_for(port: u16) -> HttpDefenseClient {
    HttpDefenseClient::new(DefenseConfig {
      base_url: format!("http://127.0.0.1:{port}"),
      ..DefenseConfig::default()
    })
    .unwrap()
  }

  async fn serve(app: Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    port
  }

  #[tokio::test]
  async fn analyze_decodes_a_successful_verdict() {
    let app = Router::new().route(
      "/analyze",
      post(|Json(body): Json<serde_json::Value>| async move {
        assert_eq!(body["modelType"], "simulated");
        assert_eq!(body["intentGraph"]["goal"], "code_review");
        Json(serde_json::json!({
          "updatedGraph": { "goal": "code_review", "allowed": [], "forbidden": [], "history": [] },
          "scores": { "semanticDrift": 1.0, "policyStress": 0.5, "reasoningMismatch": 0.5, "total": 2.0 },
          "riskLevel": "low",
          "action": "allow",
          "primaryOutput": "fine",
          "shadowOutput": "fine"
        }))
      }),
    );
    let port = serve(app).await;

    let verdict = client_for(port).analyze(&request()).await.unwrap();
    assert_eq!(verdict.scores.total, 2.0);
    assert_eq!(verdict.primary_output, "fine");
    assert!(verdict.divergence_log.is_none());
  }

  #[tokio::test]
  async fn upstream_error_carries_the_detail_field() {
    let app = Router::new().route(
      "/analyze",
      post(|| async {
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          Json(serde_json::json!({ "detail": "invalid_api_key" })),
        )
      }),
    );
    let port = serve(app).await;

    let err = client_for(port).analyze(&request()).await.unwrap_err();
    let DefenseError::Upstream { status, detail } = &err else {
      panic!("expected upstream error, got {err:?}");
    };
    assert_eq!(*status, 500);
    assert_eq!(detail, "invalid_api_key");
    assert_eq!(err.upstream_kind(), Some(UpstreamKind::Credential));
  }

  #[tokio::test]
  async fn refused_connection_reads_as_unreachable() {
    // Bind then immediately drop the listener so the port is closed.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = HttpDefenseClient::new(DefenseConfig {
      base_url:        format!("http://127.0.0.1:{port}"),
      connect_timeout: Duration::from_secs(1),
      request_timeout: Duration::from_secs(2),
    })
    .unwrap();

    let err = client.analyze(&request()).await.unwrap_err();
    assert!(
      matches!(err, DefenseError::ServiceUnreachable(_)),
      "got {err:?}"
    );
    assert!(!err.warrants_simulated_fallback());
  }

  #[test]
  fn detail_extraction_tolerates_non_json_bodies() {
    assert_eq!(
      extract_detail(r#"{"detail": "quota exceeded"}"#).as_deref(),
      Some("quota exceeded")
    );
    assert_eq!(extract_detail("Internal Server Error"), None);
    assert_eq!(extract_detail(r#"{"error": "nope"}"#), None);
  }
}
