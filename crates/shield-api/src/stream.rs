//! The alert stream — a long-lived SSE channel backed by store polling.
//!
//! On connect the handler immediately emits a connectivity acknowledgment,
//! then polls the alert store every two seconds for records newer than a
//! moving cursor and relays each as a `data:` event. The loop ends when the
//! client disconnects (the stream is dropped) or a store error occurs
//! mid-poll; store errors are logged, not retried within the connection.

use std::{convert::Infallible, time::Duration};

use axum::{
  extract::State,
  response::sse::{Event, Sse},
};
use chrono::Utc;
use futures::Stream;

use shield_core::{DefenseClient, store::ConversationStore};

use crate::AppState;

/// How often the store is polled for new alerts.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// `GET /api/stream`
pub async fn alerts<S, D>(
  State(state): State<AppState<S, D>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
  S: ConversationStore + 'static,
  D: DefenseClient + 'static,
{
  let store = state.store.clone();

  let stream = async_stream::stream! {
    yield Ok(Event::default().data(r#"{"connected": true}"#));

    let mut cursor = Utc::now();
    loop {
      tokio::time::sleep(POLL_INTERVAL).await;

      let alerts = match store.alerts_since(cursor).await {
        Ok(alerts) => alerts,
        Err(e) => {
          tracing::error!(error = %e, "alert stream poll failed, closing");
          break;
        }
      };

      if let Some(last) = alerts.last() {
        cursor = last.created_at;
      }
      for alert in alerts {
        yield Ok(
          Event::default()
            .json_data(&alert)
            .unwrap_or_else(|_| Event::default().data("{}")),
        );
      }
    }
  };

  Sse::new(stream)
}
