//! [`SqliteStore`] — the SQLite implementation of [`ConversationStore`].

use std::{future::Future, path::Path};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use shield_core::{
  alert::{Alert, NewAlert},
  policy::Policy,
  session::{NewSession, Session},
  store::ConversationStore,
  turn::{NewTurn, Turn},
};

use crate::{
  Error, Result,
  encode::{
    decode_action, decode_defense_mode, decode_divergence_log, decode_dt,
    decode_graph, decode_model_type, decode_risk_level, decode_scores,
    decode_tool_type, decode_uuid, encode_dt, encode_json, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A `sessions` row before decoding — plain strings straight out of SQLite.
struct RawSession {
  session_id:   String,
  user_id:      String,
  tool_type:    String,
  model_type:   String,
  defense_mode: String,
  trust_score:  f64,
  intent_graph: String,
  created_at:   String,
}

impl RawSession {
  fn decode(self) -> Result<Session> {
    Ok(Session {
      session_id:   decode_uuid(&self.session_id)?,
      user_id:      self.user_id,
      tool_type:    decode_tool_type(&self.tool_type)?,
      model_type:   decode_model_type(&self.model_type)?,
      defense_mode: decode_defense_mode(&self.defense_mode)?,
      trust_score:  self.trust_score,
      intent_graph: decode_graph(&self.intent_graph)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }

  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id:   row.get(0)?,
      user_id:      row.get(1)?,
      tool_type:    row.get(2)?,
      model_type:   row.get(3)?,
      defense_mode: row.get(4)?,
      trust_score:  row.get(5)?,
      intent_graph: row.get(6)?,
      created_at:   row.get(7)?,
    })
  }
}

const SESSION_COLS: &str =
  "session_id, user_id, tool_type, model_type, defense_mode, trust_score, \
   intent_graph, created_at";

struct RawTurn {
  turn_id:        String,
  session_id:     String,
  user_text:      String,
  primary_output: String,
  shadow_output:  String,
  scores:         String,
  risk_level:     String,
  action:         String,
  divergence_log: String,
  sanitized_text: Option<String>,
  latency_ms:     u64,
  created_at:     String,
}

impl RawTurn {
  fn decode(self) -> Result<Turn> {
    Ok(Turn {
      turn_id:        decode_uuid(&self.turn_id)?,
      session_id:     decode_uuid(&self.session_id)?,
      user_text:      self.user_text,
      primary_output: self.primary_output,
      shadow_output:  self.shadow_output,
      scores:         decode_scores(&self.scores)?,
      risk_level:     decode_risk_level(&self.risk_level)?,
      action:         decode_action(&self.action)?,
      divergence_log: decode_divergence_log(&self.divergence_log)?,
      sanitized_text: self.sanitized_text,
      latency_ms:     self.latency_ms,
      created_at:     decode_dt(&self.created_at)?,
    })
  }

  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      turn_id:        row.get(0)?,
      session_id:     row.get(1)?,
      user_text:      row.get(2)?,
      primary_output: row.get(3)?,
      shadow_output:  row.get(4)?,
      scores:         row.get(5)?,
      risk_level:     row.get(6)?,
      action:         row.get(7)?,
      divergence_log: row.get(8)?,
      sanitized_text: row.get(9)?,
      latency_ms:     row.get(10)?,
      created_at:     row.get(11)?,
    })
  }
}

const TURN_COLS: &str =
  "turn_id, session_id, user_text, primary_output, shadow_output, scores, \
   risk_level, action, divergence_log, sanitized_text, latency_ms, created_at";

struct RawAlert {
  alert_id:   String,
  session_id: String,
  turn_id:    Option<String>,
  risk_level: String,
  title:      String,
  created_at: String,
}

impl RawAlert {
  fn decode(self) -> Result<Alert> {
    Ok(Alert {
      alert_id:   decode_uuid(&self.alert_id)?,
      session_id: decode_uuid(&self.session_id)?,
      turn_id:    self.turn_id.as_deref().map(decode_uuid).transpose()?,
      risk_level: decode_risk_level(&self.risk_level)?,
      title:      self.title,
      created_at: decode_dt(&self.created_at)?,
    })
  }

  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      alert_id:   row.get(0)?,
      session_id: row.get(1)?,
      turn_id:    row.get(2)?,
      risk_level: row.get(3)?,
      title:      row.get(4)?,
      created_at: row.get(5)?,
    })
  }
}

const ALERT_COLS: &str =
  "alert_id, session_id, turn_id, risk_level, title, created_at";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A ShieldLLM conversation store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl ConversationStore for SqliteStore {
  type Error = Error;

  // ── Sessions ──────────────────────────────────────────────────────────

  async fn create_session(&self, input: NewSession) -> Result<Session> {
    let session = Session {
      session_id:   Uuid::new_v4(),
      user_id:      input.user_id,
      tool_type:    input.tool_type,
      model_type:   input.model_type,
      defense_mode: input.defense_mode,
      trust_score:  input.trust_score,
      intent_graph: input.intent_graph,
      created_at:   Utc::now(),
    };

    let session_id_str = encode_uuid(session.session_id);
    let user_id        = session.user_id.clone();
    let tool_type      = session.tool_type.as_str();
    let model_type     = session.model_type.as_str();
    let defense_mode   = session.defense_mode.as_str();
    let trust_score    = session.trust_score;
    let graph_json     = encode_json(&session.intent_graph)?;
    let created_at_str = encode_dt(session.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (session_id, user_id, tool_type, model_type, \
           defense_mode, trust_score, intent_graph, created_at) \
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            session_id_str,
            user_id,
            tool_type,
            model_type,
            defense_mode,
            trust_score,
            graph_json,
            created_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(session)
  }

  async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        use rusqlite::OptionalExtension as _;
        let raw = conn
          .query_row(
            &format!("SELECT {SESSION_COLS} FROM sessions WHERE session_id = ?1"),
            rusqlite::params![id_str],
            RawSession::from_row,
          )
          .optional()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawSession::decode).transpose()
  }

  async fn list_sessions(&self, user_id: &str, limit: usize) -> Result<Vec<Session>> {
    let user_id = user_id.to_string();
    let raws: Vec<RawSession> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SESSION_COLS} FROM sessions WHERE user_id = ?1 \
           ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_id, limit], RawSession::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSession::decode).collect()
  }

  fn update_session(
    &self,
    session: &Session,
  ) -> impl Future<Output = Result<()>> + Send + '_ {
    let session_id_str = encode_uuid(session.session_id);
    let trust_score    = session.trust_score;
    let graph_json     = encode_json(&session.intent_graph);

    async move {
      let graph_json = graph_json?;
      self
        .conn
        .call(move |conn| {
          conn.execute(
            "UPDATE sessions SET trust_score = ?2, intent_graph = ?3 \
             WHERE session_id = ?1",
            rusqlite::params![session_id_str, trust_score, graph_json],
          )?;
          Ok(())
        })
        .await?;
      Ok(())
    }
  }

  // ── Turns ─────────────────────────────────────────────────────────────

  async fn record_turn(&self, input: NewTurn) -> Result<Turn> {
    let turn = Turn {
      turn_id:        Uuid::new_v4(),
      session_id:     input.session_id,
      user_text:      input.user_text,
      primary_output: input.primary_output,
      shadow_output:  input.shadow_output,
      scores:         input.scores,
      risk_level:     input.risk_level,
      action:         input.action,
      divergence_log: input.divergence_log,
      sanitized_text: input.sanitized_text,
      latency_ms:     input.latency_ms,
      created_at:     Utc::now(),
    };

    let turn_id_str    = encode_uuid(turn.turn_id);
    let session_id_str = encode_uuid(turn.session_id);
    let user_text      = turn.user_text.clone();
    let primary_output = turn.primary_output.clone();
    let shadow_output  = turn.shadow_output.clone();
    let scores_json    = encode_json(&turn.scores)?;
    let risk_level     = turn.risk_level.as_str();
    let action         = turn.action.as_str();
    let log_json       = encode_json(&turn.divergence_log)?;
    let sanitized_text = turn.sanitized_text.clone();
    let latency_ms     = turn.latency_ms;
    let created_at_str = encode_dt(turn.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO turns (turn_id, session_id, user_text, primary_output, \
           shadow_output, scores, risk_level, action, divergence_log, \
           sanitized_text, latency_ms, created_at) \
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            turn_id_str,
            session_id_str,
            user_text,
            primary_output,
            shadow_output,
            scores_json,
            risk_level,
            action,
            log_json,
            sanitized_text,
            latency_ms,
            created_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(turn)
  }

  async fn list_turns(&self, session_id: Uuid) -> Result<Vec<Turn>> {
    let session_id_str = encode_uuid(session_id);
    let raws: Vec<RawTurn> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TURN_COLS} FROM turns WHERE session_id = ?1 \
           ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![session_id_str], RawTurn::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTurn::decode).collect()
  }

  // ── Alerts ────────────────────────────────────────────────────────────

  async fn raise_alert(&self, input: NewAlert) -> Result<Alert> {
    let alert = Alert {
      alert_id:   Uuid::new_v4(),
      session_id: input.session_id,
      turn_id:    input.turn_id,
      risk_level: input.risk_level,
      title:      input.title,
      created_at: Utc::now(),
    };

    let alert_id_str   = encode_uuid(alert.alert_id);
    let session_id_str = encode_uuid(alert.session_id);
    let turn_id_str    = alert.turn_id.map(encode_uuid);
    let risk_level     = alert.risk_level.as_str();
    let title          = alert.title.clone();
    let created_at_str = encode_dt(alert.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO alerts (alert_id, session_id, turn_id, risk_level, \
           title, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            alert_id_str,
            session_id_str,
            turn_id_str,
            risk_level,
            title,
            created_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(alert)
  }

  async fn alerts_since(&self, cursor: DateTime<Utc>) -> Result<Vec<Alert>> {
    let cursor_str = encode_dt(cursor);
    let raws: Vec<RawAlert> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ALERT_COLS} FROM alerts WHERE created_at > ?1 \
           ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![cursor_str], RawAlert::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAlert::decode).collect()
  }

  // ── Policy singleton ──────────────────────────────────────────────────

  async fn get_policy(&self) -> Result<Option<Policy>> {
    let body: Option<String> = self
      .conn
      .call(|conn| {
        use rusqlite::OptionalExtension as _;
        let body = conn
          .query_row("SELECT body FROM policy WHERE policy_id = 0", [], |r| {
            r.get(0)
          })
          .optional()?;
        Ok(body)
      })
      .await?;

    body
      .map(|b| serde_json::from_str(&b).map_err(Error::Json))
      .transpose()
  }

  fn put_policy(
    &self,
    policy: &Policy,
  ) -> impl Future<Output = Result<()>> + Send + '_ {
    let body = encode_json(policy);
    async move {
      let body = body?;
      self
        .conn
        .call(move |conn| {
          conn.execute(
            "INSERT INTO policy (policy_id, body) VALUES (0, ?1) \
             ON CONFLICT(policy_id) DO UPDATE SET body = excluded.body",
            rusqlite::params![body],
          )?;
          Ok(())
        })
        .await?;
      Ok(())
    }
  }
}
