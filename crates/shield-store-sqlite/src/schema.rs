//! SQL schema for the ShieldLLM SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS sessions (
    session_id   TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL,
    tool_type    TEXT NOT NULL,   -- 'code_review' | 'policy_enforcement' | 'compliance'
    model_type   TEXT NOT NULL,
    defense_mode TEXT NOT NULL,   -- 'passive' | 'active' | 'strict'
    trust_score  REAL NOT NULL DEFAULT 100,
    intent_graph TEXT NOT NULL,   -- JSON payload, replaced wholesale per turn
    created_at   TEXT NOT NULL    -- ISO 8601 UTC; server-assigned
);

-- Turns are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS turns (
    turn_id        TEXT PRIMARY KEY,
    session_id     TEXT NOT NULL REFERENCES sessions(session_id),
    user_text      TEXT NOT NULL,
    primary_output TEXT NOT NULL DEFAULT '',
    shadow_output  TEXT NOT NULL DEFAULT '',
    scores         TEXT NOT NULL,   -- JSON {semanticDrift, policyStress, reasoningMismatch, total}
    risk_level     TEXT NOT NULL,   -- 'low' | 'medium' | 'high' | 'critical'
    action         TEXT NOT NULL,   -- 'allow' | 'clarify' | 'sanitize_rerun' | 'contain'
    divergence_log TEXT NOT NULL,   -- JSON payload
    sanitized_text TEXT,
    latency_ms     INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL
);

-- Alerts are append-only and raised only for high/critical turns.
CREATE TABLE IF NOT EXISTS alerts (
    alert_id   TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(session_id),
    turn_id    TEXT REFERENCES turns(turn_id),
    risk_level TEXT NOT NULL,
    title      TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- The policy singleton: at most one row, pinned to id 0.
CREATE TABLE IF NOT EXISTS policy (
    policy_id INTEGER PRIMARY KEY CHECK (policy_id = 0),
    body      TEXT NOT NULL        -- JSON payload of the full policy
);

CREATE INDEX IF NOT EXISTS sessions_user_idx   ON sessions(user_id, created_at);
CREATE INDEX IF NOT EXISTS turns_session_idx   ON turns(session_id);
CREATE INDEX IF NOT EXISTS turns_created_idx   ON turns(created_at);
CREATE INDEX IF NOT EXISTS alerts_created_idx  ON alerts(created_at);

PRAGMA user_version = 1;
";
