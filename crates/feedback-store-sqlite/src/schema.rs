//! SQL schema for the feedback SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;

-- One row per (collection, key). The primary key is the uniqueness
-- guarantee behind create-if-absent; no application code re-checks it.
CREATE TABLE IF NOT EXISTS documents (
    collection  TEXT NOT NULL,   -- 'survey_responses' | 'prize_claims'
    doc_key     TEXT NOT NULL,   -- digits-only identity key
    fields_json TEXT NOT NULL,   -- JSON object
    created_at  TEXT NOT NULL,   -- RFC 3339 UTC; server-assigned, never updated
    updated_at  TEXT NOT NULL,   -- RFC 3339 UTC; server-assigned on every write
    PRIMARY KEY (collection, doc_key)
);

CREATE INDEX IF NOT EXISTS documents_created_idx ON documents(collection, created_at);

PRAGMA user_version = 1;
";
