//! SQL DDL for all mnemo tables.
//!
//! Defines the `memories`, `vectors`, `waypoints`, `embed_logs`,
//! `memories_fts` (FTS5), and `schema_meta` tables. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for mnemo's core tables.
///
/// Vector blobs are 4-byte little-endian dim prefixes followed by
/// little-endian float32 arrays. Timestamps are epoch milliseconds.
const SCHEMA_SQL: &str = r#"
-- Core memory storage
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    user_id TEXT,
    content TEXT NOT NULL,
    primary_sector TEXT NOT NULL
        CHECK(primary_sector IN ('episodic','semantic','procedural','emotional','reflective')),
    tags TEXT NOT NULL DEFAULT '[]',
    meta TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    last_seen_at INTEGER NOT NULL CHECK(last_seen_at >= created_at),
    salience REAL NOT NULL DEFAULT 0.5 CHECK(salience >= 0.0 AND salience <= 1.0),
    decay_lambda REAL NOT NULL CHECK(decay_lambda > 0.0),
    mean_vec BLOB NOT NULL,
    cold INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_memories_user ON memories(user_id);
CREATE INDEX IF NOT EXISTS idx_memories_sector ON memories(primary_sector);
CREATE INDEX IF NOT EXISTS idx_memories_salience ON memories(salience);
CREATE INDEX IF NOT EXISTS idx_memories_last_seen ON memories(last_seen_at);

-- One row per (memory, sector) embedding
CREATE TABLE IF NOT EXISTS vectors (
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    sector TEXT NOT NULL
        CHECK(sector IN ('episodic','semantic','procedural','emotional','reflective')),
    v BLOB NOT NULL,
    dim INTEGER NOT NULL CHECK(dim > 0),
    PRIMARY KEY (memory_id, sector)
);

CREATE INDEX IF NOT EXISTS idx_vectors_sector ON vectors(sector);

-- Associative graph: the src_id primary key enforces the
-- single-outgoing-edge invariant at write time.
CREATE TABLE IF NOT EXISTS waypoints (
    src_id TEXT PRIMARY KEY REFERENCES memories(id) ON DELETE CASCADE,
    dst_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    weight REAL NOT NULL CHECK(weight > 0.0 AND weight <= 1.0),
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_waypoints_dst ON waypoints(dst_id);
CREATE INDEX IF NOT EXISTS idx_waypoints_weight ON waypoints(weight);

-- Append-only embedding observability log
CREATE TABLE IF NOT EXISTS embed_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts INTEGER NOT NULL,
    provider TEXT NOT NULL,
    sector TEXT NOT NULL,
    input_tokens INTEGER NOT NULL,
    dim INTEGER NOT NULL,
    ok INTEGER NOT NULL
);

-- BM25 side-channel for the hybrid tier
CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    content,
    id UNINDEXED
);

-- Schema metadata and worker bookkeeping
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
