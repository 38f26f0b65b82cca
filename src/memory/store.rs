//! Transactional persistence for memories, vectors, and waypoints.
//!
//! All multi-row writes run inside a transaction: a memory row, its
//! per-sector vectors, the keyword-index row (hybrid tier), and any
//! waypoint edges commit or roll back together. The single-outgoing-edge
//! invariant is enforced structurally (`waypoints.src_id` is the primary
//! key) and the upsert only replaces an edge of equal or lower weight.

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::error::{MnemoError, Result};
use crate::memory::types::{Memory, Sector, Waypoint};
use crate::memory::{decode_vector, encode_vector};

/// A fully-assembled memory row ready for insertion.
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub id: String,
    pub user_id: Option<String>,
    pub content: String,
    pub primary_sector: Sector,
    pub tags: Vec<String>,
    pub meta: serde_json::Value,
    pub created_at: i64,
    pub last_seen_at: i64,
    pub salience: f64,
    pub decay_lambda: f64,
    pub mean_vec: Vec<f32>,
}

/// A directed edge to create alongside an insert, or via
/// [`upsert_waypoint`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WaypointEdge {
    pub src_id: String,
    pub dst_id: String,
    pub weight: f64,
}

/// Candidate row streamed to the ranker: one stored vector plus the
/// scoring fields of its memory.
#[derive(Debug)]
pub struct SectorCandidate {
    pub memory_id: String,
    pub vec: Vec<f32>,
    pub salience: f64,
    pub last_seen_at: i64,
}

/// A memory's mean vector for waypoint matching.
#[derive(Debug)]
pub struct MeanCandidate {
    pub memory_id: String,
    pub mean_vec: Vec<f32>,
    pub primary_sector: Sector,
}

/// One page of a list query.
#[derive(Debug)]
pub struct MemoryPage {
    pub memories: Vec<Memory>,
    pub next_cursor: Option<String>,
}

// ── Write path ────────────────────────────────────────────────────────────────

/// Insert a memory with its vectors and edges in one atomic unit.
///
/// `index_fts` mirrors content into the BM25 side-channel (hybrid tier).
/// Fails with `Conflict` when the id already exists; any failure rolls
/// the whole insert back.
pub fn insert_memory(
    conn: &mut Connection,
    memory: &NewMemory,
    vectors: &[(Sector, Vec<f32>)],
    edges: &[WaypointEdge],
    index_fts: bool,
) -> Result<()> {
    let tx = conn.transaction().map_err(MnemoError::from)?;

    let exists: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM memories WHERE id = ?1",
        params![memory.id],
        |row| row.get(0),
    )?;
    if exists {
        return Err(MnemoError::Conflict(format!(
            "memory id already exists: {}",
            memory.id
        )));
    }

    tx.execute(
        "INSERT INTO memories (id, user_id, content, primary_sector, tags, meta, \
         created_at, updated_at, last_seen_at, salience, decay_lambda, mean_vec, cold) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?9, ?10, ?11, 0)",
        params![
            memory.id,
            memory.user_id,
            memory.content,
            memory.primary_sector.as_str(),
            serde_json::to_string(&memory.tags)?,
            serde_json::to_string(&memory.meta)?,
            memory.created_at,
            memory.last_seen_at,
            memory.salience,
            memory.decay_lambda,
            encode_vector(&memory.mean_vec),
        ],
    )?;

    for (sector, vec) in vectors {
        tx.execute(
            "INSERT INTO vectors (memory_id, sector, v, dim) VALUES (?1, ?2, ?3, ?4)",
            params![memory.id, sector.as_str(), encode_vector(vec), vec.len() as i64],
        )?;
    }

    if index_fts {
        tx.execute(
            "INSERT INTO memories_fts (content, id) VALUES (?1, ?2)",
            params![memory.content, memory.id],
        )?;
    }

    for edge in edges {
        upsert_waypoint_tx(&tx, edge, memory.created_at)?;
    }

    tx.commit().map_err(MnemoError::from)
}

/// Weight-preferred waypoint upsert: replaces `src`'s outgoing edge only
/// when the new weight is at least the current one. Returns whether the
/// edge was written.
pub fn upsert_waypoint(conn: &Connection, edge: &WaypointEdge, now: i64) -> Result<bool> {
    let changed = conn.execute(
        "INSERT INTO waypoints (src_id, dst_id, weight, updated_at) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(src_id) DO UPDATE SET \
             dst_id = excluded.dst_id, \
             weight = excluded.weight, \
             updated_at = excluded.updated_at \
         WHERE excluded.weight >= waypoints.weight",
        params![edge.src_id, edge.dst_id, edge.weight.min(1.0), now],
    )?;
    Ok(changed > 0)
}

fn upsert_waypoint_tx(tx: &Transaction, edge: &WaypointEdge, now: i64) -> Result<bool> {
    let changed = tx.execute(
        "INSERT INTO waypoints (src_id, dst_id, weight, updated_at) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(src_id) DO UPDATE SET \
             dst_id = excluded.dst_id, \
             weight = excluded.weight, \
             updated_at = excluded.updated_at \
         WHERE excluded.weight >= waypoints.weight",
        params![edge.src_id, edge.dst_id, edge.weight.min(1.0), now],
    )?;
    Ok(changed > 0)
}

/// Add `delta` to an edge's weight, capped at 1.0.
pub fn reinforce_waypoint(conn: &Connection, src_id: &str, delta: f64, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE waypoints SET weight = MIN(weight + ?1, 1.0), updated_at = ?2 WHERE src_id = ?3",
        params![delta, now, src_id],
    )?;
    Ok(())
}

/// Prune every edge below `threshold`. Returns the number removed.
pub fn delete_waypoints_below(conn: &Connection, threshold: f64) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM waypoints WHERE weight < ?1",
        params![threshold],
    )?;
    Ok(removed)
}

/// Set a memory's salience and last-seen time (reinforcement path).
pub fn update_salience(conn: &Connection, id: &str, salience: f64, last_seen_at: i64) -> Result<()> {
    let rows = conn.execute(
        "UPDATE memories SET salience = ?1, last_seen_at = ?2, updated_at = ?2 WHERE id = ?3",
        params![salience.clamp(0.0, 1.0), last_seen_at, id],
    )?;
    if rows == 0 {
        return Err(MnemoError::NotFound {
            kind: "memory",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Set a memory's salience without touching `last_seen_at` (decay path).
pub fn set_salience(conn: &Connection, id: &str, salience: f64, now: i64) -> Result<()> {
    let rows = conn.execute(
        "UPDATE memories SET salience = ?1, updated_at = ?2 WHERE id = ?3",
        params![salience.clamp(0.0, 1.0), now, id],
    )?;
    if rows == 0 {
        return Err(MnemoError::NotFound {
            kind: "memory",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Reinforce a memory: bump salience (capped at 1.0) and strictly advance
/// `last_seen_at`. Returns the new salience.
pub fn bump_salience(conn: &Connection, id: &str, delta: f64, now: i64) -> Result<f64> {
    let rows = conn.execute(
        "UPDATE memories SET \
             salience = MIN(MAX(salience + ?1, 0.0), 1.0), \
             last_seen_at = MAX(last_seen_at + 1, ?2), \
             updated_at = ?2 \
         WHERE id = ?3",
        params![delta, now, id],
    )?;
    if rows == 0 {
        return Err(MnemoError::NotFound {
            kind: "memory",
            id: id.to_string(),
        });
    }
    let salience: f64 = conn.query_row(
        "SELECT salience FROM memories WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(salience)
}

/// Replace content with its fingerprint and mark the memory cold.
/// Vectors are untouched; the keyword index follows the visible content.
pub fn replace_content(conn: &mut Connection, id: &str, fingerprint: &str, now: i64) -> Result<()> {
    let tx = conn.transaction().map_err(MnemoError::from)?;

    let rows = tx.execute(
        "UPDATE memories SET content = ?1, cold = 1, updated_at = ?2 WHERE id = ?3",
        params![fingerprint, now, id],
    )?;
    if rows == 0 {
        return Err(MnemoError::NotFound {
            kind: "memory",
            id: id.to_string(),
        });
    }

    // Keep the BM25 channel consistent with what callers can still read.
    // Rows that were never indexed (non-hybrid tiers) stay unindexed;
    // change counts from virtual tables are unreliable, so probe first.
    let had_fts: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM memories_fts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if had_fts {
        tx.execute("DELETE FROM memories_fts WHERE id = ?1", params![id])?;
        tx.execute(
            "INSERT INTO memories_fts (content, id) VALUES (?1, ?2)",
            params![fingerprint, id],
        )?;
    }

    tx.commit().map_err(MnemoError::from)
}

/// Delete a memory and everything hanging off it (vectors and waypoints
/// cascade; the keyword row is removed explicitly).
pub fn delete_memory(conn: &mut Connection, id: &str) -> Result<()> {
    let tx = conn.transaction().map_err(MnemoError::from)?;

    tx.execute("DELETE FROM memories_fts WHERE id = ?1", params![id])?;
    let rows = tx.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
    if rows == 0 {
        return Err(MnemoError::NotFound {
            kind: "memory",
            id: id.to_string(),
        });
    }

    tx.commit().map_err(MnemoError::from)
}

/// Append one row to the embedding observability log.
pub fn append_embed_log(
    conn: &Connection,
    ts: i64,
    provider: &str,
    sector: Sector,
    input_tokens: usize,
    dim: usize,
    ok: bool,
) -> Result<()> {
    conn.execute(
        "INSERT INTO embed_logs (ts, provider, sector, input_tokens, dim, ok) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![ts, provider, sector.as_str(), input_tokens as i64, dim as i64, ok],
    )?;
    Ok(())
}

// ── Read path ─────────────────────────────────────────────────────────────────

/// Fetch a memory by id.
pub fn get_memory(conn: &Connection, id: &str) -> Result<Memory> {
    let row = conn
        .query_row(
            "SELECT id, user_id, content, primary_sector, tags, meta, created_at, \
             updated_at, last_seen_at, salience, decay_lambda, mean_vec, cold \
             FROM memories WHERE id = ?1",
            params![id],
            map_memory_row,
        )
        .optional()?;

    row.ok_or_else(|| MnemoError::NotFound {
        kind: "memory",
        id: id.to_string(),
    })
}

/// Whether a memory id exists.
pub fn memory_exists(conn: &Connection, id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM memories WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// The outgoing waypoint of `src_id`, if any.
pub fn outgoing_waypoint(conn: &Connection, src_id: &str) -> Result<Option<Waypoint>> {
    let row = conn
        .query_row(
            "SELECT src_id, dst_id, weight, updated_at FROM waypoints WHERE src_id = ?1",
            params![src_id],
            |row| {
                Ok(Waypoint {
                    src_id: row.get(0)?,
                    dst_id: row.get(1)?,
                    weight: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Keyset-paginated listing, optionally filtered by user scope, sector,
/// and tag. The cursor is the last id of the previous page; UUIDv7 ids
/// make id order creation order.
pub fn list_memories(
    conn: &Connection,
    user_id: Option<&str>,
    sector: Option<Sector>,
    tag: Option<&str>,
    cursor: Option<&str>,
    limit: usize,
) -> Result<MemoryPage> {
    let mut sql = String::from(
        "SELECT id, user_id, content, primary_sector, tags, meta, created_at, \
         updated_at, last_seen_at, salience, decay_lambda, mean_vec, cold \
         FROM memories WHERE 1=1",
    );
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    match user_id {
        Some(u) => {
            sql.push_str(&format!(
                " AND (user_id = ?{} OR user_id IS NULL)",
                args.len() + 1
            ));
            args.push(Box::new(u.to_string()));
        }
        None => sql.push_str(" AND user_id IS NULL"),
    }
    if let Some(s) = sector {
        sql.push_str(&format!(" AND primary_sector = ?{}", args.len() + 1));
        args.push(Box::new(s.as_str().to_string()));
    }
    if let Some(t) = tag {
        // tags is a JSON array of strings; match the quoted element.
        sql.push_str(&format!(
            " AND tags LIKE '%' || ?{} || '%'",
            args.len() + 1
        ));
        args.push(Box::new(format!("\"{}\"", t.replace('"', ""))));
    }
    if let Some(c) = cursor {
        sql.push_str(&format!(" AND id > ?{}", args.len() + 1));
        args.push(Box::new(c.to_string()));
    }
    sql.push_str(&format!(" ORDER BY id LIMIT ?{}", args.len() + 1));
    args.push(Box::new((limit + 1) as i64));

    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(|b| b.as_ref()).collect();
    let mut memories = stmt
        .query_map(params_ref.as_slice(), map_memory_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let next_cursor = if memories.len() > limit {
        memories.truncate(limit);
        memories.last().map(|m| m.id.clone())
    } else {
        None
    };

    Ok(MemoryPage {
        memories,
        next_cursor,
    })
}

/// All stored vectors for `sector` within the user scope, with the
/// scoring fields of their memories. The ranker does a linear scan over
/// this; acceptable at target scale, no ANN index.
pub fn candidates_by_sector(
    conn: &Connection,
    user_id: Option<&str>,
    sector: Sector,
) -> Result<Vec<SectorCandidate>> {
    let sql = match user_id {
        Some(_) => {
            "SELECT v.memory_id, v.v, m.salience, m.last_seen_at \
             FROM vectors v JOIN memories m ON m.id = v.memory_id \
             WHERE v.sector = ?1 AND (m.user_id = ?2 OR m.user_id IS NULL)"
        }
        None => {
            "SELECT v.memory_id, v.v, m.salience, m.last_seen_at \
             FROM vectors v JOIN memories m ON m.id = v.memory_id \
             WHERE v.sector = ?1 AND m.user_id IS NULL"
        }
    };

    let mut stmt = conn.prepare(sql)?;
    let map_row = |row: &rusqlite::Row<'_>| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Vec<u8>>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, i64>(3)?,
        ))
    };
    let rows: Vec<(String, Vec<u8>, f64, i64)> = match user_id {
        Some(u) => stmt
            .query_map(params![sector.as_str(), u], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
        None => stmt
            .query_map(params![sector.as_str()], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    rows.into_iter()
        .map(|(memory_id, blob, salience, last_seen_at)| {
            Ok(SectorCandidate {
                memory_id,
                vec: decode_vector(&blob)?,
                salience,
                last_seen_at,
            })
        })
        .collect()
}

/// Mean vectors of every memory in the user scope, for waypoint matching.
pub fn mean_candidates(conn: &Connection, user_id: Option<&str>) -> Result<Vec<MeanCandidate>> {
    let sql = match user_id {
        Some(_) => {
            "SELECT id, mean_vec, primary_sector FROM memories \
             WHERE user_id = ?1 OR user_id IS NULL"
        }
        None => "SELECT id, mean_vec, primary_sector FROM memories WHERE user_id IS NULL",
    };

    let mut stmt = conn.prepare(sql)?;
    let map_row = |row: &rusqlite::Row<'_>| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Vec<u8>>(1)?,
            row.get::<_, String>(2)?,
        ))
    };
    let rows: Vec<(String, Vec<u8>, String)> = match user_id {
        Some(u) => stmt
            .query_map(params![u], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
        None => stmt
            .query_map([], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    rows.into_iter()
        .map(|(memory_id, blob, sector)| {
            Ok(MeanCandidate {
                memory_id,
                mean_vec: decode_vector(&blob)?,
                primary_sector: sector
                    .parse()
                    .map_err(|e: String| MnemoError::StoreFailed(e))?,
            })
        })
        .collect()
}

/// BM25 scores for `query_text` from the keyword side-channel, as
/// positive magnitudes (FTS5 rank is negative-better).
pub fn fts_scores(conn: &Connection, query_text: &str, limit: usize) -> Result<Vec<(String, f64)>> {
    let escaped = escape_fts_query(query_text);
    if escaped.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT id, rank FROM memories_fts WHERE memories_fts MATCH ?1 ORDER BY rank LIMIT ?2",
    )?;
    let results = stmt
        .query_map(params![escaped, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, -row.get::<_, f64>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(results)
}

/// Escape a user query for FTS5 MATCH syntax: each word wrapped in
/// double quotes (implicit AND of plain terms, no operators).
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| {
            let clean = word.replace('"', "");
            format!("\"{clean}\"")
        })
        .filter(|w| w != "\"\"")
        .collect::<Vec<_>>()
        .join(" ")
}

fn map_memory_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let sector_str: String = row.get(3)?;
    let tags_str: String = row.get(4)?;
    let meta_str: String = row.get(5)?;
    let mean_blob: Vec<u8> = row.get(11)?;
    Ok(Memory {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        primary_sector: sector_str.parse().unwrap_or(Sector::Semantic),
        tags: serde_json::from_str(&tags_str).unwrap_or_default(),
        meta: serde_json::from_str(&meta_str).unwrap_or(serde_json::Value::Null),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        last_seen_at: row.get(8)?,
        salience: row.get(9)?,
        decay_lambda: row.get(10)?,
        mean_vec: decode_vector(&mean_blob).unwrap_or_default(),
        cold: row.get(12)?,
    })
}
