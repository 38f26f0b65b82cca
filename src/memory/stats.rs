use std::collections::HashMap;
use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;

use crate::db::migrations;
use crate::error::Result;
use crate::memory::types::Sector;

/// Response from the stats operation.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_memories: u64,
    pub by_sector: HashMap<String, u64>,
    /// Salience bands: hot / warm / cold.
    pub by_tier: HashMap<String, u64>,
    pub cold_memories: u64,
    pub waypoints: u64,
    pub embed_log_entries: u64,
    /// Epoch-ms timestamp of the last completed decay cycle, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decay_last_run: Option<i64>,
    pub db_size_bytes: u64,
}

/// Compute engine statistics.
///
/// `db_path` is used for file size calculation; pass `None` for
/// in-memory databases.
pub fn engine_stats(conn: &Connection, db_path: Option<&Path>) -> Result<StatsResponse> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;

    let mut by_sector = HashMap::new();
    for sector in Sector::TIE_BREAK_ORDER {
        by_sector.insert(sector.as_str().to_string(), 0u64);
    }
    let mut stmt = conn.prepare("SELECT primary_sector, COUNT(*) FROM memories GROUP BY primary_sector")?;
    let rows: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (sector, count) in rows {
        by_sector.insert(sector, count as u64);
    }

    let mut by_tier = HashMap::new();
    for (name, lo, hi) in [
        ("hot", 0.5f64, 1.01f64),
        ("warm", 0.25, 0.5),
        ("cold", -0.01, 0.25),
    ] {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE salience >= ?1 AND salience < ?2",
            rusqlite::params![lo, hi],
            |row| row.get(0),
        )?;
        by_tier.insert(name.to_string(), count as u64);
    }

    let cold_memories: i64 =
        conn.query_row("SELECT COUNT(*) FROM memories WHERE cold = 1", [], |row| {
            row.get(0)
        })?;
    let waypoints: i64 = conn.query_row("SELECT COUNT(*) FROM waypoints", [], |row| row.get(0))?;
    let embed_log_entries: i64 =
        conn.query_row("SELECT COUNT(*) FROM embed_logs", [], |row| row.get(0))?;

    let decay_last_run = migrations::get_meta_i64(conn, "decay_last_run")?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StatsResponse {
        total_memories: total as u64,
        by_sector,
        by_tier,
        cold_memories: cold_memories as u64,
        waypoints: waypoints as u64,
        embed_log_entries: embed_log_entries as u64,
        decay_last_run,
        db_size_bytes,
    })
}
