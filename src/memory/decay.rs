//! Background decay worker.
//!
//! Periodically decays salience along each memory's sector-derived
//! lambda, compresses memories that fall cold into fingerprints, and
//! prunes weak waypoints on a slower cadence. The worker runs as a tokio
//! task with a shutdown notifier owned by the engine; a cycle can also
//! be driven on demand.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use serde::Deserialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::migrations;
use crate::error::Result;
use crate::memory::store;
use crate::memory::types::MemoryTier;
use crate::memory::{fnv1a64, now_ms};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Number of Unicode scalar values retained in a fingerprint.
const FINGERPRINT_CHARS: usize = 64;

/// Configuration for the decay worker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// Whether the engine spawns the background worker at all.
    pub enabled: bool,
    /// Minutes between decay cycles.
    pub interval_minutes: u64,
    /// Edges below this weight are pruned.
    pub prune_weight: f64,
    /// Days between pruning passes.
    pub prune_days: u64,
    /// Number of shards memories are partitioned into per cycle.
    pub shards: usize,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 120,
            prune_weight: 0.05,
            prune_days: 7,
            shards: 4,
        }
    }
}

/// Statistics from one decay cycle.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DecayStats {
    pub scanned: usize,
    pub decayed: usize,
    pub went_cold: usize,
    pub pruned_edges: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Lossy one-way compression of cold content: the first 64 Unicode
/// scalar values plus a stable hash of the full original text.
pub fn fingerprint(content: &str) -> String {
    let prefix: String = content.chars().take(FINGERPRINT_CHARS).collect();
    format!("{prefix}#{:016x}", fnv1a64(content.as_bytes()))
}

/// Shard assignment for one memory id.
fn shard_of(id: &str, shards: usize) -> usize {
    (fnv1a64(id.as_bytes()) % shards.max(1) as u64) as usize
}

struct DecayRow {
    id: String,
    salience: f64,
    last_seen_at: i64,
    decay_lambda: f64,
    cold: bool,
}

/// Run one full decay cycle at time `now`.
///
/// Per-memory failures are logged and skipped so one bad row cannot
/// stall the cycle; every write is its own atomic store operation, so a
/// crash mid-cycle only loses uncommitted rows.
pub fn run_decay_cycle(conn: &mut Connection, config: &DecayConfig, now: i64) -> Result<DecayStats> {
    let start = std::time::Instant::now();
    let mut stats = DecayStats::default();

    let rows: Vec<DecayRow> = {
        let mut stmt = conn.prepare(
            "SELECT id, salience, last_seen_at, decay_lambda, cold FROM memories",
        )?;
        let mapped = stmt.query_map([], |row| {
            Ok(DecayRow {
                id: row.get(0)?,
                salience: row.get(1)?,
                last_seen_at: row.get(2)?,
                decay_lambda: row.get(3)?,
                cold: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
        mapped
    };
    stats.scanned = rows.len();

    for shard in 0..config.shards.max(1) {
        for row in rows.iter().filter(|r| shard_of(&r.id, config.shards) == shard) {
            if let Err(e) = decay_one(conn, row, now, &mut stats) {
                stats.failed += 1;
                warn!(memory_id = %row.id, error = %e, "decay skipped memory");
            }
        }
    }

    // Edge pruning runs on its own cadence.
    let prune_interval_ms = config.prune_days as i64 * MS_PER_DAY as i64;
    let last_prune = migrations::get_meta_i64(conn, "decay_last_prune")?.unwrap_or(0);
    if now - last_prune >= prune_interval_ms {
        stats.pruned_edges = store::delete_waypoints_below(conn, config.prune_weight)?;
        migrations::set_meta_i64(conn, "decay_last_prune", now)?;
        if stats.pruned_edges > 0 {
            info!(pruned = stats.pruned_edges, "pruned weak waypoints");
        }
    }

    migrations::set_meta_i64(conn, "decay_last_run", now)?;
    stats.duration_ms = start.elapsed().as_millis() as u64;
    Ok(stats)
}

fn decay_one(
    conn: &mut Connection,
    row: &DecayRow,
    now: i64,
    stats: &mut DecayStats,
) -> Result<()> {
    let days = ((now - row.last_seen_at).max(0) as f64) / MS_PER_DAY;
    let new_salience = row.salience * (-row.decay_lambda * days).exp();
    if (new_salience - row.salience).abs() < f64::EPSILON {
        return Ok(());
    }

    let was_tier = MemoryTier::from_salience(row.salience);
    let new_tier = MemoryTier::from_salience(new_salience);

    if new_tier == MemoryTier::Cold && was_tier != MemoryTier::Cold && !row.cold {
        // Transition to cold: fingerprint content, keep vectors.
        let content: String = conn.query_row(
            "SELECT content FROM memories WHERE id = ?1",
            rusqlite::params![row.id],
            |r| r.get(0),
        )?;
        store::replace_content(conn, &row.id, &fingerprint(&content), now)?;
        stats.went_cold += 1;
    }

    store::set_salience(conn, &row.id, new_salience, now)?;
    stats.decayed += 1;
    Ok(())
}

/// Periodic decay task. The engine owns the notifier and joins the
/// handle on shutdown before closing the store.
pub struct DecayWorker {
    conn: Arc<Mutex<Connection>>,
    config: DecayConfig,
    shutdown: Arc<Notify>,
}

impl DecayWorker {
    pub fn new(conn: Arc<Mutex<Connection>>, config: DecayConfig) -> Self {
        Self {
            conn,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Notifier used to stop the worker.
    pub fn shutdown_notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Spawn the worker as a tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        let interval = Duration::from_secs(self.config.interval_minutes.max(1) * 60);
        info!(?interval, shards = self.config.shards, "decay worker started");

        loop {
            tokio::select! {
                () = tokio::time::sleep(interval) => {
                    let result = {
                        let mut conn = self.conn.lock().expect("store lock poisoned");
                        run_decay_cycle(&mut conn, &self.config, now_ms())
                    };
                    match result {
                        Ok(stats) if stats.decayed > 0 || stats.pruned_edges > 0 => {
                            info!(
                                decayed = stats.decayed,
                                went_cold = stats.went_cold,
                                pruned = stats.pruned_edges,
                                failed = stats.failed,
                                duration_ms = stats.duration_ms,
                                "decay cycle completed"
                            );
                        }
                        Ok(_) => debug!("decay cycle completed with no changes"),
                        // A whole-cycle failure backs off until the next tick.
                        Err(e) => warn!(error = %e, "decay cycle failed"),
                    }
                }
                () = self.shutdown.notified() => {
                    info!("decay worker shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::memory::store::{NewMemory, WaypointEdge};
    use crate::memory::types::Sector;

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    fn insert_aged(
        conn: &mut Connection,
        id: &str,
        sector: Sector,
        salience: f64,
        days_ago: f64,
        now: i64,
    ) {
        let last_seen = now - (days_ago * MS_PER_DAY) as i64;
        let m = NewMemory {
            id: id.to_string(),
            user_id: None,
            content: format!("memory {id} with some longer body text for fingerprinting"),
            primary_sector: sector,
            tags: vec![],
            meta: serde_json::json!({}),
            created_at: last_seen,
            last_seen_at: last_seen,
            salience,
            decay_lambda: sector.decay_lambda(),
            mean_vec: vec![1.0, 0.0],
        };
        store::insert_memory(conn, &m, &[(sector, vec![1.0, 0.0])], &[], false).unwrap();
    }

    #[test]
    fn fingerprint_truncates_and_hashes() {
        let long: String = "x".repeat(200);
        let fp = fingerprint(&long);
        let (prefix, hash) = fp.split_once('#').unwrap();
        assert_eq!(prefix.chars().count(), 64);
        assert_eq!(hash.len(), 16);

        // Stable across calls, distinct across contents.
        assert_eq!(fingerprint(&long), fp);
        assert_ne!(fingerprint("other"), fp);

        // Short content keeps its full text before the hash.
        assert!(fingerprint("short").starts_with("short#"));
    }

    #[test]
    fn shard_partition_is_stable_and_complete() {
        let ids: Vec<String> = (0..50).map(|i| format!("id-{i}")).collect();
        for id in &ids {
            let s = shard_of(id, 4);
            assert!(s < 4);
            assert_eq!(s, shard_of(id, 4));
        }
        assert_eq!(shard_of("anything", 0), 0);
    }

    #[test]
    fn decay_follows_exponential_curve() {
        let mut conn = test_db();
        let now = now_ms();
        // salience 0.4, 60 days idle, emotional lambda 0.020
        insert_aged(&mut conn, "m1", Sector::Emotional, 0.4, 60.0, now);

        let stats = run_decay_cycle(&mut conn, &DecayConfig::default(), now).unwrap();
        assert_eq!(stats.scanned, 1);
        assert_eq!(stats.decayed, 1);
        assert_eq!(stats.went_cold, 1);

        let m = store::get_memory(&conn, "m1").unwrap();
        let expected = 0.4 * (-0.020f64 * 60.0).exp();
        assert!((m.salience - expected).abs() < 1e-6, "got {}", m.salience);
        assert!((m.salience - 0.120).abs() < 0.005);
    }

    #[test]
    fn cold_transition_fingerprints_but_keeps_vectors() {
        let mut conn = test_db();
        let now = now_ms();
        insert_aged(&mut conn, "m1", Sector::Emotional, 0.4, 60.0, now);

        run_decay_cycle(&mut conn, &DecayConfig::default(), now).unwrap();

        let m = store::get_memory(&conn, "m1").unwrap();
        assert!(m.cold);
        assert!(m.content.contains('#'));
        assert!(m.content.len() < 90);

        let vec_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM vectors WHERE memory_id = 'm1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(vec_count, 1);
    }

    #[test]
    fn hot_memories_stay_textual() {
        let mut conn = test_db();
        let now = now_ms();
        // Reflective lambda is tiny; 10 days barely moves salience.
        insert_aged(&mut conn, "m1", Sector::Reflective, 0.9, 10.0, now);

        run_decay_cycle(&mut conn, &DecayConfig::default(), now).unwrap();

        let m = store::get_memory(&conn, "m1").unwrap();
        assert!(!m.cold);
        assert!(m.salience < 0.9);
        assert!(m.salience > 0.85);
        assert!(m.content.starts_with("memory m1"));
    }

    #[test]
    fn decay_is_monotonic_without_reinforcement() {
        let mut conn = test_db();
        let now = now_ms();
        insert_aged(&mut conn, "m1", Sector::Episodic, 0.8, 5.0, now);

        let mut last = 0.8;
        for tick in 1..=3 {
            let later = now + tick * 86_400_000;
            run_decay_cycle(&mut conn, &DecayConfig::default(), later).unwrap();
            let salience = store::get_memory(&conn, "m1").unwrap().salience;
            assert!(salience <= last);
            last = salience;
        }
    }

    #[test]
    fn prune_runs_on_its_own_cadence() {
        let mut conn = test_db();
        let now = now_ms();
        insert_aged(&mut conn, "a", Sector::Semantic, 0.9, 0.0, now);
        insert_aged(&mut conn, "b", Sector::Semantic, 0.9, 0.0, now);
        store::upsert_waypoint(
            &conn,
            &WaypointEdge {
                src_id: "a".into(),
                dst_id: "b".into(),
                weight: 0.03,
            },
            now,
        )
        .unwrap();

        // First cycle: no prune has ever run, so the weak edge goes.
        let stats = run_decay_cycle(&mut conn, &DecayConfig::default(), now).unwrap();
        assert_eq!(stats.pruned_edges, 1);

        // Re-create a weak edge; a cycle one day later must not prune it.
        store::upsert_waypoint(
            &conn,
            &WaypointEdge {
                src_id: "a".into(),
                dst_id: "b".into(),
                weight: 0.04,
            },
            now,
        )
        .unwrap();
        let next_day = now + 86_400_000;
        let stats = run_decay_cycle(&mut conn, &DecayConfig::default(), next_day).unwrap();
        assert_eq!(stats.pruned_edges, 0);

        // Eight days later the cadence fires again.
        let eight_days = now + 8 * 86_400_000;
        let stats = run_decay_cycle(&mut conn, &DecayConfig::default(), eight_days).unwrap();
        assert_eq!(stats.pruned_edges, 1);
    }

    #[test]
    fn cycle_records_last_run() {
        let mut conn = test_db();
        let now = now_ms();
        run_decay_cycle(&mut conn, &DecayConfig::default(), now).unwrap();
        assert_eq!(
            migrations::get_meta_i64(&conn, "decay_last_run").unwrap(),
            Some(now)
        );
    }

    #[tokio::test]
    async fn worker_shuts_down_on_notify() {
        let conn = Arc::new(Mutex::new(test_db()));
        let config = DecayConfig {
            interval_minutes: 60,
            ..Default::default()
        };
        let worker = DecayWorker::new(conn, config);
        let notifier = worker.shutdown_notifier();
        let handle = worker.spawn();

        notifier.notify_one();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not shut down")
            .unwrap();
    }
}
