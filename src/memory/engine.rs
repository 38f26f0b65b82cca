//! The memory engine: orchestrates add, query, and reinforcement.
//!
//! Owns the store connection (behind a mutex; WAL keeps readers moving
//! while a writer holds it), the embedding coordinator, the classifier,
//! and the decay worker lifecycle. All public operations uphold the
//! invariants: one primary-sector vector per memory, at most one
//! outgoing waypoint, salience in `[0, 1]`, unit mean vectors.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use rusqlite::Connection;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MnemoConfig;
use crate::db;
use crate::embedding::{failure_to_error, Embedder, SectorVectors};
use crate::error::{MnemoError, Result};
use crate::memory::classify::Classifier;
use crate::memory::decay::{run_decay_cycle, DecayStats, DecayWorker};
use crate::memory::graph::{self, Traversal, HOP_DISCOUNT};
use crate::memory::rank::{self, ScoreBreakdown};
use crate::memory::stats::{engine_stats, StatsResponse};
use crate::memory::store::{self, NewMemory, SectorCandidate, WaypointEdge};
use crate::memory::types::{Memory, Sector};
use crate::memory::{mean_vector, now_ms};

/// Dimension mean vectors are normalized to before averaging.
pub const MEAN_VEC_DIM: usize = 256;

/// Candidate pool floor per sector: `K' = max(K, 20)`.
const CANDIDATE_FLOOR: usize = 20;

/// Initial salience of a freshly added memory.
const INITIAL_SALIENCE: f64 = 0.5;

/// Input to [`MemoryEngine::add`].
#[derive(Debug, Clone, Default)]
pub struct AddRequest {
    pub content: String,
    pub user_id: Option<String>,
    pub tags: Vec<String>,
    pub meta: Option<serde_json::Value>,
    /// Caller-supplied id; collides with an existing row as `Conflict`.
    pub id: Option<String>,
}

/// Output of [`MemoryEngine::add`].
#[derive(Debug, Serialize)]
pub struct AddResult {
    pub id: String,
    /// Sectors that actually received vectors.
    pub sectors: Vec<Sector>,
    pub primary_sector: Sector,
    /// The forward edge created, if a neighbor cleared the threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waypoint: Option<WaypointEdge>,
    /// The reciprocal edge, present only when primary sectors differed
    /// and the neighbor's existing edge was not stronger.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reciprocal: Option<WaypointEdge>,
}

/// Input to [`MemoryEngine::query`].
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub text: String,
    pub user_id: Option<String>,
    pub limit: usize,
    /// Restrict matching to one sector instead of the classifier's set.
    pub sector: Option<Sector>,
    /// Keep only memories carrying this tag.
    pub tag: Option<String>,
    /// Overrides the configured composite-score floor.
    pub min_score: Option<f64>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            user_id: None,
            limit: 10,
            sector: None,
            tag: None,
            min_score: None,
        }
    }
}

/// One recalled memory with its score and the path that produced it.
#[derive(Debug, Serialize)]
pub struct Recall {
    pub memory: Memory,
    pub score: f64,
    pub explanation: Explanation,
}

/// The explainable recall path: component sub-scores, the sectors that
/// matched, and the waypoint traversed to reach this memory (if any).
#[derive(Debug, Serialize)]
pub struct Explanation {
    pub breakdown: ScoreBreakdown,
    pub matched_sectors: Vec<Sector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traversed: Option<Traversal>,
}

/// Input to [`MemoryEngine::list`].
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub user_id: Option<String>,
    pub sector: Option<Sector>,
    pub tag: Option<String>,
    pub cursor: Option<String>,
    pub limit: usize,
}

/// One page of memories plus the cursor for the next page.
#[derive(Debug, Serialize)]
pub struct ListResult {
    pub memories: Vec<Memory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

struct WorkerHandle {
    notify: Arc<Notify>,
    handle: JoinHandle<()>,
}

/// The self-hosted memory engine.
pub struct MemoryEngine {
    conn: Arc<Mutex<Connection>>,
    embedder: Embedder,
    classifier: RwLock<Classifier>,
    config: MnemoConfig,
    db_path: Option<PathBuf>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl MemoryEngine {
    /// Open the engine against the configured on-disk database.
    ///
    /// The decay worker is not started here; call
    /// [`MemoryEngine::spawn_decay_worker`] from within a tokio runtime.
    pub fn open(config: MnemoConfig) -> Result<Self> {
        let path = config.resolved_db_path();
        let conn = db::open_database(&path)?;
        Self::build(config, conn, Some(path))
    }

    /// Open the engine on an in-memory database (tests, ephemeral use).
    pub fn open_in_memory(config: MnemoConfig) -> Result<Self> {
        let conn = db::open_memory_database()?;
        Self::build(config, conn, None)
    }

    fn build(config: MnemoConfig, conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        let api_key = std::env::var(&config.provider.api_key_env).ok();
        let embedder = Embedder::new(
            config.engine.tier,
            config.engine.embed_mode,
            config.provider.kind,
            config.provider.endpoint.as_deref(),
            config.provider.model.as_deref(),
            api_key,
            config.provider.timeout_secs,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            embedder,
            classifier: RwLock::new(Classifier::new()),
            config,
            db_path,
            worker: Mutex::new(None),
        })
    }

    /// Start the periodic decay worker. Idempotent; a second call while
    /// a worker is running does nothing.
    pub fn spawn_decay_worker(&self) {
        if !self.config.decay.enabled {
            debug!("decay worker disabled by config");
            return;
        }
        let mut slot = self.worker.lock().expect("worker slot poisoned");
        if slot.is_some() {
            return;
        }
        let worker = DecayWorker::new(Arc::clone(&self.conn), self.config.decay.clone());
        let notify = worker.shutdown_notifier();
        let handle = worker.spawn();
        *slot = Some(WorkerHandle { notify, handle });
        info!("decay worker spawned");
    }

    /// Request worker shutdown and join it before the store closes.
    pub async fn shutdown(&self) {
        let taken = self.worker.lock().expect("worker slot poisoned").take();
        if let Some(WorkerHandle { notify, handle }) = taken {
            notify.notify_one();
            if let Err(e) = handle.await {
                warn!(error = %e, "decay worker join failed");
            }
        }
    }

    /// Swap the classifier pattern table at runtime. No data migration:
    /// stored memories keep the sectors they were classified under.
    pub fn reload_patterns(&self, table: Vec<(Sector, Vec<String>)>) {
        *self.classifier.write().expect("classifier lock poisoned") =
            Classifier::with_patterns(table);
        info!("classifier patterns reloaded");
    }

    // ── add ───────────────────────────────────────────────────────────────

    /// Store a new memory: classify, embed its candidate sectors, link it
    /// into the waypoint graph, and persist everything atomically.
    pub async fn add(&self, req: AddRequest) -> Result<AddResult> {
        let content = req.content.trim();
        if content.is_empty() {
            return Err(MnemoError::InvalidInput("content must not be empty".into()));
        }

        let classification = self
            .classifier
            .read()
            .expect("classifier lock poisoned")
            .classify(content);
        let candidate_sectors = classification.candidate_sectors();
        let primary = classification.primary;

        // Provider calls happen before the store lock is taken.
        let embedded = self
            .embedder
            .embed_sectors(content, &candidate_sectors)
            .await?;

        if embedded.get(primary).is_none() {
            let failure = embedded
                .failures
                .iter()
                .find(|f| f.sector == primary)
                .cloned();
            let err = failure_to_error(primary, failure, self.embedder.timeout_secs());
            self.log_embeds(content, &embedded);
            return Err(err);
        }

        let vector_refs: Vec<&[f32]> = embedded.vectors.iter().map(|(_, v)| v.as_slice()).collect();
        let mean_vec = mean_vector(&vector_refs, MEAN_VEC_DIM);

        let now = now_ms();
        let id = req
            .id
            .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());

        let memory = NewMemory {
            id: id.clone(),
            user_id: req.user_id.clone(),
            content: content.to_string(),
            primary_sector: primary,
            tags: req.tags,
            meta: req.meta.unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
            last_seen_at: now,
            salience: INITIAL_SALIENCE,
            decay_lambda: primary.decay_lambda(),
            mean_vec: mean_vec.clone(),
        };

        let mut conn = self.conn.lock().expect("store lock poisoned");

        if store::memory_exists(&conn, &id)? {
            return Err(MnemoError::Conflict(format!("memory id already exists: {id}")));
        }

        let plan = graph::plan_waypoint(
            &conn,
            req.user_id.as_deref(),
            &id,
            &mean_vec,
            primary,
            self.config.engine.waypoint_threshold,
        )?;

        let mut edges: Vec<WaypointEdge> = Vec::new();
        if let Some(plan) = &plan {
            edges.push(plan.forward.clone());
            if let Some(reciprocal) = &plan.reciprocal {
                edges.push(reciprocal.clone());
            }
        }

        store::insert_memory(
            &mut conn,
            &memory,
            &embedded.vectors,
            &edges,
            self.embedder.tier().keeps_keyword_index(),
        )?;

        // The reciprocal may have lost to a stronger existing edge; report
        // what is actually persisted.
        let reciprocal = match plan.as_ref().and_then(|p| p.reciprocal.as_ref()) {
            Some(edge) => store::outgoing_waypoint(&conn, &edge.src_id)?
                .filter(|wp| wp.dst_id == id)
                .map(|wp| WaypointEdge {
                    src_id: wp.src_id,
                    dst_id: wp.dst_id,
                    weight: wp.weight,
                }),
            None => None,
        };

        self.log_embeds_locked(&conn, content, &embedded);
        drop(conn);

        debug!(
            memory_id = %id,
            sector = %primary,
            sectors = embedded.vectors.len(),
            linked = plan.is_some(),
            "memory added"
        );

        Ok(AddResult {
            id,
            sectors: embedded.vectors.iter().map(|(s, _)| *s).collect(),
            primary_sector: primary,
            waypoint: plan.map(|p| p.forward),
            reciprocal,
        })
    }

    // ── query ─────────────────────────────────────────────────────────────

    /// Relevance-ranked recall with 1-hop waypoint expansion, composite
    /// scoring, and implicit reinforcement of everything returned.
    pub async fn query(&self, req: QueryRequest) -> Result<Vec<Recall>> {
        let text = req.text.trim();
        if text.is_empty() {
            return Err(MnemoError::InvalidInput("query text must not be empty".into()));
        }
        if req.limit == 0 {
            return Err(MnemoError::InvalidInput("limit must be positive".into()));
        }

        let sectors: Vec<Sector> = match req.sector {
            Some(s) => vec![s],
            None => self
                .classifier
                .read()
                .expect("classifier lock poisoned")
                .classify(text)
                .candidate_sectors(),
        };

        let embedded = self.embedder.embed_sectors(text, &sectors).await?;
        if embedded.vectors.is_empty() {
            let failure = embedded.failures.first().cloned();
            let sector = failure.as_ref().map(|f| f.sector).unwrap_or(sectors[0]);
            return Err(failure_to_error(sector, failure, self.embedder.timeout_secs()));
        }
        for failure in &embedded.failures {
            warn!(
                sector = %failure.sector,
                provider = %failure.provider,
                reason = %failure.reason,
                "query embedding dropped sector"
            );
        }

        let pool = req.limit.max(CANDIDATE_FLOOR);
        let min_score = req.min_score.unwrap_or(self.config.engine.min_score);
        let now = now_ms();
        let tier = self.embedder.tier();

        struct Hit {
            sim: f64,
            bm25: Option<f64>,
            sectors: Vec<Sector>,
            traversed: Option<Traversal>,
        }

        let conn = self.conn.lock().expect("store lock poisoned");

        // Per-sector linear scans, keeping the strongest `pool` per sector.
        let mut hits: HashMap<String, Hit> = HashMap::new();
        for (sector, query_vec) in &embedded.vectors {
            let mut scored: Vec<(SectorCandidate, f64)> =
                store::candidates_by_sector(&conn, req.user_id.as_deref(), *sector)?
                    .into_iter()
                    .map(|c| {
                        let raw = crate::memory::cosine(query_vec, &c.vec);
                        let sim = rank::weighted_similarity(tier, *sector, raw);
                        (c, sim)
                    })
                    .collect();
            scored.sort_by(|a, b| {
                b.1.total_cmp(&a.1)
                    .then_with(|| a.0.memory_id.cmp(&b.0.memory_id))
            });
            scored.truncate(pool);

            for (candidate, sim) in scored {
                let entry = hits.entry(candidate.memory_id).or_insert(Hit {
                    sim: f64::MIN,
                    bm25: None,
                    sectors: Vec::new(),
                    traversed: None,
                });
                entry.sim = entry.sim.max(sim);
                entry.sectors.push(*sector);
            }
        }

        // Hybrid tier blends BM25 from the keyword side-channel into sim.
        if tier.keeps_keyword_index() {
            let fts = store::fts_scores(&conn, text, pool)?;
            let max_score = fts.iter().map(|(_, s)| *s).fold(0.0f64, f64::max);
            if max_score > 0.0 {
                let norm: HashMap<&str, f64> = fts
                    .iter()
                    .map(|(id, s)| (id.as_str(), s / max_score))
                    .collect();
                for (id, hit) in hits.iter_mut() {
                    let bm25 = norm.get(id.as_str()).copied().unwrap_or(0.0);
                    hit.sim = rank::blend_bm25(hit.sim, bm25);
                    hit.bm25 = Some(bm25);
                }
            }
        }

        // 1-hop waypoint expansion over the strongest candidates.
        let mut ranked_ids: Vec<(String, f64)> =
            hits.iter().map(|(id, h)| (id.clone(), h.sim)).collect();
        ranked_ids.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked_ids.truncate(pool);

        for (id, sim) in ranked_ids {
            if let Some(edge) = store::outgoing_waypoint(&conn, &id)? {
                if !hits.contains_key(&edge.dst_id) {
                    hits.insert(
                        edge.dst_id.clone(),
                        Hit {
                            sim: sim * edge.weight * HOP_DISCOUNT,
                            bm25: None,
                            sectors: Vec::new(),
                            traversed: Some(Traversal {
                                from: id.clone(),
                                to: edge.dst_id,
                                weight: edge.weight,
                            }),
                        },
                    );
                }
            }
        }

        // Compose, filter, order.
        let mut recalls: Vec<Recall> = Vec::with_capacity(hits.len());
        for (id, hit) in hits {
            let memory = match store::get_memory(&conn, &id) {
                Ok(m) => m,
                // A concurrent delete between scan and fetch is not an error.
                Err(MnemoError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            };
            if let Some(tag) = &req.tag {
                if !memory.tags.iter().any(|t| t == tag) {
                    continue;
                }
            }

            let waypoint_weight = store::outgoing_waypoint(&conn, &id)?
                .map(|wp| wp.weight)
                .unwrap_or(0.0);
            let recency = rank::recency_factor(now, memory.last_seen_at);
            let breakdown =
                rank::composite(hit.sim, memory.salience, recency, waypoint_weight, hit.bm25);

            if breakdown.score < min_score {
                continue;
            }

            recalls.push(Recall {
                score: breakdown.score,
                explanation: Explanation {
                    breakdown,
                    matched_sectors: hit.sectors,
                    traversed: hit.traversed,
                },
                memory,
            });
        }

        recalls.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.memory.last_seen_at.cmp(&a.memory.last_seen_at))
                .then_with(|| a.memory.id.cmp(&b.memory.id))
        });
        recalls.truncate(req.limit);

        // Implicit reinforcement: every returned memory gets a salience
        // bump and a fresh last_seen; traversed edges strengthen.
        for recall in &recalls {
            store::bump_salience(
                &conn,
                &recall.memory.id,
                self.config.engine.salience_reinforce_delta,
                now,
            )?;
            if let Some(traversal) = &recall.explanation.traversed {
                store::reinforce_waypoint(
                    &conn,
                    &traversal.from,
                    self.config.engine.waypoint_reinforce_delta,
                    now,
                )?;
            }
        }

        self.log_embeds_locked(&conn, text, &embedded);
        drop(conn);

        Ok(recalls)
    }

    // ── point operations ──────────────────────────────────────────────────

    /// Fetch a memory by id.
    pub fn get(&self, id: &str) -> Result<Memory> {
        let conn = self.conn.lock().expect("store lock poisoned");
        store::get_memory(&conn, id)
    }

    /// Explicitly reinforce a memory. Returns the new salience.
    pub fn reinforce(&self, id: &str, delta: Option<f64>) -> Result<f64> {
        let delta = delta.unwrap_or(self.config.engine.salience_reinforce_delta);
        if !delta.is_finite() || delta <= 0.0 {
            return Err(MnemoError::InvalidInput(
                "reinforce delta must be positive".into(),
            ));
        }
        let conn = self.conn.lock().expect("store lock poisoned");
        store::bump_salience(&conn, id, delta, now_ms())
    }

    /// Paginated listing.
    pub fn list(&self, req: ListRequest) -> Result<ListResult> {
        let limit = if req.limit == 0 { 50 } else { req.limit };
        let conn = self.conn.lock().expect("store lock poisoned");
        let page = store::list_memories(
            &conn,
            req.user_id.as_deref(),
            req.sector,
            req.tag.as_deref(),
            req.cursor.as_deref(),
            limit,
        )?;
        Ok(ListResult {
            memories: page.memories,
            next_cursor: page.next_cursor,
        })
    }

    /// Delete a memory and its vectors and edges.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut conn = self.conn.lock().expect("store lock poisoned");
        store::delete_memory(&mut conn, id)
    }

    /// Engine statistics: counts per sector and tier, graph size, decay
    /// bookkeeping.
    pub fn stats(&self) -> Result<StatsResponse> {
        let conn = self.conn.lock().expect("store lock poisoned");
        engine_stats(&conn, self.db_path.as_deref())
    }

    /// Run one decay cycle immediately, regardless of the worker.
    pub fn run_decay_now(&self) -> Result<DecayStats> {
        let mut conn = self.conn.lock().expect("store lock poisoned");
        run_decay_cycle(&mut conn, &self.config.decay, now_ms())
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn log_embeds(&self, text: &str, embedded: &SectorVectors) {
        let conn = self.conn.lock().expect("store lock poisoned");
        self.log_embeds_locked(&conn, text, embedded);
    }

    /// Append one `embed_logs` row per attempted sector. Log failures are
    /// themselves non-fatal.
    fn log_embeds_locked(&self, conn: &Connection, text: &str, embedded: &SectorVectors) {
        let ts = now_ms();
        let tokens = text.split_whitespace().count();
        for (sector, vec) in &embedded.vectors {
            let provider = self.embedder.provider_for(*sector);
            if let Err(e) =
                store::append_embed_log(conn, ts, provider, *sector, tokens, vec.len(), true)
            {
                warn!(error = %e, "embed log write failed");
            }
        }
        for failure in &embedded.failures {
            if let Err(e) = store::append_embed_log(
                conn,
                ts,
                &failure.provider,
                failure.sector,
                tokens,
                0,
                false,
            ) {
                warn!(error = %e, "embed log write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_engine() -> MemoryEngine {
        MemoryEngine::open_in_memory(MnemoConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn add_rejects_empty_content() {
        let engine = fast_engine();
        let result = engine.add(AddRequest::default()).await;
        assert!(matches!(result, Err(MnemoError::InvalidInput(_))));

        let result = engine
            .add(AddRequest {
                content: "   ".into(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(MnemoError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn query_rejects_zero_limit() {
        let engine = fast_engine();
        let result = engine
            .query(QueryRequest {
                text: "anything".into(),
                limit: 0,
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(MnemoError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn add_assigns_primary_vector_and_mean() {
        let engine = fast_engine();
        let result = engine
            .add(AddRequest {
                content: "today I felt anxious about the deploy".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.primary_sector, Sector::Emotional);
        assert!(result.sectors.contains(&Sector::Emotional));
        assert!(result.sectors.contains(&Sector::Episodic));

        let memory = engine.get(&result.id).unwrap();
        assert_eq!(memory.salience, INITIAL_SALIENCE);
        assert_eq!(memory.decay_lambda, Sector::Emotional.decay_lambda());
        let norm: f32 = memory.mean_vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn caller_supplied_duplicate_id_conflicts() {
        let engine = fast_engine();
        engine
            .add(AddRequest {
                content: "first".into(),
                id: Some("fixed-id".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let result = engine
            .add(AddRequest {
                content: "second".into(),
                id: Some("fixed-id".into()),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(MnemoError::Conflict(_))));
    }

    #[tokio::test]
    async fn reinforce_requires_positive_delta() {
        let engine = fast_engine();
        let added = engine
            .add(AddRequest {
                content: "a fact is a fact".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(matches!(
            engine.reinforce(&added.id, Some(0.0)),
            Err(MnemoError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.reinforce("missing", None),
            Err(MnemoError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn query_expands_waypoint_neighbor_and_reinforces_edge() {
        let engine = fast_engine();
        let a = engine
            .add(AddRequest {
                content: "Alice leads the research team".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let b = engine
            .add(AddRequest {
                content: "Alice is the team lead for research".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let edge = b.waypoint.clone().expect("edge b -> a");
        assert_eq!(edge.dst_id, a.id);

        // Strip A's vectors so it can only be reached through the hop.
        {
            let conn = engine.conn.lock().unwrap();
            conn.execute(
                "DELETE FROM vectors WHERE memory_id = ?1",
                rusqlite::params![a.id],
            )
            .unwrap();
        }

        let results = engine
            .query(QueryRequest {
                text: "who is the team lead for research".into(),
                limit: 10,
                min_score: Some(0.0),
                ..Default::default()
            })
            .await
            .unwrap();

        let a_recall = results
            .iter()
            .find(|r| r.memory.id == a.id)
            .expect("neighbor reached via expansion");
        let traversal = a_recall.explanation.traversed.as_ref().unwrap();
        assert_eq!(traversal.from, b.id);
        assert_eq!(traversal.to, a.id);

        let b_recall = results.iter().find(|r| r.memory.id == b.id).unwrap();
        let expected = b_recall.explanation.breakdown.similarity * edge.weight * HOP_DISCOUNT;
        assert!((a_recall.explanation.breakdown.similarity - expected).abs() < 1e-9);

        // The traversed edge picked up its reinforcement delta.
        let conn = engine.conn.lock().unwrap();
        let after = store::outgoing_waypoint(&conn, &b.id).unwrap().unwrap();
        assert!((after.weight - (edge.weight + 0.05).min(1.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn embed_logs_record_every_sector() {
        let engine = fast_engine();
        engine
            .add(AddRequest {
                content: "today I felt anxious about the deploy".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let stats = engine.stats().unwrap();
        // emotional + episodic at minimum
        assert!(stats.embed_log_entries >= 2);
    }
}
