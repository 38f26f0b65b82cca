//! Waypoint graph maintenance.
//!
//! Edges live only in the store; the in-memory view here is computed on
//! demand and never holds owning references between memories. A new
//! memory links to its nearest neighbor by mean-vector cosine when the
//! similarity clears the configured threshold, and gains a reciprocal
//! edge only when the two memories disagree on primary sector.

use rusqlite::Connection;

use crate::error::Result;
use crate::memory::cosine;
use crate::memory::store::{self, WaypointEdge};
use crate::memory::types::Sector;

/// The edges a new memory should create: the forward link and, when
/// primary sectors differ, the reciprocal link back.
#[derive(Debug, Clone)]
pub struct EdgePlan {
    pub forward: WaypointEdge,
    pub reciprocal: Option<WaypointEdge>,
}

/// A traversed edge recorded in a recall explanation.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Traversal {
    pub from: String,
    pub to: String,
    pub weight: f64,
}

/// Discount applied to similarity carried across one waypoint hop.
pub const HOP_DISCOUNT: f64 = 0.9;

/// Find the best waypoint target for a new memory.
///
/// Linear scan of the user scope's mean vectors; the strongest cosine at
/// or above `threshold` wins. The reciprocal edge is subject to the
/// weight-preferred upsert at write time: a weaker existing edge on the
/// target is replaced, a stronger one survives.
pub fn plan_waypoint(
    conn: &Connection,
    user_id: Option<&str>,
    new_id: &str,
    mean_vec: &[f32],
    primary_sector: Sector,
    threshold: f64,
) -> Result<Option<EdgePlan>> {
    if mean_vec.is_empty() {
        return Ok(None);
    }

    let mut best: Option<(String, Sector, f64)> = None;
    for candidate in store::mean_candidates(conn, user_id)? {
        if candidate.memory_id == new_id {
            continue;
        }
        let sim = cosine(mean_vec, &candidate.mean_vec);
        match &best {
            Some((_, _, best_sim)) if sim <= *best_sim => {}
            _ => best = Some((candidate.memory_id, candidate.primary_sector, sim)),
        }
    }

    let Some((target_id, target_sector, sim)) = best else {
        return Ok(None);
    };
    if sim < threshold {
        return Ok(None);
    }

    let forward = WaypointEdge {
        src_id: new_id.to_string(),
        dst_id: target_id.clone(),
        weight: sim,
    };
    let reciprocal = (target_sector != primary_sector).then(|| WaypointEdge {
        src_id: target_id,
        dst_id: new_id.to_string(),
        weight: sim,
    });

    Ok(Some(EdgePlan { forward, reciprocal }))
}
