//! Composite recall scoring.
//!
//! The final score blends four channels, each already in `[0, 1]`:
//!
//! `score = 0.6·sim + 0.2·salience + 0.1·recency + 0.1·waypoint`
//!
//! where recency is `exp(−Δdays / 30)` against `last_seen_at` and
//! waypoint is the memory's strongest outgoing edge weight. Raw cosines
//! land in `[−1, 1]`; tiers built on synthetic vectors map them through
//! `(sim + 1) / 2`, provider tiers clamp negatives to zero.

use crate::embedding::Tier;
use crate::memory::types::Sector;

pub const W_SIMILARITY: f64 = 0.6;
pub const W_SALIENCE: f64 = 0.2;
pub const W_RECENCY: f64 = 0.1;
pub const W_WAYPOINT: f64 = 0.1;

/// Half-life-style window for the recency channel, in days.
const RECENCY_WINDOW_DAYS: f64 = 30.0;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Per-component sub-scores attached to every recall: the explainable
/// recall path guarantee.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScoreBreakdown {
    /// Similarity channel after unit mapping, sector weighting, and (on
    /// the hybrid tier) BM25 blending.
    pub similarity: f64,
    pub salience: f64,
    pub recency: f64,
    pub waypoint: f64,
    /// Normalized BM25 contribution, present only on the hybrid tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25: Option<f64>,
    /// The weighted composite, in `[0, 1]`.
    pub score: f64,
}

/// Map a raw cosine into `[0, 1]` for the composite.
///
/// Synthetic vectors routinely produce negative cosines, so tiers that
/// serve `sector` synthetically use the affine map; provider embeddings
/// only clamp.
pub fn unit_similarity(tier: Tier, sector: Sector, raw_cosine: f64) -> f64 {
    let mapped = if tier.is_synthetic(sector) {
        (raw_cosine + 1.0) / 2.0
    } else {
        raw_cosine.max(0.0)
    };
    mapped.clamp(0.0, 1.0)
}

/// Apply the sector's recall weight to a unit similarity, staying in
/// `[0, 1]`.
pub fn weighted_similarity(tier: Tier, sector: Sector, raw_cosine: f64) -> f64 {
    (unit_similarity(tier, sector, raw_cosine) * sector.weight()).clamp(0.0, 1.0)
}

/// Recency factor `exp(−Δdays / 30)` from `last_seen_at` to `now`.
pub fn recency_factor(now_ms: i64, last_seen_ms: i64) -> f64 {
    let delta_days = ((now_ms - last_seen_ms).max(0) as f64) / MS_PER_DAY;
    (-delta_days / RECENCY_WINDOW_DAYS).exp()
}

/// Compose the final score from unit-interval channels.
pub fn composite(
    similarity: f64,
    salience: f64,
    recency: f64,
    waypoint: f64,
    bm25: Option<f64>,
) -> ScoreBreakdown {
    let similarity = similarity.clamp(0.0, 1.0);
    let salience = salience.clamp(0.0, 1.0);
    let recency = recency.clamp(0.0, 1.0);
    let waypoint = waypoint.clamp(0.0, 1.0);

    let score = W_SIMILARITY * similarity
        + W_SALIENCE * salience
        + W_RECENCY * recency
        + W_WAYPOINT * waypoint;

    ScoreBreakdown {
        similarity,
        salience,
        recency,
        waypoint,
        bm25,
        score,
    }
}

/// Blend the similarity channel with a normalized BM25 score (hybrid
/// tier): `sim := 0.5·cosine + 0.5·bm25_norm`.
pub fn blend_bm25(similarity: f64, bm25_norm: f64) -> f64 {
    0.5 * similarity + 0.5 * bm25_norm.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_similarity_maps_synthetic_range() {
        assert_eq!(unit_similarity(Tier::Fast, Sector::Semantic, -1.0), 0.0);
        assert_eq!(unit_similarity(Tier::Fast, Sector::Semantic, 0.0), 0.5);
        assert_eq!(unit_similarity(Tier::Fast, Sector::Semantic, 1.0), 1.0);
    }

    #[test]
    fn unit_similarity_clamps_provider_range() {
        assert_eq!(unit_similarity(Tier::Deep, Sector::Semantic, -0.3), 0.0);
        assert_eq!(unit_similarity(Tier::Deep, Sector::Semantic, 0.8), 0.8);
    }

    #[test]
    fn sector_weight_never_pushes_past_one() {
        let sim = weighted_similarity(Tier::Fast, Sector::Emotional, 0.9);
        assert!(sim <= 1.0);
        // emotional weight 1.3 on (0.9+1)/2 = 0.95 saturates
        assert_eq!(sim, 1.0);

        // reflective weight 0.8 damps
        let sim = weighted_similarity(Tier::Fast, Sector::Reflective, 1.0);
        assert!((sim - 0.8).abs() < 1e-9);
    }

    #[test]
    fn recency_decays_over_thirty_day_window() {
        let now = 1_700_000_000_000i64;
        assert!((recency_factor(now, now) - 1.0).abs() < 1e-9);

        let thirty_days_ago = now - (30.0 * MS_PER_DAY) as i64;
        let r = recency_factor(now, thirty_days_ago);
        assert!((r - (-1.0f64).exp()).abs() < 1e-6);

        // Future last_seen clamps to 1.0 rather than exceeding it.
        assert_eq!(recency_factor(now, now + 1000), 1.0);
    }

    #[test]
    fn composite_is_bounded_and_weighted() {
        let b = composite(1.0, 1.0, 1.0, 1.0, None);
        assert!((b.score - 1.0).abs() < 1e-9);

        let b = composite(0.5, 0.5, 1.0, 0.0, None);
        assert!((b.score - (0.3 + 0.1 + 0.1)).abs() < 1e-9);

        let b = composite(2.0, -1.0, 0.5, 0.5, None);
        assert!(b.score <= 1.0 && b.score >= 0.0);
        assert_eq!(b.similarity, 1.0);
        assert_eq!(b.salience, 0.0);
    }

    #[test]
    fn bm25_blend_is_half_and_half() {
        assert!((blend_bm25(0.8, 0.4) - 0.6).abs() < 1e-9);
        assert!((blend_bm25(0.8, 2.0) - 0.9).abs() < 1e-9); // norm clamps
    }
}
