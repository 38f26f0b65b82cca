//! Core memory type definitions.
//!
//! Defines [`Sector`] (the five cognitive memory categories), [`Memory`]
//! (a full record), [`Waypoint`] (associative graph edges), and
//! [`MemoryTier`] (the salience-derived hot/warm/cold bands).

use serde::{Deserialize, Serialize};

/// The five cognitive sectors, inspired by cognitive science.
///
/// Each sector carries its own decay rate and recall weight: emotional
/// memories fade fastest, reflective insights slowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    /// Events, sessions, things that happened at a point in time.
    Episodic,
    /// Facts, knowledge, definitions — the default sector.
    Semantic,
    /// Workflows, how-to steps, learned procedures.
    Procedural,
    /// Feelings and affect-laden observations — fast decay, high weight.
    Emotional,
    /// Insights, lessons learned, meta-observations — slowest decay.
    Reflective,
}

impl Sector {
    /// All sectors in classifier tie-break order. When two sectors match
    /// with equal confidence, the earlier one in this list wins.
    pub const TIE_BREAK_ORDER: [Sector; 5] = [
        Sector::Semantic,
        Sector::Episodic,
        Sector::Procedural,
        Sector::Emotional,
        Sector::Reflective,
    ];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
            Self::Emotional => "emotional",
            Self::Reflective => "reflective",
        }
    }

    /// Per-sector exponential decay rate (per day of inactivity).
    pub fn decay_lambda(&self) -> f64 {
        match self {
            Self::Episodic => 0.015,
            Self::Semantic => 0.005,
            Self::Procedural => 0.008,
            Self::Emotional => 0.020,
            Self::Reflective => 0.001,
        }
    }

    /// Per-sector recall weight applied to the similarity channel.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Episodic => 1.2,
            Self::Semantic => 1.0,
            Self::Procedural => 1.1,
            Self::Emotional => 1.3,
            Self::Reflective => 0.8,
        }
    }

    /// Knowledge-like sectors that the SMART tier routes to the external
    /// provider; the rest stay on synthetic embeddings.
    pub fn is_semantic_class(&self) -> bool {
        matches!(self, Self::Semantic | Self::Reflective)
    }
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            "procedural" => Ok(Self::Procedural),
            "emotional" => Ok(Self::Emotional),
            "reflective" => Ok(Self::Reflective),
            _ => Err(format!("unknown sector: {s}")),
        }
    }
}

/// Salience band a memory currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    Hot,
    Warm,
    Cold,
}

impl MemoryTier {
    /// Band boundaries: hot ≥ 0.5, warm ≥ 0.25, cold below.
    pub fn from_salience(salience: f64) -> Self {
        if salience >= 0.5 {
            Self::Hot
        } else if salience >= 0.25 {
            Self::Warm
        } else {
            Self::Cold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
        }
    }
}

/// A memory record, matching the `memories` table schema.
///
/// All timestamps are epoch milliseconds (UTC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    /// Optional isolation key. `None` places the memory in the global space.
    pub user_id: Option<String>,
    /// Original text, or the fingerprint once the memory has gone cold.
    pub content: String,
    /// The single strongest sector assigned at classification time.
    pub primary_sector: Sector,
    /// Short labels, order-insensitive.
    pub tags: Vec<String>,
    /// Opaque key/value mapping supplied by the caller.
    pub meta: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
    /// Last recall or reinforcement time; drives recency scoring and decay.
    pub last_seen_at: i64,
    /// Importance in `[0, 1]`; starts at 0.5, decays, boosted on recall.
    pub salience: f64,
    /// Decay rate derived from the primary sector.
    pub decay_lambda: f64,
    /// Unit-length centroid of the per-sector vectors; used for waypoint
    /// matching.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub mean_vec: Vec<f32>,
    /// True once content has been replaced by a fingerprint.
    pub cold: bool,
}

impl Memory {
    /// Current salience band.
    pub fn tier(&self) -> MemoryTier {
        MemoryTier::from_salience(self.salience)
    }
}

/// A directed associative edge between two memories.
///
/// Each `src_id` has at most one outgoing waypoint at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    pub src_id: String,
    pub dst_id: String,
    /// Edge strength in `(0, 1]` — the mean-vector cosine at creation,
    /// reinforced on traversal.
    pub weight: f64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_round_trips_through_str() {
        for sector in Sector::TIE_BREAK_ORDER {
            let parsed: Sector = sector.as_str().parse().unwrap();
            assert_eq!(parsed, sector);
        }
        assert!("entity".parse::<Sector>().is_err());
    }

    #[test]
    fn sector_table_matches_design() {
        assert_eq!(Sector::Emotional.decay_lambda(), 0.020);
        assert_eq!(Sector::Reflective.decay_lambda(), 0.001);
        assert_eq!(Sector::Semantic.weight(), 1.0);
        assert_eq!(Sector::Emotional.weight(), 1.3);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(MemoryTier::from_salience(0.9), MemoryTier::Hot);
        assert_eq!(MemoryTier::from_salience(0.5), MemoryTier::Hot);
        assert_eq!(MemoryTier::from_salience(0.49), MemoryTier::Warm);
        assert_eq!(MemoryTier::from_salience(0.25), MemoryTier::Warm);
        assert_eq!(MemoryTier::from_salience(0.24), MemoryTier::Cold);
    }

    #[test]
    fn memory_tier_follows_salience() {
        let memory = Memory {
            id: "m".into(),
            user_id: None,
            content: "x".into(),
            primary_sector: Sector::Semantic,
            tags: vec![],
            meta: serde_json::Value::Null,
            created_at: 0,
            updated_at: 0,
            last_seen_at: 0,
            salience: 0.3,
            decay_lambda: 0.005,
            mean_vec: vec![],
            cold: false,
        };
        assert_eq!(memory.tier(), MemoryTier::Warm);
    }

    #[test]
    fn semantic_class_covers_knowledge_sectors() {
        assert!(Sector::Semantic.is_semantic_class());
        assert!(Sector::Reflective.is_semantic_class());
        assert!(!Sector::Episodic.is_semantic_class());
        assert!(!Sector::Emotional.is_semantic_class());
    }
}
