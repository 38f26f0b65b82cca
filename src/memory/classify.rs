//! Rule-based sector classification.
//!
//! Each sector owns a case-insensitive pattern set. Confidence for a
//! sector is `matches / (matches + 1)`; the primary sector is the argmax
//! with ties broken by the fixed order in [`Sector::TIE_BREAK_ORDER`],
//! and any sector at or above the candidate floor joins the embedding
//! set. Text matching nothing defaults to `semantic` with confidence 0.
//!
//! Pattern sets are plain data and can be swapped at runtime; no data
//! migration is involved.

use crate::memory::types::Sector;

/// Minimum confidence for a sector to become an embedding candidate.
const CANDIDATE_FLOOR: f64 = 0.2;

/// Built-in pattern table. Patterns are matched as lowercase substrings;
/// entries with leading/trailing spaces anchor on word boundaries.
const DEFAULT_PATTERNS: &[(Sector, &[&str])] = &[
    (
        Sector::Semantic,
        &[
            " is ",
            " are ",
            " was ",
            " means ",
            "defined as",
            "definition of",
            "refers to",
            "consists of",
            "known as",
            "stands for",
            "capital of",
        ],
    ),
    (
        Sector::Episodic,
        &[
            "today",
            "yesterday",
            "last week",
            "last night",
            "this morning",
            "this afternoon",
            "earlier",
            "we met",
            "i went",
            "i attended",
            "happened",
            "during the",
            " ago",
        ],
    ),
    (
        Sector::Procedural,
        &[
            "how to",
            "step ",
            "steps:",
            "first,",
            "then run",
            "in order to",
            "procedure",
            "workflow",
            "install",
            "configure",
            "to do this",
            "make sure to",
        ],
    ),
    (
        Sector::Emotional,
        &[
            "felt",
            "feel",
            "feeling",
            "anxious",
            "happy",
            "sad",
            "angry",
            "excited",
            "worried",
            "frustrated",
            "afraid",
            "nervous",
            "stressed",
            "relieved",
            "proud",
        ],
    ),
    (
        Sector::Reflective,
        &[
            "i think",
            "i believe",
            "i realize",
            "i should have",
            "in retrospect",
            "looking back",
            "lesson learned",
            "next time",
            "on reflection",
            "takeaway",
            "in hindsight",
        ],
    ),
];

/// A sector with its match confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorConfidence {
    pub sector: Sector,
    pub confidence: f64,
}

/// Classification of one input text.
#[derive(Debug, Clone)]
pub struct Classification {
    /// The single strongest sector (argmax, fixed-order tie-break).
    pub primary: Sector,
    /// Confidence of the primary sector.
    pub confidence: f64,
    /// Sectors to embed: everything at or above the candidate floor,
    /// plus the primary. Ordered confidence-descending.
    pub candidates: Vec<SectorConfidence>,
}

impl Classification {
    /// Candidate sectors in embedding order.
    pub fn candidate_sectors(&self) -> Vec<Sector> {
        self.candidates.iter().map(|c| c.sector).collect()
    }
}

/// Deterministic pattern-set classifier.
pub struct Classifier {
    patterns: Vec<(Sector, Vec<String>)>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    /// Classifier with the built-in pattern table.
    pub fn new() -> Self {
        let patterns = DEFAULT_PATTERNS
            .iter()
            .map(|(sector, pats)| (*sector, pats.iter().map(|p| p.to_string()).collect()))
            .collect();
        Self { patterns }
    }

    /// Classifier with a caller-supplied pattern table. Patterns are
    /// lowercased; sectors absent from the table simply never match.
    pub fn with_patterns(table: Vec<(Sector, Vec<String>)>) -> Self {
        let patterns = table
            .into_iter()
            .map(|(sector, pats)| {
                (
                    sector,
                    pats.into_iter().map(|p| p.to_lowercase()).collect(),
                )
            })
            .collect();
        Self { patterns }
    }

    /// Classify `text`. Identical input always yields identical output.
    pub fn classify(&self, text: &str) -> Classification {
        let lower = text.to_lowercase();

        let mut scored: Vec<SectorConfidence> = Vec::with_capacity(5);
        for &sector in &Sector::TIE_BREAK_ORDER {
            let matches = self
                .patterns
                .iter()
                .find(|(s, _)| *s == sector)
                .map(|(_, pats)| pats.iter().filter(|p| lower.contains(p.as_str())).count())
                .unwrap_or(0);
            let confidence = matches as f64 / (matches as f64 + 1.0);
            scored.push(SectorConfidence { sector, confidence });
        }

        // Argmax; ties resolve to the earlier entry (fixed sector order),
        // and a fully unmatched text falls through to semantic at 0.0.
        let mut primary = SectorConfidence {
            sector: Sector::Semantic,
            confidence: 0.0,
        };
        for c in &scored {
            if c.confidence > primary.confidence {
                primary = *c;
            }
        }

        let mut candidates: Vec<SectorConfidence> = scored
            .iter()
            .copied()
            .filter(|c| c.confidence >= CANDIDATE_FLOOR || c.sector == primary.sector)
            .collect();
        candidates.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());

        Classification {
            primary: primary.sector,
            confidence: primary.confidence,
            candidates,
        }
    }
}
