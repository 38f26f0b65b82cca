//! Deterministic synthetic embeddings.
//!
//! Used by the HYBRID/FAST tiers and as the fallback for sectors the
//! SMART tier keeps off the external provider. Each token of the input
//! seeds a pseudo-random stream from a stable hash of `sector|token`;
//! the per-token vectors accumulate and the sum is L2-normalized, so
//! identical `(text, sector)` pairs always produce the same vector and
//! texts sharing tokens land close in cosine space.

use crate::memory::l2_normalize;
use crate::memory::types::Sector;

/// Dimensionality of synthetic vectors at the HYBRID/FAST tiers.
pub const SYNTHETIC_DIM: usize = 256;

/// Embed `text` for `sector` into a unit vector of `dim` entries.
pub fn embed(text: &str, sector: Sector, dim: usize) -> Vec<f32> {
    let mut acc = vec![0.0f32; dim];
    let mut tokens = 0usize;

    for token in tokenize(text) {
        let seed = stable_hash(sector.as_str().as_bytes(), token.as_bytes());
        fill_from_seed(&mut acc, seed);
        tokens += 1;
    }

    // Whitespace-only or fully non-alphanumeric input still gets a
    // deterministic vector keyed on the raw text.
    if tokens == 0 {
        let seed = stable_hash(sector.as_str().as_bytes(), text.as_bytes());
        fill_from_seed(&mut acc, seed);
    }

    l2_normalize(&mut acc);
    acc
}

/// Lowercased alphanumeric tokens with a light plural/inflection strip:
/// a single trailing `s` is dropped from tokens longer than three chars,
/// so "leads"/"lead" and "waypoints"/"waypoint" share mass.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| {
            let lower = t.to_lowercase();
            match lower.strip_suffix('s') {
                Some(stem) if stem.chars().count() > 3 => stem.to_string(),
                _ => lower,
            }
        })
}

/// Stable 64-bit hash over `prefix || "|" || payload`.
fn stable_hash(prefix: &[u8], payload: &[u8]) -> u64 {
    let mut keyed = Vec::with_capacity(prefix.len() + 1 + payload.len());
    keyed.extend_from_slice(prefix);
    keyed.push(b'|');
    keyed.extend_from_slice(payload);
    crate::memory::fnv1a64(&keyed)
}

/// Accumulate one pseudo-random unit-range stream into `acc`.
fn fill_from_seed(acc: &mut [f32], seed: u64) {
    let mut state = seed;
    for slot in acc.iter_mut() {
        *slot += next_unit(&mut state);
    }
}

/// SplitMix64 step mapped into `[-1, 1]`.
fn next_unit(state: &mut u64) -> f32 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;
    (z as f64 / u64::MAX as f64) as f32 * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::cosine;

    #[test]
    fn identical_input_produces_identical_vector() {
        let a = embed("Rust is a systems language", Sector::Semantic, SYNTHETIC_DIM);
        let b = embed("Rust is a systems language", Sector::Semantic, SYNTHETIC_DIM);
        assert_eq!(a, b);
    }

    #[test]
    fn vectors_are_unit_length() {
        let v = embed("the capital of France is Paris", Sector::Semantic, SYNTHETIC_DIM);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[test]
    fn different_sectors_produce_different_vectors() {
        let a = embed("deploy failed", Sector::Episodic, SYNTHETIC_DIM);
        let b = embed("deploy failed", Sector::Emotional, SYNTHETIC_DIM);
        assert!(cosine(&a, &b) < 0.5);
    }

    #[test]
    fn overlapping_texts_land_close() {
        let stored = embed("the capital of France is Paris", Sector::Semantic, SYNTHETIC_DIM);
        let query = embed("what is the capital of France", Sector::Semantic, SYNTHETIC_DIM);
        let sim = cosine(&stored, &query);
        assert!(sim >= 0.5, "expected overlap similarity >= 0.5, got {sim}");
    }

    #[test]
    fn unrelated_texts_land_far() {
        let a = embed("the capital of France is Paris", Sector::Semantic, SYNTHETIC_DIM);
        let b = embed("quantum qubits decohere rapidly", Sector::Semantic, SYNTHETIC_DIM);
        assert!(cosine(&a, &b) < 0.3);
    }

    #[test]
    fn plural_strip_aligns_inflections() {
        let a = embed("Alice leads the research team", Sector::Semantic, SYNTHETIC_DIM);
        let b = embed("Alice is the team lead for research", Sector::Semantic, SYNTHETIC_DIM);
        let sim = cosine(&a, &b);
        assert!(sim > 0.75, "expected paraphrase similarity > 0.75, got {sim}");
    }

    #[test]
    fn empty_text_is_deterministic() {
        let a = embed("", Sector::Semantic, SYNTHETIC_DIM);
        let b = embed("", Sector::Semantic, SYNTHETIC_DIM);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn respects_requested_dim() {
        assert_eq!(embed("x", Sector::Semantic, 384).len(), 384);
        assert_eq!(embed("x", Sector::Semantic, 1536).len(), 1536);
    }
}
