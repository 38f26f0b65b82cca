//! Core memory engine: classification, storage, graph, ranking, decay.
//!
//! This module contains the write/read orchestrator ([`engine`]), the
//! rule-based sector classifier ([`classify`]), transactional persistence
//! ([`store`]), the waypoint graph ([`graph`]), composite scoring
//! ([`rank`]), the background decay worker ([`decay`]), and statistics
//! ([`stats`]). Type definitions live in [`types`].

pub mod classify;
pub mod decay;
pub mod engine;
pub mod graph;
pub mod rank;
pub mod stats;
pub mod store;
pub mod types;

/// Current time as epoch milliseconds (UTC).
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Stable 64-bit FNV-1a hash. Used wherever a hash must survive process
/// restarts: synthetic embedding seeds, fingerprints, decay shards.
pub(crate) fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Encode an f32 vector as a blob: 4-byte little-endian dim prefix
/// followed by little-endian IEEE-754 float32 values.
pub fn encode_vector(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + v.len() * 4);
    out.extend_from_slice(&(v.len() as u32).to_le_bytes());
    for x in v {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

/// Decode a dim-prefixed vector blob. Fails on truncated or
/// length-mismatched input.
pub fn decode_vector(bytes: &[u8]) -> crate::error::Result<Vec<f32>> {
    if bytes.len() < 4 {
        return Err(crate::error::MnemoError::StoreFailed(
            "vector blob shorter than dim prefix".into(),
        ));
    }
    let dim = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let payload = &bytes[4..];
    if payload.len() != dim * 4 {
        return Err(crate::error::MnemoError::StoreFailed(format!(
            "vector blob length {} does not match dim {dim}",
            payload.len()
        )));
    }
    Ok(payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity between two vectors. Dimension mismatches compare the
/// shared prefix; zero vectors yield 0.0.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for i in 0..n {
        dot += f64::from(a[i]) * f64::from(b[i]);
        norm_a += f64::from(a[i]) * f64::from(a[i]);
        norm_b += f64::from(b[i]) * f64::from(b[i]);
    }
    // Include tail mass of the longer vector so padded comparisons stay honest.
    for x in &a[n..] {
        norm_a += f64::from(*x) * f64::from(*x);
    }
    for x in &b[n..] {
        norm_b += f64::from(*x) * f64::from(*x);
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// L2-normalize a vector in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Truncate or zero-pad a vector to `dim` entries.
pub fn fit_to_dim(v: &[f32], dim: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; dim];
    let n = v.len().min(dim);
    out[..n].copy_from_slice(&v[..n]);
    out
}

/// Unit-length centroid of a set of vectors, each fitted to `dim` first.
/// Returns a zero vector when `vectors` is empty.
pub fn mean_vector(vectors: &[&[f32]], dim: usize) -> Vec<f32> {
    let mut mean = vec![0.0f32; dim];
    if vectors.is_empty() {
        return mean;
    }
    for v in vectors {
        let fitted = fit_to_dim(v, dim);
        for (slot, x) in mean.iter_mut().zip(fitted.iter()) {
            *slot += x;
        }
    }
    let count = vectors.len() as f32;
    for slot in mean.iter_mut() {
        *slot /= count;
    }
    l2_normalize(&mut mean);
    mean
}
