//! Multi-sector embedding coordinator.
//!
//! The [`Embedder`] turns text into per-sector vectors according to a
//! performance [`Tier`] and a pluggable provider backend. Tiers decide
//! which sectors hit the external provider and at what dimensionality;
//! the coordinator handles batching ([`EmbedMode`]), bounded timeouts,
//! and the per-sector failure policy (a non-primary failure drops the
//! sector, it never fails the operation).

pub mod remote;
pub mod synthetic;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MnemoError, Result};
use crate::memory::types::Sector;
use remote::{EmbeddingBackend, HttpBackend};
pub use synthetic::SYNTHETIC_DIM;

/// Provider-backed dimension at the SMART tier.
pub const SMART_DIM: usize = 384;
/// Provider-backed dimension at the DEEP tier.
pub const DEEP_DIM: usize = 1536;

/// Performance profile controlling dimensionality and provider usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Synthetic vectors plus a BM25 keyword side-channel.
    Hybrid,
    /// Synthetic vectors only; fully offline and deterministic.
    Fast,
    /// Provider vectors for knowledge-like sectors, synthetic for the rest.
    Smart,
    /// Provider vectors for every sector.
    Deep,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::Fast => "fast",
            Self::Smart => "smart",
            Self::Deep => "deep",
        }
    }

    /// Vector dimensionality for `sector` at this tier.
    pub fn dim_for(&self, sector: Sector) -> usize {
        match self {
            Self::Hybrid | Self::Fast => SYNTHETIC_DIM,
            Self::Smart => {
                if sector.is_semantic_class() {
                    SMART_DIM
                } else {
                    SYNTHETIC_DIM
                }
            }
            Self::Deep => DEEP_DIM,
        }
    }

    /// Whether `sector` is served synthetically at this tier.
    pub fn is_synthetic(&self, sector: Sector) -> bool {
        match self {
            Self::Hybrid | Self::Fast => true,
            Self::Smart => !sector.is_semantic_class(),
            Self::Deep => false,
        }
    }

    /// Only the hybrid tier maintains the FTS5 keyword side-channel.
    pub fn keeps_keyword_index(&self) -> bool {
        matches!(self, Self::Hybrid)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "hybrid" => Ok(Self::Hybrid),
            "fast" => Ok(Self::Fast),
            "smart" => Ok(Self::Smart),
            "deep" => Ok(Self::Deep),
            _ => Err(format!("unknown tier: {s}")),
        }
    }
}

/// Embedding provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    Aws,
    Ollama,
    Local,
    Synthetic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Aws => "aws",
            Self::Ollama => "ollama",
            Self::Local => "local",
            Self::Synthetic => "synthetic",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            "aws" => Ok(Self::Aws),
            "ollama" => Ok(Self::Ollama),
            "local" => Ok(Self::Local),
            "synthetic" => Ok(Self::Synthetic),
            _ => Err(format!("unknown provider: {s}")),
        }
    }
}

/// Provider batching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    /// One batched provider call per input; provider-backed sectors share
    /// the resulting vector.
    Simple,
    /// One sector-conditioned provider call per sector: higher precision,
    /// more requests.
    Advanced,
}

impl std::str::FromStr for EmbedMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Self::Simple),
            "advanced" => Ok(Self::Advanced),
            _ => Err(format!("unknown embed mode: {s}")),
        }
    }
}

/// One dropped sector with the reason, surfaced to the engine so it can
/// log the failure and decide whether the primary sector was lost.
#[derive(Debug, Clone)]
pub struct EmbedFailure {
    pub sector: Sector,
    pub provider: String,
    pub reason: String,
    pub timed_out: bool,
}

/// Result of embedding one input across several sectors.
#[derive(Debug, Default)]
pub struct SectorVectors {
    pub vectors: Vec<(Sector, Vec<f32>)>,
    pub failures: Vec<EmbedFailure>,
}

impl SectorVectors {
    pub fn get(&self, sector: Sector) -> Option<&[f32]> {
        self.vectors
            .iter()
            .find(|(s, _)| *s == sector)
            .map(|(_, v)| v.as_slice())
    }
}

/// Multi-sector embedding coordinator.
pub struct Embedder {
    tier: Tier,
    mode: EmbedMode,
    provider: ProviderKind,
    backend: Option<Arc<dyn EmbeddingBackend>>,
    timeout_secs: u64,
}

impl Embedder {
    /// Build an embedder for `tier`/`mode` on top of `provider`.
    ///
    /// An HTTP backend is only constructed when the tier actually routes
    /// some sector to a provider; the `synthetic` provider never needs one
    /// and silently serves SMART/DEEP dims from the hash embedder.
    pub fn new(
        tier: Tier,
        mode: EmbedMode,
        provider: ProviderKind,
        endpoint: Option<&str>,
        model: Option<&str>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let needs_backend = provider != ProviderKind::Synthetic
            && Sector::TIE_BREAK_ORDER.iter().any(|s| !tier.is_synthetic(*s));

        let backend: Option<Arc<dyn EmbeddingBackend>> = if needs_backend {
            Some(Arc::new(HttpBackend::new(
                provider,
                endpoint,
                model,
                api_key,
                std::time::Duration::from_secs(timeout_secs),
            )?))
        } else {
            None
        };

        Ok(Self {
            tier,
            mode,
            provider,
            backend,
            timeout_secs,
        })
    }

    /// Fully synthetic embedder, used by tests and the FAST/HYBRID tiers.
    pub fn synthetic(tier: Tier, mode: EmbedMode) -> Self {
        Self {
            tier,
            mode,
            provider: ProviderKind::Synthetic,
            backend: None,
            timeout_secs: 30,
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Provider name recorded against `sector` in `embed_logs`.
    pub fn provider_for(&self, sector: Sector) -> &'static str {
        if self.tier.is_synthetic(sector) || self.backend.is_none() {
            ProviderKind::Synthetic.as_str()
        } else {
            self.provider.as_str()
        }
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Embed one text for one sector.
    pub async fn embed_one(&self, text: &str, sector: Sector) -> Result<Vec<f32>> {
        let result = self.embed_sectors(text, &[sector]).await?;
        match result.vectors.into_iter().next() {
            Some((_, v)) => Ok(v),
            None => {
                let failure = result.failures.into_iter().next();
                Err(failure_to_error(sector, failure, self.timeout_secs))
            }
        }
    }

    /// Embed one text for several sectors, applying the tier's routing.
    ///
    /// Never fails as a whole: sectors whose provider call errored are
    /// reported in [`SectorVectors::failures`] and simply absent from
    /// `vectors`. Synthetic sectors cannot fail.
    pub async fn embed_sectors(&self, text: &str, sectors: &[Sector]) -> Result<SectorVectors> {
        let mut out = SectorVectors::default();

        let mut provider_sectors: Vec<Sector> = Vec::new();
        for &sector in sectors {
            let dim = self.tier.dim_for(sector);
            if self.tier.is_synthetic(sector) || self.backend.is_none() {
                out.vectors.push((sector, synthetic::embed(text, sector, dim)));
            } else {
                provider_sectors.push(sector);
            }
        }

        if provider_sectors.is_empty() {
            return Ok(out);
        }
        let backend = self.backend.as_ref().expect("backend present");

        match self.mode {
            EmbedMode::Simple => {
                // One call; all provider-backed sectors share the vector.
                let dim = self.tier.dim_for(provider_sectors[0]);
                match backend.embed(&[text.to_string()], dim).await {
                    Ok(mut vectors) if !vectors.is_empty() => {
                        let shared = vectors.remove(0);
                        for sector in provider_sectors {
                            out.vectors.push((sector, shared.clone()));
                        }
                    }
                    Ok(_) => {
                        for sector in provider_sectors {
                            out.failures.push(EmbedFailure {
                                sector,
                                provider: backend.name().to_string(),
                                reason: "empty provider response".into(),
                                timed_out: false,
                            });
                        }
                    }
                    Err(e) => {
                        for sector in provider_sectors {
                            out.failures.push(EmbedFailure {
                                sector,
                                provider: backend.name().to_string(),
                                reason: e.reason.clone(),
                                timed_out: e.timed_out,
                            });
                        }
                    }
                }
            }
            EmbedMode::Advanced => {
                for sector in provider_sectors {
                    let dim = self.tier.dim_for(sector);
                    let conditioned = format!("{}: {}", sector.as_str(), text);
                    match backend.embed(&[conditioned], dim).await {
                        Ok(mut vectors) if !vectors.is_empty() => {
                            out.vectors.push((sector, vectors.remove(0)));
                        }
                        Ok(_) => out.failures.push(EmbedFailure {
                            sector,
                            provider: backend.name().to_string(),
                            reason: "empty provider response".into(),
                            timed_out: false,
                        }),
                        Err(e) => out.failures.push(EmbedFailure {
                            sector,
                            provider: backend.name().to_string(),
                            reason: e.reason,
                            timed_out: e.timed_out,
                        }),
                    }
                }
            }
        }

        Ok(out)
    }
}

/// Convert a recorded failure into the engine error for a sector whose
/// embedding was mandatory.
pub fn failure_to_error(
    sector: Sector,
    failure: Option<EmbedFailure>,
    timeout_secs: u64,
) -> MnemoError {
    match failure {
        Some(f) if f.timed_out => MnemoError::Timeout {
            op: "embed",
            seconds: timeout_secs,
        },
        Some(f) => MnemoError::EmbedFailed {
            sector,
            provider: f.provider,
            reason: f.reason,
        },
        None => MnemoError::EmbedFailed {
            sector,
            provider: "unknown".into(),
            reason: "no vector produced".into(),
        },
    }
}
