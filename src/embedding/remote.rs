//! HTTP embedding providers.
//!
//! One [`HttpBackend`] speaks three wire dialects: OpenAI-compatible
//! `/v1/embeddings` (openai, local, aws-gateway), Gemini
//! `:batchEmbedContents`, and Ollama `/api/embeddings`. Responses are
//! fitted to the tier's dimension and L2-normalized so every stored
//! vector within one `(tier, sector)` has an identical dim.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ProviderKind;
use crate::memory::{fit_to_dim, l2_normalize};

/// Failure from a provider call, kept separate from the engine error so
/// the coordinator can attach the sector it was embedding for.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub reason: String,
    pub timed_out: bool,
}

impl ProviderError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        Self {
            timed_out: e.is_timeout(),
            reason: e.to_string(),
        }
    }
}

/// Capability seam for external embedding services.
///
/// Implementations return one vector per input, already unit-length and
/// fitted to `dim` entries.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, inputs: &[String], dim: usize) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Provider name as recorded in `embed_logs`.
    fn name(&self) -> &'static str;
}

/// reqwest-based backend for all HTTP provider kinds.
pub struct HttpBackend {
    client: reqwest::Client,
    kind: ProviderKind,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpBackend {
    /// Build a backend for `kind`. `endpoint` is required for `ollama`
    /// and `aws` (gateway), optional elsewhere.
    pub fn new(
        kind: ProviderKind,
        endpoint: Option<&str>,
        model: Option<&str>,
        api_key: Option<String>,
        timeout: std::time::Duration,
    ) -> crate::error::Result<Self> {
        let endpoint = match (endpoint, default_endpoint(kind)) {
            (Some(e), _) => normalize_base_url(e),
            (None, Some(d)) => d.to_string(),
            (None, None) => {
                return Err(crate::error::MnemoError::Config(format!(
                    "provider_endpoint is required for provider '{kind}'"
                )))
            }
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::error::MnemoError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            kind,
            endpoint,
            model: model
                .map(str::to_string)
                .unwrap_or_else(|| default_model(kind).to_string()),
            api_key,
        })
    }

    async fn embed_openai(
        &self,
        inputs: &[String],
        dim: usize,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let req = OpenAiRequest {
            model: self.model.clone(),
            input: inputs.to_vec(),
        };

        let mut builder = self.client.post(openai_embeddings_url(&self.endpoint));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp: OpenAiResponse = builder
            .json(&req)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?
            .error_for_status()
            .map_err(ProviderError::from_reqwest)?
            .json()
            .await
            .map_err(ProviderError::from_reqwest)?;

        if resp.data.len() != inputs.len() {
            return Err(ProviderError {
                reason: format!(
                    "provider returned {} embeddings for {} inputs",
                    resp.data.len(),
                    inputs.len()
                ),
                timed_out: false,
            });
        }

        Ok(resp
            .data
            .into_iter()
            .map(|d| fit_vector(d.embedding, dim))
            .collect())
    }

    async fn embed_gemini(
        &self,
        inputs: &[String],
        dim: usize,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.endpoint, self.model
        );
        let req = GeminiBatchRequest {
            requests: inputs
                .iter()
                .map(|text| GeminiEmbedRequest {
                    model: format!("models/{}", self.model),
                    content: GeminiContent {
                        parts: vec![GeminiPart { text: text.clone() }],
                    },
                })
                .collect(),
        };

        let mut builder = self.client.post(&url);
        if let Some(key) = &self.api_key {
            builder = builder.query(&[("key", key.as_str())]);
        }

        let resp: GeminiBatchResponse = builder
            .json(&req)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?
            .error_for_status()
            .map_err(ProviderError::from_reqwest)?
            .json()
            .await
            .map_err(ProviderError::from_reqwest)?;

        if resp.embeddings.len() != inputs.len() {
            return Err(ProviderError {
                reason: format!(
                    "provider returned {} embeddings for {} inputs",
                    resp.embeddings.len(),
                    inputs.len()
                ),
                timed_out: false,
            });
        }

        Ok(resp
            .embeddings
            .into_iter()
            .map(|e| fit_vector(e.values, dim))
            .collect())
    }

    async fn embed_ollama(
        &self,
        inputs: &[String],
        dim: usize,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        // Ollama embeds one prompt per request.
        let url = format!("{}/api/embeddings", self.endpoint);
        let mut out = Vec::with_capacity(inputs.len());
        for text in inputs {
            let req = OllamaRequest {
                model: self.model.clone(),
                prompt: text.clone(),
            };
            let resp: OllamaResponse = self
                .client
                .post(&url)
                .json(&req)
                .send()
                .await
                .map_err(ProviderError::from_reqwest)?
                .error_for_status()
                .map_err(ProviderError::from_reqwest)?
                .json()
                .await
                .map_err(ProviderError::from_reqwest)?;
            out.push(fit_vector(resp.embedding, dim));
        }
        Ok(out)
    }
}

#[async_trait]
impl EmbeddingBackend for HttpBackend {
    async fn embed(&self, inputs: &[String], dim: usize) -> Result<Vec<Vec<f32>>, ProviderError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        match self.kind {
            ProviderKind::OpenAi | ProviderKind::Local | ProviderKind::Aws => {
                self.embed_openai(inputs, dim).await
            }
            ProviderKind::Gemini => self.embed_gemini(inputs, dim).await,
            ProviderKind::Ollama => self.embed_ollama(inputs, dim).await,
            ProviderKind::Synthetic => Err(ProviderError {
                reason: "synthetic provider has no HTTP backend".into(),
                timed_out: false,
            }),
        }
    }

    fn name(&self) -> &'static str {
        self.kind.as_str()
    }
}

/// Fit a provider vector to `dim` entries and re-normalize, so all
/// vectors within one `(tier, sector)` share a dimension.
fn fit_vector(v: Vec<f32>, dim: usize) -> Vec<f32> {
    let mut out = fit_to_dim(&v, dim);
    l2_normalize(&mut out);
    out
}

fn default_endpoint(kind: ProviderKind) -> Option<&'static str> {
    match kind {
        ProviderKind::OpenAi => Some("https://api.openai.com"),
        ProviderKind::Gemini => Some("https://generativelanguage.googleapis.com"),
        ProviderKind::Local => Some("http://127.0.0.1:8080"),
        // Ollama installs vary; an aws gateway is deployment-specific.
        ProviderKind::Ollama | ProviderKind::Aws => None,
        ProviderKind::Synthetic => None,
    }
}

fn default_model(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi | ProviderKind::Aws | ProviderKind::Local => "text-embedding-3-small",
        ProviderKind::Gemini => "text-embedding-004",
        ProviderKind::Ollama => "nomic-embed-text",
        ProviderKind::Synthetic => "synthetic",
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn has_version_suffix(base_url: &str) -> bool {
    let Some(last_segment) = base_url.rsplit('/').next() else {
        return false;
    };
    let Some(rest) = last_segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

/// Resolve the embeddings URL from a base that may or may not already
/// carry a version segment or the full path.
fn openai_embeddings_url(base_url: &str) -> String {
    let normalized = normalize_base_url(base_url);
    if normalized.ends_with("/embeddings") {
        return normalized;
    }
    if has_version_suffix(&normalized) {
        return format!("{normalized}/embeddings");
    }
    format!("{normalized}/v1/embeddings")
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GeminiBatchRequest {
    requests: Vec<GeminiEmbedRequest>,
}

#[derive(Serialize)]
struct GeminiEmbedRequest {
    model: String,
    content: GeminiContent,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiBatchResponse {
    embeddings: Vec<GeminiValues>,
}

#[derive(Deserialize)]
struct GeminiValues {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_from_host_base_uses_v1_embeddings() {
        assert_eq!(
            openai_embeddings_url("https://api.openai.com"),
            "https://api.openai.com/v1/embeddings"
        );
    }

    #[test]
    fn endpoint_from_v1_base_appends_embeddings_once() {
        assert_eq!(
            openai_embeddings_url("https://llm.internal/v1"),
            "https://llm.internal/v1/embeddings"
        );
    }

    #[test]
    fn endpoint_preserves_explicit_embeddings_url() {
        assert_eq!(
            openai_embeddings_url("https://api.example.com/v1/embeddings"),
            "https://api.example.com/v1/embeddings"
        );
    }

    #[test]
    fn ollama_requires_endpoint() {
        let result = HttpBackend::new(
            ProviderKind::Ollama,
            None,
            None,
            None,
            std::time::Duration::from_secs(30),
        );
        assert!(matches!(
            result,
            Err(crate::error::MnemoError::Config(_))
        ));
    }

    #[test]
    fn fit_vector_pads_and_normalizes() {
        let out = fit_vector(vec![3.0, 4.0], 4);
        assert_eq!(out.len(), 4);
        let norm: f32 = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert_eq!(out[2], 0.0);
    }
}
