//! Embedding providers and vector helpers.
//!
//! [`create_provider`] turns the `[embedding]` config section into a boxed
//! [`EmbeddingProvider`]; [`embed_texts`] does the actual work, dispatching
//! on the configured backend:
//!
//! - `"openai"` — `POST /v1/embeddings` with batching and bounded backoff
//! - `"hash"` — deterministic SHA-256 token-bucket vectors, fully offline
//! - `"disabled"` — every call errors; the default until configured
//!
//! Transient HTTP failures (429, 5xx, network errors) retry with
//! exponential backoff of 1s, 2s, 4s... capped at 32s; any other 4xx
//! fails the call immediately.
//!
//! The vector helpers ([`cosine_similarity`], [`vec_to_blob`],
//! [`blob_to_vec`]) are shared with the index, which persists embeddings
//! as base64-wrapped little-endian `f32` bytes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Identity of an embedding backend: its model name and the vector
/// dimensionality it produces. The embedding call itself lives in
/// [`embed_texts`] as a free async function.
pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
}

/// Embed a batch of texts with the configured backend.
///
/// Every returned vector is checked against the provider's declared
/// dimensionality before it reaches the index.
///
/// # Errors
///
/// - Empty input batch.
/// - `"disabled"` provider: always an error.
/// - `"openai"` provider: missing API key, non-retryable API error, or
///   all retries exhausted.
/// - Any vector whose length differs from [`EmbeddingProvider::dims`].
pub async fn embed_texts(
    client: &reqwest::Client,
    provider: &dyn EmbeddingProvider,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Err(Error::EmptyBatch);
    }

    let embeddings = match config.provider.as_str() {
        "openai" => embed_openai(client, config, texts).await?,
        "hash" => texts
            .iter()
            .map(|t| hash_embed(t, provider.dims()))
            .collect(),
        "disabled" => {
            return Err(Error::Provider {
                provider: "embedding".to_string(),
                reason: "provider is disabled".to_string(),
            })
        }
        other => {
            return Err(Error::Provider {
                provider: "embedding".to_string(),
                reason: format!("unknown provider: {}", other),
            })
        }
    };

    for vec in &embeddings {
        if vec.len() != provider.dims() {
            return Err(Error::DimensionMismatch {
                expected: provider.dims(),
                got: vec.len(),
            });
        }
    }

    Ok(embeddings)
}

/// Embed one query string. Thin wrapper over [`embed_texts`] for the
/// retrieval path.
pub async fn embed_query(
    client: &reqwest::Client,
    provider: &dyn EmbeddingProvider,
    config: &EmbeddingConfig,
    text: &str,
) -> Result<Vec<f32>> {
    let results = embed_texts(client, provider, config, &[text.to_string()]).await?;
    results.into_iter().next().ok_or_else(|| Error::Provider {
        provider: "embedding".to_string(),
        reason: "empty embedding response".to_string(),
    })
}

// ============ Disabled Provider ============

/// Placeholder backend for `embedding.provider = "disabled"`; any attempt
/// to embed through it errors.
pub struct DisabledProvider;

impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
}

// ============ OpenAI Provider ============

/// Backend for the OpenAI embeddings endpoint.
///
/// Needs `embedding.model`, `embedding.dims`, and the `OPENAI_API_KEY`
/// environment variable. `embedding.base_url` redirects the calls, which
/// test harnesses use to point at a local mock server.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| Error::Provider {
            provider: "embedding".to_string(),
            reason: "embedding.model required for OpenAI provider".to_string(),
        })?;
        let dims = config.dims.ok_or_else(|| Error::Provider {
            provider: "embedding".to_string(),
            reason: "embedding.dims required for OpenAI provider".to_string(),
        })?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(Error::Provider {
                provider: "embedding".to_string(),
                reason: "OPENAI_API_KEY environment variable not set".to_string(),
            });
        }

        Ok(Self { model, dims })
    }
}

impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Whether an HTTP status is worth another attempt.
fn retryable(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

/// One embeddings API call per batch, retried on transient failures.
/// Vectors come back in input order.
async fn embed_openai(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| Error::Provider {
        provider: "embedding".to_string(),
        reason: "OPENAI_API_KEY not set".to_string(),
    })?;

    let model = config.model.as_ref().ok_or_else(|| Error::Provider {
        provider: "embedding".to_string(),
        reason: "embedding.model required".to_string(),
    })?;

    let url = format!("{}/v1/embeddings", config.base_url.trim_end_matches('/'));
    let request = EmbeddingRequest {
        model,
        input: texts,
    };

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(attempt, delay_secs = delay.as_secs(), "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        let sent = client
            .post(&url)
            .timeout(Duration::from_secs(config.timeout_secs))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                last_err = Some(Error::Http(e));
                continue;
            }
        };

        let status = response.status();
        if status.is_success() {
            let parsed: EmbeddingResponse = response.json().await?;
            return Ok(parsed.data.into_iter().map(|d| d.embedding).collect());
        }

        let detail = response.text().await.unwrap_or_default();
        let err = Error::Provider {
            provider: "embedding".to_string(),
            reason: format!("HTTP {}: {}", status, detail),
        };
        if retryable(status) {
            last_err = Some(err);
            continue;
        }
        return Err(err);
    }

    Err(last_err.unwrap_or_else(|| Error::Provider {
        provider: "embedding".to_string(),
        reason: "request failed after retries".to_string(),
    }))
}

// ============ Hash Provider ============

/// Deterministic local backend: each lowercased alphanumeric token is
/// SHA-256-hashed into one of `dims` buckets and the bucket counts are
/// L2-normalized. Texts sharing vocabulary land near each other under
/// cosine similarity, which is enough for offline retrieval and tests.
/// Not a semantic model.
pub struct HashProvider {
    dims: usize,
}

impl HashProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let dims = config.dims.ok_or_else(|| Error::Provider {
            provider: "embedding".to_string(),
            reason: "embedding.dims required for hash provider".to_string(),
        })?;
        Ok(Self { dims })
    }
}

impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

/// Hash a text into a normalized bucket-count vector.
pub fn hash_embed(text: &str, dims: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dims];

    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let digest = Sha256::digest(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(prefix) % dims as u64) as usize;
        vec[bucket] += 1.0;
    }

    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in &mut vec {
            *x /= norm;
        }
    }

    vec
}

/// Instantiate the backend named by `embedding.provider`: `"disabled"`,
/// `"openai"`, or `"hash"`.
///
/// ```rust,no_run
/// # use docqa::config::EmbeddingConfig;
/// # use docqa::embedding::create_provider;
/// let config = EmbeddingConfig::default(); // provider = "disabled"
/// let provider = create_provider(&config).unwrap();
/// assert_eq!(provider.model_name(), "disabled");
/// ```
///
/// # Errors
///
/// Unknown provider name, or a backend that cannot initialize (missing
/// config keys or API key).
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        "hash" => Ok(Box::new(HashProvider::new(config)?)),
        other => Err(Error::Provider {
            provider: "embedding".to_string(),
            reason: format!("unknown provider: {}", other),
        }),
    }
}

/// Flatten a float vector to little-endian `f32` bytes, 4 per value.
/// The persisted index wraps these in base64, which keeps vectors
/// compact and bit-exact across a save/load cycle.
///
/// ```rust
/// use docqa::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![0.5f32, -8.25, 100.0];
/// assert_eq!(vec_to_blob(&v).len(), 12);
/// assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`vec_to_blob`]. A trailing partial value is ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `1.0` is identical direction,
/// `0.0` orthogonal, `-1.0` opposite. Mismatched lengths, empty input,
/// and zero vectors all score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut mag_a = 0.0f32;
    let mut mag_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom < f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}
