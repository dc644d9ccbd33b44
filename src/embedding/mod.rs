//! Question and passage embedding
//!
//! Supports two backends behind one trait:
//! - OpenAI-compatible HTTP endpoint - requires the `remote-embed` feature
//! - Local feature-hashing embedder (no external dependencies)
//!
//! Remote calls are blocking from the pipeline's perspective and are wrapped
//! with a request timeout and a bounded exponential-backoff retry. A call
//! that exhausts its retries surfaces as `SibylError::Embedding`, which the
//! scanner degrades through the lexical-fallback path.

mod hashed;

pub use hashed::HashedEmbedder;

use crate::error::Result;

#[cfg(feature = "remote-embed")]
use crate::error::SibylError;
#[cfg(feature = "remote-embed")]
use std::time::Duration;

/// Trait for embedding generators
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Backend model name
    fn model_name(&self) -> &str;
}

/// Cosine similarity between two vectors
///
/// Returns 0.0 for mismatched or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Retry schedule for remote embedding calls
///
/// Exponential backoff with a small fixed attempt cap; external model calls
/// are the most likely source of transient failure.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Ceiling on any single delay, in milliseconds
    pub max_delay_ms: u64,
    /// Per-request timeout, in milliseconds
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 2_000,
            timeout_ms: 5_000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-indexed, attempt 0 has none)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return 0;
        }
        let delay = self.base_delay_ms.saturating_mul(1u64 << (attempt - 1).min(16));
        delay.min(self.max_delay_ms)
    }
}

/// OpenAI-compatible remote embedding client
///
/// Requires the `remote-embed` feature.
#[cfg(feature = "remote-embed")]
pub struct RemoteEmbedder {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    retry: RetryConfig,
}

#[cfg(feature = "remote-embed")]
impl RemoteEmbedder {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_config(api_key, None, None, None, RetryConfig::default())
    }

    pub fn with_config(
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
        dimensions: Option<usize>,
        retry: RetryConfig,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(retry.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "text-embedding-3-small".to_string()),
            dimensions: dimensions.unwrap_or(1536),
            retry,
        })
    }

    fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "input": text,
                "model": self.model,
            }))
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(SibylError::Embedding(format!(
                "Embedding API error {}: {}",
                status, body
            )));
        }

        let data: serde_json::Value = response.json()?;
        let embedding: Vec<f32> = data["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| SibylError::Embedding("Invalid response format".to_string()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        if embedding.len() != self.dimensions {
            return Err(SibylError::Embedding(format!(
                "Embedding dimensions mismatch: expected {}, got {}",
                self.dimensions,
                embedding.len()
            )));
        }

        Ok(embedding)
    }
}

#[cfg(feature = "remote-embed")]
impl Embedder for RemoteEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut last_err = None;
        for attempt in 0..self.retry.max_attempts {
            let delay = self.retry.delay_for_attempt(attempt);
            if delay > 0 {
                std::thread::sleep(Duration::from_millis(delay));
            }
            match self.request_embedding(text) {
                Ok(embedding) => return Ok(embedding),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(attempt, error = %e, "embedding request failed, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| SibylError::Embedding("retry attempts exhausted".to_string())))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
