//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and its HTTP implementation:
//! - **[`TogetherEmbedder`]**: calls an OpenAI-compatible `POST /embeddings`
//!   endpoint (Together AI by default).
//!
//! Also provides [`cosine_similarity`], used by the in-memory index.
//!
//! # Failure Policy
//!
//! One request per call, no retries. Empty input, transport errors, non-2xx
//! responses, malformed bodies, and vectors of the wrong length all fail.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"WhereIsAI/UAE-Large-V1"`).
    fn model_name(&self) -> &str;

    /// Embeds one non-empty text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedder backed by an OpenAI-compatible embeddings API.
pub struct TogetherEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dims: Option<usize>,
}

impl TogetherEmbedder {
    /// Create a new embedder from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured or the HTTP client
    /// cannot be built.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("TOGETHER_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[async_trait]
impl Embedder for TogetherEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            bail!("cannot embed empty text");
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("embedding API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("embedding API returned invalid JSON")?;
        let vector = parse_embedding_response(&json)?;

        if let Some(dims) = self.dims {
            if vector.len() != dims {
                bail!(
                    "embedding has {} dimensions, expected {}",
                    vector.len(),
                    dims
                );
            }
        }

        tracing::debug!(model = %self.model, dims = vector.len(), "embedded text");
        Ok(vector)
    }
}

/// Extracts `data[0].embedding` from an embeddings API response.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("invalid embedding response: missing data[0].embedding"))?;

    if embedding.is_empty() {
        bail!("invalid embedding response: empty vector");
    }

    embedding
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow::anyhow!("invalid embedding response: non-numeric value"))
        })
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedding_response() {
        let json = serde_json::json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": [0.5, -1.0, 2.0] }],
            "model": "WhereIsAI/UAE-Large-V1"
        });
        assert_eq!(parse_embedding_response(&json).unwrap(), vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn test_parse_embedding_missing_data() {
        let json = serde_json::json!({ "error": "nope" });
        assert!(parse_embedding_response(&json).is_err());
    }

    #[test]
    fn test_parse_embedding_rejects_non_numeric() {
        let json = serde_json::json!({ "data": [{ "embedding": [1.0, "x"] }] });
        assert!(parse_embedding_response(&json).is_err());
    }

    #[test]
    fn test_parse_embedding_rejects_empty() {
        let json = serde_json::json!({ "data": [{ "embedding": [] }] });
        assert!(parse_embedding_response(&json).is_err());
    }

    #[tokio::test]
    async fn test_empty_text_fails_without_request() {
        let config = EmbeddingConfig {
            api_key: Some("k".into()),
            // unroutable; a request would error differently
            base_url: "http://127.0.0.1:9".into(),
            ..EmbeddingConfig::default()
        };
        let embedder = TogetherEmbedder::new(&config).unwrap();
        let err = embedder.embed("   ").await.unwrap_err();
        assert!(err.to_string().contains("empty text"));
    }

    #[test]
    fn test_new_requires_api_key() {
        assert!(TogetherEmbedder::new(&EmbeddingConfig::default()).is_err());
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_different_lengths() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
