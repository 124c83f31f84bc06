//! Vector index abstraction for ticket embeddings.
//!
//! The [`TicketIndex`] trait covers the two operations the pipeline needs:
//! insert-or-overwrite by identifier, and top-k nearest-neighbour queries.
//!
//! | Backend | Type | Use |
//! |---------|------|-----|
//! | `pinecone` | [`PineconeIndex`] | Hosted index over the Pinecone data-plane REST API |
//! | `memory` | [`InMemoryIndex`] | Brute-force cosine search, for development and tests |
//!
//! Whatever the backend returns, [`rank_matches`] enforces the result
//! contract: at most `top_k` entries in non-increasing score order, ranked
//! from 1.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::IndexConfig;
use crate::embedding::cosine_similarity;
use crate::models::{SimilarTicketMatch, TicketMetadata, TicketVector};

const PINECONE_API_VERSION: &str = "2024-07";

/// Storage and similarity search over ticket vectors.
///
/// Implementations must tolerate concurrent calls from independent requests.
#[async_trait]
pub trait TicketIndex: Send + Sync {
    /// Writes each vector under its `id`, replacing any existing entry.
    async fn upsert(&self, vectors: &[TicketVector]) -> Result<()>;

    /// Returns up to `top_k` entries nearest to `vector`, best first.
    ///
    /// An empty index yields an empty list.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SimilarTicketMatch>>;
}

/// An unranked hit as reported by a backend.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub id: String,
    pub score: f32,
    pub metadata: TicketMetadata,
}

/// Sorts hits by descending score, keeps the first `top_k`, and ranks them.
///
/// The sort is stable, so ties keep the backend's order. NaN scores sort
/// last.
pub fn rank_matches(mut entries: Vec<ScoredEntry>, top_k: usize) -> Vec<SimilarTicketMatch> {
    entries.sort_by(|a, b| sort_key(b.score).total_cmp(&sort_key(a.score)));
    entries.truncate(top_k);
    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| SimilarTicketMatch {
            id: e.id,
            score: e.score,
            rank: i + 1,
            metadata: e.metadata,
        })
        .collect()
}

fn sort_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Create the [`TicketIndex`] selected by `index.backend`.
pub fn create_index(config: &IndexConfig) -> Result<Arc<dyn TicketIndex>> {
    match config.backend.as_str() {
        "pinecone" => Ok(Arc::new(PineconeIndex::new(config)?)),
        "memory" => Ok(Arc::new(InMemoryIndex::new())),
        other => bail!("Unknown index backend: {}", other),
    }
}

// ============ Pinecone ============

/// Index client for a single Pinecone index host.
pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    api_key: String,
    namespace: String,
}

impl PineconeIndex {
    /// Create a client for the configured index host.
    ///
    /// A host given without a scheme is reached over `https://`.
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("INDEX_HOST must be set for the pinecone index backend"))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("PINECONE_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            host: normalize_host(host),
            api_key,
            namespace: config.namespace.clone(),
        })
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.host, path);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Pinecone API error {}: {}", status, body_text);
        }
        Ok(response)
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

#[async_trait]
impl TicketIndex for PineconeIndex {
    async fn upsert(&self, vectors: &[TicketVector]) -> Result<()> {
        if vectors.is_empty() {
            return Ok(());
        }

        let records: Vec<serde_json::Value> = vectors
            .iter()
            .map(|v| {
                serde_json::json!({
                    "id": v.id,
                    "values": v.values,
                    "metadata": v.metadata,
                })
            })
            .collect();

        let body = serde_json::json!({
            "vectors": records,
            "namespace": self.namespace,
        });

        self.post("/vectors/upsert", &body).await?;
        tracing::debug!(count = vectors.len(), "upserted vectors to pinecone");
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SimilarTicketMatch>> {
        let body = serde_json::json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
            "namespace": self.namespace,
        });

        let response: QueryResponse = self
            .post("/query", &body)
            .await?
            .json()
            .await
            .context("Pinecone returned an invalid query response")?;

        let entries = response
            .matches
            .into_iter()
            .map(|m| ScoredEntry {
                id: m.id,
                score: m.score,
                metadata: m
                    .metadata
                    .as_ref()
                    .map(TicketMetadata::from_stored)
                    .unwrap_or_default(),
            })
            .collect();

        Ok(rank_matches(entries, top_k))
    }
}

// ============ In-memory ============

struct StoredVector {
    values: Vec<f32>,
    metadata: TicketMetadata,
}

/// In-memory index for development and tests.
///
/// Entries live in a map keyed by identifier, so an upsert with an existing
/// id replaces the previous entry. Queries are brute-force cosine similarity.
pub struct InMemoryIndex {
    entries: RwLock<BTreeMap<String, StoredVector>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored metadata for `id`, if present.
    pub fn get(&self, id: &str) -> Option<TicketMetadata> {
        self.entries
            .read()
            .ok()
            .and_then(|e| e.get(id).map(|s| s.metadata.clone()))
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketIndex for InMemoryIndex {
    async fn upsert(&self, vectors: &[TicketVector]) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory index lock poisoned"))?;
        for v in vectors {
            entries.insert(
                v.id.clone(),
                StoredVector {
                    values: v.values.clone(),
                    metadata: v.metadata.clone(),
                },
            );
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SimilarTicketMatch>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory index lock poisoned"))?;
        let scored = entries
            .iter()
            .map(|(id, stored)| ScoredEntry {
                id: id.clone(),
                score: cosine_similarity(vector, &stored.values),
                metadata: stored.metadata.clone(),
            })
            .collect();
        Ok(rank_matches(scored, top_k))
    }
}
