//! Vector index query interface.
//!
//! The ingestion job (out of scope here) embeds source documents and exports
//! them as JSON lines, one `{text, source, embedding}` object per chunk.
//! [`MemoryIndex`] loads that export and answers similarity queries by cosine
//! similarity against the embedded query.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::embeddings::{cosine_similarity, l2_normalize, Embedder};
use super::errors::RetrievalError;

/// One retrieved chunk. `rank` is 1-based, best match first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub text: String,
    pub source: String,
    pub rank: usize,
}

/// Similarity search over pre-embedded documents.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `top_k` documents ordered by descending similarity.
    async fn similarity_search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError>;
}

/// A chunk as exported by the ingestion job.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexedChunk {
    pub text: String,
    #[serde(default)]
    pub source: String,
    pub embedding: Vec<f32>,
}

// ─── MemoryIndex ────────────────────────────────────────────────────────────

/// In-memory cosine-similarity index.
pub struct MemoryIndex {
    embedder: Arc<dyn Embedder>,
    chunks: Vec<IndexedChunk>,
    dimension: usize,
}

impl MemoryIndex {
    /// Build from chunks; embeddings are normalised and must share a dimension.
    pub fn from_chunks(
        embedder: Arc<dyn Embedder>,
        chunks: Vec<IndexedChunk>,
    ) -> Result<Self, RetrievalError> {
        let dimension = chunks.first().map(|c| c.embedding.len()).unwrap_or(0);
        let mut normalized = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.embedding.len() != dimension {
                return Err(RetrievalError::DimensionMismatch {
                    expected: dimension,
                    actual: chunk.embedding.len(),
                });
            }
            normalized.push(IndexedChunk {
                embedding: l2_normalize(chunk.embedding),
                ..chunk
            });
        }
        Ok(Self {
            embedder,
            chunks: normalized,
            dimension,
        })
    }

    /// Load a JSON-lines export. Blank lines are skipped.
    pub fn load_jsonl(embedder: Arc<dyn Embedder>, path: &Path) -> Result<Self, RetrievalError> {
        let load_err = |reason: String| RetrievalError::IndexLoad {
            path: path.display().to_string(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let mut chunks = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let chunk: IndexedChunk = serde_json::from_str(line)
                .map_err(|e| load_err(format!("line {}: {e}", line_no + 1)))?;
            chunks.push(chunk);
        }

        let index = Self::from_chunks(embedder, chunks)?;
        tracing::info!(
            path = %path.display(),
            chunks = index.len(),
            dimension = index.dimension,
            "vector index loaded"
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn similarity_search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        if self.chunks.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_emb = l2_normalize(self.embedder.embed_query(query).await?);
        if query_emb.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: query_emb.len(),
            });
        }

        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .chunks
            .iter()
            .map(|chunk| (cosine_similarity(&query_emb, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, (_, chunk))| RetrievedDocument {
                text: chunk.text.clone(),
                source: chunk.source.clone(),
                rank: i + 1,
            })
            .collect())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
