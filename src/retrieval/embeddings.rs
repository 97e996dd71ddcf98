//! Query embedding via an OpenAI-compatible `/embeddings` endpoint.
//!
//! Some local runtimes return per-token vectors (2D arrays); those are
//! mean-pooled into one vector per input. Every vector is L2-normalised so
//! cosine similarity reduces to a dot product.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use super::errors::RetrievalError;

const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns text into normalised vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(RetrievalError::EmptyResponse { count: 1 })
    }
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawEmbeddingItem {
    index: usize,
    embedding: serde_json::Value, // number[] or number[][] (per-token)
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<RawEmbeddingItem>,
}

// ─── HttpEmbedder ───────────────────────────────────────────────────────────

/// Embedder backed by an HTTP `/embeddings` endpoint.
pub struct HttpEmbedder {
    http: HttpClient,
    base_url: String,
    model: Option<String>,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: Option<String>,
        api_key: Option<String>,
    ) -> Result<Self, RetrievalError> {
        let http = HttpClient::builder()
            .timeout(EMBEDDING_TIMEOUT)
            .build()
            .map_err(|e| RetrievalError::EmbeddingFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            model,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let mut body = serde_json::json!({ "input": texts });
        if let Some(model) = &self.model {
            body["model"] = serde_json::Value::String(model.clone());
        }

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed {
                reason: format!("embedding request to {url}: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(RetrievalError::HttpError {
                status,
                body: body_text,
            });
        }

        let result: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| RetrievalError::EmbeddingFailed {
                    reason: format!("failed to parse embedding response: {e}"),
                })?;

        if result.data.is_empty() {
            return Err(RetrievalError::EmptyResponse { count: texts.len() });
        }

        // Sort by index to ensure order matches input
        let mut items = result.data;
        items.sort_by_key(|item| item.index);

        items
            .into_iter()
            .map(|item| mean_pool_embedding(&item.embedding).map(l2_normalize))
            .collect()
    }
}

// ─── Vector Helpers ─────────────────────────────────────────────────────────

/// Mean-pool per-token embeddings into a single vector.
///
/// A 1D array is returned as-is.
pub(crate) fn mean_pool_embedding(
    embedding: &serde_json::Value,
) -> Result<Vec<f32>, RetrievalError> {
    match embedding {
        serde_json::Value::Array(arr) if arr.is_empty() => Ok(Vec::new()),

        serde_json::Value::Array(arr) if arr[0].is_number() => Ok(arr
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect()),

        serde_json::Value::Array(arr) if arr[0].is_array() => {
            let tokens: Vec<Vec<f32>> = arr
                .iter()
                .filter_map(|row| {
                    row.as_array().map(|r| {
                        r.iter()
                            .filter_map(|v| v.as_f64().map(|f| f as f32))
                            .collect()
                    })
                })
                .collect();

            let Some(first) = tokens.first() else {
                return Ok(Vec::new());
            };
            let n_dim = first.len();
            let mut result = vec![0.0_f32; n_dim];

            for token in &tokens {
                if token.len() != n_dim {
                    return Err(RetrievalError::DimensionMismatch {
                        expected: n_dim,
                        actual: token.len(),
                    });
                }
                for (d, val) in token.iter().enumerate() {
                    result[d] += val;
                }
            }

            let n_tokens = tokens.len() as f32;
            for val in &mut result {
                *val /= n_tokens;
            }

            Ok(result)
        }

        _ => Err(RetrievalError::EmbeddingFailed {
            reason: "unexpected embedding format (expected number[] or number[][])".to_string(),
        }),
    }
}

/// L2-normalize a vector. Zero vectors are returned unchanged.
pub(crate) fn l2_normalize(vec: Vec<f32>) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vec.into_iter().map(|v| v / norm).collect()
    } else {
        vec
    }
}

/// Cosine similarity between two L2-normalized vectors (= dot product).
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ─── Tests ──────────────────────────────────────────────────────────────────
