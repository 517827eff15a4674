// src/embedding/mod.rs

//! Embedding service.
//!
//! Wraps a [`TextEncoder`] backend:
//! - `HttpEncoder`: OpenAI-compatible `/embeddings` endpoint
//! - `LocalEncoder`: in-process multilingual MiniLM (feature `local-model`)
//!
//! Blank texts never reach the model; they map to `None`.

mod http;
#[cfg(feature = "local-model")]
mod local;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{EmbeddingBackend, EmbeddingConfig, ProfileVector};
use crate::utils::is_blank;

pub use http::HttpEncoder;
#[cfg(feature = "local-model")]
pub use local::LocalEncoder;

/// A text-embedding model.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Encode texts, one vector per input, in input order.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn model_name(&self) -> &str;

    /// Length of every vector this model returns.
    fn dimension(&self) -> usize;
}

/// Build the encoder selected by configuration.
pub fn build_encoder(config: &EmbeddingConfig) -> Result<Arc<dyn TextEncoder>> {
    match config.backend {
        EmbeddingBackend::Http => Ok(Arc::new(HttpEncoder::new(config)?)),
        #[cfg(feature = "local-model")]
        EmbeddingBackend::Local => Ok(Arc::new(LocalEncoder::new(config)?)),
        #[cfg(not(feature = "local-model"))]
        EmbeddingBackend::Local => Err(AppError::config(
            "embedding.backend = \"local\" requires the `local-model` feature",
        )),
    }
}

/// Single and batched embedding with blank handling.
#[derive(Clone)]
pub struct EmbeddingService {
    encoder: Arc<dyn TextEncoder>,
}

impl EmbeddingService {
    pub fn new(encoder: Arc<dyn TextEncoder>) -> Self {
        Self { encoder }
    }

    pub fn model_name(&self) -> &str {
        self.encoder.model_name()
    }

    pub fn dimension(&self) -> usize {
        self.encoder.dimension()
    }

    /// Embed one text. `None` for blank input.
    pub async fn embed(&self, text: &str) -> Result<Option<ProfileVector>> {
        if is_blank(text) {
            return Ok(None);
        }
        let mut vectors = self.encode_checked(&[text.to_string()]).await?;
        Ok(vectors.pop())
    }

    /// Embed many texts in one model call. Output has the input's length
    /// and order; blank entries are `None` and are not sent to the model.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<ProfileVector>>> {
        let mut results: Vec<Option<ProfileVector>> = vec![None; texts.len()];

        let (indices, valid): (Vec<usize>, Vec<String>) = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !is_blank(text))
            .map(|(i, text)| (i, text.clone()))
            .unzip();

        if valid.is_empty() {
            return Ok(results);
        }

        let vectors = self.encode_checked(&valid).await?;
        for (idx, vector) in indices.into_iter().zip(vectors) {
            results[idx] = Some(vector);
        }
        Ok(results)
    }

    /// Join the non-blank strings with single spaces and embed the result.
    pub async fn embed_from_list(&self, texts: &[String]) -> Result<Option<ProfileVector>> {
        self.embed(&join_non_blank(texts)).await
    }

    async fn encode_checked(&self, texts: &[String]) -> Result<Vec<ProfileVector>> {
        let vectors = self.encoder.encode(texts).await?;
        if vectors.len() != texts.len() {
            return Err(AppError::embedding(format!(
                "model returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        let expected = self.encoder.dimension();
        vectors
            .into_iter()
            .map(|v| {
                if v.len() == expected {
                    Ok(ProfileVector::new(v))
                } else {
                    Err(AppError::embedding(format!(
                        "expected {expected} dimensions, got {}",
                        v.len()
                    )))
                }
            })
            .collect()
    }
}

/// Non-blank strings joined by single spaces, in input order.
pub fn join_non_blank(texts: &[String]) -> String {
    texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cosine similarity of two vectors; see [`crate::models::cosine_similarity`].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    crate::models::cosine_similarity(a, b)
}

/// Scholar areas that overlap a user interest: either lower-cased string
/// contains the other. Ordered by first occurrence in `scholar_areas`,
/// without duplicates.
pub fn find_matching_terms(interests: &[String], scholar_areas: &[String]) -> Vec<String> {
    let interests: Vec<String> = interests
        .iter()
        .map(|i| i.trim().to_lowercase())
        .filter(|i| !i.is_empty())
        .collect();

    let mut matches: Vec<String> = Vec::new();
    for area in scholar_areas {
        let area_lower = area.trim().to_lowercase();
        if area_lower.is_empty() || matches.contains(area) {
            continue;
        }
        let hit = interests
            .iter()
            .any(|i| area_lower.contains(i.as_str()) || i.contains(area_lower.as_str()));
        if hit {
            matches.push(area.clone());
        }
    }
    matches
}
