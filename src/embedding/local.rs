// src/embedding/local.rs

//! In-process multilingual MiniLM via fastembed.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::TextEncoder;
use crate::error::{AppError, Result};
use crate::models::EmbeddingConfig;

/// `paraphrase-multilingual-MiniLM-L12-v2`, run on the blocking pool.
pub struct LocalEncoder {
    model: Arc<TextEmbedding>,
    name: String,
    dimensions: usize,
    batch_size: usize,
}

impl LocalEncoder {
    /// Load the model, downloading it into the fastembed cache on first use.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        log::info!("Loading local embedding model {}", config.model);
        let options = InitOptions::new(EmbeddingModel::ParaphraseMLMiniLML12V2)
            .with_show_download_progress(false);
        let model = TextEmbedding::try_new(options).map_err(AppError::embedding)?;

        Ok(Self {
            model: Arc::new(model),
            name: config.model.clone(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
        })
    }
}

#[async_trait]
impl TextEncoder for LocalEncoder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let batch_size = self.batch_size;

        tokio::task::spawn_blocking(move || model.embed(texts, Some(batch_size)))
            .await
            .map_err(AppError::embedding)?
            .map_err(AppError::embedding)
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }
}
