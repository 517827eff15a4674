// src/embedding/http.rs

//! OpenAI-compatible `/embeddings` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::TextEncoder;
use crate::error::{AppError, Result};
use crate::models::EmbeddingConfig;

const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Exponential delay before retry number `attempt` (1-based), capped.
fn backoff(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    BASE_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Embeds through a remote endpoint, `batch_size` texts per request.
#[derive(Debug)]
pub struct HttpEncoder {
    client: reqwest::Client,
    url: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
    max_retries: u32,
}

impl HttpEncoder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        match config.api_key() {
            Some(key) => {
                let value = HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|e| AppError::config(format!("Invalid API key: {e}")))?;
                headers.insert(AUTHORIZATION, value);
            }
            None => log::debug!(
                "{} not set; calling {} without credentials",
                config.api_key_env,
                config.endpoint
            ),
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        log::info!(
            "HTTP embedding backend: {} ({}, {} dims)",
            config.endpoint,
            config.model,
            config.dimensions
        );

        Ok(Self {
            client,
            url: format!("{}/embeddings", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries.max(1),
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err((retryable, err)) if retryable && attempt < self.max_retries => {
                    let wait = backoff(attempt);
                    log::warn!(
                        "Embedding request failed (attempt {attempt}/{}): {err}; retrying in {wait:?}",
                        self.max_retries
                    );
                    tokio::time::sleep(wait).await;
                }
                Err((_, err)) => return Err(err),
            }
        }
    }

    /// One POST. The flag says whether the failure is worth retrying.
    async fn send(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, (bool, AppError)> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| (true, AppError::from(e)))?;

        let status = response.status();
        if !status.is_success() {
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            let detail = response.text().await.unwrap_or_default();
            return Err((
                retryable,
                AppError::embedding(format!("{} returned {status}: {detail}", self.url)),
            ));
        }

        let mut parsed: EmbeddingResponse =
            response.json().await.map_err(|e| (false, AppError::from(e)))?;
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl TextEncoder for HttpEncoder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let batch = self.request(chunk).await?;
            if batch.len() != chunk.len() {
                return Err(AppError::embedding(format!(
                    "endpoint returned {} vectors for {} texts",
                    batch.len(),
                    chunk.len()
                )));
            }
            vectors.extend(batch);
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }
}
