// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::RegistrySelectors;

/// Upper bound for `embedding.max_retries`.
pub const MAX_EMBEDDING_RETRIES: u32 = 10;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Browser and registry navigation settings
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Candidate CSS selectors for registry pages
    #[serde(default)]
    pub selectors: RegistrySelectors,

    /// Text-embedding backend settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Profile-vector maintenance settings
    #[serde(default)]
    pub vectors: VectorConfig,

    /// Recommendation settings
    #[serde(default)]
    pub recommendations: RecommendationConfig,

    /// Research-area catalog cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.scraper.user_agent.trim().is_empty() {
            return Err(AppError::validation("scraper.user_agent is empty"));
        }
        url::Url::parse(&self.scraper.base_url)
            .map_err(|e| AppError::validation(format!("scraper.base_url: {e}")))?;
        url::Url::parse(&self.scraper.university_list_url)
            .map_err(|e| AppError::validation(format!("scraper.university_list_url: {e}")))?;
        if self.scraper.navigation_retries == 0 {
            return Err(AppError::validation(
                "scraper.navigation_retries must be > 0",
            ));
        }
        if self.scraper.navigation_timeout_ms == 0 {
            return Err(AppError::validation(
                "scraper.navigation_timeout_ms must be > 0",
            ));
        }
        if self.scraper.request_delay_secs < 0.0 {
            return Err(AppError::validation(
                "scraper.request_delay_secs must be >= 0",
            ));
        }
        if self.scraper.max_pages == 0 {
            return Err(AppError::validation("scraper.max_pages must be > 0"));
        }
        self.selectors.validate()?;
        if self.embedding.dimensions == 0 {
            return Err(AppError::validation("embedding.dimensions must be > 0"));
        }
        if self.embedding.batch_size == 0 {
            return Err(AppError::validation("embedding.batch_size must be > 0"));
        }
        if self.embedding.max_retries > MAX_EMBEDDING_RETRIES {
            return Err(AppError::validation(format!(
                "embedding.max_retries must be <= {MAX_EMBEDDING_RETRIES}"
            )));
        }
        if self.vectors.batch_size == 0 {
            return Err(AppError::validation("vectors.batch_size must be > 0"));
        }
        if self.recommendations.top_k == 0 {
            return Err(AppError::validation("recommendations.top_k must be > 0"));
        }
        if self.recommendations.max_interests == 0 {
            return Err(AppError::validation(
                "recommendations.max_interests must be > 0",
            ));
        }
        Ok(())
    }
}

/// Browser session and registry navigation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Registry origin used to absolutize relative links
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Page listing every university
    #[serde(default = "defaults::university_list_url")]
    pub university_list_url: String,

    /// User-Agent of the shared browsing context
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Run the browser without a window
    #[serde(default = "defaults::headless")]
    pub headless: bool,

    /// Per-attempt navigation timeout in milliseconds
    #[serde(default = "defaults::navigation_timeout")]
    pub navigation_timeout_ms: u64,

    /// Navigation attempts before giving up
    #[serde(default = "defaults::navigation_retries")]
    pub navigation_retries: u32,

    /// Fixed pause between navigation attempts in milliseconds
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Base delay between page loads, jittered by ±0.5s
    #[serde(default = "defaults::request_delay")]
    pub request_delay_secs: f64,

    /// How long to wait for the scholar table to render
    #[serde(default = "defaults::table_wait_timeout")]
    pub table_wait_timeout_ms: u64,

    /// Upper bound on roster pages followed per department
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,
}

impl ScraperConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn table_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.table_wait_timeout_ms)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            university_list_url: defaults::university_list_url(),
            user_agent: defaults::user_agent(),
            headless: defaults::headless(),
            navigation_timeout_ms: defaults::navigation_timeout(),
            navigation_retries: defaults::navigation_retries(),
            retry_backoff_ms: defaults::retry_backoff(),
            request_delay_secs: defaults::request_delay(),
            table_wait_timeout_ms: defaults::table_wait_timeout(),
            max_pages: defaults::max_pages(),
        }
    }
}

/// Which encoder produces profile vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// OpenAI-compatible `/embeddings` endpoint
    #[default]
    Http,
    /// In-process model (requires the `local-model` feature)
    Local,
}

/// Text-embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    /// Base URL of the embedding endpoint (without `/embeddings`)
    #[serde(default = "defaults::embedding_endpoint")]
    pub endpoint: String,

    /// Model identifier sent to the endpoint
    #[serde(default = "defaults::embedding_model")]
    pub model: String,

    /// Environment variable holding the API key, if the endpoint needs one
    #[serde(default = "defaults::api_key_env")]
    pub api_key_env: String,

    /// Vector length every encoder must produce
    #[serde(default = "defaults::dimensions")]
    pub dimensions: usize,

    /// Texts per model call
    #[serde(default = "defaults::embedding_batch_size")]
    pub batch_size: usize,

    /// HTTP timeout in seconds
    #[serde(default = "defaults::embedding_timeout")]
    pub timeout_secs: u64,

    /// Attempts per HTTP request
    #[serde(default = "defaults::embedding_retries")]
    pub max_retries: u32,
}

impl EmbeddingConfig {
    /// API key read from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            endpoint: defaults::embedding_endpoint(),
            model: defaults::embedding_model(),
            api_key_env: defaults::api_key_env(),
            dimensions: defaults::dimensions(),
            batch_size: defaults::embedding_batch_size(),
            timeout_secs: defaults::embedding_timeout(),
            max_retries: defaults::embedding_retries(),
        }
    }
}

/// Profile-vector maintenance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Scholars per resync batch
    #[serde(default = "defaults::resync_batch_size")]
    pub batch_size: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::resync_batch_size(),
        }
    }
}

/// Recommendation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Scholars kept per recalculation
    #[serde(default = "defaults::top_k")]
    pub top_k: usize,

    /// Maximum research interests per user
    #[serde(default = "defaults::max_interests")]
    pub max_interests: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            top_k: defaults::top_k(),
            max_interests: defaults::max_interests(),
        }
    }
}

/// Research-area catalog cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "defaults::cache_ttl")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::cache_ttl(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Scraper defaults
    pub fn base_url() -> String {
        "https://akademik.yok.gov.tr".into()
    }
    pub fn university_list_url() -> String {
        "https://akademik.yok.gov.tr/AkademikArama/view/universityListview.jsp".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
            .into()
    }
    pub fn headless() -> bool {
        true
    }
    pub fn navigation_timeout() -> u64 {
        30_000
    }
    pub fn navigation_retries() -> u32 {
        3
    }
    pub fn retry_backoff() -> u64 {
        2_000
    }
    pub fn request_delay() -> f64 {
        2.0
    }
    pub fn table_wait_timeout() -> u64 {
        10_000
    }
    pub fn max_pages() -> usize {
        500
    }

    // Embedding defaults
    pub fn embedding_endpoint() -> String {
        "http://localhost:8080/v1".into()
    }
    pub fn embedding_model() -> String {
        "paraphrase-multilingual-MiniLM-L12-v2".into()
    }
    pub fn api_key_env() -> String {
        "EMBEDDING_API_KEY".into()
    }
    pub fn dimensions() -> usize {
        384
    }
    pub fn embedding_batch_size() -> usize {
        32
    }
    pub fn embedding_timeout() -> u64 {
        60
    }
    pub fn embedding_retries() -> u32 {
        3
    }

    // Vector / recommendation defaults
    pub fn resync_batch_size() -> usize {
        32
    }
    pub fn top_k() -> usize {
        20
    }
    pub fn max_interests() -> usize {
        15
    }

    pub fn cache_ttl() -> u64 {
        3600
    }
    pub fn log_level() -> String {
        "info".into()
    }
}
