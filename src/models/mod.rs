// src/models/mod.rs

//! Domain models for the directory pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod directory;
mod recommendation;
mod scraped;
pub mod selectors;
mod stats;
mod vector;

// Re-export all public types
pub use config::{
    CacheConfig, Config, EmbeddingBackend, EmbeddingConfig, LoggingConfig, RecommendationConfig,
    ScraperConfig, VectorConfig,
};
pub use directory::{
    Department, NewDepartment, NewPublication, NewScholar, NewUniversity, NewUser, Publication,
    Scholar, ScholarText, ScholarUpdate, University, User,
};
pub use recommendation::{Explanation, NewRecommendation, Recommendation, RecommendationView, round4};
pub use scraped::{ScrapedDepartment, ScrapedScholar, ScrapedUniversity};
pub use selectors::RegistrySelectors;
pub use stats::{ResyncStats, ScrapeStats, UserRefreshStats};
pub use vector::{ProfileVector, VECTOR_DIMENSIONS, cosine_similarity};
