// src/models/recommendation.rs

//! Recommendation records and their read-side view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a scholar was recommended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Scholar areas overlapping the user's interests, in scholar order
    pub matching_research_areas: Vec<String>,
    /// Similarity rounded to four decimals
    pub similarity_score: f64,
    pub user_interests_count: usize,
    pub scholar_research_areas_count: usize,
}

/// A persisted (user, scholar) recommendation. Unique per pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub scholar_id: Uuid,
    pub similarity_score: f32,
    pub explanation: Explanation,
    #[serde(default)]
    pub dismissed: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRecommendation {
    pub user_id: Uuid,
    pub scholar_id: Uuid,
    pub similarity_score: f32,
    pub explanation: Explanation,
}

/// A recommendation joined with the scholar's current display fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationView {
    pub rec_id: Uuid,
    pub scholar_id: Uuid,
    pub scholar_name: String,
    pub scholar_title: Option<String>,
    pub scholar_institution: Option<String>,
    pub similarity_score: f32,
    pub explanation: Explanation,
    pub generated_at: DateTime<Utc>,
}

/// Round to four decimal places.
pub fn round4(value: f32) -> f64 {
    (f64::from(value) * 10_000.0).round() / 10_000.0
}
