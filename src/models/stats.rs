// src/models/stats.rs

//! Run summaries returned by the batch jobs.

use serde::Serialize;

/// Summary of one scrape entry point.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScrapeStats {
    /// Units visited (universities or departments); 0 for the university list
    pub processed: usize,
    /// Records extracted from pages
    pub found: usize,
    /// Records newly created
    pub saved: usize,
    /// Records updated in place
    pub updated: usize,
    /// Records or units skipped (already present, missing key, no URL)
    pub skipped: usize,
    /// Per-entity failures, one line each
    pub errors: Vec<String>,
    /// Stopped early by a cancellation request
    pub cancelled: bool,
}

impl ScrapeStats {
    pub fn record_error(&mut self, context: impl std::fmt::Display, err: impl std::fmt::Display) {
        let line = format!("{context}: {err}");
        log::error!("{line}");
        self.errors.push(line);
    }

    /// Key/value pairs for `utils::log::summary`.
    pub fn summary_items(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Processed", self.processed.to_string()),
            ("Found", self.found.to_string()),
            ("Saved", self.saved.to_string()),
            ("Updated", self.updated.to_string()),
            ("Skipped", self.skipped.to_string()),
            ("Errors", self.errors.len().to_string()),
            ("Cancelled", self.cancelled.to_string()),
        ]
    }
}

/// Summary of a vector resync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResyncStats {
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

impl ResyncStats {
    pub fn summary_items(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Total", self.total_processed.to_string()),
            ("Successful", self.successful.to_string()),
            ("Failed", self.failed.to_string()),
            ("Skipped", self.skipped.to_string()),
            ("Cancelled", self.cancelled.to_string()),
        ]
    }
}

/// Summary of a user vector and recommendation refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserRefreshStats {
    pub total_users: usize,
    pub processed: usize,
    pub regenerated_vectors: usize,
    pub recalculated_recommendations: usize,
    pub skipped_no_interests: usize,
    pub errors: Vec<String>,
}

impl UserRefreshStats {
    pub fn summary_items(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Users", self.total_users.to_string()),
            ("Processed", self.processed.to_string()),
            ("Vectors regenerated", self.regenerated_vectors.to_string()),
            (
                "Recommendations recalculated",
                self.recalculated_recommendations.to_string(),
            ),
            ("Skipped (no interests)", self.skipped_no_interests.to_string()),
            ("Errors", self.errors.len().to_string()),
        ]
    }
}
