//! Pipeline entry points for directory operations.
//!
//! - `ScrapeOrchestrator`: universities, departments and scholar rosters
//! - `run_pipeline`: every scrape step followed by an incremental vector resync

#[allow(clippy::module_inception)]
mod pipeline;
pub mod scrape;

pub use pipeline::{PipelineReport, run_pipeline};
pub use scrape::ScrapeOrchestrator;
