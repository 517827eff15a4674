// src/pipeline/pipeline.rs

use serde::Serialize;

use crate::error::Result;
use crate::models::{ResyncStats, ScrapeStats};
use crate::services::VectorMaintenanceService;
use crate::utils::log;

use super::scrape::ScrapeOrchestrator;

/// Stats of every step that ran.
#[derive(Debug, Default, Serialize)]
pub struct PipelineReport {
    pub universities: Option<ScrapeStats>,
    pub departments: Option<ScrapeStats>,
    pub scholars: Option<ScrapeStats>,
    pub vectors: Option<ResyncStats>,
    pub cancelled: bool,
}

/// Run the full pipeline: universities, departments, scholars, then an
/// incremental vector resync when a vector service is given.
pub async fn run_pipeline(
    orchestrator: &ScrapeOrchestrator,
    vectors: Option<&VectorMaintenanceService>,
    batch_size: usize,
) -> Result<PipelineReport> {
    log::header("Directory pipeline starting");

    let total_steps = if vectors.is_some() { 4 } else { 3 };
    let cancel = orchestrator.cancel_signal().clone();
    let mut report = PipelineReport::default();

    log::step(1, total_steps, "Universities - Reading the registry list");
    let stats = orchestrator.scrape_universities().await?;
    report.cancelled = stats.cancelled;
    report.universities = Some(stats);
    if report.cancelled {
        return Ok(stopped(report));
    }

    log::step(2, total_steps, "Departments - Visiting university pages");
    let stats = orchestrator.scrape_departments().await?;
    report.cancelled = stats.cancelled;
    report.departments = Some(stats);
    if report.cancelled {
        return Ok(stopped(report));
    }

    log::step(3, total_steps, "Scholars - Walking department rosters");
    let stats = orchestrator.scrape_scholars().await?;
    report.cancelled = stats.cancelled;
    report.scholars = Some(stats);
    if report.cancelled {
        return Ok(stopped(report));
    }

    if let Some(vectors) = vectors {
        log::step(4, total_steps, "Vectors - Embedding scholars without a vector");
        let stats = vectors.resync_all(batch_size, false, &cancel).await?;
        report.cancelled = stats.cancelled;
        report.vectors = Some(stats);
    }

    log::separator();
    ::log::info!("Pipeline complete");
    Ok(report)
}

fn stopped(report: PipelineReport) -> PipelineReport {
    ::log::warn!("Pipeline cancelled; remaining steps skipped");
    report
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::embedding::EmbeddingService;
    use crate::embedding::testing::HashEncoder;
    use crate::pipeline::scrape::testing::{FakeSource, department, scholar, university};
    use crate::storage::{DirectoryStore, LocalStore};

    #[tokio::test]
    async fn test_full_pipeline_fills_store() {
        let source = FakeSource {
            universities: vec![university("ODTÜ", "https://r/u?id=1")],
            departments: [(
                "https://r/u?id=1".to_string(),
                vec![department("Fizik", "https://r/d?birim=1")],
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        source.scholars.lock().unwrap().insert(
            "https://r/d?birim=1".into(),
            vec![scholar("A1", &["Optics"]), scholar("A2", &[])],
        );

        let store = Arc::new(LocalStore::in_memory());
        let orchestrator = ScrapeOrchestrator::new(Arc::new(source), store.clone());
        let vectors = VectorMaintenanceService::new(
            store.clone(),
            EmbeddingService::new(Arc::new(HashEncoder::new(16))),
        );

        let report = run_pipeline(&orchestrator, Some(&vectors), 8).await.unwrap();

        assert!(!report.cancelled);
        assert_eq!(report.universities.map(|s| s.saved), Some(1));
        assert_eq!(report.departments.map(|s| s.saved), Some(1));
        assert_eq!(report.scholars.map(|s| s.saved), Some(2));
        let resync = report.vectors.unwrap();
        assert_eq!((resync.successful, resync.skipped), (1, 1));

        let scholars = store.get_all_scholars().await.unwrap();
        assert_eq!(scholars.iter().filter(|s| s.profile_vector.is_some()).count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_pipeline_stops_after_first_step() {
        let store = Arc::new(LocalStore::in_memory());
        let orchestrator = ScrapeOrchestrator::new(Arc::new(FakeSource::default()), store);
        orchestrator.cancel_signal().cancel();

        let report = run_pipeline(&orchestrator, None, 8).await.unwrap();
        assert!(report.cancelled);
        assert!(report.departments.is_none());
    }
}
