// src/pipeline/scrape.rs

//! Scrape orchestration: registry pages into the directory store.
//!
//! Each entry point walks its driving list in storage order, isolates
//! per-entity failures into the returned stats and stops at the next entity
//! boundary once cancellation is requested.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Department, NewDepartment, NewScholar, NewUniversity, ScholarUpdate, ScrapeStats,
    ScrapedDepartment, ScrapedScholar, ScrapedUniversity,
};
use crate::services::{RegistrySource, VectorMaintenanceService};
use crate::storage::DirectoryStore;
use crate::utils::cancel::CancelSignal;
use crate::utils::{is_blank, log};

/// How a scraped scholar landed in storage.
enum ScholarWrite {
    Created(Uuid),
    Updated { id: Uuid, areas_changed: bool },
}

/// Drives the registry scrape into a [`DirectoryStore`].
pub struct ScrapeOrchestrator {
    source: Arc<dyn RegistrySource>,
    store: Arc<dyn DirectoryStore>,
    vectors: Option<Arc<VectorMaintenanceService>>,
    cancel: CancelSignal,
}

impl ScrapeOrchestrator {
    pub fn new(source: Arc<dyn RegistrySource>, store: Arc<dyn DirectoryStore>) -> Self {
        Self {
            source,
            store,
            vectors: None,
            cancel: CancelSignal::new(),
        }
    }

    /// Re-embed scholars that are created or whose research areas change.
    pub fn with_vectors(mut self, vectors: Arc<VectorMaintenanceService>) -> Self {
        self.vectors = Some(vectors);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Read the university list once and create the universities not yet
    /// stored (matched by exact name).
    pub async fn scrape_universities(&self) -> Result<ScrapeStats> {
        log::header("Scraping universities");
        let mut stats = ScrapeStats::default();
        if self.cancel.is_cancelled() {
            stats.cancelled = true;
            return Ok(stats);
        }

        let universities = match self.source.universities().await {
            Ok(found) => found,
            Err(e) => {
                stats.record_error("university list", e);
                log::summary("Universities", &stats.summary_items());
                return Ok(stats);
            }
        };
        stats.found = universities.len();
        ::log::info!("Found {} universities on the registry", stats.found);

        for scraped in universities {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            if is_blank(&scraped.name) {
                stats.skipped += 1;
                continue;
            }

            match self.save_university(&scraped).await {
                Ok(true) => stats.saved += 1,
                Ok(false) => stats.skipped += 1,
                Err(e) => stats.record_error(format!("university '{}'", scraped.name), e),
            }
        }

        if let Err(e) = self.store.flush().await {
            stats.record_error("flush after universities", e);
        }
        log::summary("Universities", &stats.summary_items());
        Ok(stats)
    }

    /// Scrape the department list of every stored university that has a
    /// department URL.
    pub async fn scrape_departments(&self) -> Result<ScrapeStats> {
        log::header("Scraping departments");
        let mut stats = ScrapeStats::default();
        if self.cancel.is_cancelled() {
            stats.cancelled = true;
            return Ok(stats);
        }

        let universities = self.store.get_all_universities().await?;
        let total = universities.len();
        if total == 0 {
            ::log::warn!("No universities stored; run the university scrape first");
        }

        for (i, university) in universities.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            let Some(url) = university.website_url.as_deref().filter(|u| !is_blank(u)) else {
                ::log::info!("Skipping {}: no department URL", university.name);
                stats.skipped += 1;
                continue;
            };

            stats.processed += 1;
            log::sub_item(&format!("[{}/{total}] {}", i + 1, university.name));

            let departments = match self.source.departments(url).await {
                Ok(found) => found,
                Err(e) => {
                    stats.record_error(format!("university '{}'", university.name), e);
                    continue;
                }
            };
            stats.found += departments.len();

            for scraped in departments {
                if is_blank(&scraped.name) {
                    stats.skipped += 1;
                    continue;
                }
                match self.save_department(university.id, &scraped).await {
                    Ok(true) => stats.saved += 1,
                    Ok(false) => stats.skipped += 1,
                    Err(e) => stats.record_error(
                        format!("department '{}' of '{}'", scraped.name, university.name),
                        e,
                    ),
                }
            }

            if let Err(e) = self.store.flush().await {
                stats.record_error(format!("flush after '{}'", university.name), e);
            }
        }

        log::summary("Departments", &stats.summary_items());
        Ok(stats)
    }

    /// Scrape the roster of every stored department that has a URL.
    /// Known scholars (by registry ID) are updated in place.
    pub async fn scrape_scholars(&self) -> Result<ScrapeStats> {
        log::header("Scraping scholars");
        let mut stats = ScrapeStats::default();
        if self.cancel.is_cancelled() {
            stats.cancelled = true;
            return Ok(stats);
        }

        let institutions: HashMap<Uuid, String> = self
            .store
            .get_all_universities()
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();
        let departments = self.store.get_all_departments().await?;
        let total = departments.len();
        if total == 0 {
            ::log::warn!("No departments stored; run the department scrape first");
        }

        for (i, department) in departments.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            let Some(url) = department.url.as_deref().filter(|u| !is_blank(u)) else {
                ::log::info!("Skipping {}: no roster URL", department.name);
                stats.skipped += 1;
                continue;
            };

            stats.processed += 1;
            let institution = institutions
                .get(&department.university_id)
                .map(String::as_str)
                .unwrap_or_default();
            log::sub_item(&format!(
                "[{}/{total}] {institution} / {}",
                i + 1,
                department.name
            ));

            let scholars = match self.source.scholars(url, institution).await {
                Ok(found) => found,
                Err(e) => {
                    stats.record_error(format!("department '{}'", department.name), e);
                    continue;
                }
            };
            stats.found += scholars.len();

            for scraped in scholars {
                if is_blank(&scraped.registry_id) {
                    ::log::warn!(
                        "Skipping '{}' in {}: no registry ID",
                        scraped.full_name,
                        department.name
                    );
                    stats.skipped += 1;
                    continue;
                }
                self.handle_scholar(&department, &scraped, &mut stats).await;
            }

            if let Err(e) = self.store.flush().await {
                stats.record_error(format!("flush after '{}'", department.name), e);
            }
        }

        log::summary("Scholars", &stats.summary_items());
        Ok(stats)
    }

    async fn handle_scholar(
        &self,
        department: &Department,
        scraped: &ScrapedScholar,
        stats: &mut ScrapeStats,
    ) {
        let (id, resync) = match self.save_scholar(department, scraped).await {
            Ok(ScholarWrite::Created(id)) => {
                stats.saved += 1;
                (id, true)
            }
            Ok(ScholarWrite::Updated { id, areas_changed }) => {
                stats.updated += 1;
                (id, areas_changed)
            }
            Err(e) => {
                stats.record_error(format!("scholar {}", scraped.registry_id), e);
                return;
            }
        };

        if let (true, Some(vectors)) = (resync, &self.vectors) {
            if let Err(e) = vectors.resync(id).await {
                stats.record_error(format!("vector sync for {}", scraped.registry_id), e);
            }
        }
    }

    /// True when a new row was created.
    async fn save_university(&self, scraped: &ScrapedUniversity) -> Result<bool> {
        let name = scraped.name.trim();
        if self.store.get_university_by_name(name).await?.is_some() {
            return Ok(false);
        }
        self.store
            .create_university(NewUniversity {
                name: name.to_string(),
                location: non_empty(&scraped.location),
                classification: non_empty(&scraped.classification),
                founded_year: (scraped.founded_year != 0).then_some(scraped.founded_year),
                website_url: non_empty(&scraped.department_url),
            })
            .await?;
        Ok(true)
    }

    async fn save_department(&self, university_id: Uuid, scraped: &ScrapedDepartment) -> Result<bool> {
        let name = scraped.name.trim();
        if self
            .store
            .get_department_by_name_and_university(name, university_id)
            .await?
            .is_some()
        {
            return Ok(false);
        }
        self.store
            .create_department(NewDepartment {
                university_id,
                name: name.to_string(),
                url: non_empty(&scraped.url),
            })
            .await?;
        Ok(true)
    }

    async fn save_scholar(
        &self,
        department: &Department,
        scraped: &ScrapedScholar,
    ) -> Result<ScholarWrite> {
        let registry_id = scraped.registry_id.trim();

        if let Some(existing) = self.store.get_scholar_by_external_id(registry_id).await? {
            let areas_changed = existing.research_areas != scraped.research_areas;
            let update = ScholarUpdate {
                full_name: non_empty(&scraped.full_name),
                title: non_empty(&scraped.title),
                department_id: Some(department.id),
                institution: non_empty(&scraped.institution),
                department: non_empty(&scraped.department_label),
                email: non_empty(&scraped.email),
                profile_url: non_empty(&scraped.profile_url),
                research_areas: Some(scraped.research_areas.clone()),
                ..Default::default()
            };
            self.store.update_scholar(existing.id, update).await?;
            return Ok(ScholarWrite::Updated {
                id: existing.id,
                areas_changed,
            });
        }

        let created = self
            .store
            .create_scholar(NewScholar {
                registry_id: Some(registry_id.to_string()),
                full_name: scraped.full_name.clone(),
                title: non_empty(&scraped.title),
                department_id: Some(department.id),
                institution: non_empty(&scraped.institution),
                department: non_empty(&scraped.department_label),
                email: non_empty(&scraped.email),
                profile_url: non_empty(&scraped.profile_url),
                research_areas: scraped.research_areas.clone(),
            })
            .await?;
        Ok(ScholarWrite::Created(created.id))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeSource, department, scholar, university};
    use super::*;
    use crate::embedding::EmbeddingService;
    use crate::embedding::testing::HashEncoder;
    use crate::models::NewUniversity;
    use crate::storage::LocalStore;

    fn orchestrator(source: FakeSource, store: Arc<LocalStore>) -> ScrapeOrchestrator {
        ScrapeOrchestrator::new(Arc::new(source), store)
    }

    #[tokio::test]
    async fn test_university_scrape_is_idempotent() {
        let store = Arc::new(LocalStore::in_memory());
        let source = FakeSource {
            universities: vec![
                university("ODTÜ", "https://r/u?id=1"),
                university("İTÜ", "https://r/u?id=2"),
                university("  ", "https://r/u?id=3"),
            ],
            ..Default::default()
        };
        let orch = orchestrator(source, store.clone());

        let first = orch.scrape_universities().await.unwrap();
        assert_eq!((first.found, first.saved, first.skipped), (3, 2, 1));

        let second = orch.scrape_universities().await.unwrap();
        assert_eq!((second.saved, second.skipped), (0, 3));
        assert!(second.errors.is_empty());

        let stored = store.get_all_universities().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].founded_year, Some(1956));
        assert_eq!(stored[0].website_url.as_deref(), Some("https://r/u?id=1"));
    }

    #[tokio::test]
    async fn test_university_list_failure_is_recorded() {
        let store = Arc::new(LocalStore::in_memory());
        let source = FakeSource {
            list_unavailable: true,
            ..Default::default()
        };

        let stats = orchestrator(source, store.clone())
            .scrape_universities()
            .await
            .unwrap();
        assert_eq!((stats.found, stats.saved), (0, 0));
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].starts_with("university list"));
        assert!(store.get_all_universities().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_department_failures_are_isolated() {
        let store = Arc::new(LocalStore::in_memory());
        for (name, url) in [("A", Some("https://r/a")), ("B", Some("https://r/b")), ("C", None)] {
            store
                .create_university(NewUniversity {
                    name: name.into(),
                    website_url: url.map(String::from),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let mut source = FakeSource::default();
        source.failing.insert("https://r/a".into());
        source.departments.insert(
            "https://r/b".into(),
            vec![
                department("Fizik", "https://r/d?birim=1"),
                department("Kimya", "https://r/d?birim=2"),
            ],
        );
        let orch = orchestrator(source, store.clone());

        let stats = orch.scrape_departments().await.unwrap();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.saved, 2);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].contains("'A'"));

        let again = orch.scrape_departments().await.unwrap();
        assert_eq!((again.saved, again.skipped), (0, 3));
        assert_eq!(store.get_all_departments().await.unwrap().len(), 2);
    }

    async fn store_with_department(url: &str) -> (Arc<LocalStore>, Department) {
        let store = Arc::new(LocalStore::in_memory());
        let uni = store
            .create_university(NewUniversity {
                name: "ODTÜ".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let dept = store
            .create_department(NewDepartment {
                university_id: uni.id,
                name: "Fizik".into(),
                url: Some(url.into()),
            })
            .await
            .unwrap();
        (store, dept)
    }

    #[tokio::test]
    async fn test_scholars_created_then_updated() {
        let url = "https://r/roster?birim=1";
        let (store, dept) = store_with_department(url).await;

        let source = Arc::new(FakeSource::default());
        source.scholars.lock().unwrap().insert(
            url.into(),
            vec![scholar("A1", &["Optics"]), scholar(" ", &["Ghost"])],
        );
        let vectors = Arc::new(VectorMaintenanceService::new(
            store.clone(),
            EmbeddingService::new(Arc::new(HashEncoder::new(16))),
        ));
        let orch = ScrapeOrchestrator::new(source.clone(), store.clone()).with_vectors(vectors);

        let first = orch.scrape_scholars().await.unwrap();
        assert_eq!((first.found, first.saved, first.skipped), (2, 1, 1));

        let created = store.get_scholar_by_external_id("A1").await.unwrap().unwrap();
        assert_eq!(created.institution.as_deref(), Some("ODTÜ"));
        assert_eq!(created.department_id, Some(dept.id));
        assert_eq!(created.department.as_deref(), Some("FEN FAKÜLTESİ / FİZİK BÖLÜMÜ"));
        assert!(created.profile_vector.is_some());
        let first_vector = created.profile_vector.clone();

        source
            .scholars
            .lock()
            .unwrap()
            .insert(url.into(), vec![scholar("A1", &["Optics", "Lasers"])]);
        let second = orch.scrape_scholars().await.unwrap();
        assert_eq!((second.saved, second.updated), (0, 1));

        let updated = store.get_scholar(created.id).await.unwrap().unwrap();
        assert_eq!(updated.research_areas, vec!["Optics", "Lasers"]);
        assert_ne!(updated.profile_vector, first_vector);
        assert_eq!(store.get_all_scholars().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scholar_moved_to_other_department() {
        let physics_url = "https://r/roster?birim=1";
        let chemistry_url = "https://r/roster?birim=2";
        let (store, physics) = store_with_department(physics_url).await;
        let chemistry = store
            .create_department(NewDepartment {
                university_id: physics.university_id,
                name: "Kimya".into(),
                url: Some(chemistry_url.into()),
            })
            .await
            .unwrap();

        let source = Arc::new(FakeSource::default());
        source
            .scholars
            .lock()
            .unwrap()
            .insert(physics_url.into(), vec![scholar("A1", &["Optics"])]);
        let orch = ScrapeOrchestrator::new(source.clone(), store.clone());
        orch.scrape_scholars().await.unwrap();

        let mut moved = scholar("A1", &["Optics"]);
        moved.full_name = "Ayşe Kaya".into();
        moved.title = "PROFESÖR".into();
        moved.department = "KİMYA BÖLÜMÜ".into();
        moved.department_label = "FEN FAKÜLTESİ / KİMYA BÖLÜMÜ".into();
        {
            let mut rosters = source.scholars.lock().unwrap();
            rosters.insert(physics_url.into(), Vec::new());
            rosters.insert(chemistry_url.into(), vec![moved]);
        }
        let stats = orch.scrape_scholars().await.unwrap();
        assert_eq!((stats.saved, stats.updated), (0, 1));

        let stored = store.get_scholar_by_external_id("A1").await.unwrap().unwrap();
        assert_eq!(stored.department_id, Some(chemistry.id));
        assert_eq!(stored.department.as_deref(), Some("FEN FAKÜLTESİ / KİMYA BÖLÜMÜ"));
        assert_eq!(stored.full_name, "Ayşe Kaya");
        assert_eq!(stored.title.as_deref(), Some("PROFESÖR"));
    }

    #[tokio::test]
    async fn test_cancelled_scrape_stops_at_boundary() {
        let url = "https://r/roster?birim=1";
        let (store, _) = store_with_department(url).await;
        let source = FakeSource::default();
        source
            .scholars
            .lock()
            .unwrap()
            .insert(url.into(), vec![scholar("A1", &[])]);

        let cancel = CancelSignal::new();
        let orch = orchestrator(source, store.clone()).with_cancel(cancel.clone());
        cancel.cancel();

        let stats = orch.scrape_scholars().await.unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.processed, 0);
        assert!(store.get_all_scholars().await.unwrap().is_empty());
    }
}
