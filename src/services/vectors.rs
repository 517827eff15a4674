// src/services/vectors.rs

//! Scholar profile-vector maintenance.
//!
//! A scholar's vector embeds its research areas followed by its publication
//! titles, joined by single spaces. Scholars with neither keep whatever
//! vector they already have.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::embedding::{EmbeddingService, join_non_blank};
use crate::error::{AppError, Result};
use crate::models::{ProfileVector, ResyncStats, ScholarText};
use crate::storage::DirectoryStore;
use crate::utils::cancel::CancelSignal;

/// Combined text a scholar's vector is built from.
pub fn scholar_text(text: &ScholarText) -> String {
    let parts: Vec<String> = text
        .research_areas
        .iter()
        .chain(text.publication_titles.iter())
        .cloned()
        .collect();
    join_non_blank(&parts)
}

/// Progress of one resync batch.
#[derive(Debug)]
enum BatchState {
    Pending(Vec<Uuid>),
    Embedding {
        ids: Vec<Uuid>,
        texts: Vec<String>,
        skipped: usize,
    },
    Persisting {
        vectors: HashMap<Uuid, ProfileVector>,
        skipped: usize,
    },
    Done {
        persisted: usize,
        skipped: usize,
    },
    /// Every scholar of the batch counts as failed.
    Failed { attempted: usize, error: AppError },
}

/// Recomputes and stores scholar vectors.
pub struct VectorMaintenanceService {
    store: Arc<dyn DirectoryStore>,
    embeddings: EmbeddingService,
}

impl VectorMaintenanceService {
    pub fn new(store: Arc<dyn DirectoryStore>, embeddings: EmbeddingService) -> Self {
        Self { store, embeddings }
    }

    /// Re-embed one scholar. `None` when the scholar is unknown or has no
    /// text; the stored vector is then left as it was.
    pub async fn resync(&self, scholar_id: Uuid) -> Result<Option<ProfileVector>> {
        let Some(text) = self.store.load_scholar_texts(&[scholar_id]).await?.pop() else {
            log::warn!("Resync skipped: scholar {scholar_id} not found");
            return Ok(None);
        };

        let combined = scholar_text(&text);
        let Some(vector) = self.embeddings.embed(&combined).await? else {
            log::debug!("Scholar {scholar_id} has no text; vector kept");
            return Ok(None);
        };

        self.store
            .update_scholar_vector(scholar_id, Some(vector.clone()))
            .await?;
        Ok(Some(vector))
    }

    /// Re-embed scholars in batches. `force = false` only touches scholars
    /// without a vector. A failing batch counts all of its scholars as
    /// failed and the run goes on.
    pub async fn resync_all(
        &self,
        batch_size: usize,
        force: bool,
        cancel: &CancelSignal,
    ) -> Result<ResyncStats> {
        let candidates = if force {
            self.store.get_all_scholars().await?
        } else {
            self.store.get_scholars_missing_vector().await?
        };
        let ids: Vec<Uuid> = candidates.into_iter().map(|s| s.id).collect();

        let batch_size = batch_size.max(1);
        let batches = ids.len().div_ceil(batch_size);
        log::info!(
            "Resyncing {} scholar vectors in {batches} batches (force={force})",
            ids.len()
        );

        let mut stats = ResyncStats::default();
        for (n, chunk) in ids.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                log::warn!("Resync cancelled before batch {}/{batches}", n + 1);
                stats.cancelled = true;
                break;
            }

            stats.total_processed += chunk.len();
            match self.run_batch(chunk.to_vec()).await {
                BatchState::Done { persisted, skipped } => {
                    stats.successful += persisted;
                    stats.skipped += skipped;
                    log::debug!("Batch {}/{batches}: {persisted} vectors written", n + 1);
                }
                BatchState::Failed { attempted, error } => {
                    stats.failed += attempted;
                    log::error!("Batch {}/{batches} failed: {error}", n + 1);
                }
                other => log::error!("Batch {}/{batches} ended in {other:?}", n + 1),
            }
        }

        crate::utils::log::summary("Vector resync", &stats.summary_items());
        Ok(stats)
    }

    /// Drive one batch from `Pending` to `Done` or `Failed`.
    async fn run_batch(&self, ids: Vec<Uuid>) -> BatchState {
        let total = ids.len();
        let mut state = BatchState::Pending(ids);
        loop {
            state = match state {
                BatchState::Pending(ids) => match self.build_texts(&ids).await {
                    Ok((ids, texts, skipped)) => BatchState::Embedding {
                        ids,
                        texts,
                        skipped,
                    },
                    Err(error) => BatchState::Failed {
                        attempted: total,
                        error,
                    },
                },
                BatchState::Embedding {
                    ids,
                    texts,
                    skipped,
                } => match self.embeddings.embed_batch(&texts).await {
                    Ok(vectors) => {
                        let mut skipped = skipped;
                        let mut out = HashMap::with_capacity(ids.len());
                        for (id, vector) in ids.into_iter().zip(vectors) {
                            match vector {
                                Some(v) => {
                                    out.insert(id, v);
                                }
                                None => skipped += 1,
                            }
                        }
                        BatchState::Persisting {
                            vectors: out,
                            skipped,
                        }
                    }
                    Err(error) => BatchState::Failed {
                        attempted: total,
                        error,
                    },
                },
                BatchState::Persisting { vectors, skipped } => match self.persist(vectors).await {
                    Ok(persisted) => BatchState::Done { persisted, skipped },
                    Err(error) => BatchState::Failed {
                        attempted: total,
                        error,
                    },
                },
                done @ (BatchState::Done { .. } | BatchState::Failed { .. }) => return done,
            };
        }
    }

    /// Texts for a batch in one fetch. Scholars without text (or gone from
    /// storage) are counted as skipped.
    async fn build_texts(&self, ids: &[Uuid]) -> Result<(Vec<Uuid>, Vec<String>, usize)> {
        let rows = self.store.load_scholar_texts(ids).await?;
        let mut skipped = ids.len() - rows.len();

        let mut kept_ids = Vec::with_capacity(rows.len());
        let mut texts = Vec::with_capacity(rows.len());
        for row in rows {
            let text = scholar_text(&row);
            if text.is_empty() {
                skipped += 1;
            } else {
                kept_ids.push(row.scholar_id);
                texts.push(text);
            }
        }
        Ok((kept_ids, texts, skipped))
    }

    async fn persist(&self, vectors: HashMap<Uuid, ProfileVector>) -> Result<usize> {
        if vectors.is_empty() {
            return Ok(0);
        }
        let written = self.store.bulk_persist_vectors(vectors).await?;
        self.store.flush().await?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::embedding::testing::HashEncoder;
    use crate::models::{
        Department, NewDepartment, NewPublication, NewRecommendation, NewScholar, NewUniversity,
        NewUser, Publication, Recommendation, Scholar, ScholarUpdate, University, User,
    };
    use crate::storage::{LocalStore, Neighbour};

    async fn scholar(store: &LocalStore, name: &str, areas: &[&str]) -> Uuid {
        store
            .create_scholar(NewScholar {
                registry_id: Some(name.to_string()),
                full_name: name.to_string(),
                research_areas: areas.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    /// Local store whose text loads fail for batches containing `broken`.
    struct FailingTexts {
        inner: Arc<LocalStore>,
        broken: Uuid,
    }

    #[async_trait]
    impl DirectoryStore for FailingTexts {
        async fn get_university(&self, id: Uuid) -> Result<Option<University>> {
            self.inner.get_university(id).await
        }
        async fn get_university_by_name(&self, name: &str) -> Result<Option<University>> {
            self.inner.get_university_by_name(name).await
        }
        async fn create_university(&self, new: NewUniversity) -> Result<University> {
            self.inner.create_university(new).await
        }
        async fn get_all_universities(&self) -> Result<Vec<University>> {
            self.inner.get_all_universities().await
        }
        async fn get_department_by_name_and_university(
            &self,
            name: &str,
            university_id: Uuid,
        ) -> Result<Option<Department>> {
            self.inner
                .get_department_by_name_and_university(name, university_id)
                .await
        }
        async fn create_department(&self, new: NewDepartment) -> Result<Department> {
            self.inner.create_department(new).await
        }
        async fn get_all_departments(&self) -> Result<Vec<Department>> {
            self.inner.get_all_departments().await
        }
        async fn get_scholar(&self, id: Uuid) -> Result<Option<Scholar>> {
            self.inner.get_scholar(id).await
        }
        async fn get_scholar_by_external_id(&self, registry_id: &str) -> Result<Option<Scholar>> {
            self.inner.get_scholar_by_external_id(registry_id).await
        }
        async fn create_scholar(&self, new: NewScholar) -> Result<Scholar> {
            self.inner.create_scholar(new).await
        }
        async fn update_scholar(&self, id: Uuid, update: ScholarUpdate) -> Result<Option<Scholar>> {
            self.inner.update_scholar(id, update).await
        }
        async fn get_scholars_missing_vector(&self) -> Result<Vec<Scholar>> {
            self.inner.get_scholars_missing_vector().await
        }
        async fn get_all_scholars(&self) -> Result<Vec<Scholar>> {
            self.inner.get_all_scholars().await
        }
        async fn load_scholar_texts(&self, ids: &[Uuid]) -> Result<Vec<ScholarText>> {
            if ids.contains(&self.broken) {
                return Err(AppError::storage("connection reset"));
            }
            self.inner.load_scholar_texts(ids).await
        }
        async fn update_scholar_vector(&self, id: Uuid, vector: Option<ProfileVector>) -> Result<()> {
            self.inner.update_scholar_vector(id, vector).await
        }
        async fn bulk_persist_vectors(&self, vectors: HashMap<Uuid, ProfileVector>) -> Result<usize> {
            self.inner.bulk_persist_vectors(vectors).await
        }
        async fn nearest_scholars(
            &self,
            query: &ProfileVector,
            limit: usize,
        ) -> Result<Vec<Neighbour>> {
            self.inner.nearest_scholars(query, limit).await
        }
        async fn research_area_counts(&self) -> Result<Vec<(String, usize)>> {
            self.inner.research_area_counts().await
        }
        async fn create_publication(&self, new: NewPublication) -> Result<Publication> {
            self.inner.create_publication(new).await
        }
        async fn create_user(&self, new: NewUser) -> Result<User> {
            self.inner.create_user(new).await
        }
        async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
            self.inner.get_user(id).await
        }
        async fn get_all_users(&self) -> Result<Vec<User>> {
            self.inner.get_all_users().await
        }
        async fn update_user_interests(
            &self,
            id: Uuid,
            interests: Vec<String>,
        ) -> Result<Option<User>> {
            self.inner.update_user_interests(id, interests).await
        }
        async fn update_user_vector(&self, id: Uuid, vector: Option<ProfileVector>) -> Result<()> {
            self.inner.update_user_vector(id, vector).await
        }
        async fn delete_recommendations_by_user(&self, user_id: Uuid) -> Result<usize> {
            self.inner.delete_recommendations_by_user(user_id).await
        }
        async fn upsert_recommendation(&self, new: NewRecommendation) -> Result<Recommendation> {
            self.inner.upsert_recommendation(new).await
        }
        async fn list_recommendations_by_user(
            &self,
            user_id: Uuid,
            include_dismissed: bool,
            skip: usize,
            limit: usize,
        ) -> Result<Vec<Recommendation>> {
            self.inner
                .list_recommendations_by_user(user_id, include_dismissed, skip, limit)
                .await
        }
        async fn get_recommendation(&self, id: Uuid) -> Result<Option<Recommendation>> {
            self.inner.get_recommendation(id).await
        }
        async fn set_recommendation_dismissed(&self, id: Uuid, dismissed: bool) -> Result<()> {
            self.inner.set_recommendation_dismissed(id, dismissed).await
        }
        async fn flush(&self) -> Result<()> {
            self.inner.flush().await
        }
    }

    fn service(store: Arc<LocalStore>, encoder: HashEncoder) -> VectorMaintenanceService {
        VectorMaintenanceService::new(store, EmbeddingService::new(Arc::new(encoder)))
    }

    #[test]
    fn test_scholar_text_areas_then_titles() {
        let text = ScholarText {
            scholar_id: Uuid::new_v4(),
            research_areas: vec!["Robotics".into(), " ".into()],
            publication_titles: vec!["Legged Locomotion".into()],
        };
        assert_eq!(scholar_text(&text), "Robotics Legged Locomotion");
    }

    #[tokio::test]
    async fn test_resync_includes_publication_titles() {
        let store = Arc::new(LocalStore::in_memory());
        let id = scholar(&store, "S1", &["Robotics"]).await;
        store
            .create_publication(NewPublication {
                scholar_id: Some(id),
                title: "Legged Locomotion".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let encoder = HashEncoder::new(16);
        let expected = ProfileVector::new(encoder.vector_for("Robotics Legged Locomotion"));
        let service = service(store.clone(), encoder);

        let vector = service.resync(id).await.unwrap();
        assert_eq!(vector, Some(expected.clone()));
        let stored = store.get_scholar(id).await.unwrap().unwrap();
        assert_eq!(stored.profile_vector, Some(expected));
    }

    #[tokio::test]
    async fn test_resync_without_text_keeps_previous_vector() {
        let store = Arc::new(LocalStore::in_memory());
        let id = scholar(&store, "S1", &[]).await;
        let previous = ProfileVector::new(vec![1.0; 16]);
        store
            .update_scholar_vector(id, Some(previous.clone()))
            .await
            .unwrap();

        let service = service(store.clone(), HashEncoder::new(16));
        assert_eq!(service.resync(id).await.unwrap(), None);

        let stored = store.get_scholar(id).await.unwrap().unwrap();
        assert_eq!(stored.profile_vector, Some(previous));
    }

    #[tokio::test]
    async fn test_resync_unknown_scholar_is_noop() {
        let store = Arc::new(LocalStore::in_memory());
        let service = service(store, HashEncoder::new(16));
        assert_eq!(service.resync(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resync_all_isolates_failed_batch() {
        let store = Arc::new(LocalStore::in_memory());
        // Batches of two, in insertion order: [A, B], [C, D], [E, F].
        let a = scholar(&store, "A", &["Optics"]).await;
        let b = scholar(&store, "B", &["Acoustics"]).await;
        let c = scholar(&store, "C", &["poison"]).await;
        let d = scholar(&store, "D", &[]).await;
        let e = scholar(&store, "E", &["Geology"]).await;
        let f = scholar(&store, "F", &[]).await;

        let service = service(store.clone(), HashEncoder::failing_on(16, "poison"));
        let stats = service
            .resync_all(2, false, &CancelSignal::new())
            .await
            .unwrap();

        assert_eq!(stats.total_processed, 6);
        assert_eq!(stats.successful, 3);
        // D has no text but sits in the failed batch.
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.skipped, 1);
        assert!(!stats.cancelled);

        for (id, has_vector) in [
            (a, true),
            (b, true),
            (c, false),
            (d, false),
            (e, true),
            (f, false),
        ] {
            let s = store.get_scholar(id).await.unwrap().unwrap();
            assert_eq!(s.profile_vector.is_some(), has_vector);
        }
    }

    #[tokio::test]
    async fn test_resync_all_survives_text_load_failure() {
        let inner = Arc::new(LocalStore::in_memory());
        let a = scholar(&inner, "A", &["Optics"]).await;
        let b = scholar(&inner, "B", &["Acoustics"]).await;
        let c = scholar(&inner, "C", &["Geology"]).await;

        let store = Arc::new(FailingTexts {
            inner: inner.clone(),
            broken: b,
        });
        let service =
            VectorMaintenanceService::new(store, EmbeddingService::new(Arc::new(HashEncoder::new(16))));
        let stats = service
            .resync_all(1, false, &CancelSignal::new())
            .await
            .unwrap();

        assert_eq!(stats.total_processed, 3);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 0);

        for (id, has_vector) in [(a, true), (b, false), (c, true)] {
            let s = inner.get_scholar(id).await.unwrap().unwrap();
            assert_eq!(s.profile_vector.is_some(), has_vector);
        }
    }

    #[tokio::test]
    async fn test_resync_all_incremental_skips_vectorised() {
        let store = Arc::new(LocalStore::in_memory());
        let done = scholar(&store, "A", &["Optics"]).await;
        scholar(&store, "B", &["Acoustics"]).await;
        store
            .update_scholar_vector(done, Some(ProfileVector::new(vec![0.5; 16])))
            .await
            .unwrap();

        let service = service(store.clone(), HashEncoder::new(16));
        let stats = service
            .resync_all(10, false, &CancelSignal::new())
            .await
            .unwrap();
        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.successful, 1);

        let forced = service
            .resync_all(10, true, &CancelSignal::new())
            .await
            .unwrap();
        assert_eq!(forced.total_processed, 2);
        assert_eq!(forced.successful, 2);
    }

    #[tokio::test]
    async fn test_resync_all_observes_cancellation() {
        let store = Arc::new(LocalStore::in_memory());
        scholar(&store, "A", &["Optics"]).await;

        let cancel = CancelSignal::new();
        cancel.cancel();
        let service = service(store, HashEncoder::new(16));
        let stats = service.resync_all(1, false, &cancel).await.unwrap();

        assert!(stats.cancelled);
        assert_eq!(stats.total_processed, 0);
    }
}
