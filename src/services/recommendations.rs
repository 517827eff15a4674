// src/services/recommendations.rs

//! Scholar recommendations by profile-vector similarity.
//!
//! A recalculation replaces the user's whole recommendation set: the old
//! rows (dismissed ones included) are deleted and the current nearest
//! scholars are written back.

use std::sync::Arc;

use uuid::Uuid;

use crate::embedding::{EmbeddingService, find_matching_terms};
use crate::error::{AppError, Result};
use crate::models::{
    Explanation, NewRecommendation, RecommendationView, UserRefreshStats, round4,
};
use crate::storage::DirectoryStore;
use crate::utils::cancel::CancelSignal;

/// What a recalculation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecalcOutcome {
    UserNotFound,
    /// User has no interests; their recommendations and vector were cleared
    Cleared { removed: usize },
    /// Interests produced no vector; nothing changed
    NoVector,
    Generated { count: usize },
}

pub struct RecommendationEngine {
    store: Arc<dyn DirectoryStore>,
    embeddings: EmbeddingService,
    top_k: usize,
}

impl RecommendationEngine {
    pub fn new(store: Arc<dyn DirectoryStore>, embeddings: EmbeddingService, top_k: usize) -> Self {
        Self {
            store,
            embeddings,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Rebuild a user's recommendations from the `top_k` nearest scholars.
    pub async fn recalculate(&self, user_id: Uuid, top_k: usize) -> Result<RecalcOutcome> {
        let Some(user) = self.store.get_user(user_id).await? else {
            log::warn!("Recalculation skipped: user {user_id} not found");
            return Ok(RecalcOutcome::UserNotFound);
        };

        let interests = user.research_interests;
        if interests.is_empty() {
            let removed = self.store.delete_recommendations_by_user(user_id).await?;
            self.store.update_user_vector(user_id, None).await?;
            self.store.flush().await?;
            return Ok(RecalcOutcome::Cleared { removed });
        }

        let vector = match user.profile_vector {
            Some(v) => v,
            None => match self.embeddings.embed_from_list(&interests).await? {
                Some(v) => {
                    self.store.update_user_vector(user_id, Some(v.clone())).await?;
                    v
                }
                None => return Ok(RecalcOutcome::NoVector),
            },
        };

        self.store.delete_recommendations_by_user(user_id).await?;

        let mut count = 0;
        for hit in self.store.nearest_scholars(&vector, top_k).await? {
            let similarity = 1.0 - hit.distance;
            if similarity <= 0.0 {
                continue;
            }
            let Some(scholar) = self.store.get_scholar(hit.scholar_id).await? else {
                continue;
            };

            let explanation = Explanation {
                matching_research_areas: find_matching_terms(&interests, &scholar.research_areas),
                similarity_score: round4(similarity),
                user_interests_count: interests.len(),
                scholar_research_areas_count: scholar.research_areas.len(),
            };
            self.store
                .upsert_recommendation(NewRecommendation {
                    user_id,
                    scholar_id: scholar.id,
                    similarity_score: similarity,
                    explanation,
                })
                .await?;
            count += 1;
        }

        self.store.flush().await?;
        log::debug!("User {user_id}: {count} recommendations");
        Ok(RecalcOutcome::Generated { count })
    }

    /// Active recommendations, most similar first, with live scholar fields.
    pub async fn get_recommendations(
        &self,
        user_id: Uuid,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<RecommendationView>> {
        let rows = self
            .store
            .list_recommendations_by_user(user_id, false, skip, limit)
            .await?;

        let mut views = Vec::with_capacity(rows.len());
        for rec in rows {
            let Some(scholar) = self.store.get_scholar(rec.scholar_id).await? else {
                continue;
            };
            views.push(RecommendationView {
                rec_id: rec.id,
                scholar_id: rec.scholar_id,
                scholar_name: scholar.full_name,
                scholar_title: scholar.title,
                scholar_institution: scholar.institution,
                similarity_score: rec.similarity_score,
                explanation: rec.explanation,
                generated_at: rec.generated_at,
            });
        }
        Ok(views)
    }

    /// Hide a recommendation. Only its owner may; `false` otherwise or when
    /// it does not exist.
    pub async fn dismiss(&self, rec_id: Uuid, user_id: Uuid) -> Result<bool> {
        match self.store.get_recommendation(rec_id).await? {
            Some(rec) if rec.user_id == user_id => {
                self.store.set_recommendation_dismissed(rec_id, true).await?;
                self.store.flush().await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Re-embed every user's vector from their interests and recalculate
    /// their recommendations. Failures are recorded per user.
    pub async fn refresh_all_users(&self, cancel: &CancelSignal) -> Result<UserRefreshStats> {
        let users = self.store.get_all_users().await?;
        let mut stats = UserRefreshStats {
            total_users: users.len(),
            ..Default::default()
        };

        for user in users {
            if cancel.is_cancelled() {
                log::warn!(
                    "User refresh cancelled after {}/{} users",
                    stats.processed,
                    stats.total_users
                );
                break;
            }

            if user.research_interests.is_empty() {
                stats.skipped_no_interests += 1;
                stats.processed += 1;
                continue;
            }

            match self.refresh_user(user.id, &user.research_interests).await {
                Ok(recalculated) => {
                    stats.regenerated_vectors += 1;
                    if recalculated {
                        stats.recalculated_recommendations += 1;
                    }
                }
                Err(e) => {
                    let line = format!("user {}: {e}", user.id);
                    log::error!("{line}");
                    stats.errors.push(line);
                }
            }
            stats.processed += 1;

            if stats.processed % 10 == 0 {
                log::info!("Processed {}/{} users", stats.processed, stats.total_users);
            }
        }

        crate::utils::log::summary("User refresh", &stats.summary_items());
        Ok(stats)
    }

    async fn refresh_user(&self, user_id: Uuid, interests: &[String]) -> Result<bool> {
        let vector = self
            .embeddings
            .embed_from_list(interests)
            .await?
            .ok_or_else(|| AppError::embedding("interests produced no vector"))?;
        self.store.update_user_vector(user_id, Some(vector)).await?;

        let outcome = self.recalculate(user_id, self.top_k).await?;
        Ok(matches!(outcome, RecalcOutcome::Generated { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::HashEncoder;
    use crate::models::{NewScholar, NewUser, ProfileVector, cosine_similarity};
    use crate::storage::LocalStore;

    const DIMS: usize = 64;

    struct Fixture {
        store: Arc<LocalStore>,
        engine: RecommendationEngine,
        encoder: Arc<HashEncoder>,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(LocalStore::in_memory());
            let encoder = Arc::new(HashEncoder::new(DIMS));
            let engine = RecommendationEngine::new(
                store.clone(),
                EmbeddingService::new(encoder.clone()),
                20,
            );
            Self {
                store,
                engine,
                encoder,
            }
        }

        async fn scholar(&self, id: &str, areas: &[&str]) -> Uuid {
            let areas: Vec<String> = areas.iter().map(|a| a.to_string()).collect();
            let scholar = self
                .store
                .create_scholar(NewScholar {
                    registry_id: Some(id.into()),
                    full_name: format!("Scholar {id}"),
                    title: Some("PROFESÖR".into()),
                    institution: Some("ODTÜ".into()),
                    research_areas: areas.clone(),
                    ..Default::default()
                })
                .await
                .unwrap();
            let vector = ProfileVector::new(self.encoder.vector_for(&areas.join(" ")));
            self.store
                .update_scholar_vector(scholar.id, Some(vector))
                .await
                .unwrap();
            scholar.id
        }

        async fn user(&self, email: &str, interests: &[&str]) -> Uuid {
            self.store
                .create_user(NewUser {
                    email: email.into(),
                    full_name: None,
                    research_interests: interests.iter().map(|i| i.to_string()).collect(),
                })
                .await
                .unwrap()
                .id
        }

        /// Scholars the bag-of-words encoder scores above zero for `query`.
        fn expected_matches(&self, query: &str, scholars: &[(Uuid, &str)]) -> Vec<Uuid> {
            let q = self.encoder.vector_for(query);
            let mut ids: Vec<Uuid> = scholars
                .iter()
                .filter(|(_, text)| cosine_similarity(&q, &self.encoder.vector_for(text)) > 0.0)
                .map(|(id, _)| *id)
                .collect();
            ids.sort();
            ids
        }
    }

    async fn scored(fx: &Fixture, user: Uuid) -> Vec<(Uuid, f32)> {
        let mut rows: Vec<(Uuid, f32)> = fx
            .store
            .list_recommendations_by_user(user, true, 0, 100)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.scholar_id, r.similarity_score))
            .collect();
        rows.sort_by_key(|(id, _)| *id);
        rows
    }

    #[tokio::test]
    async fn test_recalculate_is_deterministic_and_replaces() {
        let fx = Fixture::new().await;
        let robotics = fx.scholar("R", &["Robotics", "Control"]).await;
        let optics = fx.scholar("O", &["Optics"]).await;
        let mixed = fx.scholar("M", &["Robotics", "Optics"]).await;
        let user = fx.user("u@x.org", &["Robotics"]).await;

        let outcome = fx.engine.recalculate(user, 20).await.unwrap();
        let first = scored(&fx, user).await;
        assert_eq!(outcome, RecalcOutcome::Generated { count: first.len() });

        let texts = [
            (robotics, "Robotics Control"),
            (optics, "Optics"),
            (mixed, "Robotics Optics"),
        ];
        let ids: Vec<Uuid> = first.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, fx.expected_matches("Robotics", &texts));
        assert!(ids.contains(&robotics) && ids.contains(&mixed));

        fx.engine.recalculate(user, 20).await.unwrap();
        assert_eq!(scored(&fx, user).await, first);

        // New interests with a cleared vector replace the whole set.
        fx.store
            .update_user_interests(user, vec!["Optics".into()])
            .await
            .unwrap();
        fx.store.update_user_vector(user, None).await.unwrap();
        fx.engine.recalculate(user, 20).await.unwrap();

        let replaced: Vec<Uuid> = scored(&fx, user).await.into_iter().map(|(id, _)| id).collect();
        assert_eq!(replaced, fx.expected_matches("Optics", &texts));
        assert!(replaced.contains(&optics));
    }

    #[tokio::test]
    async fn test_no_interests_clears_everything() {
        let fx = Fixture::new().await;
        fx.scholar("R", &["Robotics"]).await;
        let user = fx.user("u@x.org", &["Robotics"]).await;
        fx.engine.recalculate(user, 20).await.unwrap();
        assert!(!scored(&fx, user).await.is_empty());

        fx.store.update_user_interests(user, vec![]).await.unwrap();
        let outcome = fx.engine.recalculate(user, 20).await.unwrap();

        assert!(matches!(outcome, RecalcOutcome::Cleared { removed } if removed > 0));
        assert!(scored(&fx, user).await.is_empty());
        let stored = fx.store.get_user(user).await.unwrap().unwrap();
        assert_eq!(stored.profile_vector, None);
    }

    #[tokio::test]
    async fn test_explanation_and_view() {
        let fx = Fixture::new().await;
        let id = fx.scholar("R", &["Robotics", "Control", "Robotics Education"]).await;
        let user = fx.user("u@x.org", &["robotics"]).await;
        fx.engine.recalculate(user, 20).await.unwrap();

        let views = fx.engine.get_recommendations(user, 0, 10).await.unwrap();
        assert_eq!(views.len(), 1);
        let view = &views[0];
        assert_eq!(view.scholar_id, id);
        assert_eq!(view.scholar_name, "Scholar R");
        assert_eq!(view.scholar_institution.as_deref(), Some("ODTÜ"));
        assert_eq!(
            view.explanation.matching_research_areas,
            vec!["Robotics".to_string(), "Robotics Education".to_string()]
        );
        assert_eq!(view.explanation.user_interests_count, 1);
        assert_eq!(view.explanation.scholar_research_areas_count, 3);
        assert_eq!(
            view.explanation.similarity_score,
            round4(view.similarity_score)
        );
    }

    #[tokio::test]
    async fn test_dismiss_requires_owner() {
        let fx = Fixture::new().await;
        fx.scholar("R", &["Robotics"]).await;
        let owner = fx.user("a@x.org", &["Robotics"]).await;
        let other = fx.user("b@x.org", &["Robotics"]).await;
        fx.engine.recalculate(owner, 20).await.unwrap();

        let rec = fx.engine.get_recommendations(owner, 0, 10).await.unwrap()[0].rec_id;

        assert!(!fx.engine.dismiss(rec, other).await.unwrap());
        assert!(!fx.engine.dismiss(Uuid::new_v4(), owner).await.unwrap());
        assert_eq!(fx.engine.get_recommendations(owner, 0, 10).await.unwrap().len(), 1);

        assert!(fx.engine.dismiss(rec, owner).await.unwrap());
        assert!(fx.engine.get_recommendations(owner, 0, 10).await.unwrap().is_empty());

        // Recalculation starts from a clean slate.
        fx.engine.recalculate(owner, 20).await.unwrap();
        assert_eq!(fx.engine.get_recommendations(owner, 0, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let fx = Fixture::new().await;
        assert_eq!(
            fx.engine.recalculate(Uuid::new_v4(), 20).await.unwrap(),
            RecalcOutcome::UserNotFound
        );
    }

    #[tokio::test]
    async fn test_refresh_all_users() {
        let fx = Fixture::new().await;
        fx.scholar("R", &["Robotics"]).await;
        let active = fx.user("a@x.org", &["Robotics"]).await;
        fx.user("b@x.org", &[]).await;

        let stats = fx
            .engine
            .refresh_all_users(&CancelSignal::new())
            .await
            .unwrap();

        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.skipped_no_interests, 1);
        assert_eq!(stats.regenerated_vectors, 1);
        assert_eq!(stats.recalculated_recommendations, 1);
        assert!(stats.errors.is_empty());
        assert!(
            fx.store
                .get_user(active)
                .await
                .unwrap()
                .unwrap()
                .profile_vector
                .is_some()
        );
    }
}
