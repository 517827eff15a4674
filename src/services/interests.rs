// src/services/interests.rs

//! User research interests.
//!
//! Interests must name a known research area (any casing; stored with the
//! catalog spelling). A user's vector is re-embedded from the interest list
//! after every change and cleared when the list becomes empty.

use std::sync::Arc;

use uuid::Uuid;

use crate::embedding::EmbeddingService;
use crate::error::{AppError, Result};
use crate::models::{NewUser, User};
use crate::services::research_areas::ResearchAreaCatalog;
use crate::storage::DirectoryStore;

pub struct InterestService {
    store: Arc<dyn DirectoryStore>,
    catalog: Arc<ResearchAreaCatalog>,
    embeddings: EmbeddingService,
    max_interests: usize,
}

impl InterestService {
    pub fn new(
        store: Arc<dyn DirectoryStore>,
        catalog: Arc<ResearchAreaCatalog>,
        embeddings: EmbeddingService,
        max_interests: usize,
    ) -> Self {
        Self {
            store,
            catalog,
            embeddings,
            max_interests,
        }
    }

    /// Register a user, validating any initial interests.
    pub async fn create_user(
        &self,
        email: &str,
        full_name: Option<String>,
        interests: &[String],
    ) -> Result<User> {
        let interests = self.normalize(interests).await?;
        let user = self
            .store
            .create_user(NewUser {
                email: email.trim().to_string(),
                full_name,
                research_interests: interests.clone(),
            })
            .await?;

        if interests.is_empty() {
            self.store.flush().await?;
            return Ok(user);
        }
        self.sync_vector(user.id, &interests).await?;
        self.store.flush().await?;
        self.store
            .get_user(user.id)
            .await?
            .ok_or_else(|| AppError::not_found("user", user.id))
    }

    /// Replace the interest list. Duplicates (ignoring case) collapse to
    /// the first occurrence. `None` when the user does not exist.
    pub async fn set_interests(&self, user_id: Uuid, interests: &[String]) -> Result<Option<User>> {
        let normalized = self.normalize(interests).await?;
        self.save(user_id, normalized).await
    }

    /// Append one interest.
    pub async fn add_interest(&self, user_id: Uuid, interest: &str) -> Result<Option<User>> {
        let Some(user) = self.store.get_user(user_id).await? else {
            return Ok(None);
        };

        let interest = interest.trim();
        if interest.is_empty() {
            return Err(AppError::invalid_input("Interest cannot be empty"));
        }
        let canonical = self.catalog.canonical(interest).await?.ok_or_else(|| {
            AppError::invalid_input(format!("Unknown research area '{interest}'"))
        })?;

        let lower = canonical.to_lowercase();
        if user
            .research_interests
            .iter()
            .any(|i| i.to_lowercase() == lower)
        {
            return Err(AppError::invalid_input(format!(
                "Research interest '{canonical}' is already in the list"
            )));
        }

        let mut updated = user.research_interests;
        updated.push(canonical);
        self.check_limit(updated.len())?;
        self.save(user_id, updated).await
    }

    /// Remove one interest, matched ignoring case.
    pub async fn remove_interest(&self, user_id: Uuid, interest: &str) -> Result<Option<User>> {
        let Some(user) = self.store.get_user(user_id).await? else {
            return Ok(None);
        };
        if user.research_interests.is_empty() {
            return Err(AppError::invalid_input("No research interests to remove"));
        }

        let lower = interest.trim().to_lowercase();
        let before = user.research_interests.len();
        let updated: Vec<String> = user
            .research_interests
            .into_iter()
            .filter(|i| i.to_lowercase() != lower)
            .collect();

        if updated.len() == before {
            return Err(AppError::invalid_input(format!(
                "Research interest '{}' is not in the list",
                interest.trim()
            )));
        }
        self.save(user_id, updated).await
    }

    async fn save(&self, user_id: Uuid, interests: Vec<String>) -> Result<Option<User>> {
        if self
            .store
            .update_user_interests(user_id, interests.clone())
            .await?
            .is_none()
        {
            return Ok(None);
        }
        self.sync_vector(user_id, &interests).await?;
        self.store.flush().await?;
        self.store.get_user(user_id).await
    }

    /// Re-embed the user vector from `interests`, clearing it when empty.
    async fn sync_vector(&self, user_id: Uuid, interests: &[String]) -> Result<()> {
        let vector = self.embeddings.embed_from_list(interests).await?;
        self.store.update_user_vector(user_id, vector).await
    }

    /// Catalog spellings, de-duplicated ignoring case; every unknown entry
    /// is reported at once.
    async fn normalize(&self, interests: &[String]) -> Result<Vec<String>> {
        let lookup = self.catalog.lookup().await?;

        let mut normalized: Vec<String> = Vec::new();
        let mut unknown: Vec<&str> = Vec::new();
        for raw in interests {
            let term = raw.trim();
            if term.is_empty() {
                continue;
            }
            match lookup.get(&term.to_lowercase()) {
                Some(canonical) if !normalized.contains(canonical) => {
                    normalized.push(canonical.clone())
                }
                Some(_) => {}
                None => unknown.push(term),
            }
        }

        if !unknown.is_empty() {
            return Err(AppError::invalid_input(format!(
                "Unknown research areas: {}",
                unknown.join(", ")
            )));
        }
        self.check_limit(normalized.len())?;
        Ok(normalized)
    }

    fn check_limit(&self, count: usize) -> Result<()> {
        if count > self.max_interests {
            return Err(AppError::invalid_input(format!(
                "At most {} research interests are allowed",
                self.max_interests
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::embedding::testing::HashEncoder;
    use crate::models::NewScholar;
    use crate::storage::LocalStore;

    const AREAS: &[&str] = &["Robotics", "Machine Learning", "Optics", "Geology"];

    async fn setup(max: usize) -> (InterestService, Arc<LocalStore>, User) {
        let store = Arc::new(LocalStore::in_memory());
        store
            .create_scholar(NewScholar {
                registry_id: Some("S".into()),
                full_name: "S".into(),
                research_areas: AREAS.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            })
            .await
            .unwrap();

        let catalog = Arc::new(ResearchAreaCatalog::new(
            store.clone(),
            Duration::from_secs(60),
        ));
        let embeddings = EmbeddingService::new(Arc::new(HashEncoder::new(16)));
        let service = InterestService::new(store.clone(), catalog, embeddings, max);
        let user = service
            .create_user("u@example.org", None, &[])
            .await
            .unwrap();
        (service, store, user)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_set_normalizes_and_embeds() {
        let (service, _, user) = setup(15).await;
        let updated = service
            .set_interests(user.id, &strings(&["robotics", "ROBOTICS", " optics "]))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.research_interests, strings(&["Robotics", "Optics"]));
        assert!(updated.profile_vector.is_some());
    }

    #[tokio::test]
    async fn test_unknown_interest_rejected() {
        let (service, _, user) = setup(15).await;
        let err = service
            .set_interests(user.id, &strings(&["Robotics", "Astrology"]))
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(err.to_string().contains("Astrology"));
    }

    #[tokio::test]
    async fn test_add_duplicate_and_limit() {
        let (service, _, user) = setup(2).await;
        service.add_interest(user.id, "Optics").await.unwrap();

        let dup = service.add_interest(user.id, "OPTICS").await.unwrap_err();
        assert!(dup.is_invalid_input());

        service.add_interest(user.id, "Geology").await.unwrap();
        let over = service.add_interest(user.id, "Robotics").await.unwrap_err();
        assert!(over.is_invalid_input());
    }

    #[tokio::test]
    async fn test_remove_last_interest_clears_vector() {
        let (service, store, user) = setup(15).await;
        service.add_interest(user.id, "Optics").await.unwrap();

        let updated = service
            .remove_interest(user.id, "optics")
            .await
            .unwrap()
            .unwrap();
        assert!(updated.research_interests.is_empty());
        assert_eq!(
            store.get_user(user.id).await.unwrap().unwrap().profile_vector,
            None
        );

        let err = service.remove_interest(user.id, "Optics").await.unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn test_unknown_user_is_none() {
        let (service, _, _) = setup(15).await;
        let missing = Uuid::new_v4();
        assert!(service.add_interest(missing, "Optics").await.unwrap().is_none());
        assert!(
            service
                .set_interests(missing, &strings(&["Optics"]))
                .await
                .unwrap()
                .is_none()
        );
    }
}
