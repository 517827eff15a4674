//! Storage abstractions for directory persistence.
//!
//! The batch jobs and the recommender only talk to [`DirectoryStore`]. The
//! store enforces the uniqueness invariants of the data model:
//!
//! - university name
//! - department (university, name) and department URL
//! - scholar registry ID
//! - recommendation (user, scholar)
//!
//! Every create/update is committed on its own; `flush` makes pending writes
//! durable for backends that buffer.

pub mod local;

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Department, NewDepartment, NewPublication, NewRecommendation, NewScholar, NewUniversity,
    NewUser, ProfileVector, Publication, Recommendation, Scholar, ScholarText, ScholarUpdate,
    University, User,
};

// Re-export for convenience
pub use local::LocalStore;

/// A nearest-neighbour hit: scholar and cosine distance (`1 - similarity`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    pub scholar_id: Uuid,
    pub distance: f32,
}

/// Trait for directory storage backends.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    // Universities

    async fn get_university(&self, id: Uuid) -> Result<Option<University>>;
    async fn get_university_by_name(&self, name: &str) -> Result<Option<University>>;
    async fn create_university(&self, new: NewUniversity) -> Result<University>;
    /// All universities in insertion order.
    async fn get_all_universities(&self) -> Result<Vec<University>>;

    // Departments

    async fn get_department_by_name_and_university(
        &self,
        name: &str,
        university_id: Uuid,
    ) -> Result<Option<Department>>;
    async fn create_department(&self, new: NewDepartment) -> Result<Department>;
    /// All departments in insertion order.
    async fn get_all_departments(&self) -> Result<Vec<Department>>;

    // Scholars

    async fn get_scholar(&self, id: Uuid) -> Result<Option<Scholar>>;
    async fn get_scholar_by_external_id(&self, registry_id: &str) -> Result<Option<Scholar>>;
    async fn create_scholar(&self, new: NewScholar) -> Result<Scholar>;
    /// Apply a typed patch. `None` when the scholar does not exist.
    async fn update_scholar(&self, id: Uuid, update: ScholarUpdate) -> Result<Option<Scholar>>;
    async fn get_scholars_missing_vector(&self) -> Result<Vec<Scholar>>;
    async fn get_all_scholars(&self) -> Result<Vec<Scholar>>;
    /// Research areas and publication titles for a batch, in one fetch.
    /// Unknown IDs are left out.
    async fn load_scholar_texts(&self, ids: &[Uuid]) -> Result<Vec<ScholarText>>;
    async fn update_scholar_vector(&self, id: Uuid, vector: Option<ProfileVector>) -> Result<()>;
    /// Persist many scholar vectors at once. Returns how many were written.
    async fn bulk_persist_vectors(&self, vectors: HashMap<Uuid, ProfileVector>) -> Result<usize>;
    /// Scholars with a vector, closest first, at most `limit`.
    async fn nearest_scholars(&self, query: &ProfileVector, limit: usize)
    -> Result<Vec<Neighbour>>;
    /// Number of scholars carrying each research area (exact spelling).
    async fn research_area_counts(&self) -> Result<Vec<(String, usize)>>;

    // Publications

    async fn create_publication(&self, new: NewPublication) -> Result<Publication>;

    // Users

    async fn create_user(&self, new: NewUser) -> Result<User>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn get_all_users(&self) -> Result<Vec<User>>;
    async fn update_user_interests(&self, id: Uuid, interests: Vec<String>)
    -> Result<Option<User>>;
    async fn update_user_vector(&self, id: Uuid, vector: Option<ProfileVector>) -> Result<()>;

    // Recommendations

    /// Remove every recommendation of a user. Returns how many went.
    async fn delete_recommendations_by_user(&self, user_id: Uuid) -> Result<usize>;
    /// Insert, or update the existing (user, scholar) row in place and
    /// clear its dismissed flag.
    async fn upsert_recommendation(&self, new: NewRecommendation) -> Result<Recommendation>;
    /// Recommendations of a user, highest similarity first.
    async fn list_recommendations_by_user(
        &self,
        user_id: Uuid,
        include_dismissed: bool,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Recommendation>>;
    async fn get_recommendation(&self, id: Uuid) -> Result<Option<Recommendation>>;
    async fn set_recommendation_dismissed(&self, id: Uuid, dismissed: bool) -> Result<()>;

    /// Make pending writes durable.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
