//! Local storage implementation.
//!
//! Keeps the whole directory in memory behind a `tokio::sync::RwLock` and,
//! when opened on a directory, snapshots it to JSON on `flush`.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml           # Pipeline configuration
//! └── directory.json        # Snapshot of every table
//! ```
//!
//! Snapshots are written atomically (temp file, then rename), so a crash
//! mid-run leaves the previous consistent snapshot on disk. Re-running the
//! jobs is the recovery path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    Department, NewDepartment, NewPublication, NewRecommendation, NewScholar, NewUniversity,
    NewUser, ProfileVector, Publication, Recommendation, Scholar, ScholarText, ScholarUpdate,
    University, User, cosine_similarity,
};
use crate::storage::{DirectoryStore, Neighbour};

const SNAPSHOT_FILE: &str = "directory.json";

/// Serialized form of the whole directory.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    universities: Vec<University>,
    #[serde(default)]
    departments: Vec<Department>,
    #[serde(default)]
    scholars: Vec<Scholar>,
    #[serde(default)]
    publications: Vec<Publication>,
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    recommendations: Vec<Recommendation>,
}

/// Snapshot plus lookup indexes (row positions).
#[derive(Debug, Default)]
struct State {
    data: Snapshot,
    universities_by_id: HashMap<Uuid, usize>,
    universities_by_name: HashMap<String, usize>,
    departments_by_key: HashMap<(Uuid, String), usize>,
    departments_by_url: HashMap<String, usize>,
    scholars_by_id: HashMap<Uuid, usize>,
    scholars_by_registry_id: HashMap<String, usize>,
    publications_by_scholar: HashMap<Uuid, Vec<usize>>,
    users_by_id: HashMap<Uuid, usize>,
    users_by_email: HashMap<String, usize>,
    recommendations_by_id: HashMap<Uuid, usize>,
    recommendations_by_pair: HashMap<(Uuid, Uuid), usize>,
    /// Bumped by every write.
    revision: u64,
    /// Highest revision known to be on disk.
    flushed: u64,
}

impl State {
    fn from_snapshot(data: Snapshot) -> Self {
        let mut state = Self {
            data,
            ..Default::default()
        };
        state.reindex();
        state
    }

    /// Rebuild every index from the row vectors.
    fn reindex(&mut self) {
        let d = &self.data;

        self.universities_by_id = d.universities.iter().enumerate().map(|(i, u)| (u.id, i)).collect();
        self.universities_by_name = d
            .universities
            .iter()
            .enumerate()
            .map(|(i, u)| (u.name.clone(), i))
            .collect();

        self.departments_by_key = d
            .departments
            .iter()
            .enumerate()
            .map(|(i, dep)| ((dep.university_id, dep.name.clone()), i))
            .collect();
        self.departments_by_url = d
            .departments
            .iter()
            .enumerate()
            .filter_map(|(i, dep)| dep.url.clone().map(|url| (url, i)))
            .collect();

        self.scholars_by_id = d.scholars.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
        self.scholars_by_registry_id = d
            .scholars
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.registry_id.clone().map(|rid| (rid, i)))
            .collect();

        self.publications_by_scholar.clear();
        for (i, p) in d.publications.iter().enumerate() {
            if let Some(scholar_id) = p.scholar_id {
                self.publications_by_scholar.entry(scholar_id).or_default().push(i);
            }
        }

        self.users_by_id = d.users.iter().enumerate().map(|(i, u)| (u.id, i)).collect();
        self.users_by_email = d
            .users
            .iter()
            .enumerate()
            .map(|(i, u)| (u.email.to_lowercase(), i))
            .collect();

        self.recommendations_by_id = d
            .recommendations
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i))
            .collect();
        self.recommendations_by_pair = d
            .recommendations
            .iter()
            .enumerate()
            .map(|(i, r)| ((r.user_id, r.scholar_id), i))
            .collect();
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn is_dirty(&self) -> bool {
        self.revision != self.flushed
    }

    fn scholar_mut(&mut self, id: Uuid) -> Option<&mut Scholar> {
        let idx = *self.scholars_by_id.get(&id)?;
        self.data.scholars.get_mut(idx)
    }

    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        let idx = *self.users_by_id.get(&id)?;
        self.data.users.get_mut(idx)
    }
}

/// In-memory directory with optional JSON snapshot persistence.
pub struct LocalStore {
    root_dir: Option<PathBuf>,
    state: RwLock<State>,
    /// Serializes snapshot writes.
    flush_lock: Mutex<()>,
}

impl LocalStore {
    /// Create a store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            root_dir: None,
            state: RwLock::new(State::default()),
            flush_lock: Mutex::new(()),
        }
    }

    /// Open a store rooted at the given directory, loading the existing
    /// snapshot if there is one.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        let path = root_dir.join(SNAPSHOT_FILE);

        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(AppError::Io(e)),
        };

        log::info!(
            "Opened local store at {} ({} universities, {} departments, {} scholars, {} users)",
            root_dir.display(),
            data.universities.len(),
            data.departments.len(),
            data.scholars.len(),
            data.users.len()
        );

        Ok(Self {
            root_dir: Some(root_dir),
            state: RwLock::new(State::from_snapshot(data)),
            flush_lock: Mutex::new(()),
        })
    }

    /// Snapshot file path, if file-backed.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.root_dir.as_ref().map(|root| root.join(SNAPSHOT_FILE))
    }

    /// Serialized snapshot and the revision it captures; `None` when
    /// nothing changed since the last flush.
    async fn serialize_if_dirty(&self) -> Result<Option<(u64, Vec<u8>)>> {
        let state = self.state.read().await;
        if !state.is_dirty() {
            return Ok(None);
        }
        Ok(Some((state.revision, serde_json::to_vec_pretty(&state.data)?)))
    }

    /// Record that `revision` is on disk. Writes made after it keep the
    /// store dirty.
    async fn mark_flushed(&self, revision: u64) {
        let mut state = self.state.write().await;
        state.flushed = state.flushed.max(revision);
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for LocalStore {
    async fn get_university(&self, id: Uuid) -> Result<Option<University>> {
        let state = self.state.read().await;
        Ok(state
            .universities_by_id
            .get(&id)
            .map(|&i| state.data.universities[i].clone()))
    }

    async fn get_university_by_name(&self, name: &str) -> Result<Option<University>> {
        let state = self.state.read().await;
        Ok(state
            .universities_by_name
            .get(name)
            .map(|&i| state.data.universities[i].clone()))
    }

    async fn create_university(&self, new: NewUniversity) -> Result<University> {
        let mut state = self.state.write().await;
        if state.universities_by_name.contains_key(&new.name) {
            return Err(AppError::storage(format!(
                "university '{}' already exists",
                new.name
            )));
        }

        let university = University {
            id: Uuid::new_v4(),
            name: new.name,
            location: new.location,
            classification: new.classification,
            founded_year: new.founded_year,
            website_url: new.website_url,
            created_at: Utc::now(),
        };

        let idx = state.data.universities.len();
        state.universities_by_id.insert(university.id, idx);
        state.universities_by_name.insert(university.name.clone(), idx);
        state.data.universities.push(university.clone());
        state.touch();
        Ok(university)
    }

    async fn get_all_universities(&self) -> Result<Vec<University>> {
        Ok(self.state.read().await.data.universities.clone())
    }

    async fn get_department_by_name_and_university(
        &self,
        name: &str,
        university_id: Uuid,
    ) -> Result<Option<Department>> {
        let state = self.state.read().await;
        Ok(state
            .departments_by_key
            .get(&(university_id, name.to_string()))
            .map(|&i| state.data.departments[i].clone()))
    }

    async fn create_department(&self, new: NewDepartment) -> Result<Department> {
        let mut state = self.state.write().await;
        if !state.universities_by_id.contains_key(&new.university_id) {
            return Err(AppError::not_found("university", new.university_id));
        }
        let key = (new.university_id, new.name.clone());
        if state.departments_by_key.contains_key(&key) {
            return Err(AppError::storage(format!(
                "department '{}' already exists for university {}",
                new.name, new.university_id
            )));
        }
        if let Some(url) = &new.url {
            if state.departments_by_url.contains_key(url) {
                return Err(AppError::storage(format!(
                    "department URL already registered: {url}"
                )));
            }
        }

        let department = Department {
            id: Uuid::new_v4(),
            university_id: new.university_id,
            name: new.name,
            url: new.url,
            created_at: Utc::now(),
        };

        let idx = state.data.departments.len();
        state.departments_by_key.insert(key, idx);
        if let Some(url) = &department.url {
            state.departments_by_url.insert(url.clone(), idx);
        }
        state.data.departments.push(department.clone());
        state.touch();
        Ok(department)
    }

    async fn get_all_departments(&self) -> Result<Vec<Department>> {
        Ok(self.state.read().await.data.departments.clone())
    }

    async fn get_scholar(&self, id: Uuid) -> Result<Option<Scholar>> {
        let state = self.state.read().await;
        Ok(state
            .scholars_by_id
            .get(&id)
            .map(|&i| state.data.scholars[i].clone()))
    }

    async fn get_scholar_by_external_id(&self, registry_id: &str) -> Result<Option<Scholar>> {
        let state = self.state.read().await;
        Ok(state
            .scholars_by_registry_id
            .get(registry_id)
            .map(|&i| state.data.scholars[i].clone()))
    }

    async fn create_scholar(&self, new: NewScholar) -> Result<Scholar> {
        let mut state = self.state.write().await;
        if let Some(rid) = &new.registry_id {
            if state.scholars_by_registry_id.contains_key(rid) {
                return Err(AppError::storage(format!(
                    "scholar with registry ID {rid} already exists"
                )));
            }
        }

        let scholar = Scholar {
            id: Uuid::new_v4(),
            registry_id: new.registry_id,
            full_name: new.full_name,
            title: new.title,
            department_id: new.department_id,
            institution: new.institution,
            department: new.department,
            email: new.email,
            profile_url: new.profile_url,
            research_areas: new.research_areas,
            profile_vector: None,
            last_updated: Utc::now(),
        };

        let idx = state.data.scholars.len();
        state.scholars_by_id.insert(scholar.id, idx);
        if let Some(rid) = &scholar.registry_id {
            state.scholars_by_registry_id.insert(rid.clone(), idx);
        }
        state.data.scholars.push(scholar.clone());
        state.touch();
        Ok(scholar)
    }

    async fn update_scholar(&self, id: Uuid, update: ScholarUpdate) -> Result<Option<Scholar>> {
        let mut state = self.state.write().await;
        let Some(scholar) = state.scholar_mut(id) else {
            return Ok(None);
        };
        if update.is_empty() {
            return Ok(Some(scholar.clone()));
        }
        update.apply(scholar);
        let updated = scholar.clone();
        state.touch();
        Ok(Some(updated))
    }

    async fn get_scholars_missing_vector(&self) -> Result<Vec<Scholar>> {
        let state = self.state.read().await;
        Ok(state
            .data
            .scholars
            .iter()
            .filter(|s| s.profile_vector.is_none())
            .cloned()
            .collect())
    }

    async fn get_all_scholars(&self) -> Result<Vec<Scholar>> {
        Ok(self.state.read().await.data.scholars.clone())
    }

    async fn load_scholar_texts(&self, ids: &[Uuid]) -> Result<Vec<ScholarText>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                let scholar = &state.data.scholars[*state.scholars_by_id.get(id)?];
                let publication_titles = state
                    .publications_by_scholar
                    .get(id)
                    .map(|rows| {
                        rows.iter()
                            .map(|&i| state.data.publications[i].title.clone())
                            .collect()
                    })
                    .unwrap_or_default();
                Some(ScholarText {
                    scholar_id: scholar.id,
                    research_areas: scholar.research_areas.clone(),
                    publication_titles,
                })
            })
            .collect())
    }

    async fn update_scholar_vector(&self, id: Uuid, vector: Option<ProfileVector>) -> Result<()> {
        let mut state = self.state.write().await;
        let scholar = state
            .scholar_mut(id)
            .ok_or_else(|| AppError::not_found("scholar", id))?;
        scholar.profile_vector = vector;
        scholar.last_updated = Utc::now();
        state.touch();
        Ok(())
    }

    async fn bulk_persist_vectors(&self, vectors: HashMap<Uuid, ProfileVector>) -> Result<usize> {
        let mut state = self.state.write().await;
        if let Some(missing) = vectors.keys().find(|id| !state.scholars_by_id.contains_key(*id)) {
            return Err(AppError::not_found("scholar", missing));
        }

        let now = Utc::now();
        let count = vectors.len();
        for (id, vector) in vectors {
            if let Some(scholar) = state.scholar_mut(id) {
                scholar.profile_vector = Some(vector);
                scholar.last_updated = now;
            }
        }
        state.touch();
        Ok(count)
    }

    async fn nearest_scholars(
        &self,
        query: &ProfileVector,
        limit: usize,
    ) -> Result<Vec<Neighbour>> {
        let state = self.state.read().await;
        let mut hits: Vec<Neighbour> = state
            .data
            .scholars
            .iter()
            .filter_map(|s| {
                let vector = s.profile_vector.as_ref()?;
                Some(Neighbour {
                    scholar_id: s.id,
                    distance: 1.0 - cosine_similarity(query.as_slice(), vector.as_slice()),
                })
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn research_area_counts(&self) -> Result<Vec<(String, usize)>> {
        let state = self.state.read().await;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for scholar in &state.data.scholars {
            for area in &scholar.research_areas {
                let area = area.trim();
                if !area.is_empty() {
                    *counts.entry(area.to_string()).or_default() += 1;
                }
            }
        }
        Ok(counts.into_iter().collect())
    }

    async fn create_publication(&self, new: NewPublication) -> Result<Publication> {
        let mut state = self.state.write().await;
        if let Some(scholar_id) = new.scholar_id {
            if !state.scholars_by_id.contains_key(&scholar_id) {
                return Err(AppError::not_found("scholar", scholar_id));
            }
        }

        let publication = Publication {
            id: Uuid::new_v4(),
            scholar_id: new.scholar_id,
            title: new.title,
            authors: new.authors,
            year: new.year,
            venue: new.venue,
            doi: new.doi,
        };

        let idx = state.data.publications.len();
        if let Some(scholar_id) = publication.scholar_id {
            state
                .publications_by_scholar
                .entry(scholar_id)
                .or_default()
                .push(idx);
        }
        state.data.publications.push(publication.clone());
        state.touch();
        Ok(publication)
    }

    async fn create_user(&self, new: NewUser) -> Result<User> {
        let mut state = self.state.write().await;
        let email_key = new.email.trim().to_lowercase();
        if email_key.is_empty() {
            return Err(AppError::invalid_input("user email is empty"));
        }
        if state.users_by_email.contains_key(&email_key) {
            return Err(AppError::storage(format!(
                "user {} already exists",
                new.email
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new.email.trim().to_string(),
            full_name: new.full_name,
            research_interests: new.research_interests,
            profile_vector: None,
            created_at: Utc::now(),
        };

        let idx = state.data.users.len();
        state.users_by_id.insert(user.id, idx);
        state.users_by_email.insert(email_key, idx);
        state.data.users.push(user.clone());
        state.touch();
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users_by_id.get(&id).map(|&i| state.data.users[i].clone()))
    }

    async fn get_all_users(&self) -> Result<Vec<User>> {
        Ok(self.state.read().await.data.users.clone())
    }

    async fn update_user_interests(
        &self,
        id: Uuid,
        interests: Vec<String>,
    ) -> Result<Option<User>> {
        let mut state = self.state.write().await;
        let Some(user) = state.user_mut(id) else {
            return Ok(None);
        };
        user.research_interests = interests;
        let updated = user.clone();
        state.touch();
        Ok(Some(updated))
    }

    async fn update_user_vector(&self, id: Uuid, vector: Option<ProfileVector>) -> Result<()> {
        let mut state = self.state.write().await;
        let user = state
            .user_mut(id)
            .ok_or_else(|| AppError::not_found("user", id))?;
        user.profile_vector = vector;
        state.touch();
        Ok(())
    }

    async fn delete_recommendations_by_user(&self, user_id: Uuid) -> Result<usize> {
        let mut state = self.state.write().await;
        let before = state.data.recommendations.len();
        state.data.recommendations.retain(|r| r.user_id != user_id);
        let removed = before - state.data.recommendations.len();
        if removed > 0 {
            state.reindex();
            state.touch();
        }
        Ok(removed)
    }

    async fn upsert_recommendation(&self, new: NewRecommendation) -> Result<Recommendation> {
        let mut state = self.state.write().await;
        if !state.users_by_id.contains_key(&new.user_id) {
            return Err(AppError::not_found("user", new.user_id));
        }
        if !state.scholars_by_id.contains_key(&new.scholar_id) {
            return Err(AppError::not_found("scholar", new.scholar_id));
        }

        let now = Utc::now();
        let pair = (new.user_id, new.scholar_id);
        if let Some(&idx) = state.recommendations_by_pair.get(&pair) {
            let existing = &mut state.data.recommendations[idx];
            existing.similarity_score = new.similarity_score;
            existing.explanation = new.explanation;
            existing.dismissed = false;
            existing.generated_at = now;
            let updated = existing.clone();
            state.touch();
            return Ok(updated);
        }

        let recommendation = Recommendation {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            scholar_id: new.scholar_id,
            similarity_score: new.similarity_score,
            explanation: new.explanation,
            dismissed: false,
            generated_at: now,
        };

        let idx = state.data.recommendations.len();
        state.recommendations_by_id.insert(recommendation.id, idx);
        state.recommendations_by_pair.insert(pair, idx);
        state.data.recommendations.push(recommendation.clone());
        state.touch();
        Ok(recommendation)
    }

    async fn list_recommendations_by_user(
        &self,
        user_id: Uuid,
        include_dismissed: bool,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Recommendation>> {
        let state = self.state.read().await;
        let mut rows: Vec<Recommendation> = state
            .data
            .recommendations
            .iter()
            .filter(|r| r.user_id == user_id && (include_dismissed || !r.dismissed))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        Ok(rows.into_iter().skip(skip).take(limit).collect())
    }

    async fn get_recommendation(&self, id: Uuid) -> Result<Option<Recommendation>> {
        let state = self.state.read().await;
        Ok(state
            .recommendations_by_id
            .get(&id)
            .map(|&i| state.data.recommendations[i].clone()))
    }

    async fn set_recommendation_dismissed(&self, id: Uuid, dismissed: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let idx = *state
            .recommendations_by_id
            .get(&id)
            .ok_or_else(|| AppError::not_found("recommendation", id))?;
        state.data.recommendations[idx].dismissed = dismissed;
        state.touch();
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let Some(path) = self.snapshot_path() else {
            return Ok(());
        };

        let _guard = self.flush_lock.lock().await;
        // Serialize under the read lock, write without holding it.
        let Some((revision, bytes)) = self.serialize_if_dirty().await? else {
            return Ok(());
        };

        Self::write_bytes(&path, &bytes).await?;
        self.mark_flushed(revision).await;
        log::debug!("Snapshot written to {}", path.display());
        Ok(())
    }
}
