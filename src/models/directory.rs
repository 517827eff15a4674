// src/models/directory.rs

//! Persisted directory entities: universities, departments, scholars,
//! publications and users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ProfileVector;

/// A university listed by the registry. Unique by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct University {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founded_year: Option<i32>,
    /// Department-listing page of this university
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewUniversity {
    pub name: String,
    pub location: Option<String>,
    pub classification: Option<String>,
    pub founded_year: Option<i32>,
    pub website_url: Option<String>,
}

/// A department of exactly one university.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    pub university_id: Uuid,
    pub name: String,
    /// Scholar-roster page of this department
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDepartment {
    pub university_id: Uuid,
    pub name: String,
    pub url: Option<String>,
}

/// A scholar, keyed externally by the registry ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scholar {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    /// Display label, "Faculty / Department"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub research_areas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_vector: Option<ProfileVector>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewScholar {
    pub registry_id: Option<String>,
    pub full_name: String,
    pub title: Option<String>,
    pub department_id: Option<Uuid>,
    pub institution: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub profile_url: Option<String>,
    pub research_areas: Vec<String>,
}

/// Typed patch for a scholar. `None` leaves a field untouched; only the
/// fields listed here can ever be edited through `update_scholar`.
#[derive(Debug, Clone, Default)]
pub struct ScholarUpdate {
    pub full_name: Option<String>,
    pub title: Option<String>,
    pub department_id: Option<Uuid>,
    pub institution: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub profile_url: Option<String>,
    pub research_areas: Option<Vec<String>>,
}

impl ScholarUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.title.is_none()
            && self.department_id.is_none()
            && self.institution.is_none()
            && self.department.is_none()
            && self.email.is_none()
            && self.profile_url.is_none()
            && self.research_areas.is_none()
    }

    /// Apply the patch and stamp `last_updated`.
    pub fn apply(self, scholar: &mut Scholar) {
        fn set<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        if let Some(name) = self.full_name {
            scholar.full_name = name;
        }
        set(&mut scholar.title, self.title);
        set(&mut scholar.department_id, self.department_id);
        set(&mut scholar.institution, self.institution);
        set(&mut scholar.department, self.department);
        set(&mut scholar.email, self.email);
        set(&mut scholar.profile_url, self.profile_url);

        if let Some(areas) = self.research_areas {
            scholar.research_areas = areas;
        }
        scholar.last_updated = Utc::now();
    }
}

/// A publication. Authors are free text, not linked to scholars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scholar_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPublication {
    pub scholar_id: Option<Uuid>,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<String>,
    pub venue: Option<String>,
    pub doi: Option<String>,
}

/// A scholar together with the publication titles that feed its vector.
#[derive(Debug, Clone)]
pub struct ScholarText {
    pub scholar_id: Uuid,
    pub research_areas: Vec<String>,
    pub publication_titles: Vec<String>,
}

/// The slice of a platform user the recommender needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub research_interests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_vector: Option<ProfileVector>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub full_name: Option<String>,
    pub research_interests: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scholar() -> Scholar {
        Scholar {
            id: Uuid::new_v4(),
            registry_id: Some("A1".into()),
            full_name: "Ayşe Yılmaz".into(),
            title: Some("Prof. Dr.".into()),
            department_id: None,
            institution: None,
            department: None,
            email: None,
            profile_url: None,
            research_areas: vec!["Robotics".into()],
            profile_vector: None,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_update_touches_only_set_fields() {
        let mut s = scholar();
        ScholarUpdate {
            email: Some("ayse@uni.edu.tr".into()),
            ..Default::default()
        }
        .apply(&mut s);

        assert_eq!(s.email.as_deref(), Some("ayse@uni.edu.tr"));
        assert_eq!(s.title.as_deref(), Some("Prof. Dr."));
        assert_eq!(s.research_areas, vec!["Robotics".to_string()]);
    }

    #[test]
    fn test_update_replaces_areas_and_label() {
        let mut s = scholar();
        ScholarUpdate {
            department: Some("FEN FAKÜLTESİ / KİMYA BÖLÜMÜ".into()),
            research_areas: Some(vec!["Robotics".into(), "Control".into()]),
            ..Default::default()
        }
        .apply(&mut s);

        assert_eq!(s.department.as_deref(), Some("FEN FAKÜLTESİ / KİMYA BÖLÜMÜ"));
        assert_eq!(s.research_areas.len(), 2);
    }

    #[test]
    fn test_empty_update() {
        assert!(ScholarUpdate::default().is_empty());
    }
}
