// src/models/scraped.rs

//! Records produced by the page extractors, before persistence.

use serde::{Deserialize, Serialize};

/// A row of the registry's university table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedUniversity {
    pub name: String,
    pub location: String,
    pub classification: String,
    /// 0 when the registry cell is not numeric
    pub founded_year: i32,
    /// Absolute department-listing URL
    pub department_url: String,
}

/// A department link on a university page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedDepartment {
    /// Canonical short name
    pub name: String,
    /// Link text as rendered
    pub full_name: String,
    pub url: String,
}

/// A row of a department's scholar roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedScholar {
    pub registry_id: String,
    pub full_name: String,
    pub title: String,
    pub institution: String,
    pub faculty: String,
    pub department: String,
    /// "Faculty / Department", or just the department
    pub department_label: String,
    /// Lower-cased, empty when absent
    pub email: String,
    pub profile_url: String,
    pub research_areas: Vec<String>,
}
