// src/models/selectors.rs

//! CSS selectors for scraping the registry pages.
//!
//! Each list is an ordered set of candidates; the first one that matches
//! anything wins. The registry's markup has shifted over time, hence the
//! fallbacks.

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Candidate CSS selectors for the university, department and roster pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySelectors {
    /// Rows of the university table
    #[serde(default = "defaults::university_rows")]
    pub university_rows: Vec<String>,

    /// Department-listing link inside a university row
    #[serde(default = "defaults::university_links")]
    pub university_links: Vec<String>,

    /// Query parameter that marks a department link (`birim=`)
    #[serde(default = "defaults::department_param")]
    pub department_param: String,

    /// Scholar table; its absence ends pagination
    #[serde(default = "defaults::scholar_table")]
    pub scholar_table: String,

    /// Scholar rows
    #[serde(default = "defaults::scholar_rows")]
    pub scholar_rows: String,

    /// Enabled "next" control of the roster pagination
    #[serde(default = "defaults::next_page")]
    pub next_page: String,
}

impl Default for RegistrySelectors {
    fn default() -> Self {
        Self {
            university_rows: defaults::university_rows(),
            university_links: defaults::university_links(),
            department_param: defaults::department_param(),
            scholar_table: defaults::scholar_table(),
            scholar_rows: defaults::scholar_rows(),
            next_page: defaults::next_page(),
        }
    }
}

impl RegistrySelectors {
    /// Selector matching department anchors.
    pub fn department_links(&self) -> String {
        format!("a[href*='{}=']", self.department_param)
    }

    /// Check that every configured selector parses.
    pub fn validate(&self) -> Result<()> {
        let department = self.department_links();
        let singles = [
            department.as_str(),
            self.scholar_table.as_str(),
            self.scholar_rows.as_str(),
            self.next_page.as_str(),
        ];
        for css in self
            .university_rows
            .iter()
            .chain(&self.university_links)
            .map(String::as_str)
            .chain(singles)
        {
            parse(css)?;
        }
        if self.university_rows.is_empty() || self.university_links.is_empty() {
            return Err(AppError::validation(
                "selectors: university candidate lists must not be empty",
            ));
        }
        Ok(())
    }
}

/// Parse a selector, mapping failures into `AppError::Selector`.
pub fn parse(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::selector(css, e))
}

mod defaults {
    pub fn university_rows() -> Vec<String> {
        vec![
            "#universiteListTable tbody tr".into(),
            ".table tbody tr".into(),
            "table tbody tr".into(),
        ]
    }
    pub fn university_links() -> Vec<String> {
        vec!["td:nth-child(2) a".into(), "td a".into(), "a".into()]
    }
    pub fn department_param() -> String {
        "birim".into()
    }
    pub fn scholar_table() -> String {
        "table#authorlistTb".into()
    }
    pub fn scholar_rows() -> String {
        "tr[id^='authorInfo_']".into()
    }
    pub fn next_page() -> String {
        "ul.pagination li.active + li:not(.disabled) a".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selectors_parse() {
        assert!(RegistrySelectors::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        let selectors = RegistrySelectors {
            scholar_rows: "tr[[".into(),
            ..Default::default()
        };
        let err = selectors.validate().unwrap_err();
        assert!(matches!(err, AppError::Selector { .. }));
    }
}
