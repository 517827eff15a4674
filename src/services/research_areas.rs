// src/services/research_areas.rs

//! Catalog of research areas known from scholar profiles.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::storage::DirectoryStore;
use crate::utils::cache::TtlCache;

/// An area and how many scholars list it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AreaCount {
    pub area: String,
    pub count: usize,
}

/// Unique and top research areas, each cached for the configured TTL.
pub struct ResearchAreaCatalog {
    store: Arc<dyn DirectoryStore>,
    unique: TtlCache<Vec<String>>,
    top: TtlCache<Vec<AreaCount>>,
}

impl ResearchAreaCatalog {
    pub fn new(store: Arc<dyn DirectoryStore>, ttl: Duration) -> Self {
        Self {
            store,
            unique: TtlCache::new(ttl),
            top: TtlCache::new(ttl),
        }
    }

    /// Distinct non-blank areas, sorted. `search` keeps only areas that
    /// contain it, ignoring case.
    pub async fn unique_areas(&self, search: Option<&str>) -> Result<Vec<String>> {
        let areas = self.all_unique().await?;
        match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => {
                let term = term.to_lowercase();
                Ok(areas
                    .into_iter()
                    .filter(|a| a.to_lowercase().contains(&term))
                    .collect())
            }
            None => Ok(areas),
        }
    }

    /// Areas by scholar count, most common first, ties by name.
    pub async fn top_areas(&self, limit: usize) -> Result<Vec<AreaCount>> {
        let ranked = match self.top.get() {
            Some(hit) => hit,
            None => {
                let mut ranked: Vec<AreaCount> = self
                    .store
                    .research_area_counts()
                    .await?
                    .into_iter()
                    .filter(|(area, _)| !area.trim().is_empty())
                    .map(|(area, count)| AreaCount { area, count })
                    .collect();
                ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.area.cmp(&b.area)));
                self.top.put(ranked.clone());
                ranked
            }
        };
        Ok(ranked.into_iter().take(limit).collect())
    }

    /// Catalog spelling of `term`, matched case-insensitively.
    pub async fn canonical(&self, term: &str) -> Result<Option<String>> {
        Ok(self.lookup().await?.remove(&term.trim().to_lowercase()))
    }

    /// Lower-cased area → catalog spelling.
    pub async fn lookup(&self) -> Result<HashMap<String, String>> {
        Ok(self
            .all_unique()
            .await?
            .into_iter()
            .map(|a| (a.to_lowercase(), a))
            .collect())
    }

    /// Drop both cached lists.
    pub fn invalidate(&self) {
        self.unique.invalidate();
        self.top.invalidate();
    }

    async fn all_unique(&self) -> Result<Vec<String>> {
        if let Some(hit) = self.unique.get() {
            return Ok(hit);
        }
        let mut areas: Vec<String> = self
            .store
            .research_area_counts()
            .await?
            .into_iter()
            .map(|(area, _)| area)
            .filter(|area| !area.trim().is_empty())
            .collect();
        areas.sort();
        areas.dedup();
        self.unique.put(areas.clone());
        Ok(areas)
    }
}
