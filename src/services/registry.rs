// src/services/registry.rs

//! Registry scraping service.
//!
//! Drives one page of the shared browser context per call, feeds the DOM to
//! the extractors and follows roster pagination.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use url::Url;

use crate::browser::{PageFactory, PageHandle, RetryPolicy, goto_with_retry};
use crate::error::Result;
use crate::models::{Config, ScrapedDepartment, ScrapedScholar, ScrapedUniversity};
use crate::services::scholars::RosterParser;
use crate::services::throttle::Throttle;
use crate::services::{extract_departments, extract_universities};

/// Where the orchestrator gets registry records from.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Every university on the registry's list page.
    async fn universities(&self) -> Result<Vec<ScrapedUniversity>>;

    /// Departments linked from a university page.
    async fn departments(&self, university_url: &str) -> Result<Vec<ScrapedDepartment>>;

    /// Every scholar on a department roster, across all pages.
    async fn scholars(&self, department_url: &str, institution: &str)
    -> Result<Vec<ScrapedScholar>>;
}

/// Scrapes the registry through a [`PageFactory`].
pub struct RegistryScraper {
    config: Arc<Config>,
    pages: Arc<dyn PageFactory>,
    base: Url,
    retry: RetryPolicy,
    throttle: Throttle,
}

impl RegistryScraper {
    pub fn new(config: Arc<Config>, pages: Arc<dyn PageFactory>) -> Result<Self> {
        let base = Url::parse(&config.scraper.base_url)?;
        let retry = RetryPolicy::from_config(&config.scraper);
        let throttle = Throttle::new(config.scraper.request_delay_secs);
        Ok(Self {
            config,
            pages,
            base,
            retry,
            throttle,
        })
    }

    /// Replace the pacing (tests use `Throttle::disabled`).
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    async fn load(&self, page: &dyn PageHandle, url: &str) -> Result<Html> {
        goto_with_retry(page, url, self.retry).await?;
        let html = page.content().await?;
        self.throttle.pause().await;
        Ok(Html::parse_document(&html))
    }

    async fn roster(
        &self,
        page: &dyn PageHandle,
        url: &str,
        institution: &str,
    ) -> Result<Vec<ScrapedScholar>> {
        let parser = RosterParser::new(&self.config.selectors)?;
        let selectors = &self.config.selectors;
        let scraper = &self.config.scraper;

        goto_with_retry(page, url, self.retry).await?;
        self.throttle.pause().await;

        let mut scholars = Vec::new();
        for page_no in 1..=scraper.max_pages {
            if !page
                .wait_for_selector(&selectors.scholar_table, scraper.table_wait_timeout())
                .await?
            {
                log::info!("No scholar table on page {page_no} of {url}; roster ends");
                break;
            }

            let html = page.content().await?;
            let found = parser.extract(&Html::parse_document(&html), institution, &self.base);
            log::debug!("Page {page_no} of {url}: {} scholars", found.len());
            scholars.extend(found);

            if !page
                .click(&selectors.next_page, scraper.navigation_timeout())
                .await?
            {
                break;
            }
            self.throttle.pause().await;

            if page_no == scraper.max_pages {
                log::warn!("Stopped {url} after {page_no} pages (scraper.max_pages)");
            }
        }

        Ok(scholars)
    }
}

#[async_trait]
impl RegistrySource for RegistryScraper {
    async fn universities(&self) -> Result<Vec<ScrapedUniversity>> {
        let page = self.pages.create_page().await?;
        let result = async {
            let html = self.load(page.as_ref(), &self.config.scraper.university_list_url).await?;
            extract_universities(&html, &self.config.selectors, &self.base)
        }
        .await;
        page.close().await;
        result
    }

    async fn departments(&self, university_url: &str) -> Result<Vec<ScrapedDepartment>> {
        let page = self.pages.create_page().await?;
        let result = async {
            let html = self.load(page.as_ref(), university_url).await?;
            extract_departments(&html, &self.config.selectors, &self.base)
        }
        .await;
        page.close().await;
        result
    }

    async fn scholars(
        &self,
        department_url: &str,
        institution: &str,
    ) -> Result<Vec<ScrapedScholar>> {
        let page = self.pages.create_page().await?;
        let result = self.roster(page.as_ref(), department_url, institution).await;
        page.close().await;
        result
    }
}
