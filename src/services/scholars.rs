// src/services/scholars.rs

//! Scholar roster extraction.
//!
//! One roster page is a table of `authorInfo_*` rows. Each row carries the
//! registry ID, name, title, department path, an obfuscated e-mail, a
//! profile link and research-area badges.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::Result;
use crate::models::{RegistrySelectors, ScrapedScholar, selectors};
use crate::utils::{clean_text, resolve_url};

const EMAIL_PATTERN: &str =
    r"(?i)\b([a-z0-9._%+-]+)(?:\[at\]|@)([a-z0-9.-]+\.[a-z]{2,})\b";
const TITLE_PAREN_PATTERN: &str = r"\s*\(.*\)";
const PR_SUFFIX_PATTERN: &str = r"\s*PR\.\s*$";

const UNKNOWN_NAME: &str = "Unknown Name";

/// Compiled selectors and patterns for roster rows.
pub struct RosterParser {
    rows: Selector,
    registry_id: Selector,
    main_cell: Selector,
    name: Selector,
    subheadings: Selector,
    contact_cell: Selector,
    profile_link: Selector,
    badges: Selector,
    keywords: Selector,
    email: Regex,
    title_paren: Regex,
    pr_suffix: Regex,
}

impl RosterParser {
    pub fn new(selectors: &RegistrySelectors) -> Result<Self> {
        Ok(Self {
            rows: selectors::parse(&selectors.scholar_rows)?,
            registry_id: selectors::parse("span#spid2")?,
            main_cell: selectors::parse("td:nth-of-type(3)")?,
            name: selectors::parse("h4")?,
            subheadings: selectors::parse("h6")?,
            contact_cell: selectors::parse("td:nth-of-type(4)")?,
            profile_link: selectors::parse("a[href*='AkademisyenGorevOgrenimBilgileri']")?,
            badges: selectors::parse("span.label.label-primary")?,
            keywords: selectors::parse("span:not([class])")?,
            email: Regex::new(EMAIL_PATTERN)?,
            title_paren: Regex::new(TITLE_PAREN_PATTERN)?,
            pr_suffix: Regex::new(PR_SUFFIX_PATTERN)?,
        })
    }

    /// Extract every well-formed row of one roster page.
    pub fn extract(&self, document: &Html, institution: &str, base: &Url) -> Vec<ScrapedScholar> {
        document
            .select(&self.rows)
            .filter_map(|row| {
                let parsed = self.parse_row(row, institution, base);
                if parsed.is_none() {
                    log::debug!(
                        "Skipping roster row {:?}: missing registry ID or layout",
                        row.value().id()
                    );
                }
                parsed
            })
            .collect()
    }

    fn parse_row(&self, row: ElementRef, institution: &str, base: &Url) -> Option<ScrapedScholar> {
        let registry_id = first_text(row, &self.registry_id).filter(|id| !id.is_empty())?;

        let main = row.select(&self.main_cell).next()?;

        let full_name = first_text(main, &self.name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());

        let subheadings: Vec<String> = main
            .select(&self.subheadings)
            .map(|h| clean_text(&h.text().collect::<String>()))
            .collect();

        let title = subheadings
            .first()
            .map(|raw| self.title_paren.replace_all(raw, "").trim().to_string())
            .unwrap_or_default();

        let (faculty, department) = subheadings
            .get(1)
            .map(|raw| self.split_department_path(raw))
            .unwrap_or_default();
        let department_label = match (faculty.is_empty(), department.is_empty()) {
            (false, false) => format!("{faculty} / {department}"),
            (false, true) => faculty.clone(),
            _ => department.clone(),
        };

        let email = row
            .select(&self.contact_cell)
            .next()
            .map(|cell| email_from(&self.email, &cell.text().collect::<String>()))
            .unwrap_or_default();

        let profile_url = row
            .select(&self.profile_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| resolve_url(base, href.trim()))
            .unwrap_or_default();

        let research_areas = self.research_areas(main);

        Some(ScrapedScholar {
            registry_id,
            full_name,
            title,
            institution: institution.to_string(),
            faculty,
            department,
            department_label,
            email,
            profile_url,
            research_areas,
        })
    }

    /// `"/UNIVERSITY/FACULTY/DEPARTMENT/..."` into (faculty, department).
    fn split_department_path(&self, raw: &str) -> (String, String) {
        let path = self.pr_suffix.replace(raw, "");
        let parts: Vec<&str> = path
            .trim()
            .trim_matches('/')
            .split('/')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let at = |i: usize| parts.get(i).map(|s| s.to_string()).unwrap_or_default();
        (at(1), at(2))
    }

    /// Badge labels, then `;`-separated keywords; blanks dropped and
    /// duplicates removed (case-sensitive, first occurrence kept).
    fn research_areas(&self, main: ElementRef) -> Vec<String> {
        let badges = main
            .select(&self.badges)
            .map(|b| clean_text(&b.text().collect::<String>()));

        let keywords: Vec<String> = main
            .select(&self.keywords)
            .next()
            .map(|span| {
                span.text()
                    .collect::<String>()
                    .split(';')
                    .map(clean_text)
                    .collect()
            })
            .unwrap_or_default();

        let mut areas: Vec<String> = Vec::new();
        for area in badges.chain(keywords) {
            if !area.is_empty() && !areas.contains(&area) {
                areas.push(area);
            }
        }
        areas
    }
}

/// Find an e-mail address written with `@` or `[at]`. Lower-cased; empty
/// when there is none.
pub fn extract_email(text: &str) -> String {
    Regex::new(EMAIL_PATTERN)
        .map(|re| email_from(&re, text))
        .unwrap_or_default()
}

fn email_from(re: &Regex, text: &str) -> String {
    re.captures(text)
        .map(|caps| format!("{}@{}", &caps[1], &caps[2]).to_lowercase())
        .unwrap_or_default()
}

fn first_text(scope: ElementRef, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
}
