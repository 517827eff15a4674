// src/services/departments.rs

//! Department list extraction and name canonicalization.
//!
//! Registry link text often repeats the Turkish name, or appends the English
//! unit name ("Tıp Fakültesi FACULTY OF MEDICINE"). The canonical name keeps
//! the first rendition only.

use scraper::Html;
use unicode_segmentation::UnicodeSegmentation;
use url::Url;

use crate::error::Result;
use crate::models::{RegistrySelectors, ScrapedDepartment, selectors};
use crate::utils::{clean_text, resolve_url};

/// English unit words marking where the translated name begins.
const ENGLISH_UNIT_MARKERS: [&str; 7] = [
    "INSTITUTE",
    "FACULTY",
    "DEPARTMENT",
    "SCHOOL",
    "COLLEGE",
    "CENTER",
    "RECTORATE",
];

/// Extract every department anchor on a university page.
pub fn extract_departments(
    document: &Html,
    selectors: &RegistrySelectors,
    base: &Url,
) -> Result<Vec<ScrapedDepartment>> {
    let anchor = selectors::parse(&selectors.department_links())?;

    let departments: Vec<ScrapedDepartment> = document
        .select(&anchor)
        .filter_map(|link| {
            let href = link.value().attr("href")?.trim();
            let full_name = clean_text(&link.text().collect::<String>());
            if href.is_empty() || full_name.is_empty() {
                return None;
            }
            Some(ScrapedDepartment {
                name: clean_department_name(&full_name),
                full_name,
                url: resolve_url(base, href),
            })
        })
        .collect();

    log::debug!("Extracted {} departments", departments.len());
    Ok(departments)
}

/// Canonical short name of a department link text.
pub fn clean_department_name(full_name: &str) -> String {
    let trimmed = strip_pr_suffix(full_name.trim());

    let cut = ENGLISH_UNIT_MARKERS
        .iter()
        .filter_map(|marker| trimmed.find(marker))
        .min()
        .unwrap_or(trimmed.len());
    let text = trimmed[..cut].trim();

    // "XY XY" rendered as one run of characters.
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    let len = graphemes.len();
    if len >= 4 && len % 2 == 0 && graphemes[..len / 2] == graphemes[len / 2..] {
        return graphemes[..len / 2].concat().trim().to_string();
    }

    // Same, with differing whitespace between the copies.
    let words: Vec<&str> = text.split_whitespace().collect();
    let mid = words.len() / 2;
    if words.len() >= 4 && words[..mid] == words[mid..] {
        return words[..mid].join(" ");
    }

    if text.is_empty() {
        full_name.trim().to_string()
    } else {
        text.to_string()
    }
}

/// Drop a trailing "PR." marker the registry appends to some units.
fn strip_pr_suffix(text: &str) -> &str {
    text.strip_suffix("PR.")
        .map(str::trim_end)
        .unwrap_or(text)
}
