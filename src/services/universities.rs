// src/services/universities.rs

//! University list extraction.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::Result;
use crate::models::{RegistrySelectors, ScrapedUniversity, selectors};
use crate::utils::{clean_text, resolve_url};

/// Extract every university row that carries a department-listing link.
pub fn extract_universities(
    document: &Html,
    selectors: &RegistrySelectors,
    base: &Url,
) -> Result<Vec<ScrapedUniversity>> {
    let row_candidates = parse_all(&selectors.university_rows)?;
    let link_candidates = parse_all(&selectors.university_links)?;
    let cells = CellSelectors::new()?;

    let rows: Vec<ElementRef> = row_candidates
        .iter()
        .map(|sel| document.select(sel).collect::<Vec<_>>())
        .find(|rows| !rows.is_empty())
        .unwrap_or_default();

    let universities: Vec<ScrapedUniversity> = rows
        .into_iter()
        .filter_map(|row| parse_row(row, &link_candidates, &cells, base))
        .collect();

    log::debug!("Extracted {} universities", universities.len());
    Ok(universities)
}

/// Column selectors (1-based, as rendered).
struct CellSelectors {
    name: Selector,
    location: Selector,
    classification: Selector,
    year: Selector,
}

impl CellSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            name: selectors::parse("td:nth-child(1)")?,
            location: selectors::parse("td:nth-child(2)")?,
            classification: selectors::parse("td:nth-child(3)")?,
            year: selectors::parse("td:nth-child(4)")?,
        })
    }
}

fn parse_row(
    row: ElementRef,
    link_candidates: &[Selector],
    cells: &CellSelectors,
    base: &Url,
) -> Option<ScrapedUniversity> {
    let link = link_candidates
        .iter()
        .find_map(|sel| row.select(sel).next())?;
    let href = link.value().attr("href").unwrap_or_default().trim();
    if href.is_empty() {
        return None;
    }

    let name = cell_text(row, &cells.name);
    if name.is_empty() {
        return None;
    }

    Some(ScrapedUniversity {
        name,
        location: cell_text(row, &cells.location),
        classification: cell_text(row, &cells.classification),
        founded_year: cell_text(row, &cells.year).parse().unwrap_or(0),
        department_url: resolve_url(base, href),
    })
}

fn cell_text(row: ElementRef, selector: &Selector) -> String {
    row.select(selector)
        .next()
        .map(|cell| clean_text(&cell.text().collect::<String>()))
        .unwrap_or_default()
}

fn parse_all(candidates: &[String]) -> Result<Vec<Selector>> {
    candidates.iter().map(|css| selectors::parse(css)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://akademik.yok.gov.tr").unwrap()
    }

    const LIST: &str = r#"
        <table id="universiteListTable"><tbody>
          <tr>
            <td>ANKARA ÜNİVERSİTESİ</td>
            <td><a href="/AkademikArama/view/universityDetail.jsp?uniId=1">ANKARA</a></td>
            <td>Devlet</td>
            <td>1946</td>
          </tr>
          <tr>
            <td>  BİLKENT
                ÜNİVERSİTESİ </td>
            <td><a href="/AkademikArama/view/universityDetail.jsp?uniId=2">ANKARA</a></td>
            <td>Vakıf</td>
            <td>-</td>
          </tr>
          <tr>
            <td>NO LINK ÜNİVERSİTESİ</td>
            <td>İSTANBUL</td>
            <td>Devlet</td>
            <td>1990</td>
          </tr>
        </tbody></table>
    "#;

    #[test]
    fn test_extracts_rows_with_links() {
        let doc = Html::parse_document(LIST);
        let unis = extract_universities(&doc, &RegistrySelectors::default(), &base()).unwrap();

        assert_eq!(unis.len(), 2);
        assert_eq!(unis[0].name, "ANKARA ÜNİVERSİTESİ");
        assert_eq!(unis[0].location, "ANKARA");
        assert_eq!(unis[0].classification, "Devlet");
        assert_eq!(unis[0].founded_year, 1946);
        assert_eq!(
            unis[0].department_url,
            "https://akademik.yok.gov.tr/AkademikArama/view/universityDetail.jsp?uniId=1"
        );
    }

    #[test]
    fn test_non_numeric_year_and_whitespace() {
        let doc = Html::parse_document(LIST);
        let unis = extract_universities(&doc, &RegistrySelectors::default(), &base()).unwrap();
        assert_eq!(unis[1].name, "BİLKENT ÜNİVERSİTESİ");
        assert_eq!(unis[1].founded_year, 0);
    }

    #[test]
    fn test_falls_back_to_generic_table() {
        let html = r#"
            <table class="table"><tbody>
              <tr><td>HACETTEPE ÜNİVERSİTESİ</td><td>ANKARA</td><td>Devlet</td><td>1967</td>
                  <td><a href="/uni?id=3">Birimler</a></td></tr>
            </tbody></table>
        "#;
        let doc = Html::parse_document(html);
        let unis = extract_universities(&doc, &RegistrySelectors::default(), &base()).unwrap();

        assert_eq!(unis.len(), 1);
        assert_eq!(unis[0].department_url, "https://akademik.yok.gov.tr/uni?id=3");
    }

    #[test]
    fn test_empty_page() {
        let doc = Html::parse_document("<html><body><p>Bakım çalışması</p></body></html>");
        let unis = extract_universities(&doc, &RegistrySelectors::default(), &base()).unwrap();
        assert!(unis.is_empty());
    }
}
