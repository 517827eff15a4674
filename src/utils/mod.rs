//! Utility functions and helpers.

pub mod cache;
pub mod cancel;
pub mod log;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when the string is empty after trimming.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://akademik.yok.gov.tr").unwrap();
        assert_eq!(
            resolve_url(&base, "/AkademikArama/view/searchResultviewListAuthor.jsp?birim=1"),
            "https://akademik.yok.gov.tr/AkademikArama/view/searchResultviewListAuthor.jsp?birim=1"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Ankara \n\t Üniversitesi  "), "Ankara Üniversitesi");
        assert_eq!(clean_text("   "), "");
    }
}
