//! Marker detection: does a fetched page still show the listing header?

use scraper::{Html, Selector};
use thiserror::Error;

pub const DEFAULT_SELECTOR: &str = "h2";
pub const DEFAULT_TEXT: &str = "Lista ofert";

/// Oracle consulted by the locator for every fetched page
pub trait MarkerPredicate: Send + Sync {
    fn has_marker(&self, content: &str) -> bool;
}

impl<F> MarkerPredicate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn has_marker(&self, content: &str) -> bool {
        self(content)
    }
}

#[derive(Debug, Error)]
#[error("invalid marker selector `{selector}`: {reason}")]
pub struct InvalidSelector {
    pub selector: String,
    pub reason: String,
}

/// Matches the first element selected by a CSS selector whose text contains a needle
#[derive(Debug, Clone)]
pub struct HeaderMarker {
    selector: Selector,
    text: String,
}

impl HeaderMarker {
    pub fn new(selector: &str, text: &str) -> Result<Self, InvalidSelector> {
        let parsed = Selector::parse(selector).map_err(|e| InvalidSelector {
            selector: selector.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            selector: parsed,
            text: text.to_string(),
        })
    }

    /// Text of the first matching element, if any
    pub fn find(&self, doc: &Html) -> Option<String> {
        doc.select(&self.selector)
            .map(|el| el.text().collect::<String>())
            .find(|text| text.contains(&self.text))
            .map(|text| text.trim().to_string())
    }
}

impl Default for HeaderMarker {
    fn default() -> Self {
        Self {
            selector: Selector::parse(DEFAULT_SELECTOR).unwrap(),
            text: DEFAULT_TEXT.to_string(),
        }
    }
}

impl MarkerPredicate for HeaderMarker {
    fn has_marker(&self, content: &str) -> bool {
        let doc = Html::parse_document(content);
        self.find(&doc).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_PAGE: &str = r#"
        <html>
        <head><title>Laptopy - Allegro</title></head>
        <body>
            <h2>Oferty promowane</h2>
            <section>
                <h2 class="header">  Lista ofert  </h2>
                <article>ThinkPad T480</article>
            </section>
        </body>
        </html>
    "#;

    const EMPTY_PAGE: &str = r#"
        <html>
        <body>
            <h2>Oferty promowane</h2>
            <p>Lista ofert jest pusta</p>
        </body>
        </html>
    "#;

    #[test]
    fn test_default_marker() {
        let marker = HeaderMarker::default();
        assert!(marker.has_marker(LISTING_PAGE));
        assert!(!marker.has_marker(EMPTY_PAGE));
        assert!(!marker.has_marker(""));
    }

    #[test]
    fn test_find_returns_trimmed_text() {
        let marker = HeaderMarker::default();
        let doc = Html::parse_document(LISTING_PAGE);
        assert_eq!(marker.find(&doc), Some("Lista ofert".to_string()));
    }

    #[test]
    fn test_custom_selector() {
        let marker = HeaderMarker::new("p", "Lista ofert").unwrap();
        assert!(marker.has_marker(EMPTY_PAGE));

        let marker = HeaderMarker::new("section > h2.header", "Lista").unwrap();
        assert!(marker.has_marker(LISTING_PAGE));
        assert!(!marker.has_marker(EMPTY_PAGE));
    }

    #[test]
    fn test_invalid_selector() {
        let err = HeaderMarker::new("h2[", "x").unwrap_err();
        assert_eq!(err.selector, "h2[");
    }

    #[test]
    fn test_closure_predicate() {
        let marker = |content: &str| content.contains("results");
        assert!(marker.has_marker("3 results"));
        assert!(!marker.has_marker("nothing"));
    }
}
