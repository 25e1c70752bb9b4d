//! DOM extraction helpers shared by the HTML-backed site modules.
//!
//! Everything here is synchronous and borrows the parsed document only for
//! the duration of the call; site modules return owned strings so no parsed
//! DOM ever crosses an await point.

pub mod classify;
pub mod normalize;

use crate::error::ScrapeError;
use scraper::{ElementRef, Selector};

/// Compiles a CSS selector. A selector that fails to compile is a
/// configuration bug and fails the whole site run.
pub fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector(format!("{css}: {e}")))
}

/// Lenient variant for enrichment paths, where a bad selector degrades to
/// "field not found" instead of failing the run.
pub fn try_selector(css: &str) -> Option<Selector> {
    match selector(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::debug!("{}", e);
            None
        }
    }
}

/// Whether an element's class list contains `class` as a whole token.
pub fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element
        .value()
        .attr("class")
        .map(|list| list.split_whitespace().any(|token| token == class))
        .unwrap_or(false)
}

/// Text content of an element with whitespace collapsed, the way a browser
/// would display it.
pub fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapsed text of the first match under `parent`, or None when the
/// locator misses or the element is empty.
pub fn first_text(parent: ElementRef<'_>, sel: &Selector) -> Option<String> {
    let text = text_of(parent.select(sel).next()?);
    if text.is_empty() { None } else { Some(text) }
}

/// Attribute of the first match under `parent`.
pub fn first_attr(parent: ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    let value = parent.select(sel).next()?.value().attr(attr)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Image source of the first match, preferring the lazy-load attribute
/// sites put the real URL in over the `src` placeholder.
pub fn image_src(parent: ElementRef<'_>, sel: &Selector) -> Option<String> {
    let img = parent.select(sel).next()?;
    let value = img.value();
    value
        .attr("data-src")
        .or_else(|| value.attr("src"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolves an extracted `href`/`src` against the site's base URL.
/// Protocol-relative references get `https`; absolute URLs pass through.
pub fn absolute_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if href.starts_with("//") {
        return format!("https:{href}");
    }
    let base = base.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{base}{href}")
    } else {
        format!("{base}/{href}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const CARD: &str = r#"
        <li class="card">
          <h3 class="title">  Nintendo
            <span>Switch</span>  OLED </h3>
          <a class="link" href="/p/nintendo-switch-oled"></a>
          <img class="photo" src="placeholder.gif" data-src="//cdn.example.com/sw.jpg">
          <span class="empty">   </span>
        </li>"#;

    #[test]
    fn text_collapses_nested_whitespace() {
        let doc = Html::parse_document(CARD);
        let sel = selector("h3.title").unwrap();
        assert_eq!(
            first_text(doc.root_element(), &sel).unwrap(),
            "Nintendo Switch OLED"
        );
    }

    #[test]
    fn empty_text_counts_as_a_miss() {
        let doc = Html::parse_document(CARD);
        let sel = selector("span.empty").unwrap();
        assert_eq!(first_text(doc.root_element(), &sel), None);
    }

    #[test]
    fn image_prefers_lazy_load_attribute() {
        let doc = Html::parse_document(CARD);
        let sel = selector("img.photo").unwrap();
        assert_eq!(
            image_src(doc.root_element(), &sel).unwrap(),
            "//cdn.example.com/sw.jpg"
        );
    }

    #[test]
    fn href_attribute_is_read() {
        let doc = Html::parse_document(CARD);
        let sel = selector("a.link").unwrap();
        assert_eq!(
            first_attr(doc.root_element(), &sel, "href").unwrap(),
            "/p/nintendo-switch-oled"
        );
    }

    #[test]
    fn urls_resolve_against_the_base() {
        let base = "https://www.alkosto.com/";
        assert_eq!(
            absolute_url(base, "/videojuegos?page=2"),
            "https://www.alkosto.com/videojuegos?page=2"
        );
        assert_eq!(
            absolute_url(base, "//cdn.alkosto.com/x.jpg"),
            "https://cdn.alkosto.com/x.jpg"
        );
        assert_eq!(
            absolute_url(base, "https://other.example.com/x"),
            "https://other.example.com/x"
        );
        assert_eq!(
            absolute_url("https://www.olx.com.co", "item/ps4-iid-1"),
            "https://www.olx.com.co/item/ps4-iid-1"
        );
    }

    #[test]
    fn bad_selector_is_a_config_error() {
        assert!(matches!(selector("li[["), Err(ScrapeError::Selector(_))));
        assert!(try_selector("li[[").is_none());
    }

    #[test]
    fn class_tokens_match_whole_words() {
        let doc = Html::parse_document(
            r#"<ul><li class="page-item active-link"></li><li class="page-item active"></li></ul>"#,
        );
        let sel = selector("li").unwrap();
        let items: Vec<_> = doc.root_element().select(&sel).collect();
        assert!(!has_class(items[0], "active"));
        assert!(has_class(items[1], "active"));
    }
}
