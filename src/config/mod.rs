//! Run settings and per-site capability descriptors.
//!
//! A site is described by data, not by a subclass: its [`SiteConfig`] names
//! the pagination strategy, the transport, the CSS locators and the pacing.
//! The pipeline reads the descriptor and drives the matching loop. Descriptor
//! values are fixed at startup; nothing mutates them during a run.

use crate::models::Site;
use std::path::PathBuf;
use std::time::Duration;

/// How a site exposes further result pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStrategy {
    /// Numeric offset (or page number) baked into the listing URL.
    Offset,
    /// Each page links to the next one; follow until the marker says stop.
    NextLink,
    /// One listing that grows in place when a "load more" control is clicked.
    LoadMore,
}

/// How pages must be obtained before extraction can see them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Plain HTTP body, fetched concurrently where batching applies.
    Plain,
    /// Headless browser session; the DOM only exists after scripts run.
    Rendered,
}

/// CSS locators for one site. Card fields address the listing page; the
/// `detail_*` entries address the item page a secondary fetch returns.
/// API-backed sites leave everything empty and parse JSON instead.
#[derive(Debug, Clone, Copy)]
pub struct Selectors {
    pub item: &'static str,
    pub title: &'static str,
    pub price: &'static str,
    pub link: &'static str,
    pub image: &'static str,
    /// Pagination control list, for next-link sites.
    pub pagination: Option<&'static str>,
    /// The "load more" button, for interactive listings.
    pub load_more: Option<&'static str>,
    /// Element whose presence means the rendered listing is ready.
    pub listing_ready: Option<&'static str>,
    /// Element whose presence means a rendered item page is ready.
    pub detail_ready: Option<&'static str>,
    pub detail_description: Option<&'static str>,
    pub detail_image: Option<&'static str>,
}

impl Selectors {
    /// Placeholder for API transports that never touch the DOM.
    pub const fn api() -> Self {
        Self {
            item: "",
            title: "",
            price: "",
            link: "",
            image: "",
            pagination: None,
            load_more: None,
            listing_ready: None,
            detail_ready: None,
            detail_description: None,
            detail_image: None,
        }
    }
}

/// Immutable description of one site: everything the generic pipeline needs
/// to enumerate, fetch and extract it.
#[derive(Debug, Clone, Copy)]
pub struct SiteConfig {
    pub site: Site,
    pub base_url: &'static str,
    /// Listing entry point. Offset sites embed `$OFFSET` (or `$PAGE`) here.
    pub listing_url: &'static str,
    pub strategy: PaginationStrategy,
    pub transport: Transport,
    pub selectors: Selectors,
    /// Items per page, for offset arithmetic.
    pub page_size: u32,
    /// Highest offset the run will request; the ceiling page is included.
    pub max_offset: u32,
    /// Pause between page boundaries and secondary rounds. A floor, never
    /// shortened by retries or load.
    pub delay: Duration,
    /// Whether this site defines a per-item identifier. When it does, an
    /// item without a parseable one is dropped.
    pub expects_identifier: bool,
    /// Send and expect JSON bodies instead of a browser-like exchange.
    pub accepts_json: bool,
}

/// Replaces `$NAME` markers in a URL template.
///
/// Markers are literal, not positional, so call sites stay readable:
/// `expand("https://api.example.com/sites/$SITE_ID/search?offset=$OFFSET",
/// &[("$SITE_ID", "MCO"), ("$OFFSET", "50")])`.
pub fn expand(template: &str, vars: &[(&str, &str)]) -> String {
    let mut url = template.to_string();
    for (marker, value) in vars {
        url = url.replace(marker, value);
    }
    url
}

/// Process-level settings, from the environment with CLI overrides applied
/// by the caller. Site descriptors never live here.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory the export sink writes shards into.
    pub export_dir: PathBuf,
    /// SQLite catalog location, `sqlite:` URL form.
    pub database_url: String,
    /// Store API root, e.g. `http://localhost:8000/api`. None disables
    /// forwarding regardless of the CLI flag.
    pub store_api_url: Option<String>,
    pub verbose: bool,
    /// Forward assembled batches to the store after export.
    pub forward: bool,
    /// Record scraped items in the local catalog for cross-run accounting.
    pub catalog_enabled: bool,
    /// Optional cap on pages visited per site, applied before the fetch.
    pub max_pages: Option<usize>,
    /// Optional cap on records kept over the whole run.
    pub max_items: Option<usize>,
}

impl Settings {
    pub fn from_env() -> Self {
        let export_dir = std::env::var("EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("export"));
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:data/catalog.db".to_string());
        let store_api_url = std::env::var("STORE_API_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        Self {
            export_dir,
            database_url,
            store_api_url,
            verbose: false,
            forward: false,
            catalog_enabled: true,
            max_pages: None,
            max_items: None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("export"),
            database_url: "sqlite:data/catalog.db".to_string(),
            store_api_url: None,
            verbose: false,
            forward: false,
            catalog_enabled: true,
            max_pages: None,
            max_items: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_replaces_every_marker() {
        let url = expand(
            "https://api.example.com/sites/$SITE_ID/search?category=$CATEGORY_ID&offset=$OFFSET",
            &[
                ("$SITE_ID", "MCO"),
                ("$CATEGORY_ID", "MCO1144"),
                ("$OFFSET", "100"),
            ],
        );
        assert_eq!(
            url,
            "https://api.example.com/sites/MCO/search?category=MCO1144&offset=100"
        );
    }

    #[test]
    fn expand_leaves_unknown_markers_alone() {
        let url = expand("https://example.com/?page=$PAGE", &[("$OFFSET", "10")]);
        assert_eq!(url, "https://example.com/?page=$PAGE");
    }

    #[test]
    fn settings_default_to_local_paths() {
        let settings = Settings::default();
        assert_eq!(settings.export_dir, PathBuf::from("export"));
        assert!(settings.database_url.starts_with("sqlite:"));
        assert!(settings.store_api_url.is_none());
        assert!(!settings.forward);
    }
}
