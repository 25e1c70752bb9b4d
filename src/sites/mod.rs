//! Site modules and the contract between them and the pipeline.
//!
//! The control flow for fetching, pacing, assembling and exporting lives in
//! one place, the pipeline. A site contributes data and parsing only: its
//! [`SiteConfig`] descriptor says which loop to run, and its `SiteScraper`
//! impl turns fetched bodies into [`RawItem`]s. Parsing methods are
//! synchronous on purpose; they borrow a body, parse it, and hand back
//! owned values, so no parsed document is ever held across an await.

pub mod alkosto;
pub mod exito;
pub mod mercadolibre;
pub mod olx;

use crate::config::{expand, SiteConfig};
use crate::error::ScrapeError;
use crate::models::{ListingPage, RawItem, Site};

pub trait SiteScraper: Send + Sync {
    /// The immutable descriptor driving this site's run.
    fn config(&self) -> &SiteConfig;

    /// URLs that must be fetched and resolved before enumeration can start,
    /// for sites whose listing URL depends on looked-up entity ids. The
    /// pipeline fetches each round and calls [`SiteScraper::resolve_lookup`]
    /// until no round is pending.
    fn pending_lookup(&self) -> Option<Vec<String>> {
        None
    }

    /// Absorbs one lookup round. Failing to resolve is fatal for the run;
    /// there is nothing sensible to enumerate without the ids.
    fn resolve_lookup(&mut self, _bodies: &[Option<String>]) -> Result<(), ScrapeError> {
        Ok(())
    }

    /// Listing URL for one offset, for offset-paginated sites.
    fn page_url(&self, offset: u32) -> String {
        let offset = offset.to_string();
        expand(self.config().listing_url, &[("$OFFSET", offset.as_str())])
    }

    /// Extracts the items and pagination hints from one listing body. The
    /// body may be HTML or JSON; the site knows which.
    fn parse_listing(&self, body: &str, page_url: &str) -> Result<ListingPage, ScrapeError>;

    /// Secondary request that completes this item, if the site needs one.
    fn secondary_url(&self, _item: &RawItem) -> Option<String> {
        None
    }

    /// Folds a fetched secondary body into the item. Only optional fields
    /// may be filled leniently here; locator misses leave them unset and
    /// the assembler applies its fallback policy.
    fn apply_secondary(&self, _item: &mut RawItem, _body: &str) {}
}

/// Builds the scraper for a site.
pub fn scraper_for(site: Site) -> Box<dyn SiteScraper> {
    match site {
        Site::MercadoLibre => Box::new(mercadolibre::MercadoLibre::new()),
        Site::Olx => Box::new(olx::Olx),
        Site::Alkosto => Box::new(alkosto::Alkosto),
        Site::Exito => Box::new(exito::Exito),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PaginationStrategy, Transport};

    #[test]
    fn every_site_has_a_scraper() {
        for site in Site::all() {
            let scraper = scraper_for(site);
            assert_eq!(scraper.config().site, site);
            assert!(!scraper.config().listing_url.is_empty());
        }
    }

    #[test]
    fn descriptors_pair_strategies_with_transports() {
        let strategies: Vec<(PaginationStrategy, Transport)> = Site::all()
            .iter()
            .map(|site| {
                let config = *scraper_for(*site).config();
                (config.strategy, config.transport)
            })
            .collect();
        assert!(strategies.contains(&(PaginationStrategy::Offset, Transport::Plain)));
        assert!(strategies.contains(&(PaginationStrategy::LoadMore, Transport::Rendered)));
        assert!(strategies.contains(&(PaginationStrategy::NextLink, Transport::Plain)));
        assert!(strategies.contains(&(PaginationStrategy::Offset, Transport::Rendered)));
    }
}
