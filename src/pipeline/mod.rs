//! Site run orchestration.
//!
//! One generic pipeline drives every site. The site's descriptor picks the
//! enumeration loop and the transport; the site's scraper contributes URL
//! building and parsing. Everything else here is shared: pacing, the
//! secondary round, assembly, per-page export, then catalog and store
//! accounting over the finished run.

pub mod assemble;
pub mod enumerate;

use crate::catalog::Catalog;
use crate::config::{PaginationStrategy, Settings, SiteConfig, Transport};
use crate::error::ScrapeError;
use crate::export::Exporter;
use crate::fetch::render::{expand_listing, RenderedSession};
use crate::fetch::{pause, HttpFetcher, PageFetcher};
use crate::models::{Batch, ListingPage, RawItem, RunSummary, SecondaryOutcome, Site};
use crate::sites::{scraper_for, SiteScraper};
use crate::store::StoreClient;
use assemble::{assemble_batch, BatchOutcome};
use chrono::Utc;
use enumerate::{offsets, LinkFrontier};
use tracing::{debug, error, info, warn};

/// Upper bound on linked pages per run, in case a site's pagination cycles
/// through URLs the frontier cannot recognize as revisits.
const MAX_LINKED_PAGES: usize = 50;

struct DriveOutcome {
    batches: Vec<Batch>,
    pages: usize,
    dropped: usize,
}

/// Owns the run-independent pieces (settings, catalog, store client) and
/// runs sites one at a time.
pub struct SiteRunner {
    settings: Settings,
    catalog: Option<Catalog>,
    store: Option<StoreClient>,
}

impl SiteRunner {
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let catalog = if settings.catalog_enabled {
            Some(Catalog::open(&settings.database_url).await?)
        } else {
            None
        };
        let store = match (&settings.store_api_url, settings.forward) {
            (Some(url), true) => Some(StoreClient::new(url, settings.verbose)?),
            (None, true) => {
                warn!("forwarding requested but no store API URL is configured");
                None
            }
            _ => None,
        };
        Ok(Self {
            settings,
            catalog,
            store,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs one site end to end over the production transport.
    pub async fn run(&self, site: Site) -> Result<RunSummary, ScrapeError> {
        let mut scraper = scraper_for(site);
        let fetcher = HttpFetcher::new(scraper.config().accepts_json, self.settings.verbose)
            .map_err(|e| ScrapeError::Config(format!("http client: {e}")))?;
        self.run_with(scraper.as_mut(), &fetcher).await
    }

    /// Runs one site against an injected plain transport: lookups, then
    /// enumeration, extraction, the secondary round, assembly and export
    /// page by page, then catalog and store accounting over the whole run.
    pub async fn run_with(
        &self,
        scraper: &mut dyn SiteScraper,
        fetcher: &dyn PageFetcher,
    ) -> Result<RunSummary, ScrapeError> {
        let config = *scraper.config();
        let started_at = Utc::now();
        info!(
            "starting {} ({:?} pagination, {:?} transport)",
            config.site, config.strategy, config.transport
        );

        // Entity id lookups, round by round, before anything is enumerated.
        while let Some(urls) = scraper.pending_lookup() {
            let bodies = fetcher.fetch_batch(&urls).await;
            scraper.resolve_lookup(&bodies)?;
        }

        // Shard sink first; an unwritable export directory should fail
        // before a browser is ever launched.
        let mut exporter = Exporter::new(&self.settings.export_dir, config.site)?;
        let session = match config.transport {
            Transport::Rendered => Some(RenderedSession::launch().await?),
            Transport::Plain => None,
        };
        let outcome = self
            .drive(&*scraper, fetcher, session.as_ref(), &config, &mut exporter)
            .await;
        // The browser dies with the run, success or not.
        if let Some(session) = session {
            session.close().await;
        }
        let DriveOutcome {
            batches,
            pages,
            dropped,
        } = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                let written = exporter.written();
                if !written.is_empty() {
                    warn!(
                        "{} run failed with {} shard(s) already written: {:?}",
                        config.site,
                        written.len(),
                        written
                    );
                }
                return Err(e);
            }
        };

        let scraped = batches.iter().map(Batch::len).sum();
        let new_items = match &self.catalog {
            Some(catalog) => Some(catalog.record_batches(&batches).await?),
            None => None,
        };
        let forwarded = match &self.store {
            Some(store) => store.forward(config.site, &batches).await,
            None => false,
        };

        let summary = RunSummary {
            site: config.site,
            started_at,
            pages,
            scraped,
            dropped,
            shards: exporter.into_written(),
            new_items,
            forwarded,
        };
        info!(
            "{} finished: {} pages, {} records kept, {} dropped, {} shards",
            summary.site,
            summary.pages,
            summary.scraped,
            summary.dropped,
            summary.shards.len()
        );
        Ok(summary)
    }

    async fn drive(
        &self,
        scraper: &dyn SiteScraper,
        fetcher: &dyn PageFetcher,
        session: Option<&RenderedSession>,
        config: &SiteConfig,
        exporter: &mut Exporter,
    ) -> Result<DriveOutcome, ScrapeError> {
        let mut batches = Vec::new();
        let mut pages = 0usize;
        let mut dropped = 0usize;
        let mut kept = 0usize;

        match config.strategy {
            PaginationStrategy::Offset => {
                for offset in offsets(config.page_size, config.max_offset) {
                    if self.page_cap_reached(pages) || self.item_cap_reached(kept) {
                        break;
                    }
                    if pages > 0 {
                        pause(config.delay).await;
                    }
                    let url = scraper.page_url(offset);
                    let listing = match self.fetch_listing(fetcher, session, config, &url).await
                    {
                        Some(body) => scraper.parse_listing(&body, &url)?,
                        None => {
                            warn!(
                                "{} page at offset {} unavailable, recording an empty shard",
                                config.site, offset
                            );
                            ListingPage::default()
                        }
                    };
                    if pages == 0
                        && let Some(total) = listing.reported_total
                    {
                        info!("{} reports {} total results", config.site, total);
                    }
                    let outcome = self
                        .settle_page(
                            scraper,
                            fetcher,
                            session,
                            config,
                            self.item_allowance(kept),
                            listing.items,
                        )
                        .await;
                    exporter.write(&outcome.batch)?;
                    dropped += outcome.dropped;
                    kept += outcome.batch.len();
                    batches.push(outcome.batch);
                    pages += 1;
                }
            }
            PaginationStrategy::NextLink => {
                let mut frontier = LinkFrontier::seeded(config.listing_url);
                while let Some(url) = frontier.next() {
                    if pages >= MAX_LINKED_PAGES
                        || self.page_cap_reached(pages)
                        || self.item_cap_reached(kept)
                    {
                        break;
                    }
                    if pages > 0 {
                        pause(config.delay).await;
                    }
                    let Some(body) = self.fetch_listing(fetcher, session, config, &url).await
                    else {
                        warn!("{} page {} unavailable, ending pagination", config.site, url);
                        break;
                    };
                    let ListingPage {
                        items, next_url, ..
                    } = scraper.parse_listing(&body, &url)?;
                    let exhausted = items.is_empty();
                    let outcome = self
                        .settle_page(
                            scraper,
                            fetcher,
                            session,
                            config,
                            self.item_allowance(kept),
                            items,
                        )
                        .await;
                    exporter.write(&outcome.batch)?;
                    dropped += outcome.dropped;
                    kept += outcome.batch.len();
                    batches.push(outcome.batch);
                    pages += 1;
                    if exhausted {
                        info!("{} page {} had no items, ending pagination", config.site, url);
                        break;
                    }
                    match next_url {
                        Some(next) => {
                            if !frontier.push(next.clone()) {
                                info!(
                                    "{} pagination looped back to {}, ending",
                                    config.site, next
                                );
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
            PaginationStrategy::LoadMore => {
                let Some(session) = session else {
                    return Err(ScrapeError::Config(format!(
                        "{} uses interactive expansion and needs the rendered transport",
                        config.site
                    )));
                };
                let dom = expand_listing(session, config).await?;
                let listing = scraper.parse_listing(&dom, config.listing_url)?;
                info!(
                    "{} expanded listing holds {} items",
                    config.site,
                    listing.items.len()
                );
                let outcome = self
                    .settle_page(
                        scraper,
                        fetcher,
                        Some(session),
                        config,
                        self.item_allowance(kept),
                        listing.items,
                    )
                    .await;
                exporter.write(&outcome.batch)?;
                dropped += outcome.dropped;
                batches.push(outcome.batch);
                pages = 1;
            }
        }

        Ok(DriveOutcome {
            batches,
            pages,
            dropped,
        })
    }

    /// Fetches one listing body over the transport the descriptor names.
    async fn fetch_listing(
        &self,
        fetcher: &dyn PageFetcher,
        session: Option<&RenderedSession>,
        config: &SiteConfig,
        url: &str,
    ) -> Option<String> {
        match (config.transport, session) {
            (Transport::Plain, _) => fetcher.fetch(url).await,
            (Transport::Rendered, Some(session)) => {
                session.visit(url, config.selectors.listing_ready).await
            }
            (Transport::Rendered, None) => {
                error!("{} is rendered but no session is open", config.site);
                None
            }
        }
    }

    /// Completes one page's items: trims to the run's remaining allowance,
    /// runs the secondary round the site asks for, then assembles the batch.
    async fn settle_page(
        &self,
        scraper: &dyn SiteScraper,
        fetcher: &dyn PageFetcher,
        session: Option<&RenderedSession>,
        config: &SiteConfig,
        allowance: Option<usize>,
        mut items: Vec<RawItem>,
    ) -> BatchOutcome {
        if let Some(cap) = allowance
            && items.len() > cap
        {
            debug!("keeping {} of {} items on this page", cap, items.len());
            items.truncate(cap);
        }

        let targets: Vec<Option<String>> =
            items.iter().map(|item| scraper.secondary_url(item)).collect();
        if targets.iter().any(Option::is_some) {
            pause(config.delay).await;
            match config.transport {
                Transport::Plain => {
                    let mut slots = Vec::new();
                    let mut urls = Vec::new();
                    for (slot, target) in targets.iter().enumerate() {
                        if let Some(url) = target {
                            slots.push(slot);
                            urls.push(url.clone());
                        }
                    }
                    // One concurrent fan-out for the whole page; results
                    // come back aligned with the request order.
                    let bodies = fetcher.fetch_batch(&urls).await;
                    for (slot, body) in slots.into_iter().zip(bodies) {
                        fold_secondary(scraper, &mut items[slot], body);
                    }
                }
                Transport::Rendered => {
                    // The single page is shared, so item visits are
                    // sequential with the same pacing as page boundaries.
                    let mut first = true;
                    for (slot, target) in targets.iter().enumerate() {
                        let Some(url) = target else { continue };
                        if !first {
                            pause(config.delay).await;
                        }
                        first = false;
                        let body = match session {
                            Some(session) => {
                                session.visit(url, config.selectors.detail_ready).await
                            }
                            None => None,
                        };
                        fold_secondary(scraper, &mut items[slot], body);
                    }
                }
            }
        }

        assemble_batch(config, items)
    }

    fn page_cap_reached(&self, pages: usize) -> bool {
        match self.settings.max_pages {
            Some(cap) if pages >= cap => {
                info!("page cap of {} reached", cap);
                true
            }
            _ => false,
        }
    }

    fn item_cap_reached(&self, kept: usize) -> bool {
        match self.settings.max_items {
            Some(cap) if kept >= cap => {
                info!("item cap of {} reached", cap);
                true
            }
            _ => false,
        }
    }

    /// How many more records this run may keep, if an item cap is set.
    fn item_allowance(&self, kept: usize) -> Option<usize> {
        self.settings
            .max_items
            .map(|cap| cap.saturating_sub(kept))
    }
}

fn fold_secondary(scraper: &dyn SiteScraper, item: &mut RawItem, body: Option<String>) {
    match body {
        Some(body) => {
            scraper.apply_secondary(item, &body);
            item.secondary = SecondaryOutcome::Fetched;
        }
        None => {
            item.secondary = SecondaryOutcome::Failed;
        }
    }
}

impl Clone for SiteRunner {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            catalog: self.catalog.clone(),
            store: self.store.clone(),
        }
    }
}
