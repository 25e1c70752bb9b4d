//! OLX Colombia. The listing is a single page that grows when its "load
//! more" button is clicked, so the whole site runs through the rendered
//! transport: the pipeline expands the listing to exhaustion, parses the
//! cards out of the final DOM, then visits each item page for the fields
//! the cards do not carry.

use super::SiteScraper;
use crate::config::{PaginationStrategy, Selectors, SiteConfig, Transport};
use crate::error::ScrapeError;
use crate::extract::{absolute_url, first_attr, first_text, image_src, selector, try_selector};
use crate::models::{ListingPage, RawItem, RawPrice, Site};
use scraper::Html;
use std::time::Duration;

static CONFIG: SiteConfig = SiteConfig {
    site: Site::Olx,
    base_url: "https://www.olx.com.co",
    listing_url: "https://www.olx.com.co/video-juegos-consolas_c1022",
    strategy: PaginationStrategy::LoadMore,
    transport: Transport::Rendered,
    selectors: Selectors {
        item: r#"li[data-aut-id="itemBox"]"#,
        title: r#"span[data-aut-id="itemTitle"]"#,
        price: r#"span[data-aut-id="itemPrice"]"#,
        link: "a",
        image: "figure img",
        pagination: None,
        load_more: Some(r#"button[data-aut-id="btnLoadMore"]"#),
        listing_ready: Some(r#"li[data-aut-id="itemBox"]"#),
        detail_ready: Some(r#"div[data-aut-id="itemDescriptionContent"]"#),
        detail_description: Some(r#"div[data-aut-id="itemDescriptionContent"]"#),
        detail_image: Some(r#"figure[data-aut-id="itemPhoto"] img"#),
    },
    page_size: 0,
    max_offset: 0,
    delay: Duration::from_millis(800),
    expects_identifier: false,
    accepts_json: false,
};

pub struct Olx;

impl SiteScraper for Olx {
    fn config(&self) -> &SiteConfig {
        &CONFIG
    }

    fn parse_listing(&self, body: &str, _page_url: &str) -> Result<ListingPage, ScrapeError> {
        let item_sel = selector(CONFIG.selectors.item)?;
        let title_sel = selector(CONFIG.selectors.title)?;
        let price_sel = selector(CONFIG.selectors.price)?;
        let link_sel = selector(CONFIG.selectors.link)?;
        let image_sel = selector(CONFIG.selectors.image)?;

        let doc = Html::parse_document(body);
        let root = doc.root_element();
        let mut items = Vec::new();
        for card in root.select(&item_sel) {
            let name = first_text(card, &title_sel);
            let price = first_text(card, &price_sel).map(RawPrice::Text);
            // Card anchors are relative paths.
            let url = first_attr(card, &link_sel, "href")
                .map(|href| absolute_url(CONFIG.base_url, &href));
            let image =
                image_src(card, &image_sel).map(|src| absolute_url(CONFIG.base_url, &src));
            let category_text = format!(
                "{} {}",
                url.as_deref().unwrap_or(""),
                name.as_deref().unwrap_or("")
            );
            items.push(RawItem {
                name,
                price,
                url,
                image,
                description: None,
                identifier: None,
                detail_key: None,
                category_text,
                secondary: Default::default(),
            });
        }
        Ok(ListingPage {
            items,
            next_url: None,
            reported_total: None,
        })
    }

    fn secondary_url(&self, item: &RawItem) -> Option<String> {
        // The item page itself; it is rendered like the listing.
        item.url.clone()
    }

    fn apply_secondary(&self, item: &mut RawItem, body: &str) {
        let doc = Html::parse_document(body);
        let root = doc.root_element();
        if let Some(css) = CONFIG.selectors.detail_description
            && let Some(sel) = try_selector(css)
            && let Some(text) = first_text(root, &sel)
        {
            item.description = Some(text);
        }
        if let Some(css) = CONFIG.selectors.detail_image
            && let Some(sel) = try_selector(css)
            && let Some(src) = image_src(root, &sel)
        {
            item.image = Some(absolute_url(CONFIG.base_url, &src));
        }
    }
}
