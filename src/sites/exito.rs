//! Exito's console storefront. The listing is script-rendered and paged by
//! a `page` query parameter, so the run maps each item offset to a page
//! number and visits them through the browser session. Cards carry every
//! field this site contributes; there is no secondary fetch, descriptions
//! fall back at assembly.

use super::SiteScraper;
use crate::config::{expand, PaginationStrategy, Selectors, SiteConfig, Transport};
use crate::error::ScrapeError;
use crate::extract::{absolute_url, first_attr, first_text, image_src, selector};
use crate::models::{ListingPage, RawItem, RawPrice, Site};
use scraper::Html;
use std::time::Duration;

static CONFIG: SiteConfig = SiteConfig {
    site: Site::Exito,
    base_url: "https://www.exito.com",
    listing_url: "https://www.exito.com/tecnologia/consolas-de-videojuegos?page=$PAGE",
    strategy: PaginationStrategy::Offset,
    transport: Transport::Rendered,
    selectors: Selectors {
        item: r#"article[data-testid="store-product-card"]"#,
        title: r#"h3[data-testid="product-name"]"#,
        price: r#"p[data-testid="product-price"]"#,
        link: "a",
        image: "img",
        pagination: None,
        load_more: None,
        listing_ready: Some(r#"article[data-testid="store-product-card"]"#),
        detail_ready: None,
        detail_description: None,
        detail_image: None,
    },
    page_size: 16,
    max_offset: 64,
    delay: Duration::from_millis(700),
    expects_identifier: false,
    accepts_json: false,
};

pub struct Exito;

impl SiteScraper for Exito {
    fn config(&self) -> &SiteConfig {
        &CONFIG
    }

    /// Offsets count items; the site counts pages from one.
    fn page_url(&self, offset: u32) -> String {
        let page = (offset / CONFIG.page_size.max(1)) + 1;
        let page = page.to_string();
        expand(CONFIG.listing_url, &[("$PAGE", page.as_str())])
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
}
