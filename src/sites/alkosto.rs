//! Alkosto's console catalog: plain HTML pages chained by "next" links.
//!
//! Pagination stops when the last entry of the pagination control is the
//! active one; until then the entry after the active one links the next
//! page. Cards carry the EAN barcode in a data attribute, which becomes
//! the item identifier. Detail pages contribute the description and a
//! full-size image.

use super::SiteScraper;
use crate::config::{PaginationStrategy, Selectors, SiteConfig, Transport};
use crate::error::ScrapeError;
use crate::extract::{
    absolute_url, first_attr, first_text, has_class, image_src, selector, try_selector,
};
use crate::models::{ListingPage, RawItem, RawPrice, Site};
use scraper::{ElementRef, Html};
use std::time::Duration;

/// Card attribute holding the 13-digit EAN barcode.
const EAN_ATTR: &str = "data-ean";

static CONFIG: SiteConfig = SiteConfig {
    site: Site::Alkosto,
    base_url: "https://www.alkosto.com",
    listing_url: "https://www.alkosto.com/videojuegos/c/BI_VIJU",
    strategy: PaginationStrategy::NextLink,
    transport: Transport::Plain,
    selectors: Selectors {
        item: "li.product__item",
        title: "h3.product__item__top__title",
        price: "span.price",
        link: "a.product__item__top__link",
        image: "img.product__item__information__image",
        pagination: Some("ul.pagination li.page-item"),
        load_more: None,
        listing_ready: None,
        detail_ready: None,
        detail_description: Some("div.product-details__description"),
        detail_image: Some("div.product-details__gallery img"),
    },
    page_size: 0,
    max_offset: 0,
    delay: Duration::from_millis(600),
    expects_identifier: true,
    accepts_json: false,
};

pub struct Alkosto;

/// Next page linked from the pagination control, if the current page is not
/// the last one.
fn next_page(root: ElementRef<'_>) -> Result<Option<String>, ScrapeError> {
    let Some(css) = CONFIG.selectors.pagination else {
        return Ok(None);
    };
    let entry_sel = selector(css)?;
    let anchor_sel = selector("a")?;
    let entries: Vec<ElementRef<'_>> = root.select(&entry_sel).collect();
    let Some(last) = entries.last() else {
        return Ok(None);
    };
    if has_class(*last, "active") {
        return Ok(None);
    }
    let Some(active) = entries.iter().position(|entry| has_class(*entry, "active")) else {
        return Ok(None);
    };
    let Some(next) = entries.get(active + 1) else {
        return Ok(None);
    };
    Ok(first_attr(*next, &anchor_sel, "href").map(|href| absolute_url(CONFIG.base_url, &href)))
}

impl SiteScraper for Alkosto {
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
            let url = first_attr(card, &link_sel, "href")
                .map(|href| absolute_url(CONFIG.base_url, &href));
            let image =
                image_src(card, &image_sel).map(|src| absolute_url(CONFIG.base_url, &src));
            let identifier = card
                .value()
                .attr(EAN_ATTR)
                .map(|ean| ean.trim().to_string())
                .filter(|ean| !ean.is_empty());
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
                identifier,
                detail_key: None,
                category_text,
                secondary: Default::default(),
            });
        }
        let next_url = next_page(root)?;
        Ok(ListingPage {
            items,
            next_url,
            reported_total: None,
        })
    }

    fn secondary_url(&self, item: &RawItem) -> Option<String> {
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
