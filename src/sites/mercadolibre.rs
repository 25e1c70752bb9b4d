//! Mercado Libre, through its public JSON API.
//!
//! The search endpoint is only addressable once two ids are known: the
//! country's site id and the console category id within that site. Both are
//! resolved by name at the start of every run, then search pages are plain
//! offset-paginated JSON. Descriptions live behind one more endpoint per
//! item, fetched as the page's secondary round.

use super::SiteScraper;
use crate::config::{expand, PaginationStrategy, Selectors, SiteConfig, Transport};
use crate::error::ScrapeError;
use crate::models::{ListingPage, RawItem, Site};
use crate::store::{find_containing, find_exact};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

const SITES_URL: &str = "https://api.mercadolibre.com/sites";
const CATEGORIES_URL: &str = "https://api.mercadolibre.com/sites/$SITE_ID/categories";
const SEARCH_URL: &str =
    "https://api.mercadolibre.com/sites/$SITE_ID/search?category=$CATEGORY_ID&offset=$OFFSET&limit=$LIMIT";
const DESCRIPTION_URL: &str = "https://api.mercadolibre.com/items/$ITEM_ID/description";

const COUNTRY_NAME: &str = "Colombia";
const CATEGORY_NAME: &str = "Consolas y Videojuegos";
/// Site id the country lookup resolves to in practice.
const DEFAULT_SITE_ID: &str = "MCO";

static CONFIG: SiteConfig = SiteConfig {
    site: Site::MercadoLibre,
    base_url: "https://api.mercadolibre.com",
    listing_url: SEARCH_URL,
    strategy: PaginationStrategy::Offset,
    transport: Transport::Plain,
    selectors: Selectors::api(),
    page_size: 50,
    max_offset: 1000,
    delay: Duration::from_millis(500),
    expects_identifier: true,
    accepts_json: true,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Country,
    Category,
    Ready,
}

pub struct MercadoLibre {
    lookup: Lookup,
    site_id: Option<String>,
    category_id: Option<String>,
}

impl MercadoLibre {
    pub fn new() -> Self {
        Self {
            lookup: Lookup::Country,
            site_id: None,
            category_id: None,
        }
    }

    fn resolve_country(&mut self, body: &str) -> Result<(), ScrapeError> {
        let sites: Value = serde_json::from_str(body)
            .map_err(|e| ScrapeError::Resolution(format!("sites payload: {e}")))?;
        let sites = sites
            .as_array()
            .ok_or_else(|| ScrapeError::Resolution("sites payload is not an array".into()))?;
        let country = find_exact(sites, "name", COUNTRY_NAME).ok_or_else(|| {
            ScrapeError::Resolution(format!("no site named {COUNTRY_NAME} listed"))
        })?;
        let id = country["id"]
            .as_str()
            .ok_or_else(|| ScrapeError::Resolution(format!("{COUNTRY_NAME} entry has no id")))?;
        info!("mercadolibre: {} is site {}", COUNTRY_NAME, id);
        self.site_id = Some(id.to_string());
        self.lookup = Lookup::Category;
        Ok(())
    }

    fn resolve_category(&mut self, body: &str) -> Result<(), ScrapeError> {
        let categories: Value = serde_json::from_str(body)
            .map_err(|e| ScrapeError::Resolution(format!("categories payload: {e}")))?;
        let categories = categories
            .as_array()
            .ok_or_else(|| ScrapeError::Resolution("categories payload is not an array".into()))?;
        let category = find_exact(categories, "name", CATEGORY_NAME)
            .or_else(|| find_containing(categories, "name", "Consolas"))
            .ok_or_else(|| {
                ScrapeError::Resolution(format!("no category matching {CATEGORY_NAME}"))
            })?;
        let id = category["id"]
            .as_str()
            .ok_or_else(|| ScrapeError::Resolution("category entry has no id".into()))?;
        info!("mercadolibre: {} is category {}", CATEGORY_NAME, id);
        self.category_id = Some(id.to_string());
        self.lookup = Lookup::Ready;
        Ok(())
    }
}

impl Default for MercadoLibre {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteScraper for MercadoLibre {
    fn config(&self) -> &SiteConfig {
        &CONFIG
    }

    fn pending_lookup(&self) -> Option<Vec<String>> {
        match self.lookup {
            Lookup::Country => Some(vec![SITES_URL.to_string()]),
            Lookup::Category => {
                let site_id = self.site_id.as_deref().unwrap_or(DEFAULT_SITE_ID);
                Some(vec![expand(CATEGORIES_URL, &[("$SITE_ID", site_id)])])
            }
            Lookup::Ready => None,
        }
    }

    fn resolve_lookup(&mut self, bodies: &[Option<String>]) -> Result<(), ScrapeError> {
        let body = bodies
            .first()
            .and_then(|body| body.as_deref())
            .ok_or_else(|| ScrapeError::Resolution("lookup request failed".into()))?;
        match self.lookup {
            Lookup::Country => self.resolve_country(body),
            Lookup::Category => self.resolve_category(body),
            Lookup::Ready => Ok(()),
        }
    }

    fn page_url(&self, offset: u32) -> String {
        let offset = offset.to_string();
        let limit = CONFIG.page_size.to_string();
        expand(
            SEARCH_URL,
            &[
                ("$SITE_ID", self.site_id.as_deref().unwrap_or(DEFAULT_SITE_ID)),
                ("$CATEGORY_ID", self.category_id.as_deref().unwrap_or("")),
                ("$OFFSET", offset.as_str()),
                ("$LIMIT", limit.as_str()),
            ],
        )
    }

    fn parse_listing(&self, body: &str, page_url: &str) -> Result<ListingPage, ScrapeError> {
        let payload: Value = match serde_json::from_str(body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("mercadolibre page {} unparseable: {}", page_url, e);
                return Ok(ListingPage::default());
            }
        };
        let results = payload["results"].as_array().cloned().unwrap_or_default();
        let mut items = Vec::with_capacity(results.len());
        for entry in &results {
            let name = entry["title"].as_str().map(str::to_string);
            let url = entry["permalink"].as_str().map(str::to_string);
            let price = entry["price"].as_f64().map(crate::models::RawPrice::Number);
            let image = entry["thumbnail"].as_str().map(str::to_string);
            let item_id = entry["id"].as_str().map(str::to_string);
            // The item id is a country prefix plus a numeric tail; the tail
            // is the identifier.
            let identifier = item_id
                .as_deref()
                .map(|id| id.chars().filter(char::is_ascii_digit).collect::<String>())
                .filter(|digits| !digits.is_empty());
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
                detail_key: item_id,
                category_text,
                secondary: Default::default(),
            });
        }
        Ok(ListingPage {
            items,
            next_url: None,
            reported_total: payload["paging"]["total"].as_u64(),
        })
    }

    fn secondary_url(&self, item: &RawItem) -> Option<String> {
        let id = item.detail_key.as_deref()?;
        Some(expand(DESCRIPTION_URL, &[("$ITEM_ID", id)]))
    }

    fn apply_secondary(&self, item: &mut RawItem, body: &str) {
        let payload: Value = match serde_json::from_str(body) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("mercadolibre description unparseable: {}", e);
                return;
            }
        };
        if let Some(text) = payload["plain_text"].as_str() {
            let text = text.trim();
            if !text.is_empty() {
                item.description = Some(text.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawPrice;

    const SITES_BODY: &str = r#"[
        {"id": "MLA", "name": "Argentina"},
        {"id": "MCO", "name": "Colombia"},
        {"id": "MLM", "name": "Mexico"}
    ]"#;

    const CATEGORIES_BODY: &str = r#"[
        {"id": "MCO1055", "name": "Celulares y Telefonos"},
        {"id": "MCO1144", "name": "Consolas y Videojuegos"}
    ]"#;

    const SEARCH_BODY: &str = r#"{
        "paging": {"total": 1542, "offset": 0, "limit": 50},
        "results": [
            {
                "id": "MCO612345678",
                "title": "PlayStation 5 Slim 1TB",
                "price": 2799900.0,
                "permalink": "https://articulo.mercadolibre.com.co/MCO-612345678-ps5",
                "thumbnail": "https://http2.mlstatic.com/D_612345678-O.jpg"
            },
            {
                "id": "MCO698765432",
                "title": "Nintendo Switch OLED",
                "price": 1599950.5,
                "permalink": "https://articulo.mercadolibre.com.co/MCO-698765432-switch",
                "thumbnail": "https://http2.mlstatic.com/D_698765432-O.jpg"
            }
        ]
    }"#;

    #[test]
    fn lookup_walks_country_then_category() {
        let mut scraper = MercadoLibre::new();
        assert_eq!(
            scraper.pending_lookup(),
            Some(vec![SITES_URL.to_string()])
        );
        scraper
            .resolve_lookup(&[Some(SITES_BODY.to_string())])
            .unwrap();
        assert_eq!(scraper.site_id.as_deref(), Some("MCO"));
        assert_eq!(
            scraper.pending_lookup(),
            Some(vec![
                "https://api.mercadolibre.com/sites/MCO/categories".to_string()
            ])
        );
        scraper
            .resolve_lookup(&[Some(CATEGORIES_BODY.to_string())])
            .unwrap();
        assert_eq!(scraper.category_id.as_deref(), Some("MCO1144"));
        assert_eq!(scraper.pending_lookup(), None);
    }

    #[test]
    fn failed_lookup_request_is_fatal() {
        let mut scraper = MercadoLibre::new();
        assert!(matches!(
            scraper.resolve_lookup(&[None]),
            Err(ScrapeError::Resolution(_))
        ));
    }

    #[test]
    fn unknown_country_is_fatal() {
        let mut scraper = MercadoLibre::new();
        let err = scraper
            .resolve_lookup(&[Some(r#"[{"id": "MLA", "name": "Argentina"}]"#.to_string())])
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Resolution(_)));
    }

    #[test]
    fn page_url_embeds_resolved_ids_and_offset() {
        let mut scraper = MercadoLibre::new();
        scraper
            .resolve_lookup(&[Some(SITES_BODY.to_string())])
            .unwrap();
        scraper
            .resolve_lookup(&[Some(CATEGORIES_BODY.to_string())])
            .unwrap();
        assert_eq!(
            scraper.page_url(100),
            "https://api.mercadolibre.com/sites/MCO/search?category=MCO1144&offset=100&limit=50"
        );
    }

    #[test]
    fn listing_parses_items_and_total() {
        let scraper = MercadoLibre::new();
        let page = scraper.parse_listing(SEARCH_BODY, "test-page").unwrap();
        assert_eq!(page.reported_total, Some(1542));
        assert_eq!(page.items.len(), 2);

        let first = &page.items[0];
        assert_eq!(first.name.as_deref(), Some("PlayStation 5 Slim 1TB"));
        assert_eq!(first.price, Some(RawPrice::Number(2_799_900.0)));
        assert_eq!(first.identifier.as_deref(), Some("612345678"));
        assert_eq!(first.detail_key.as_deref(), Some("MCO612345678"));
        assert!(first.category_text.contains("PlayStation"));
    }

    #[test]
    fn unparseable_listing_yields_an_empty_page() {
        let scraper = MercadoLibre::new();
        let page = scraper
            .parse_listing("<html>blocked</html>", "test-page")
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.reported_total, None);
    }

    #[test]
    fn description_endpoint_and_payload() {
        let scraper = MercadoLibre::new();
        let item = RawItem {
            detail_key: Some("MCO612345678".to_string()),
            ..Default::default()
        };
        assert_eq!(
            scraper.secondary_url(&item).as_deref(),
            Some("https://api.mercadolibre.com/items/MCO612345678/description")
        );

        let mut item = item;
        scraper.apply_secondary(
            &mut item,
            r#"{"plain_text": "  Consola nueva, sellada de fabrica.  "}"#,
        );
        assert_eq!(
            item.description.as_deref(),
            Some("Consola nueva, sellada de fabrica.")
        );
    }

    #[test]
    fn blank_description_stays_unset() {
        let scraper = MercadoLibre::new();
        let mut item = RawItem::default();
        scraper.apply_secondary(&mut item, r#"{"plain_text": "   "}"#);
        assert_eq!(item.description, None);
        scraper.apply_secondary(&mut item, "not json");
        assert_eq!(item.description, None);
    }
}
