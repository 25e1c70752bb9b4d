//! Shared data model: sites, categories, raw extraction output and the
//! normalized record every downstream consumer (export, catalog, store) sees.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The sites this crate knows how to scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    MercadoLibre,
    Olx,
    Alkosto,
    Exito,
}

impl Site {
    pub fn all() -> [Site; 4] {
        [Site::MercadoLibre, Site::Olx, Site::Alkosto, Site::Exito]
    }

    /// Short token used in shard names, catalog rows and CLI arguments.
    pub fn token(&self) -> &'static str {
        match self {
            Site::MercadoLibre => "mercadolibre",
            Site::Olx => "olx",
            Site::Alkosto => "alkosto",
            Site::Exito => "exito",
        }
    }

    /// Human-facing name, also the one the store knows the site by.
    pub fn label(&self) -> &'static str {
        match self {
            Site::MercadoLibre => "Mercado Libre",
            Site::Olx => "OLX",
            Site::Alkosto => "Alkosto",
            Site::Exito => "Exito",
        }
    }

    pub fn parse(token: &str) -> Option<Site> {
        match token.to_lowercase().as_str() {
            "mercadolibre" | "meli" => Some(Site::MercadoLibre),
            "olx" => Some(Site::Olx),
            "alkosto" => Some(Site::Alkosto),
            "exito" | "éxito" => Some(Site::Exito),
            _ => None,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Console family a listing was classified into. Records that match no
/// keyword stay unclassified and serialize as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Nintendo,
    Xbox,
    PlayStation,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Nintendo => "nintendo",
            Category::Xbox => "xbox",
            Category::PlayStation => "playstation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price as it left the page, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPrice {
    /// Display string such as `"$ 1.350.000"`.
    Text(String),
    /// Numeric value from a JSON payload, possibly fractional.
    Number(f64),
}

/// Outcome of the secondary fetch for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecondaryOutcome {
    /// The site needs no secondary fetch for this item.
    #[default]
    NotNeeded,
    Fetched,
    /// The secondary request failed; optional fields fall back to placeholders.
    Failed,
}

/// One item as extracted from a listing page, before assembly. Absent
/// required fields are caught by the assembler, not here.
#[derive(Debug, Clone, Default)]
pub struct RawItem {
    pub name: Option<String>,
    pub price: Option<RawPrice>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    /// Raw identifier token (barcode, item id digits) when the site has one.
    pub identifier: Option<String>,
    /// Site-opaque key for building the secondary request, e.g. an API item id.
    pub detail_key: Option<String>,
    /// Text the classifier sees. Usually the listing URL plus the title.
    pub category_text: String,
    pub secondary: SecondaryOutcome,
}

/// What one listing page yielded: the items on it, plus whatever the page
/// says about further pages.
#[derive(Debug, Default)]
pub struct ListingPage {
    pub items: Vec<RawItem>,
    /// Next page to visit, for sites that link pages together.
    pub next_url: Option<String>,
    /// Total result count the site claims, when the payload carries one.
    pub reported_total: Option<u64>,
}

/// Fully assembled listing record. Field order here is the serialized order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub source_site: Site,
    pub category: Option<Category>,
    pub name: String,
    pub description: String,
    /// Integer price in the site's local currency, fractions truncated.
    pub price: u64,
    pub image: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<u64>,
}

impl ProductRecord {
    /// Stable catalog id for cross-run dedup, derived from site and listing URL.
    pub fn catalog_id(&self) -> String {
        format!("{:x}", md5::compute(format!("{}:{}", self.source_site, self.url)))
    }
}

/// One exported shard's worth of records.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub records: Vec<ProductRecord>,
}

impl Batch {
    pub fn new(records: Vec<ProductRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// What one site run produced, for logging and the caller's accounting.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub site: Site,
    pub started_at: DateTime<Utc>,
    pub pages: usize,
    pub scraped: usize,
    pub dropped: usize,
    pub shards: Vec<PathBuf>,
    /// Records not seen in any earlier run, when the catalog is enabled.
    pub new_items: Option<usize>,
    pub forwarded: bool,
}
