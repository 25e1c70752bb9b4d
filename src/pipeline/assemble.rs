//! Record assembly: raw extraction output becomes normalized records.
//!
//! Every item walks an explicit state machine. Missing optional fields are
//! substituted with placeholders and the item survives; a missing or
//! unparseable required field drops the item, decrements nothing else, and
//! leaves the rest of the batch untouched.

use crate::config::SiteConfig;
use crate::error::ItemError;
use crate::extract::classify::classify;
use crate::extract::normalize::{normalize_identifier, parse_price_text, truncate_price_number};
use crate::models::{Batch, ProductRecord, RawItem, RawPrice, SecondaryOutcome, Site};
use tracing::{debug, warn};

/// Placeholder for items whose description could not be obtained.
pub const FALLBACK_DESCRIPTION: &str = "Description not available";
/// Placeholder for items whose image could not be obtained.
pub const FALLBACK_IMAGE: &str = "Image not available";

/// States an item moves through on its way into a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    FieldsExtracted,
    SecondaryFetchOk,
    SecondaryFetchFallback,
    Assembled,
    Dropped,
}

fn advance(site: Site, label: &str, state: &mut ItemState, next: ItemState) {
    debug!("{} item {}: {:?} -> {:?}", site, label, *state, next);
    *state = next;
}

/// Assembles one item, or says why it cannot be part of the batch.
pub fn assemble_item(config: &SiteConfig, item: RawItem) -> Result<ProductRecord, ItemError> {
    let label = item
        .url
        .clone()
        .or_else(|| item.name.clone())
        .unwrap_or_else(|| "<unnamed>".to_string());
    let mut state = ItemState::Pending;

    let name = item.name.ok_or(ItemError::MissingField("name"))?;
    let url = item.url.ok_or(ItemError::MissingField("url"))?;
    let raw_price = item.price.ok_or(ItemError::MissingField("price"))?;
    advance(config.site, &label, &mut state, ItemState::FieldsExtracted);

    let after_secondary = match item.secondary {
        SecondaryOutcome::Failed => ItemState::SecondaryFetchFallback,
        SecondaryOutcome::Fetched | SecondaryOutcome::NotNeeded => ItemState::SecondaryFetchOk,
    };
    advance(config.site, &label, &mut state, after_secondary);

    let price = match raw_price {
        RawPrice::Text(text) => parse_price_text(&text)?,
        RawPrice::Number(value) => truncate_price_number(value)?,
    };

    let identifier = match (config.expects_identifier, item.identifier) {
        (true, None) => return Err(ItemError::MissingField("identifier")),
        (expected, Some(raw)) => match normalize_identifier(&raw) {
            Ok(id) => Some(id),
            Err(e) if expected => return Err(e),
            Err(e) => {
                debug!("{} ignoring stray identifier on {}: {}", config.site, url, e);
                None
            }
        },
        (false, None) => None,
    };

    let description = item
        .description
        .unwrap_or_else(|| FALLBACK_DESCRIPTION.to_string());
    let image = item.image.unwrap_or_else(|| FALLBACK_IMAGE.to_string());
    let category = classify(&item.category_text);

    advance(config.site, &label, &mut state, ItemState::Assembled);
    Ok(ProductRecord {
        source_site: config.site,
        category,
        name,
        description,
        price,
        image,
        url,
        identifier,
    })
}

/// What one page's assembly produced.
#[derive(Debug)]
pub struct BatchOutcome {
    pub batch: Batch,
    pub dropped: usize,
}

/// Assembles a whole page of items. Dropped items are logged and counted,
/// never propagated.
pub fn assemble_batch(config: &SiteConfig, items: Vec<RawItem>) -> BatchOutcome {
    let mut records = Vec::with_capacity(items.len());
    let mut dropped = 0;
    for item in items {
        let label = item
            .url
            .clone()
            .or_else(|| item.name.clone())
            .unwrap_or_else(|| "<unnamed>".to_string());
        match assemble_item(config, item) {
            Ok(record) => records.push(record),
            Err(e) => {
                dropped += 1;
                warn!(
                    "{} item {}: {:?}, {}",
                    config.site,
                    label,
                    ItemState::Dropped,
                    e
                );
            }
        }
    }
    BatchOutcome {
        batch: Batch::new(records),
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PaginationStrategy, Selectors, SiteConfig, Transport};
    use crate::models::Category;
    use std::time::Duration;

    fn config(expects_identifier: bool) -> SiteConfig {
        SiteConfig {
            site: Site::Alkosto,
            base_url: "https://shop.example.com",
            listing_url: "https://shop.example.com/consolas?start=$OFFSET",
            strategy: PaginationStrategy::Offset,
            transport: Transport::Plain,
            selectors: Selectors::api(),
            page_size: 10,
            max_offset: 10,
            delay: Duration::ZERO,
            expects_identifier,
            accepts_json: false,
        }
    }

    fn complete_item() -> RawItem {
        RawItem {
            name: Some("Consola Xbox Series X".to_string()),
            price: Some(RawPrice::Text("$ 2.999.900".to_string())),
            url: Some("https://shop.example.com/xbox-series-x".to_string()),
            image: Some("https://cdn.example.com/xsx.jpg".to_string()),
            description: Some("1TB, incluye control".to_string()),
            identifier: Some("1234567890123".to_string()),
            detail_key: None,
            category_text: "https://shop.example.com/xbox-series-x Consola Xbox Series X"
                .to_string(),
            secondary: SecondaryOutcome::Fetched,
        }
    }

    #[test]
    fn complete_item_assembles() {
        let record = assemble_item(&config(true), complete_item()).unwrap();
        assert_eq!(record.name, "Consola Xbox Series X");
        assert_eq!(record.price, 2_999_900);
        assert_eq!(record.identifier, Some(234567890123));
        assert_eq!(record.category, Some(Category::Xbox));
    }

    #[test]
    fn optional_fields_fall_back_and_item_survives() {
        let mut item = complete_item();
        item.description = None;
        item.image = None;
        item.secondary = SecondaryOutcome::Failed;
        let record = assemble_item(&config(true), item).unwrap();
        assert_eq!(record.description, FALLBACK_DESCRIPTION);
        assert_eq!(record.image, FALLBACK_IMAGE);
    }

    #[test]
    fn missing_name_drops_the_item() {
        let mut item = complete_item();
        item.name = None;
        assert_eq!(
            assemble_item(&config(true), item).unwrap_err(),
            ItemError::MissingField("name")
        );
    }

    #[test]
    fn unparseable_price_drops_the_item() {
        let mut item = complete_item();
        item.price = Some(RawPrice::Text("Agotado".to_string()));
        assert!(matches!(
            assemble_item(&config(true), item),
            Err(ItemError::Price(_))
        ));
    }

    #[test]
    fn identifier_is_required_only_where_the_site_defines_one() {
        let mut item = complete_item();
        item.identifier = None;
        assert_eq!(
            assemble_item(&config(true), item.clone()).unwrap_err(),
            ItemError::MissingField("identifier")
        );
        let record = assemble_item(&config(false), item).unwrap();
        assert_eq!(record.identifier, None);
    }

    #[test]
    fn numeric_price_truncates() {
        let mut item = complete_item();
        item.price = Some(RawPrice::Number(1_299_999.99));
        let record = assemble_item(&config(true), item).unwrap();
        assert_eq!(record.price, 1_299_999);
    }

    #[test]
    fn unclassifiable_item_stays_unclassified() {
        let mut item = complete_item();
        item.category_text = "https://shop.example.com/tv-55 Televisor 55 pulgadas".to_string();
        let record = assemble_item(&config(true), item).unwrap();
        assert_eq!(record.category, None);
    }

    #[test]
    fn one_bad_item_costs_exactly_one_record() {
        let good = complete_item();
        let mut bad = complete_item();
        bad.name = None;
        let outcome = assemble_batch(&config(true), vec![good.clone(), bad, good]);
        assert_eq!(outcome.batch.len(), 2);
        assert_eq!(outcome.dropped, 1);
    }
}
