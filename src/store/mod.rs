//! Store forwarding client.
//!
//! Exported batches can optionally be pushed to the store API, the CRUD
//! service that owns the product database the storefront reads. The
//! contract is narrow on purpose:
//!
//! ## Entity lookup
//!
//! The store models each marketplace as an "ecommerce" entity and each
//! console brand as a "product type" entity. Before forwarding, the client
//! resolves the entity matching the site's label and the product type for
//! each category the run produced (`GET {base}/ecommerce?name=...`,
//! `GET {base}/product_types?name=...`) and reports what it finds. A missing
//! entity is logged, never fatal; the store may be seeded later and batches
//! are still worth submitting.
//!
//! ## Batch submission
//!
//! Each non-empty batch is POSTed to `{base}/product` as a JSON array of
//! records, one request per batch, in shard order. The store signals
//! acceptance with `201 Created` and nothing else counts as success. A
//! rejected batch is logged with the response body and the remaining
//! batches are still submitted; forwarding is an optional tail step and
//! must never undo a run whose shards are already on disk.

use crate::models::{Batch, Category, Site};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// First record whose `field` equals `value` exactly.
pub fn find_exact<'a>(records: &'a [Value], field: &str, value: &str) -> Option<&'a Value> {
    records.iter().find(|record| record[field].as_str() == Some(value))
}

/// First record whose `field` contains `fragment`, case-insensitively.
pub fn find_containing<'a>(records: &'a [Value], field: &str, fragment: &str) -> Option<&'a Value> {
    let needle = fragment.to_lowercase();
    records.iter().find(|record| {
        record[field]
            .as_str()
            .map(|value| value.to_lowercase().contains(&needle))
            .unwrap_or(false)
    })
}

/// Client for one store API root.
#[derive(Debug, Clone)]
pub struct StoreClient {
    client: reqwest::Client,
    base_url: String,
    verbose: bool,
}

impl StoreClient {
    pub fn new(base_url: &str, verbose: bool) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            verbose,
        })
    }

    /// URL of a collection route filtered by name, the filter the store's
    /// list views understand.
    fn lookup_url(&self, resource: &str, name: &str) -> String {
        format!(
            "{}/{}?name={}",
            self.base_url,
            resource,
            urlencoding::encode(name)
        )
    }

    fn submit_url(&self) -> String {
        format!("{}/product", self.base_url)
    }

    /// One entity-collection GET, parsed as a JSON array. Every failure mode
    /// degrades to `None` after a warning.
    async fn entities_at(&self, url: &str, what: &str) -> Option<Vec<Value>> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("store {} lookup failed: {}", what, e);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!("store {} lookup returned {}", what, response.status());
            return None;
        }
        match response.json().await {
            Ok(entities) => Some(entities),
            Err(e) => {
                warn!("store {} payload unreadable: {}", what, e);
                None
            }
        }
    }

    /// Looks up the store's entity id for a site, by exact label first and
    /// containment second.
    pub async fn resolve_site_entity(&self, site: Site) -> Option<u64> {
        let url = self.lookup_url("ecommerce", site.label());
        let entities = self.entities_at(&url, "ecommerce").await?;
        find_exact(&entities, "name", site.label())
            .or_else(|| find_containing(&entities, "name", site.label()))
            .and_then(|entity| entity["id"].as_u64())
    }

    /// Looks up the store's product-type id for a console category.
    pub async fn resolve_type_entity(&self, category: Category) -> Option<u64> {
        let url = self.lookup_url("product_types", category.as_str());
        let entities = self.entities_at(&url, "product type").await?;
        find_exact(&entities, "name", category.as_str())
            .or_else(|| find_containing(&entities, "name", category.as_str()))
            .and_then(|entity| entity["id"].as_u64())
    }

    /// Submits a run's batches. Returns whether every non-empty batch was
    /// accepted with `201 Created`.
    pub async fn forward(&self, site: Site, batches: &[Batch]) -> bool {
        match self.resolve_site_entity(site).await {
            Some(id) => info!("store knows {} as entity {}", site.label(), id),
            None => warn!(
                "store has no entity for {}, forwarding anyway",
                site.label()
            ),
        }
        let categories: HashSet<Category> = batches
            .iter()
            .flat_map(|batch| &batch.records)
            .filter_map(|record| record.category)
            .collect();
        for category in categories {
            match self.resolve_type_entity(category).await {
                Some(id) => debug!("store knows {} as product type {}", category, id),
                None => warn!("store has no product type for {}", category),
            }
        }

        let url = self.submit_url();
        let mut all_accepted = true;
        for (index, batch) in batches.iter().enumerate() {
            if batch.is_empty() {
                debug!("batch {} is empty, not submitting", index);
                continue;
            }
            match self.client.post(&url).json(&batch.records).send().await {
                Ok(response) if response.status() == StatusCode::CREATED => {
                    info!(
                        "store accepted batch {} ({} records)",
                        index,
                        batch.len()
                    );
                }
                Ok(response) => {
                    all_accepted = false;
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    warn!(
                        "store rejected batch {}: {} {}",
                        index,
                        status,
                        crate::fetch::preview(&body)
                    );
                }
                Err(e) => {
                    all_accepted = false;
                    warn!("store submission of batch {} failed: {}", index, e);
                }
            }
            if self.verbose {
                debug!("submitted batch {} to {}", index, url);
            }
        }
        all_accepted
    }
}
