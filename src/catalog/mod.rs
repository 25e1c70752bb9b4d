//! Local SQLite catalog of every record ever scraped.
//!
//! The catalog is how runs know what is new: records are keyed by a hash of
//! site and listing URL, and a run's batches are folded in after export so
//! the summary can say how many items were first seen today.

use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::error::ScrapeError;
use crate::models::Batch;

pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    pub async fn open(database_url: &str) -> Result<Self, ScrapeError> {
        let in_memory = database_url.contains(":memory:");
        if !in_memory {
            if let Some(path) = database_url.strip_prefix("sqlite:")
                && let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
                info!("Creating catalog database");
                Sqlite::create_database(database_url).await?;
            }
        }

        // A single connection keeps in-memory catalogs coherent; the write
        // load is sequential anyway.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn known_ids(&self) -> Result<HashSet<String>, ScrapeError> {
        let rows = sqlx::query("SELECT id FROM products")
            .fetch_all(&self.pool)
            .await?;

        let ids = rows
            .into_iter()
            .map(|row| row.get::<String, _>("id"))
            .collect();

        Ok(ids)
    }

    /// Folds a run's batches into the catalog and returns how many records
    /// were not known before this run.
    pub async fn record_batches(&self, batches: &[Batch]) -> Result<usize, ScrapeError> {
        let mut seen = self.known_ids().await?;
        let mut new_count = 0;

        for record in batches.iter().flat_map(|batch| &batch.records) {
            let id = record.catalog_id();
            if !seen.insert(id.clone()) {
                continue;
            }
            sqlx::query(
                r"
                INSERT INTO products
                    (id, site, category, name, description, price, image, url, identifier, discovered_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(&id)
            .bind(record.source_site.token())
            .bind(record.category.map(|category| category.as_str()))
            .bind(&record.name)
            .bind(&record.description)
            .bind(record.price as i64)
            .bind(&record.image)
            .bind(&record.url)
            .bind(record.identifier.map(|identifier| identifier as i64))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
            new_count += 1;
        }

        Ok(new_count)
    }
}

impl Clone for Catalog {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ProductRecord, Site};

    fn record(site: Site, url: &str) -> ProductRecord {
        ProductRecord {
            source_site: site,
            category: Some(Category::PlayStation),
            name: "PS5".to_string(),
            description: "Consola".to_string(),
            price: 2_799_900,
            image: "https://cdn.example.com/ps5.jpg".to_string(),
            url: url.to_string(),
            identifier: Some(612345678),
        }
    }

    #[tokio::test]
    async fn new_records_are_counted_once() {
        let catalog = Catalog::open("sqlite::memory:").await.unwrap();
        let batches = vec![
            Batch::new(vec![
                record(Site::MercadoLibre, "https://m.example.com/a"),
                record(Site::MercadoLibre, "https://m.example.com/b"),
            ]),
            // Same listing showing up on a later page of the same run.
            Batch::new(vec![record(Site::MercadoLibre, "https://m.example.com/a")]),
        ];

        assert_eq!(catalog.record_batches(&batches).await.unwrap(), 2);
        assert_eq!(catalog.known_ids().await.unwrap().len(), 2);

        // A rerun brings nothing new.
        assert_eq!(catalog.record_batches(&batches).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn identical_urls_on_different_sites_are_distinct() {
        let catalog = Catalog::open("sqlite::memory:").await.unwrap();
        let batches = vec![Batch::new(vec![
            record(Site::Olx, "https://shared.example.com/x"),
            record(Site::Exito, "https://shared.example.com/x"),
        ])];
        assert_eq!(catalog.record_batches(&batches).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unclassified_and_unidentified_records_store_nulls() {
        let catalog = Catalog::open("sqlite::memory:").await.unwrap();
        let mut r = record(Site::Olx, "https://o.example.com/retro");
        r.category = None;
        r.identifier = None;
        assert_eq!(
            catalog.record_batches(&[Batch::new(vec![r])]).await.unwrap(),
            1
        );

        let row = sqlx::query("SELECT category, identifier FROM products")
            .fetch_one(&catalog.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<Option<String>, _>("category"), None);
        assert_eq!(row.get::<Option<i64>, _>("identifier"), None);
    }
}
